/// Unread projection: counts derived from ledger + cursor, never persisted
/// as a source of truth.
use crate::cursors::ReadCursorStore;
use crate::error::Result;
use crate::ledger::MessageLedger;
use std::collections::BTreeMap;

#[derive(Clone)]
pub struct UnreadProjection {
    ledger: MessageLedger,
    cursors: ReadCursorStore,
}

impl UnreadProjection {
    pub fn new(ledger: MessageLedger, cursors: ReadCursorStore) -> Self {
        Self { ledger, cursors }
    }

    /// Messages from the other participant with seq past the reader's cursor.
    /// The reader's own messages never count.
    pub fn count(&self, conversation_id: &str, reader_id: u64) -> Result<u64> {
        let cursor = self.cursors.get(conversation_id, reader_id)?;
        let unread = self
            .ledger
            .list_since(conversation_id, cursor)?
            .iter()
            .filter(|m| m.sender_id != reader_id)
            .count();
        Ok(unread as u64)
    }

    /// Per-conversation unread counts for the dialog list. Every entry is
    /// computed against that conversation's own cursor; marking one
    /// conversation read cannot affect another's count.
    pub fn summary(&self, reader_id: u64) -> Result<BTreeMap<String, u64>> {
        let mut out = BTreeMap::new();
        for conv in self.ledger.conversations_of(reader_id)? {
            let count = self.count(&conv.conversation_id, reader_id)?;
            out.insert(conv.conversation_id, count);
        }
        Ok(out)
    }

    /// Total unread across all of the reader's conversations.
    pub fn total(&self, reader_id: u64) -> Result<u64> {
        Ok(self.summary(reader_id)?.values().sum())
    }
}
