/// Sync service: the request-level contract clients poll.
///
/// Every operation names the acting user explicitly; there is no
/// process-wide session state. All calls are bounded request/response —
/// the server holds no subscription state between them.
use crate::cursors::ReadCursorStore;
use crate::directory::UserDirectory;
use crate::error::{ChatError, Result};
use crate::ledger::MessageLedger;
use crate::types::{conversation_key, Message};
use crate::unread::UnreadProjection;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct SyncService {
    ledger: MessageLedger,
    cursors: ReadCursorStore,
    unread: UnreadProjection,
    directory: Arc<dyn UserDirectory>,
}

impl SyncService {
    pub fn new(
        ledger: MessageLedger,
        cursors: ReadCursorStore,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let unread = UnreadProjection::new(ledger.clone(), cursors.clone());
        Self {
            ledger,
            cursors,
            unread,
            directory,
        }
    }

    /// Append a message from `sender_id` to `receiver_id` and return the
    /// stored record. The message becomes visible to the receiver on their
    /// next poll.
    pub fn send(&self, sender_id: u64, receiver_id: u64, content: &str) -> Result<Message> {
        self.directory.require_user(sender_id)?;
        self.directory.require_user(receiver_id)?;
        if sender_id == receiver_id {
            return Err(ChatError::SelfMessage);
        }

        let message = self.ledger.append(sender_id, receiver_id, content)?;
        info!(
            conversation = %message.conversation_id,
            seq = message.seq,
            sender = sender_id,
            "message appended"
        );
        Ok(message)
    }

    /// Conversation history between two users with seq > after_seq, ascending.
    /// Symmetric in its user arguments.
    pub fn fetch_conversation(
        &self,
        user_a: u64,
        user_b: u64,
        after_seq: u64,
    ) -> Result<Vec<Message>> {
        self.directory.require_user(user_a)?;
        self.directory.require_user(user_b)?;
        let conversation_id = conversation_key(user_a, user_b);
        self.ledger.list_since(&conversation_id, after_seq)
    }

    /// Advance the reader's cursor in their conversation with
    /// `other_party_id`. Clients pass the highest seq they actually observed;
    /// `None` acknowledges the conversation head as of this call.
    pub fn mark_read(
        &self,
        reader_id: u64,
        other_party_id: u64,
        up_to_seq: Option<u64>,
    ) -> Result<u64> {
        self.directory.require_user(reader_id)?;
        self.directory.require_user(other_party_id)?;
        let conversation_id = conversation_key(reader_id, other_party_id);
        let target = match up_to_seq {
            Some(seq) => seq,
            None => self.ledger.head_seq(&conversation_id)?,
        };
        let stored = self.cursors.advance(&conversation_id, reader_id, target)?;
        debug!(
            conversation = %conversation_id,
            reader = reader_id,
            cursor = stored,
            "cursor advanced"
        );
        Ok(stored)
    }

    /// Unread count for one conversation, from the reader's side.
    pub fn unread_count(&self, reader_id: u64, other_party_id: u64) -> Result<u64> {
        self.directory.require_user(reader_id)?;
        self.directory.require_user(other_party_id)?;
        let conversation_id = conversation_key(reader_id, other_party_id);
        self.unread.count(&conversation_id, reader_id)
    }

    /// Per-conversation unread counts for the reader's dialog list.
    pub fn unread_summary(&self, reader_id: u64) -> Result<BTreeMap<String, u64>> {
        self.directory.require_user(reader_id)?;
        self.unread.summary(reader_id)
    }

    /// Total unread across all conversations.
    pub fn unread_total(&self, reader_id: u64) -> Result<u64> {
        self.directory.require_user(reader_id)?;
        self.unread.total(reader_id)
    }

    /// Total message count (status surface)
    pub fn message_count(&self) -> usize {
        self.ledger.message_count()
    }

    /// Flush all stores to disk
    pub fn flush(&self) -> Result<()> {
        self.ledger.flush()?;
        self.cursors.flush()?;
        Ok(())
    }
}
