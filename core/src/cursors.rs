/// Read cursor persistence: per (conversation, reader) watermarks in sled DB
///
/// A cursor value means "the reader has seen all messages with seq <= value".
/// Advancement merges under `max`, so concurrent or replayed calls from
/// overlapping poll cycles converge without ordering requirements.
use crate::error::{ChatError, Result};
use std::path::Path;

pub struct ReadCursorStore {
    db: sled::Db,
}

fn decode_seq(raw: &[u8]) -> u64 {
    if raw.len() == 8 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        u64::from_be_bytes(buf)
    } else {
        0
    }
}

impl ReadCursorStore {
    /// Create cursor store
    pub fn new(data_dir: &Path) -> Result<Self> {
        let db = sled::open(data_dir.join("cursors.db"))
            .map_err(|e| ChatError::Storage(format!("Failed to open cursors DB: {}", e)))?;
        Ok(Self { db })
    }

    fn key(conversation_id: &str, reader_id: u64) -> Vec<u8> {
        format!("{}:{}", conversation_id, reader_id).into_bytes()
    }

    /// Set the cursor to max(current, up_to_seq) and return the stored value.
    /// Idempotent: a stale value from a slow request can never regress a
    /// newer one written by a faster request.
    pub fn advance(&self, conversation_id: &str, reader_id: u64, up_to_seq: u64) -> Result<u64> {
        let merged = self
            .db
            .update_and_fetch(Self::key(conversation_id, reader_id), |old| {
                let current = old.map(decode_seq).unwrap_or(0);
                Some(current.max(up_to_seq).to_be_bytes().to_vec())
            })
            .map_err(|e| ChatError::Storage(format!("Failed to advance cursor: {}", e)))?;
        Ok(merged.as_deref().map(decode_seq).unwrap_or(up_to_seq))
    }

    /// Highest acknowledged seq, 0 when no cursor exists yet.
    pub fn get(&self, conversation_id: &str, reader_id: u64) -> Result<u64> {
        let value = self
            .db
            .get(Self::key(conversation_id, reader_id))
            .map_err(|e| ChatError::Storage(format!("Failed to read cursor: {}", e)))?;
        Ok(value.as_deref().map(decode_seq).unwrap_or(0))
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| ChatError::Storage(format!("Failed to flush cursors DB: {}", e)))?;
        Ok(())
    }
}

impl Clone for ReadCursorStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}
