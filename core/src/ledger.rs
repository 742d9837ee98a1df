/// Message persistence: append-only per-conversation ledger in sled DB
///
/// Keys are `msg:{conversation}:{seq:020}` so the lexicographic order of a
/// prefix scan is the numeric seq order. The next seq is derived from the
/// last persisted key, which makes assignment restart-safe.
use crate::error::{ChatError, Result};
use crate::types::{conversation_key, ConversationEntry, Message};
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

const MSG_PREFIX: &str = "msg";
const CONV_PREFIX: &str = "conv";

pub struct MessageLedger {
    db: sled::Db,
    /// One lock per conversation: appends to the same conversation serialize,
    /// different conversations proceed in parallel.
    append_locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

impl MessageLedger {
    /// Create message ledger
    pub fn new(data_dir: &Path) -> Result<Self> {
        let db = sled::open(data_dir.join("messages.db"))
            .map_err(|e| ChatError::Storage(format!("Failed to open messages DB: {}", e)))?;

        Ok(Self {
            db,
            append_locks: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    fn msg_key(conversation_id: &str, seq: u64) -> Vec<u8> {
        format!("{}:{}:{:020}", MSG_PREFIX, conversation_id, seq).into_bytes()
    }

    fn conv_key(conversation_id: &str) -> Vec<u8> {
        format!("{}:{}", CONV_PREFIX, conversation_id).into_bytes()
    }

    fn lock_for(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        // A poisoned map only means another appender panicked; the sled state
        // itself stays consistent, so recover the guard.
        {
            let locks = self.append_locks.read().unwrap_or_else(|e| e.into_inner());
            if let Some(lock) = locks.get(conversation_id) {
                return lock.clone();
            }
        }
        let mut locks = self.append_locks.write().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Append a message, assigning the next sequence number for its
    /// conversation. Fails with `InvalidContent` on empty or whitespace-only
    /// content.
    pub fn append(&self, sender_id: u64, receiver_id: u64, content: &str) -> Result<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::InvalidContent);
        }

        let conversation_id = conversation_key(sender_id, receiver_id);
        let lock = self.lock_for(&conversation_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let seq = self.head_seq(&conversation_id)? + 1;
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: conversation_id.clone(),
            sender_id,
            receiver_id,
            content: content.to_string(),
            created_at: Utc::now(),
            seq,
        };

        let value = serde_json::to_vec(&message).map_err(ChatError::Serialization)?;
        self.db
            .insert(Self::msg_key(&conversation_id, seq), value)
            .map_err(|e| ChatError::Storage(format!("Failed to save message: {}", e)))?;
        self.ensure_conversation(&message)?;

        Ok(message)
    }

    /// All messages with seq > after_seq, ascending by seq. An unknown
    /// conversation is a valid empty state, not an error.
    pub fn list_since(&self, conversation_id: &str, after_seq: u64) -> Result<Vec<Message>> {
        let start = Self::msg_key(conversation_id, after_seq.saturating_add(1));
        let end = Self::msg_key(conversation_id, u64::MAX);

        let mut messages = Vec::new();
        for entry in self.db.range(start..=end) {
            let (_, value) = entry
                .map_err(|e| ChatError::Storage(format!("Failed to read messages: {}", e)))?;
            let msg = serde_json::from_slice::<Message>(&value).map_err(ChatError::Serialization)?;
            messages.push(msg);
        }
        Ok(messages)
    }

    /// Highest sequence number assigned in the conversation, 0 when empty.
    pub fn head_seq(&self, conversation_id: &str) -> Result<u64> {
        let start = Self::msg_key(conversation_id, 0);
        let end = Self::msg_key(conversation_id, u64::MAX);

        match self.db.range(start..=end).next_back() {
            Some(entry) => {
                let (_, value) = entry
                    .map_err(|e| ChatError::Storage(format!("Failed to read messages: {}", e)))?;
                let msg =
                    serde_json::from_slice::<Message>(&value).map_err(ChatError::Serialization)?;
                Ok(msg.seq)
            }
            None => Ok(0),
        }
    }

    fn ensure_conversation(&self, message: &Message) -> Result<()> {
        let key = Self::conv_key(&message.conversation_id);
        let exists = self
            .db
            .contains_key(&key)
            .map_err(|e| ChatError::Storage(format!("Failed to read conversations: {}", e)))?;
        if exists {
            return Ok(());
        }

        let (lo, hi) = if message.sender_id <= message.receiver_id {
            (message.sender_id, message.receiver_id)
        } else {
            (message.receiver_id, message.sender_id)
        };
        let entry = ConversationEntry {
            conversation_id: message.conversation_id.clone(),
            user_a: lo,
            user_b: hi,
        };
        let value = serde_json::to_vec(&entry).map_err(ChatError::Serialization)?;
        self.db
            .insert(key, value)
            .map_err(|e| ChatError::Storage(format!("Failed to save conversation: {}", e)))?;
        Ok(())
    }

    /// Conversations the given user participates in.
    pub fn conversations_of(&self, user_id: u64) -> Result<Vec<ConversationEntry>> {
        let mut out = Vec::new();
        for entry in self.db.scan_prefix(format!("{}:", CONV_PREFIX).as_bytes()) {
            let (_, value) = entry
                .map_err(|e| ChatError::Storage(format!("Failed to read conversations: {}", e)))?;
            let conv =
                serde_json::from_slice::<ConversationEntry>(&value).map_err(ChatError::Serialization)?;
            if conv.involves(user_id) {
                out.push(conv);
            }
        }
        Ok(out)
    }

    /// Total message count across all conversations
    pub fn message_count(&self) -> usize {
        self.db
            .scan_prefix(format!("{}:", MSG_PREFIX).as_bytes())
            .count()
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| ChatError::Storage(format!("Failed to flush messages DB: {}", e)))?;
        Ok(())
    }
}

impl Clone for MessageLedger {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            append_locks: self.append_locks.clone(),
        }
    }
}
