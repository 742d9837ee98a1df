/// Shared types for the messaging core
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical conversation key: "dm:{min_id}:{max_id}".
/// Both participants address the same ledger regardless of who initiates.
pub fn conversation_key(a: u64, b: u64) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("dm:{}:{}", lo, hi)
}

/// A single chat message. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: String,
    pub sender_id: u64,
    pub receiver_id: u64,
    pub content: String,
    /// Wall-clock timestamp, carried for display only. `seq` is the sole
    /// ordering authority.
    pub created_at: DateTime<Utc>,
    /// Per-conversation strictly increasing sequence number assigned at
    /// append time.
    pub seq: u64,
}

/// Participants record indexed once per conversation (for the dialog list).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub conversation_id: String,
    pub user_a: u64,
    pub user_b: u64,
}

impl ConversationEntry {
    pub fn involves(&self, user_id: u64) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    pub fn other_party(&self, user_id: u64) -> u64 {
        if self.user_a == user_id {
            self.user_b
        } else {
            self.user_a
        }
    }
}
