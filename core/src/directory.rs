/// Identity collaborator seam.
///
/// Registration, friend lists and profiles live outside the messaging core;
/// the core only needs to resolve a participant id to an existing user. The
/// sled-backed implementation below is what the server binary wires in.
use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub display_name: String,
    pub added_at: String, // RFC3339
}

pub trait UserDirectory: Send + Sync {
    /// Resolve a user id; `None` when the user does not exist.
    fn get_user(&self, user_id: u64) -> Result<Option<UserRecord>>;

    /// Resolve a user id, surfacing `NotFound` for an unknown participant.
    fn require_user(&self, user_id: u64) -> Result<UserRecord> {
        self.get_user(user_id)?
            .ok_or_else(|| ChatError::NotFound(format!("user {}", user_id)))
    }
}

/// User storage — persists the directory in sled DB
pub struct SledDirectory {
    db: sled::Db,
}

impl SledDirectory {
    pub fn new(data_dir: &Path) -> Result<Self> {
        let db = sled::open(data_dir.join("users.db"))
            .map_err(|e| ChatError::Storage(format!("Failed to open users DB: {}", e)))?;
        Ok(Self { db })
    }

    pub fn upsert_user(&self, user: &UserRecord) -> Result<()> {
        let val = serde_json::to_vec(user).map_err(ChatError::Serialization)?;
        self.db
            .insert(user.id.to_be_bytes().to_vec(), val)
            .map_err(|e| ChatError::Storage(format!("Failed to save user: {}", e)))?;
        Ok(())
    }

    pub fn list_users(&self) -> Result<Vec<UserRecord>> {
        let mut out = Vec::new();
        for entry in self.db.iter() {
            let (_, val) = entry
                .map_err(|e| ChatError::Storage(format!("Failed to read users: {}", e)))?;
            let user =
                serde_json::from_slice::<UserRecord>(&val).map_err(ChatError::Serialization)?;
            out.push(user);
        }
        Ok(out)
    }

    pub fn remove_user(&self, user_id: u64) -> Result<bool> {
        let removed = self
            .db
            .remove(user_id.to_be_bytes().to_vec())
            .map_err(|e| ChatError::Storage(format!("Failed to remove user: {}", e)))?;
        Ok(removed.is_some())
    }

    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| ChatError::Storage(format!("Failed to flush users DB: {}", e)))?;
        Ok(())
    }
}

impl UserDirectory for SledDirectory {
    fn get_user(&self, user_id: u64) -> Result<Option<UserRecord>> {
        match self
            .db
            .get(user_id.to_be_bytes())
            .map_err(|e| ChatError::Storage(format!("Failed to read user: {}", e)))?
        {
            Some(val) => {
                let user =
                    serde_json::from_slice::<UserRecord>(&val).map_err(ChatError::Serialization)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }
}

impl Clone for SledDirectory {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}
