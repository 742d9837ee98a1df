/// Error types for the messaging core
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("message content must not be empty")]
    InvalidContent,

    #[error("cannot send a message to yourself")]
    SelfMessage,

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;
