/// Error types for the messaging engine
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessagingError {
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("No active conversation")]
    NoActiveConversation,

    #[error("Invalid conversation: {0}")]
    InvalidConversation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session closed")]
    SessionClosed,
}

pub type Result<T> = std::result::Result<T, MessagingError>;
