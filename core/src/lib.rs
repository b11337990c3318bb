/// Messaging core - session-scoped conversation and presence engine
///
/// Conversations, message delivery status, simulated typing/presence,
/// unread bookkeeping and mobile/desktop view coordination. All timing
/// runs through an injectable clock so every transition is replayable.

pub mod error;
pub mod config;
pub mod clock;
pub mod ids;
pub mod directory;
pub mod messenger_types;
pub mod conversation_store;
pub mod message_store;
pub mod delivery;
pub mod presence;
pub mod unread;
pub mod view_mode;
pub mod session;
pub mod runtime;

pub use config::MessagingConfig;
pub use error::{MessagingError, Result};
pub use runtime::SessionHandle;
pub use session::{MessagingSession, SeedConversation, SessionBootstrap};
