/// Shared types for the messaging engine
use crate::view_mode::ViewState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Someone the local user can talk to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub display_name: String,
    pub title: String,
    /// Avatar reference (URL or asset key)
    pub avatar: String,
    pub online: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
}

/// Lifecycle of an outbound message. Ordered: `Sent < Delivered < Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

impl DeliveryStatus {
    /// The only status this one may move to
    pub fn next(self) -> Option<DeliveryStatus> {
        match self {
            DeliveryStatus::Sent => Some(DeliveryStatus::Delivered),
            DeliveryStatus::Delivered => Some(DeliveryStatus::Read),
            DeliveryStatus::Read => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    /// Read flag from the local user's point of view
    pub is_read: bool,
    /// Only set on messages authored by the local user
    pub status: Option<DeliveryStatus>,
}

impl Message {
    /// Step the delivery status forward once. Returns the new status.
    pub fn advance_status(&mut self) -> Option<DeliveryStatus> {
        let next = self.status?.next()?;
        self.status = Some(next);
        Some(next)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub participants: Vec<Participant>,
    /// Copy of the most recent message
    pub last_message: Option<Message>,
    pub unread_count: u32,
    pub created_at: DateTime<Utc>,
    /// Newest message timestamp, or `created_at` while empty
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: String, participants: Vec<Participant>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            participants,
            last_message: None,
            unread_count: 0,
            created_at,
            updated_at: created_at,
        }
    }

    /// The participant of a one-to-one conversation
    pub fn sole_participant(&self) -> Option<&Participant> {
        match self.participants.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn primary_participant(&self) -> Option<&Participant> {
        self.participants.first()
    }
}

/// One row of the conversation list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub participant_name: String,
    pub participant_title: String,
    /// Preview text of the last message (empty for a new conversation)
    pub last_preview: String,
    pub last_timestamp: DateTime<Utc>,
    pub unread_count: u32,
    pub is_typing: bool,
    pub online: bool,
}

/// Engine events for subscribers (UI, notification collaborator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessengerEvent {
    ConversationCreated { conversation_id: String },
    ConversationDeleted { conversation_id: String },
    /// A message was appended, outbound or inbound
    NewMessage { message: Message },
    StatusChanged {
        conversation_id: String,
        message_id: String,
        status: DeliveryStatus,
    },
    TypingChanged {
        conversation_id: String,
        participant_id: String,
        typing: bool,
    },
    UnreadChanged { total: u32 },
    ViewChanged { view: ViewState },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbound(status: DeliveryStatus) -> Message {
        Message {
            id: "msg_1".to_string(),
            conversation_id: "conv_1".to_string(),
            sender_id: "me".to_string(),
            content: "Hi".to_string(),
            kind: MessageKind::Text,
            timestamp: Utc::now(),
            is_read: true,
            status: Some(status),
        }
    }

    #[test]
    fn test_status_never_skips() {
        let mut msg = outbound(DeliveryStatus::Sent);
        assert_eq!(msg.advance_status(), Some(DeliveryStatus::Delivered));
        assert_eq!(msg.advance_status(), Some(DeliveryStatus::Read));
        assert_eq!(msg.advance_status(), None);
        assert_eq!(msg.status, Some(DeliveryStatus::Read));
    }

    #[test]
    fn test_inbound_has_no_status() {
        let mut msg = outbound(DeliveryStatus::Sent);
        msg.status = None;
        assert_eq!(msg.advance_status(), None);
        assert_eq!(msg.status, None);
    }

    #[test]
    fn test_event_serializes_tagged() {
        let event = MessengerEvent::UnreadChanged { total: 3 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "unread_changed");
        assert_eq!(json["total"], 3);
    }
}
