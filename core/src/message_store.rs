/// Per-conversation message logs, in memory only.
/// Logs are append-only and kept in timestamp order.
use crate::error::{MessagingError, Result};
use crate::messenger_types::Message;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MessageStore {
    logs: HashMap<String, Vec<Message>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty log for a new conversation
    pub fn open_log(&mut self, conversation_id: &str) {
        self.logs.entry(conversation_id.to_string()).or_default();
    }

    /// Append a message. A message older than the tail is placed after the
    /// last entry with an equal or earlier timestamp. Returns false for a
    /// duplicate id.
    pub fn append(&mut self, message: Message) -> Result<bool> {
        let log = self
            .logs
            .get_mut(&message.conversation_id)
            .ok_or_else(|| MessagingError::InvalidConversation(message.conversation_id.clone()))?;

        if log.iter().any(|m| m.id == message.id) {
            return Ok(false);
        }

        let pos = log
            .iter()
            .rposition(|m| m.timestamp <= message.timestamp)
            .map(|i| i + 1)
            .unwrap_or(0);
        log.insert(pos, message);
        Ok(true)
    }

    pub fn latest(&self, conversation_id: &str) -> Option<&Message> {
        self.logs.get(conversation_id).and_then(|log| log.last())
    }

    pub fn get(&self, conversation_id: &str, message_id: &str) -> Option<&Message> {
        self.logs
            .get(conversation_id)?
            .iter()
            .find(|m| m.id == message_id)
    }

    pub fn get_mut(&mut self, conversation_id: &str, message_id: &str) -> Option<&mut Message> {
        self.logs
            .get_mut(conversation_id)?
            .iter_mut()
            .find(|m| m.id == message_id)
    }

    /// Whole log, oldest first (empty for unknown conversations)
    pub fn messages(&self, conversation_id: &str) -> &[Message] {
        self.logs
            .get(conversation_id)
            .map(|log| log.as_slice())
            .unwrap_or(&[])
    }

    /// Flag every message not authored by `local_user_id` as read.
    /// Returns how many flags flipped.
    pub fn mark_as_read(&mut self, conversation_id: &str, local_user_id: &str) -> usize {
        let Some(log) = self.logs.get_mut(conversation_id) else {
            return 0;
        };
        let mut flipped = 0;
        for message in log.iter_mut().filter(|m| m.sender_id != local_user_id) {
            if !message.is_read {
                message.is_read = true;
                flipped += 1;
            }
        }
        flipped
    }

    pub fn remove_log(&mut self, conversation_id: &str) -> Option<Vec<Message>> {
        self.logs.remove(conversation_id)
    }

    pub fn clear(&mut self) {
        self.logs.clear();
    }
}
