/// Conversation list: membership, denormalized last message, unread
/// counters, and the canonical newest-first order
use crate::messenger_types::{Conversation, Message};

#[derive(Debug, Default)]
pub struct ConversationStore {
    /// Always sorted descending by `updated_at`; ties keep insertion order
    conversations: Vec<Conversation>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the head of the list, then restore the ordering
    pub fn insert_front(&mut self, conversation: Conversation) {
        self.conversations.insert(0, conversation);
        self.resort();
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    /// One-to-one conversation with `participant_id`, if any
    pub fn find_by_participant(&self, participant_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| {
            c.sole_participant()
                .map(|p| p.id == participant_id)
                .unwrap_or(false)
        })
    }

    pub fn remove(&mut self, id: &str) -> Option<Conversation> {
        let pos = self.conversations.iter().position(|c| c.id == id)?;
        Some(self.conversations.remove(pos))
    }

    /// Fold `latest` (the newest message of the log) into the conversation.
    /// Returns false when the conversation is unknown.
    pub fn record_message(&mut self, id: &str, latest: &Message, increment_unread: bool) -> bool {
        let Some(conversation) = self.get_mut(id) else {
            return false;
        };
        if increment_unread {
            conversation.unread_count += 1;
        }
        conversation.updated_at = latest.timestamp;
        conversation.last_message = Some(latest.clone());
        self.resort();
        true
    }

    /// Keep the denormalized copy in step with a message that changed in place
    pub fn refresh_last_message(&mut self, id: &str, message: &Message) {
        if let Some(conversation) = self.get_mut(id) {
            if let Some(last) = conversation.last_message.as_mut() {
                if last.id == message.id {
                    *last = message.clone();
                }
            }
        }
    }

    /// Zero the unread counter. Returns true if it was non-zero.
    pub fn clear_unread(&mut self, id: &str, local_user_id: &str) -> bool {
        let Some(conversation) = self.get_mut(id) else {
            return false;
        };
        if let Some(last) = conversation.last_message.as_mut() {
            if last.sender_id != local_user_id {
                last.is_read = true;
            }
        }
        let had_unread = conversation.unread_count > 0;
        conversation.unread_count = 0;
        had_unread
    }

    /// Stable sort, newest first
    pub fn resort(&mut self) {
        self.conversations
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }

    pub fn list(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.iter()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn clear(&mut self) {
        self.conversations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger_types::{MessageKind, Participant};
    use chrono::{DateTime, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn participant(id: &str) -> Participant {
        Participant {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            title: String::new(),
            avatar: String::new(),
            online: true,
        }
    }

    fn inbound(conv: &str, secs: i64) -> Message {
        Message {
            id: format!("msg_{}", secs),
            conversation_id: conv.to_string(),
            sender_id: "usr_1".to_string(),
            content: "hello".to_string(),
            kind: MessageKind::Text,
            timestamp: at(secs),
            is_read: false,
            status: None,
        }
    }

    fn ids(store: &ConversationStore) -> Vec<&str> {
        store.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_newest_first_after_message() {
        let mut store = ConversationStore::new();
        store.insert_front(Conversation::new("a".into(), vec![participant("usr_1")], at(0)));
        store.insert_front(Conversation::new("b".into(), vec![participant("usr_2")], at(1)));
        assert_eq!(ids(&store), vec!["b", "a"]);

        assert!(store.record_message("a", &inbound("a", 5), true));
        assert_eq!(ids(&store), vec!["a", "b"]);

        let a = store.get("a").unwrap();
        assert_eq!(a.updated_at, at(5));
        assert_eq!(a.unread_count, 1);
        assert_eq!(a.last_message.as_ref().unwrap().id, "msg_5");
    }

    #[test]
    fn test_equal_timestamps_keep_relative_order() {
        let mut store = ConversationStore::new();
        store.insert_front(Conversation::new("a".into(), vec![participant("usr_1")], at(0)));
        store.insert_front(Conversation::new("b".into(), vec![participant("usr_2")], at(0)));
        store.insert_front(Conversation::new("c".into(), vec![participant("usr_3")], at(0)));
        store.resort();
        assert_eq!(ids(&store), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_find_by_participant_ignores_groups() {
        let mut store = ConversationStore::new();
        store.insert_front(Conversation::new(
            "group".into(),
            vec![participant("usr_1"), participant("usr_2")],
            at(0),
        ));
        assert!(store.find_by_participant("usr_1").is_none());

        store.insert_front(Conversation::new("dm".into(), vec![participant("usr_1")], at(1)));
        assert_eq!(store.find_by_participant("usr_1").unwrap().id, "dm");
    }

    #[test]
    fn test_clear_unread_marks_copy_read() {
        let mut store = ConversationStore::new();
        store.insert_front(Conversation::new("a".into(), vec![participant("usr_1")], at(0)));
        store.record_message("a", &inbound("a", 1), true);

        assert!(store.clear_unread("a", "me"));
        assert!(!store.clear_unread("a", "me"));
        let a = store.get("a").unwrap();
        assert_eq!(a.unread_count, 0);
        assert!(a.last_message.as_ref().unwrap().is_read);
        assert!(!store.clear_unread("missing", "me"));
    }
}
