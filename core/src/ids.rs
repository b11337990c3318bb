/// Id generation for conversations and messages
use uuid::Uuid;

pub const CONVERSATION_PREFIX: &str = "conv";
pub const MESSAGE_PREFIX: &str = "msg";

pub trait IdGenerator: Send + Sync {
    /// Fresh id of the form `{prefix}_{unique}`
    fn next_id(&mut self, prefix: &str) -> String;
}

/// Random v4 ids
#[derive(Debug, Default, Clone)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&mut self, prefix: &str) -> String {
        format!("{}_{}", prefix, Uuid::new_v4().simple())
    }
}

/// Monotonic counter shared across prefixes
#[derive(Debug, Default, Clone)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next += 1;
        format!("{}_{}", prefix, self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let mut ids = SequentialIds::new();
        assert_eq!(ids.next_id(CONVERSATION_PREFIX), "conv_1");
        assert_eq!(ids.next_id(MESSAGE_PREFIX), "msg_2");
    }

    #[test]
    fn test_uuid_ids_unique() {
        let mut ids = UuidIds;
        let a = ids.next_id(MESSAGE_PREFIX);
        let b = ids.next_id(MESSAGE_PREFIX);
        assert!(a.starts_with("msg_"));
        assert_ne!(a, b);
    }
}
