/// Unread bookkeeping derived from the conversation list
use crate::conversation_store::ConversationStore;
use std::collections::BTreeMap;

/// Snapshot of per-conversation unread counts, rebuilt after every mutation
#[derive(Debug, Default, Clone)]
pub struct UnreadAggregator {
    counts: BTreeMap<String, u32>,
    total: u32,
}

impl UnreadAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from scratch. Returns true if the total changed.
    pub fn recompute(&mut self, conversations: &ConversationStore) -> bool {
        let counts: BTreeMap<String, u32> = conversations
            .iter()
            .filter(|c| c.unread_count > 0)
            .map(|c| (c.id.clone(), c.unread_count))
            .collect();
        let total = counts.values().fold(0u32, |acc, n| acc.saturating_add(*n));
        let changed = total != self.total;
        self.counts = counts;
        self.total = total;
        changed
    }

    pub fn total_unread(&self) -> u32 {
        self.total
    }

    /// Conversations with at least one unread message
    pub fn counts(&self) -> &BTreeMap<String, u32> {
        &self.counts
    }

    pub fn clear(&mut self) {
        self.counts.clear();
        self.total = 0;
    }
}
