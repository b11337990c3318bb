/// Simulated presence: who is online, who is typing, and the periodic
/// tick that fakes typing indicators and inbound messages
use crate::clock::{TimerKey, TimerQueue};
use crate::config::MessagingConfig;
use crate::conversation_store::ConversationStore;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

/// Participant ids currently online. Fixed for the life of a session.
#[derive(Debug, Clone, Default)]
pub struct PresenceSet {
    online: HashSet<String>,
}

impl PresenceSet {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            online: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_online(&self, participant_id: &str) -> bool {
        self.online.contains(participant_id)
    }

    pub fn len(&self) -> usize {
        self.online.len()
    }

    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }
}

/// conversation id -> participants currently typing
#[derive(Debug, Clone, Default)]
pub struct TypingMap {
    entries: HashMap<String, BTreeSet<String>>,
}

impl TypingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the flag changed
    pub fn set(&mut self, conversation_id: &str, participant_id: &str, typing: bool) -> bool {
        if typing {
            self.entries
                .entry(conversation_id.to_string())
                .or_default()
                .insert(participant_id.to_string())
        } else {
            let Some(typists) = self.entries.get_mut(conversation_id) else {
                return false;
            };
            let removed = typists.remove(participant_id);
            if typists.is_empty() {
                self.entries.remove(conversation_id);
            }
            removed
        }
    }

    pub fn is_typing(&self, conversation_id: &str, participant_id: &str) -> bool {
        self.entries
            .get(conversation_id)
            .map(|t| t.contains(participant_id))
            .unwrap_or(false)
    }

    pub fn typing_in(&self, conversation_id: &str) -> Vec<String> {
        self.entries
            .get(conversation_id)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn remove_conversation(&mut self, conversation_id: &str) -> bool {
        self.entries.remove(conversation_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// What a tick decided to do
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceAction {
    Typing {
        conversation_id: String,
        participant_id: String,
        clear_after: Duration,
    },
    Inbound {
        conversation_id: String,
        participant_id: String,
        content: String,
    },
}

pub struct PresenceSimulator {
    rng: StdRng,
    running: bool,
    tick: Duration,
    typing_probability: f64,
    inbound_probability: f64,
    typing_min: Duration,
    typing_max: Duration,
    phrases: Vec<String>,
}

impl PresenceSimulator {
    pub fn from_config(config: &MessagingConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            running: false,
            tick: config.presence_tick,
            typing_probability: config.typing_probability,
            inbound_probability: config.inbound_probability,
            typing_min: config.typing_min,
            typing_max: config.typing_max,
            phrases: config.inbound_phrases.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Schedule the first tick. A second call while running does nothing
    /// and returns false.
    pub fn start(&mut self, timers: &mut TimerQueue, now: DateTime<Utc>) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        timers.schedule_after(TimerKey::PresenceTick, now, self.tick);
        info!("Presence simulation started (tick {:?})", self.tick);
        true
    }

    /// Cancel the tick and every typing-clear timer. Returns timers cancelled.
    pub fn stop(&mut self, timers: &mut TimerQueue) -> usize {
        let cancelled = timers
            .cancel_where(|key| matches!(key, TimerKey::PresenceTick | TimerKey::Typing { .. }));
        if self.running {
            info!("Presence simulation stopped");
        }
        self.running = false;
        cancelled
    }

    /// Run one tick scheduled for `fired_at` and queue the next one
    pub fn tick(
        &mut self,
        timers: &mut TimerQueue,
        fired_at: DateTime<Utc>,
        active_conversation_id: Option<&str>,
        conversations: &ConversationStore,
        presence: &PresenceSet,
    ) -> Vec<PresenceAction> {
        if !self.running {
            return Vec::new();
        }
        timers.schedule_after(TimerKey::PresenceTick, fired_at, self.tick);

        let mut actions = Vec::new();

        if self.rng.gen_bool(self.typing_probability) {
            let target = active_conversation_id
                .and_then(|id| conversations.get(id))
                .and_then(|c| c.primary_participant().map(|p| (c.id.clone(), p.id.clone())))
                .filter(|(_, pid)| presence.is_online(pid));
            if let Some((conversation_id, participant_id)) = target {
                let clear_after = self.typing_window();
                debug!(
                    "{} typing in {} for {:?}",
                    participant_id, conversation_id, clear_after
                );
                actions.push(PresenceAction::Typing {
                    conversation_id,
                    participant_id,
                    clear_after,
                });
            }
        }

        if self.rng.gen_bool(self.inbound_probability) {
            let candidates: Vec<(String, String)> = conversations
                .iter()
                .filter_map(|c| c.primary_participant().map(|p| (c.id.clone(), p.id.clone())))
                .filter(|(_, pid)| presence.is_online(pid))
                .collect();
            if let Some((conversation_id, participant_id)) = candidates.choose(&mut self.rng).cloned()
            {
                if let Some(content) = self.phrases.choose(&mut self.rng).cloned() {
                    actions.push(PresenceAction::Inbound {
                        conversation_id,
                        participant_id,
                        content,
                    });
                }
            }
        }

        actions
    }

    fn typing_window(&mut self) -> Duration {
        let min = self.typing_min.as_millis() as u64;
        let max = self.typing_max.as_millis() as u64;
        Duration::from_millis(self.rng.gen_range(min..=max))
    }
}
