/// Session-scoped messaging state: constructed at login, consumed at logout
use crate::clock::{ClockSource, TimerKey, TimerQueue};
use crate::config::MessagingConfig;
use crate::conversation_store::ConversationStore;
use crate::delivery::DeliveryStatusTracker;
use crate::directory::{ConnectionsDirectory, LocalUser};
use crate::error::{MessagingError, Result};
use crate::ids::{IdGenerator, CONVERSATION_PREFIX, MESSAGE_PREFIX};
use crate::message_store::MessageStore;
use crate::messenger_types::{
    Conversation, ConversationSummary, DeliveryStatus, Message, MessageKind, MessengerEvent,
    Participant,
};
use crate::presence::{PresenceAction, PresenceSet, PresenceSimulator, TypingMap};
use crate::unread::UnreadAggregator;
use crate::view_mode::{ViewModeCoordinator, ViewState};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// A conversation restored at login
#[derive(Debug, Clone)]
pub struct SeedConversation {
    /// Generated when absent
    pub id: Option<String>,
    pub participant: Participant,
    /// History in any order; sorted by timestamp on load
    pub messages: Vec<Message>,
    /// Defaults to login time
    pub created_at: Option<DateTime<Utc>>,
}

/// Initial state handed to `login`
#[derive(Debug, Clone, Default)]
pub struct SessionBootstrap {
    pub conversations: Vec<SeedConversation>,
    pub online: Vec<String>,
    pub viewport_width: Option<u32>,
}

pub struct MessagingSession {
    user: LocalUser,
    directory: Arc<dyn ConnectionsDirectory>,
    clock: Arc<dyn ClockSource>,
    ids: Box<dyn IdGenerator>,
    conversations: ConversationStore,
    messages: MessageStore,
    delivery: DeliveryStatusTracker,
    presence: PresenceSimulator,
    online: PresenceSet,
    typing: TypingMap,
    unread: UnreadAggregator,
    view: ViewModeCoordinator,
    timers: TimerQueue,
    events: broadcast::Sender<MessengerEvent>,
}

impl MessagingSession {
    /// Validate config, load the bootstrap, start presence simulation
    pub fn login(
        user: LocalUser,
        directory: Arc<dyn ConnectionsDirectory>,
        bootstrap: SessionBootstrap,
        config: MessagingConfig,
        clock: Arc<dyn ClockSource>,
        ids: Box<dyn IdGenerator>,
    ) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity);

        let mut session = Self {
            user,
            directory,
            clock,
            ids,
            conversations: ConversationStore::new(),
            messages: MessageStore::new(),
            delivery: DeliveryStatusTracker::from_config(&config),
            presence: PresenceSimulator::from_config(&config),
            online: PresenceSet::new(bootstrap.online),
            typing: TypingMap::new(),
            unread: UnreadAggregator::new(),
            view: ViewModeCoordinator::from_config(&config),
            timers: TimerQueue::new(),
            events,
        };

        for seed in bootstrap.conversations {
            session.load_seed(seed)?;
        }
        session.unread.recompute(&session.conversations);
        if let Some(width) = bootstrap.viewport_width {
            session.view.apply_width(width);
        }

        let now = session.clock.now();
        session.presence.start(&mut session.timers, now);

        info!(
            "Session started for {} ({} conversations, {} unread)",
            session.user.id,
            session.conversations.len(),
            session.unread.total_unread()
        );
        Ok(session)
    }

    fn load_seed(&mut self, seed: SeedConversation) -> Result<()> {
        let id = match seed.id {
            Some(id) => id,
            None => self.ids.next_id(CONVERSATION_PREFIX),
        };
        if self.conversations.contains(&id) {
            return Err(MessagingError::InvalidConversation(id));
        }
        let mut participant = seed.participant;
        participant.online = self.online.is_online(&participant.id);
        let created_at = seed.created_at.unwrap_or_else(|| self.clock.now());

        self.conversations
            .insert_front(Conversation::new(id.clone(), vec![participant], created_at));
        self.messages.open_log(&id);

        let mut history = seed.messages;
        history.sort_by_key(|m| m.timestamp);
        for mut message in history {
            message.conversation_id = id.clone();
            self.append_and_record(message)?;
        }
        Ok(())
    }

    /// Dispose of the session: stop presence, cancel every timer.
    /// Returns how many timers were still pending.
    pub fn logout(mut self) -> usize {
        self.presence.stop(&mut self.timers);
        let cancelled = self.timers.clear();
        self.typing.clear();
        self.unread.clear();
        self.messages.clear();
        self.conversations.clear();
        info!("Session ended for {}", self.user.id);
        cancelled
    }

    // ─── Conversations ──────────────────────────────────────────────────────

    /// Open (or reopen) the one-to-one conversation with `participant_id`
    /// and make it active
    pub fn start_conversation(&mut self, participant_id: &str) -> Result<String> {
        let mut participant = self
            .directory
            .find(participant_id)
            .ok_or_else(|| MessagingError::UnknownParticipant(participant_id.to_string()))?;

        // Existing conversations are reactivated as-is, unread included
        if let Some(existing) = self.conversations.find_by_participant(participant_id) {
            let id = existing.id.clone();
            if self.view.activate(&id) {
                self.emit_view();
            }
            return Ok(id);
        }

        participant.online = self.online.is_online(&participant.id);
        let id = self.ids.next_id(CONVERSATION_PREFIX);
        let now = self.clock.now();
        self.conversations
            .insert_front(Conversation::new(id.clone(), vec![participant], now));
        self.messages.open_log(&id);
        info!("Conversation {} started with {}", id, participant_id);
        self.emit(MessengerEvent::ConversationCreated {
            conversation_id: id.clone(),
        });

        self.select_conversation(&id)?;
        Ok(id)
    }

    /// Remove a conversation and everything hanging off it.
    /// Unknown ids are ignored; returns whether anything was removed.
    pub fn delete_conversation(&mut self, conversation_id: &str) -> bool {
        if self.conversations.remove(conversation_id).is_none() {
            return false;
        }
        self.messages.remove_log(conversation_id);
        self.typing.remove_conversation(conversation_id);
        let cancelled = self.timers.cancel_conversation(conversation_id);
        info!(
            "Conversation {} deleted ({} timers cancelled)",
            conversation_id, cancelled
        );

        self.emit(MessengerEvent::ConversationDeleted {
            conversation_id: conversation_id.to_string(),
        });
        if self.view.deactivate(conversation_id) {
            self.emit_view();
        }
        self.refresh_unread();
        true
    }

    // ─── Messages ───────────────────────────────────────────────────────────

    /// Send as the local user; delivery progresses on the clock.
    /// Returns the new message id.
    pub fn send_message(
        &mut self,
        conversation_id: &str,
        content: &str,
        kind: MessageKind,
    ) -> Result<String> {
        if !self.conversations.contains(conversation_id) {
            return Err(MessagingError::InvalidConversation(
                conversation_id.to_string(),
            ));
        }
        let now = self.clock.now();
        let message = Message {
            id: self.ids.next_id(MESSAGE_PREFIX),
            conversation_id: conversation_id.to_string(),
            sender_id: self.user.id.clone(),
            content: content.to_string(),
            kind,
            timestamp: now,
            is_read: true,
            status: Some(DeliveryStatus::Sent),
        };
        let message_id = message.id.clone();
        self.add_message(message)?;
        self.delivery
            .track(&mut self.timers, now, conversation_id, &message_id);
        debug!("Message {} sent to {}", message_id, conversation_id);
        Ok(message_id)
    }

    pub fn send_to_active(&mut self, content: &str, kind: MessageKind) -> Result<String> {
        let active = self
            .view
            .active()
            .map(str::to_string)
            .ok_or(MessagingError::NoActiveConversation)?;
        self.send_message(&active, content, kind)
    }

    /// Append a message and update the conversation's bookkeeping.
    /// Returns false if a message with the same id already exists.
    pub fn add_message(&mut self, message: Message) -> Result<bool> {
        if !self.conversations.contains(&message.conversation_id) {
            return Err(MessagingError::InvalidConversation(
                message.conversation_id.clone(),
            ));
        }
        let event = message.clone();
        if !self.append_and_record(message)? {
            return Ok(false);
        }
        self.emit(MessengerEvent::NewMessage { message: event });
        self.refresh_unread();
        Ok(true)
    }

    fn append_and_record(&mut self, message: Message) -> Result<bool> {
        let conversation_id = message.conversation_id.clone();
        let counts_unread = message.sender_id != self.user.id && !message.is_read;
        if !self.messages.append(message)? {
            return Ok(false);
        }
        if let Some(latest) = self.messages.latest(&conversation_id) {
            self.conversations
                .record_message(&conversation_id, latest, counts_unread);
        }
        Ok(true)
    }

    /// Mark every inbound message read. Unknown ids are ignored.
    pub fn mark_as_read(&mut self, conversation_id: &str) -> bool {
        if !self.conversations.contains(conversation_id) {
            return false;
        }
        let flipped = self.messages.mark_as_read(conversation_id, &self.user.id);
        let cleared = self
            .conversations
            .clear_unread(conversation_id, &self.user.id);
        self.refresh_unread();
        flipped > 0 || cleared
    }

    // ─── View mode ──────────────────────────────────────────────────────────

    pub fn select_conversation(&mut self, conversation_id: &str) -> Result<()> {
        if !self.conversations.contains(conversation_id) {
            return Err(MessagingError::InvalidConversation(
                conversation_id.to_string(),
            ));
        }
        let changed = self.view.activate(conversation_id);
        self.mark_as_read(conversation_id);
        if changed {
            self.emit_view();
        }
        Ok(())
    }

    pub fn handle_mobile_back(&mut self) -> bool {
        let changed = self.view.handle_mobile_back();
        if changed {
            self.emit_view();
        }
        changed
    }

    /// Raw viewport signal; consumed after the debounce window
    pub fn viewport_resized(&mut self, width: u32) {
        let now = self.clock.now();
        self.view.viewport_resized(width, &mut self.timers, now);
    }

    // ─── Timers ─────────────────────────────────────────────────────────────

    /// Fire every timer due by now, in clock order. Returns how many fired.
    pub fn run_due(&mut self) -> usize {
        let now = self.clock.now();
        let mut fired = 0;
        while let Some((at, key)) = self.timers.pop_due(now) {
            fired += 1;
            self.fire(at, key);
        }
        fired
    }

    fn fire(&mut self, at: DateTime<Utc>, key: TimerKey) {
        match key {
            TimerKey::Delivery {
                conversation_id,
                message_id,
            } => {
                let step = self.delivery.advance(
                    &mut self.messages,
                    &mut self.timers,
                    at,
                    &conversation_id,
                    &message_id,
                );
                if let Some(status) = step {
                    if let Some(message) = self.messages.get(&conversation_id, &message_id) {
                        self.conversations
                            .refresh_last_message(&conversation_id, message);
                    }
                    self.emit(MessengerEvent::StatusChanged {
                        conversation_id,
                        message_id,
                        status,
                    });
                }
            }
            TimerKey::Typing {
                conversation_id,
                participant_id,
            } => {
                if self.typing.set(&conversation_id, &participant_id, false) {
                    self.emit(MessengerEvent::TypingChanged {
                        conversation_id,
                        participant_id,
                        typing: false,
                    });
                }
            }
            TimerKey::PresenceTick => {
                let actions = self.presence.tick(
                    &mut self.timers,
                    at,
                    self.view.active(),
                    &self.conversations,
                    &self.online,
                );
                for action in actions {
                    self.apply_presence(at, action);
                }
            }
            TimerKey::Resize => {
                if self.view.apply_pending() {
                    self.emit_view();
                }
            }
        }
    }

    fn apply_presence(&mut self, at: DateTime<Utc>, action: PresenceAction) {
        match action {
            PresenceAction::Typing {
                conversation_id,
                participant_id,
                clear_after,
            } => {
                self.timers.schedule_after(
                    TimerKey::Typing {
                        conversation_id: conversation_id.clone(),
                        participant_id: participant_id.clone(),
                    },
                    at,
                    clear_after,
                );
                if self.typing.set(&conversation_id, &participant_id, true) {
                    self.emit(MessengerEvent::TypingChanged {
                        conversation_id,
                        participant_id,
                        typing: true,
                    });
                }
            }
            PresenceAction::Inbound {
                conversation_id,
                participant_id,
                content,
            } => {
                let message = Message {
                    id: self.ids.next_id(MESSAGE_PREFIX),
                    conversation_id,
                    sender_id: participant_id,
                    content,
                    kind: MessageKind::Text,
                    timestamp: at,
                    is_read: false,
                    status: None,
                };
                if let Err(e) = self.add_message(message) {
                    warn!("Dropped synthetic message: {}", e);
                }
            }
        }
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn has_timer(&self, key: &TimerKey) -> bool {
        self.timers.contains(key)
    }

    // ─── Read accessors ─────────────────────────────────────────────────────

    pub fn user(&self) -> &LocalUser {
        &self.user
    }

    /// Newest first
    pub fn conversations(&self) -> &[Conversation] {
        self.conversations.list()
    }

    pub fn conversation(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.get(conversation_id)
    }

    pub fn messages(&self, conversation_id: &str) -> &[Message] {
        self.messages.messages(conversation_id)
    }

    pub fn message(&self, conversation_id: &str, message_id: &str) -> Option<&Message> {
        self.messages.get(conversation_id, message_id)
    }

    pub fn view_state(&self) -> &ViewState {
        self.view.state()
    }

    pub fn typing_in(&self, conversation_id: &str) -> Vec<String> {
        self.typing.typing_in(conversation_id)
    }

    pub fn is_online(&self, participant_id: &str) -> bool {
        self.online.is_online(participant_id)
    }

    pub fn presence_running(&self) -> bool {
        self.presence.is_running()
    }

    /// Polled by the notification collaborator
    pub fn total_unread(&self) -> u32 {
        self.unread.total_unread()
    }

    pub fn unread_counts(&self) -> &BTreeMap<String, u32> {
        self.unread.counts()
    }

    pub fn conversation_summaries(&self) -> Vec<ConversationSummary> {
        self.conversations
            .iter()
            .map(|c| self.summarize(c))
            .collect()
    }

    /// Case-insensitive match on participant name or title, list order kept
    pub fn search_conversations(&self, query: &str) -> Vec<&Conversation> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.conversations.iter().collect();
        }
        self.conversations
            .iter()
            .filter(|c| {
                c.participants.iter().any(|p| {
                    p.display_name.to_lowercase().contains(&needle)
                        || p.title.to_lowercase().contains(&needle)
                })
            })
            .collect()
    }

    fn summarize(&self, conversation: &Conversation) -> ConversationSummary {
        let participant = conversation.primary_participant();
        ConversationSummary {
            conversation_id: conversation.id.clone(),
            participant_name: participant
                .map(|p| p.display_name.clone())
                .unwrap_or_default(),
            participant_title: participant.map(|p| p.title.clone()).unwrap_or_default(),
            last_preview: conversation
                .last_message
                .as_ref()
                .map(|m| m.content.clone())
                .unwrap_or_default(),
            last_timestamp: conversation.updated_at,
            unread_count: conversation.unread_count,
            is_typing: participant
                .map(|p| self.typing.is_typing(&conversation.id, &p.id))
                .unwrap_or(false),
            online: participant
                .map(|p| self.online.is_online(&p.id))
                .unwrap_or(false),
        }
    }

    // ─── Events ─────────────────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<MessengerEvent> {
        self.events.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<MessengerEvent> {
        self.events.clone()
    }

    fn emit(&self, event: MessengerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn emit_view(&self) {
        self.emit(MessengerEvent::ViewChanged {
            view: self.view.state().clone(),
        });
    }

    fn refresh_unread(&mut self) {
        if self.unread.recompute(&self.conversations) {
            self.emit(MessengerEvent::UnreadChanged {
                total: self.unread.total_unread(),
            });
        }
    }
}
