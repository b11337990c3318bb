/// Mobile/desktop layout flags and the active conversation
use crate::clock::{TimerKey, TimerQueue};
use crate::config::MessagingConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Off mobile the list is always shown; on mobile it is shown iff no
/// conversation is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub is_mobile: bool,
    pub show_conversation_list: bool,
    pub active_conversation_id: Option<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            is_mobile: false,
            show_conversation_list: true,
            active_conversation_id: None,
        }
    }
}

#[derive(Debug)]
pub struct ViewModeCoordinator {
    state: ViewState,
    breakpoint: u32,
    debounce: Duration,
    pending_width: Option<u32>,
    width: Option<u32>,
}

impl ViewModeCoordinator {
    pub fn new(breakpoint: u32, debounce: Duration) -> Self {
        Self {
            state: ViewState::default(),
            breakpoint,
            debounce,
            pending_width: None,
            width: None,
        }
    }

    pub fn from_config(config: &MessagingConfig) -> Self {
        Self::new(config.mobile_breakpoint, config.resize_debounce)
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn active(&self) -> Option<&str> {
        self.state.active_conversation_id.as_deref()
    }

    pub fn is_mobile(&self) -> bool {
        self.state.is_mobile
    }

    /// Last width actually consumed
    pub fn width(&self) -> Option<u32> {
        self.width
    }

    /// Record a raw width; it is consumed once the debounce window passes
    /// without another resize
    pub fn viewport_resized(&mut self, width: u32, timers: &mut TimerQueue, now: DateTime<Utc>) {
        self.pending_width = Some(width);
        timers.schedule_after(TimerKey::Resize, now, self.debounce);
    }

    /// Consume the debounced width. Returns true if the view changed.
    pub fn apply_pending(&mut self) -> bool {
        match self.pending_width.take() {
            Some(width) => self.apply_width(width),
            None => false,
        }
    }

    /// Consume a width immediately. Returns true if the view changed.
    pub fn apply_width(&mut self, width: u32) -> bool {
        self.width = Some(width);
        let is_mobile = width < self.breakpoint;
        if is_mobile != self.state.is_mobile {
            debug!(
                "Viewport {} -> {}",
                width,
                if is_mobile { "mobile" } else { "desktop" }
            );
        }
        self.update(|state| state.is_mobile = is_mobile)
    }

    /// Make `conversation_id` active; hides the list on mobile
    pub fn activate(&mut self, conversation_id: &str) -> bool {
        self.update(|state| state.active_conversation_id = Some(conversation_id.to_string()))
    }

    /// Back navigation, mobile only
    pub fn handle_mobile_back(&mut self) -> bool {
        if !self.state.is_mobile {
            return false;
        }
        self.update(|state| state.active_conversation_id = None)
    }

    /// Drop the active conversation if it is `conversation_id`
    pub fn deactivate(&mut self, conversation_id: &str) -> bool {
        if self.active() != Some(conversation_id) {
            return false;
        }
        self.update(|state| state.active_conversation_id = None)
    }

    fn update<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut ViewState),
    {
        let before = self.state.clone();
        f(&mut self.state);
        self.state.show_conversation_list =
            !self.state.is_mobile || self.state.active_conversation_id.is_none();
        self.state != before
    }
}
