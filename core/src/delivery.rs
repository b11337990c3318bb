/// Drives outbound messages through sent -> delivered -> read.
/// One pending timer per message; each firing moves exactly one step.
use crate::clock::{TimerKey, TimerQueue};
use crate::config::MessagingConfig;
use crate::message_store::MessageStore;
use crate::messenger_types::DeliveryStatus;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DeliveryStatusTracker {
    delivery_delay: Duration,
    read_delay: Duration,
}

impl DeliveryStatusTracker {
    pub fn new(delivery_delay: Duration, read_delay: Duration) -> Self {
        Self {
            delivery_delay,
            read_delay,
        }
    }

    pub fn from_config(config: &MessagingConfig) -> Self {
        Self::new(config.delivery_delay, config.read_delay)
    }

    /// Delay before leaving `status`
    fn delay_from(&self, status: DeliveryStatus) -> Option<Duration> {
        match status {
            DeliveryStatus::Sent => Some(self.delivery_delay),
            DeliveryStatus::Delivered => Some(self.read_delay),
            DeliveryStatus::Read => None,
        }
    }

    /// Schedule the first step for a freshly sent message
    pub fn track(
        &self,
        timers: &mut TimerQueue,
        sent_at: DateTime<Utc>,
        conversation_id: &str,
        message_id: &str,
    ) {
        timers.schedule_after(
            Self::key(conversation_id, message_id),
            sent_at,
            self.delivery_delay,
        );
    }

    /// Handle a fired delivery timer scheduled for `fired_at`.
    /// A message that no longer exists is skipped silently.
    pub fn advance(
        &self,
        messages: &mut MessageStore,
        timers: &mut TimerQueue,
        fired_at: DateTime<Utc>,
        conversation_id: &str,
        message_id: &str,
    ) -> Option<DeliveryStatus> {
        let Some(message) = messages.get_mut(conversation_id, message_id) else {
            debug!("Delivery timer for vanished message {}", message_id);
            return None;
        };
        let status = message.advance_status()?;
        debug!("Message {} is now {:?}", message_id, status);

        if let Some(delay) = self.delay_from(status) {
            timers.schedule_after(Self::key(conversation_id, message_id), fired_at, delay);
        }
        Some(status)
    }

    fn key(conversation_id: &str, message_id: &str) -> TimerKey {
        TimerKey::Delivery {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger_types::{Message, MessageKind};

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000 + ms).unwrap()
    }

    fn setup() -> (DeliveryStatusTracker, MessageStore, TimerQueue) {
        let mut messages = MessageStore::new();
        messages.open_log("conv_1");
        for id in ["m1", "m2"] {
            messages
                .append(Message {
                    id: id.to_string(),
                    conversation_id: "conv_1".to_string(),
                    sender_id: "me".to_string(),
                    content: "Hi".to_string(),
                    kind: MessageKind::Text,
                    timestamp: at(0),
                    is_read: true,
                    status: Some(DeliveryStatus::Sent),
                })
                .unwrap();
        }
        let tracker = DeliveryStatusTracker::new(Duration::from_secs(1), Duration::from_secs(2));
        (tracker, messages, TimerQueue::new())
    }

    fn fire_all(
        tracker: &DeliveryStatusTracker,
        messages: &mut MessageStore,
        timers: &mut TimerQueue,
        now: DateTime<Utc>,
    ) -> Vec<(String, DeliveryStatus)> {
        let mut seen = Vec::new();
        while let Some((fired_at, key)) = timers.pop_due(now) {
            if let TimerKey::Delivery {
                conversation_id,
                message_id,
            } = key
            {
                if let Some(status) =
                    tracker.advance(messages, timers, fired_at, &conversation_id, &message_id)
                {
                    seen.push((message_id, status));
                }
            }
        }
        seen
    }

    #[test]
    fn test_steps_follow_configured_delays() {
        let (tracker, mut messages, mut timers) = setup();
        tracker.track(&mut timers, at(0), "conv_1", "m1");

        assert!(fire_all(&tracker, &mut messages, &mut timers, at(999)).is_empty());
        assert_eq!(
            fire_all(&tracker, &mut messages, &mut timers, at(1000)),
            vec![("m1".to_string(), DeliveryStatus::Delivered)]
        );
        assert!(fire_all(&tracker, &mut messages, &mut timers, at(2999)).is_empty());
        assert_eq!(
            fire_all(&tracker, &mut messages, &mut timers, at(3000)),
            vec![("m1".to_string(), DeliveryStatus::Read)]
        );
        assert!(timers.is_empty());
    }

    #[test]
    fn test_late_firing_still_visits_delivered() {
        let (tracker, mut messages, mut timers) = setup();
        tracker.track(&mut timers, at(0), "conv_1", "m1");

        let steps = fire_all(&tracker, &mut messages, &mut timers, at(10_000));
        assert_eq!(
            steps,
            vec![
                ("m1".to_string(), DeliveryStatus::Delivered),
                ("m1".to_string(), DeliveryStatus::Read),
            ]
        );
    }

    #[test]
    fn test_messages_progress_independently() {
        let (tracker, mut messages, mut timers) = setup();
        tracker.track(&mut timers, at(0), "conv_1", "m1");
        tracker.track(&mut timers, at(500), "conv_1", "m2");

        fire_all(&tracker, &mut messages, &mut timers, at(1200));
        assert_eq!(
            messages.get("conv_1", "m1").unwrap().status,
            Some(DeliveryStatus::Delivered)
        );
        assert_eq!(
            messages.get("conv_1", "m2").unwrap().status,
            Some(DeliveryStatus::Sent)
        );
    }

    #[test]
    fn test_vanished_message_is_noop() {
        let (tracker, mut messages, mut timers) = setup();
        tracker.track(&mut timers, at(0), "conv_1", "m1");
        messages.remove_log("conv_1");

        assert!(fire_all(&tracker, &mut messages, &mut timers, at(5000)).is_empty());
        assert!(timers.is_empty());
    }
}
