/// Clock sources and the timer queue behind every delayed transition
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of "now" for the engine
pub trait ClockSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall time anchored at creation, advanced by the tokio monotonic clock.
/// Under paused tokio time it advances only when the runtime does.
#[derive(Debug, Clone)]
pub struct RuntimeClock {
    origin: tokio::time::Instant,
    origin_wall: DateTime<Utc>,
}

impl RuntimeClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            origin_wall: Utc::now(),
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for RuntimeClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.origin_wall + elapsed
    }
}

/// Virtual clock, only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let ms = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// Identity of a pending timer. At most one timer per key is pending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKey {
    /// Next status step of an outbound message
    Delivery {
        conversation_id: String,
        message_id: String,
    },
    /// Clears a typing indicator
    Typing {
        conversation_id: String,
        participant_id: String,
    },
    /// Recurring presence simulation
    PresenceTick,
    /// Debounced viewport width
    Resize,
}

impl TimerKey {
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            TimerKey::Delivery { conversation_id, .. } | TimerKey::Typing { conversation_id, .. } => {
                Some(conversation_id.as_str())
            }
            TimerKey::PresenceTick | TimerKey::Resize => None,
        }
    }
}

/// Deadline `delay` after `now`, saturating at the end of time
pub fn deadline_after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Pending timers ordered by (deadline, scheduling sequence)
#[derive(Debug, Default)]
pub struct TimerQueue {
    by_deadline: BTreeMap<(DateTime<Utc>, u64), TimerKey>,
    by_key: HashMap<TimerKey, (DateTime<Utc>, u64)>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` at `at`, replacing a pending timer with the same key
    pub fn schedule(&mut self, key: TimerKey, at: DateTime<Utc>) {
        self.cancel(&key);
        let slot = (at, self.next_seq);
        self.next_seq += 1;
        self.by_deadline.insert(slot, key.clone());
        self.by_key.insert(key, slot);
    }

    pub fn schedule_after(&mut self, key: TimerKey, now: DateTime<Utc>, delay: Duration) {
        self.schedule(key, deadline_after(now, delay));
    }

    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        match self.by_key.remove(key) {
            Some(slot) => {
                self.by_deadline.remove(&slot);
                true
            }
            None => false,
        }
    }

    /// Cancel every timer addressed to a conversation, returns how many
    pub fn cancel_conversation(&mut self, conversation_id: &str) -> usize {
        self.cancel_where(|key| key.conversation_id() == Some(conversation_id))
    }

    pub fn cancel_where<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&TimerKey) -> bool,
    {
        let doomed: Vec<TimerKey> = self.by_key.keys().filter(|k| pred(k)).cloned().collect();
        for key in &doomed {
            self.cancel(key);
        }
        doomed.len()
    }

    pub fn clear(&mut self) -> usize {
        let n = self.by_key.len();
        self.by_deadline.clear();
        self.by_key.clear();
        n
    }

    /// Remove and return the earliest timer due at or before `now`,
    /// with the deadline it was scheduled for
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, TimerKey)> {
        let slot = *self.by_deadline.keys().next()?;
        if slot.0 > now {
            return None;
        }
        let key = self.by_deadline.remove(&slot)?;
        self.by_key.remove(&key);
        Some((slot.0, key))
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.by_deadline.keys().next().map(|(at, _)| *at)
    }

    pub fn deadline_of(&self, key: &TimerKey) -> Option<DateTime<Utc>> {
        self.by_key.get(key).map(|(at, _)| *at)
    }

    pub fn contains(&self, key: &TimerKey) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
