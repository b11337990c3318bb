/// Configuration management
use crate::error::{MessagingError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MOBILE_BREAKPOINT: u32 = 768;
const DEFAULT_EVENT_CAPACITY: usize = 256;

const DEFAULT_PHRASES: &[&str] = &[
    "Thanks for reaching out!",
    "That sounds great, let's do it.",
    "Let me check and get back to you.",
    "Are you free for a quick call this week?",
    "Looking forward to connecting!",
];

/// Messaging engine configuration
///
/// Every delay and probability here is a tuning knob, not a contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Delay between `sent` and `delivered`
    pub delivery_delay: Duration,

    /// Delay between `delivered` and `read`
    pub read_delay: Duration,

    /// Interval of the presence simulation tick
    pub presence_tick: Duration,

    /// Shortest typing indicator window
    pub typing_min: Duration,

    /// Longest typing indicator window
    pub typing_max: Duration,

    /// Chance per tick of a typing indicator in the active conversation
    pub typing_probability: f64,

    /// Chance per tick of a synthetic inbound message
    pub inbound_probability: f64,

    /// Quiet period before a viewport width is consumed
    pub resize_debounce: Duration,

    /// Widths strictly below this are mobile
    pub mobile_breakpoint: u32,

    /// Seed for the presence RNG (entropy when unset)
    pub rng_seed: Option<u64>,

    /// Buffered events per subscriber before lagging
    pub event_capacity: usize,

    /// Phrase set for synthetic inbound messages
    pub inbound_phrases: Vec<String>,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            delivery_delay: Duration::from_secs(1),
            read_delay: Duration::from_secs(2),
            presence_tick: Duration::from_secs(3),
            typing_min: Duration::from_secs(2),
            typing_max: Duration::from_secs(5),
            typing_probability: 0.3,
            inbound_probability: 0.1,
            resize_debounce: Duration::from_millis(200),
            mobile_breakpoint: DEFAULT_MOBILE_BREAKPOINT,
            rng_seed: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            inbound_phrases: DEFAULT_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl MessagingConfig {
    /// Defaults with `MESSAGING_*` environment overrides
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides resolved through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64, _>(&lookup, "MESSAGING_DELIVERY_DELAY_MS")? {
            config.delivery_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "MESSAGING_READ_DELAY_MS")? {
            config.read_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "MESSAGING_PRESENCE_TICK_MS")? {
            config.presence_tick = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "MESSAGING_TYPING_MIN_MS")? {
            config.typing_min = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "MESSAGING_TYPING_MAX_MS")? {
            config.typing_max = Duration::from_millis(ms);
        }
        if let Some(p) = parse_var::<f64, _>(&lookup, "MESSAGING_TYPING_PROBABILITY")? {
            config.typing_probability = p;
        }
        if let Some(p) = parse_var::<f64, _>(&lookup, "MESSAGING_INBOUND_PROBABILITY")? {
            config.inbound_probability = p;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "MESSAGING_RESIZE_DEBOUNCE_MS")? {
            config.resize_debounce = Duration::from_millis(ms);
        }
        if let Some(w) = parse_var::<u32, _>(&lookup, "MESSAGING_MOBILE_BREAKPOINT")? {
            config.mobile_breakpoint = w;
        }
        if let Some(seed) = parse_var::<u64, _>(&lookup, "MESSAGING_RNG_SEED")? {
            config.rng_seed = Some(seed);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("typing_probability", self.typing_probability),
            ("inbound_probability", self.inbound_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(MessagingError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        if self.typing_min > self.typing_max {
            return Err(MessagingError::Config(format!(
                "typing_min ({:?}) exceeds typing_max ({:?})",
                self.typing_min, self.typing_max
            )));
        }
        if self.presence_tick.is_zero() {
            return Err(MessagingError::Config(
                "presence_tick must be non-zero".to_string(),
            ));
        }
        if self.mobile_breakpoint == 0 {
            return Err(MessagingError::Config(
                "mobile_breakpoint must be non-zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(MessagingError::Config(
                "event_capacity must be non-zero".to_string(),
            ));
        }
        if self.inbound_phrases.is_empty() {
            return Err(MessagingError::Config(
                "inbound_phrases must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| MessagingError::Config(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = MessagingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.delivery_delay, Duration::from_secs(1));
        assert_eq!(config.read_delay, Duration::from_secs(2));
        assert_eq!(config.mobile_breakpoint, 768);
    }

    #[test]
    fn test_overrides_applied() {
        let config = MessagingConfig::from_lookup(lookup_from(&[
            ("MESSAGING_DELIVERY_DELAY_MS", "50"),
            ("MESSAGING_RNG_SEED", "42"),
            ("MESSAGING_INBOUND_PROBABILITY", "1.0"),
        ]))
        .unwrap();
        assert_eq!(config.delivery_delay, Duration::from_millis(50));
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.inbound_probability, 1.0);
    }

    #[test]
    fn test_malformed_override_rejected() {
        let err = MessagingConfig::from_lookup(lookup_from(&[("MESSAGING_READ_DELAY_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, MessagingError::Config(_)));
    }

    #[test]
    fn test_out_of_range_probability_rejected() {
        let err = MessagingConfig::from_lookup(lookup_from(&[(
            "MESSAGING_TYPING_PROBABILITY",
            "1.5",
        )]))
        .unwrap_err();
        assert!(matches!(err, MessagingError::Config(_)));
    }

    #[test]
    fn test_inverted_typing_window_rejected() {
        let config = MessagingConfig {
            typing_min: Duration::from_secs(6),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
