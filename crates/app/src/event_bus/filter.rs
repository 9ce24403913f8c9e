//! Ready-made event filters.

use regex::Regex;

use hubcore_domain::error::ConfigurationError;
use hubcore_domain::event::Event;

/// Predicate evaluated before an event is handed to a subscriber.
pub trait EventFilter: Send + Sync {
    fn apply(&self, event: &Event) -> bool;
}

/// Accepts events whose whole topic matches a pattern.
#[derive(Debug, Clone)]
pub struct TopicFilter {
    regex: Regex,
}

impl TopicFilter {
    /// Filter on a glob: `*` matches any run of characters (slashes
    /// included), `?` matches exactly one character, everything else is
    /// literal.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPattern`] when the translated
    /// pattern cannot be compiled.
    pub fn new(glob: &str) -> Result<Self, ConfigurationError> {
        let mut pattern = String::with_capacity(glob.len() + 2);
        let mut literal = [0u8; 4];
        for c in glob.chars() {
            match c {
                '*' => pattern.push_str(".*"),
                '?' => pattern.push('.'),
                c => pattern.push_str(&regex::escape(c.encode_utf8(&mut literal))),
            }
        }
        let regex = Regex::new(&format!("^(?s:{pattern})$")).map_err(|err| {
            ConfigurationError::InvalidPattern {
                pattern: glob.to_string(),
                reason: err.to_string(),
            }
        })?;
        Ok(Self { regex })
    }

    /// Whether `topic` matches.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        self.regex.is_match(topic)
    }
}

impl EventFilter for TopicFilter {
    fn apply(&self, event: &Event) -> bool {
        self.matches(&event.topic)
    }
}
