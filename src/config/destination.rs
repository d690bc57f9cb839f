//! Destination identifiers and the per-destination interval map.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use super::{TOPIC_SEPARATOR, ValidationError};

/// Errors produced while parsing a raw destination identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestinationParseError {
    #[error("destination is empty")]
    Empty,

    #[error("expected exactly two parts separated by '/', got {0}")]
    WrongPartCount(usize),

    #[error("chat id '{0}' is not an integer")]
    InvalidChatId(String),

    #[error("topic id '{0}' is not an integer")]
    InvalidTopicId(String),
}

/// A broadcast target: a plain chat or a topic inside a forum.
///
/// Positive chat ids address users, negative ones groups and channels
/// (Bot API style ids, e.g. `-1001234567890`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Destination {
    /// A chat, channel or user.
    Chat(i64),
    /// A topic of a forum-enabled supergroup.
    ForumTopic { chat_id: i64, topic_id: i32 },
}

impl Destination {
    /// Returns the chat id that must be resolved to reach this destination.
    #[must_use]
    pub const fn chat_id(&self) -> i64 {
        match *self {
            Self::Chat(chat_id) | Self::ForumTopic { chat_id, .. } => chat_id,
        }
    }

    /// Returns the topic id, if this destination addresses a forum topic.
    #[must_use]
    pub const fn topic_id(&self) -> Option<i32> {
        match *self {
            Self::Chat(_) => None,
            Self::ForumTopic { topic_id, .. } => Some(topic_id),
        }
    }
}

impl FromStr for Destination {
    type Err = DestinationParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DestinationParseError::Empty);
        }

        if !raw.contains(TOPIC_SEPARATOR) {
            let chat_id = parse_chat_id(raw)?;
            return Ok(Self::Chat(chat_id));
        }

        let parts: Vec<&str> = raw.split(TOPIC_SEPARATOR).collect();
        let [chat, topic] = parts.as_slice() else {
            return Err(DestinationParseError::WrongPartCount(parts.len()));
        };

        let chat_id = parse_chat_id(chat)?;
        let topic_id = topic
            .trim()
            .parse()
            .map_err(|_| DestinationParseError::InvalidTopicId((*topic).to_owned()))?;

        Ok(Self::ForumTopic { chat_id, topic_id })
    }
}

fn parse_chat_id(s: &str) -> Result<i64, DestinationParseError> {
    s.trim()
        .parse()
        .map_err(|_| DestinationParseError::InvalidChatId(s.to_owned()))
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat(chat_id) => write!(f, "{chat_id}"),
            Self::ForumTopic { chat_id, topic_id } => {
                write!(f, "{chat_id}{TOPIC_SEPARATOR}{topic_id}")
            }
        }
    }
}

/// Mapping of destinations to their send interval.
///
/// Built once before scheduling. Inserting the same destination twice keeps
/// the last interval.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationConfig {
    entries: HashMap<Destination, Duration>,
}

impl DestinationConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `raw` and records it with an interval of `interval_secs`.
    ///
    /// Returns the previous interval if the destination was already present.
    pub fn insert(
        &mut self,
        raw: &str,
        interval_secs: u64,
    ) -> Result<Option<Duration>, ValidationError> {
        let destination: Destination =
            raw.parse()
                .map_err(|source| ValidationError::InvalidDestination {
                    raw: raw.trim().to_owned(),
                    source,
                })?;

        if interval_secs == 0 {
            return Err(ValidationError::InvalidInterval {
                destination: destination.to_string(),
                interval_secs,
            });
        }

        Ok(self
            .entries
            .insert(destination, Duration::from_secs(interval_secs)))
    }

    /// Returns the interval configured for `destination`.
    #[must_use]
    pub fn interval(&self, destination: &Destination) -> Option<Duration> {
        self.entries.get(destination).copied()
    }

    /// Iterates over all destinations and their intervals, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Destination, &Duration)> {
        self.entries.iter()
    }

    /// Returns the number of destinations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if there are no destinations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for DestinationConfig {
    type Item = (Destination, Duration);
    type IntoIter = std::collections::hash_map::IntoIter<Destination, Duration>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A destination with the interval the user typed and whether they confirmed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedEntry {
    pub raw: String,
    pub interval_secs: u64,
    pub accepted: bool,
}

impl ConfirmedEntry {
    #[must_use]
    pub fn new(raw: impl Into<String>, interval_secs: u64, accepted: bool) -> Self {
        Self {
            raw: raw.into(),
            interval_secs,
            accepted,
        }
    }
}

/// Builds a [`DestinationConfig`] from interactively confirmed entries.
///
/// Declined entries never reach the map; accepted ones must be valid.
pub fn build_destination_config(
    entries: impl IntoIterator<Item = ConfirmedEntry>,
) -> Result<DestinationConfig, ValidationError> {
    let mut config = DestinationConfig::new();
    for entry in entries.into_iter().filter(|e| e.accepted) {
        config.insert(&entry.raw, entry.interval_secs)?;
    }
    Ok(config)
}
