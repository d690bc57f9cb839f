//! Broadcast file configuration and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{DestinationConfig, DestinationParseError};

/// Errors that can occur during broadcast configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Destination '{raw}' is malformed: {source}")]
    InvalidDestination {
        raw: String,
        source: DestinationParseError,
    },

    #[error("Destination {destination} has invalid interval: {interval_secs} seconds (must be > 0)")]
    InvalidInterval {
        destination: String,
        interval_secs: u64,
    },

    #[error("Message text is empty")]
    EmptyText,

    #[error("No destinations configured")]
    NoDestinations,

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// The message sent to every destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePayload {
    text: String,
    image_path: Option<PathBuf>,
}

impl MessagePayload {
    /// Creates a payload. The text must not be empty or whitespace only.
    pub fn new(text: impl Into<String>, image_path: Option<PathBuf>) -> Result<Self, ValidationError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyText);
        }
        Ok(Self { text, image_path })
    }

    /// Message text, also used as the image caption.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The configured image path, whether or not the file exists.
    #[must_use]
    pub fn image_path(&self) -> Option<&Path> {
        self.image_path.as_deref()
    }

    /// Returns the image to attach right now, if one is configured and exists on disk.
    ///
    /// Evaluated on every call: the file may appear or disappear between sends.
    pub async fn image_to_send(&self) -> Option<&Path> {
        let path = self.image_path()?;
        let is_file = tokio::fs::metadata(path)
            .await
            .is_ok_and(|meta| meta.is_file());
        is_file.then_some(path)
    }
}

/// Message section of the broadcast file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageSection {
    /// Text to broadcast.
    pub text: String,

    /// Optional image sent with the text as caption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
}

/// A single destination entry with its send interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestinationEntry {
    /// Chat id (`-1001234567890`) or forum topic (`-1001234567890/5`).
    pub destination: String,

    /// Seconds to wait between successful sends.
    pub interval_secs: u64,
}

impl DestinationEntry {
    /// Creates a new destination entry.
    #[must_use]
    pub fn new(destination: impl Into<String>, interval_secs: u64) -> Self {
        Self {
            destination: destination.into(),
            interval_secs,
        }
    }
}

/// Configuration file describing what to broadcast and where.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// The message to send.
    pub message: MessageSection,

    /// Destinations with their individual intervals.
    pub destinations: Vec<DestinationEntry>,
}

impl BroadcastConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ValidationError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the message and every destination.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.message.text.trim().is_empty() {
            return Err(ValidationError::EmptyText);
        }
        if self.destinations.is_empty() {
            return Err(ValidationError::NoDestinations);
        }
        self.validate_all().into_iter().collect()
    }

    /// Returns one validation result per destination entry, in file order.
    #[must_use]
    pub fn validate_all(&self) -> Vec<Result<(), ValidationError>> {
        self.destinations
            .iter()
            .map(|entry| {
                let mut scratch = DestinationConfig::new();
                scratch
                    .insert(&entry.destination, entry.interval_secs)
                    .map(|_| ())
            })
            .collect()
    }

    /// Checks whether the configured image, if any, exists right now.
    ///
    /// Informational only: a missing image degrades the payload to text.
    #[must_use]
    pub fn image_missing(&self) -> bool {
        self.message
            .image_path
            .as_ref()
            .is_some_and(|path| !path.is_file())
    }

    /// Converts the file model into the scheduler inputs.
    ///
    /// Later entries for the same destination override earlier ones.
    pub fn into_parts(self) -> Result<(DestinationConfig, MessagePayload), ValidationError> {
        self.validate()?;

        let payload = MessagePayload::new(self.message.text, self.message.image_path)?;
        let mut destinations = DestinationConfig::new();
        for entry in &self.destinations {
            destinations.insert(&entry.destination, entry.interval_secs)?;
        }

        Ok((destinations, payload))
    }

    /// Returns the number of destination entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    /// Checks if there are no destination entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Creates an example configuration for users to reference.
    #[must_use]
    pub fn example() -> Self {
        Self {
            message: MessageSection {
                text: "Hello! This message is sent automatically.".to_owned(),
                image_path: Some(PathBuf::from("banner.jpg")),
            },
            destinations: vec![
                DestinationEntry::new("-1001234567890", 300),
                DestinationEntry::new("-1009876543210/5", 3600),
                DestinationEntry::new("123456789", 86400),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(text: &str, destinations: Vec<DestinationEntry>) -> BroadcastConfig {
        BroadcastConfig {
            message: MessageSection {
                text: text.to_owned(),
                image_path: None,
            },
            destinations,
        }
    }

    #[test]
    fn test_example_is_valid() {
        assert!(BroadcastConfig::example().validate().is_ok());
    }

    #[test]
    fn test_validation_empty_text() {
        let config = config("   ", vec![DestinationEntry::new("-100", 60)]);
        assert!(matches!(config.validate(), Err(ValidationError::EmptyText)));
    }

    #[test]
    fn test_validation_no_destinations() {
        let config = config("hello", vec![]);
        assert!(matches!(config.validate(), Err(ValidationError::NoDestinations)));
    }

    #[test]
    fn test_validation_zero_interval() {
        let config = config("hello", vec![DestinationEntry::new("-100", 0)]);
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn test_validate_all_reports_each_entry() {
        let config = config(
            "hello",
            vec![
                DestinationEntry::new("-100", 60),
                DestinationEntry::new("-100/abc", 60),
                DestinationEntry::new("200", 0),
            ],
        );
        let results = config.validate_all();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(ValidationError::InvalidDestination { .. })
        ));
        assert!(matches!(
            results[2],
            Err(ValidationError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn test_into_parts_last_write_wins() {
        let config = config(
            "hello",
            vec![
                DestinationEntry::new("-100", 60),
                DestinationEntry::new("-100", 90),
                DestinationEntry::new("-200/7", 30),
            ],
        );
        let (destinations, payload) = config.into_parts().unwrap();
        assert_eq!(destinations.len(), 2);
        assert_eq!(
            destinations.interval(&"-100".parse().unwrap()),
            Some(std::time::Duration::from_secs(90))
        );
        assert_eq!(payload.text(), "hello");
    }

    #[tokio::test]
    async fn test_missing_image_degrades_to_text() {
        let payload =
            MessagePayload::new("hello", Some(PathBuf::from("/definitely/not/here.png"))).unwrap();
        assert!(payload.image_path().is_some());
        assert!(payload.image_to_send().await.is_none());
    }

    #[tokio::test]
    async fn test_existing_image_is_sent() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let payload = MessagePayload::new("hello", Some(file.path().to_path_buf())).unwrap();
        assert_eq!(payload.image_to_send().await, Some(file.path()));

        let path = file.path().to_path_buf();
        drop(file);
        let payload = MessagePayload::new("hello", Some(path)).unwrap();
        assert!(payload.image_to_send().await.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broadcast.json");
        let example = BroadcastConfig::example();
        example.save_to_file(&path).unwrap();
        assert_eq!(BroadcastConfig::load_from_file(&path).unwrap(), example);
    }
}
