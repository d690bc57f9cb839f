//! Configuration module for the broadcast bot.
//!
//! Handles loading and validation of the broadcast file (message and
//! destinations), per-destination intervals, and Telegram API credentials.

mod broadcast;
mod destination;
mod settings;

pub use broadcast::{
    BroadcastConfig, DestinationEntry, MessagePayload, MessageSection, ValidationError,
};
pub use destination::{
    ConfirmedEntry, Destination, DestinationConfig, DestinationParseError,
    build_destination_config,
};
pub use settings::{BotSettings, ConfigError, TelegramConfig};

/// Separator between chat id and topic id in a forum destination (`-100123/5`).
pub const TOPIC_SEPARATOR: char = '/';

/// Default backoff in seconds after a send fails with an unclassified error.
pub const DEFAULT_RETRY_BACKOFF_SECS: u64 = 10;
