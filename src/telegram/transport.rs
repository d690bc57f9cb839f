//! Transport port used by the dispatch scheduler.
//!
//! The scheduler only needs to resolve chats and send messages; everything
//! else (connection, sign-in) stays on the concrete client.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Categorized errors surfaced by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    #[error("Not allowed to write here: {0}")]
    Forbidden(String),

    #[error("Banned from this chat: {0}")]
    Banned(String),

    #[error("Invalid peer: {0}")]
    InvalidPeer(String),

    #[error("Chat {0} not found among dialogs")]
    NotFound(i64),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether no further attempt should be made for the affected destination.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Forbidden(_) | Self::Banned(_) | Self::InvalidPeer(_)
        )
    }

    /// Maps an RPC error (code, name, numeric value) to a category.
    ///
    /// `name` is the Telegram error name without its numeric suffix
    /// (`FLOOD_WAIT`, not `FLOOD_WAIT_30`).
    #[must_use]
    pub fn from_rpc(code: i32, name: &str, value: Option<u32>) -> Self {
        if code == 420 || matches!(name, "FLOOD_WAIT" | "SLOWMODE_WAIT" | "FLOOD_PREMIUM_WAIT") {
            return Self::RateLimited(value.unwrap_or(60));
        }

        let detail = format!("{name} ({code})");
        match name {
            "CHAT_WRITE_FORBIDDEN" | "CHAT_ADMIN_REQUIRED" | "CHAT_RESTRICTED" | "TOPIC_CLOSED" => {
                Self::Forbidden(detail)
            }
            n if n.starts_with("CHAT_SEND_") && n.ends_with("_FORBIDDEN") => Self::Forbidden(detail),
            "USER_BANNED_IN_CHANNEL" | "CHANNEL_PRIVATE" | "USER_DEACTIVATED_BAN"
            | "USER_IS_BLOCKED" => Self::Banned(detail),
            "PEER_ID_INVALID" | "CHANNEL_INVALID" | "CHAT_ID_INVALID" | "TOPIC_ID_INVALID"
            | "INPUT_USER_DEACTIVATED" => Self::InvalidPeer(detail),
            _ => Self::Other(detail),
        }
    }
}

/// Opaque handle to a resolved chat, channel or user.
pub trait EntityHandle: fmt::Debug + Clone + Send + Sync + 'static {
    /// Whether the entity is a forum-enabled supergroup that has topics.
    fn is_forum(&self) -> bool;
}

/// Messaging capability shared by all senders of one session.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Resolved chat handle produced by [`Transport::resolve_entity`].
    type Entity: EntityHandle;

    /// Resolves a Bot API style chat id into an entity handle.
    async fn resolve_entity(&self, chat_id: i64) -> Result<Self::Entity, TransportError>;

    /// Sends a plain text message, optionally into a forum topic.
    async fn send_text(
        &self,
        entity: &Self::Entity,
        text: &str,
        topic_id: Option<i32>,
    ) -> Result<(), TransportError>;

    /// Uploads `path` and sends it with `caption`, optionally into a forum topic.
    async fn send_file(
        &self,
        entity: &Self::Entity,
        path: &Path,
        caption: &str,
        topic_id: Option<i32>,
    ) -> Result<(), TransportError>;
}
