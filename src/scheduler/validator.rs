//! Destination validation.
//!
//! Turns a raw identifier into a [`ResolvedTarget`] by parsing it and
//! resolving the chat through the transport. Read-only.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::config::{Destination, DestinationParseError};
use crate::telegram::{EntityHandle, Transport, TransportError};

/// Why a destination cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
    #[error("malformed identifier: {0}")]
    Malformed(#[from] DestinationParseError),

    #[error("cannot resolve chat: {0}")]
    Unresolvable(TransportError),

    #[error("chat is not a forum, topic id cannot be used")]
    NotAForum,
}

/// A destination rejected during validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid destination {raw}: {reason}")]
pub struct InvalidDestination {
    pub raw: String,
    pub reason: InvalidReason,
}

/// A validated destination with its resolved entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget<E> {
    pub destination: Destination,
    pub entity: E,
}

impl<E> ResolvedTarget<E> {
    /// Topic to post into, if the destination is a forum topic.
    #[must_use]
    pub const fn topic_id(&self) -> Option<i32> {
        self.destination.topic_id()
    }
}

/// Validates destinations against the transport.
pub struct ChatValidator<T: Transport> {
    transport: Arc<T>,
}

impl<T: Transport> ChatValidator<T> {
    /// Creates a validator over a shared transport.
    #[must_use]
    pub const fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Parses and resolves a raw identifier (`chat_id` or `chat_id/topic_id`).
    pub async fn validate(&self, raw: &str) -> Result<ResolvedTarget<T::Entity>, InvalidDestination> {
        let destination: Destination = raw.parse().map_err(|e: DestinationParseError| InvalidDestination {
            raw: raw.trim().to_owned(),
            reason: e.into(),
        })?;
        self.validate_destination(destination).await
    }

    /// Resolves an already parsed destination.
    pub async fn validate_destination(
        &self,
        destination: Destination,
    ) -> Result<ResolvedTarget<T::Entity>, InvalidDestination> {
        let invalid = |reason| InvalidDestination {
            raw: destination.to_string(),
            reason,
        };

        let entity = self
            .transport
            .resolve_entity(destination.chat_id())
            .await
            .map_err(|e| invalid(InvalidReason::Unresolvable(e)))?;

        if destination.topic_id().is_some() && !entity.is_forum() {
            return Err(invalid(InvalidReason::NotAForum));
        }

        debug!(destination = %destination, "Destination resolved");
        Ok(ResolvedTarget { destination, entity })
    }
}

impl<T: Transport> std::fmt::Debug for ChatValidator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatValidator").finish_non_exhaustive()
    }
}
