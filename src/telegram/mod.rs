//! Telegram client wrapper module.
//!
//! Provides the [`Transport`] port used by the scheduler, its grammers-backed
//! implementation, and the authentication flow.

mod client;
#[cfg(test)]
pub(crate) mod mock;
mod peer_cache;
mod transport;

pub use client::{
    DialogSummary, PeerEntity, PwdToken as PasswordToken, TelegramBot, TelegramError,
    Token as LoginToken, TopicSummary,
};
pub(crate) use client::truncate_for_log;
pub use transport::{EntityHandle, Transport, TransportError};
