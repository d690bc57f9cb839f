//! Broadcast User Bot Library
//!
//! A Telegram userbot that periodically broadcasts a message to chats and
//! forum topics.
//!
//! This crate provides the core functionality for:
//! - Loading and validating broadcast configurations
//! - Connecting to Telegram via `MTProto`
//! - Validating destinations (chats and `chat/topic` pairs)
//! - Sending to every destination on its own interval, with rate-limit
//!   handling and per-destination failure isolation

pub mod config;
pub mod scheduler;
pub mod telegram;
