//! Telegram client wrapper for broadcasting messages.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use grammers_client::client::{LoginToken, PasswordToken};
use grammers_client::message::InputMessage;
use grammers_client::peer::{Peer, PeerRef};
use grammers_client::{sender, Client, InvocationError, SenderPool, SignInError};
use grammers_session::storages::SqliteSession;
use grammers_tl_types as tl;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::peer_cache::PeerCache;
use super::{EntityHandle, Transport, TransportError};
use crate::config::TelegramConfig;

/// Re-export types for external use.
pub use grammers_client::client::{LoginToken as Token, PasswordToken as PwdToken};

/// Maximum number of forum topics fetched per chat when listing dialogs.
const FORUM_TOPICS_LIMIT: i32 = 100;

/// Errors that can occur while connecting or signing in.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Password required for 2FA")]
    PasswordRequired(PasswordToken),

    #[error("Invalid password")]
    InvalidPassword(PasswordToken),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<InvocationError> for TransportError {
    fn from(err: InvocationError) -> Self {
        match err {
            InvocationError::Rpc(rpc) => Self::from_rpc(rpc.code, &rpc.name, rpc.value),
            other => Self::Other(other.to_string()),
        }
    }
}

/// A chat resolved from the account's dialogs.
#[derive(Debug, Clone)]
pub struct PeerEntity {
    /// Bot API style id (`-100...` for channels and supergroups).
    pub chat_id: i64,

    /// Display title of the chat.
    pub title: String,

    forum: bool,
    peer: PeerRef,
}

impl EntityHandle for PeerEntity {
    fn is_forum(&self) -> bool {
        self.forum
    }
}

/// A forum topic, as reported by the chat listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSummary {
    pub id: i32,
    pub title: String,
}

/// One line of the chat listing report.
#[derive(Debug, Clone)]
pub struct DialogSummary {
    pub chat_id: i64,
    pub title: String,
    pub is_forum: bool,
    pub topics: Vec<TopicSummary>,
}

/// High-level Telegram client wrapper.
pub struct TelegramBot {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Resolved chats by Bot API id, filled on each dialog scan.
    peer_cache: PeerCache<PeerEntity>,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramBot {
    /// Connects to Telegram with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if connection fails.
    pub async fn connect(config: &TelegramConfig) -> Result<Self, TelegramError> {
        info!("Connecting to Telegram...");

        let session = Arc::new(
            SqliteSession::open(&config.session_path)
                .await
                .map_err(|e| TelegramError::Session(e.to_string()))?,
        );

        let SenderPool {
            runner,
            updates: _updates,
            handle,
        } = SenderPool::new(Arc::clone(&session), config.api_id);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        let is_authorized = client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))?;

        info!("Connected to Telegram. Authorized: {}", is_authorized);

        Ok(Self {
            client,
            handle: handle.thin,
            peer_cache: PeerCache::new(),
            _pool_task: pool_task,
        })
    }

    /// Checks if the client is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Requests a login code to be sent to the phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn request_login_code(
        &self,
        phone: &str,
        api_hash: &str,
    ) -> Result<LoginToken, TelegramError> {
        info!("Requesting login code for phone: {}...", mask_phone(phone));

        self.client
            .request_login_code(phone, api_hash)
            .await
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))
    }

    /// Signs in with the login code.
    ///
    /// # Errors
    ///
    /// Returns an error if sign in fails.
    pub async fn sign_in(&self, token: &LoginToken, code: &str) -> Result<(), TelegramError> {
        info!("Signing in with login code...");

        match self.client.sign_in(token, code).await {
            Ok(_user) => {
                info!("Successfully signed in!");
                Ok(())
            }
            Err(SignInError::PasswordRequired(password_token)) => {
                debug!(
                    "2FA password required, hint: {:?}",
                    password_token.hint()
                );
                Err(TelegramError::PasswordRequired(password_token))
            }
            Err(SignInError::InvalidCode) => {
                Err(TelegramError::SignInFailed("Invalid code".to_owned()))
            }
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Checks the 2FA password.
    ///
    /// # Errors
    ///
    /// Returns an error if the password is invalid.
    pub async fn check_password(
        &self,
        password_token: PasswordToken,
        password: &str,
    ) -> Result<(), TelegramError> {
        info!("Checking 2FA password...");

        match self.client.check_password(password_token, password).await {
            Ok(_user) => {
                info!("Successfully authenticated with 2FA!");
                Ok(())
            }
            Err(SignInError::InvalidPassword(token)) => Err(TelegramError::InvalidPassword(token)),
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Lists every dialog, with the topics of forum-enabled chats.
    ///
    /// A failure to fetch one chat's topics is logged and leaves its topic list empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the dialog list cannot be fetched.
    pub async fn list_dialogs(&self) -> Result<Vec<DialogSummary>, TelegramError> {
        let entities = self.scan_dialogs().await?;
        self.peer_cache
            .extend(entities.iter().map(|entity| (entity.chat_id, entity.clone())))
            .await;

        let mut summaries = Vec::with_capacity(entities.len());

        for entity in entities {
            let topics = if entity.forum {
                match self.forum_topics(&entity).await {
                    Ok(topics) => topics,
                    Err(e) => {
                        warn!("Error fetching topics for {}: {}", entity.title, e);
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };

            summaries.push(DialogSummary {
                chat_id: entity.chat_id,
                title: entity.title,
                is_forum: entity.forum,
                topics,
            });
        }

        Ok(summaries)
    }

    /// Walks all dialogs and returns them in dialog order.
    async fn scan_dialogs(&self) -> Result<Vec<PeerEntity>, TransportError> {
        debug!("Scanning dialogs...");

        let mut dialogs = self.client.iter_dialogs();
        let mut entities = Vec::new();

        while let Some(dialog) = dialogs.next().await? {
            let peer = dialog.peer();
            let chat_id = peer.id().bot_api_dialog_id();
            let Some(peer_ref) = peer.to_ref().await else {
                debug!("Peer {} not in session cache, skipping", chat_id);
                continue;
            };

            entities.push(PeerEntity {
                chat_id,
                title: peer
                    .name()
                    .map_or_else(|| chat_id.to_string(), String::from),
                forum: peer_is_forum(peer),
                peer: peer_ref,
            });
        }

        debug!("Scanned {} dialogs", entities.len());
        Ok(entities)
    }

    /// Fetches the topics of a forum-enabled chat.
    async fn forum_topics(&self, entity: &PeerEntity) -> Result<Vec<TopicSummary>, TransportError> {
        let input_peer: tl::enums::InputPeer = entity.peer.clone().into();
        let channel = match input_peer {
            tl::enums::InputPeer::Channel(c) => {
                tl::enums::InputChannel::Channel(tl::types::InputChannel {
                    channel_id: c.channel_id,
                    access_hash: c.access_hash,
                })
            }
            _ => return Err(TransportError::InvalidPeer(format!("{} is not a channel", entity.chat_id))),
        };

        let request = tl::functions::channels::GetForumTopics {
            channel,
            q: None,
            offset_date: 0,
            offset_id: 0,
            offset_topic: 0,
            limit: FORUM_TOPICS_LIMIT,
        };

        let tl::enums::messages::ForumTopics::Topics(result) = self.client.invoke(&request).await?;

        Ok(result
            .topics
            .into_iter()
            .filter_map(|topic| match topic {
                tl::enums::ForumTopic::Topic(t) => Some(TopicSummary {
                    id: t.id,
                    title: t.title,
                }),
                tl::enums::ForumTopic::Deleted(_) => None,
            })
            .collect())
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        info!("Disconnecting from Telegram...");
        self.handle.quit();
    }
}

#[async_trait]
impl Transport for TelegramBot {
    type Entity = PeerEntity;

    async fn resolve_entity(&self, chat_id: i64) -> Result<PeerEntity, TransportError> {
        self.peer_cache
            .resolve(chat_id, || async {
                self.scan_dialogs().await.map(|entities| {
                    entities
                        .into_iter()
                        .map(|entity| (entity.chat_id, entity))
                        .collect::<Vec<_>>()
                })
            })
            .await
    }

    async fn send_text(
        &self,
        entity: &PeerEntity,
        text: &str,
        topic_id: Option<i32>,
    ) -> Result<(), TransportError> {
        debug!("Sending text to {}: \"{}\"", entity.chat_id, truncate_for_log(text, 30));

        let message = InputMessage::new().text(text).reply_to(topic_id);
        self.client.send_message(entity.peer.clone(), message).await?;
        Ok(())
    }

    async fn send_file(
        &self,
        entity: &PeerEntity,
        path: &Path,
        caption: &str,
        topic_id: Option<i32>,
    ) -> Result<(), TransportError> {
        debug!("Uploading {} for {}", path.display(), entity.chat_id);

        let uploaded = self
            .client
            .upload_file(path)
            .await
            .map_err(|e| TransportError::Other(format!("upload of {} failed: {e}", path.display())))?;

        let message = InputMessage::new()
            .text(caption)
            .reply_to(topic_id)
            .photo(uploaded);
        self.client.send_message(entity.peer.clone(), message).await?;
        Ok(())
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot").finish_non_exhaustive()
    }
}

/// Whether a peer is a supergroup with topics enabled.
fn peer_is_forum(peer: &Peer) -> bool {
    match peer {
        Peer::Group(group) => matches!(&group.raw, tl::enums::Chat::Channel(c) if c.forum),
        Peer::Channel(channel) => channel.raw.forum,
        Peer::User(_) => false,
    }
}

/// Masks a phone number for logging (shows last 4 digits).
fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() > 4 {
        format!("***{}", &digits[digits.len() - 4..])
    } else {
        "****".to_owned()
    }
}

/// Truncates a string for logging purposes.
pub(crate) fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}
