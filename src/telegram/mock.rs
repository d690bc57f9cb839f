//! Scripted in-memory transport for scheduler tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{EntityHandle, Transport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockEntity {
    pub chat_id: i64,
    pub forum: bool,
}

impl EntityHandle for MockEntity {
    fn is_forum(&self) -> bool {
        self.forum
    }
}

/// One recorded send attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub chat_id: i64,
    pub topic_id: Option<i32>,
    pub text: String,
    pub image: Option<PathBuf>,
    pub at: Instant,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    chats: HashMap<i64, MockEntity>,
    hanging: HashSet<i64>,
    panicking: HashSet<i64>,
    scripts: Mutex<HashMap<i64, VecDeque<Result<(), TransportError>>>>,
    resolves: Mutex<Vec<i64>>,
    attempts: Mutex<Vec<Attempt>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chat(mut self, chat_id: i64, forum: bool) -> Self {
        self.chats.insert(chat_id, MockEntity { chat_id, forum });
        self
    }

    /// Queues results for the next sends to `chat_id`; once drained, sends succeed.
    pub fn with_script(
        self,
        chat_id: i64,
        results: impl IntoIterator<Item = Result<(), TransportError>>,
    ) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(chat_id)
            .or_default()
            .extend(results);
        self
    }

    /// Sends to `chat_id` never complete.
    pub fn with_hanging_sends(mut self, chat_id: i64) -> Self {
        self.hanging.insert(chat_id);
        self
    }

    /// Sends to `chat_id` panic after being recorded.
    pub fn with_panicking_sends(mut self, chat_id: i64) -> Self {
        self.panicking.insert(chat_id);
        self
    }

    pub fn resolves(&self) -> Vec<i64> {
        self.resolves.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, chat_id: i64) -> Vec<Attempt> {
        self.attempts()
            .into_iter()
            .filter(|a| a.chat_id == chat_id)
            .collect()
    }

    async fn record(
        &self,
        entity: &MockEntity,
        text: &str,
        image: Option<&Path>,
        topic_id: Option<i32>,
    ) -> Result<(), TransportError> {
        self.attempts.lock().unwrap().push(Attempt {
            chat_id: entity.chat_id,
            topic_id,
            text: text.to_owned(),
            image: image.map(Path::to_path_buf),
            at: Instant::now(),
        });

        if self.panicking.contains(&entity.chat_id) {
            panic!("send to {} blew up", entity.chat_id);
        }

        if self.hanging.contains(&entity.chat_id) {
            std::future::pending::<()>().await;
        }

        self.scripts
            .lock()
            .unwrap()
            .get_mut(&entity.chat_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(()))
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Entity = MockEntity;

    async fn resolve_entity(&self, chat_id: i64) -> Result<MockEntity, TransportError> {
        self.resolves.lock().unwrap().push(chat_id);
        self.chats
            .get(&chat_id)
            .cloned()
            .ok_or(TransportError::NotFound(chat_id))
    }

    async fn send_text(
        &self,
        entity: &MockEntity,
        text: &str,
        topic_id: Option<i32>,
    ) -> Result<(), TransportError> {
        self.record(entity, text, None, topic_id).await
    }

    async fn send_file(
        &self,
        entity: &MockEntity,
        path: &Path,
        caption: &str,
        topic_id: Option<i32>,
    ) -> Result<(), TransportError> {
        self.record(entity, caption, Some(path), topic_id).await
    }
}
