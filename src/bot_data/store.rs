//! State store interface and the in-memory implementation

use crate::message::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// ETag that matches any stored version
pub const ANY_ETAG: &str = "*";

/// Scope of a data bag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataScope {
    User,
    Conversation,
    PrivateConversation,
}

/// Key of one bag in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub scope: DataScope,
    pub channel_id: String,
    pub bot_id: String,
    pub user_id: String,
    pub conversation_id: String,
}

impl StateKey {
    pub fn new(scope: DataScope, address: &Address) -> Self {
        Self {
            scope,
            channel_id: address.channel_id.clone(),
            bot_id: address.bot_id.clone(),
            user_id: address.user_id.clone(),
            conversation_id: address.conversation_id.clone(),
        }
    }
}

/// Log form only; ids containing `:` can render identically
impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            DataScope::User => write!(f, "{}:{}:user:{}", self.channel_id, self.bot_id, self.user_id),
            DataScope::Conversation => write!(
                f,
                "{}:{}:conversation:{}",
                self.channel_id, self.bot_id, self.conversation_id
            ),
            DataScope::PrivateConversation => write!(
                f,
                "{}:{}:private:{}:{}",
                self.channel_id, self.bot_id, self.conversation_id, self.user_id
            ),
        }
    }
}

/// A blob as stored, with its current ETag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub etag: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Precondition failed: {key} was modified concurrently")]
    PreconditionFailed { key: String },
    #[error("State store error: {0}")]
    Backend(String),
}

/// External per-scope key/value store with optimistic concurrency
#[async_trait]
pub trait BotStateStore: Send + Sync {
    async fn load(&self, key: &StateKey) -> Result<Option<StoredBlob>, StoreError>;

    /// Write `data` if `etag` still matches.
    ///
    /// `None` only succeeds when nothing is stored yet, `ANY_ETAG`
    /// overwrites unconditionally. Returns the new ETag.
    async fn save(&self, key: &StateKey, data: &[u8], etag: Option<&str>) -> Result<String, StoreError>;
}

#[async_trait]
impl<T: BotStateStore + ?Sized> BotStateStore for Arc<T> {
    async fn load(&self, key: &StateKey) -> Result<Option<StoredBlob>, StoreError> {
        (**self).load(key).await
    }

    async fn save(&self, key: &StateKey, data: &[u8], etag: Option<&str>) -> Result<String, StoreError> {
        (**self).save(key, data, etag).await
    }
}

/// Process-local store, for hosts without a backend and for tests
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    entries: Mutex<HashMap<StateKey, StoredBlob>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BotStateStore for InMemoryStateStore {
    async fn load(&self, key: &StateKey) -> Result<Option<StoredBlob>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn save(&self, key: &StateKey, data: &[u8], etag: Option<&str>) -> Result<String, StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let current = entries.get(key).map(|b| b.etag.as_str());
        let matches = match (etag, current) {
            (Some(ANY_ETAG), _) | (None, None) => true,
            (Some(expected), Some(current)) => expected == current,
            _ => false,
        };
        if !matches {
            tracing::debug!(key = %key, "Rejecting write with stale etag");
            return Err(StoreError::PreconditionFailed { key: key.to_string() });
        }

        let new_etag = uuid::Uuid::new_v4().to_string();
        entries.insert(
            key.clone(),
            StoredBlob {
                data: data.to_vec(),
                etag: new_etag.clone(),
            },
        );
        Ok(new_etag)
    }
}
