//! Per-user, per-conversation and private conversation state
//!
//! Bags are read at the start of a turn and written back at the end with the
//! ETag they were read at. A concurrent writer makes the save fail; the
//! caller re-reads and retries.

mod bag;
mod store;

pub use bag::BotDataBag;
pub use store::{BotStateStore, DataScope, InMemoryStateStore, StateKey, StoreError, StoredBlob, ANY_ETAG};

use crate::fiber::Fault;
use crate::message::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotDataError {
    #[error("Invalid bot data: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Value for {key} has the wrong shape: {message}")]
    InvalidValue { key: String, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<BotDataError> for Fault {
    fn from(e: BotDataError) -> Self {
        Fault::data(e.to_string())
    }
}

/// The three bags visible to dialog code
#[derive(Debug, Clone, Default)]
pub struct BotData {
    pub user: BotDataBag,
    pub conversation: BotDataBag,
    pub private_conversation: BotDataBag,
}

impl BotData {
    pub fn bag_mut(&mut self, scope: DataScope) -> &mut BotDataBag {
        match scope {
            DataScope::User => &mut self.user,
            DataScope::Conversation => &mut self.conversation,
            DataScope::PrivateConversation => &mut self.private_conversation,
        }
    }

    /// Load all three bags for `address`
    pub async fn load<S: BotStateStore + ?Sized>(store: &S, address: &Address) -> Result<Self, BotDataError> {
        let mut data = BotData::default();
        for scope in [DataScope::User, DataScope::Conversation, DataScope::PrivateConversation] {
            let key = StateKey::new(scope, address);
            if let Some(blob) = store.load(&key).await? {
                *data.bag_mut(scope) = BotDataBag::from_blob(&blob.data, blob.etag)?;
            }
        }
        Ok(data)
    }

    /// Save every modified bag, checking the ETag each was read at
    pub async fn flush<S: BotStateStore + ?Sized>(&mut self, store: &S, address: &Address) -> Result<(), BotDataError> {
        for scope in [DataScope::User, DataScope::Conversation, DataScope::PrivateConversation] {
            let bag = self.bag_mut(scope);
            if !bag.is_dirty() {
                continue;
            }
            let key = StateKey::new(scope, address);
            let blob = bag.to_blob()?;
            let etag = store.save(&key, &blob, bag.etag()).await?;
            tracing::debug!(key = %key, bytes = blob.len(), "Saved bot data");
            bag.mark_saved(etag);
        }
        Ok(())
    }
}
