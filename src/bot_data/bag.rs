//! Per-scope key/value bag

use super::BotDataError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON key/value store for one scope, with the ETag it was read at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotDataBag {
    values: Map<String, Value>,
    #[serde(skip)]
    etag: Option<String>,
    #[serde(skip)]
    dirty: bool,
}

impl BotDataBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a bag from a stored blob
    pub fn from_blob(blob: &[u8], etag: impl Into<String>) -> Result<Self, BotDataError> {
        let values: Map<String, Value> = serde_json::from_slice(blob)?;
        Ok(Self {
            values,
            etag: Some(etag.into()),
            dirty: false,
        })
    }

    pub fn to_blob(&self) -> Result<Vec<u8>, BotDataError> {
        Ok(serde_json::to_vec(&self.values)?)
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_saved(&mut self, etag: String) {
        self.etag = Some(etag);
        self.dirty = false;
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Read a value; `None` when the key is absent
    pub fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, BotDataError> {
        self.values
            .get(key)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(|e| BotDataError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, BotDataError> {
        Ok(self.try_get(key)?.unwrap_or_default())
    }

    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<(), BotDataError> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.into(), value);
        self.dirty = true;
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.values.remove(key).is_some();
        self.dirty |= removed;
        removed
    }

    pub fn clear(&mut self) {
        if !self.values.is_empty() {
            self.values.clear();
            self.dirty = true;
        }
    }
}
