//! Intent classifier interface
//!
//! The classifier itself is an external service; this module only defines
//! the result shape and the async interface the LUIS scorable consumes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRecommendation {
    pub intent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl IntentRecommendation {
    pub fn new(intent: impl Into<String>, score: f64) -> Self {
        Self {
            intent: intent.into(),
            score: Some(score),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecommendation {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LuisResult {
    pub query: String,
    #[serde(default)]
    pub intents: Vec<IntentRecommendation>,
    #[serde(default)]
    pub entities: Vec<EntityRecommendation>,
}

impl LuisResult {
    /// Highest scoring intent; the first one wins ties
    pub fn top_intent(&self) -> Option<&IntentRecommendation> {
        self.intents.iter().fold(None, |best, intent| match best {
            Some(b) if b.score.unwrap_or(0.0) >= intent.score.unwrap_or(0.0) => Some(b),
            _ => Some(intent),
        })
    }

    pub fn entities_of_type<'a>(&'a self, entity_type: &'a str) -> impl Iterator<Item = &'a EntityRecommendation> {
        self.entities.iter().filter(move |e| e.entity_type == entity_type)
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct LuisError {
    pub kind: LuisErrorKind,
    pub message: String,
}

impl LuisError {
    pub fn new(kind: LuisErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LuisErrorKind::Network, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuisErrorKind {
    /// Network issues, timeouts - retryable
    Network,
    /// Rejected subscription key - not retryable
    Auth,
    /// Malformed query - not retryable
    InvalidRequest,
}

impl LuisErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }
}

/// A hosted intent classifier for one model
#[async_trait]
pub trait LuisService: Send + Sync {
    async fn query(&self, text: &str) -> Result<LuisResult, LuisError>;

    /// Model this service classifies against
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: LuisService + ?Sized> LuisService for Arc<T> {
    async fn query(&self, text: &str) -> Result<LuisResult, LuisError> {
        (**self).query(text).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Logging wrapper for classifier services
pub struct LoggingLuisService {
    inner: Arc<dyn LuisService>,
    model_id: String,
}

impl LoggingLuisService {
    pub fn new(inner: Arc<dyn LuisService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LuisService for LoggingLuisService {
    async fn query(&self, text: &str) -> Result<LuisResult, LuisError> {
        let start = std::time::Instant::now();
        let result = self.inner.query(text).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    intents = response.intents.len(),
                    entities = response.entities.len(),
                    top_intent = response.top_intent().map_or("", |i| i.intent.as_str()),
                    "LUIS query completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "LUIS query failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
