use super::{Handler, Scorable, ScorableError, TurnScope};
use crate::luis::{IntentRecommendation, LuisResult, LuisService};
use crate::message::Message;
use async_trait::async_trait;
use std::sync::Arc;

/// The best handled intent from one classifier query
#[derive(Debug, Clone, PartialEq)]
pub struct LuisMatch {
    pub intent: IntentRecommendation,
    pub result: LuisResult,
}

/// Routes messages to per-intent handlers using one classifier model.
///
/// Only intents with a registered handler compete; the score is the
/// classifier's confidence in the best of them.
pub struct LuisScorable {
    service: Arc<dyn LuisService>,
    handlers: Vec<(String, Handler<LuisMatch>)>,
}

impl LuisScorable {
    pub fn new(service: Arc<dyn LuisService>) -> Self {
        Self {
            service,
            handlers: Vec::new(),
        }
    }

    #[must_use]
    pub fn on_intent<F>(mut self, intent: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut TurnScope<'_>, &Message, &LuisMatch) -> Result<(), ScorableError> + Send + Sync + 'static,
    {
        self.handlers.push((intent.into(), Arc::new(handler)));
        self
    }

    pub fn model_id(&self) -> &str {
        self.service.model_id()
    }

    fn handler(&self, intent: &str) -> Option<&Handler<LuisMatch>> {
        self.handlers
            .iter()
            .find(|(name, _)| name == intent)
            .map(|(_, h)| h)
    }
}

#[async_trait]
impl Scorable for LuisScorable {
    type State = LuisMatch;

    async fn prepare(&self, item: &Message) -> Result<Option<LuisMatch>, ScorableError> {
        if item.text.trim().is_empty() || self.handlers.is_empty() {
            return Ok(None);
        }
        let result = self.service.query(&item.text).await?;

        let mut best: Option<&IntentRecommendation> = None;
        for intent in result.intents.iter().filter(|i| self.handler(&i.intent).is_some()) {
            let score = intent.score.unwrap_or(0.0);
            if best.map_or(true, |b| score > b.score.unwrap_or(0.0)) {
                best = Some(intent);
            }
        }
        let Some(intent) = best.cloned() else {
            return Ok(None);
        };
        tracing::debug!(
            model = %self.model_id(),
            intent = %intent.intent,
            score = intent.score.unwrap_or(0.0),
            "Best handled intent"
        );
        Ok(Some(LuisMatch { intent, result }))
    }

    fn score(&self, _item: &Message, state: &LuisMatch) -> f64 {
        state.intent.score.unwrap_or(0.0)
    }

    fn post(&self, item: &Message, state: &LuisMatch, scope: &mut TurnScope<'_>) -> Result<(), ScorableError> {
        let handler = self
            .handler(&state.intent.intent)
            .ok_or_else(|| ScorableError::Handler(format!("no handler for intent {}", state.intent.intent)))?;
        handler(scope, item, state)
    }
}
