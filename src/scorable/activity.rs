use super::{Handler, Scorable, ScorableError, TurnScope};
use crate::message::{ActivityType, Message};
use async_trait::async_trait;
use std::sync::Arc;

/// Handles every activity of one type, e.g. conversation updates
pub struct ActivityTypeScorable {
    kind: ActivityType,
    score: f64,
    handler: Handler<ActivityType>,
}

impl ActivityTypeScorable {
    pub fn new<F>(kind: ActivityType, handler: F) -> Self
    where
        F: Fn(&mut TurnScope<'_>, &Message, &ActivityType) -> Result<(), ScorableError> + Send + Sync + 'static,
    {
        Self {
            kind,
            score: 1.0,
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }
}

#[async_trait]
impl Scorable for ActivityTypeScorable {
    type State = ActivityType;

    async fn prepare(&self, item: &Message) -> Result<Option<ActivityType>, ScorableError> {
        Ok((item.kind == self.kind).then_some(item.kind))
    }

    fn score(&self, _item: &Message, _state: &ActivityType) -> f64 {
        self.score
    }

    fn post(&self, item: &Message, state: &ActivityType, scope: &mut TurnScope<'_>) -> Result<(), ScorableError> {
        (self.handler)(scope, item, state)
    }
}
