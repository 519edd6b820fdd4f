use super::{Scorable, ScorableError, TurnScope};
use crate::message::Message;
use async_trait::async_trait;
use std::sync::Arc;

type ScorePredicate = Arc<dyn Fn(&Message, f64) -> bool + Send + Sync>;

/// Wraps a scorable and drops scores the predicate rejects
pub struct WhereScorable<S> {
    inner: S,
    predicate: ScorePredicate,
}

impl<S: Scorable> WhereScorable<S> {
    pub fn new<F>(inner: S, predicate: F) -> Self
    where
        F: Fn(&Message, f64) -> bool + Send + Sync + 'static,
    {
        Self {
            inner,
            predicate: Arc::new(predicate),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: Scorable> Scorable for WhereScorable<S> {
    type State = S::State;

    async fn prepare(&self, item: &Message) -> Result<Option<S::State>, ScorableError> {
        self.inner.prepare(item).await
    }

    fn has_score(&self, item: &Message, state: &S::State) -> bool {
        self.inner.has_score(item, state) && (self.predicate)(item, self.inner.score(item, state))
    }

    fn score(&self, item: &Message, state: &S::State) -> f64 {
        self.inner.score(item, state)
    }

    fn post(&self, item: &Message, state: &S::State, scope: &mut TurnScope<'_>) -> Result<(), ScorableError> {
        self.inner.post(item, state, scope)
    }

    fn done(&self, item: &Message, state: S::State) {
        self.inner.done(item, state);
    }
}
