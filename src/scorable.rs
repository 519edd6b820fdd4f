//! Scored interceptors that compete for an inbound message
//!
//! Before a message reaches the waiting dialog, every registered scorable
//! gets to look at it. The highest scoring one is posted the message and
//! the dialog stack never sees it. Global commands like "cancel" or
//! classifier-driven topic switches are built this way.

mod activity;
mod cancel;
mod filter;
mod intent;
mod pattern;

pub use activity::ActivityTypeScorable;
pub use cancel::CancelScorable;
pub use filter::WhereScorable;
pub use intent::{LuisMatch, LuisScorable};
pub use pattern::{RegexMatch, RegexScorable};

use crate::dialog::DialogStack;
use crate::fiber::FiberError;
use crate::luis::LuisError;
use crate::message::Message;
use crate::session::Session;
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScorableError {
    #[error("Intent classifier failed: {0}")]
    Luis(#[from] LuisError),
    #[error("Dialog stack rejected scorable action: {0}")]
    Stack(#[from] FiberError),
    #[error("Scorable handler failed: {0}")]
    Handler(String),
}

/// What the winning scorable may act on
pub struct TurnScope<'a> {
    pub stack: &'a mut DialogStack,
    pub session: &'a mut Session,
}

/// Action run when a scorable wins
pub type Handler<S> = Arc<dyn Fn(&mut TurnScope<'_>, &Message, &S) -> Result<(), ScorableError> + Send + Sync>;

#[async_trait]
pub trait Scorable: Send + Sync {
    type State: Send + 'static;

    /// Cheap pre-check. `None` means no interest in this item.
    async fn prepare(&self, item: &Message) -> Result<Option<Self::State>, ScorableError>;

    fn has_score(&self, _item: &Message, _state: &Self::State) -> bool {
        true
    }

    fn score(&self, item: &Message, state: &Self::State) -> f64;

    /// Act on the item; only called for the winner
    fn post(&self, item: &Message, state: &Self::State, scope: &mut TurnScope<'_>) -> Result<(), ScorableError>;

    /// Called for every prepared scorable, winner or not
    fn done(&self, _item: &Message, _state: Self::State) {}
}

pub trait ScorableExt: Scorable + Sized {
    /// Keep the score only when `predicate` accepts it
    fn filter<F>(self, predicate: F) -> WhereScorable<Self>
    where
        F: Fn(&Message, f64) -> bool + Send + Sync + 'static,
    {
        WhereScorable::new(self, predicate)
    }
}

impl<S: Scorable> ScorableExt for S {}

type AnyState = Box<dyn Any + Send>;

/// Object-safe view of a `Scorable` with its state boxed
#[async_trait]
trait ErasedScorable: Send + Sync {
    async fn prepare(&self, item: &Message) -> Result<Option<AnyState>, ScorableError>;
    fn has_score(&self, item: &Message, state: &AnyState) -> bool;
    fn score(&self, item: &Message, state: &AnyState) -> f64;
    fn post(&self, item: &Message, state: &AnyState, scope: &mut TurnScope<'_>) -> Result<(), ScorableError>;
    fn done(&self, item: &Message, state: AnyState);
}

#[async_trait]
impl<S: Scorable> ErasedScorable for S {
    async fn prepare(&self, item: &Message) -> Result<Option<AnyState>, ScorableError> {
        let state = Scorable::prepare(self, item).await?;
        Ok(state.map(|s| Box::new(s) as AnyState))
    }

    fn has_score(&self, item: &Message, state: &AnyState) -> bool {
        state
            .downcast_ref::<S::State>()
            .is_some_and(|s| Scorable::has_score(self, item, s))
    }

    fn score(&self, item: &Message, state: &AnyState) -> f64 {
        state
            .downcast_ref::<S::State>()
            .map_or(0.0, |s| Scorable::score(self, item, s))
    }

    fn post(&self, item: &Message, state: &AnyState, scope: &mut TurnScope<'_>) -> Result<(), ScorableError> {
        let state = state
            .downcast_ref::<S::State>()
            .ok_or_else(|| ScorableError::Handler("scorable state has the wrong type".to_string()))?;
        Scorable::post(self, item, state, scope)
    }

    fn done(&self, item: &Message, state: AnyState) {
        if let Ok(state) = state.downcast::<S::State>() {
            Scorable::done(self, item, *state);
        }
    }
}

/// Runs the registered scorables against each inbound message
#[derive(Default)]
pub struct Dispatcher {
    scorables: Vec<Box<dyn ErasedScorable>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("scorables", &self.scorables.len())
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<S: Scorable + 'static>(&mut self, scorable: S) -> &mut Self {
        self.scorables.push(Box::new(scorable));
        self
    }

    #[must_use]
    pub fn with<S: Scorable + 'static>(mut self, scorable: S) -> Self {
        self.add(scorable);
        self
    }

    pub fn len(&self) -> usize {
        self.scorables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scorables.is_empty()
    }

    /// Post `item` to the best scorable. Returns whether one handled it.
    ///
    /// Ties go to the scorable registered first.
    pub async fn dispatch(&self, item: &Message, scope: &mut TurnScope<'_>) -> Result<bool, ScorableError> {
        let mut prepared: Vec<(usize, AnyState)> = Vec::new();
        for (index, scorable) in self.scorables.iter().enumerate() {
            match scorable.prepare(item).await {
                Ok(Some(state)) => prepared.push((index, state)),
                Ok(None) => {}
                Err(e) => {
                    self.finish(item, prepared);
                    return Err(e);
                }
            }
        }

        let mut best: Option<(usize, f64)> = None;
        for (position, (index, state)) in prepared.iter().enumerate() {
            let scorable = &self.scorables[*index];
            if !scorable.has_score(item, state) {
                continue;
            }
            let score = scorable.score(item, state);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((position, score));
            }
        }

        let result = match best {
            Some((position, score)) => {
                let (index, state) = &prepared[position];
                tracing::debug!(
                    conversation_id = %item.conversation_id,
                    scorable = index,
                    score,
                    "Scorable handling message"
                );
                self.scorables[*index].post(item, state, scope).map(|()| true)
            }
            None => Ok(false),
        };
        self.finish(item, prepared);
        result
    }

    fn finish(&self, item: &Message, prepared: Vec<(usize, AnyState)>) {
        for (index, state) in prepared {
            self.scorables[index].done(item, state);
        }
    }
}
