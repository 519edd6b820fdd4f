use super::{Scorable, ScorableError, TurnScope};
use crate::fiber::{Fault, Need};
use crate::message::Message;
use async_trait::async_trait;
use regex::Regex;

/// Cancels the active dialog when the whole message matches a pattern.
///
/// The pattern is anchored at both ends, so `can|cancel` accepts "cancel".
///
/// The waiting dialog receives a cancellation fault and may recover; if
/// nothing does, the stack unwinds to empty.
pub struct CancelScorable {
    regex: Regex,
    score: f64,
    reason: String,
}

impl CancelScorable {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(&format!("^(?:{pattern})$"))?,
            score: 1.0,
            reason: "cancelled by user".to_string(),
        })
    }

    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

#[async_trait]
impl Scorable for CancelScorable {
    type State = ();

    async fn prepare(&self, item: &Message) -> Result<Option<()>, ScorableError> {
        Ok(self.regex.is_match(item.text.trim()).then_some(()))
    }

    fn score(&self, _item: &Message, _state: &()) -> f64 {
        self.score
    }

    fn post(&self, item: &Message, _state: &(), scope: &mut TurnScope<'_>) -> Result<(), ScorableError> {
        if scope.stack.need() != Need::Wait {
            tracing::debug!(conversation_id = %item.conversation_id, "Nothing to cancel");
            return Ok(());
        }
        tracing::info!(
            conversation_id = %item.conversation_id,
            depth = scope.stack.depth(),
            "Cancelling dialog stack"
        );
        scope.stack.fail(Fault::cancelled(self.reason.clone()))?;
        Ok(())
    }
}
