use super::{Handler, Scorable, ScorableError, TurnScope};
use crate::message::Message;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

/// Where a pattern matched in the message text
#[derive(Debug, Clone, PartialEq)]
pub struct RegexMatch {
    pub matched: String,
    pub start: usize,
    /// Capture groups after the whole match; `None` for groups that did not
    /// participate
    pub groups: Vec<Option<String>>,
}

/// Scores by how much of the text the pattern covers
pub struct RegexScorable {
    regex: Regex,
    handler: Handler<RegexMatch>,
}

impl RegexScorable {
    pub fn new<F>(regex: Regex, handler: F) -> Self
    where
        F: Fn(&mut TurnScope<'_>, &Message, &RegexMatch) -> Result<(), ScorableError> + Send + Sync + 'static,
    {
        Self {
            regex,
            handler: Arc::new(handler),
        }
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

#[async_trait]
impl Scorable for RegexScorable {
    type State = RegexMatch;

    async fn prepare(&self, item: &Message) -> Result<Option<RegexMatch>, ScorableError> {
        if item.text.is_empty() {
            return Ok(None);
        }
        let Some(captures) = self.regex.captures(&item.text) else {
            return Ok(None);
        };
        let Some(whole) = captures.get(0) else {
            return Ok(None);
        };
        Ok(Some(RegexMatch {
            matched: whole.as_str().to_string(),
            start: whole.start(),
            groups: captures
                .iter()
                .skip(1)
                .map(|g| g.map(|m| m.as_str().to_string()))
                .collect(),
        }))
    }

    #[allow(clippy::cast_precision_loss)] // message text lengths are far below 2^52
    fn score(&self, item: &Message, state: &RegexMatch) -> f64 {
        let total = item.text.chars().count();
        if total == 0 {
            return 0.0;
        }
        state.matched.chars().count() as f64 / total as f64
    }

    fn post(&self, item: &Message, state: &RegexMatch, scope: &mut TurnScope<'_>) -> Result<(), ScorableError> {
        (self.handler)(scope, item, state)
    }
}
