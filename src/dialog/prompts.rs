//! Built-in prompt dialogs
//!
//! A prompt posts a question, waits for the reply and completes with the
//! recognized value. Unrecognized replies cost one attempt; the last
//! failed attempt faults the prompt with `TooManyAttempts`.

use super::{unknown_continuation, Dialog, DialogContext, DialogType};
use crate::fiber::{Fault, Item, Outcome, Resumable};
use crate::message::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_TOO_MANY_ATTEMPTS: &str = "You have tried too many times.";

const MESSAGE_RECEIVED: &str = "message_received";

const YES: &[&str] = &["yes", "y", "yep", "sure", "ok", "true"];
const NO: &[&str] = &["no", "n", "nope", "false"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptOptions {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<String>,
    pub too_many_attempts: String,
    /// Attempts left
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

impl PromptOptions {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            retry: None,
            too_many_attempts: DEFAULT_TOO_MANY_ATTEMPTS.to_string(),
            attempts: DEFAULT_ATTEMPTS,
            choices: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: impl Into<String>) -> Self {
        self.retry = Some(retry.into());
        self
    }

    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_too_many_attempts(mut self, text: impl Into<String>) -> Self {
        self.too_many_attempts = text.into();
        self
    }

    #[must_use]
    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }
}

/// Turns a reply into a prompt result
pub trait Recognizer: Send + fmt::Debug {
    type Output: Resumable;
    const TYPE_NAME: &'static str;

    fn recognize(message: &Message, options: &PromptOptions) -> Option<Self::Output>;

    /// Text posted when the prompt starts
    fn describe(options: &PromptOptions) -> String {
        options.prompt.clone()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecognizeText;

impl Recognizer for RecognizeText {
    type Output = String;
    const TYPE_NAME: &'static str = "prompt.string";

    fn recognize(message: &Message, _options: &PromptOptions) -> Option<String> {
        let text = message.text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecognizeNumber;

impl Recognizer for RecognizeNumber {
    type Output = i64;
    const TYPE_NAME: &'static str = "prompt.number";

    fn recognize(message: &Message, _options: &PromptOptions) -> Option<i64> {
        message.text.trim().parse().ok()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecognizeDouble;

impl Recognizer for RecognizeDouble {
    type Output = f64;
    const TYPE_NAME: &'static str = "prompt.double";

    fn recognize(message: &Message, _options: &PromptOptions) -> Option<f64> {
        message
            .text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecognizeConfirm;

impl Recognizer for RecognizeConfirm {
    type Output = bool;
    const TYPE_NAME: &'static str = "prompt.confirm";

    fn recognize(message: &Message, _options: &PromptOptions) -> Option<bool> {
        let text = message.text.trim().to_lowercase();
        if YES.contains(&text.as_str()) {
            Some(true)
        } else if NO.contains(&text.as_str()) {
            Some(false)
        } else {
            None
        }
    }
}

/// Accepts a choice by text (case-insensitive) or by 1-based number
#[derive(Debug, Clone, Copy)]
pub struct RecognizeChoice;

impl Recognizer for RecognizeChoice {
    type Output = String;
    const TYPE_NAME: &'static str = "prompt.choice";

    fn recognize(message: &Message, options: &PromptOptions) -> Option<String> {
        let text = message.text.trim();
        if let Some(choice) = options.choices.iter().find(|c| c.eq_ignore_ascii_case(text)) {
            return Some(choice.clone());
        }
        let index: usize = text.parse().ok()?;
        options.choices.get(index.checked_sub(1)?).cloned()
    }

    fn describe(options: &PromptOptions) -> String {
        if options.choices.is_empty() {
            return options.prompt.clone();
        }
        let listed: Vec<String> = options
            .choices
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {c}", i + 1))
            .collect();
        format!("{} ({})", options.prompt, listed.join(", "))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Prompt<R> {
    options: PromptOptions,
    #[serde(skip)]
    recognizer: PhantomData<R>,
}

pub type PromptString = Prompt<RecognizeText>;
pub type PromptNumber = Prompt<RecognizeNumber>;
pub type PromptDouble = Prompt<RecognizeDouble>;
pub type PromptConfirm = Prompt<RecognizeConfirm>;
pub type PromptChoice = Prompt<RecognizeChoice>;

impl<R: Recognizer> Prompt<R> {
    pub fn new(options: PromptOptions) -> Self {
        Self {
            options,
            recognizer: PhantomData,
        }
    }

    pub fn options(&self) -> &PromptOptions {
        &self.options
    }
}

impl<R: Recognizer> DialogType for Prompt<R> {
    const TYPE_NAME: &'static str = R::TYPE_NAME;
}

impl<R: Recognizer> Dialog for Prompt<R> {
    fn start(&mut self, ctx: &mut DialogContext<'_, '_>, _args: Item) -> Result<(), Fault> {
        ctx.post(R::describe(&self.options));
        ctx.wait(MESSAGE_RECEIVED);
        Ok(())
    }

    fn resume(&mut self, ctx: &mut DialogContext<'_, '_>, rest: &str, outcome: Outcome) -> Result<(), Fault> {
        if rest != MESSAGE_RECEIVED {
            return Err(unknown_continuation(self, rest));
        }
        let message: Message = outcome?.get()?;
        if let Some(value) = R::recognize(&message, &self.options) {
            return ctx.done(value);
        }

        self.options.attempts = self.options.attempts.saturating_sub(1);
        if self.options.attempts > 0 {
            let retry = self
                .options
                .retry
                .clone()
                .unwrap_or_else(|| R::describe(&self.options));
            ctx.post(retry);
            ctx.wait(MESSAGE_RECEIVED);
            return Ok(());
        }

        tracing::debug!(prompt = R::TYPE_NAME, "Prompt ran out of attempts");
        ctx.post(self.options.too_many_attempts.clone());
        Err(Fault::too_many_attempts(self.options.too_many_attempts.clone()))
    }

    fn continuations(&self) -> &'static [&'static str] {
        &[MESSAGE_RECEIVED]
    }
}
