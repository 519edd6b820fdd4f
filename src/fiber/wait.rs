//! Suspension points and the values that resume them

use super::{Fault, FiberError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Item kind accepted by a wait that takes any value
pub const ANY_KIND: &str = "*";

/// A value type that can resume a continuation.
///
/// `KIND` is persisted alongside waits, so it must stay stable across
/// deployments.
pub trait Resumable: Serialize + DeserializeOwned {
    const KIND: &'static str;
}

impl Resumable for String {
    const KIND: &'static str = "string";
}

impl Resumable for i64 {
    const KIND: &'static str = "int64";
}

impl Resumable for f64 {
    const KIND: &'static str = "double";
}

impl Resumable for bool {
    const KIND: &'static str = "bool";
}

impl Resumable for () {
    const KIND: &'static str = "unit";
}

impl Resumable for Value {
    const KIND: &'static str = "json";
}

/// A typed value crossing a continuation boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub kind: String,
    pub value: Value,
}

impl Item {
    pub fn new<T: Resumable>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: T::KIND.to_string(),
            value: serde_json::to_value(value)?,
        })
    }

    pub fn unit() -> Self {
        Self {
            kind: <() as Resumable>::KIND.to_string(),
            value: Value::Null,
        }
    }

    /// Decode the item, checking its kind first. `json` accepts any kind.
    pub fn get<T: Resumable>(&self) -> Result<T, Fault> {
        if T::KIND != <Value as Resumable>::KIND && self.kind != T::KIND {
            return Err(Fault::data(format!(
                "expected item of kind {}, got {}",
                T::KIND,
                self.kind
            )));
        }
        Ok(serde_json::from_value(self.value.clone())?)
    }

    pub fn is<T: Resumable>(&self) -> bool {
        self.kind == T::KIND
    }
}

/// Value delivered to a resumption handler
pub type Outcome = Result<Item, Fault>;

/// What a wait (or the whole fiber) needs next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Need {
    /// Nothing registered
    #[default]
    None,
    /// Suspended until an external item is posted
    Wait,
    /// An item is ready; the next poll runs the continuation
    Poll,
    /// Suspended until a child frame completes
    Call,
    /// The stack is exhausted
    Done,
}

/// A single reified suspension point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wait {
    /// Name of the continuation to run on resume
    pub rest: String,
    /// Kind of item expected
    pub kind: String,
    pub need: Need,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    item: Option<Outcome>,
}

impl Wait {
    pub fn new(rest: impl Into<String>, kind: impl Into<String>, need: Need) -> Self {
        Self {
            rest: rest.into(),
            kind: kind.into(),
            need,
            item: None,
        }
    }

    /// A wait that will run `rest` with `outcome` on the next poll
    pub fn ready(rest: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            rest: rest.into(),
            kind: ANY_KIND.to_string(),
            need: Need::Poll,
            item: Some(outcome),
        }
    }

    pub fn accepts(&self, item: &Item) -> bool {
        self.kind == ANY_KIND || self.kind == item.kind
    }

    /// Satisfy the wait. Faults bypass the kind check.
    pub fn post(&mut self, outcome: Outcome) -> Result<(), FiberError> {
        if !matches!(self.need, Need::Wait | Need::Call) {
            return Err(FiberError::InvalidNeed {
                expected: Need::Wait,
                actual: self.need,
            });
        }
        if let Ok(item) = &outcome {
            if !self.accepts(item) {
                return Err(FiberError::KindMismatch {
                    rest: self.rest.clone(),
                    expected: self.kind.clone(),
                    actual: item.kind.clone(),
                });
            }
        }
        self.item = Some(outcome);
        self.need = Need::Poll;
        Ok(())
    }

    /// Consume the posted item. A wait can only be taken once.
    pub fn take(&mut self) -> Result<(String, Outcome), FiberError> {
        if self.need != Need::Poll {
            return Err(FiberError::InvalidNeed {
                expected: Need::Poll,
                actual: self.need,
            });
        }
        let outcome = self.item.take().ok_or(FiberError::InvalidNeed {
            expected: Need::Poll,
            actual: Need::None,
        })?;
        self.need = Need::None;
        Ok((self.rest.clone(), outcome))
    }

    /// Replace the pending outcome of a wait that is ready to poll
    pub(crate) fn replace(&mut self, outcome: Outcome) {
        if self.need == Need::Poll {
            self.item = Some(outcome);
        }
    }
}
