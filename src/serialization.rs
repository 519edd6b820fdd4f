//! Persisting the dialog stack between turns
//!
//! Dialogs are written as `{type, state}` records and rebuilt through a
//! registry of known types. Restoring validates every frame: an unknown
//! type, a state that no longer matches its type, or a continuation name
//! the type does not declare all fail the load instead of resuming into
//! the wrong code.

use crate::dialog::{
    Dialog, DialogStack, DialogType, PromptChoice, PromptConfirm, PromptDouble, PromptNumber,
    PromptString, START,
};
use crate::fiber::{Fiber, Frame, Item, Need, Wait};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Current layout of `StackRecord`
pub const STACK_VERSION: u32 = 1;

/// Private conversation bag key holding the persisted stack
pub const DIALOG_STATE_KEY: &str = "DialogState";

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Unknown dialog type: {0}")]
    UnknownType(String),
    #[error("State of {type_name} does not match its type: {message}")]
    ShapeMismatch { type_name: String, message: String },
    #[error("{type_name} has no continuation named {rest}")]
    UnknownContinuation { type_name: String, rest: String },
    #[error("Unsupported dialog stack version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("Frame {index} cannot be persisted with need {need:?}")]
    Inconsistent { index: usize, need: Need },
    #[error("Dialog stack encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogRecord {
    #[serde(rename = "type")]
    pub type_name: String,
    pub state: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub dialog: DialogRecord,
    pub wait: Wait,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward: Option<Item>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackRecord {
    pub version: u32,
    pub frames: Vec<FrameRecord>,
}

type Restore = fn(Value) -> Result<Box<dyn Dialog>, serde_json::Error>;

fn restore<D: Dialog + DeserializeOwned + 'static>(state: Value) -> Result<Box<dyn Dialog>, serde_json::Error> {
    Ok(Box::new(serde_json::from_value::<D>(state)?))
}

/// Dialog types a stack may be restored into
#[derive(Clone)]
pub struct DialogRegistry {
    types: HashMap<&'static str, Restore>,
}

impl std::fmt::Debug for DialogRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.types.keys().collect();
        names.sort();
        f.debug_struct("DialogRegistry").field("types", &names).finish()
    }
}

impl Default for DialogRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogRegistry {
    /// Registry knowing the built-in prompts
    pub fn new() -> Self {
        let mut registry = Self {
            types: HashMap::new(),
        };
        registry
            .register::<PromptString>()
            .register::<PromptNumber>()
            .register::<PromptDouble>()
            .register::<PromptConfirm>()
            .register::<PromptChoice>();
        registry
    }

    pub fn register<D>(&mut self) -> &mut Self
    where
        D: Dialog + DialogType + DeserializeOwned + 'static,
    {
        if self.types.insert(D::TYPE_NAME, restore::<D>).is_some() {
            tracing::warn!(type_name = D::TYPE_NAME, "Dialog type registered twice");
        }
        self
    }

    #[must_use]
    pub fn with<D>(mut self) -> Self
    where
        D: Dialog + DialogType + DeserializeOwned + 'static,
    {
        self.register::<D>();
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn restore(&self, record: &DialogRecord) -> Result<Box<dyn Dialog>, SerializationError> {
        let restore = self
            .types
            .get(record.type_name.as_str())
            .ok_or_else(|| SerializationError::UnknownType(record.type_name.clone()))?;
        restore(record.state.clone()).map_err(|e| SerializationError::ShapeMismatch {
            type_name: record.type_name.clone(),
            message: e.to_string(),
        })
    }
}

/// Only the top frame may wait for input; frames below it wait on a child,
/// or on input when a child interrupted them.
fn check_need(index: usize, depth: usize, need: Need) -> Result<(), SerializationError> {
    let ok = match need {
        Need::Wait => true,
        Need::Call => index + 1 < depth,
        Need::None | Need::Poll | Need::Done => false,
    };
    if ok {
        Ok(())
    } else {
        Err(SerializationError::Inconsistent { index, need })
    }
}

fn check_continuation(dialog: &dyn Dialog, rest: &str) -> Result<(), SerializationError> {
    if rest == START || dialog.continuations().contains(&rest) {
        Ok(())
    } else {
        Err(SerializationError::UnknownContinuation {
            type_name: dialog.type_name().to_string(),
            rest: rest.to_string(),
        })
    }
}

impl DialogStack {
    /// Snapshot a stack that is between polls
    pub fn to_record(&self) -> Result<StackRecord, SerializationError> {
        let frames = self.fiber().frames();
        let depth = frames.len();
        let mut records = Vec::with_capacity(depth);
        for (index, frame) in frames.iter().enumerate() {
            check_need(index, depth, frame.wait.need)?;
            let dialog = frame.target().ok_or(SerializationError::Inconsistent {
                index,
                need: frame.wait.need,
            })?;
            records.push(FrameRecord {
                dialog: DialogRecord {
                    type_name: dialog.type_name().to_string(),
                    state: dialog.to_state()?,
                },
                wait: frame.wait.clone(),
                chain: frame.chain.iter().cloned().collect(),
                forward: frame.forward.clone(),
            });
        }
        Ok(StackRecord {
            version: STACK_VERSION,
            frames: records,
        })
    }

    /// Rebuild a stack, rejecting anything the registry cannot resume
    pub fn from_record(record: StackRecord, registry: &DialogRegistry) -> Result<Self, SerializationError> {
        if record.version != STACK_VERSION {
            return Err(SerializationError::Version {
                found: record.version,
                expected: STACK_VERSION,
            });
        }

        let depth = record.frames.len();
        let mut frames = Vec::with_capacity(depth);
        for (index, frame) in record.frames.into_iter().enumerate() {
            check_need(index, depth, frame.wait.need)?;
            let dialog = registry.restore(&frame.dialog)?;
            check_continuation(dialog.as_ref(), &frame.wait.rest)?;
            for rest in &frame.chain {
                check_continuation(dialog.as_ref(), rest)?;
            }
            frames.push(
                Frame::new(dialog, frame.wait)
                    .with_chain(frame.chain)
                    .with_forward(frame.forward),
            );
        }
        Ok(Self::from_fiber(Fiber::from_frames(frames)))
    }

    pub fn to_value(&self) -> Result<Value, SerializationError> {
        Ok(serde_json::to_value(self.to_record()?)?)
    }

    pub fn from_value(value: Value, registry: &DialogRegistry) -> Result<Self, SerializationError> {
        let record: StackRecord = serde_json::from_value(value)?;
        Self::from_record(record, registry)
    }
}
