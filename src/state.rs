//! Shared pipeline state and the document records stored in it.
//!
//! [`State`] is the mutable key/value store handed from stage to stage during
//! one pipeline run. Values are opaque [`serde_json::Value`]s so that stages
//! written independently can exchange data without sharing Rust types.
//!
//! A stage reads and writes slot values through a [`ScopedState`] declaring
//! the slots it reads and the slots it writes. Any access outside that set
//! fails with [`NodeError::UndeclaredSlot`].

use crate::error::NodeError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The shared key/value store of one pipeline run.
///
/// Keys are kept sorted so that listings (error messages, debug output) are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    slots: BTreeMap<String, Value>,
}

impl State {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value stored at `slot`, if any.
    pub fn get(&self, slot: &str) -> Option<&Value> {
        self.slots.get(slot)
    }

    /// Store `value` at `slot`, returning the previous value.
    pub fn set(&mut self, slot: impl Into<String>, value: Value) -> Option<Value> {
        self.slots.insert(slot.into(), value)
    }

    /// Remove and return the value at `slot`.
    pub fn remove(&mut self, slot: &str) -> Option<Value> {
        self.slots.remove(slot)
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.slots.contains_key(slot)
    }

    /// Slot names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Deserialize the value at `slot` into `T`.
    ///
    /// Returns `Ok(None)` when the slot is absent.
    pub fn get_as<T: DeserializeOwned>(&self, slot: &str) -> Result<Option<T>, serde_json::Error> {
        self.slots
            .get(slot)
            .map(|v| T::deserialize(v))
            .transpose()
    }

    /// Serialize `value` and store it at `slot`.
    pub fn set_as<T: Serialize>(
        &mut self,
        slot: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let v = serde_json::to_value(value)?;
        self.slots.insert(slot.into(), v);
        Ok(())
    }

    /// Borrow this state through a view limited to the given slots.
    pub fn scoped<'a>(
        &'a mut self,
        inputs: &'a [String],
        outputs: &'a [String],
    ) -> ScopedState<'a> {
        ScopedState {
            state: self,
            inputs,
            outputs,
        }
    }
}

impl FromIterator<(String, Value)> for State {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}

/// A view of [`State`] restricted to a stage's declared slots.
///
/// Reads are allowed only for `inputs`, writes only for `outputs`.
#[derive(Debug)]
pub struct ScopedState<'a> {
    state: &'a mut State,
    inputs: &'a [String],
    outputs: &'a [String],
}

impl ScopedState<'_> {
    /// Read a declared input slot.
    ///
    /// A declared slot that is absent is reported as
    /// [`NodeError::MissingInputSlot`].
    pub fn read(&self, slot: &str) -> Result<&Value, NodeError> {
        if !self.inputs.iter().any(|s| s == slot) {
            return Err(NodeError::UndeclaredSlot {
                slot: slot.to_string(),
            });
        }
        self.state
            .get(slot)
            .ok_or_else(|| NodeError::MissingInputSlot {
                expression: slot.to_string(),
                available: self.state.keys().map(str::to_string).collect(),
            })
    }

    /// Overwrite a declared output slot in one step.
    pub fn write(&mut self, slot: &str, value: Value) -> Result<(), NodeError> {
        if !self.outputs.iter().any(|s| s == slot) {
            return Err(NodeError::UndeclaredSlot {
                slot: slot.to_string(),
            });
        }
        self.state.set(slot, value);
        Ok(())
    }
}

// ── Documents ────────────────────────────────────────────────────────────────

/// One fetched unit of content: a JSON object with an HTML content field and
/// any number of metadata fields.
///
/// Only the content field is ever rewritten; every other field is carried
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Create a document holding `html` under `field`.
    pub fn new(field: impl Into<String>, html: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(field.into(), Value::String(html.into()));
        Self(map)
    }

    /// Add a metadata field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Interpret a JSON value as a document; only objects qualify.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The string held in `field`, if it is present and a string.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Replace the string in `field`. Other fields are left as they are.
    pub fn replace_text(&mut self, field: &str, text: String) {
        self.0.insert(field.to_string(), Value::String(text));
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}
