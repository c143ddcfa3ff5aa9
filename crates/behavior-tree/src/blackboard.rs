//! Shared key/value state read by conditions and written by game logic.
//!
//! Writes are recorded as pending changes; [`Blackboard::update`] drains them
//! once per tick so observers react to a batch of changes at a well-defined
//! point instead of in the middle of a write.

use std::collections::BTreeMap;
use std::fmt;

/// A value stored on the blackboard.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric view used by ordering comparisons. Text and booleans have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            Value::Bool(_) | Value::Text(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Blackboard {
    values: BTreeMap<String, Value>,
    /// Keys changed since the last `update`, in first-change order.
    pending: Vec<String>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.values.get(key)?.as_f64()
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Store `value` under `key`. Only an actual change is recorded.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if self.values.get(&key) == Some(&value) {
            return;
        }
        self.values.insert(key.clone(), value);
        self.mark_changed(key);
    }

    /// Remove `key`, returning the previous value.
    pub fn unset(&mut self, key: &str) -> Option<Value> {
        let previous = self.values.remove(key)?;
        self.mark_changed(key.to_owned());
        Some(previous)
    }

    /// Keys changed since the last [`update`](Self::update).
    pub fn pending_changes(&self) -> &[String] {
        &self.pending
    }

    /// Per-tick hook: drain and return the keys changed since the last call.
    pub fn update(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn mark_changed(&mut self, key: String) {
        if !self.pending.contains(&key) {
            self.pending.push(key);
        }
    }
}
