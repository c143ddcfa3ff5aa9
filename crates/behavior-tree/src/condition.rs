//! Pure predicates over the blackboard, used by observer decorators.
//!
//! Conditions may be evaluated at arbitrary points (on start, on every
//! observed change), so implementations must not have side effects.

use crate::blackboard::{Blackboard, Value};

pub trait Condition {
    /// Evaluate against the current blackboard contents.
    fn is_met(&self, blackboard: &Blackboard) -> bool;

    /// Blackboard keys whose changes may flip the result.
    fn observed_keys(&self) -> &[String];
}

/// Comparison applied by [`BlackboardCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum Operator {
    IsSet,
    IsNotSet,
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

/// Compares one blackboard entry against a reference value.
#[derive(Debug, Clone, PartialEq)]
pub struct BlackboardCondition {
    keys: [String; 1],
    operator: Operator,
    value: Option<Value>,
}

impl BlackboardCondition {
    pub fn new(key: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            keys: [key.into()],
            operator,
            value: Some(value.into()),
        }
    }

    /// Condition on the presence of `key`.
    pub fn is_set(key: impl Into<String>) -> Self {
        Self {
            keys: [key.into()],
            operator: Operator::IsSet,
            value: None,
        }
    }

    /// Condition on the absence of `key`.
    pub fn is_not_set(key: impl Into<String>) -> Self {
        Self {
            keys: [key.into()],
            operator: Operator::IsNotSet,
            value: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.keys[0]
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }
}

impl Condition for BlackboardCondition {
    fn is_met(&self, blackboard: &Blackboard) -> bool {
        let current = blackboard.get(self.key());
        match self.operator {
            Operator::IsSet => current.is_some(),
            Operator::IsNotSet => current.is_none(),
            Operator::Equal => current.is_some() && current == self.value.as_ref(),
            Operator::NotEqual => current != self.value.as_ref(),
            Operator::Greater => self.compare(current, |ord| ord.is_gt()),
            Operator::GreaterOrEqual => self.compare(current, |ord| ord.is_ge()),
            Operator::Less => self.compare(current, |ord| ord.is_lt()),
            Operator::LessOrEqual => self.compare(current, |ord| ord.is_le()),
        }
    }

    fn observed_keys(&self) -> &[String] {
        &self.keys
    }
}

impl BlackboardCondition {
    fn compare(
        &self,
        current: Option<&Value>,
        accept: impl FnOnce(std::cmp::Ordering) -> bool,
    ) -> bool {
        let (Some(current), Some(reference)) = (
            current.and_then(Value::as_f64),
            self.value.as_ref().and_then(Value::as_f64),
        ) else {
            return false;
        };
        current.partial_cmp(&reference).is_some_and(accept)
    }
}

/// Closure-backed condition observing an explicit key list.
pub struct FnCondition {
    keys: Vec<String>,
    predicate: Box<dyn Fn(&Blackboard) -> bool>,
}

impl FnCondition {
    pub fn new<K, S>(keys: K, predicate: impl Fn(&Blackboard) -> bool + 'static) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            predicate: Box::new(predicate),
        }
    }
}

impl Condition for FnCondition {
    fn is_met(&self, blackboard: &Blackboard) -> bool {
        (self.predicate)(blackboard)
    }

    fn observed_keys(&self) -> &[String] {
        &self.keys
    }
}
