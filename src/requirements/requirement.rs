//! Single-value requirements.
//!
//! A requirement is a pure predicate over one JSON value. Each variant holds
//! the reference value it was built from; nothing about a requirement changes
//! after construction, and checking never has side effects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::RequirementError;

// ---------------------------------------------------------------------------
// Requirement trait
// ---------------------------------------------------------------------------

/// A predicate deciding whether a value satisfies one named precondition.
pub trait Requirement: Send + Sync + fmt::Debug {
    /// The reference value this requirement compares candidates against.
    fn value(&self) -> &Value;

    /// Single-value predicate implemented by each variant.
    fn checker(&self, candidate: &Value) -> bool;

    /// Check one candidate value.
    fn check(&self, candidate: &Value) -> bool {
        self.checker(candidate)
    }

    /// Check several candidates at once.
    ///
    /// Returns `true` iff every candidate passes; an empty slice passes.
    fn check_all(&self, candidates: &[Value]) -> bool {
        candidates.iter().all(|candidate| self.checker(candidate))
    }
}

/// Equality between JSON values where numbers compare by numeric value, so
/// `1` and `1.0` are equal.
pub(crate) fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| loosely_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).map_or(false, |y| loosely_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Integers compare exactly. Floats compare by value, so `1 == 1.0`.
fn numbers_equal(x: &serde_json::Number, y: &serde_json::Number) -> bool {
    if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
        return x == y;
    }
    if x.is_f64() || y.is_f64() {
        return matches!((x.as_f64(), y.as_f64()), (Some(x), Some(y)) if x == y);
    }
    // A negative integer against one above i64::MAX.
    false
}

// ---------------------------------------------------------------------------
// EqualityRequirement
// ---------------------------------------------------------------------------

/// The candidate must equal the reference value.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualityRequirement {
    value: Value,
}

impl EqualityRequirement {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl Requirement for EqualityRequirement {
    fn value(&self) -> &Value {
        &self.value
    }

    fn checker(&self, candidate: &Value) -> bool {
        loosely_equal(&self.value, candidate)
    }
}

// ---------------------------------------------------------------------------
// ContainsRequirement
// ---------------------------------------------------------------------------

/// The candidate must be an element of the reference collection.
///
/// Arrays are searched for an equal element, objects are searched by key and
/// strings by substring. Any other reference value is rejected at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainsRequirement {
    value: Value,
}

impl ContainsRequirement {
    pub fn new(value: impl Into<Value>) -> Result<Self, RequirementError> {
        let value = value.into();
        match value {
            Value::Array(_) | Value::Object(_) | Value::String(_) => Ok(Self { value }),
            other => Err(RequirementError::NotIterable(other)),
        }
    }
}

impl Requirement for ContainsRequirement {
    fn value(&self) -> &Value {
        &self.value
    }

    fn checker(&self, candidate: &Value) -> bool {
        match &self.value {
            Value::Array(items) => items.iter().any(|item| loosely_equal(item, candidate)),
            Value::Object(map) => candidate.as_str().map_or(false, |key| map.contains_key(key)),
            Value::String(haystack) => candidate
                .as_str()
                .map_or(false, |needle| haystack.contains(needle)),
            // Unreachable: construction only admits collections.
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// IsInstanceRequirement
// ---------------------------------------------------------------------------

/// JSON value kinds an [`IsInstanceRequirement`] can demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Null,
    Bool,
    /// Any number, integral or not.
    Number,
    /// Numbers representable as `i64` or `u64`.
    Integer,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Null => value.is_null(),
            Self::Bool => value.is_boolean(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl FromStr for ValueKind {
    type Err = RequirementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "null" | "none" => Ok(Self::Null),
            "bool" | "boolean" => Ok(Self::Bool),
            "number" | "float" => Ok(Self::Number),
            "integer" | "int" => Ok(Self::Integer),
            "string" | "str" => Ok(Self::String),
            "array" | "list" => Ok(Self::Array),
            "object" | "dict" | "map" => Ok(Self::Object),
            _ => Err(RequirementError::UnknownType(s.to_string())),
        }
    }
}

/// The candidate must be a JSON value of the given kind.
#[derive(Debug, Clone, PartialEq)]
pub struct IsInstanceRequirement {
    kind: ValueKind,
    value: Value,
}

impl IsInstanceRequirement {
    pub fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            value: Value::String(kind.as_str().to_string()),
        }
    }

    /// Build from a type name such as `"string"` or `"integer"`.
    pub fn from_type_name(name: &str) -> Result<Self, RequirementError> {
        Ok(Self::new(name.parse()?))
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

impl Requirement for IsInstanceRequirement {
    fn value(&self) -> &Value {
        &self.value
    }

    fn checker(&self, candidate: &Value) -> bool {
        self.kind.matches(candidate)
    }
}

// ---------------------------------------------------------------------------
// NotNoneRequirement
// ---------------------------------------------------------------------------

/// The candidate must not be `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct NotNoneRequirement {
    value: Value,
}

impl NotNoneRequirement {
    pub fn new() -> Self {
        Self { value: Value::Null }
    }
}

impl Default for NotNoneRequirement {
    fn default() -> Self {
        Self::new()
    }
}

impl Requirement for NotNoneRequirement {
    fn value(&self) -> &Value {
        &self.value
    }

    fn checker(&self, candidate: &Value) -> bool {
        !candidate.is_null()
    }
}
