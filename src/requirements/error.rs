//! Requirement configuration errors.

use serde_json::Value;
use thiserror::Error;

/// Errors raised while building requirements or requirement lists.
///
/// These are configuration errors: they surface when a tool or the registry is
/// constructed, never while a run is being checked.
#[derive(Debug, Error)]
pub enum RequirementError {
    /// A contains-requirement was given a value that cannot hold elements.
    #[error("contains requirement needs an array, object or string, got {0}")]
    NotIterable(Value),

    /// An is-instance requirement was given something that names no type.
    #[error("is_instance requirement needs a type name, got `{0}`")]
    UnknownType(String),

    /// A requirement list key was not a string.
    #[error("requirement names must be strings, got {0}")]
    NonStringKey(String),

    /// A requirement list was not a mapping.
    #[error("requirements must be a mapping of name -> requirement, got {0}")]
    NotAMapping(String),

    /// A requirement entry could not be interpreted.
    #[error("requirement `{name}` is malformed: {reason}")]
    Malformed { name: String, reason: String },
}
