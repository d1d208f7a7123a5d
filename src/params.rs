//! Run parameters shared by the gate, the tool contract and the orchestrator.
//!
//! Free-form keyword parameters travel as a [`Params`] map of name to JSON
//! value. The two discriminators every run carries, the annotation type and the
//! desired result shape, are typed enums that render to the lowercase strings
//! tool gates compare against.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keyword parameters threaded through every stage of a tool run.
pub type Params = BTreeMap<String, Value>;

/// Parameter key carrying the annotation type presented to tool gates.
pub const ANNOT_TYPE_KEY: &str = "annot_type";
/// Parameter key carrying the result type presented to tool gates.
pub const RESULT_TYPE_KEY: &str = "result_type";

/// Reference observation column holding training labels.
pub const LABELS_KEY: &str = "labels";
/// Observation column naming each observation's cell type.
pub const CELL_TYPE_COL_KEY: &str = "cell_type_col";
/// Observation column naming each observation's batch.
pub const BATCH_COL_KEY: &str = "batch_col";
/// Refresh cached pretrained models before loading one.
pub const UPDATE_MODELS_KEY: &str = "update_models";
/// Re-download every cached model on refresh.
pub const FORCE_UPDATE_KEY: &str = "force_update";

// ---------------------------------------------------------------------------
// AnnotType
// ---------------------------------------------------------------------------

/// Whether annotation is reference-based or marker-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotType {
    /// Annotate against a labelled reference dataset or trained model.
    Ref,
    /// Annotate against a marker list.
    Marker,
}

impl AnnotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ref => "ref",
            Self::Marker => "marker",
        }
    }
}

impl fmt::Display for AnnotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnnotType {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ref" => Ok(Self::Ref),
            "marker" => Ok(Self::Marker),
            other => Err(ParseParamError::new("annot_type", other, &["ref", "marker"])),
        }
    }
}

// ---------------------------------------------------------------------------
// ResultType
// ---------------------------------------------------------------------------

/// Standardized output shape requested from every tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    /// One predicted label per observation.
    #[default]
    Labels,
    /// Observation x class score table.
    Scores,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Labels => "labels",
            Self::Scores => "scores",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultType {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "labels" => Ok(Self::Labels),
            "scores" => Ok(Self::Scores),
            other => Err(ParseParamError::new("result_type", other, &["labels", "scores"])),
        }
    }
}

/// Error returned when a discriminator string is not one of its allowed values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{value}` is not a valid {name} (expected one of: {})", .expected.join(", "))]
pub struct ParseParamError {
    pub name: &'static str,
    pub value: String,
    pub expected: Vec<&'static str>,
}

impl ParseParamError {
    fn new(name: &'static str, value: &str, expected: &[&'static str]) -> Self {
        Self {
            name,
            value: value.to_string(),
            expected: expected.to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build the parameter set a tool gate is evaluated against: the caller's
/// parameters plus the two run discriminators.
pub fn gate_params(annot_type: AnnotType, result_type: ResultType, params: &Params) -> Params {
    let mut gate = params.clone();
    gate.insert(
        ANNOT_TYPE_KEY.to_string(),
        Value::String(annot_type.as_str().to_string()),
    );
    gate.insert(
        RESULT_TYPE_KEY.to_string(),
        Value::String(result_type.as_str().to_string()),
    );
    gate
}

/// String parameter lookup. `null` and non-string values read as absent.
pub fn param_str<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

/// Boolean parameter lookup with a default for absent or `null` values.
pub fn param_bool(params: &Params, key: &str, default: bool) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(default)
}
