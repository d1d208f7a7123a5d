//! Dataset construction and loading errors.

use thiserror::Error;

/// Errors raised while building, validating or loading datasets and models.
#[derive(Debug, Error)]
pub enum DataError {
    /// The matrix row count disagrees with the observation names.
    #[error("matrix has {rows} rows but there are {obs} observation names")]
    RowCount { rows: usize, obs: usize },

    /// A matrix row has the wrong number of values.
    #[error("row {row} has {len} values but there are {vars} features")]
    RowLength { row: usize, len: usize, vars: usize },

    /// Two observations, features or classes share a name.
    #[error("duplicate {kind} name `{name}`")]
    DuplicateName { kind: &'static str, name: String },

    /// An observation column has the wrong length.
    #[error("observation column `{name}` has {len} values, expected {expected}")]
    ColumnLength {
        name: String,
        len: usize,
        expected: usize,
    },

    /// A requested observation column does not exist.
    #[error("observation column `{0}` not found")]
    MissingColumn(String),

    /// A matrix entry is NaN or infinite.
    #[error("non-finite value at row {row}, column {col}")]
    NonFinite { row: usize, col: usize },

    /// A marker list has no cell types, or a cell type has no markers.
    #[error("invalid marker list: {0}")]
    InvalidMarkers(String),

    /// A model is internally inconsistent.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// A score table was built without any class columns.
    #[error("score table has no classes")]
    NoClasses,

    /// Query and model/markers have no feature in common.
    #[error("no features shared between the expression data and {0}")]
    NoSharedFeatures(String),

    /// Underlying file I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
