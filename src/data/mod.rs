//! # Data
//!
//! In-memory datasets exchanged between the orchestrator and the tools:
//!
//! ```text
//! ExprData ─────────────────────────────────► preprocess_expr ─► annotate
//! Reference ─┬─ Annotated(ExprData)  ─┐
//!            ├─ ModelName(String)    ─┼─────► preprocess_ref  ─► annotate
//!            ├─ Model(CentroidModel) ─┘
//!            └─ Markers(MarkerList)
//! ```
//!
//! All types validate themselves on construction and on JSON load, so tools
//! can index matrices without re-checking shapes.

pub mod error;
pub mod expression;
pub mod model;
pub mod reference;

pub use error::DataError;
pub use expression::ExprData;
pub use model::CentroidModel;
pub use reference::{MarkerList, Reference};
