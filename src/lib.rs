//! # macta
//!
//! Multi-tool cell-type annotation. Pluggable annotation tools declare the
//! run parameters they accept as a requirement gate; the orchestrator runs
//! every selected tool whose gate accepts a run and collects their normalised
//! results keyed by tool name.
//!
//! ```text
//!  caller ──► annotate ──► ToolRegistry ──► gate (RequirementList::check)
//!                │                               │ compatible
//!                │                               ▼
//!                │        run_full: preprocess_expr → preprocess_ref
//!                │                  → annotate → convert
//!                ▼
//!         AnnotationReport { results: name → StandardResult, outcomes }
//! ```
//!
//! One tool failing, panicking or timing out never fails the run; it is
//! recorded in the report and left out of the results.

pub mod annotate;
pub mod cli;
pub mod config;
pub mod data;
pub mod params;
pub mod registry;
pub mod requirements;
pub mod results;
pub mod tools;
pub mod utilities;

pub use annotate::{
    annotate, AnnotationOptions, AnnotationReport, AnnotationRequest, ToolOutcome, ToolSelection,
};
pub use config::{ConfigError, MactaConfig};
pub use data::{CentroidModel, DataError, ExprData, MarkerList, Reference};
pub use params::{AnnotType, Params, ResultType};
pub use registry::{RegisteredTool, ToolRegistry};
pub use requirements::{MatchPolicy, RequirementError, RequirementList};
pub use results::{LabelSeries, ScoreTable, StandardResult};
pub use tools::{AnnotationTool, RunControl, Stage, ToolError, ToolInterface};
