//! # Requirements
//!
//! The compatibility engine that decides whether a tool may run.
//!
//! Every annotation tool declares a [`RequirementList`]: named predicates over
//! run parameters such as `annot_type` or `batch_col`. Before a tool is
//! dispatched, the orchestrator evaluates that list against the run's
//! parameters (the *gate*). A tool whose gate rejects the run is skipped.
//!
//! ```text
//! RequirementList { annot_type: Equality("ref"), batch_col: NotNone }
//!   │ check({annot_type: "ref", batch_col: "batch", labels: "ct"})
//!   ├── annot_type  -> Equality("ref").check("ref")   ✓
//!   ├── batch_col   -> NotNone.check("batch")         ✓
//!   └── labels      -> not declared, ignored
//!   ▼
//! compatible
//! ```
//!
//! Requirements are validated when built, so a misconfigured tool fails while
//! the registry is assembled rather than in the middle of a run.

pub mod error;
pub mod requirement;
pub mod requirement_list;

pub use error::RequirementError;
pub use requirement::{
    ContainsRequirement, EqualityRequirement, IsInstanceRequirement, NotNoneRequirement,
    Requirement, ValueKind,
};
pub use requirement_list::{MatchPolicy, RequirementList};
