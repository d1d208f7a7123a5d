//! # Tools
//!
//! The annotation tool contract and the adapters compiled into this build.
//!
//! | Tool             | Feature          | Gate                                              | Outputs          |
//! |------------------|------------------|---------------------------------------------------|------------------|
//! | `centroid`       | `centroid`       | `annot_type == ref`, `result_type ∈ {labels, scores}` | labels, scores |
//! | `marker_score`   | `marker-score`   | `annot_type == marker`, `result_type ∈ {labels, scores}` | labels, scores |
//! | `batch_centroid` | `batch-centroid` | `annot_type == ref`, `batch_col`, `cell_type_col` set | labels        |
//!
//! A disabled feature leaves the tool out of the registry entirely.

pub mod tool_interface;

#[cfg(feature = "batch-centroid")]
pub mod batch_centroid;
#[cfg(feature = "centroid")]
pub mod centroid;
#[cfg(feature = "marker-score")]
pub mod marker_score;

pub use tool_interface::{AnnotationTool, RunControl, Stage, ToolError, ToolInterface};

/// Cosine-score `expr` against a trained model reference on the blocking pool.
#[cfg(any(feature = "centroid", feature = "batch-centroid"))]
pub(crate) async fn score_against_model(
    expr: std::sync::Arc<crate::data::ExprData>,
    reference: std::sync::Arc<crate::data::Reference>,
    tool: &str,
    control: &RunControl,
) -> Result<crate::results::ScoreTable, ToolError> {
    use crate::data::Reference;

    let tool = tool.to_string();
    let control = control.clone();
    tokio::task::spawn_blocking(move || -> Result<_, ToolError> {
        control.checkpoint(Stage::Annotate)?;
        match &*reference {
            Reference::Model(model) => model.similarities(&expr).map_err(ToolError::from),
            other => Err(ToolError::unsupported_reference(&tool, other)),
        }
    })
    .await?
}
