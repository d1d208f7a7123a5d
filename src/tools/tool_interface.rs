//! The contract every annotation tool implements.
//!
//! A tool is four stages threaded by one entry point:
//!
//! ```text
//! run_full(expr, ref, convert_to, params, control)
//!   ├── checkpoint ─► preprocess_expr(expr)       default: identity
//!   ├── checkpoint ─► preprocess_ref(ref)         default: identity
//!   ├── checkpoint ─► annotate(expr', ref')  ─► Raw
//!   └── checkpoint ─► convert(Raw, convert_to) ─► StandardResult
//! ```
//!
//! The async stages also receive the [`RunControl`]. Work moved to the
//! blocking pool checks it when it starts and between its steps, since a
//! timed-out task only stops at its next `.await`.
//!
//! [`ToolInterface`] is the typed contract with a tool-specific raw result.
//! [`AnnotationTool`] is its object-safe face, implemented for every
//! `ToolInterface`, which is what the registry stores.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

use crate::data::{DataError, ExprData, Reference};
use crate::params::{Params, ResultType};
use crate::requirements::RequirementList;
use crate::results::StandardResult;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// A step of the run protocol, used to report where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PreprocessExpr,
    PreprocessRef,
    Annotate,
    Convert,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PreprocessExpr => "preprocess_expr",
            Self::PreprocessRef => "preprocess_ref",
            Self::Annotate => "annotate",
            Self::Convert => "convert",
        })
    }
}

// ---------------------------------------------------------------------------
// ToolError
// ---------------------------------------------------------------------------

/// Failure of one tool's run. Never escapes the orchestrator.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool `{tool}` cannot convert results to `{target}`")]
    UnsupportedConversion { tool: String, target: ResultType },

    #[error("tool `{tool}` does not accept a {kind} as reference")]
    UnsupportedReference { tool: String, kind: &'static str },

    #[error("missing required parameter `{0}`")]
    MissingParameter(String),

    #[error("run cancelled before {0}")]
    Cancelled(Stage),

    #[error("deadline exceeded before {0}")]
    DeadlineExceeded(Stage),

    #[error("model `{0}` is not in the model cache")]
    ModelNotFound(String),

    #[error("model store error: {0}")]
    ModelStore(String),

    #[error("checksum mismatch for `{name}`: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ToolError {
    pub fn unsupported_conversion(tool: &str, target: ResultType) -> Self {
        Self::UnsupportedConversion {
            tool: tool.to_string(),
            target,
        }
    }

    pub fn unsupported_reference(tool: &str, reference: &Reference) -> Self {
        Self::UnsupportedReference {
            tool: tool.to_string(),
            kind: reference.kind(),
        }
    }
}

// ---------------------------------------------------------------------------
// RunControl
// ---------------------------------------------------------------------------

/// Cancellation flag and optional deadline shared between the orchestrator
/// and one tool run.
///
/// Clones share the flag, so the orchestrator can cancel a run it has handed
/// off. Tools doing long work poll [`RunControl::checkpoint`] themselves.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail if the run was cancelled or its deadline has passed.
    pub fn checkpoint(&self, next: Stage) -> Result<(), ToolError> {
        if self.is_cancelled() {
            return Err(ToolError::Cancelled(next));
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ToolError::DeadlineExceeded(next)),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// ToolInterface
// ---------------------------------------------------------------------------

/// Typed contract of an annotation tool.
///
/// Implementations are created once and reused across runs; all per-run data
/// flows through the method arguments.
#[async_trait]
pub trait ToolInterface: Send + Sync + fmt::Debug {
    /// Tool-specific output of [`ToolInterface::annotate`].
    type Raw: Send + 'static;

    /// Registry name of the tool.
    fn name(&self) -> &str;

    /// The gate evaluated before a run. `None` means always compatible.
    fn requirements(&self) -> Option<&RequirementList> {
        None
    }

    /// Whether the tool can run in this environment. Called once while the
    /// registry is built.
    fn probe(&self) -> bool {
        true
    }

    /// Reshape expression data for the algorithm.
    async fn preprocess_expr(
        &self,
        expr: Arc<ExprData>,
        _params: &Params,
        _control: &RunControl,
    ) -> Result<Arc<ExprData>, ToolError> {
        Ok(expr)
    }

    /// Reshape, load or train from the reference.
    async fn preprocess_ref(
        &self,
        reference: Arc<Reference>,
        _params: &Params,
        _control: &RunControl,
    ) -> Result<Arc<Reference>, ToolError> {
        Ok(reference)
    }

    /// Run the core algorithm on preprocessed inputs.
    async fn annotate(
        &self,
        expr: Arc<ExprData>,
        reference: Arc<Reference>,
        params: &Params,
        control: &RunControl,
    ) -> Result<Self::Raw, ToolError>;

    /// Map the raw output into a standardized shape, or fail with
    /// [`ToolError::UnsupportedConversion`].
    fn convert(
        &self,
        raw: Self::Raw,
        convert_to: ResultType,
        params: &Params,
    ) -> Result<StandardResult, ToolError>;

    /// Run every stage in order, checking `control` before each one.
    async fn run_full(
        &self,
        expr: Arc<ExprData>,
        reference: Arc<Reference>,
        convert_to: ResultType,
        params: &Params,
        control: &RunControl,
    ) -> Result<StandardResult, ToolError> {
        control.checkpoint(Stage::PreprocessExpr)?;
        let expr = self.preprocess_expr(expr, params, control).await?;
        control.checkpoint(Stage::PreprocessRef)?;
        let reference = self.preprocess_ref(reference, params, control).await?;
        control.checkpoint(Stage::Annotate)?;
        let raw = self.annotate(expr, reference, params, control).await?;
        control.checkpoint(Stage::Convert)?;
        self.convert(raw, convert_to, params)
    }
}

// ---------------------------------------------------------------------------
// AnnotationTool
// ---------------------------------------------------------------------------

/// Object-safe view of a [`ToolInterface`], as held by the registry.
#[async_trait]
pub trait AnnotationTool: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn requirements(&self) -> Option<&RequirementList>;

    fn probe(&self) -> bool;

    async fn run_full(
        &self,
        expr: Arc<ExprData>,
        reference: Arc<Reference>,
        convert_to: ResultType,
        params: &Params,
        control: &RunControl,
    ) -> Result<StandardResult, ToolError>;
}

#[async_trait]
impl<T: ToolInterface> AnnotationTool for T {
    fn name(&self) -> &str {
        ToolInterface::name(self)
    }

    fn requirements(&self) -> Option<&RequirementList> {
        ToolInterface::requirements(self)
    }

    fn probe(&self) -> bool {
        ToolInterface::probe(self)
    }

    async fn run_full(
        &self,
        expr: Arc<ExprData>,
        reference: Arc<Reference>,
        convert_to: ResultType,
        params: &Params,
        control: &RunControl,
    ) -> Result<StandardResult, ToolError> {
        ToolInterface::run_full(self, expr, reference, convert_to, params, control).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::LabelSeries;

    /// Labels every observation `X`.
    #[derive(Debug)]
    struct ConstantTool;

    #[async_trait]
    impl ToolInterface for ConstantTool {
        type Raw = Vec<String>;

        fn name(&self) -> &str {
            "constant"
        }

        async fn annotate(
            &self,
            expr: Arc<ExprData>,
            _reference: Arc<Reference>,
            _params: &Params,
            _control: &RunControl,
        ) -> Result<Self::Raw, ToolError> {
            Ok(vec!["X".to_string(); expr.n_obs()])
        }

        fn convert(
            &self,
            raw: Self::Raw,
            convert_to: ResultType,
            _params: &Params,
        ) -> Result<StandardResult, ToolError> {
            match convert_to {
                ResultType::Labels => Ok(StandardResult::Labels(LabelSeries::new(
                    vec!["c1".into(), "c2".into()],
                    raw,
                )?)),
                other => Err(ToolError::unsupported_conversion("constant", other)),
            }
        }
    }

    fn expr() -> Arc<ExprData> {
        Arc::new(
            ExprData::new(
                vec!["c1".into(), "c2".into()],
                vec!["g".into()],
                vec![vec![1.0], vec![2.0]],
            )
            .unwrap(),
        )
    }

    fn reference() -> Arc<Reference> {
        Arc::new(Reference::ModelName("any".into()))
    }

    #[tokio::test]
    async fn test_run_full_threads_all_stages() {
        let tool: Arc<dyn AnnotationTool> = Arc::new(ConstantTool);
        assert!(tool.requirements().is_none());
        assert!(tool.probe());
        let result = tool
            .run_full(expr(), reference(), ResultType::Labels, &Params::new(), &RunControl::new())
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_convert_rejects_unsupported_target() {
        let err = ToolInterface::run_full(
            &ConstantTool,
            expr(),
            reference(),
            ResultType::Scores,
            &Params::new(),
            &RunControl::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ToolError::UnsupportedConversion { target: ResultType::Scores, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_control_stops_before_first_stage() {
        let control = RunControl::new();
        control.clone().cancel();
        assert!(control.is_cancelled());
        let err = ToolInterface::run_full(
            &ConstantTool,
            expr(),
            reference(),
            ResultType::Labels,
            &Params::new(),
            &control,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::Cancelled(Stage::PreprocessExpr)));
    }

    #[test]
    fn test_expired_deadline_fails_checkpoint() {
        let control = RunControl::new().with_timeout(Duration::ZERO);
        assert!(matches!(
            control.checkpoint(Stage::Annotate),
            Err(ToolError::DeadlineExceeded(Stage::Annotate))
        ));
        assert!(RunControl::new().checkpoint(Stage::Annotate).is_ok());
    }
}
