//! Annotation Orchestrator — selects, gates and runs tools, then aggregates.
//!
//! ```text
//! AnnotationRequest ──► resolve selection ("*" or names)
//!                        │  unknown names  ─► NotRegistered
//!                        ▼
//!                  for each selected tool
//!                        │  gate.check(annot_type, result_type, params)
//!                        ├── rejected ─► Skipped            (warn)
//!                        ▼
//!                  tokio task per tool, bounded by a semaphore
//!                        │  run_full under timeout + RunControl
//!                        ├── Ok(result)  ─► Succeeded      results[name] = result
//!                        ├── Err / panic ─► Failed         (error)
//!                        └── deadline    ─► TimedOut       (error)
//!                        ▼
//!                  AnnotationReport { results, outcomes }
//! ```
//!
//! No tool's failure escapes [`annotate`]; the caller always gets a report,
//! possibly with an empty result mapping.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::MactaConfig;
use crate::data::{ExprData, Reference};
use crate::params::{gate_params, AnnotType, Params, ResultType};
use crate::registry::ToolRegistry;
use crate::results::StandardResult;
use crate::tools::{AnnotationTool, RunControl, ToolError};

// ---------------------------------------------------------------------------
// ToolSelection
// ---------------------------------------------------------------------------

/// Which registered tools a run considers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolSelection {
    /// Every registered tool (`"*"`).
    #[default]
    All,
    /// Exactly these names.
    Named(BTreeSet<String>),
}

impl ToolSelection {
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Named(names.into_iter().map(Into::into).collect())
    }

    /// Parse several command-line tokens, each of which may itself be a
    /// comma- or space-delimited list.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        let joined = tokens
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(",");
        match joined.parse::<Self>() {
            Ok(selection) => selection,
            Err(never) => match never {},
        }
    }

    pub fn includes(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(names) => names.contains(name),
        }
    }
}

impl FromStr for ToolSelection {
    type Err = Infallible;

    /// `"*"` selects everything; otherwise names are split on commas and
    /// whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let names: BTreeSet<String> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if names.contains("*") {
            Ok(Self::All)
        } else {
            Ok(Self::Named(names))
        }
    }
}

impl fmt::Display for ToolSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Named(names) => {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Request / options
// ---------------------------------------------------------------------------

/// Inputs of one annotation run.
#[derive(Debug, Clone)]
pub struct AnnotationRequest {
    pub expr: Arc<ExprData>,
    pub reference: Arc<Reference>,
    pub annot_type: AnnotType,
    pub result_type: ResultType,
    pub tools: ToolSelection,
    /// Free-form keyword parameters, visible to gates and every tool stage.
    pub params: Params,
}

impl AnnotationRequest {
    /// A request for labels from every registered tool.
    pub fn new(
        expr: impl Into<Arc<ExprData>>,
        reference: impl Into<Arc<Reference>>,
        annot_type: AnnotType,
    ) -> Self {
        Self {
            expr: expr.into(),
            reference: reference.into(),
            annot_type,
            result_type: ResultType::default(),
            tools: ToolSelection::All,
            params: Params::new(),
        }
    }

    pub fn with_result_type(mut self, result_type: ResultType) -> Self {
        self.result_type = result_type;
        self
    }

    pub fn with_tools(mut self, tools: ToolSelection) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }
}

/// Execution limits of a run.
#[derive(Debug, Clone)]
pub struct AnnotationOptions {
    /// Deadline for each tool's full run. `None` waits indefinitely.
    pub tool_timeout: Option<Duration>,
    /// Maximum number of tools running at once.
    pub max_concurrency: usize,
}

impl Default for AnnotationOptions {
    fn default() -> Self {
        Self {
            tool_timeout: Some(Duration::from_secs(600)),
            max_concurrency: 4,
        }
    }
}

impl AnnotationOptions {
    pub fn from_config(config: &MactaConfig) -> Self {
        Self {
            tool_timeout: config.tool_timeout(),
            max_concurrency: config.max_concurrency,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes and report
// ---------------------------------------------------------------------------

/// Terminal state of one tool in one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Succeeded {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
    /// The gate rejected the run parameters.
    Skipped { violations: Vec<String> },
    Failed {
        error: String,
        started_at: Option<DateTime<Utc>>,
        finished_at: DateTime<Utc>,
    },
    TimedOut {
        timeout_ms: u64,
        started_at: DateTime<Utc>,
    },
    /// The name was requested but no such tool is registered.
    NotRegistered,
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timed_out",
            Self::NotRegistered => "not_registered",
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationReport {
    pub run_id: Uuid,
    /// Results of the tools that succeeded, keyed by tool name.
    pub results: BTreeMap<String, StandardResult>,
    /// Terminal state of every tool the run considered.
    pub outcomes: BTreeMap<String, ToolOutcome>,
}

impl AnnotationReport {
    pub fn into_results(self) -> BTreeMap<String, StandardResult> {
        self.results
    }

    pub fn count(&self, label: &str) -> usize {
        self.outcomes.values().filter(|o| o.label() == label).count()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

enum TaskEnd {
    Finished(Result<StandardResult, ToolError>),
    TimedOut(Duration),
}

/// Run every selected, compatible tool of `registry` on `request`.
pub async fn annotate(
    registry: &ToolRegistry,
    request: AnnotationRequest,
    options: &AnnotationOptions,
) -> AnnotationReport {
    let run_id = Uuid::new_v4();
    let AnnotationRequest {
        expr,
        reference,
        annot_type,
        result_type,
        tools: selection,
        params,
    } = request;
    let run_params = Arc::new(gate_params(annot_type, result_type, &params));
    log::debug!(
        "Annotation run {}: annot_type={}, result_type={}, tools={}",
        run_id,
        annot_type,
        result_type,
        selection
    );

    let mut outcomes = BTreeMap::new();
    if let ToolSelection::Named(names) = &selection {
        for name in names.iter().filter(|name| !registry.contains(name)) {
            log::warn!("Requested tool `{}` is not registered", name);
            outcomes.insert(name.clone(), ToolOutcome::NotRegistered);
        }
    }

    let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
    let mut names = Vec::new();
    let mut handles = Vec::new();
    for entry in registry.iter().filter(|entry| selection.includes(entry.name())) {
        let name = entry.name().to_string();
        if let Some(gate) = entry.gate() {
            let violations = gate.violations(&run_params);
            if !violations.is_empty() {
                log::warn!(
                    "Skipping tool `{}`: incompatible with run parameters ({})",
                    name,
                    violations.join(", ")
                );
                let violations = violations.into_iter().map(str::to_string).collect();
                outcomes.insert(name, ToolOutcome::Skipped { violations });
                continue;
            }
        }

        let tool = Arc::clone(entry.tool());
        let expr = Arc::clone(&expr);
        let reference = Arc::clone(&reference);
        let params = Arc::clone(&run_params);
        let semaphore = Arc::clone(&semaphore);
        let timeout = options.tool_timeout;
        names.push(name);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let started_at = Utc::now();
            let control = match timeout {
                Some(limit) => RunControl::new().with_timeout(limit),
                None => RunControl::new(),
            };
            let run = tool.run_full(expr, reference, result_type, &params, &control);
            let end = match timeout {
                Some(limit) => match tokio::time::timeout(limit, run).await {
                    Ok(result) => TaskEnd::Finished(result),
                    Err(_) => {
                        control.cancel();
                        TaskEnd::TimedOut(limit)
                    }
                },
                None => TaskEnd::Finished(run.await),
            };
            (started_at, end)
        }));
    }

    let mut results = BTreeMap::new();
    let joined = futures::future::join_all(handles).await;
    for (name, joined) in names.into_iter().zip(joined) {
        let outcome = match joined {
            Ok((started_at, TaskEnd::Finished(Ok(result)))) => {
                match check_shape(&result, result_type, expr.obs_names()) {
                    Ok(()) => {
                        log::debug!("Tool `{}` succeeded", name);
                        results.insert(name.clone(), result);
                        ToolOutcome::Succeeded {
                            started_at,
                            finished_at: Utc::now(),
                        }
                    }
                    Err(error) => failed(&name, error, Some(started_at)),
                }
            }
            Ok((started_at, TaskEnd::Finished(Err(e)))) => {
                failed(&name, e.to_string(), Some(started_at))
            }
            Ok((started_at, TaskEnd::TimedOut(limit))) => {
                log::error!("Tool `{}` timed out after {:?}", name, limit);
                ToolOutcome::TimedOut {
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    started_at,
                }
            }
            Err(join_error) => failed(&name, describe_join_error(join_error), None),
        };
        outcomes.insert(name, outcome);
    }

    let report = AnnotationReport {
        run_id,
        results,
        outcomes,
    };
    log::info!(
        "Annotation run {} finished: {} succeeded, {} skipped, {} failed, {} timed out",
        run_id,
        report.count("succeeded"),
        report.count("skipped"),
        report.count("failed"),
        report.count("timed_out")
    );
    report
}

fn failed(name: &str, error: String, started_at: Option<DateTime<Utc>>) -> ToolOutcome {
    log::error!("Tool `{}` failed: {}", name, error);
    ToolOutcome::Failed {
        error,
        started_at,
        finished_at: Utc::now(),
    }
}

/// A result must have the requested shape and one entry per input
/// observation, in input order.
fn check_shape(
    result: &StandardResult,
    expected: ResultType,
    obs_names: &[String],
) -> Result<(), String> {
    if result.result_type() != expected {
        return Err(format!(
            "returned {} when {} were requested",
            result.result_type(),
            expected
        ));
    }
    if result.len() != obs_names.len() {
        return Err(format!(
            "returned {} entries for {} observations",
            result.len(),
            obs_names.len()
        ));
    }
    if result.obs_names() != obs_names {
        return Err("observation names do not match the input".to_string());
    }
    Ok(())
}

fn describe_join_error(error: tokio::task::JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("panicked: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::{EqualityRequirement, NotNoneRequirement, RequirementList};
    use crate::results::LabelSeries;
    use crate::tools::{Stage, ToolInterface};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy)]
    enum Behavior {
        Label(&'static str),
        Fail,
        Panic,
        Hang,
        WrongLength,
        WrongNames,
        /// Busy on the blocking pool until its control says stop.
        Spin,
    }

    /// Counts how many runs are inside `annotate` at once.
    #[derive(Debug, Default)]
    struct Tracker {
        active: AtomicUsize,
        peak: AtomicUsize,
        stopped: AtomicBool,
    }

    #[derive(Debug)]
    struct FakeTool {
        name: &'static str,
        behavior: Behavior,
        gate: Option<RequirementList>,
        tracker: Option<Arc<Tracker>>,
    }

    impl FakeTool {
        fn new(name: &'static str, behavior: Behavior) -> Self {
            Self {
                name,
                behavior,
                gate: None,
                tracker: None,
            }
        }

        fn gated(mut self, gate: RequirementList) -> Self {
            self.gate = Some(gate);
            self
        }

        fn tracked(mut self, tracker: Arc<Tracker>) -> Self {
            self.tracker = Some(tracker);
            self
        }
    }

    #[async_trait]
    impl ToolInterface for FakeTool {
        type Raw = (Vec<String>, Vec<String>);

        fn name(&self) -> &str {
            self.name
        }

        fn requirements(&self) -> Option<&RequirementList> {
            self.gate.as_ref()
        }

        async fn annotate(
            &self,
            expr: Arc<ExprData>,
            _reference: Arc<Reference>,
            _params: &Params,
            control: &RunControl,
        ) -> Result<Self::Raw, ToolError> {
            if let (Behavior::Spin, Some(tracker)) = (self.behavior, &self.tracker) {
                let control = control.clone();
                let tracker = Arc::clone(tracker);
                let spin = move || -> Result<(Vec<String>, Vec<String>), ToolError> {
                    while control.checkpoint(Stage::Annotate).is_ok() {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    tracker.stopped.store(true, Ordering::SeqCst);
                    Err(ToolError::Cancelled(Stage::Annotate))
                };
                return tokio::task::spawn_blocking(spin).await?;
            }
            if let Some(tracker) = &self.tracker {
                let now = tracker.active.fetch_add(1, Ordering::SeqCst) + 1;
                tracker.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                tracker.active.fetch_sub(1, Ordering::SeqCst);
            }
            let obs = expr.obs_names().to_vec();
            match self.behavior {
                Behavior::Label(label) => {
                    let labels = vec![label.to_string(); obs.len()];
                    Ok((obs, labels))
                }
                Behavior::Fail => Err(ToolError::MissingParameter("labels".to_string())),
                Behavior::Panic => panic!("backend crashed"),
                Behavior::Hang => std::future::pending().await,
                Behavior::WrongLength => Ok((vec!["c1".into()], vec!["X".into()])),
                Behavior::WrongNames => {
                    let renamed = (1..=obs.len()).map(|i| format!("x{i}")).collect();
                    Ok((renamed, vec!["X".to_string(); obs.len()]))
                }
                Behavior::Spin => Err(ToolError::MissingParameter("tracker".to_string())),
            }
        }

        fn convert(
            &self,
            (obs, labels): Self::Raw,
            convert_to: ResultType,
            _params: &Params,
        ) -> Result<StandardResult, ToolError> {
            match convert_to {
                ResultType::Labels => Ok(StandardResult::Labels(LabelSeries::new(obs, labels)?)),
                other => Err(ToolError::unsupported_conversion(self.name, other)),
            }
        }
    }

    fn registry(tools: Vec<FakeTool>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(Arc::new(tool) as Arc<dyn AnnotationTool>);
        }
        registry
    }

    fn request(annot_type: AnnotType) -> AnnotationRequest {
        let expr = ExprData::new(
            vec!["c1".into(), "c2".into(), "c3".into()],
            vec!["g1".into()],
            vec![vec![1.0], vec![2.0], vec![3.0]],
        )
        .unwrap();
        AnnotationRequest::new(expr, Reference::ModelName("m".into()), annot_type)
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let registry = registry(vec![
            FakeTool::new("ok", Behavior::Label("T")),
            FakeTool::new("broken", Behavior::Fail),
        ]);
        let report = annotate(&registry, request(AnnotType::Ref), &AnnotationOptions::default()).await;

        assert_eq!(report.results.keys().collect::<Vec<_>>(), vec!["ok"]);
        assert!(matches!(report.outcomes["broken"], ToolOutcome::Failed { .. }));
        assert!(report.outcomes["ok"].is_success());
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let registry = registry(vec![
            FakeTool::new("ok", Behavior::Label("T")),
            FakeTool::new("crashy", Behavior::Panic),
        ]);
        let report = annotate(&registry, request(AnnotType::Ref), &AnnotationOptions::default()).await;

        assert!(report.results.contains_key("ok"));
        match &report.outcomes["crashy"] {
            ToolOutcome::Failed { error, .. } => assert!(error.contains("backend crashed")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_named_selection_excludes_others() {
        let registry = registry(vec![
            FakeTool::new("a", Behavior::Label("A")),
            FakeTool::new("b", Behavior::Label("B")),
            FakeTool::new("c", Behavior::Label("C")),
        ]);
        let request = request(AnnotType::Ref).with_tools(ToolSelection::named(["a", "c"]));
        let report = annotate(&registry, request, &AnnotationOptions::default()).await;

        assert_eq!(report.results.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert!(!report.outcomes.contains_key("b"));
    }

    #[tokio::test]
    async fn test_wildcard_runs_every_compatible_tool() {
        let ref_only = RequirementList::new().with("annot_type", EqualityRequirement::new("ref"));
        let registry = registry(vec![
            FakeTool::new("a", Behavior::Label("A")),
            FakeTool::new("b", Behavior::Label("B")).gated(ref_only),
        ]);
        let request = request(AnnotType::Ref).with_tools("*".parse().unwrap());
        let report = annotate(&registry, request, &AnnotationOptions::default()).await;
        assert_eq!(report.results.len(), 2);
    }

    #[tokio::test]
    async fn test_gate_skips_incompatible_tool() {
        let ref_only = RequirementList::new().with("annot_type", EqualityRequirement::new("ref"));
        let registry = registry(vec![FakeTool::new("t1", Behavior::Label("T")).gated(ref_only)]);
        let report = annotate(&registry, request(AnnotType::Marker), &AnnotationOptions::default()).await;

        assert!(report.results.is_empty());
        assert_eq!(
            report.outcomes["t1"],
            ToolOutcome::Skipped {
                violations: vec!["annot_type".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_free_params_reach_the_gate() {
        let gate = RequirementList::new().with("batch_col", NotNoneRequirement::new());
        let registry = registry(vec![FakeTool::new("batchy", Behavior::Label("T")).gated(gate)]);

        let rejected = request(AnnotType::Ref).with_param("batch_col", Value::Null);
        let report = annotate(&registry, rejected, &AnnotationOptions::default()).await;
        assert!(report.results.is_empty());

        let accepted = request(AnnotType::Ref).with_param("batch_col", json!("batch"));
        let report = annotate(&registry, accepted, &AnnotationOptions::default()).await;
        assert_eq!(report.results.len(), 1);
    }

    #[tokio::test]
    async fn test_labels_cover_every_observation() {
        let registry = registry(vec![
            FakeTool::new("good", Behavior::Label("T")),
            FakeTool::new("short", Behavior::WrongLength),
        ]);
        let report = annotate(&registry, request(AnnotType::Ref), &AnnotationOptions::default()).await;

        let labels = report.results["good"].as_labels().unwrap();
        assert_eq!(labels.len(), 3);
        assert!(labels.labels().iter().all(|l| l == "T"));
        assert!(matches!(report.outcomes["short"], ToolOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_labels_must_name_the_input_observations() {
        let registry = registry(vec![FakeTool::new("renamed", Behavior::WrongNames)]);
        let report = annotate(&registry, request(AnnotType::Ref), &AnnotationOptions::default()).await;

        assert!(report.results.is_empty());
        match &report.outcomes["renamed"] {
            ToolOutcome::Failed { error, .. } => {
                assert!(error.contains("observation names do not match"))
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsupported_conversion_is_a_failure() {
        let registry = registry(vec![FakeTool::new("labels_only", Behavior::Label("T"))]);
        let request = request(AnnotType::Ref).with_result_type(ResultType::Scores);
        let report = annotate(&registry, request, &AnnotationOptions::default()).await;

        assert!(report.results.is_empty());
        match &report.outcomes["labels_only"] {
            ToolOutcome::Failed { error, .. } => assert!(error.contains("cannot convert")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hanging_tool_times_out_without_blocking_others() {
        let registry = registry(vec![
            FakeTool::new("slow", Behavior::Hang),
            FakeTool::new("fast", Behavior::Label("T")),
        ]);
        let options = AnnotationOptions {
            tool_timeout: Some(Duration::from_millis(100)),
            max_concurrency: 4,
        };
        let report = annotate(&registry, request(AnnotType::Ref), &options).await;

        assert!(report.results.contains_key("fast"));
        assert!(matches!(
            report.outcomes["slow"],
            ToolOutcome::TimedOut { timeout_ms: 100, .. }
        ));
    }

    #[tokio::test]
    async fn test_timeout_stops_blocking_work() {
        let tracker = Arc::new(Tracker::default());
        let registry = registry(vec![
            FakeTool::new("busy", Behavior::Spin).tracked(Arc::clone(&tracker))
        ]);
        let options = AnnotationOptions {
            tool_timeout: Some(Duration::from_millis(50)),
            max_concurrency: 1,
        };
        let report = annotate(&registry, request(AnnotType::Ref), &options).await;
        assert!(matches!(report.outcomes["busy"], ToolOutcome::TimedOut { .. }));

        for _ in 0..200 {
            if tracker.stopped.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(tracker.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unknown_names_are_reported_not_raised() {
        let registry = registry(vec![FakeTool::new("a", Behavior::Label("A"))]);
        let request = request(AnnotType::Ref).with_tools("a, ghost".parse().unwrap());
        let report = annotate(&registry, request, &AnnotationOptions::default()).await;

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.outcomes["ghost"], ToolOutcome::NotRegistered);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let tracker = Arc::new(Tracker::default());
        let tools = ["a", "b", "c", "d", "e"]
            .into_iter()
            .map(|name| FakeTool::new(name, Behavior::Label("X")).tracked(Arc::clone(&tracker)))
            .collect();
        let registry = registry(tools);
        let options = AnnotationOptions {
            tool_timeout: None,
            max_concurrency: 2,
        };
        let report = annotate(&registry, request(AnnotType::Ref), &options).await;

        assert_eq!(report.results.len(), 5);
        assert!(tracker.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_selection_parsing() {
        assert_eq!("*".parse::<ToolSelection>().unwrap(), ToolSelection::All);
        assert_eq!(
            "a,b c".parse::<ToolSelection>().unwrap(),
            ToolSelection::named(["a", "b", "c"])
        );
        assert_eq!(
            ToolSelection::from_tokens(&["a,b", "c"]),
            ToolSelection::named(["a", "b", "c"])
        );
        assert_eq!(ToolSelection::from_tokens(&["*"]), ToolSelection::All);
        assert!(!ToolSelection::named(["a"]).includes("b"));
        assert_eq!(ToolSelection::named(["b", "a"]).to_string(), "a,b");
    }
}
