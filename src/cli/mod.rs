//! Command-line interface.
//!
//! ```text
//! macta run <expr> <ref> <annot_type> <convert_to> <output> [-t TOOLS...] [flags]
//! macta list tools
//! ```
//!
//! Tool flags that are not given reach the gates as `null`, so a tool that
//! needs `--batch-col` is skipped rather than failing mid-run.

pub mod loader;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use crate::annotate::{annotate, AnnotationOptions, AnnotationReport, AnnotationRequest, ToolSelection};
use crate::config::MactaConfig;
use crate::params::{
    AnnotType, Params, ResultType, BATCH_COL_KEY, CELL_TYPE_COL_KEY, FORCE_UPDATE_KEY, LABELS_KEY,
    UPDATE_MODELS_KEY,
};
use crate::registry::ToolRegistry;

/// Multi-tool cell-type annotation.
#[derive(Debug, Parser)]
#[command(name = "macta")]
#[command(version, about = "Run cell-type annotation tools and collect their results")]
pub struct Cli {
    /// YAML configuration file (defaults to $MACTA_CONFIG)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Annotate a dataset with every selected, compatible tool
    Run(RunArgs),

    /// List registry contents
    List {
        #[command(subcommand)]
        what: ListCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ListCommands {
    /// Names of the tools available in this build and environment
    Tools,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Expression dataset (JSON)
    pub expr: PathBuf,

    /// Reference: marker list, annotated dataset, model file or model name
    #[arg(value_name = "REF")]
    pub reference: PathBuf,

    /// Annotation type: ref or marker
    pub annot_type: AnnotType,

    /// Result type: labels or scores
    pub convert_to: ResultType,

    /// Where to write the result mapping (JSON)
    pub output: PathBuf,

    /// Tools to run, comma- or space-delimited; `*` for all
    #[arg(short = 't', long = "tools", num_args = 1.., default_value = "*")]
    pub tools: Vec<String>,

    /// Refresh the pretrained model cache before loading a named model
    #[arg(long = "update-models", alias = "update_models")]
    pub update_models: bool,

    /// Re-download every pretrained model, even cached ones
    #[arg(long = "force-update", alias = "force_update")]
    pub force_update: bool,

    /// Observation column holding batch identifiers
    #[arg(long = "batch-col", alias = "batch_col", value_name = "COL")]
    pub batch_col: Option<String>,

    /// Reference observation column holding cell types
    #[arg(long = "cell-type-col", alias = "cell_type_col", value_name = "COL")]
    pub cell_type_col: Option<String>,

    /// Reference observation column holding training labels
    #[arg(long, value_name = "COL")]
    pub labels: Option<String>,

    /// Also write the per-tool outcomes of the run (JSON)
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

impl RunArgs {
    pub fn selection(&self) -> ToolSelection {
        ToolSelection::from_tokens(&self.tools)
    }

    /// Free run parameters. Absent column flags are passed as `null`.
    pub fn params(&self) -> Params {
        let column = |value: &Option<String>| value.clone().map_or(Value::Null, Value::String);
        let mut params = Params::new();
        params.insert(BATCH_COL_KEY.to_string(), column(&self.batch_col));
        params.insert(CELL_TYPE_COL_KEY.to_string(), column(&self.cell_type_col));
        params.insert(LABELS_KEY.to_string(), column(&self.labels));
        params.insert(UPDATE_MODELS_KEY.to_string(), Value::Bool(self.update_models));
        params.insert(FORCE_UPDATE_KEY.to_string(), Value::Bool(self.force_update));
        params
    }

    /// Load both inputs and build the request.
    pub fn request(&self) -> anyhow::Result<AnnotationRequest> {
        let expr = loader::load_expr(&self.expr)
            .with_context(|| format!("failed to load expression data {}", self.expr.display()))?;
        let reference = loader::load_reference(&self.reference, self.annot_type)
            .with_context(|| format!("failed to load reference {}", self.reference.display()))?;
        Ok(AnnotationRequest::new(expr, reference, self.annot_type)
            .with_result_type(self.convert_to)
            .with_tools(self.selection())
            .with_params(self.params()))
    }
}

/// Dispatch a parsed command line.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = MactaConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let registry = ToolRegistry::with_available(&config).context("failed to build tool registry")?;

    match cli.command {
        Commands::Run(args) => run(&registry, &config, &args).await.map(|_| ()),
        Commands::List {
            what: ListCommands::Tools,
        } => {
            for name in registry.names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

/// Execute `macta run` against `registry` and write its outputs.
pub async fn run(
    registry: &ToolRegistry,
    config: &MactaConfig,
    args: &RunArgs,
) -> anyhow::Result<AnnotationReport> {
    let request = args.request()?;
    let report = annotate(registry, request, &AnnotationOptions::from_config(config)).await;

    for (tool, outcome) in &report.outcomes {
        log::info!("{}: {}", tool, outcome.label());
    }
    if report.results.is_empty() {
        log::warn!("No tool produced a result for run {}", report.run_id);
    }

    write_json(&args.output, &report.results)?;
    log::info!("Wrote {} result(s) to {}", report.results.len(), args.output.display());
    if let Some(path) = &args.report {
        write_json(path, &report)?;
    }
    Ok(report)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["macta", "run", "expr.json", "ref.json", "ref", "labels", "out.json"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_run_defaults() {
        let args = run_args(&[]);
        assert_eq!(args.annot_type, AnnotType::Ref);
        assert_eq!(args.convert_to, ResultType::Labels);
        assert_eq!(args.selection(), ToolSelection::All);

        let params = args.params();
        assert_eq!(params[BATCH_COL_KEY], Value::Null);
        assert_eq!(params[CELL_TYPE_COL_KEY], Value::Null);
        assert_eq!(params[UPDATE_MODELS_KEY], Value::Bool(false));
    }

    #[test]
    fn test_parse_run_flags() {
        let args = run_args(&[
            "-t",
            "centroid,marker_score",
            "batch_centroid",
            "--batch_col",
            "batch",
            "--cell-type-col",
            "cell_type",
            "--update-models",
        ]);
        assert_eq!(
            args.selection(),
            ToolSelection::named(["batch_centroid", "centroid", "marker_score"])
        );
        let params = args.params();
        assert_eq!(params[BATCH_COL_KEY], Value::from("batch"));
        assert_eq!(params[CELL_TYPE_COL_KEY], Value::from("cell_type"));
        assert_eq!(params[UPDATE_MODELS_KEY], Value::Bool(true));
        assert_eq!(params[FORCE_UPDATE_KEY], Value::Bool(false));
    }

    #[test]
    fn test_parse_rejects_bad_discriminators() {
        let argv = ["macta", "run", "e.json", "r.json", "atlas", "labels", "out.json"];
        assert!(Cli::try_parse_from(argv).is_err());
        let argv = ["macta", "run", "e.json", "r.json", "ref", "probabilities", "out.json"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_parse_list_tools() {
        let cli = Cli::try_parse_from(["macta", "--config", "m.yaml", "list", "tools"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("m.yaml")));
        assert!(matches!(
            cli.command,
            Commands::List {
                what: ListCommands::Tools
            }
        ));
    }

    #[cfg(feature = "marker-score")]
    #[tokio::test]
    async fn test_run_writes_result_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let expr = dir.path().join("expr.json");
        std::fs::write(
            &expr,
            r#"{"obs_names":["c1","c2"],"var_names":["CD3E","MS4A1"],"x":[[5,0],[0,7]]}"#,
        )
        .unwrap();
        let markers = dir.path().join("markers.json");
        std::fs::write(&markers, r#"{"T":["CD3E"],"B":["MS4A1"]}"#).unwrap();
        let output = dir.path().join("out").join("results.json");
        let report_path = dir.path().join("report.json");

        let mut config = MactaConfig::default();
        config.models.dir = dir.path().join("models");
        let registry = ToolRegistry::with_available(&config).unwrap();

        let args = RunArgs {
            expr,
            reference: markers,
            annot_type: AnnotType::Marker,
            convert_to: ResultType::Labels,
            output: output.clone(),
            tools: vec!["*".to_string()],
            update_models: false,
            force_update: false,
            batch_col: None,
            cell_type_col: None,
            labels: None,
            report: Some(report_path.clone()),
        };
        let report = run(&registry, &config, &args).await.unwrap();

        assert_eq!(report.results.keys().collect::<Vec<_>>(), vec!["marker_score"]);
        let labels = report.results["marker_score"].as_labels().unwrap();
        assert_eq!(labels.labels(), ["T", "B"]);

        let written: Value = serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(written["marker_score"]["labels"], serde_json::json!(["T", "B"]));
        let outcomes: Value =
            serde_json::from_slice(&std::fs::read(&report_path).unwrap()).unwrap();
        assert_eq!(outcomes["outcomes"]["marker_score"]["status"], "succeeded");
    }
}
