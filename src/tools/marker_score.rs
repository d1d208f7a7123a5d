//! Marker-based annotation by mean marker expression.
//!
//! Expression is library-size normalised and log-transformed, then each cell
//! type is scored by the mean of its marker genes. Markers missing from the
//! query are ignored; a cell type with no marker present scores zero.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::data::{DataError, ExprData, MarkerList, Reference};
use crate::params::{Params, ResultType, ANNOT_TYPE_KEY, RESULT_TYPE_KEY};
use crate::requirements::{
    ContainsRequirement, EqualityRequirement, RequirementError, RequirementList,
};
use crate::results::{ScoreTable, StandardResult};
use crate::tools::tool_interface::{RunControl, Stage, ToolError, ToolInterface};

/// Registry name.
pub const NAME: &str = "marker_score";

/// Counts per observation after normalisation.
const TARGET_SUM: f64 = 1e4;

/// Mean-marker-expression annotation tool.
#[derive(Debug)]
pub struct MarkerScoreTool {
    requirements: RequirementList,
}

impl MarkerScoreTool {
    pub fn new() -> Result<Self, RequirementError> {
        let requirements = RequirementList::new()
            .with(ANNOT_TYPE_KEY, EqualityRequirement::new("marker"))
            .with(
                RESULT_TYPE_KEY,
                ContainsRequirement::new(json!(["labels", "scores"]))?,
            );
        Ok(Self { requirements })
    }
}

/// Scale each row to [`TARGET_SUM`] then apply `ln(1 + x)`. Negative values
/// are treated as zero counts.
pub fn normalize(expr: &ExprData) -> Result<ExprData, DataError> {
    expr.map_rows(|_, row| {
        let total: f64 = row.iter().map(|v| v.max(0.0)).sum();
        let scale = if total > 0.0 { TARGET_SUM / total } else { 0.0 };
        row.iter().map(|v| (v.max(0.0) * scale).ln_1p()).collect()
    })
}

/// Mean expression of each cell type's markers, per observation.
pub fn marker_scores(expr: &ExprData, markers: &MarkerList) -> Result<ScoreTable, DataError> {
    let index = expr.var_index();
    let mut classes = Vec::with_capacity(markers.len());
    let mut columns: Vec<Vec<usize>> = Vec::with_capacity(markers.len());
    for (cell_type, genes) in markers.iter() {
        let present: Vec<usize> = genes
            .iter()
            .filter_map(|g| index.get(g.as_str()).copied())
            .collect();
        if present.is_empty() {
            log::debug!("{}: no markers of `{}` in the query", NAME, cell_type);
        }
        classes.push(cell_type.to_string());
        columns.push(present);
    }
    if columns.iter().all(Vec::is_empty) {
        return Err(DataError::NoSharedFeatures("the marker list".to_string()));
    }

    let values = expr
        .rows()
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|cols| {
                    if cols.is_empty() {
                        0.0
                    } else {
                        cols.iter().map(|&c| row[c]).sum::<f64>() / cols.len() as f64
                    }
                })
                .collect()
        })
        .collect();
    ScoreTable::new(expr.obs_names().to_vec(), classes, values)
}

#[async_trait]
impl ToolInterface for MarkerScoreTool {
    type Raw = ScoreTable;

    fn name(&self) -> &str {
        NAME
    }

    fn requirements(&self) -> Option<&RequirementList> {
        Some(&self.requirements)
    }

    async fn preprocess_expr(
        &self,
        expr: Arc<ExprData>,
        _params: &Params,
        control: &RunControl,
    ) -> Result<Arc<ExprData>, ToolError> {
        let control = control.clone();
        let normalized = tokio::task::spawn_blocking(move || -> Result<ExprData, ToolError> {
            control.checkpoint(Stage::PreprocessExpr)?;
            Ok(normalize(&expr)?)
        })
        .await??;
        Ok(Arc::new(normalized))
    }

    async fn preprocess_ref(
        &self,
        reference: Arc<Reference>,
        _params: &Params,
        _control: &RunControl,
    ) -> Result<Arc<Reference>, ToolError> {
        match &*reference {
            Reference::Markers(_) => Ok(reference),
            other => Err(ToolError::unsupported_reference(NAME, other)),
        }
    }

    async fn annotate(
        &self,
        expr: Arc<ExprData>,
        reference: Arc<Reference>,
        _params: &Params,
        control: &RunControl,
    ) -> Result<Self::Raw, ToolError> {
        let control = control.clone();
        tokio::task::spawn_blocking(move || -> Result<ScoreTable, ToolError> {
            control.checkpoint(Stage::Annotate)?;
            match &*reference {
                Reference::Markers(markers) => {
                    marker_scores(&expr, markers).map_err(ToolError::from)
                }
                other => Err(ToolError::unsupported_reference(NAME, other)),
            }
        })
        .await?
    }

    fn convert(
        &self,
        raw: Self::Raw,
        convert_to: ResultType,
        _params: &Params,
    ) -> Result<StandardResult, ToolError> {
        Ok(match convert_to {
            ResultType::Labels => StandardResult::Labels(raw.best_labels()),
            ResultType::Scores => StandardResult::Scores(raw),
        })
    }
}
