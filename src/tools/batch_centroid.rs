//! Batch-aware reference annotation.
//!
//! Removes per-batch offsets by centring every batch of the reference on its
//! own mean before training class centroids, and centres the query the same
//! way. Only label output is supported.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::data::{CentroidModel, DataError, ExprData, Reference};
use crate::params::{
    param_str, Params, ResultType, ANNOT_TYPE_KEY, BATCH_COL_KEY, CELL_TYPE_COL_KEY,
};
use crate::requirements::{EqualityRequirement, NotNoneRequirement, RequirementList};
use crate::results::{ScoreTable, StandardResult};
use crate::tools::score_against_model;
use crate::tools::tool_interface::{RunControl, Stage, ToolError, ToolInterface};

/// Registry name.
pub const NAME: &str = "batch_centroid";

/// Batch-centred nearest-centroid tool.
#[derive(Debug)]
pub struct BatchCentroidTool {
    requirements: RequirementList,
}

impl BatchCentroidTool {
    pub fn new() -> Self {
        let requirements = RequirementList::new()
            .with(ANNOT_TYPE_KEY, EqualityRequirement::new("ref"))
            .with(BATCH_COL_KEY, NotNoneRequirement::new())
            .with(CELL_TYPE_COL_KEY, NotNoneRequirement::new());
        Self { requirements }
    }
}

impl Default for BatchCentroidTool {
    fn default() -> Self {
        Self::new()
    }
}

fn required<'a>(params: &'a Params, key: &str) -> Result<&'a str, ToolError> {
    param_str(params, key).ok_or_else(|| ToolError::MissingParameter(key.to_string()))
}

/// Subtract the per-group feature mean from every row. With no groups the
/// whole dataset is one group. `groups` needs one entry per observation.
pub fn center_by_group(expr: &ExprData, groups: Option<&[String]>) -> Result<ExprData, DataError> {
    if let Some(g) = groups.filter(|g| g.len() != expr.n_obs()) {
        return Err(DataError::ColumnLength {
            name: "groups".to_string(),
            len: g.len(),
            expected: expr.n_obs(),
        });
    }
    let group_of = |row: usize| groups.map_or("", |g| g[row].as_str());

    let mut sums: HashMap<&str, (Vec<f64>, usize)> = HashMap::new();
    for (i, row) in expr.rows().iter().enumerate() {
        let (sum, count) = sums
            .entry(group_of(i))
            .or_insert_with(|| (vec![0.0; expr.n_vars()], 0));
        for (acc, v) in sum.iter_mut().zip(row) {
            *acc += v;
        }
        *count += 1;
    }
    let means: HashMap<&str, Vec<f64>> = sums
        .into_iter()
        .map(|(group, (sum, count))| {
            (group, sum.into_iter().map(|v| v / count as f64).collect())
        })
        .collect();

    expr.map_rows(|i, row| match means.get(group_of(i)) {
        Some(mean) => row.iter().zip(mean).map(|(v, m)| v - m).collect(),
        None => row.to_vec(),
    })
}

#[async_trait]
impl ToolInterface for BatchCentroidTool {
    type Raw = ScoreTable;

    fn name(&self) -> &str {
        NAME
    }

    fn requirements(&self) -> Option<&RequirementList> {
        Some(&self.requirements)
    }

    /// Centre the query, per batch when it carries the batch column.
    async fn preprocess_expr(
        &self,
        expr: Arc<ExprData>,
        params: &Params,
        control: &RunControl,
    ) -> Result<Arc<ExprData>, ToolError> {
        let batch_col = param_str(params, BATCH_COL_KEY).map(str::to_string);
        let control = control.clone();
        let centred = tokio::task::spawn_blocking(move || -> Result<ExprData, ToolError> {
            control.checkpoint(Stage::PreprocessExpr)?;
            let groups = batch_col.as_deref().and_then(|col| expr.column(col).ok());
            Ok(center_by_group(&expr, groups)?)
        })
        .await??;
        Ok(Arc::new(centred))
    }

    async fn preprocess_ref(
        &self,
        reference: Arc<Reference>,
        params: &Params,
        control: &RunControl,
    ) -> Result<Arc<Reference>, ToolError> {
        if !matches!(*reference, Reference::Annotated(_)) {
            return Err(ToolError::unsupported_reference(NAME, &reference));
        }
        let batch_col = required(params, BATCH_COL_KEY)?.to_string();
        let cell_type_col = required(params, CELL_TYPE_COL_KEY)?.to_string();
        let control = control.clone();

        let model = tokio::task::spawn_blocking(move || -> Result<CentroidModel, ToolError> {
            let data = match &*reference {
                Reference::Annotated(data) => data,
                other => return Err(ToolError::unsupported_reference(NAME, other)),
            };
            control.checkpoint(Stage::PreprocessRef)?;
            let centred = center_by_group(data, Some(data.column(&batch_col)?))?;
            control.checkpoint(Stage::PreprocessRef)?;
            Ok(CentroidModel::train(&centred, &cell_type_col)?)
        })
        .await??;
        log::debug!("{}: trained {} classes", NAME, model.classes().len());
        Ok(Arc::new(Reference::Model(model)))
    }

    async fn annotate(
        &self,
        expr: Arc<ExprData>,
        reference: Arc<Reference>,
        _params: &Params,
        control: &RunControl,
    ) -> Result<Self::Raw, ToolError> {
        score_against_model(expr, reference, NAME, control).await
    }

    fn convert(
        &self,
        raw: Self::Raw,
        convert_to: ResultType,
        _params: &Params,
    ) -> Result<StandardResult, ToolError> {
        match convert_to {
            ResultType::Labels => Ok(StandardResult::Labels(raw.best_labels())),
            other => Err(ToolError::unsupported_conversion(NAME, other)),
        }
    }
}
