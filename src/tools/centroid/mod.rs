//! Reference-based nearest-centroid annotation.
//!
//! The reference may be a labelled dataset (a model is trained from it), the
//! name of a cached pretrained model, or a trained model. Each query
//! observation is scored by cosine similarity against every class centroid.

pub mod model_store;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::data::{CentroidModel, ExprData, Reference};
use crate::params::{
    param_bool, param_str, Params, ResultType, ANNOT_TYPE_KEY, CELL_TYPE_COL_KEY,
    FORCE_UPDATE_KEY, LABELS_KEY, RESULT_TYPE_KEY, UPDATE_MODELS_KEY,
};
use crate::requirements::{
    ContainsRequirement, EqualityRequirement, RequirementError, RequirementList,
};
use crate::results::{ScoreTable, StandardResult};
use crate::tools::score_against_model;
use crate::tools::tool_interface::{RunControl, Stage, ToolError, ToolInterface};

pub use model_store::{ModelIndexEntry, ModelStore};

/// Registry name.
pub const NAME: &str = "centroid";

/// Nearest-centroid annotation tool.
#[derive(Debug)]
pub struct CentroidTool {
    requirements: RequirementList,
    store: ModelStore,
}

impl CentroidTool {
    pub fn new(store: ModelStore) -> Result<Self, RequirementError> {
        let requirements = RequirementList::new()
            .with(ANNOT_TYPE_KEY, EqualityRequirement::new("ref"))
            .with(
                RESULT_TYPE_KEY,
                ContainsRequirement::new(json!(["labels", "scores"]))?,
            );
        Ok(Self {
            requirements,
            store,
        })
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    async fn load_named(&self, name: &str, params: &Params) -> Result<CentroidModel, ToolError> {
        let force = param_bool(params, FORCE_UPDATE_KEY, false);
        if force || param_bool(params, UPDATE_MODELS_KEY, false) {
            let downloaded = self.store.update(force).await?;
            log::info!("{}: model cache refreshed, {} new", NAME, downloaded.len());
        }
        self.store.load(name).await
    }
}

/// Name of the reference label column: `labels`, else `cell_type_col`.
fn label_column(params: &Params) -> Result<&str, ToolError> {
    param_str(params, LABELS_KEY)
        .or_else(|| param_str(params, CELL_TYPE_COL_KEY))
        .ok_or_else(|| ToolError::MissingParameter(LABELS_KEY.to_string()))
}

#[async_trait]
impl ToolInterface for CentroidTool {
    type Raw = ScoreTable;

    fn name(&self) -> &str {
        NAME
    }

    fn requirements(&self) -> Option<&RequirementList> {
        Some(&self.requirements)
    }

    fn probe(&self) -> bool {
        self.store.is_usable()
    }

    async fn preprocess_ref(
        &self,
        reference: Arc<Reference>,
        params: &Params,
        control: &RunControl,
    ) -> Result<Arc<Reference>, ToolError> {
        match &*reference {
            Reference::Model(_) => Ok(reference),
            Reference::ModelName(name) => {
                let model = self.load_named(name, params).await?;
                Ok(Arc::new(Reference::Model(model)))
            }
            Reference::Annotated(_) => {
                let label_col = label_column(params)?.to_string();
                let control = control.clone();
                let model = tokio::task::spawn_blocking(move || -> Result<_, ToolError> {
                    control.checkpoint(Stage::PreprocessRef)?;
                    match &*reference {
                        Reference::Annotated(data) => {
                            CentroidModel::train(data, &label_col).map_err(ToolError::from)
                        }
                        other => Err(ToolError::unsupported_reference(NAME, other)),
                    }
                })
                .await??;
                log::debug!("{}: trained {} classes", NAME, model.classes().len());
                Ok(Arc::new(Reference::Model(model)))
            }
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
        score_against_model(expr, reference, NAME, control).await
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
