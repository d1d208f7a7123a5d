//! Loading datasets and references from JSON files.

use std::path::Path;

use serde_json::Value;

use crate::data::{CentroidModel, DataError, ExprData, MarkerList, Reference};
use crate::params::AnnotType;

/// Read an expression dataset.
pub fn load_expr(path: &Path) -> Result<ExprData, DataError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Read the reference for `annot_type`.
///
/// * `marker`: the file is a marker list.
/// * `ref`: the file is a serialized model (it has `centroids`) or a labelled
///   dataset. When no such file exists the argument is taken as the name of a
///   cached pretrained model.
pub fn load_reference(path: &Path, annot_type: AnnotType) -> Result<Reference, DataError> {
    match annot_type {
        AnnotType::Marker => {
            let bytes = std::fs::read(path)?;
            Ok(Reference::Markers(serde_json::from_slice::<MarkerList>(&bytes)?))
        }
        AnnotType::Ref if !path.exists() => {
            let name = path.to_string_lossy().to_string();
            log::debug!("No reference file at {}, treating it as a model name", name);
            Ok(Reference::ModelName(name))
        }
        AnnotType::Ref => {
            let bytes = std::fs::read(path)?;
            let doc: Value = serde_json::from_slice(&bytes)?;
            if doc.get("centroids").is_some() {
                Ok(Reference::Model(serde_json::from_value::<CentroidModel>(doc)?))
            } else {
                Ok(Reference::Annotated(serde_json::from_value::<ExprData>(doc)?))
            }
        }
    }
}
