//! Reference inputs: marker lists and the reference union every tool receives.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::DataError;
use super::expression::ExprData;
use super::model::CentroidModel;

// ---------------------------------------------------------------------------
// MarkerList
// ---------------------------------------------------------------------------

/// Cell type -> marker feature names.
///
/// JSON form: `{ "T cell": ["CD3E", "CD3D"], "B cell": ["MS4A1"] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Vec<String>>", into = "BTreeMap<String, Vec<String>>")]
pub struct MarkerList {
    markers: BTreeMap<String, Vec<String>>,
}

impl MarkerList {
    pub fn new(markers: BTreeMap<String, Vec<String>>) -> Result<Self, DataError> {
        if markers.is_empty() {
            return Err(DataError::InvalidMarkers("no cell types".to_string()));
        }
        if let Some((cell_type, _)) = markers.iter().find(|(_, genes)| genes.is_empty()) {
            return Err(DataError::InvalidMarkers(format!(
                "cell type `{cell_type}` has no markers"
            )));
        }
        Ok(Self { markers })
    }

    pub fn cell_types(&self) -> impl Iterator<Item = &str> {
        self.markers.keys().map(String::as_str)
    }

    pub fn markers(&self, cell_type: &str) -> Option<&[String]> {
        self.markers.get(cell_type).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.markers
            .iter()
            .map(|(cell_type, genes)| (cell_type.as_str(), genes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

impl TryFrom<BTreeMap<String, Vec<String>>> for MarkerList {
    type Error = DataError;

    fn try_from(markers: BTreeMap<String, Vec<String>>) -> Result<Self, Self::Error> {
        Self::new(markers)
    }
}

impl From<MarkerList> for BTreeMap<String, Vec<String>> {
    fn from(list: MarkerList) -> Self {
        list.markers
    }
}

// ---------------------------------------------------------------------------
// Reference
// ---------------------------------------------------------------------------

/// Reference or marker data handed to a tool.
///
/// Which variant a tool accepts depends on the tool and the annotation type;
/// `preprocess_ref` typically turns one variant into another (an annotated
/// dataset or a model name into a trained model).
#[derive(Debug, Clone)]
pub enum Reference {
    /// A labelled reference dataset.
    Annotated(ExprData),
    /// The name of a pretrained model in the local model cache.
    ModelName(String),
    /// A trained model.
    Model(CentroidModel),
    /// A marker list.
    Markers(MarkerList),
}

impl Reference {
    /// Short variant name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Annotated(_) => "annotated dataset",
            Self::ModelName(_) => "model name",
            Self::Model(_) => "trained model",
            Self::Markers(_) => "marker list",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_list_rejects_empty_inputs() {
        assert!(MarkerList::new(BTreeMap::new()).is_err());

        let mut markers = BTreeMap::new();
        markers.insert("T".to_string(), vec![]);
        let err = MarkerList::new(markers).unwrap_err();
        assert!(err.to_string().contains("`T` has no markers"));
    }

    #[test]
    fn test_marker_list_json_shape() {
        let list: MarkerList =
            serde_json::from_str(r#"{"T": ["CD3E", "CD3D"], "B": ["MS4A1"]}"#).unwrap();
        assert_eq!(list.cell_types().collect::<Vec<_>>(), vec!["B", "T"]);
        assert_eq!(list.markers("T").unwrap(), ["CD3E", "CD3D"]);
        assert!(serde_json::from_str::<MarkerList>("{}").is_err());
    }
}
