//! Nearest-centroid classification models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::DataError;
use super::expression::ExprData;
use crate::results::ScoreTable;

/// Per-class mean expression profiles over a fixed feature set.
///
/// JSON form:
/// ```json
/// {
///   "name": "immune_basic",
///   "features": ["CD3E", "MS4A1"],
///   "classes": ["B", "T"],
///   "centroids": [[0.1, 6.8], [5.2, 0.0]]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCentroidModel")]
pub struct CentroidModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    features: Vec<String>,
    classes: Vec<String>,
    centroids: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct RawCentroidModel {
    #[serde(default)]
    name: Option<String>,
    features: Vec<String>,
    classes: Vec<String>,
    centroids: Vec<Vec<f64>>,
}

impl TryFrom<RawCentroidModel> for CentroidModel {
    type Error = DataError;

    fn try_from(raw: RawCentroidModel) -> Result<Self, Self::Error> {
        let model = Self::new(raw.features, raw.classes, raw.centroids)?;
        Ok(match raw.name {
            Some(name) => model.with_name(name),
            None => model,
        })
    }
}

impl CentroidModel {
    pub fn new(
        features: Vec<String>,
        classes: Vec<String>,
        centroids: Vec<Vec<f64>>,
    ) -> Result<Self, DataError> {
        if classes.is_empty() {
            return Err(DataError::InvalidModel("model has no classes".to_string()));
        }
        if features.is_empty() {
            return Err(DataError::InvalidModel("model has no features".to_string()));
        }
        if centroids.len() != classes.len() {
            return Err(DataError::InvalidModel(format!(
                "{} centroids for {} classes",
                centroids.len(),
                classes.len()
            )));
        }
        for (row, centroid) in centroids.iter().enumerate() {
            if centroid.len() != features.len() {
                return Err(DataError::RowLength {
                    row,
                    len: centroid.len(),
                    vars: features.len(),
                });
            }
            if let Some(col) = centroid.iter().position(|v| !v.is_finite()) {
                return Err(DataError::NonFinite { row, col });
            }
        }
        let mut seen = std::collections::HashSet::new();
        for class in &classes {
            if !seen.insert(class.as_str()) {
                return Err(DataError::DuplicateName {
                    kind: "class",
                    name: class.clone(),
                });
            }
        }
        Ok(Self {
            name: None,
            features,
            classes,
            centroids,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Average the rows of `data` per label found in observation column
    /// `label_col`. Classes come out in sorted order.
    pub fn train(data: &ExprData, label_col: &str) -> Result<Self, DataError> {
        let labels = data.column(label_col)?;
        let mut sums: BTreeMap<&str, (Vec<f64>, usize)> = BTreeMap::new();
        for (row, label) in data.rows().iter().zip(labels) {
            let (sum, count) = sums
                .entry(label.as_str())
                .or_insert_with(|| (vec![0.0; data.n_vars()], 0));
            for (acc, v) in sum.iter_mut().zip(row) {
                *acc += v;
            }
            *count += 1;
        }

        let mut classes = Vec::with_capacity(sums.len());
        let mut centroids = Vec::with_capacity(sums.len());
        for (label, (sum, count)) in sums {
            classes.push(label.to_string());
            centroids.push(sum.into_iter().map(|v| v / count as f64).collect());
        }
        Self::new(data.var_names().to_vec(), classes, centroids)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    /// Cosine similarity of every observation in `data` to every class
    /// centroid, over the features both sides share. A zero-norm vector has
    /// similarity 0 to everything.
    pub fn similarities(&self, data: &ExprData) -> Result<ScoreTable, DataError> {
        let index = data.var_index();
        let shared: Vec<(usize, usize)> = self
            .features
            .iter()
            .enumerate()
            .filter_map(|(m, f)| index.get(f.as_str()).map(|&d| (m, d)))
            .collect();
        if shared.is_empty() {
            return Err(DataError::NoSharedFeatures(self.describe()));
        }

        let centroids: Vec<Vec<f64>> = self
            .centroids
            .iter()
            .map(|c| shared.iter().map(|&(m, _)| c[m]).collect())
            .collect();
        let centroid_norms: Vec<f64> = centroids.iter().map(|c| norm(c)).collect();

        let values = data
            .rows()
            .iter()
            .map(|row| {
                let q: Vec<f64> = shared.iter().map(|&(_, d)| row[d]).collect();
                let q_norm = norm(&q);
                centroids
                    .iter()
                    .zip(&centroid_norms)
                    .map(|(c, c_norm)| {
                        if q_norm == 0.0 || *c_norm == 0.0 {
                            0.0
                        } else {
                            dot(&q, c) / (q_norm * c_norm)
                        }
                    })
                    .collect()
            })
            .collect();

        ScoreTable::new(data.obs_names().to_vec(), self.classes.clone(), values)
    }

    fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("model `{name}`"),
            None => "the model".to_string(),
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> ExprData {
        ExprData::new(
            vec!["r1".into(), "r2".into(), "r3".into()],
            vec!["CD3E".into(), "MS4A1".into()],
            vec![vec![4.0, 0.0], vec![6.0, 0.0], vec![0.0, 8.0]],
        )
        .unwrap()
        .with_obs_column("cell_type", vec!["T".into(), "T".into(), "B".into()])
        .unwrap()
    }

    #[test]
    fn test_train_averages_per_class() {
        let model = CentroidModel::train(&reference(), "cell_type").unwrap();
        assert_eq!(model.classes(), ["B", "T"]);
        assert_eq!(model.centroids()[1], vec![5.0, 0.0]);
        assert_eq!(model.centroids()[0], vec![0.0, 8.0]);
    }

    #[test]
    fn test_train_missing_label_column() {
        let err = CentroidModel::train(&reference(), "labels").unwrap_err();
        assert!(matches!(err, DataError::MissingColumn(col) if col == "labels"));
    }

    #[test]
    fn test_similarities_align_on_shared_features() {
        let model = CentroidModel::train(&reference(), "cell_type").unwrap();
        // Query carries an extra gene and a different column order.
        let query = ExprData::new(
            vec!["q1".into(), "q2".into(), "q3".into()],
            vec!["MS4A1".into(), "XIST".into(), "CD3E".into()],
            vec![vec![0.0, 9.0, 3.0], vec![5.0, 1.0, 0.0], vec![0.0, 0.0, 0.0]],
        )
        .unwrap();
        let scores = model.similarities(&query).unwrap();
        assert_eq!(scores.classes(), ["B", "T"]);
        assert!((scores.rows()[0][1] - 1.0).abs() < 1e-12);
        assert_eq!(scores.rows()[2], vec![0.0, 0.0]);
        assert_eq!(scores.best_labels().labels(), ["T", "B", "B"]);
    }

    #[test]
    fn test_similarities_without_shared_features() {
        let model = CentroidModel::train(&reference(), "cell_type")
            .unwrap()
            .with_name("immune");
        let query = ExprData::new(vec!["q".into()], vec!["XIST".into()], vec![vec![1.0]]).unwrap();
        let err = model.similarities(&query).unwrap_err();
        assert!(err.to_string().contains("model `immune`"));
    }

    #[test]
    fn test_model_json_validates() {
        let bad = r#"{"features":["a"],"classes":["X","Y"],"centroids":[[1.0]]}"#;
        assert!(serde_json::from_str::<CentroidModel>(bad).is_err());

        let ok = r#"{"name":"m","features":["a"],"classes":["X"],"centroids":[[1.0]]}"#;
        let model: CentroidModel = serde_json::from_str(ok).unwrap();
        assert_eq!(model.name(), Some("m"));
    }
}
