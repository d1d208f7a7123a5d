//! Standardized result shapes every tool's `convert` produces.

use serde::{Deserialize, Serialize};

use crate::data::DataError;
use crate::params::ResultType;

/// One predicted label per observation, aligned to observation names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSeries {
    obs_names: Vec<String>,
    labels: Vec<String>,
}

impl LabelSeries {
    pub fn new(obs_names: Vec<String>, labels: Vec<String>) -> Result<Self, DataError> {
        if obs_names.len() != labels.len() {
            return Err(DataError::RowCount {
                rows: labels.len(),
                obs: obs_names.len(),
            });
        }
        Ok(Self { obs_names, labels })
    }

    pub fn obs_names(&self) -> &[String] {
        &self.obs_names
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Label predicted for a named observation.
    pub fn get(&self, obs_name: &str) -> Option<&str> {
        self.obs_names
            .iter()
            .position(|name| name == obs_name)
            .map(|i| self.labels[i].as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.obs_names
            .iter()
            .zip(&self.labels)
            .map(|(obs, label)| (obs.as_str(), label.as_str()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Observation x class score matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    obs_names: Vec<String>,
    classes: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl ScoreTable {
    pub fn new(
        obs_names: Vec<String>,
        classes: Vec<String>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self, DataError> {
        if classes.is_empty() {
            return Err(DataError::NoClasses);
        }
        if values.len() != obs_names.len() {
            return Err(DataError::RowCount {
                rows: values.len(),
                obs: obs_names.len(),
            });
        }
        if let Some((row, len)) = values
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|(_, len)| *len != classes.len())
        {
            return Err(DataError::RowLength {
                row,
                len,
                vars: classes.len(),
            });
        }
        Ok(Self {
            obs_names,
            classes,
            values,
        })
    }

    pub fn obs_names(&self) -> &[String] {
        &self.obs_names
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.values
    }

    /// Highest-scoring class per observation. Ties go to the earlier class.
    pub fn best_labels(&self) -> LabelSeries {
        let labels = self
            .values
            .iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .fold(0, |best, (i, score)| if *score > row[best] { i } else { best });
                self.classes[best].clone()
            })
            .collect();
        LabelSeries {
            obs_names: self.obs_names.clone(),
            labels,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A tool's output in one of the supported standardized shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StandardResult {
    Labels(LabelSeries),
    Scores(ScoreTable),
}

impl StandardResult {
    /// Number of observations covered.
    pub fn len(&self) -> usize {
        match self {
            Self::Labels(labels) => labels.len(),
            Self::Scores(scores) => scores.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observations the result covers, in order.
    pub fn obs_names(&self) -> &[String] {
        match self {
            Self::Labels(labels) => labels.obs_names(),
            Self::Scores(scores) => scores.obs_names(),
        }
    }

    pub fn result_type(&self) -> ResultType {
        match self {
            Self::Labels(_) => ResultType::Labels,
            Self::Scores(_) => ResultType::Scores,
        }
    }

    pub fn as_labels(&self) -> Option<&LabelSeries> {
        match self {
            Self::Labels(labels) => Some(labels),
            Self::Scores(_) => None,
        }
    }

    pub fn as_scores(&self) -> Option<&ScoreTable> {
        match self {
            Self::Scores(scores) => Some(scores),
            Self::Labels(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_best_labels_picks_argmax_with_stable_ties() {
        let table = ScoreTable::new(
            strings(&["c1", "c2", "c3"]),
            strings(&["B", "T"]),
            vec![vec![0.1, 0.9], vec![0.8, 0.2], vec![0.5, 0.5]],
        )
        .unwrap();
        let labels = table.best_labels();
        assert_eq!(labels.labels(), ["T", "B", "B"]);
        assert_eq!(labels.get("c2"), Some("B"));
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn test_score_table_validates_shape() {
        assert!(matches!(
            ScoreTable::new(strings(&["c1"]), vec![], vec![vec![]]),
            Err(DataError::NoClasses)
        ));
        assert!(matches!(
            ScoreTable::new(strings(&["c1"]), strings(&["A", "B"]), vec![vec![1.0]]),
            Err(DataError::RowLength { row: 0, len: 1, vars: 2 })
        ));
    }

    #[test]
    fn test_standard_result_serializes_with_kind_tag() {
        let result = StandardResult::Labels(
            LabelSeries::new(strings(&["c1"]), strings(&["T"])).unwrap(),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "labels");
        assert_eq!(json["labels"][0], "T");
        assert_eq!(result.result_type(), ResultType::Labels);
    }
}
