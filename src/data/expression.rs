//! Expression datasets.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::error::DataError;

/// A dense observation x feature expression matrix with categorical
/// observation columns.
///
/// Rows are observations (cells), columns are features (genes). The
/// constructor guarantees the matrix matches the name vectors, names are
/// unique, values are finite and every observation column has one entry per
/// observation.
///
/// JSON form:
/// ```json
/// {
///   "obs_names": ["c1", "c2"],
///   "var_names": ["CD3E", "MS4A1"],
///   "x": [[5.0, 0.0], [0.0, 7.0]],
///   "obs": { "cell_type": ["T", "B"] }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawExprData")]
pub struct ExprData {
    obs_names: Vec<String>,
    var_names: Vec<String>,
    x: Vec<Vec<f64>>,
    obs: BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct RawExprData {
    obs_names: Vec<String>,
    var_names: Vec<String>,
    x: Vec<Vec<f64>>,
    #[serde(default)]
    obs: BTreeMap<String, Vec<String>>,
}

impl TryFrom<RawExprData> for ExprData {
    type Error = DataError;

    fn try_from(raw: RawExprData) -> Result<Self, Self::Error> {
        let mut data = Self::new(raw.obs_names, raw.var_names, raw.x)?;
        for (name, values) in raw.obs {
            data = data.with_obs_column(name, values)?;
        }
        Ok(data)
    }
}

impl ExprData {
    /// Build a dataset, validating shape, names and values.
    pub fn new(
        obs_names: Vec<String>,
        var_names: Vec<String>,
        x: Vec<Vec<f64>>,
    ) -> Result<Self, DataError> {
        if x.len() != obs_names.len() {
            return Err(DataError::RowCount {
                rows: x.len(),
                obs: obs_names.len(),
            });
        }
        ensure_unique("observation", &obs_names)?;
        ensure_unique("feature", &var_names)?;
        for (row, values) in x.iter().enumerate() {
            if values.len() != var_names.len() {
                return Err(DataError::RowLength {
                    row,
                    len: values.len(),
                    vars: var_names.len(),
                });
            }
            if let Some(col) = values.iter().position(|v| !v.is_finite()) {
                return Err(DataError::NonFinite { row, col });
            }
        }
        Ok(Self {
            obs_names,
            var_names,
            x,
            obs: BTreeMap::new(),
        })
    }

    /// Builder: attach (or replace) a categorical observation column.
    pub fn with_obs_column(
        mut self,
        name: impl Into<String>,
        values: Vec<String>,
    ) -> Result<Self, DataError> {
        let name = name.into();
        if values.len() != self.n_obs() {
            return Err(DataError::ColumnLength {
                name,
                len: values.len(),
                expected: self.n_obs(),
            });
        }
        self.obs.insert(name, values);
        Ok(self)
    }

    pub fn n_obs(&self) -> usize {
        self.obs_names.len()
    }

    pub fn n_vars(&self) -> usize {
        self.var_names.len()
    }

    pub fn obs_names(&self) -> &[String] {
        &self.obs_names
    }

    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.x
    }

    /// Look up an observation column by name.
    pub fn column(&self, name: &str) -> Result<&[String], DataError> {
        self.obs
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))
    }

    /// Index of each feature name, for aligning against models and markers.
    pub fn var_index(&self) -> HashMap<&str, usize> {
        self.var_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect()
    }

    /// Return a dataset with the same names and columns and a transformed matrix.
    ///
    /// `f` receives each row and must return a row of the same length.
    pub fn map_rows<F>(&self, mut f: F) -> Result<Self, DataError>
    where
        F: FnMut(usize, &[f64]) -> Vec<f64>,
    {
        let x = self
            .x
            .iter()
            .enumerate()
            .map(|(i, row)| f(i, row))
            .collect();
        let mut mapped = Self::new(self.obs_names.clone(), self.var_names.clone(), x)?;
        mapped.obs = self.obs.clone();
        Ok(mapped)
    }
}

fn ensure_unique(kind: &'static str, names: &[String]) -> Result<(), DataError> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(DataError::DuplicateName {
                kind,
                name: name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[test]
    fn test_new_validates_shape() {
        let err = ExprData::new(names("c", 2), names("g", 2), vec![vec![1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, DataError::RowCount { rows: 1, obs: 2 }));

        let err = ExprData::new(names("c", 1), names("g", 2), vec![vec![1.0]]).unwrap_err();
        assert!(matches!(err, DataError::RowLength { row: 0, len: 1, vars: 2 }));
    }

    #[test]
    fn test_new_rejects_duplicates_and_nan() {
        let dup = vec!["c".to_string(), "c".to_string()];
        let err = ExprData::new(dup, names("g", 1), vec![vec![1.0], vec![2.0]]).unwrap_err();
        assert!(matches!(err, DataError::DuplicateName { kind: "observation", .. }));

        let err = ExprData::new(names("c", 1), names("g", 2), vec![vec![1.0, f64::NAN]]).unwrap_err();
        assert!(matches!(err, DataError::NonFinite { row: 0, col: 1 }));
    }

    #[test]
    fn test_obs_columns_must_match_observations() {
        let data = ExprData::new(names("c", 2), names("g", 1), vec![vec![1.0], vec![2.0]]).unwrap();
        let err = data
            .clone()
            .with_obs_column("cell_type", vec!["T".into()])
            .unwrap_err();
        assert!(matches!(err, DataError::ColumnLength { len: 1, expected: 2, .. }));

        let data = data
            .with_obs_column("cell_type", vec!["T".into(), "B".into()])
            .unwrap();
        assert_eq!(data.column("cell_type").unwrap(), ["T", "B"]);
        assert!(matches!(data.column("batch"), Err(DataError::MissingColumn(_))));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: ExprData = serde_json::from_str(
            r#"{"obs_names":["c1"],"var_names":["g1","g2"],"x":[[1,2]],"obs":{"ct":["T"]}}"#,
        )
        .unwrap();
        assert_eq!(ok.n_obs(), 1);
        assert_eq!(ok.n_vars(), 2);

        let bad = serde_json::from_str::<ExprData>(
            r#"{"obs_names":["c1"],"var_names":["g1"],"x":[[1,2]]}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_map_rows_keeps_columns() {
        let data = ExprData::new(names("c", 2), names("g", 2), vec![vec![1.0, 3.0], vec![2.0, 2.0]])
            .unwrap()
            .with_obs_column("batch", vec!["a".into(), "b".into()])
            .unwrap();
        let doubled = data
            .map_rows(|_, row| row.iter().map(|v| v * 2.0).collect())
            .unwrap();
        assert_eq!(doubled.rows()[0], vec![2.0, 6.0]);
        assert_eq!(doubled.column("batch").unwrap(), ["a", "b"]);
    }
}
