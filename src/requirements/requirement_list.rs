//! Named collections of requirements: one tool's compatibility gate.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::RequirementError;
use super::requirement::{
    ContainsRequirement, EqualityRequirement, IsInstanceRequirement, NotNoneRequirement,
    Requirement,
};
use crate::params::Params;

/// How a [`RequirementList`] treats declared names the caller did not supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Only names present in both the call and the list are evaluated.
    #[default]
    Intersection,
    /// Every declared name is evaluated; missing ones are checked as `null`.
    AllKeys,
}

/// An immutable mapping of requirement name to [`Requirement`], sorted by name.
///
/// ```
/// use macta::requirements::{EqualityRequirement, NotNoneRequirement, RequirementList};
/// use macta::params::Params;
/// use serde_json::json;
///
/// let gate = RequirementList::new()
///     .with("annot_type", EqualityRequirement::new("ref"))
///     .with("batch_col", NotNoneRequirement::new());
///
/// let mut params = Params::new();
/// params.insert("annot_type".into(), json!("ref"));
/// assert!(gate.check(&params));
///
/// params.insert("batch_col".into(), json!(null));
/// assert!(!gate.check(&params));
/// ```
#[derive(Clone, Default)]
pub struct RequirementList {
    requirements: BTreeMap<String, Arc<dyn Requirement>>,
    policy: MatchPolicy,
}

impl RequirementList {
    /// Create an empty list. An empty list is compatible with everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add (or replace) a named requirement.
    pub fn with(mut self, name: impl Into<String>, requirement: impl Requirement + 'static) -> Self {
        self.requirements.insert(name.into(), Arc::new(requirement));
        self
    }

    /// Builder: set the matching policy.
    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Parse a requirement list from YAML.
    ///
    /// The document must be a mapping from string names to entries of the form
    /// `{equals: v}`, `{contains: [..]}`, `{is_instance: type}` or `not_none`.
    /// `null` yields an empty list.
    pub fn from_yaml(doc: &serde_yaml::Value) -> Result<Self, RequirementError> {
        let mapping = match doc {
            serde_yaml::Value::Null => return Ok(Self::new()),
            serde_yaml::Value::Mapping(mapping) => mapping,
            other => return Err(RequirementError::NotAMapping(yaml_summary(other))),
        };

        let mut list = Self::new();
        for (key, entry) in mapping {
            let name = match key {
                serde_yaml::Value::String(name) => name.clone(),
                other => return Err(RequirementError::NonStringKey(yaml_summary(other))),
            };
            let requirement = parse_entry(&name, entry)?;
            list.requirements.insert(name, requirement);
        }
        Ok(list)
    }

    /// Return a copy of this list with `overrides` layered on top.
    ///
    /// Names present in `overrides` replace the ones declared here; the policy
    /// of `self` is kept.
    pub fn merged(&self, overrides: &RequirementList) -> Self {
        let mut requirements = self.requirements.clone();
        for (name, requirement) in &overrides.requirements {
            requirements.insert(name.clone(), Arc::clone(requirement));
        }
        Self {
            requirements,
            policy: self.policy,
        }
    }

    /// Check a parameter set against every applicable requirement.
    pub fn check(&self, params: &Params) -> bool {
        self.applicable(params)
            .all(|(_, requirement, value)| requirement.check(value))
    }

    /// Names of the requirements `params` violates, sorted by name.
    pub fn violations<'a>(&'a self, params: &'a Params) -> Vec<&'a str> {
        self.applicable(params)
            .filter(|(_, requirement, value)| !requirement.check(value))
            .map(|(name, _, _)| name)
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Requirement>> {
        self.requirements.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.requirements.keys().map(String::as_str)
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Requirement/value pairs that take part in a check under the current policy.
    fn applicable<'a>(
        &'a self,
        params: &'a Params,
    ) -> impl Iterator<Item = (&'a str, &'a Arc<dyn Requirement>, &'a Value)> + 'a {
        static NULL: Value = Value::Null;
        let policy = self.policy;
        self.requirements
            .iter()
            .filter_map(move |(name, requirement)| match (params.get(name), policy) {
                (Some(value), _) => Some((name.as_str(), requirement, value)),
                (None, MatchPolicy::AllKeys) => Some((name.as_str(), requirement, &NULL)),
                (None, MatchPolicy::Intersection) => None,
            })
    }
}

impl fmt::Debug for RequirementList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequirementList")
            .field("requirements", &self.requirements)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Interpret one YAML requirement entry.
fn parse_entry(
    name: &str,
    entry: &serde_yaml::Value,
) -> Result<Arc<dyn Requirement>, RequirementError> {
    let malformed = |reason: String| RequirementError::Malformed {
        name: name.to_string(),
        reason,
    };

    if let serde_yaml::Value::String(kind) = entry {
        return match kind.as_str() {
            "not_none" => Ok(Arc::new(NotNoneRequirement::new())),
            other => Err(malformed(format!("unknown requirement `{other}`"))),
        };
    }

    let mapping = match entry {
        serde_yaml::Value::Mapping(mapping) if mapping.len() == 1 => mapping,
        other => {
            return Err(malformed(format!(
                "expected a single-key mapping, got {}",
                yaml_summary(other)
            )))
        }
    };
    let Some((serde_yaml::Value::String(kind), argument)) = mapping.iter().next() else {
        return Err(malformed("requirement kind must be a string".to_string()));
    };

    let argument_json = || -> Result<Value, RequirementError> {
        serde_json::to_value(argument).map_err(|e| malformed(e.to_string()))
    };

    match kind.as_str() {
        "equals" => Ok(Arc::new(EqualityRequirement::new(argument_json()?))),
        "contains" => Ok(Arc::new(ContainsRequirement::new(argument_json()?)?)),
        "is_instance" => match argument {
            serde_yaml::Value::String(type_name) => {
                Ok(Arc::new(IsInstanceRequirement::from_type_name(type_name)?))
            }
            other => Err(RequirementError::UnknownType(yaml_summary(other))),
        },
        "not_none" => Ok(Arc::new(NotNoneRequirement::new())),
        other => Err(malformed(format!("unknown requirement `{other}`"))),
    }
}

fn yaml_summary(value: &serde_yaml::Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| format!("{value:?}"))
}
