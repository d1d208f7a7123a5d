//! Runtime configuration.
//!
//! Loaded from YAML, from an explicit path or the `MACTA_CONFIG` environment
//! variable. Every field has a default, so an absent file is a valid config.
//!
//! ```yaml
//! match_policy: intersection      # or all_keys
//! tool_timeout_secs: 600          # null disables the per-tool deadline
//! max_concurrency: 4
//! models:
//!   dir: /data/macta/models
//!   index_url: https://example.org/macta/models.json
//!   download_timeout_secs: 300
//! tools:
//!   batch_centroid:
//!     enabled: false
//!   centroid:
//!     requirements:
//!       result_type: { equals: labels }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::requirements::{MatchPolicy, RequirementError, RequirementList};
use crate::utilities::paths::default_model_dir;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "MACTA_CONFIG";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid requirements for tool `{tool}`: {source}")]
    Requirement {
        tool: String,
        #[source]
        source: RequirementError,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_tool_timeout_secs() -> Option<u64> {
    Some(600)
}

fn default_max_concurrency() -> usize {
    4
}

fn default_download_timeout_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MactaConfig {
    /// How tool gates treat declared requirements the run does not mention.
    #[serde(default)]
    pub match_policy: MatchPolicy,

    /// Per-tool deadline in seconds. `None` disables it.
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: Option<u64>,

    /// Maximum number of tools running at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default)]
    pub models: ModelsConfig,

    /// Per-tool settings, keyed by registry name.
    #[serde(default)]
    pub tools: BTreeMap<String, ToolConfig>,
}

/// Pretrained model cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_model_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub index_url: Option<String>,
    /// Timeout in seconds for each index or model download.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: default_model_dir(),
            index_url: None,
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

/// Settings for one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Requirement overrides merged over the tool's own gate.
    #[serde(default)]
    pub requirements: Option<serde_yaml::Value>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requirements: None,
        }
    }
}

impl Default for MactaConfig {
    fn default() -> Self {
        Self {
            match_policy: MatchPolicy::default(),
            tool_timeout_secs: default_tool_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            models: ModelsConfig::default(),
            tools: BTreeMap::new(),
        }
    }
}

impl MactaConfig {
    /// Parse and validate a YAML document. An empty document yields defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load from `path`, else from `$MACTA_CONFIG`, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match std::env::var(CONFIG_ENV) {
            Ok(env_path) if !env_path.is_empty() => Self::from_file(Path::new(&env_path)),
            _ => Ok(Self::default()),
        }
    }

    /// Check settings that serde cannot express, including requirement
    /// overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.models.download_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "models.download_timeout_secs must be at least 1".to_string(),
            ));
        }
        self.requirement_overrides().map(|_| ())
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }

    pub fn is_enabled(&self, tool: &str) -> bool {
        self.tools.get(tool).map_or(true, |t| t.enabled)
    }

    /// Parsed requirement overrides for every tool that declares some.
    pub fn requirement_overrides(&self) -> Result<BTreeMap<String, RequirementList>, ConfigError> {
        let mut overrides = BTreeMap::new();
        for (tool, settings) in &self.tools {
            if let Some(doc) = &settings.requirements {
                let list =
                    RequirementList::from_yaml(doc).map_err(|source| ConfigError::Requirement {
                        tool: tool.clone(),
                        source,
                    })?;
                overrides.insert(tool.clone(), list);
            }
        }
        Ok(overrides)
    }

    /// The model cache described by `models`.
    #[cfg(feature = "centroid")]
    pub fn model_store(&self) -> crate::tools::centroid::ModelStore {
        let store = crate::tools::centroid::ModelStore::new(&self.models.dir)
            .with_timeout(Duration::from_secs(self.models.download_timeout_secs));
        match &self.models.index_url {
            Some(url) => store.with_index_url(url),
            None => store,
        }
    }
}
