//! Tool Registry — name to tool mapping built once per process.
//!
//! Built-in tools are offered in turn; each is registered only when its cargo
//! feature is compiled in, the configuration leaves it enabled and its
//! `probe()` passes. Omitted tools are logged at debug level and never fail
//! the build of the registry.
//!
//! Each entry stores the tool's effective gate: its declared requirements
//! with any configured overrides layered on top and the configured match
//! policy applied.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{ConfigError, MactaConfig};
use crate::requirements::{MatchPolicy, RequirementList};
use crate::tools::AnnotationTool;

/// A registered tool and its effective gate.
#[derive(Debug, Clone)]
pub struct RegisteredTool {
    tool: Arc<dyn AnnotationTool>,
    gate: Option<RequirementList>,
}

impl RegisteredTool {
    pub fn name(&self) -> &str {
        self.tool.name()
    }

    pub fn tool(&self) -> &Arc<dyn AnnotationTool> {
        &self.tool
    }

    /// `None` means the tool is always compatible.
    pub fn gate(&self) -> Option<&RequirementList> {
        self.gate.as_ref()
    }
}

/// Registry of annotation tools available in this process.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
    policy: MatchPolicy,
}

impl ToolRegistry {
    /// Create an empty registry using the default match policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry whose gates use `policy`.
    pub fn with_policy(policy: MatchPolicy) -> Self {
        Self {
            tools: BTreeMap::new(),
            policy,
        }
    }

    /// Build the registry of every compiled-in tool that is enabled and
    /// passes its probe.
    ///
    /// Fails only on configuration errors: an invalid requirement override or
    /// a tool whose own requirements cannot be built.
    pub fn with_available(config: &MactaConfig) -> Result<Self, ConfigError> {
        let overrides = config.requirement_overrides()?;
        let mut registry = Self::with_policy(config.match_policy);

        #[cfg(feature = "centroid")]
        {
            use crate::tools::centroid::{CentroidTool, NAME};
            let tool = CentroidTool::new(config.model_store()).map_err(|source| {
                ConfigError::Requirement {
                    tool: NAME.to_string(),
                    source,
                }
            })?;
            registry.offer(Arc::new(tool), config, &overrides);
        }

        #[cfg(feature = "marker-score")]
        {
            use crate::tools::marker_score::{MarkerScoreTool, NAME};
            let tool = MarkerScoreTool::new().map_err(|source| ConfigError::Requirement {
                tool: NAME.to_string(),
                source,
            })?;
            registry.offer(Arc::new(tool), config, &overrides);
        }

        #[cfg(feature = "batch-centroid")]
        {
            use crate::tools::batch_centroid::BatchCentroidTool;
            registry.offer(Arc::new(BatchCentroidTool::new()), config, &overrides);
        }

        for name in config.tools.keys() {
            if config.is_enabled(name) && !registry.contains(name) {
                log::warn!("Configured tool `{}` is not available in this build", name);
            }
        }

        log::debug!(
            "Tool registry ready with {} tool(s): {:?}",
            registry.len(),
            registry.names().collect::<Vec<_>>()
        );
        Ok(registry)
    }

    fn offer(
        &mut self,
        tool: Arc<dyn AnnotationTool>,
        config: &MactaConfig,
        overrides: &BTreeMap<String, RequirementList>,
    ) {
        let name = tool.name().to_string();
        if !config.is_enabled(&name) {
            log::debug!("Tool `{}` disabled by configuration, omitted", name);
            return;
        }
        if self.register_if_available(tool, overrides.get(&name)) {
            log::debug!("Registered tool `{}`", name);
        }
    }

    /// Register `tool` if its probe passes. Returns whether it was registered.
    pub fn register_if_available(
        &mut self,
        tool: Arc<dyn AnnotationTool>,
        overrides: Option<&RequirementList>,
    ) -> bool {
        if !tool.probe() {
            log::debug!("Tool `{}` unavailable (probe failed), omitted", tool.name());
            return false;
        }
        self.register_with_overrides(tool, overrides);
        true
    }

    /// Register a tool under its own name, replacing any previous entry.
    pub fn register(&mut self, tool: Arc<dyn AnnotationTool>) -> Option<RegisteredTool> {
        self.register_with_overrides(tool, None)
    }

    /// Register a tool with requirement overrides layered over its gate.
    pub fn register_with_overrides(
        &mut self,
        tool: Arc<dyn AnnotationTool>,
        overrides: Option<&RequirementList>,
    ) -> Option<RegisteredTool> {
        let gate = match (tool.requirements(), overrides) {
            (Some(own), Some(extra)) => Some(own.merged(extra)),
            (None, Some(extra)) => Some(extra.clone()),
            (own, None) => own.cloned(),
        }
        .map(|gate| gate.with_policy(self.policy));

        self.tools
            .insert(tool.name().to_string(), RegisteredTool { tool, gate })
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.tools.values()
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
