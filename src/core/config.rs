//! Dispatcher configuration from YAML

use crate::core::state::ExecutionMode;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default limit on priority jumps within one dispatch
pub const DEFAULT_MAX_JUMPS: usize = 64;

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Mode used when neither the dispatch nor the action names one
    #[serde(default)]
    pub default_mode: ExecutionMode,

    /// Jumps allowed per dispatch before it fails with a loop error
    #[serde(default = "default_max_jumps")]
    pub max_jumps_per_dispatch: usize,

    /// Per-action execution mode overrides
    #[serde(default)]
    pub action_modes: HashMap<String, ExecutionMode>,
}

fn default_max_jumps() -> usize {
    DEFAULT_MAX_JUMPS
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_mode: ExecutionMode::Sequential,
            max_jumps_per_dispatch: DEFAULT_MAX_JUMPS,
            action_modes: HashMap::new(),
        }
    }
}

impl DispatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_mode(mut self, mode: ExecutionMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn with_max_jumps(mut self, max_jumps: usize) -> Self {
        self.max_jumps_per_dispatch = max_jumps;
        self
    }

    pub fn with_action_mode(mut self, action: impl Into<String>, mode: ExecutionMode) -> Self {
        self.action_modes.insert(action.into(), mode);
        self
    }

    /// Load dispatcher configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse dispatcher configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: DispatcherConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_jumps_per_dispatch == 0 {
            anyhow::bail!("max_jumps_per_dispatch must be greater than zero");
        }
        for action in self.action_modes.keys() {
            if action.trim().is_empty() {
                anyhow::bail!("action_modes contains an empty action name");
            }
        }
        Ok(())
    }
}
