//! Scripted dispatch scenarios loaded from YAML
//!
//! A script declares a dispatcher configuration, actions with handlers whose
//! behaviour is described declaratively, and a list of dispatches to run.

pub mod behavior;

use crate::core::{ConfigError, DispatchError, DispatcherConfig, ExecutionMode, ExecutionResult};
use crate::execution::{DispatchOptions, Dispatcher};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

pub use behavior::{HandlerBehavior, PayloadCondition};

/// Top-level script loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub actions: Vec<ActionScript>,

    #[serde(default)]
    pub dispatches: Vec<DispatchScript>,
}

/// One action and its handlers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionScript {
    pub name: String,

    /// Per-action execution mode override
    #[serde(default)]
    pub mode: Option<ExecutionMode>,

    #[serde(default)]
    pub handlers: Vec<HandlerScript>,
}

/// A handler declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerScript {
    pub id: String,

    #[serde(default)]
    pub priority: i64,

    #[serde(default = "default_blocking")]
    pub blocking: bool,

    #[serde(default)]
    pub once: bool,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub when: Option<PayloadCondition>,

    #[serde(flatten)]
    pub behavior: HandlerBehavior,
}

fn default_blocking() -> bool {
    true
}

/// A dispatch to perform when the script runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchScript {
    pub action: String,

    #[serde(default)]
    pub payload: Value,

    #[serde(default)]
    pub mode: Option<ExecutionMode>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "default_repeat")]
    pub repeat: usize,
}

fn default_repeat() -> usize {
    1
}

impl DispatchScript {
    pub fn options(&self) -> DispatchOptions {
        DispatchOptions {
            execution_mode: self.mode,
            tags: self.tags.clone(),
            ..DispatchOptions::default()
        }
    }
}

impl ScriptConfig {
    /// Load a script from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a script from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ScriptConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the script
    pub fn validate(&self) -> Result<()> {
        self.dispatcher.validate()?;

        let mut action_names = HashSet::new();
        for action in &self.actions {
            if action.name.trim().is_empty() {
                anyhow::bail!("Action name must not be empty");
            }
            if !action_names.insert(action.name.as_str()) {
                anyhow::bail!("Duplicate action: {}", action.name);
            }

            let mut handler_ids = HashSet::new();
            for handler in &action.handlers {
                if !handler_ids.insert(handler.id.as_str()) {
                    anyhow::bail!(
                        "Duplicate handler ID '{}' in action '{}'",
                        handler.id,
                        action.name
                    );
                }
                handler.behavior.validate().map_err(|e| {
                    anyhow::anyhow!("Handler '{}' in action '{}': {}", handler.id, action.name, e)
                })?;
            }
        }

        for dispatch in &self.dispatches {
            if !action_names.contains(dispatch.action.as_str()) {
                anyhow::bail!("Dispatch references unknown action '{}'", dispatch.action);
            }
            if dispatch.repeat == 0 {
                anyhow::bail!("Dispatch of '{}' has repeat: 0", dispatch.action);
            }
        }

        Ok(())
    }

    /// Build a dispatcher with every scripted handler registered
    pub fn build_dispatcher(&self) -> Result<Dispatcher, ConfigError> {
        let dispatcher = Dispatcher::with_config(self.dispatcher.clone());
        for action in &self.actions {
            if let Some(mode) = action.mode {
                dispatcher.set_action_execution_mode(&action.name, mode);
            }
            for handler in &action.handlers {
                dispatcher.register_fn(
                    &action.name,
                    handler.behavior.to_handler_fn(),
                    handler.handler_config(),
                )?;
            }
        }
        Ok(dispatcher)
    }

    /// Run every scripted dispatch in order
    pub async fn run(&self, dispatcher: &Dispatcher) -> Result<Vec<ExecutionResult>, DispatchError> {
        let mut results = Vec::new();
        for dispatch in &self.dispatches {
            for _ in 0..dispatch.repeat {
                let result = dispatcher
                    .dispatch_with_result(&dispatch.action, dispatch.payload.clone(), dispatch.options())
                    .await?;
                results.push(result);
            }
        }
        Ok(results)
    }
}

impl HandlerScript {
    pub fn handler_config(&self) -> crate::core::HandlerConfig {
        let mut config = crate::core::HandlerConfig::new()
            .with_id(self.id.clone())
            .with_priority(self.priority)
            .with_blocking(self.blocking);
        for tag in &self.tags {
            config = config.with_tag(tag.clone());
        }
        if self.once {
            config = config.once();
        }
        if let Some(condition) = self.when.clone() {
            config = config.when(move |payload| condition.matches(payload));
        }
        config
    }
}
