use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DispatchError, DispatchResult};

/// Engine settings. Every field has a default, so an empty document is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub rollback: RollbackPolicy,
    #[serde(default)]
    pub unauthorized_undo: UnauthorizedUndo,
    #[serde(default)]
    pub validator_registry: ValidatorRegistryKind,
}

/// What to do when a compensating step fails during rollback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPolicy {
    /// Keep unwinding the remaining entries, then report the first failure.
    #[default]
    BestEffort,
    /// Stop at the first failing step.
    StopOnFailure,
}

/// Outcome of an undo whose session validator refuses the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnauthorizedUndo {
    /// Silent no-op.
    #[default]
    Ignore,
    /// Fail with "Insufficient rights".
    Reject,
}

/// Registry shape the builder links validator bindings into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorRegistryKind {
    /// Validators are created on first use.
    #[default]
    Lazy,
    /// Validators are created while building the dispatcher.
    Instance,
}

impl DispatchConfig {
    pub fn from_file(path: &Path) -> DispatchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DispatchError::Config(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> DispatchResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| DispatchError::Config(format!("Invalid YAML: {e}")))
    }
}
