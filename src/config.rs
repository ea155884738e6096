use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Steps recorded before a run is cut off.
pub const MAX_STEPS: usize = 500;

/// Names never shown among locals or globals.
pub const IGNORE_VARS: &[&str] = &[
    "__builtins__",
    "__name__",
    "__doc__",
    "__package__",
    "__author__",
    "__module__",
];

/// Name shown for frames whose scope has no name.
pub const UNKNOWN_FUNCTION: &str = "<<Unnamed Function>>";

/// Recorder settings, loadable from TOML. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_steps: usize,
    pub ignore_vars: Vec<String>,
    pub unknown_function: String,
    /// Scope names whose calls are never entered.
    pub skip_functions: Vec<String>,
    /// Drop the module exit that follows a trailing exception.
    pub dedupe_trailing_return: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_steps: MAX_STEPS,
            ignore_vars: IGNORE_VARS.iter().map(|name| name.to_string()).collect(),
            unknown_function: UNKNOWN_FUNCTION.to_string(),
            skip_functions: Vec::new(),
            dedupe_trailing_return: false,
        }
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_steps == 0 {
            return Err(ConfigError::Invalid(
                "max_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore_vars.iter().any(|ignored| ignored == name)
    }

    /// Display name for a scope, substituting the unknown-function name.
    pub fn scope_name<'a>(&'a self, name: &'a str) -> &'a str {
        if name.is_empty() {
            &self.unknown_function
        } else {
            name
        }
    }
}
