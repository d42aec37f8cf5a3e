use crate::errors::ConfigError;
use crate::pages::DEFAULT_HOME_PATHS;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_THINK_OPEN: &str = "SITEGEN_THINK_OPEN";
pub const ENV_THINK_CLOSE: &str = "SITEGEN_THINK_CLOSE";
pub const ENV_HOME_PATHS: &str = "SITEGEN_HOME_PATHS";
pub const ENV_EMIT_UNCHANGED: &str = "SITEGEN_EMIT_UNCHANGED";

/// Markers around the reasoning segment of thinker models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningMarkers {
    #[serde(default = "default_think_open")]
    pub open: String,
    #[serde(default = "default_think_close")]
    pub close: String,
}

impl Default for ReasoningMarkers {
    fn default() -> Self {
        Self {
            open: default_think_open(),
            close: default_think_close(),
        }
    }
}

fn default_think_open() -> String {
    "<think>".to_string()
}

fn default_think_close() -> String {
    "</think>".to_string()
}

fn default_home_paths() -> Vec<String> {
    DEFAULT_HOME_PATHS.iter().map(|p| p.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub reasoning: ReasoningMarkers,
    #[serde(default = "default_home_paths")]
    pub home_paths: Vec<String>,
    /// Notify even when a pass reproduced the previous state.
    #[serde(default)]
    pub emit_unchanged: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reasoning: ReasoningMarkers::default(),
            home_paths: default_home_paths(),
            emit_unchanged: false,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()
    }

    /// Defaults overlaid with the `SITEGEN_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(open) = lookup(ENV_THINK_OPEN) {
            self.reasoning.open = open;
        }
        if let Some(close) = lookup(ENV_THINK_CLOSE) {
            self.reasoning.close = close;
        }
        if let Some(paths) = lookup(ENV_HOME_PATHS) {
            self.home_paths = paths
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(flag) = lookup(ENV_EMIT_UNCHANGED) {
            self.emit_unchanged = parse_bool(ENV_EMIT_UNCHANGED, &flag)?;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.reasoning.open.is_empty() || self.reasoning.close.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "reasoning".to_string(),
                message: "markers must not be empty".to_string(),
            });
        }
        if self.home_paths.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "home_paths".to_string(),
                message: "at least one home path is required".to_string(),
            });
        }
        Ok(self)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}
