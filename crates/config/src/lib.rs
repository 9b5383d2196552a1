//! Configuration loading, validation, and management for agentwire.
//!
//! Loads configuration from `~/.agentwire/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.agentwire/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Graph controller, context window and tool executor settings
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Chat persistence settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Send prompt-caching markers to providers that support them
    #[serde(default = "default_true")]
    pub prompt_caching: bool,
}

fn default_provider() -> String {
    "anthropic".into()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_api_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_url: default_api_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            prompt_caching: true,
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("prompt_caching", &self.prompt_caching)
            .finish()
    }
}

/// Unit in which `context_budget` is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetUnit {
    #[default]
    Messages,
    Tokens,
}

/// How the tool calls of one agent step are run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionKind {
    #[default]
    Concurrent,
    Sequential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Tool-requesting agent steps after which the turn is force-ended
    #[serde(default = "default_hard_cap")]
    pub hard_cap: u32,

    /// Tool-requesting agent steps after which the model is told to wrap up
    #[serde(default = "default_soft_threshold")]
    pub soft_threshold: u32,

    #[serde(default = "default_context_budget")]
    pub context_budget: usize,

    #[serde(default)]
    pub budget_unit: BudgetUnit,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    #[serde(default)]
    pub execution: ExecutionKind,

    /// Replace the built-in system prompt entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_hard_cap() -> u32 {
    15
}
fn default_soft_threshold() -> u32 {
    10
}
fn default_context_budget() -> usize {
    50
}
fn default_tool_timeout() -> u64 {
    30
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            hard_cap: default_hard_cap(),
            soft_threshold: default_soft_threshold(),
            context_budget: default_context_budget(),
            budget_unit: BudgetUnit::default(),
            tool_timeout_secs: default_tool_timeout(),
            execution: ExecutionKind::default(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// CORS origins; empty allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    42618
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory for the file backend; defaults to `~/.agentwire/chats`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("chats"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Built-in tools that should not be registered
    #[serde(default)]
    pub disabled: Vec<String>,
}

fn default_http_timeout() -> u64 {
    20
}
fn default_user_agent() -> String {
    format!("agentwire/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
            disabled: vec![],
        }
    }
}

impl ToolsConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        !self.disabled.iter().any(|d| d == name)
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agentwire/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_path())
    }

    /// Load from `path`, then apply environment variable overrides:
    /// - `AGENTWIRE_API_KEY`, then `ANTHROPIC_API_KEY` (only when no key is configured)
    /// - `AGENTWIRE_MODEL`
    /// - `AGENTWIRE_PORT`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.model.api_key.is_none() {
            self.model.api_key = lookup("AGENTWIRE_API_KEY").or_else(|| lookup("ANTHROPIC_API_KEY"));
        }

        if let Some(model) = lookup("AGENTWIRE_MODEL") {
            self.model.model = model;
        }

        if let Some(port) = lookup("AGENTWIRE_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("AGENTWIRE_PORT is not a valid port: {port}"))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agentwire")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.workflow.hard_cap == 0 {
            return Err(ConfigError::ValidationError(
                "workflow.hard_cap must be > 0".into(),
            ));
        }

        if self.workflow.soft_threshold >= self.workflow.hard_cap {
            return Err(ConfigError::ValidationError(format!(
                "workflow.soft_threshold ({}) must be below workflow.hard_cap ({})",
                self.workflow.soft_threshold, self.workflow.hard_cap
            )));
        }

        if self.workflow.context_budget == 0 {
            return Err(ConfigError::ValidationError(
                "workflow.context_budget must be > 0".into(),
            ));
        }

        if self.workflow.tool_timeout_secs == 0 || self.tools.http_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be > 0 seconds".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.model.api_key.is_some()
    }

    /// Render the configuration as TOML, with the API key removed.
    pub fn to_redacted_toml(&self) -> String {
        let mut shown = self.clone();
        if shown.model.api_key.is_some() {
            shown.model.api_key = Some("[REDACTED]".into());
        }
        toml::to_string_pretty(&shown).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.model.provider, "anthropic");
        assert_eq!(config.gateway.port, 42618);
        assert_eq!(config.workflow.hard_cap, 15);
        assert_eq!(config.workflow.soft_threshold, 10);
        assert_eq!(config.workflow.context_budget, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.model, config.model.model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.model.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn soft_threshold_must_be_below_hard_cap() {
        let mut config = AppConfig::default();
        config.workflow.soft_threshold = 15;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("soft_threshold"));
    }

    #[test]
    fn zero_budget_and_timeout_rejected() {
        let mut config = AppConfig::default();
        config.workflow.context_budget = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.workflow.tool_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model.provider, "anthropic");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[workflow]
hard_cap = 8
soft_threshold = 5
budget_unit = "tokens"
context_budget = 6000
execution = "sequential"

[store]
backend = "file"
path = "/var/lib/agentwire"

[tools]
disabled = ["web_scraper"]
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.workflow.hard_cap, 8);
        assert_eq!(config.workflow.budget_unit, BudgetUnit::Tokens);
        assert_eq!(config.workflow.execution, ExecutionKind::Sequential);
        assert_eq!(config.workflow.tool_timeout_secs, 30);
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(
            config.store.resolved_path(),
            PathBuf::from("/var/lib/agentwire")
        );
        assert!(!config.tools.is_enabled("web_scraper"));
        assert!(config.tools.is_enabled("calculator"));
        assert_eq!(config.model.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workflow\nhard_cap = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn invalid_file_is_validation_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workflow]\nhard_cap = 3\nsoft_threshold = 4").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("ANTHROPIC_API_KEY", "sk-ant-test"),
            ("AGENTWIRE_MODEL", "claude-haiku"),
            ("AGENTWIRE_PORT", "9000"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.model.api_key.as_deref(), Some("sk-ant-test"));
        assert_eq!(config.model.model, "claude-haiku");
        assert_eq!(config.gateway.port, 9000);
    }

    #[test]
    fn agentwire_key_wins_and_file_key_is_kept() {
        let env: HashMap<&str, &str> = [
            ("AGENTWIRE_API_KEY", "primary"),
            ("ANTHROPIC_API_KEY", "secondary"),
        ]
        .into_iter()
        .collect();
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());

        let mut config = AppConfig::default();
        config.apply_env(lookup).unwrap();
        assert_eq!(config.model.api_key.as_deref(), Some("primary"));

        let mut config = AppConfig::default();
        config.model.api_key = Some("from-file".into());
        config.apply_env(lookup).unwrap();
        assert_eq!(config.model.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn bad_port_env_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env(|k| (k == "AGENTWIRE_PORT").then(|| "not-a-port".into()));
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.model.api_key = Some("sk-ant-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-ant-secret"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!config.to_redacted_toml().contains("sk-ant-secret"));
    }
}
