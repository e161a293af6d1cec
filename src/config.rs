//! Configuration loading and validation
//!
//! This module provides:
//! - `AgentRuntimeConfig` - Runtime configuration for the orchestration loop
//! - `Config` - Full configuration loaded from config.toml

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::policy::DEFAULT_DENIAL_PATTERNS;

/// Default backend base URL when no route or override applies
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Base URL for models routed to Anthropic's OpenAI-compatible endpoint
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// What the loop does when a skill call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkillErrorMode {
    /// End the run; remaining sibling calls are not attempted
    #[default]
    Abort,
    /// Feed the failure back to the model as a tool message and continue
    Report,
}

/// Runtime configuration for an Agent instance.
///
/// # Example
///
/// ```
/// use skillrun::AgentRuntimeConfig;
///
/// let config = AgentRuntimeConfig {
///     max_turns: 10,
///     ..Default::default()
/// };
/// assert_eq!(config.seed, 0);
/// ```
#[derive(Debug, Clone)]
pub struct AgentRuntimeConfig {
    /// Model calls allowed before the run fails
    pub max_turns: u32,
    /// Seed passed on every model call
    pub seed: i64,
    /// Extra attempts for transient model call failures
    pub model_retries: u32,
    /// Base delay before a model retry, doubled per attempt
    pub model_retry_delay: Duration,
    pub on_skill_error: SkillErrorMode,
    /// Answer policy denials with a fixed refusal instead of trusting the model
    pub enforce_denials: bool,
}

impl Default for AgentRuntimeConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for AgentRuntimeConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_turns: config.agent.max_turns,
            seed: config.agent.seed,
            model_retries: config.agent.model_retries,
            model_retry_delay: Duration::from_millis(config.agent.model_retry_delay_ms),
            on_skill_error: config.agent.on_skill_error,
            enforce_denials: config.policy.enforce_denials,
        }
    }
}

/// Main configuration structure loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mediator: MediatorConfig,
    pub agent: AgentConfig,
    pub backend: BackendConfig,
    pub policy: PolicyConfig,
}

impl Config {
    /// Load configuration from `path`, or the default location, falling
    /// back to defaults when no file exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Config::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Get the config directory path (~/.config/skillrun)
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("skillrun"))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    fn validate(&self) -> Result<()> {
        if self.agent.max_turns == 0 {
            anyhow::bail!("agent.max_turns must be at least 1");
        }
        url::Url::parse(&self.backend.default_base_url).with_context(|| {
            format!("Invalid backend.default_base_url: {}", self.backend.default_base_url)
        })?;
        for route in &self.backend.routes {
            url::Url::parse(&route.base_url).with_context(|| {
                format!("Invalid base_url for route {}: {}", route.prefix, route.base_url)
            })?;
        }
        Ok(())
    }
}

/// Mediator connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediatorConfig {
    pub dial_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub retry_jitter_ms: u64,
    /// Upper bound for a single mediator call, including skill execution
    pub request_timeout_secs: u64,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            dial_timeout_ms: 10_000,
            max_retries: 3,
            retry_delay_ms: 100,
            retry_jitter_ms: 0,
            request_timeout_secs: 300,
        }
    }
}

/// Orchestration loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_turns: u32,
    pub seed: i64,
    pub model_retries: u32,
    pub model_retry_delay_ms: u64,
    pub on_skill_error: SkillErrorMode,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 25,
            seed: 0,
            model_retries: 0,
            model_retry_delay_ms: 500,
            on_skill_error: SkillErrorMode::Abort,
        }
    }
}

/// Model backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub default_base_url: String,
    pub request_timeout_secs: u64,
    /// Checked in order; the first prefix matching the model id wins
    pub routes: Vec<BackendRoute>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            default_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 120,
            routes: vec![BackendRoute {
                prefix: "claude".to_string(),
                base_url: ANTHROPIC_BASE_URL.to_string(),
            }],
        }
    }
}

impl BackendConfig {
    /// Base URL for `model`, honoring an explicit override first
    pub fn base_url_for(&self, model: &str, endpoint_override: Option<&str>) -> String {
        if let Some(endpoint) = endpoint_override {
            return endpoint.to_string();
        }
        self.routes
            .iter()
            .find(|route| model.starts_with(&route.prefix))
            .map(|route| route.base_url.clone())
            .unwrap_or_else(|| self.default_base_url.clone())
    }
}

/// Model-name prefix mapped to an alternate backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRoute {
    pub prefix: String,
    pub base_url: String,
}

/// Policy-denial handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Replacement for the built-in policy-awareness directive
    pub directive: Option<String>,
    /// Regex patterns recognising a denial in a skill error
    pub denial_patterns: Vec<String>,
    pub enforce_denials: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            directive: None,
            denial_patterns: DEFAULT_DENIAL_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            enforce_denials: false,
        }
    }
}
