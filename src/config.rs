use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
pub const DEFAULT_MAX_TOKENS: u32 = 8000;
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

// ── Settings ─────────────────────────────────────────────────────────────────

/// Runtime settings for talking to the model.
///
/// Layered: defaults, then the config file, then the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub stream: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: true,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("call-analysis").join("config.toml"))
}

impl Config {
    /// Load from `path` (or the default location) and apply the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(config_path);
        let mut config = match path {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a TOML file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid config at {}", path.display()))
    }

    /// Override fields from environment variables looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = var("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key.trim().to_string());
        }
        if let Some(model) = var("CALL_ANALYSIS_MODEL") {
            self.model = model;
        }
        if let Some(url) = var("CALL_ANALYSIS_BASE_URL") {
            self.base_url = url;
        }
        if let Some(max) = var("CALL_ANALYSIS_MAX_TOKENS") {
            self.max_tokens = max
                .parse()
                .with_context(|| format!("CALL_ANALYSIS_MAX_TOKENS is not a number: {max}"))?;
        }
        if let Some(stream) = var("CALL_ANALYSIS_STREAM") {
            self.stream = matches!(stream.trim(), "1" | "true" | "yes" | "on");
        }
        Ok(())
    }

    /// The API key, or an error naming what is missing.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => anyhow::bail!(
                "API key must not be empty: set ANTHROPIC_API_KEY or run `call-analysis set-key`"
            ),
        }
    }
}

/// Store `key` in the config file at `path`, keeping its other settings.
pub fn save_api_key(path: &Path, key: &str) -> Result<()> {
    let mut config = Config::from_file(path)?;
    config.api_key = Some(key.trim().to_string());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string(&config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config at {}", path.display()))
}
