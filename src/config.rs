use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `[api].base_url`.
pub const BASE_URL_ENV: &str = "CENSUS_API_BASE_URL";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

fn default_session_path() -> PathBuf {
    PathBuf::from("./.census/session.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_family_colors")]
    pub family_colors: Vec<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            currency: default_currency(),
            family_colors: default_family_colors(),
        }
    }
}

fn default_page_size() -> usize {
    10
}
fn default_currency() -> String {
    "₹".to_string()
}
fn default_family_colors() -> Vec<String> {
    [
        "#e3f2fd", "#fce4ec", "#e8f5e9", "#fff3e0", "#f3e5f5", "#e0f7fa", "#ede7f6", "#f1f8e9",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

impl Config {
    /// Configuration with every section defaulted and the given base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                base_url: base_url.into(),
                ..ApiConfig::default()
            },
            session: SessionConfig::default(),
            display: DisplayConfig::default(),
        }
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.api.base_url.trim_end_matches('/')
    }
}

/// Reads and validates the TOML config at `path`.
///
/// When the file does not exist but `CENSUS_API_BASE_URL` is set, a
/// defaulted configuration is used instead. The environment variable always
/// wins over the file's `[api].base_url`.
pub fn load_config(path: &Path) -> Result<Config> {
    let env_url = std::env::var(BASE_URL_ENV).ok().filter(|u| !u.is_empty());

    let mut config = if !path.exists() && env_url.is_some() {
        Config::with_base_url("")
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    };

    if let Some(url) = env_url {
        config.api.base_url = url;
    }

    validate(&config)?;
    Ok(config)
}

/// Parses config text without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

pub fn validate(config: &Config) -> Result<()> {
    let url = config.api.base_url.trim();
    if url.is_empty() {
        anyhow::bail!(
            "api.base_url must be set (or export {})",
            BASE_URL_ENV
        );
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("api.base_url must start with http:// or https://, got '{}'", url);
    }

    if config.api.timeout_secs == 0 {
        anyhow::bail!("api.timeout_secs must be > 0");
    }

    if config.display.page_size == 0 {
        anyhow::bail!("display.page_size must be > 0");
    }

    if config.display.family_colors.is_empty() {
        anyhow::bail!("display.family_colors must contain at least one color");
    }

    Ok(())
}
