use crate::error::{Rep365Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub harvest: HarvestConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Remote API endpoint settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the security API (no trailing slash)
    pub base_url: String,

    /// Name of the environment variable holding the bearer token.
    /// Token acquisition itself is handled outside this tool.
    pub token_env: String,

    /// Page size requested from collection endpoints
    pub page_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.securitycenter.microsoft.com/api".to_string(),
            token_env: "REP365_TOKEN".to_string(),
            page_size: 100,
        }
    }
}

/// Client-side request budget per rolling window
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // MDE documents 45 calls/min for most list endpoints
        Self {
            requests: 45,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct HarvestConfig {
    /// Fixed pause between successive per-item detail calls, in seconds
    pub detail_delay_secs: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            detail_delay_secs: 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    /// Default directory for report files
    pub directory: PathBuf,

    /// Default max records per output file (0 = unbounded)
    #[serde(default)]
    pub ceiling: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./reports"),
            ceiling: 0,
        }
    }
}

/// Configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "rep365", "rep365").ok_or_else(|| {
            Rep365Error::ConfigError("Failed to determine config directory".into())
        })?;

        let config_dir = project_dirs.config_dir().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }

        Ok(Self { config_dir })
    }

    /// Alias for new() to match call sites in cmd modules
    pub fn load() -> Result<Self> {
        Self::new()
    }

    /// Construct against an explicit directory (used by tests)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Load main config, falling back to defaults when no file exists
    pub fn load_config(&self) -> Result<Config> {
        let config_path = self.config_file();

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save main config
    pub fn save_config(&self, config: &Config) -> Result<()> {
        let config_path = self.config_file();
        let contents = toml::to_string_pretty(config)
            .map_err(|e| Rep365Error::ConfigError(format!("Failed to serialize config: {}", e)))?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Resolve the bearer token from the configured environment variable
    pub fn api_token(&self, config: &Config) -> Result<String> {
        match std::env::var(&config.api.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(Rep365Error::TokenNotFound),
        }
    }
}
