//! Configuration management for ntm.
//!
//! Loads configuration from ${NTM_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable holding an absolute API base URL.
pub const API_BASE_URL_ENV: &str = "NTM_API_BASE_URL";

/// Environment variable holding the backend origin (dev proxy target).
pub const API_ORIGIN_ENV: &str = "NTM_API_URL";

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
/// To update, edit default_config.toml directly.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Merges user config values into the default template.
///
/// This ensures new comments/sections from the template are always present,
/// while preserving user's customized values.
fn merge_with_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;

    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source.iter() {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for ntm configuration and data files.
    //!
    //! NTM_HOME resolution order:
    //! 1. NTM_HOME environment variable (if set)
    //! 2. ~/.config/ntm (default)

    use std::path::PathBuf;

    /// Returns the ntm home directory.
    pub fn ntm_home() -> PathBuf {
        if let Ok(home) = std::env::var("NTM_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("ntm")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        ntm_home().join("config.toml")
    }

    /// Returns the path to the persisted credentials file.
    pub fn credentials_path() -> PathBuf {
        ntm_home().join("credentials.json")
    }

    /// Returns the directory log files are written to.
    pub fn logs_dir() -> PathBuf {
        ntm_home().join("logs")
    }
}

/// Backend API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Absolute base URL; wins over `origin` + `base_path` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Backend origin (the dev proxy target).
    pub origin: String,
    /// Path prefix every endpoint lives under.
    pub base_path: String,
    /// Timeout for ordinary requests.
    pub timeout_ms: u64,
    /// Timeout for the task test run.
    pub test_timeout_ms: u64,
    /// Default number of execution records to fetch.
    pub executions_limit: u32,
}

impl ApiConfig {
    const DEFAULT_ORIGIN: &str = "http://localhost:8000";
    const DEFAULT_BASE_PATH: &str = "/api";
    const DEFAULT_TIMEOUT_MS: u64 = 10_000;
    /// Test runs wait for the downstream AI response.
    const DEFAULT_TEST_TIMEOUT_MS: u64 = 180_000;
    const DEFAULT_EXECUTIONS_LIMIT: u32 = 10;

    /// Returns the configured absolute base URL, treating blank as unset.
    pub fn effective_base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.test_timeout_ms)
    }

    /// Resolves the base URL with precedence:
    /// `NTM_API_BASE_URL` > `base_url` > (`NTM_API_URL` or `origin`) + `base_path`.
    ///
    /// # Errors
    /// Returns an error if the resolved URL is malformed.
    pub fn resolve_base_url(&self) -> Result<String> {
        self.resolve_base_url_with(
            std::env::var(API_BASE_URL_ENV).ok().as_deref(),
            std::env::var(API_ORIGIN_ENV).ok().as_deref(),
        )
    }

    fn resolve_base_url_with(
        &self,
        env_base_url: Option<&str>,
        env_origin: Option<&str>,
    ) -> Result<String> {
        fn non_blank(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|v| !v.is_empty())
        }

        if let Some(url) = non_blank(env_base_url).or(self.effective_base_url()) {
            validate_url(url)?;
            return Ok(url.trim_end_matches('/').to_string());
        }

        let origin = non_blank(env_origin).unwrap_or(self.origin.trim());
        let origin = origin.trim_end_matches('/');
        let base_path = self.base_path.trim().trim_matches('/');
        let url = if base_path.is_empty() {
            origin.to_string()
        } else {
            format!("{origin}/{base_path}")
        };
        validate_url(&url)?;
        Ok(url)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            origin: Self::DEFAULT_ORIGIN.to_string(),
            base_path: Self::DEFAULT_BASE_PATH.to_string(),
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
            test_timeout_ms: Self::DEFAULT_TEST_TIMEOUT_MS,
            executions_limit: Self::DEFAULT_EXECUTIONS_LIMIT,
        }
    }
}

/// Validates that a URL is well-formed.
fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid API base URL: {url}"))?;
    Ok(())
}

/// Toast notification configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToastConfig {
    pub duration_ms: u64,
}

impl ToastConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self { duration_ms: 3000 }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to `$NTM_HOME/logs/ntm.log`.
    pub file: bool,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub toast: ToastConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Saves only `api.origin` to a specific config file path.
    ///
    /// Creates the file with default template if it doesn't exist.
    /// If file exists, merges user values into the latest template.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the file cannot be written.
    pub fn save_origin_to(path: &Path, origin: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let origin = origin.trim();
        validate_url(origin)?;

        let contents = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            merge_with_template(&user_config)?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["api"]["origin"] = value(origin);

        Self::write_config(path, &doc.to_string())
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Generates a fresh config TOML from Rust defaults.
    ///
    /// Used by `xtask update-default-config` to keep `default_config.toml`
    /// in sync with the values in `Config::default()`.
    ///
    /// # Errors
    /// Returns an error if the template or the defaults fail to serialize.
    pub fn generate() -> Result<String> {
        use toml_edit::DocumentMut;

        let generated_toml = toml::to_string(&Config::default())
            .context("Failed to serialize default config to TOML")?;

        let mut doc: DocumentMut = default_config_template()
            .parse()
            .context("Failed to parse default config template")?;
        let generated_doc: DocumentMut = generated_toml
            .parse()
            .context("Failed to parse generated config")?;

        merge_items(doc.as_table_mut(), generated_doc.as_table());

        Ok(doc.to_string())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}
