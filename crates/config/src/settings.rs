// Extraction run settings (settings.toml)

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub console: ConsoleSettings,
    pub bridge: BridgeSettings,
    pub filters: FilterSettings,
    pub extraction: ExtractionSettings,
    pub credentials: CredentialSettings,
}

/// Where the order console lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    /// Origin of the console, e.g. `https://pos.example.com`.
    pub base_url: String,
    /// Path of the paginated order list, relative to `base_url`.
    pub list_path: String,
    /// Login page. Defaults to `base_url` when unset.
    pub login_url: Option<String>,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            list_path: "/orders".to_string(),
            login_url: None,
        }
    }
}

/// Headless-browser bridge the session provider drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    pub endpoint: String,
    /// Per-request timeout, including page waits on the bridge side.
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9515".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub locations: Vec<String>,
    pub channels: Vec<String>,
    pub page_size: u32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            locations: Vec::new(),
            channels: Vec::new(),
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub output_root: PathBuf,
    /// Pause between consecutive order detail fetches.
    pub fetch_delay_ms: u64,
    /// Stop after this many consecutive months without orders.
    pub max_empty_months: u32,
    /// Hard cap on months visited.
    pub max_months: u32,
    /// Drop repeated order ids within a month's list pages.
    pub dedupe_orders: bool,
    pub max_pages_per_month: u32,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("orders"),
            fetch_delay_ms: 750,
            max_empty_months: 3,
            max_months: 60,
            dedupe_orders: true,
            max_pages_per_month: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    pub username: Option<String>,
    pub username_env: String,
    pub password_env: String,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            username: None,
            username_env: "OTRACE_USERNAME".to_string(),
            password_env: "OTRACE_PASSWORD".to_string(),
        }
    }
}

impl Settings {
    /// Default settings file location.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ordertrace")
            .join("settings.toml")
    }

    /// Load settings.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used if present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path(), false),
        };

        if !required && !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let settings: Settings =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        settings.validate()?;
        debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ex = &self.extraction;
        if ex.max_months == 0 {
            return Err(ConfigError::Invalid("extraction.max_months must be at least 1".into()));
        }
        if ex.max_empty_months == 0 {
            return Err(ConfigError::Invalid(
                "extraction.max_empty_months must be at least 1".into(),
            ));
        }
        if ex.max_pages_per_month == 0 {
            return Err(ConfigError::Invalid(
                "extraction.max_pages_per_month must be at least 1".into(),
            ));
        }
        if self.filters.page_size == 0 {
            return Err(ConfigError::Invalid("filters.page_size must be at least 1".into()));
        }
        if self.bridge.timeout_secs == 0 {
            return Err(ConfigError::Invalid("bridge.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Absolute URL of the order list.
    pub fn list_url(&self) -> Result<String, ConfigError> {
        let base = self.console.base_url.trim_end_matches('/');
        if base.is_empty() {
            return Err(ConfigError::Invalid("console.base_url is not set".into()));
        }
        let path = self.console.list_path.trim_start_matches('/');
        Ok(format!("{}/{}", base, path))
    }

    pub fn login_url(&self) -> Result<String, ConfigError> {
        match &self.console.login_url {
            Some(url) if !url.trim().is_empty() => Ok(url.clone()),
            _ => {
                let base = self.console.base_url.trim_end_matches('/');
                if base.is_empty() {
                    Err(ConfigError::Invalid("console.base_url is not set".into()))
                } else {
                    Ok(base.to_string())
                }
            }
        }
    }
}

/// Resolve a secret: explicit value first, then the environment variable.
pub fn resolve_secret(
    flag: Option<&str>,
    env_var: &str,
    what: &'static str,
) -> Result<String, ConfigError> {
    if let Some(value) = flag.filter(|v| !v.is_empty()) {
        return Ok(value.to_string());
    }
    match std::env::var(env_var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingCredential {
            what,
            env: env_var.to_string(),
        }),
    }
}
