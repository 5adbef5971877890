//! Run configuration
//!
//! Settings come from a TOML file and may be overridden field by field by
//! the caller (the CLI applies its flags on top). Keys from the legacy INI
//! layout (`ManifestFile`, `PackageId`, ...) are accepted as aliases.

use crate::error::FetchError;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://nda.nih.gov/api";
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 2 * 60 * 60;
pub const DEFAULT_TRANSFER_PROGRAM: &str = "aria2c";
pub const DEFAULT_HISTORY_LOG: &str = "download_history.log";
pub const DEFAULT_USER_AGENT: &str = concat!("ndafetch/", env!("CARGO_PKG_VERSION"));

/// Configuration as read from disk; required values may still be missing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default, alias = "ManifestFile")]
    pub manifest_file: Option<PathBuf>,

    #[serde(default, alias = "PackageId", deserialize_with = "package_id")]
    pub package_id: Option<String>,

    #[serde(default, alias = "DownloadDirectory")]
    pub download_directory: Option<PathBuf>,

    /// Extra options handed to the transfer tool, whitespace separated
    #[serde(default, alias = "Aria2cOptions")]
    pub transfer_options: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,

    /// Stop after this many iterations instead of retrying forever
    #[serde(default)]
    pub max_iterations: Option<u32>,

    #[serde(default = "default_transfer_program")]
    pub transfer_program: String,

    #[serde(default = "default_history_log")]
    pub history_log: PathBuf,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_retry_interval_secs() -> u64 {
    DEFAULT_RETRY_INTERVAL_SECS
}

fn default_transfer_program() -> String {
    DEFAULT_TRANSFER_PROGRAM.to_string()
}

fn default_history_log() -> PathBuf {
    PathBuf::from(DEFAULT_HISTORY_LOG)
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Package ids are numeric in most configs but only ever used as a path segment
fn package_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Number(n) => n.to_string(),
        Raw::Text(s) => s.trim().to_string(),
    }))
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            manifest_file: None,
            package_id: None,
            download_directory: None,
            transfer_options: String::new(),
            api_base_url: default_api_base_url(),
            retry_interval_secs: default_retry_interval_secs(),
            max_iterations: None,
            transfer_program: default_transfer_program(),
            history_log: default_history_log(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, FetchError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FetchError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Load the file if it exists, otherwise start from defaults
    pub fn load_or_default(path: &Path) -> Result<Self, FetchError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self, FetchError> {
        Ok(toml::from_str(content)?)
    }

    /// Check required values and produce settings ready for a run
    pub fn into_settings(self) -> Result<RunSettings, FetchError> {
        self.validate(true)
    }

    /// Like [`into_settings`](Self::into_settings), but the transfer program
    /// is not looked up on `PATH`. For callers that only resolve the package.
    pub fn into_resolve_settings(self) -> Result<RunSettings, FetchError> {
        self.validate(false)
    }

    fn validate(self, locate_program: bool) -> Result<RunSettings, FetchError> {
        let manifest_file = self
            .manifest_file
            .ok_or_else(|| FetchError::Config("manifest_file is not set".to_string()))?;
        let package_id = self
            .package_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| FetchError::Config("package_id is not set".to_string()))?;
        let download_directory = self
            .download_directory
            .ok_or_else(|| FetchError::Config("download_directory is not set".to_string()))?;

        let api_base_url = Url::parse(&self.api_base_url).map_err(|e| {
            FetchError::Config(format!("invalid api_base_url '{}': {}", self.api_base_url, e))
        })?;
        if api_base_url.cannot_be_a_base() {
            return Err(FetchError::Config(format!(
                "api_base_url '{}' cannot be used as a base URL",
                self.api_base_url
            )));
        }

        let transfer_program = if locate_program {
            which::which(&self.transfer_program).map_err(|e| {
                FetchError::Config(format!(
                    "transfer program '{}' not found: {}",
                    self.transfer_program, e
                ))
            })?
        } else {
            PathBuf::from(&self.transfer_program)
        };

        if self.max_iterations == Some(0) {
            return Err(FetchError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        Ok(RunSettings {
            manifest_file,
            package_id,
            download_directory,
            transfer_options: self
                .transfer_options
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            api_base_url,
            retry_interval: Duration::from_secs(self.retry_interval_secs),
            max_iterations: self.max_iterations,
            transfer_program,
            history_log: self.history_log,
            user_agent: self.user_agent,
        })
    }
}

/// Validated settings for one process lifetime
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub manifest_file: PathBuf,
    pub package_id: String,
    pub download_directory: PathBuf,
    pub transfer_options: Vec<String>,
    pub api_base_url: Url,
    pub retry_interval: Duration,
    pub max_iterations: Option<u32>,
    pub transfer_program: PathBuf,
    pub history_log: PathBuf,
    pub user_agent: String,
}
