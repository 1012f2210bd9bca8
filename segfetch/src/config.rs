//! Download configuration.
//!
//! [`DownloadConfig`] is passed explicitly to the
//! [`DownloadCoordinator`](crate::download::DownloadCoordinator); there is no
//! process-wide state. [`ConfigFile`] loads the same settings from an INI file:
//!
//! ```ini
//! [download]
//! workers = 8
//! buffer_size = 8192
//! connect_timeout_secs = 5
//! timeout_secs = 300
//! progress_interval_ms = 100
//! user_agent = segfetch/0.1
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

/// Default number of segment workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Default read buffer size per worker (8KB).
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Default progress polling interval in milliseconds.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 100;

const DOWNLOAD_SECTION: &str = "download";
const CONFIG_DIR_NAME: &str = ".segfetch";
const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or parsed as INI.
    #[error("failed to load config {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    /// The file could not be written.
    #[error("failed to save config {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A key had a value that could not be parsed.
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    /// The home directory could not be determined.
    #[error("could not determine home directory")]
    NoHomeDir,
}

/// Settings for a download job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Number of segments, and therefore worker threads, per job.
    pub workers: usize,

    /// Size of the read buffer each worker streams through.
    pub buffer_size: usize,

    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,

    /// Timeout for a whole request, including reading the body.
    pub timeout: Duration,

    /// How often a [`ProgressReporter`](crate::download::ProgressReporter) polls.
    pub progress_interval: Duration,

    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            progress_interval: Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS),
            user_agent: concat!("segfetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl DownloadConfig {
    /// Set the number of workers.
    ///
    /// Zero is accepted here and rejected when a job is planned.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the per-worker read buffer size (minimum 1 byte).
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the progress polling interval.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Set the User-Agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Settings as stored in the INI file. Unset keys keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub workers: Option<usize>,
    pub buffer_size: Option<usize>,
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub progress_interval_ms: Option<u64>,
    pub user_agent: Option<String>,
}

impl ConfigFile {
    /// Load from the default location, `~/.segfetch/config.ini`.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse settings from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Load {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let Some(section) = ini.section(Some(DOWNLOAD_SECTION)) else {
            return Ok(Self::default());
        };

        Ok(Self {
            workers: parse_key(section.get("workers"), "download.workers")?,
            buffer_size: parse_key(section.get("buffer_size"), "download.buffer_size")?,
            connect_timeout_secs: parse_key(
                section.get("connect_timeout_secs"),
                "download.connect_timeout_secs",
            )?,
            timeout_secs: parse_key(section.get("timeout_secs"), "download.timeout_secs")?,
            progress_interval_ms: parse_key(
                section.get("progress_interval_ms"),
                "download.progress_interval_ms",
            )?,
            user_agent: section
                .get("user_agent")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        })
    }

    /// Write the set keys to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let mut ini = Ini::new();
        let entries = [
            ("workers", self.workers.map(|v| v.to_string())),
            ("buffer_size", self.buffer_size.map(|v| v.to_string())),
            (
                "connect_timeout_secs",
                self.connect_timeout_secs.map(|v| v.to_string()),
            ),
            ("timeout_secs", self.timeout_secs.map(|v| v.to_string())),
            (
                "progress_interval_ms",
                self.progress_interval_ms.map(|v| v.to_string()),
            ),
            ("user_agent", self.user_agent.clone()),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                ini.set_to(Some(DOWNLOAD_SECTION), key.to_string(), value);
            }
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Save {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        ini.write_to_file(path).map_err(|e| ConfigError::Save {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Apply the set keys on top of `base`.
    pub fn apply(&self, base: DownloadConfig) -> DownloadConfig {
        let mut config = base;
        if let Some(v) = self.workers {
            config = config.with_workers(v);
        }
        if let Some(v) = self.buffer_size {
            config = config.with_buffer_size(v);
        }
        if let Some(v) = self.connect_timeout_secs {
            config = config.with_connect_timeout(Duration::from_secs(v));
        }
        if let Some(v) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(v));
        }
        if let Some(v) = self.progress_interval_ms {
            config = config.with_progress_interval(Duration::from_millis(v));
        }
        if let Some(ref v) = self.user_agent {
            config = config.with_user_agent(v.clone());
        }
        config
    }

    /// Convert into a full configuration, filling unset keys with defaults.
    pub fn to_config(&self) -> DownloadConfig {
        self.apply(DownloadConfig::default())
    }
}

/// Path of the default configuration file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoHomeDir)
}

fn parse_key<T: FromStr>(raw: Option<&str>, key: &str) -> Result<Option<T>, ConfigError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            }),
    }
}
