//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::fetcher::Browser;
use crate::models::PortalSelectors;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Portal endpoints and semester
    #[serde(default)]
    pub portal: PortalConfig,

    /// HTTP behavior for page fetches and downloads
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Synchronization behavior and on-disk names
    #[serde(default)]
    pub sync: SyncConfig,

    /// Browser profile holding the portal session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Browser>,

    /// Structural markers used to read portal pages
    #[serde(default)]
    pub selectors: PortalSelectors,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, or defaults when the file does not exist yet.
    ///
    /// A file that exists but cannot be read or parsed is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Write configuration back as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.page_timeout_secs == 0 {
            return Err(AppError::validation("fetcher.page_timeout_secs must be > 0"));
        }
        if self.fetcher.download_timeout_secs == 0 {
            return Err(AppError::validation(
                "fetcher.download_timeout_secs must be > 0",
            ));
        }
        if self.sync.max_concurrent == 0 {
            return Err(AppError::validation("sync.max_concurrent must be > 0"));
        }
        for (key, name) in [
            ("sync.manifest_name", &self.sync.manifest_name),
            ("sync.transcript_name", &self.sync.transcript_name),
            ("sync.fallback_file_name", &self.sync.fallback_file_name),
        ] {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                return Err(AppError::validation(format!(
                    "{key} must be a plain file name"
                )));
            }
        }
        url::Url::parse(&self.portal.courses_url)?;
        url::Url::parse(&self.portal.course_url)?;
        self.selectors.validate()
    }

    /// Session root directory under `storage_dir` for the configured semester.
    pub fn session_root(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(format!("Sem{}", self.portal.semester))
    }

    /// Manifest file path under the session root.
    pub fn manifest_path(&self, storage_dir: &Path) -> PathBuf {
        self.session_root(storage_dir).join(&self.sync.manifest_name)
    }
}

/// Portal endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Landing page listing enrolled courses
    #[serde(default = "defaults::courses_url")]
    pub courses_url: String,

    /// Course page URL prefix; the course id is appended
    #[serde(default = "defaults::course_url")]
    pub course_url: String,

    /// Semester number, names the session directory (`Sem{n}`)
    #[serde(default = "defaults::semester")]
    pub semester: u32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            courses_url: defaults::courses_url(),
            course_url: defaults::course_url(),
            semester: defaults::semester(),
        }
    }
}

impl PortalConfig {
    /// Full course page URL for a course id.
    pub fn course_page(&self, course_id: &str) -> String {
        format!("{}{}", self.course_url, course_id)
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Timeout for page fetches in seconds
    #[serde(default = "defaults::page_timeout")]
    pub page_timeout_secs: u64,

    /// Timeout for file downloads in seconds
    #[serde(default = "defaults::download_timeout")]
    pub download_timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            page_timeout_secs: defaults::page_timeout(),
            download_timeout_secs: defaults::download_timeout(),
        }
    }
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum number of courses synchronized at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Manifest file name inside the session root
    #[serde(default = "defaults::manifest_name")]
    pub manifest_name: String,

    /// Transcript file name inside each course directory
    #[serde(default = "defaults::transcript_name")]
    pub transcript_name: String,

    /// Base name for downloads the server does not name
    #[serde(default = "defaults::fallback_file_name")]
    pub fallback_file_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            manifest_name: defaults::manifest_name(),
            transcript_name: defaults::transcript_name(),
            fallback_file_name: defaults::fallback_file_name(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Portal defaults
    pub fn courses_url() -> String {
        "https://moodle.iitb.ac.in/my/courses.php".into()
    }
    pub fn course_url() -> String {
        "https://moodle.iitb.ac.in/course/view.php?id=".into()
    }
    pub fn semester() -> u32 {
        6
    }

    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/116.0".into()
    }
    pub fn page_timeout() -> u64 {
        12
    }
    pub fn download_timeout() -> u64 {
        30
    }

    // Sync defaults
    pub fn max_concurrent() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }
    pub fn manifest_name() -> String {
        "available.json".into()
    }
    pub fn transcript_name() -> String {
        "posts.txt".into()
    }
    pub fn fallback_file_name() -> String {
        "download".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
