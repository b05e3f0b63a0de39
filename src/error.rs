// src/error.rs

//! Unified error handling for the synchronizer.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for synchronizer operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Browser cookie database could not be read
    #[error("Cookie database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Manifest exists on disk but is not a well-formed document
    #[error("Corrupt manifest {path}: {message}")]
    CorruptManifest { path: PathBuf, message: String },

    /// Directory or file creation/write failed
    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Course page has no forum/announcements link
    #[error("No forum link found for course {course}")]
    MissingForumLink { course: String },

    /// Page fetch failed (transport error or non-success status)
    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Browser session could not be created
    #[error("Session error: {0}")]
    Session(String),
}

impl AppError {
    /// Create a corrupt manifest error.
    pub fn corrupt_manifest(path: impl AsRef<Path>, message: impl fmt::Display) -> Self {
        Self::CorruptManifest {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    /// Wrap an I/O error with the path it happened at.
    pub fn filesystem(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a missing forum link error.
    pub fn missing_forum_link(course: impl Into<String>) -> Self {
        Self::MissingForumLink {
            course: course.into(),
        }
    }

    /// Create a fetch error.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a session error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    /// Whether this error must abort the whole run rather than a single course.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CorruptManifest { .. })
    }
}

/// Extension for attaching a path to raw I/O results.
pub trait IoContext<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| AppError::filesystem(path, e))
    }
}
