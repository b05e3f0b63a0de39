//! Append-only per-course transcript of forum posts.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::{IoContext, Result};

/// Width (in `--` pairs) of the line under the transcript header.
const HEADER_SEPARATOR_WIDTH: usize = 50;

/// Handle to a course's `posts.txt`.
#[derive(Debug, Clone)]
pub struct Transcript {
    path: PathBuf,
}

impl Transcript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header written when a course is first discovered.
    pub fn header(course_name: &str) -> String {
        format!("{}\n{}", course_name, "--".repeat(HEADER_SEPARATOR_WIDTH))
    }

    /// Create (or truncate) the transcript with its header.
    pub async fn create(path: impl Into<PathBuf>, course_name: &str) -> Result<Self> {
        let transcript = Self::new(path);
        tokio::fs::write(&transcript.path, Self::header(course_name))
            .await
            .at_path(&transcript.path)?;
        Ok(transcript)
    }

    /// Write the header only if the file is missing.
    pub async fn ensure(path: impl Into<PathBuf>, course_name: &str) -> Result<Self> {
        let path = path.into();
        if tokio::fs::try_exists(&path).await.at_path(&path)? {
            return Ok(Self::new(path));
        }
        log::warn!("Transcript missing, recreating {}", path.display());
        Self::create(path, course_name).await
    }

    /// Append rendered post blocks in a single write.
    ///
    /// Blocks are separated by newlines and the chunk starts on a fresh line.
    /// An empty slice leaves the file untouched.
    pub async fn append(&self, blocks: &[String]) -> Result<()> {
        if blocks.is_empty() {
            return Ok(());
        }
        let chunk = format!("\n{}", blocks.join("\n"));

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .at_path(&self.path)?;
        file.write_all(chunk.as_bytes()).await.at_path(&self.path)?;
        file.flush().await.at_path(&self.path)?;
        Ok(())
    }
}
