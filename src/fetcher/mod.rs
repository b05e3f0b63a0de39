//! Authenticated access to the portal.
//!
//! - `ContentFetcher`: the capability the synchronizers consume
//! - `PortalClient`: reqwest implementation seeded with browser cookies
//! - `Browser`: where the session cookies come from

mod browser;
mod client;
#[cfg(test)]
pub(crate) mod fake;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

pub use browser::{Browser, SessionCookie};
pub use client::PortalClient;

/// Fetch pages and files with an established portal session.
///
/// Implementations are shared by every course task at once, so session state
/// must be read-only after `login`.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Open the landing page with the session and return its markup.
    async fn login(&self, url: &str) -> Result<Vec<u8>>;

    /// Authenticated GET of a page.
    async fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// Download a file into `dir`, named by the server.
    ///
    /// Returns the written path, or `None` on any HTTP or filesystem failure so
    /// the caller can leave the id unrecorded and retry next run.
    async fn download(&self, url: &str, dir: &Path) -> Option<PathBuf>;
}
