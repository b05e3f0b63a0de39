//! reqwest-backed [`ContentFetcher`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{CONNECTION, CONTENT_DISPOSITION, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::{AppError, IoContext, Result};
use crate::fetcher::{ContentFetcher, SessionCookie};
use crate::models::Config;
use crate::utils::{disposition_file_name, fallback_file_name};

/// HTTP client carrying the portal session cookies.
#[derive(Debug, Clone)]
pub struct PortalClient {
    client: Client,
    page_timeout: Duration,
    download_timeout: Duration,
    fallback_name: String,
}

impl PortalClient {
    /// Build a client whose cookie jar holds `cookies` for the portal host.
    pub fn new(config: &Config, cookies: &[SessionCookie]) -> Result<Self> {
        let portal = Url::parse(&config.portal.courses_url)?;
        let jar = Arc::new(Jar::default());
        for cookie in cookies {
            jar.add_cookie_str(&cookie.header_value(), &portal);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let client = Client::builder()
            .user_agent(&config.fetcher.user_agent)
            .default_headers(headers)
            .cookie_provider(jar)
            .build()?;

        Ok(Self {
            client,
            page_timeout: Duration::from_secs(config.fetcher.page_timeout_secs),
            download_timeout: Duration::from_secs(config.fetcher.download_timeout_secs),
            fallback_name: config.sync.fallback_file_name.clone(),
        })
    }

    async fn send(&self, url: &str, timeout: Duration) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(url, format!("HTTP {status}")));
        }
        Ok(response)
    }

    /// Stream a response body into `dir`, via a `.part` file renamed on completion.
    async fn save(&self, url: &str, mut response: Response, dir: &Path) -> Result<PathBuf> {
        let name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_file_name)
            .unwrap_or_else(|| {
                log::warn!("No file name offered for {url}, using a fallback name");
                fallback_file_name(&self.fallback_name, url)
            });

        let path = dir.join(&name);
        let part = dir.join(format!("{name}.part"));
        if let Err(e) = Self::stream_into(url, &mut response, &part).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }

        tokio::fs::rename(&part, &path).await.at_path(&path)?;
        Ok(path)
    }

    async fn stream_into(url: &str, response: &mut Response, part: &Path) -> Result<()> {
        let mut file = tokio::fs::File::create(part).await.at_path(part)?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::fetch(url, e))?
        {
            file.write_all(&chunk).await.at_path(part)?;
        }
        file.flush().await.at_path(part)?;
        Ok(())
    }
}

#[async_trait]
impl ContentFetcher for PortalClient {
    async fn login(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send(url, self.page_timeout).await?;
        if response.url().path().contains("/login") {
            return Err(AppError::session(format!(
                "Portal redirected to {}; the browser session has expired",
                response.url()
            )));
        }
        let bytes = response.bytes().await.map_err(|e| AppError::fetch(url, e))?;
        Ok(bytes.to_vec())
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send(url, self.page_timeout).await?;
        let bytes = response.bytes().await.map_err(|e| AppError::fetch(url, e))?;
        Ok(bytes.to_vec())
    }

    async fn download(&self, url: &str, dir: &Path) -> Option<PathBuf> {
        let result = match self.send(url, self.download_timeout).await {
            Ok(response) => self.save(url, response, dir).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Download skipped: {e}");
                None
            }
        }
    }
}
