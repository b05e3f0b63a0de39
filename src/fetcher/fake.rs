//! In-memory portal used by unit tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::fetcher::ContentFetcher;

/// Serves canned pages and files and records every download request.
#[derive(Debug, Default)]
pub struct FakePortal {
    pages: HashMap<String, String>,
    files: HashMap<String, String>,
    failing: HashSet<String>,
    downloads: Mutex<Vec<String>>,
}

impl FakePortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Serve a file at `url`, saved as `name`.
    pub fn file(mut self, url: &str, name: &str) -> Self {
        self.files.insert(url.to_string(), name.to_string());
        self
    }

    /// Make every request for `url` fail.
    pub fn fail(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Stop failing requests for `url`.
    pub fn recover(&mut self, url: &str) {
        self.failing.remove(url);
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn clear_downloads(&self) {
        self.downloads.lock().unwrap().clear();
    }
}

#[async_trait]
impl ContentFetcher for FakePortal {
    async fn login(&self, url: &str) -> Result<Vec<u8>> {
        self.get(url).await
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        if self.failing.contains(url) {
            return Err(AppError::fetch(url, "HTTP 503 Service Unavailable"));
        }
        self.pages
            .get(url)
            .map(|html| html.clone().into_bytes())
            .ok_or_else(|| AppError::fetch(url, "HTTP 404 Not Found"))
    }

    async fn download(&self, url: &str, dir: &Path) -> Option<PathBuf> {
        self.downloads.lock().unwrap().push(url.to_string());
        if self.failing.contains(url) {
            return None;
        }
        let name = self.files.get(url)?;
        let path = dir.join(name);
        tokio::fs::write(&path, url.as_bytes()).await.ok()?;
        Some(path)
    }
}

/// Minimal portal markup for tests.
pub mod html {
    /// Landing page listing the given `(id, name)` courses.
    pub fn course_listing(courses: &[(&str, &str)]) -> String {
        let cards: String = courses
            .iter()
            .map(|(id, name)| {
                format!(
                    r#"<li class="course-listitem" data-course-id="{id}">
                         <div class="text-muted"><div>Course category</div></div>
                         <div class="text-muted">
                           <div>Course name</div>
                           <div>  {name}
                           </div>
                         </div>
                       </li>"#
                )
            })
            .collect();
        format!("<html><body><ul>{cards}</ul></body></html>")
    }

    /// Course page with activity links.
    pub fn course_page(links: &[&str]) -> String {
        let anchors: String = links
            .iter()
            .map(|href| format!(r#"<li><a class="aalink" href="{href}">activity</a></li>"#))
            .collect();
        format!(r#"<html><body><ul><li><a href="/other">nav</a></li>{anchors}</ul></body></html>"#)
    }

    /// Forum index listing the given conversation links.
    pub fn forum_index(threads: &[&str]) -> String {
        let rows: String = threads
            .iter()
            .map(|t| format!(r#"<tr><th><a href="{t}">Thread</a></th><td>x</td></tr>"#))
            .collect();
        format!("<html><body><table><tbody>{rows}</tbody></table></body></html>")
    }

    /// One forum post article with `(label, href)` attachments.
    pub fn forum_post(id: &str, title: &str, body: &str, attachments: &[(&str, &str)]) -> String {
        let links: String = attachments
            .iter()
            .map(|(label, href)| format!(r#"<a href="{href}" aria-label="{label}">file</a>"#))
            .collect();
        format!(
            r#"<div data-content="forum-post" data-post-id="{id}">
                 <h3>{title}</h3><time>1 March 2025</time>
                 <div class="post-content-container"><div class="text_to_html"><p>{body}</p></div></div>
                 <div class="attachments">{links}<a href="/x" aria-label="Reply">Reply</a></div>
               </div>"#
        )
    }
}
