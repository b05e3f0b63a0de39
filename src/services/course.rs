// src/services/course.rs

//! Course synchronizer service.
//!
//! Downloads resources new to a course and hands its forum to
//! [`ForumSynchronizer`].

use scraper::Html;
use url::Url;

use crate::error::{AppError, Result};
use crate::fetcher::ContentFetcher;
use crate::models::{CompiledSelectors, CourseRecord, CourseSummary};
use crate::services::ForumSynchronizer;
use crate::utils::{resolve_url, resource_id};

/// Links found on a course page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoursePage {
    /// First link whose URL carries the forum marker
    pub forum_url: Option<String>,

    /// `(id, url)` of every resource link, first occurrence per id
    pub resources: Vec<(String, String)>,
}

/// Service synchronizing a single course.
pub struct CourseSynchronizer<'a> {
    fetcher: &'a dyn ContentFetcher,
    selectors: &'a CompiledSelectors,
}

impl<'a> CourseSynchronizer<'a> {
    pub fn new(fetcher: &'a dyn ContentFetcher, selectors: &'a CompiledSelectors) -> Self {
        Self { fetcher, selectors }
    }

    /// Bring one course up to date.
    ///
    /// `record` is extended in place as each download or transcript append
    /// completes, so it holds all finished work even when an error is returned.
    pub async fn sync(&self, record: &mut CourseRecord) -> Result<CourseSummary> {
        log::info!("Looking into {}", record.name());
        let mut summary = CourseSummary::default();

        let url = record.entry.url.clone();
        let bytes = self.fetcher.get(&url).await?;
        let page = parse_course_page(&String::from_utf8_lossy(&bytes), &url, self.selectors);
        record.forum_url = page.forum_url.clone();

        for (id, link) in page.resources {
            if record.entry.has_doc(&id) {
                continue;
            }
            log::info!("Downloading {}/{}", record.name(), id);
            match self.fetcher.download(&link, record.location()).await {
                Some(_) => {
                    record.entry.add_doc(id);
                    summary.new_docs += 1;
                }
                None => summary.failed_downloads += 1,
            }
        }

        // The cached entry.forum is informational; only a link on this page counts.
        let Some(forum_url) = page.forum_url else {
            let error = AppError::missing_forum_link(record.name());
            log::warn!("{error}; skipping forum");
            summary.forum_skipped = true;
            return Ok(summary);
        };

        let forum = ForumSynchronizer::new(self.fetcher, self.selectors)
            .sync(&forum_url, record)
            .await?;
        summary.new_posts += forum.new_posts.len();
        summary.new_docs += forum.new_docs.len();
        summary.failed_downloads += forum.failed_docs.len();

        Ok(summary)
    }
}

/// Split a course page's activity links into the forum link and resources.
pub fn parse_course_page(html: &str, page_url: &str, selectors: &CompiledSelectors) -> CoursePage {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let raw = &selectors.raw;
    let mut page = CoursePage::default();

    let links = document
        .select(&selectors.resource_link)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| match &base {
            Some(base) => resolve_url(base, href),
            None => href.to_string(),
        });

    for link in links {
        if page.forum_url.is_none() && link.contains(&raw.forum_marker) {
            page.forum_url = Some(link);
            continue;
        }
        if !link.contains(&raw.resource_marker) {
            continue;
        }
        let Some(id) = resource_id(&link) else {
            log::warn!("Resource link without id: {link}");
            continue;
        };
        if !page.resources.iter().any(|(known, _)| *known == id) {
            page.resources.push((id, link));
        }
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::fake::FakePortal;
    use crate::fetcher::fake::html::{course_page, forum_index, forum_post};
    use crate::models::{Config, CourseEntry, PortalSelectors};
    use tempfile::TempDir;

    const COURSE: &str = "https://portal/course/view.php?id=42";
    const FORUM: &str = "https://portal/mod/forum/view.php?id=900";

    fn resource(id: &str) -> String {
        format!("https://portal/mod/resource/view.php?id={id}")
    }

    fn record(tmp: &TempDir, docs: &[&str]) -> CourseRecord {
        let dir = tmp.path().join("CS_101");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("posts.txt"), "CS_101\n----").unwrap();
        let mut entry = CourseEntry::new("42", "CS_101", COURSE, dir);
        for doc in docs {
            entry.add_doc(*doc);
        }
        CourseRecord::new(entry, "posts.txt")
    }

    #[test]
    fn test_parse_course_page_partitions_links() {
        let selectors = PortalSelectors::default().compile().unwrap();
        let html = course_page(&[
            "/mod/forum/view.php?id=900",
            "/mod/resource/view.php?id=101",
            "/mod/forum/view.php?id=901",
            "/mod/quiz/view.php?id=5",
            "/mod/resource/view.php?id=101",
            "/mod/resource/view.php?id=102",
        ]);
        let page = parse_course_page(&html, COURSE, &selectors);
        assert_eq!(page.forum_url.as_deref(), Some(FORUM));
        let ids: Vec<&str> = page.resources.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["101", "102"]);
        assert_eq!(page.resources[0].1, resource("101"));
    }

    #[tokio::test]
    async fn test_only_new_resources_are_downloaded() {
        let tmp = TempDir::new().unwrap();
        let selectors = Config::default().selectors.compile().unwrap();
        let portal = FakePortal::new()
            .page(
                COURSE,
                &course_page(&[
                    "/mod/forum/view.php?id=900",
                    "/mod/resource/view.php?id=101",
                    "/mod/resource/view.php?id=102",
                    "/mod/resource/view.php?id=103",
                ]),
            )
            .page(FORUM, &forum_index(&[]))
            .file(&resource("101"), "a.pdf")
            .file(&resource("102"), "b.pdf")
            .file(&resource("103"), "c.pdf");

        let mut rec = record(&tmp, &["101"]);
        let summary = CourseSynchronizer::new(&portal, &selectors)
            .sync(&mut rec)
            .await
            .unwrap();

        assert_eq!(summary.new_docs, 2);
        assert_eq!(portal.downloads(), vec![resource("102"), resource("103")]);
        assert_eq!(rec.entry.docs, vec!["101", "102", "103"]);
        assert_eq!(rec.forum_url.as_deref(), Some(FORUM));
    }

    #[tokio::test]
    async fn test_failed_download_left_for_next_run() {
        let tmp = TempDir::new().unwrap();
        let selectors = Config::default().selectors.compile().unwrap();
        let portal = FakePortal::new()
            .page(
                COURSE,
                &course_page(&[
                    "/mod/forum/view.php?id=900",
                    "/mod/resource/view.php?id=101",
                    "/mod/resource/view.php?id=102",
                ]),
            )
            .page(FORUM, &forum_index(&[]))
            .file(&resource("101"), "a.pdf")
            .fail(&resource("102"));

        let mut rec = record(&tmp, &[]);
        let summary = CourseSynchronizer::new(&portal, &selectors)
            .sync(&mut rec)
            .await
            .unwrap();
        assert_eq!(summary.failed_downloads, 1);
        assert_eq!(rec.entry.docs, vec!["101"]);
    }

    #[tokio::test]
    async fn test_missing_forum_link_keeps_documents() {
        let tmp = TempDir::new().unwrap();
        let selectors = Config::default().selectors.compile().unwrap();
        let portal = FakePortal::new()
            .page(COURSE, &course_page(&["/mod/resource/view.php?id=101"]))
            .file(&resource("101"), "a.pdf");

        let mut rec = record(&tmp, &[]);
        let summary = CourseSynchronizer::new(&portal, &selectors)
            .sync(&mut rec)
            .await
            .unwrap();
        assert!(summary.forum_skipped);
        assert_eq!(rec.entry.docs, vec!["101"]);
    }

    #[tokio::test]
    async fn test_cached_forum_url_not_used_without_link() {
        let tmp = TempDir::new().unwrap();
        let selectors = Config::default().selectors.compile().unwrap();
        let portal = FakePortal::new().page(COURSE, &course_page(&[]));

        let mut rec = record(&tmp, &[]);
        rec.entry.forum = Some(FORUM.to_string());
        let summary = CourseSynchronizer::new(&portal, &selectors)
            .sync(&mut rec)
            .await
            .unwrap();
        assert!(summary.forum_skipped);
        assert_eq!(summary.new_posts, 0);
        assert!(rec.forum_url.is_none());
        assert_eq!(rec.into_entry().forum.as_deref(), Some(FORUM));
    }

    #[tokio::test]
    async fn test_page_fetch_failure_records_nothing() {
        let tmp = TempDir::new().unwrap();
        let selectors = Config::default().selectors.compile().unwrap();
        let portal = FakePortal::new().fail(COURSE);

        let mut rec = record(&tmp, &["101"]);
        let err = CourseSynchronizer::new(&portal, &selectors)
            .sync(&mut rec)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));
        assert_eq!(rec.entry.docs, vec!["101"]);
        assert!(portal.downloads().is_empty());
    }

    #[tokio::test]
    async fn test_forum_posts_and_attachments_flow_into_record() {
        let tmp = TempDir::new().unwrap();
        let selectors = Config::default().selectors.compile().unwrap();
        let thread = "https://portal/mod/forum/discuss.php?d=1";
        let portal = FakePortal::new()
            .page(COURSE, &course_page(&["/mod/forum/view.php?id=900"]))
            .page(FORUM, &forum_index(&[thread]))
            .page(
                thread,
                &forum_post("55", "Exam", "Room 101", &[("Attachment hall plan.png", "/f/9")]),
            )
            .file("https://portal/f/9", "hall plan.png");

        let mut rec = record(&tmp, &[]);
        let summary = CourseSynchronizer::new(&portal, &selectors)
            .sync(&mut rec)
            .await
            .unwrap();
        assert_eq!(summary.new_posts, 1);
        assert_eq!(summary.new_docs, 1);
        assert_eq!(rec.entry.posts, vec!["55"]);
        assert_eq!(rec.entry.docs, vec!["hall_plan.png"]);
        let transcript = std::fs::read_to_string(&rec.transcript).unwrap();
        assert!(transcript.contains("Exam\t1 March 2025\nRoom 101\nAttachment hall plan.png\n"));
    }
}
