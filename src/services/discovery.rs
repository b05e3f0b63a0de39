//! Course discovery service.
//!
//! Reads the landing page's course cards and reconciles them with the manifest.

use std::collections::HashSet;

use scraper::Html;

use crate::error::Result;
use crate::fetcher::ContentFetcher;
use crate::models::{CompiledSelectors, CourseRecord, ListedCourse};
use crate::storage::ManifestStore;
use crate::utils::normalize_name;

/// Service turning the course listing into per-course handles.
pub struct CourseDiscovery<'a> {
    fetcher: &'a dyn ContentFetcher,
    selectors: &'a CompiledSelectors,
}

impl<'a> CourseDiscovery<'a> {
    pub fn new(fetcher: &'a dyn ContentFetcher, selectors: &'a CompiledSelectors) -> Self {
        Self { fetcher, selectors }
    }

    /// Log in, list enrolled courses and return one record per course in page order.
    ///
    /// Unknown courses get a fresh directory and transcript; known ones are reopened.
    pub async fn discover(
        &self,
        store: &mut ManifestStore,
        courses_url: &str,
    ) -> Result<Vec<CourseRecord>> {
        log::info!("Logging in to {courses_url}");
        let page = self.fetcher.login(courses_url).await?;
        let listed = parse_course_list(&String::from_utf8_lossy(&page), self.selectors);
        if listed.is_empty() {
            log::warn!("No courses found on {courses_url}");
        }

        let mut records = Vec::with_capacity(listed.len());
        for course in listed {
            let record = match store.reopen(&course.id).await? {
                Some(record) => {
                    log::debug!("Known course {} ({})", course.name, course.id);
                    record
                }
                None => store.create_entry(&course.name, &course.id).await?,
            };
            records.push(record);
        }

        log::info!("Found {} courses", records.len());
        Ok(records)
    }
}

/// Extract `(name, id)` pairs from the course listing, in page order.
///
/// Cards missing a name or id are skipped with a warning; repeated ids keep
/// their first card.
pub fn parse_course_list(html: &str, selectors: &CompiledSelectors) -> Vec<ListedCourse> {
    let document = Html::parse_document(html);
    let raw = &selectors.raw;
    let mut seen = HashSet::new();
    let mut courses = Vec::new();

    for card in document.select(&selectors.course_item) {
        let Some(id) = card
            .value()
            .attr(&raw.course_id_attr)
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            log::warn!("Course card without {} skipped", raw.course_id_attr);
            continue;
        };

        let name = card
            .select(&selectors.course_label)
            .nth(raw.course_label_index)
            .and_then(|label| label.select(&selectors.course_name).nth(raw.course_name_index))
            .map(|el| normalize_name(&el.text().collect::<String>()))
            .filter(|name| !name.is_empty());
        let Some(name) = name else {
            log::warn!("Course card {id} has no readable name, skipped");
            continue;
        };

        if seen.insert(id.to_string()) {
            courses.push(ListedCourse {
                name,
                id: id.to_string(),
            });
        }
    }
    courses
}
