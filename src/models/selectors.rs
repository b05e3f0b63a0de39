// src/models/selectors.rs

//! Structural markers used to read portal pages.

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// CSS selectors and URL markers for the portal's markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSelectors {
    /// Course card on the listing page
    pub course_item: String,

    /// Attribute on the course card carrying the course id
    pub course_id_attr: String,

    /// Muted label blocks inside a course card
    pub course_label: String,

    /// Index of the label block holding the course name
    pub course_label_index: usize,

    /// Inner element of the label block
    pub course_name: String,

    /// Index of the inner element holding the course name
    pub course_name_index: usize,

    /// Activity links on a course page
    pub resource_link: String,

    /// URL substring identifying the forum/announcements link
    pub forum_marker: String,

    /// URL substring identifying a downloadable resource
    pub resource_marker: String,

    /// Thread listing table body on the forum index
    pub thread_table: String,

    /// Cell holding each thread's conversation link
    pub thread_cell: String,

    /// Post article on a conversation page
    pub post: String,

    /// Attribute on the post article carrying the post id
    pub post_id_attr: String,

    /// Post title
    pub post_title: String,

    /// Post timestamp
    pub post_time: String,

    /// Plain paragraphs of the post body
    pub post_paragraph: String,

    /// Rich-text blocks of the post body
    pub post_rich_text: String,

    /// Links carrying an accessibility label
    pub attachment_link: String,

    /// Pattern an attachment's accessibility label must match
    pub attachment_label_pattern: String,
}

impl Default for PortalSelectors {
    fn default() -> Self {
        Self {
            course_item: "li.course-listitem".to_string(),
            course_id_attr: "data-course-id".to_string(),
            course_label: "div.text-muted".to_string(),
            course_label_index: 1,
            course_name: "div".to_string(),
            course_name_index: 1,
            resource_link: "a.aalink".to_string(),
            forum_marker: "forum".to_string(),
            resource_marker: "resource".to_string(),
            thread_table: "tbody".to_string(),
            thread_cell: "th".to_string(),
            post: r#"div[data-content="forum-post"]"#.to_string(),
            post_id_attr: "data-post-id".to_string(),
            post_title: "h3".to_string(),
            post_time: "time".to_string(),
            post_paragraph: "p".to_string(),
            post_rich_text: "div.text_to_html".to_string(),
            attachment_link: "a[aria-label]".to_string(),
            attachment_label_pattern: "^Attachment".to_string(),
        }
    }
}

impl PortalSelectors {
    /// Check that every selector and pattern parses.
    pub fn validate(&self) -> Result<()> {
        for selector in [
            &self.course_item,
            &self.course_label,
            &self.course_name,
            &self.resource_link,
            &self.thread_table,
            &self.thread_cell,
            &self.post,
            &self.post_title,
            &self.post_time,
            &self.post_paragraph,
            &self.post_rich_text,
            &self.attachment_link,
        ] {
            parse_selector(selector)?;
        }
        Regex::new(&self.attachment_label_pattern)
            .map_err(|e| AppError::selector(&self.attachment_label_pattern, e))?;
        if self.forum_marker.is_empty() || self.resource_marker.is_empty() {
            return Err(AppError::validation("URL markers must not be empty"));
        }
        Ok(())
    }

    /// Compile into ready-to-use matchers.
    pub fn compile(&self) -> Result<CompiledSelectors> {
        Ok(CompiledSelectors {
            course_item: parse_selector(&self.course_item)?,
            course_label: parse_selector(&self.course_label)?,
            course_name: parse_selector(&self.course_name)?,
            resource_link: parse_selector(&self.resource_link)?,
            thread_table: parse_selector(&self.thread_table)?,
            thread_cell: parse_selector(&self.thread_cell)?,
            anchor: parse_selector("a")?,
            post: parse_selector(&self.post)?,
            post_title: parse_selector(&self.post_title)?,
            post_time: parse_selector(&self.post_time)?,
            post_paragraph: parse_selector(&self.post_paragraph)?,
            post_rich_text: parse_selector(&self.post_rich_text)?,
            attachment_link: parse_selector(&self.attachment_link)?,
            attachment_label: Regex::new(&self.attachment_label_pattern)
                .map_err(|e| AppError::selector(&self.attachment_label_pattern, e))?,
            raw: self.clone(),
        })
    }
}

/// Parsed form of [`PortalSelectors`], shared read-only across course tasks.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub course_item: Selector,
    pub course_label: Selector,
    pub course_name: Selector,
    pub resource_link: Selector,
    pub thread_table: Selector,
    pub thread_cell: Selector,
    pub anchor: Selector,
    pub post: Selector,
    pub post_title: Selector,
    pub post_time: Selector,
    pub post_paragraph: Selector,
    pub post_rich_text: Selector,
    pub attachment_link: Selector,
    pub attachment_label: Regex,
    pub raw: PortalSelectors,
}

/// Parse a CSS selector, mapping failures to [`AppError::Selector`].
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
