// src/models/mod.rs

//! Domain models for the synchronizer.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod course;
mod forum;
mod selectors;

// Re-export all public types
pub use config::{Config, FetcherConfig, LoggingConfig, PortalConfig, SyncConfig};
pub use course::{CourseEntry, CourseRecord};
pub use forum::{Attachment, ForumOutcome, Post};
pub use selectors::{CompiledSelectors, PortalSelectors, parse_selector};

/// A course as listed on the portal's landing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedCourse {
    pub name: String,
    pub id: String,
}

/// Result of synchronizing one course.
#[derive(Debug, Clone, Default)]
pub struct CourseSummary {
    pub new_docs: usize,
    pub new_posts: usize,
    pub failed_downloads: usize,
    pub forum_skipped: bool,
}
