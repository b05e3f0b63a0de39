//! Service layer for the synchronizer.
//!
//! This module contains the business logic for:
//! - Course discovery (`CourseDiscovery`)
//! - Per-course resource download (`CourseSynchronizer`)
//! - Forum transcript and attachment sync (`ForumSynchronizer`)

mod course;
mod discovery;
mod forum;

pub use course::{CoursePage, CourseSynchronizer, parse_course_page};
pub use discovery::{CourseDiscovery, parse_course_list};
pub use forum::{ForumSynchronizer, parse_conversation, parse_thread_links};
