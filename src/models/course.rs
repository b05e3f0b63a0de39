// src/models/course.rs

//! Course entries persisted in the manifest and their per-run handles.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One course as recorded in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseEntry {
    /// Portal-assigned course id (manifest key)
    pub id: String,

    /// Normalized display name
    pub name: String,

    /// Course page URL
    pub url: String,

    /// Course directory; written to disk relative to the session root
    #[serde(alias = "loc")]
    pub location: PathBuf,

    /// Resource and attachment ids already downloaded
    #[serde(default)]
    pub docs: Vec<String>,

    /// Forum post ids already written to the transcript
    #[serde(default)]
    pub posts: Vec<String>,

    /// Forum URL discovered on the last successful course page fetch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forum: Option<String>,
}

impl CourseEntry {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            location: location.into(),
            docs: Vec::new(),
            posts: Vec::new(),
            forum: None,
        }
    }

    pub fn has_doc(&self, id: &str) -> bool {
        self.docs.iter().any(|d| d == id)
    }

    pub fn has_post(&self, id: &str) -> bool {
        self.posts.iter().any(|p| p == id)
    }

    /// Record a downloaded document id. Returns `false` if it was already known.
    pub fn add_doc(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.has_doc(&id) {
            return false;
        }
        self.docs.push(id);
        true
    }

    /// Record a processed post id. Returns `false` if it was already known.
    pub fn add_post(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.has_post(&id) {
            return false;
        }
        self.posts.push(id);
        true
    }

    /// Drop repeated ids, keeping first occurrences in order.
    pub fn dedup(&mut self) -> usize {
        let before = self.docs.len() + self.posts.len();
        dedup_in_order(&mut self.docs);
        dedup_in_order(&mut self.posts);
        before - self.docs.len() - self.posts.len()
    }

    /// Fold another snapshot of the same course into this one.
    ///
    /// Ids are only ever added, so an older snapshot can never shrink `docs`/`posts`.
    pub fn merge(&mut self, other: CourseEntry) {
        for doc in other.docs {
            self.add_doc(doc);
        }
        for post in other.posts {
            self.add_post(post);
        }
        if other.forum.is_some() {
            self.forum = other.forum;
        }
        self.url = other.url;
        self.name = other.name;
    }
}

fn dedup_in_order(ids: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));
}

/// In-memory handle a single synchronization task owns for one run.
#[derive(Debug, Clone)]
pub struct CourseRecord {
    pub entry: CourseEntry,

    /// Forum/announcements URL resolved from the course page this run
    pub forum_url: Option<String>,

    /// Transcript file inside the course directory
    pub transcript: PathBuf,
}

impl CourseRecord {
    pub fn new(entry: CourseEntry, transcript_name: &str) -> Self {
        let transcript = entry.location.join(transcript_name);
        Self {
            entry,
            forum_url: None,
            transcript,
        }
    }

    pub fn id(&self) -> &str {
        &self.entry.id
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn location(&self) -> &Path {
        &self.entry.location
    }

    /// Release the handle back into a manifest entry.
    pub fn into_entry(mut self) -> CourseEntry {
        if self.forum_url.is_some() {
            self.entry.forum = self.forum_url;
        }
        self.entry
    }

    /// Manifest entry reflecting the progress recorded so far.
    pub fn snapshot(&self) -> CourseEntry {
        self.clone().into_entry()
    }
}
