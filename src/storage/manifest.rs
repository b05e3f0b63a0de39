//! Manifest store: the durable record of known courses and synchronized ids.
//!
//! The manifest is a single JSON object keyed by course id. It is read once at
//! startup and written once at the end of a run, atomically (temp file, then
//! rename), so an interrupted write never leaves a truncated manifest behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, IoContext, Result};
use crate::models::{Config, CourseEntry, CourseRecord};
use crate::storage::Transcript;
use crate::utils::{course_dir_name, query_param};

/// Typed in-memory manifest, keyed by course id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    courses: BTreeMap<String, CourseEntry>,
}

impl Manifest {
    pub fn get(&self, id: &str) -> Option<&CourseEntry> {
        self.courses.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CourseEntry> {
        self.courses.values()
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    /// Merge a course snapshot under its id.
    pub fn merge(&mut self, entry: CourseEntry) {
        match self.courses.get_mut(&entry.id) {
            Some(existing) => existing.merge(entry),
            None => {
                self.courses.insert(entry.id.clone(), entry);
            }
        }
    }

    fn insert(&mut self, entry: CourseEntry) {
        self.courses.insert(entry.id.clone(), entry);
    }

    fn location_taken(&self, location: &Path, by_other_than: &str) -> bool {
        self.courses
            .values()
            .any(|e| e.location == location && e.id != by_other_than)
    }

    /// Serialized form; locations are stored relative to the session root.
    fn to_json(&self) -> Result<Vec<u8>> {
        let courses: BTreeMap<&String, CourseEntry> = self
            .courses
            .iter()
            .map(|(id, entry)| {
                let mut entry = entry.clone();
                if let Some(dir) = entry.location.file_name() {
                    entry.location = PathBuf::from(dir);
                }
                (id, entry)
            })
            .collect();
        Ok(serde_json::to_vec_pretty(&courses)?)
    }
}

/// Entry shape accepted on load, including older layouts.
#[derive(Debug, Deserialize)]
struct StoredEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "loc")]
    location: Option<PathBuf>,
    #[serde(default)]
    docs: Vec<String>,
    #[serde(default)]
    posts: Vec<String>,
    #[serde(default)]
    forum: Option<String>,
}

/// Manifest plus the session root it lives in.
#[derive(Debug)]
pub struct ManifestStore {
    root: PathBuf,
    path: PathBuf,
    course_url: String,
    transcript_name: String,
    manifest: Manifest,
}

impl ManifestStore {
    /// Open the manifest for the configured session, bootstrapping it on first run.
    pub async fn open(config: &Config, storage_dir: &Path) -> Result<Self> {
        let root = config.session_root(storage_dir);
        let path = config.manifest_path(storage_dir);

        if !tokio::fs::try_exists(&path).await.at_path(&path)? {
            log::info!("Creating session directory {}", root.display());
            tokio::fs::create_dir_all(&root).await.at_path(&root)?;
            write_atomic(&path, b"{}").await?;
        }

        let bytes = tokio::fs::read(&path).await.at_path(&path)?;
        let mut store = Self {
            root,
            path,
            course_url: config.portal.course_url.clone(),
            transcript_name: config.sync.transcript_name.clone(),
            manifest: Manifest::default(),
        };
        let quarantined = store.parse(&bytes)?;
        if !quarantined.is_empty() {
            store.quarantine(quarantined).await?;
        }

        log::info!(
            "Loaded manifest {} ({} courses)",
            store.path.display(),
            store.manifest.len()
        );
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }

    /// Register a newly discovered course.
    ///
    /// The course directory is cleared and recreated, and the transcript gets its
    /// header. Only called for ids the manifest does not know yet.
    pub async fn create_entry(&mut self, name: &str, id: &str) -> Result<CourseRecord> {
        if let Some(record) = self.reopen(id).await? {
            return Ok(record);
        }

        let mut location = self.root.join(course_dir_name(name, id));
        if self.manifest.location_taken(&location, id) {
            log::warn!("Course name {name} is already used by another course id, keeping both");
            location = self.root.join(course_dir_name(&format!("{name}_{id}"), id));
        }
        if location.parent() != Some(self.root.as_path()) {
            return Err(AppError::validation(format!(
                "course directory {} is outside {}",
                location.display(),
                self.root.display()
            )));
        }

        if tokio::fs::try_exists(&location).await.at_path(&location)? {
            tokio::fs::remove_dir_all(&location)
                .await
                .at_path(&location)?;
        }
        tokio::fs::create_dir_all(&location)
            .await
            .at_path(&location)?;

        let record = CourseRecord::new(
            CourseEntry::new(id, name, format!("{}{}", self.course_url, id), location),
            &self.transcript_name,
        );
        Transcript::create(&record.transcript, name).await?;

        log::info!("New course {} ({})", name, id);
        self.manifest.insert(record.entry.clone());
        Ok(record)
    }

    /// Reopen an existing course, repairing its directory if it went missing.
    pub async fn reopen(&self, id: &str) -> Result<Option<CourseRecord>> {
        let Some(entry) = self.manifest.get(id) else {
            return Ok(None);
        };
        let record = CourseRecord::new(entry.clone(), &self.transcript_name);
        tokio::fs::create_dir_all(record.location())
            .await
            .at_path(record.location())?;
        Transcript::ensure(&record.transcript, record.name()).await?;
        Ok(Some(record))
    }

    /// Persist the whole manifest atomically.
    pub async fn flush(&self) -> Result<()> {
        let bytes = self.manifest.to_json()?;
        write_atomic(&self.path, &bytes).await?;
        log::info!(
            "Manifest saved to {} ({} courses)",
            self.path.display(),
            self.manifest.len()
        );
        Ok(())
    }

    /// Parse the raw document into typed entries; returns the entries that did not fit.
    fn parse(&mut self, bytes: &[u8]) -> Result<Map<String, Value>> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| AppError::corrupt_manifest(&self.path, e))?;
        let Value::Object(object) = value else {
            return Err(AppError::corrupt_manifest(
                &self.path,
                "top level is not a JSON object",
            ));
        };

        let mut quarantined = Map::new();
        for (key, raw) in object {
            match self.normalize(&key, raw.clone()) {
                Ok(mut entry) => {
                    let dropped = entry.dedup();
                    if dropped > 0 {
                        log::warn!("Course {}: dropped {} repeated ids", entry.name, dropped);
                    }
                    self.manifest.merge(entry);
                }
                Err(reason) => {
                    log::warn!("Quarantining manifest entry '{key}': {reason}");
                    quarantined.insert(key, raw);
                }
            }
        }
        Ok(quarantined)
    }

    fn normalize(&self, key: &str, raw: Value) -> std::result::Result<CourseEntry, String> {
        let stored: StoredEntry = serde_json::from_value(raw).map_err(|e| e.to_string())?;

        let id = stored
            .id
            .or_else(|| stored.url.as_deref().and_then(|u| query_param(u, "id")))
            .ok_or_else(|| "no course id and none recoverable from url".to_string())?;
        if id.trim().is_empty() {
            return Err("empty course id".to_string());
        }

        // Older manifests were keyed by name and carried no name field.
        let name = stored
            .name
            .unwrap_or_else(|| if key == id { id.clone() } else { key.to_string() });
        let url = stored
            .url
            .unwrap_or_else(|| format!("{}{}", self.course_url, id));
        // Only the directory name is kept; older manifests stored working-directory paths.
        let dir = stored
            .location
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|dir| dir.to_str())
            .map(|dir| course_dir_name(dir, &id))
            .unwrap_or_else(|| course_dir_name(&name, &id));
        let location = self.root.join(dir);

        Ok(CourseEntry {
            id,
            name,
            url,
            location,
            docs: stored.docs,
            posts: stored.posts,
            forum: stored.forum,
        })
    }

    async fn quarantine(&self, entries: Map<String, Value>) -> Result<()> {
        let path = self.path.with_extension("quarantine.json");
        let mut existing = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(AppError::filesystem(&path, e)),
        };
        existing.extend(entries);
        let bytes = serde_json::to_vec_pretty(&Value::Object(existing))?;
        write_atomic(&path, &bytes).await?;
        log::warn!("Malformed manifest entries moved to {}", path.display());
        Ok(())
    }
}

/// Write bytes atomically (write to temp, then rename).
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await.at_path(&tmp)?;
    file.write_all(bytes).await.at_path(&tmp)?;
    file.sync_all().await.at_path(&tmp)?;
    drop(file);

    tokio::fs::rename(&tmp, path).await.at_path(path)?;
    Ok(())
}
