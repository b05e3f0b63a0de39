// src/pipeline/sync.rs

//! Whole-run entry point: open the manifest, discover courses, dispatch, flush.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::fetcher::ContentFetcher;
use crate::models::{CompiledSelectors, Config};
use crate::services::CourseDiscovery;
use crate::storage::ManifestStore;

use super::dispatch::{DispatchReport, Dispatcher};

/// Outcome of a full synchronization run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub courses: usize,
    pub dispatch: DispatchReport,
    pub elapsed: Duration,
}

impl SyncReport {
    pub fn interrupted(&self) -> bool {
        self.dispatch.interrupted
    }

    /// True when every course finished and nothing was interrupted.
    pub fn is_clean(&self) -> bool {
        !self.interrupted() && self.dispatch.failed.is_empty()
    }
}

/// Run one synchronization over every enrolled course.
///
/// The manifest is acquired at the start and flushed exactly once before
/// returning, whether discovery failed, a course failed, or `shutdown`
/// fired. Only a manifest that cannot be read or written fails the run
/// without a flush.
pub async fn run_sync<S>(
    config: &Config,
    storage_dir: &Path,
    fetcher: &dyn ContentFetcher,
    shutdown: S,
) -> Result<SyncReport>
where
    S: Future<Output = ()>,
{
    let started = Instant::now();
    let selectors = config.selectors.compile()?;
    let mut store = ManifestStore::open(config, storage_dir).await?;
    log::info!(
        "Session root {} ({} known courses)",
        store.root().display(),
        store.manifest().len()
    );

    tokio::pin!(shutdown);
    let outcome = sync_courses(config, fetcher, &selectors, &mut store, &mut shutdown).await;
    let flushed = store.flush().await;

    let mut report = outcome?;
    flushed?;
    report.elapsed = started.elapsed();
    Ok(report)
}

async fn sync_courses<S>(
    config: &Config,
    fetcher: &dyn ContentFetcher,
    selectors: &CompiledSelectors,
    store: &mut ManifestStore,
    shutdown: &mut Pin<&mut S>,
) -> Result<SyncReport>
where
    S: Future<Output = ()>,
{
    let discovery = CourseDiscovery::new(fetcher, selectors);
    let records = tokio::select! {
        biased;
        _ = shutdown.as_mut() => {
            log::warn!("Interrupted during course discovery");
            return Ok(SyncReport {
                dispatch: DispatchReport {
                    interrupted: true,
                    ..DispatchReport::default()
                },
                ..SyncReport::default()
            });
        }
        records = discovery.discover(store, &config.portal.courses_url) => records?,
    };

    let courses = records.len();
    let dispatch = Dispatcher::new(fetcher, selectors, config.sync.max_concurrent)
        .run(records, store.manifest_mut(), shutdown.as_mut())
        .await;

    Ok(SyncReport {
        courses,
        dispatch,
        elapsed: Duration::ZERO,
    })
}
