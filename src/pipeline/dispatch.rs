// src/pipeline/dispatch.rs

//! Parallel dispatcher: one synchronization task per course, bounded by
//! `sync.max_concurrent`, merged back into the manifest in completion order.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::{FutureExt, StreamExt, stream};

use crate::error::Result;
use crate::fetcher::ContentFetcher;
use crate::models::{CompiledSelectors, CourseRecord, CourseSummary};
use crate::services::CourseSynchronizer;
use crate::storage::Manifest;

/// A course whose task ended in an error or panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseFailure {
    pub name: String,
    pub reason: String,
}

/// What one dispatch round did.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Courses whose task finished without error
    pub synced: usize,

    pub failed: Vec<CourseFailure>,

    /// Counts summed over every finished course
    pub totals: CourseSummary,

    /// Set when the shutdown signal fired before all tasks finished
    pub interrupted: bool,
}

impl DispatchReport {
    fn absorb(&mut self, summary: &CourseSummary) {
        self.synced += 1;
        self.totals.new_docs += summary.new_docs;
        self.totals.new_posts += summary.new_posts;
        self.totals.failed_downloads += summary.failed_downloads;
    }
}

/// Runs [`CourseSynchronizer`] across courses.
pub struct Dispatcher<'a> {
    fetcher: &'a dyn ContentFetcher,
    selectors: &'a CompiledSelectors,
    max_concurrent: usize,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        fetcher: &'a dyn ContentFetcher,
        selectors: &'a CompiledSelectors,
        max_concurrent: usize,
    ) -> Self {
        Self {
            fetcher,
            selectors,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Synchronize every record, merging each into `manifest` as it completes.
    ///
    /// A failing or panicking course never stops the others. Its record still
    /// carries every id whose side effect finished, and that progress is merged
    /// too. When `shutdown` resolves, in-flight tasks are dropped and whatever
    /// they had recorded is merged before returning.
    pub async fn run<S>(
        &self,
        mut records: Vec<CourseRecord>,
        manifest: &mut Manifest,
        shutdown: S,
    ) -> DispatchReport
    where
        S: Future<Output = ()>,
    {
        let mut report = DispatchReport::default();
        log::info!(
            "Synchronizing {} courses ({} at a time)",
            records.len(),
            self.max_concurrent
        );

        let mut tasks = stream::iter(records.iter_mut())
            .map(|record| async move {
                let outcome = AssertUnwindSafe(self.sync_one(record))
                    .catch_unwind()
                    .await;
                (record, outcome)
            })
            .buffer_unordered(self.max_concurrent);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    log::warn!("Interrupted, keeping progress of unfinished courses");
                    report.interrupted = true;
                    break;
                }
                next = tasks.next() => {
                    let Some((record, outcome)) = next else { break };
                    manifest.merge(record.snapshot());
                    match outcome {
                        Ok(Ok(summary)) => {
                            log::info!(
                                "{}: {} new documents, {} new posts",
                                record.name(),
                                summary.new_docs,
                                summary.new_posts
                            );
                            report.absorb(&summary);
                        }
                        Ok(Err(error)) => {
                            log::error!("{}: {}", record.name(), error);
                            report.failed.push(CourseFailure {
                                name: record.name().to_string(),
                                reason: error.to_string(),
                            });
                        }
                        Err(panic) => {
                            let reason = panic_message(panic.as_ref());
                            log::error!("{}: task panicked: {}", record.name(), reason);
                            report.failed.push(CourseFailure {
                                name: record.name().to_string(),
                                reason,
                            });
                        }
                    }
                }
            }
        }
        drop(tasks);

        if report.interrupted {
            for record in &records {
                manifest.merge(record.snapshot());
            }
        }
        report
    }

    async fn sync_one(&self, record: &mut CourseRecord) -> Result<CourseSummary> {
        CourseSynchronizer::new(self.fetcher, self.selectors)
            .sync(record)
            .await
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
