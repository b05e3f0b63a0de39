//! Pipeline entry points for a synchronization run.
//!
//! - `run_sync`: discover courses, dispatch them, flush the manifest
//! - `Dispatcher`: bounded per-course fan-out used by `run_sync`

pub mod dispatch;
pub mod sync;

pub use dispatch::{CourseFailure, DispatchReport, Dispatcher};
pub use sync::{SyncReport, run_sync};
