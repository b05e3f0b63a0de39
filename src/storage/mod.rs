//! On-disk state of a synchronization session.
//!
//! ## Directory Structure
//!
//! ```text
//! {storage_dir}/
//! ├── config.toml
//! └── Sem{n}/                     # Session root
//!     ├── available.json          # Manifest: course id → synchronized ids
//!     ├── available.quarantine.json   # Malformed entries set aside on load
//!     └── {course}/
//!         ├── posts.txt           # Append-only forum transcript
//!         └── *.pdf, …            # Downloaded resources and attachments
//! ```

pub mod manifest;
pub mod transcript;

// Re-export for convenience
pub use manifest::{Manifest, ManifestStore};
pub use transcript::Transcript;
