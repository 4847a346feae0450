pub mod archive;
pub mod cli;
pub mod commands;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod filter;
pub mod identity;
pub mod manifest;
pub mod models;
pub mod scanner;

pub use config::BackupConfig;
pub use engine::{BackupEngine, ConflictPolicy, RestoreEngine};
pub use error::{BackupError, Result};
pub use manifest::{JsonManifestStore, Manifest, ManifestDiff, ManifestEntry, ManifestStore};
pub use models::{BackupReport, FileAction, FileMeta, RestoreReport};
