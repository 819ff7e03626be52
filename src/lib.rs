//! # labsync - Lab Workstation Vault Reconciliation
//!
//! labsync keeps a workstation's data directory in step with a remote,
//! content-addressed vault. Files the vault has never seen are uploaded; files the
//! vault already holds are retired locally after a retention period. Anything
//! ambiguous (renamed files, partially archived datasets, files back from
//! retirement) stays on disk and is reported.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use labsync::{config::Config, context::SyncContext};
//! use labsync::clock::SystemClock;
//! use labsync::notify::LogNotifier;
//! use labsync::remote::{FsConnector, NoCredentials};
//! use labsync::utils::CancelFlag;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("labsync.toml".as_ref())?;
//!     let connector = FsConnector::new(config.remote.root.clone().unwrap_or_default());
//!     let ctx = SyncContext::new(config)?;
//!     let report = labsync::cycle::sync(
//!         &ctx, &connector, &NoCredentials, &SystemClock, CancelFlag::new(), &LogNotifier,
//!     )
//!     .await?;
//!     println!("{}", report.posture());
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod clock;
pub mod config;
pub mod context;
pub mod cycle;
pub mod delete;
pub mod error;
pub mod index;
pub mod logging;
pub mod manifest;
pub mod notify;
pub mod path;
pub mod prompt;
pub mod reconcile;
pub mod remote;
pub mod report;
pub mod scan;
pub mod store;
pub mod trash;
pub mod upload;
pub mod utils;
pub mod wepv;

// Re-export commonly used types and functions
pub use config::Config;
pub use context::SyncContext;
pub use cycle::{sync, Cycle};
pub use error::{ChecksumError, ConfigError, ConnectionError, StoreError, SyncError};
pub use report::{CycleReport, Posture};

// vim: ts=4
