/*
 * lxrestore - restore LXD instances from object storage
 * github.com/stevelr/lxrestore
 *
 * SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
 * SPDX-License-Identifier: Apache-2.0
 */
//! # lxrestore
//!
//! Restore an LXD instance from a backup archive held in an S3-compatible bucket.
//!
//! A restore runs through four phases:
//!
//! - **validate** the instance and backup names, and ask the instance manager
//!   whether the instance can be restored
//! - **fetch** the archive `<instance>/<backup>` from the bucket into the staging
//!   directory, reporting byte progress
//! - **import** the archive and start the instance, in a background task, while a
//!   status renderer shows a spinner
//! - **clean up** the staged archive
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lxrestore::prelude::*;
//! # async fn example() -> Result<(), RestoreError> {
//! let config = RestoreConfig::default().bucket("lxmin");
//! let store = S3Store::new(&S3Config::default());
//! let restorer = Restorer::new(config, store, LxcCli::default())?;
//!
//! let summary = restorer
//!     .restore("u2", "backup_2022-02-16-04-1040.tar.gz", NoProgress, SilentStatus)
//!     .await?;
//! println!("restored {} ({} bytes)", summary.instance, summary.bytes_transferred);
//! # Ok(())
//! # }
//! ```
//!
//! ## Collaborators
//!
//! The object store and the virtualization manager are reached through the
//! [`ObjectStore`](storage::ObjectStore) and [`InstanceManager`](lxc::InstanceManager)
//! traits. Terminal rendering is reached through
//! [`TransferProgress`](progress::TransferProgress) and
//! [`StatusRenderer`](status::StatusRenderer), so the pipeline itself never writes
//! to the terminal.
//!
#![allow(clippy::missing_errors_doc)] // pedantic
#![allow(clippy::missing_const_for_fn)] //  nursery function
#![allow(clippy::must_use_candidate)] // pedantic
#![warn(clippy::default_trait_access)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::future_not_send)]
#![warn(clippy::implicit_clone)]
#![warn(clippy::literal_string_with_formatting_args)]
#![warn(clippy::match_same_arms)]
#![warn(clippy::needless_raw_strings)]
#![warn(clippy::option_if_let_else)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::ref_option)]
#![warn(clippy::redundant_closure)]
#![warn(clippy::uninlined_format_args)]
#![warn(clippy::unnecessary_wraps)]
#![warn(clippy::unused_async)]

pub mod config;
pub mod error;
pub mod fetch;
pub mod lxc;
pub mod orchestrator;
pub mod progress;
pub mod request;
pub mod restore;
pub mod status;
pub mod storage;

pub mod test_util;

/// Result type alias using `RestoreError` as the default error.
pub type Result<T, E = crate::error::RestoreError> = std::result::Result<T, E>;

/// Prelude module - import the common types with `use lxrestore::prelude::*;`
pub mod prelude {
    pub use crate::error::*;
    pub use crate::{
        // Configuration
        config::{LxcConfig, RestoreConfig},
        // Object fetch
        fetch::{LocalArchive, RemoteObjectHandle},
        // Virtualization manager
        lxc::{InstanceManager, LxcCli},
        // Import and start
        orchestrator::{ImportOrchestrator, ImportStage, OrchestratorEvent},
        // Download progress
        progress::{NoProgress, ProgressState, TransferProgress},
        request::RestoreRequest,
        restore::{RestorePhase, RestoreSummary, Restorer},
        // Status UI
        status::{SilentStatus, StatusRenderer, UiOutcome, run_status_ui},
        storage::{ObjectInfo, ObjectReader, ObjectStore},
    };
    #[cfg(feature = "s3")]
    pub use crate::{config::S3Config, storage::s3::S3Store};
}

// ============================================================================
// CONSTANTS
// ============================================================================

pub(crate) mod defaults {
    /// Environment variable for the backup bucket
    pub const BUCKET_ENV: &str = "LXRESTORE_BUCKET";

    /// Bucket used when none is configured
    pub const BUCKET: &str = "lxmin";

    /// Environment variable for the directory that holds downloaded archives
    pub const STAGING_ROOT_ENV: &str = "LXRESTORE_STAGING_ROOT";

    /// Environment variable for the `lxc` executable
    pub const LXC_PROGRAM_ENV: &str = "LXRESTORE_LXC";

    pub const LXC_PROGRAM: &str = "lxc";

    /// Size of each chunk copied from the object stream to the local archive.
    pub const COPY_BUFFER_SIZE: usize = 256 * 1024;

    pub const S3_ENDPOINT_ENV: &str = "LXRESTORE_ENDPOINT";
    pub const S3_REGION_ENV: &str = "LXRESTORE_REGION";
    pub const S3_ACCESS_KEY_ENV: &str = "LXRESTORE_ACCESS_KEY";
    pub const S3_SECRET_KEY_ENV: &str = "LXRESTORE_SECRET_KEY";

    /// MinIO ignores the region, but the S3 signer requires one.
    pub const S3_REGION: &str = "us-east-1";
}
