//! Restore configuration
//!
//! Configuration is passed explicitly to [`Restorer::new`](crate::restore::Restorer::new),
//! [`S3Store::new`](crate::storage::s3::S3Store::new), and [`LxcCli::new`](crate::lxc::LxcCli::new).
//! `Default` implementations read environment overrides once, at construction.

use std::path::{Path, PathBuf};

use snafu::prelude::*;
#[cfg(feature = "s3")]
use zeroize::Zeroizing;

use crate::{
    Result,
    defaults::{
        BUCKET, BUCKET_ENV, COPY_BUFFER_SIZE, LXC_PROGRAM, LXC_PROGRAM_ENV, STAGING_ROOT_ENV,
    },
    error::ConfigSnafu,
};

/// Configuration for a [`Restorer`](crate::restore::Restorer).
#[derive(Debug, Clone)]
pub struct RestoreConfig {
    /// Bucket holding backups. Objects are keyed `<instance>/<backup>`.
    ///
    /// Defaults to the environment variable `LXRESTORE_BUCKET`, or "lxmin".
    pub bucket: String,

    /// Directory where the archive is downloaded before import.
    /// The archive file is named after the backup.
    ///
    /// Defaults to the environment variable `LXRESTORE_STAGING_ROOT`, or the current directory.
    pub staging_root: PathBuf,

    /// Size of each chunk copied from the object stream.
    pub copy_buffer_size: usize,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        RestoreConfig {
            bucket: std::env::var(BUCKET_ENV).unwrap_or_else(|_| BUCKET.to_string()),
            staging_root: std::env::var_os(STAGING_ROOT_ENV)
                .map_or_else(|| PathBuf::from("."), PathBuf::from),
            copy_buffer_size: COPY_BUFFER_SIZE,
        }
    }
}

impl RestoreConfig {
    /// Sets the bucket name.
    pub fn bucket(self, bucket: impl Into<String>) -> Self {
        RestoreConfig {
            bucket: bucket.into(),
            ..self
        }
    }

    /// Sets the staging directory.
    pub fn staging_root(self, staging_root: impl Into<PathBuf>) -> Self {
        RestoreConfig {
            staging_root: staging_root.into(),
            ..self
        }
    }

    pub fn copy_buffer_size(self, copy_buffer_size: usize) -> Self {
        RestoreConfig {
            copy_buffer_size,
            ..self
        }
    }

    /// Path of the staged archive for a backup.
    pub fn archive_path(&self, backup_name: &str) -> PathBuf {
        self.staging_root.join(backup_name)
    }

    pub fn get_staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.bucket.trim().is_empty(),
            ConfigSnafu {
                message: "bucket name is empty"
            }
        );
        ensure!(
            self.copy_buffer_size > 0,
            ConfigSnafu {
                message: "copy buffer size must be greater than zero"
            }
        );
        ensure!(
            !self.staging_root.as_os_str().is_empty(),
            ConfigSnafu {
                message: "staging root is empty"
            }
        );
        Ok(())
    }
}

/// Configuration for [`LxcCli`](crate::lxc::LxcCli).
#[derive(Debug, Clone)]
pub struct LxcConfig {
    /// The `lxc` executable. Defaults to `LXRESTORE_LXC`, or "lxc" on the `PATH`.
    pub program: PathBuf,
}

impl Default for LxcConfig {
    fn default() -> Self {
        LxcConfig {
            program: std::env::var_os(LXC_PROGRAM_ENV)
                .map_or_else(|| PathBuf::from(LXC_PROGRAM), PathBuf::from),
        }
    }
}

impl LxcConfig {
    pub fn program(self, program: impl Into<PathBuf>) -> Self {
        LxcConfig {
            program: program.into(),
        }
    }
}

/// Connection settings for an S3-compatible object store.
///
/// Credentials are passed through to the S3 client unchanged; the secret is
/// zeroized when the config is dropped.
#[cfg(feature = "s3")]
#[derive(Clone)]
pub struct S3Config {
    /// Endpoint url, for example `http://127.0.0.1:9000` for a local MinIO.
    /// If `None`, the AWS endpoint for `region` is used.
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: String,
    pub secret_key: Zeroizing<String>,
    /// Use path-style addressing (`endpoint/bucket/key`). Required by MinIO.
    pub force_path_style: bool,
}

#[cfg(feature = "s3")]
impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("force_path_style", &self.force_path_style)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "s3")]
impl Default for S3Config {
    fn default() -> Self {
        use crate::defaults::{
            S3_ACCESS_KEY_ENV, S3_ENDPOINT_ENV, S3_REGION, S3_REGION_ENV, S3_SECRET_KEY_ENV,
        };

        S3Config {
            endpoint: std::env::var(S3_ENDPOINT_ENV).ok(),
            region: std::env::var(S3_REGION_ENV).unwrap_or_else(|_| S3_REGION.to_string()),
            access_key: std::env::var(S3_ACCESS_KEY_ENV).unwrap_or_default(),
            secret_key: Zeroizing::new(std::env::var(S3_SECRET_KEY_ENV).unwrap_or_default()),
            force_path_style: true,
        }
    }
}

#[cfg(feature = "s3")]
impl S3Config {
    pub fn endpoint(self, endpoint: Option<String>) -> Self {
        S3Config { endpoint, ..self }
    }

    pub fn region(self, region: impl Into<String>) -> Self {
        S3Config {
            region: region.into(),
            ..self
        }
    }

    pub fn credentials(self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        S3Config {
            access_key: access_key.into(),
            secret_key: Zeroizing::new(secret_key.into()),
            ..self
        }
    }

    pub fn force_path_style(self, force_path_style: bool) -> Self {
        S3Config {
            force_path_style,
            ..self
        }
    }
}
