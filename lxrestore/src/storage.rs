//! Object storage collaborator
//!
//! The fetcher reaches the bucket only through [`ObjectStore`]: a stat call for the
//! object size, and a byte stream for its contents.

use std::{future::Future, pin::Pin};

use tokio::io::AsyncRead;

use crate::Result;

#[cfg(feature = "s3")]
pub mod s3;

/// Readable byte stream of an object. Dropping it closes the remote stream.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Metadata returned by [`ObjectStore::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    pub size_bytes: u64,
}

/// Read access to a bucket.
///
/// Implementations return [`RestoreError::ObjectNotFound`](crate::error::RestoreError::ObjectNotFound)
/// for a missing object, and [`RestoreError::Transfer`](crate::error::RestoreError::Transfer)
/// for other failures.
pub trait ObjectStore: Send + Sync {
    /// Returns the size of the object.
    fn stat(&self, bucket: &str, key: &str) -> impl Future<Output = Result<ObjectInfo>> + Send;

    /// Opens a stream over the object's bytes.
    fn open(&self, bucket: &str, key: &str) -> impl Future<Output = Result<ObjectReader>> + Send;
}
