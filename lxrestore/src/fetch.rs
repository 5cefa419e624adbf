//! # Object fetcher
//!
//! Resolves a backup object and copies it into the staging directory.
//!
//! The object is statted and opened before the local file is created, so a
//! missing object never leaves a file behind. A copy that ends early, or runs
//! past the size reported by stat, fails the whole restore; a partially written
//! archive is left in place for inspection.

use std::path::{Path, PathBuf};

use snafu::prelude::*;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::debug;

use crate::{
    Result,
    error::{LocalWriteSnafu, TransferIoSnafu, TransferSnafu},
    progress::{ProgressState, TransferProgress},
    request::RestoreRequest,
    storage::{ObjectReader, ObjectStore},
};

/// A backup object located by stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObjectHandle {
    pub bucket: String,
    pub key: String,
    pub size_bytes: u64,
}

impl RemoteObjectHandle {
    /// Stats `<instance>/<backup>` in the bucket.
    pub async fn resolve<S: ObjectStore>(
        store: &S,
        bucket: &str,
        request: &RestoreRequest,
    ) -> Result<Self> {
        let key = request.object_key();
        let info = store.stat(bucket, &key).await?;
        debug!(bucket, key, size = info.size_bytes, "resolved backup object");
        Ok(Self {
            bucket: bucket.to_string(),
            key,
            size_bytes: info.size_bytes,
        })
    }
}

/// A fully downloaded archive in the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArchive {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Copies `handle` into `dest`, reporting progress after each chunk.
///
/// `progress.begin` is called once the stream is open, and `progress.finish` is
/// always called after `begin`, whether or not the copy succeeds.
pub async fn fetch_object<S, P>(
    store: &S,
    handle: &RemoteObjectHandle,
    dest: &Path,
    buffer_size: usize,
    mut progress: P,
) -> Result<LocalArchive>
where
    S: ObjectStore,
    P: TransferProgress,
{
    let reader = store.open(&handle.bucket, &handle.key).await?;
    progress.begin(handle.size_bytes);
    let result = copy_to_file(reader, handle, dest, buffer_size, &mut progress).await;
    progress.finish(result.is_ok());
    result
}

async fn copy_to_file<P: TransferProgress>(
    mut reader: ObjectReader,
    handle: &RemoteObjectHandle,
    dest: &Path,
    buffer_size: usize,
    progress: &mut P,
) -> Result<LocalArchive> {
    let mut file = File::create(dest).await.context(LocalWriteSnafu { path: dest })?;
    let mut state = ProgressState::new(handle.size_bytes);
    let mut buf = vec![0u8; buffer_size.max(1)];

    loop {
        let n = reader
            .read(&mut buf)
            .await
            .context(TransferIoSnafu { key: &handle.key })?;
        if n == 0 {
            break;
        }
        state.advance(n as u64).map_err(|overrun| {
            TransferSnafu {
                key: &handle.key,
                message: format!(
                    "object is larger than its reported size ({} > {} bytes)",
                    overrun.attempted, overrun.total
                ),
            }
            .build()
        })?;
        file.write_all(&buf[..n])
            .await
            .context(LocalWriteSnafu { path: dest })?;
        progress.advance(&state);
    }
    drop(reader);
    debug!(key = %handle.key, transferred = state.transferred(), "closed object stream");

    ensure!(
        state.is_complete(),
        TransferSnafu {
            key: &handle.key,
            message: format!(
                "stream ended after {} of {} bytes",
                state.transferred(),
                state.total()
            ),
        }
    );

    file.flush().await.context(LocalWriteSnafu { path: dest })?;
    file.sync_all().await.context(LocalWriteSnafu { path: dest })?;

    Ok(LocalArchive {
        path: dest.to_path_buf(),
        size_bytes: state.transferred(),
    })
}
