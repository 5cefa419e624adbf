//! # Restore coordinator
//!
//! [`Restorer::restore`] sequences one restore:
//!
//! ```text
//! Validating -> Fetching -> Importing -> Cleanup -> Done
//!      \            \            \           \
//!       +------------+------------+-----------+--> Failed
//! ```
//!
//! - Validating fails without contacting the store if a name is blank.
//! - A fetch failure returns immediately. Nothing is cleaned up.
//! - Once Importing is entered, the staged archive is always removed, whether
//!   import and start succeed or not.

use std::{path::PathBuf, sync::Arc, time::Instant};

use serde::Serialize;
use snafu::prelude::*;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{
    Result,
    config::RestoreConfig,
    error::{CleanupSnafu, InstanceCheckFailedSnafu, LocalWriteSnafu, RestoreError, TaskSnafu},
    fetch::{LocalArchive, RemoteObjectHandle, fetch_object},
    lxc::InstanceManager,
    orchestrator::ImportOrchestrator,
    progress::{TransferProgress, format_bytes},
    request::RestoreRequest,
    status::{StatusRenderer, UiOutcome, run_status_ui},
    storage::ObjectStore,
};

/// Phases of a restore, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RestorePhase {
    Validating,
    Fetching,
    Importing,
    Cleanup,
    Done,
    Failed,
}

/// Result of a successful restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    pub instance: String,
    pub backup: String,
    pub bucket: String,
    pub object_key: String,
    pub bytes_transferred: u64,
    /// Staged archive path. The file has been removed.
    pub archive_path: PathBuf,
    pub elapsed_ms: u64,
}

/// Restores instances from a bucket.
#[derive(Debug)]
pub struct Restorer<S, M> {
    config: RestoreConfig,
    store: S,
    manager: Arc<M>,
}

impl<S: ObjectStore, M: InstanceManager> Restorer<S, M> {
    pub fn new(config: RestoreConfig, store: S, manager: M) -> Result<Self> {
        Self::with_shared_manager(config, store, Arc::new(manager))
    }

    /// Creates a restorer whose instance manager is shared with the caller.
    pub fn with_shared_manager(config: RestoreConfig, store: S, manager: Arc<M>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            manager,
        })
    }

    /// Restores `backup_name` from the `instance_name` namespace of the bucket.
    ///
    /// `progress` receives download progress. `status` is moved into the status
    /// task for the import phase and dropped when that task ends.
    pub async fn restore<P, R>(
        &self,
        instance_name: &str,
        backup_name: &str,
        progress: P,
        status: R,
    ) -> Result<RestoreSummary>
    where
        P: TransferProgress,
        R: StatusRenderer,
    {
        let started = Instant::now();

        enter(RestorePhase::Validating, instance_name);
        let request = self
            .validate(instance_name, backup_name)
            .await
            .inspect_err(|err| failed(RestorePhase::Validating, err))?;

        enter(RestorePhase::Fetching, request.instance_name());
        let (handle, archive) = self
            .fetch(&request, progress)
            .await
            .inspect_err(|err| failed(RestorePhase::Fetching, err))?;

        enter(RestorePhase::Importing, request.instance_name());
        let imported = self.import_and_start(&request, &archive, status).await;

        enter(RestorePhase::Cleanup, request.instance_name());
        let cleaned = tokio::fs::remove_file(&archive.path)
            .await
            .context(CleanupSnafu {
                path: &archive.path,
            });

        let result = match (imported, cleaned) {
            (Err(err), Err(cleanup_err)) => {
                warn!(error = %cleanup_err, "restore failed and staged archive was not removed");
                Err(err)
            }
            (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
            (Ok(()), Ok(())) => Ok(RestoreSummary {
                instance: request.instance_name().to_string(),
                backup: request.backup_name().to_string(),
                bucket: handle.bucket,
                object_key: handle.key,
                bytes_transferred: archive.size_bytes,
                archive_path: archive.path,
                elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            }),
        };

        match &result {
            Ok(summary) => {
                enter(RestorePhase::Done, &summary.instance);
                info!(
                    instance = %summary.instance,
                    backup = %summary.backup,
                    size = %format_bytes(summary.bytes_transferred),
                    "restore complete"
                );
            }
            Err(err @ RestoreError::Cleanup { .. }) => failed(RestorePhase::Cleanup, err),
            Err(err) => failed(RestorePhase::Importing, err),
        }
        result
    }

    async fn validate(&self, instance_name: &str, backup_name: &str) -> Result<RestoreRequest> {
        let request = RestoreRequest::new(instance_name, backup_name)?;
        self.manager
            .check_instance(request.instance_name())
            .await
            .context(InstanceCheckFailedSnafu {
                instance: request.instance_name(),
            })?;
        Ok(request)
    }

    async fn fetch<P: TransferProgress>(
        &self,
        request: &RestoreRequest,
        progress: P,
    ) -> Result<(RemoteObjectHandle, LocalArchive)> {
        let handle = RemoteObjectHandle::resolve(&self.store, &self.config.bucket, request).await?;
        let staging_root = self.config.get_staging_root();
        tokio::fs::create_dir_all(staging_root)
            .await
            .context(LocalWriteSnafu { path: staging_root })?;
        let dest = self.config.archive_path(request.backup_name());
        info!(
            key = %handle.key,
            size = %format_bytes(handle.size_bytes),
            dest = %dest.display(),
            "downloading backup"
        );
        let archive = fetch_object(
            &self.store,
            &handle,
            &dest,
            self.config.copy_buffer_size,
            progress,
        )
        .await?;
        Ok((handle, archive))
    }

    /// Runs the status UI and the orchestrator as two tasks, and waits for both.
    async fn import_and_start<R: StatusRenderer>(
        &self,
        request: &RestoreRequest,
        archive: &LocalArchive,
        status: R,
    ) -> Result<()> {
        let (events_tx, events_rx) = oneshot::channel();
        let message = format!("Launching instance ({})", request.instance_name());
        let ui = tokio::spawn(run_status_ui(status, message, events_rx));
        let orchestrator = ImportOrchestrator::new(
            Arc::clone(&self.manager),
            request.instance_name(),
            &archive.path,
        );
        let worker = tokio::spawn(orchestrator.run(events_tx));

        // the ui must have stopped rendering before anything else is reported
        let ui_result = ui.await;
        let worker_result = match worker.await {
            Ok(result) => result,
            Err(source) => Err(RestoreError::Task {
                task: "orchestrator",
                source,
            }),
        };
        let outcome = ui_result.context(TaskSnafu { task: "status ui" });
        worker_result?;
        let outcome = outcome?;
        if outcome != UiOutcome::Succeeded {
            // the orchestrator reported success, so the event was lost
            warn!(?outcome, "status ui ended without a success event");
        }
        Ok(())
    }
}

fn enter(phase: RestorePhase, instance: &str) {
    debug!(%phase, instance, "restore phase");
}

fn failed(phase: RestorePhase, err: &RestoreError) {
    debug!(%phase, error = %err, "restore {}", RestorePhase::Failed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ExternalOperation,
        progress::NoProgress,
        status::SilentStatus,
        test_util::{ManagerCall, MemoryStore, RecordingManager, RecordingRenderer},
    };

    fn restorer(
        dir: &std::path::Path,
        store: MemoryStore,
        manager: RecordingManager,
    ) -> (Restorer<MemoryStore, RecordingManager>, Arc<RecordingManager>) {
        let manager = Arc::new(manager);
        let config = RestoreConfig::default()
            .bucket("lxmin")
            .staging_root(dir)
            .copy_buffer_size(4096);
        let restorer = Restorer::with_shared_manager(config, store, Arc::clone(&manager)).unwrap();
        (restorer, manager)
    }

    #[test_log::test(tokio::test)]
    async fn blank_names_make_no_external_calls() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new("lxmin").with_object("u2/b", vec![0u8; 8]);
        let (restorer, manager) = restorer(dir.path(), store.clone(), RecordingManager::default());

        for (instance, backup) in [("", "b"), ("u2", "  "), (" ", " ")] {
            let err = restorer
                .restore(instance, backup, NoProgress, SilentStatus)
                .await
                .unwrap_err();
            assert!(matches!(err, RestoreError::InvalidArguments { .. }), "{err:?}");
        }
        assert!(manager.calls().is_empty());
        assert!(store.calls().is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn failing_check_aborts_before_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new("lxmin").with_object("u2/b", vec![0u8; 8]);
        let (restorer, manager) = restorer(
            dir.path(),
            store.clone(),
            RecordingManager::default().existing("u2"),
        );

        let err = restorer
            .restore("u2", "b", NoProgress, SilentStatus)
            .await
            .unwrap_err();

        assert!(matches!(err, RestoreError::InstanceCheckFailed { .. }), "{err:?}");
        assert_eq!(manager.calls(), vec![ManagerCall::Check("u2".to_string())]);
        assert!(store.calls().is_empty());
        assert!(!dir.path().join("b").exists());
    }

    #[test_log::test(tokio::test)]
    async fn missing_object_skips_import_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = RecordingRenderer::default();
        let (restorer, manager) = restorer(
            dir.path(),
            MemoryStore::new("lxmin"),
            RecordingManager::default(),
        );

        let err = restorer
            .restore("u2", "b", NoProgress, renderer.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, RestoreError::ObjectNotFound { .. }), "{err:?}");
        assert_eq!(manager.calls(), vec![ManagerCall::Check("u2".to_string())]);
        assert!(renderer.log().started.is_empty());
        assert!(!dir.path().join("b").exists());
    }

    #[test_log::test(tokio::test)]
    async fn failed_import_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = RecordingRenderer::default();
        let store = MemoryStore::new("lxmin").with_object("u2/b", vec![5u8; 9000]);
        let (restorer, manager) = restorer(
            dir.path(),
            store,
            RecordingManager::default().fail_import("unsupported archive"),
        );

        let err = restorer
            .restore("u2", "b", NoProgress, renderer.clone())
            .await
            .unwrap_err();

        assert_eq!(err.operation(), Some(ExternalOperation::Import));
        assert!(err.to_string().contains("unsupported archive"));
        assert!(!dir.path().join("b").exists());
        assert_eq!(renderer.log().stopped.len(), 1);
        assert!(!manager.calls().iter().any(|c| matches!(c, ManagerCall::Start(_))));
    }

    #[test_log::test(tokio::test)]
    async fn cleanup_failure_is_the_result() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new("lxmin").with_object("u2/b", vec![5u8; 100]);
        // removes the archive during import, so the cleanup step finds nothing
        let (restorer, _manager) = restorer(
            dir.path(),
            store,
            RecordingManager::default().consume_archive(),
        );

        let err = restorer
            .restore("u2", "b", NoProgress, SilentStatus)
            .await
            .unwrap_err();

        assert!(matches!(err, RestoreError::Cleanup { .. }), "{err:?}");
    }

    #[test_log::test(tokio::test)]
    async fn creates_missing_staging_root() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("stage").join("nested");
        let store = MemoryStore::new("lxmin").with_object("u2/b", vec![1u8; 10]);
        let (restorer, manager) = restorer(&staging, store, RecordingManager::default());

        let summary = restorer
            .restore("u2", "b", NoProgress, SilentStatus)
            .await
            .unwrap();

        assert_eq!(summary.archive_path, staging.join("b"));
        assert!(staging.is_dir());
        assert_eq!(manager.calls().len(), 3);
    }
}
