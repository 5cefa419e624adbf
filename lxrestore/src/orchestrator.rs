//! # Import/start orchestrator
//!
//! Imports the staged archive, then starts the instance. Runs as a background
//! task beside the status UI and reports exactly one [`OrchestratorEvent`].
//! Start is never attempted unless import succeeded. Neither step is retried,
//! and an imported instance is not removed if start fails.

use std::{path::PathBuf, sync::Arc};

use snafu::prelude::*;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{
    Result,
    error::{ExternalOperation, ExternalToolSnafu, RestoreError},
    lxc::InstanceManager,
};

/// Terminal event sent from the orchestrator to the status UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorEvent {
    Succeeded,
    Failed {
        operation: ExternalOperation,
        message: String,
    },
}

/// Steps of the import/start sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ImportStage {
    Importing,
    Starting,
    Done,
}

/// Runs `import` then `start` against an [`InstanceManager`].
#[derive(Debug)]
pub struct ImportOrchestrator<M> {
    manager: Arc<M>,
    instance: String,
    archive: PathBuf,
}

impl<M: InstanceManager> ImportOrchestrator<M> {
    pub fn new(manager: Arc<M>, instance: impl Into<String>, archive: impl Into<PathBuf>) -> Self {
        Self {
            manager,
            instance: instance.into(),
            archive: archive.into(),
        }
    }

    /// Runs both steps and sends the outcome on `events`.
    ///
    /// The returned result carries the typed error. The event carries the tool's
    /// message without the operation prefix, which the renderer adds.
    pub async fn run(self, events: oneshot::Sender<OrchestratorEvent>) -> Result<()> {
        let result = self.execute().await;
        let event = match &result {
            Ok(()) => OrchestratorEvent::Succeeded,
            Err(RestoreError::ExternalTool { operation, source }) => OrchestratorEvent::Failed {
                operation: *operation,
                message: source.to_string(),
            },
            Err(err) => OrchestratorEvent::Failed {
                operation: err.operation().unwrap_or(ExternalOperation::Import),
                message: err.to_string(),
            },
        };
        if events.send(event).is_err() {
            warn!("status ui exited before the orchestrator reported");
        }
        result
    }

    async fn execute(&self) -> Result<()> {
        let mut stage = ImportStage::Importing;
        loop {
            debug!(%stage, instance = %self.instance, "import stage");
            stage = match stage {
                ImportStage::Importing => {
                    self.manager
                        .import_archive(&self.archive)
                        .await
                        .context(ExternalToolSnafu {
                            operation: ExternalOperation::Import,
                        })?;
                    info!(archive = %self.archive.display(), "imported archive");
                    ImportStage::Starting
                }
                ImportStage::Starting => {
                    self.manager
                        .start_instance(&self.instance)
                        .await
                        .context(ExternalToolSnafu {
                            operation: ExternalOperation::Start,
                        })?;
                    info!(instance = %self.instance, "started instance");
                    ImportStage::Done
                }
                ImportStage::Done => return Ok(()),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{ManagerCall, RecordingManager};

    #[tokio::test]
    async fn imports_then_starts() {
        let manager = Arc::new(RecordingManager::default());
        let (tx, rx) = oneshot::channel();

        ImportOrchestrator::new(manager.clone(), "u2", "/stage/b.tar.gz")
            .run(tx)
            .await
            .unwrap();

        assert_eq!(rx.await.unwrap(), OrchestratorEvent::Succeeded);
        assert_eq!(
            manager.calls(),
            vec![
                ManagerCall::Import {
                    path: PathBuf::from("/stage/b.tar.gz"),
                    archive_bytes: None,
                },
                ManagerCall::Start("u2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failed_import_skips_start() {
        let manager = Arc::new(RecordingManager::default().fail_import("pool is full"));
        let (tx, rx) = oneshot::channel();

        let err = ImportOrchestrator::new(manager.clone(), "u2", "/stage/b.tar.gz")
            .run(tx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RestoreError::ExternalTool {
                operation: ExternalOperation::Import,
                ..
            }
        ));
        match rx.await.unwrap() {
            OrchestratorEvent::Failed { operation, message } => {
                assert_eq!(operation, ExternalOperation::Import);
                assert_eq!(message, "pool is full");
            }
            OrchestratorEvent::Succeeded => panic!("expected failure event"),
        }
        assert!(
            !manager
                .calls()
                .iter()
                .any(|call| matches!(call, ManagerCall::Start(_)))
        );
    }

    #[tokio::test]
    async fn failed_start_reports_start() {
        let manager = Arc::new(RecordingManager::default().fail_start("no such network"));
        let (tx, rx) = oneshot::channel();

        let err = ImportOrchestrator::new(manager.clone(), "u2", "/stage/b.tar.gz")
            .run(tx)
            .await
            .unwrap_err();

        assert_eq!(err.operation(), Some(ExternalOperation::Start));
        assert!(matches!(
            rx.await.unwrap(),
            OrchestratorEvent::Failed {
                operation: ExternalOperation::Start,
                ..
            }
        ));
        assert_eq!(manager.calls().len(), 2);
    }

    #[tokio::test]
    async fn closed_receiver_still_returns_result() {
        let manager = Arc::new(RecordingManager::default());
        let (tx, rx) = oneshot::channel();
        drop(rx);

        ImportOrchestrator::new(manager, "u2", "/stage/b.tar.gz")
            .run(tx)
            .await
            .unwrap();
    }
}
