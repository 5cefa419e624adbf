//! Errors returned by the restore pipeline
//!
use std::path::PathBuf;

use snafu::prelude::*;

/// External operations performed through the virtualization manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ExternalOperation {
    /// existing-instance pre-check
    Check,
    /// import archive as a new instance
    Import,
    /// start named instance
    Start,
}

/// Errors returned by lxrestore
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RestoreError {
    /// Instance or backup name missing or malformed. No external system was contacted.
    #[snafu(display("Invalid arguments: {message}"))]
    InvalidArguments { message: String },

    /// The existing-instance pre-check reported an error, so the restore was not attempted.
    #[snafu(display("Instance check failed for {instance}: {source}"))]
    InstanceCheckFailed { instance: String, source: ToolError },

    /// The backup object does not exist in the bucket.
    #[snafu(display("Backup object {bucket}/{key} not found"))]
    ObjectNotFound { bucket: String, key: String },

    /// The object store rejected the request, or the stream ended early or ran long.
    #[snafu(display("Transfer of {key} failed: {message}"))]
    Transfer { key: String, message: String },

    /// Reading the object stream failed.
    #[snafu(display("Transfer of {key} failed: {source}"))]
    TransferIo { key: String, source: std::io::Error },

    /// The local archive could not be created or written.
    #[snafu(display("Writing local archive {path:?}: {source}"))]
    LocalWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The virtualization manager failed to import or start the instance.
    #[snafu(display("{operation} failed: {source}"))]
    ExternalTool {
        operation: ExternalOperation,
        source: ToolError,
    },

    /// The staged archive could not be removed after the import phase.
    #[snafu(display("Removing local archive {path:?}: {source}"))]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A background task panicked or was cancelled.
    #[snafu(display("{task} task failed: {source}"))]
    Task {
        task: &'static str,
        source: tokio::task::JoinError,
    },

    /// Invalid configuration value.
    #[snafu(display("Configuration error: {message}"))]
    Config { message: String },
}

/// Errors from running the virtualization manager's command-line tool.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ToolError {
    /// The program could not be started.
    #[snafu(display("running {program}: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The program exited with a failure status.
    #[snafu(display("{program} exited with {status}: {stderr}"))]
    Exit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    /// An instance with this name already exists.
    #[snafu(display("instance {name} already exists"))]
    InstanceExists { name: String },

    /// Other failure reported by an `InstanceManager` implementation.
    #[snafu(display("{message}"))]
    External { message: String },
}

impl RestoreError {
    /// Returns the failing external operation, if this error came from the virtualization manager.
    pub fn operation(&self) -> Option<ExternalOperation> {
        match self {
            Self::ExternalTool { operation, .. } => Some(*operation),
            Self::InstanceCheckFailed { .. } => Some(ExternalOperation::Check),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_tool_display_names_operation() {
        let err = RestoreError::ExternalTool {
            operation: ExternalOperation::Import,
            source: ToolError::External {
                message: "storage pool full".to_string(),
            },
        };
        assert_eq!(err.to_string(), "import failed: storage pool full");
        assert_eq!(err.operation(), Some(ExternalOperation::Import));
    }

    #[test]
    fn check_failure_maps_to_check_operation() {
        let err = RestoreError::InstanceCheckFailed {
            instance: "u2".to_string(),
            source: ToolError::InstanceExists {
                name: "u2".to_string(),
            },
        };
        assert!(err.to_string().contains("instance u2 already exists"));
        assert_eq!(err.operation(), Some(ExternalOperation::Check));
    }

    #[test]
    fn not_found_mentions_bucket_and_key() {
        let err = RestoreError::ObjectNotFound {
            bucket: "lxmin".to_string(),
            key: "u2/backup.tar.gz".to_string(),
        };
        assert_eq!(err.to_string(), "Backup object lxmin/u2/backup.tar.gz not found");
        assert_eq!(err.operation(), None);
    }
}
