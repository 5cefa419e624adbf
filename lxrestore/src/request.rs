//! Validated restore request

use snafu::prelude::*;

use crate::{Result, error::InvalidArgumentsSnafu};

/// Instance and backup names for one restore.
///
/// Both names are trimmed and must be non-empty. The backup name is also used
/// as the local archive file name, so it may not contain path separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    instance_name: String,
    backup_name: String,
}

impl RestoreRequest {
    pub fn new(instance_name: &str, backup_name: &str) -> Result<Self> {
        let instance_name = instance_name.trim();
        let backup_name = backup_name.trim();

        ensure!(
            !instance_name.is_empty(),
            InvalidArgumentsSnafu {
                message: "instance name is required"
            }
        );
        ensure!(
            !backup_name.is_empty(),
            InvalidArgumentsSnafu {
                message: "backup name is required"
            }
        );
        ensure!(
            !backup_name.contains(['/', '\\']) && backup_name != "." && backup_name != "..",
            InvalidArgumentsSnafu {
                message: format!("backup name must be a file name: {backup_name}")
            }
        );

        Ok(Self {
            instance_name: instance_name.to_string(),
            backup_name: backup_name.to_string(),
        })
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn backup_name(&self) -> &str {
        &self.backup_name
    }

    /// Object key of the backup: `<instance>/<backup>`.
    pub fn object_key(&self) -> String {
        format!(
            "{}/{}",
            self.instance_name.trim_matches('/'),
            self.backup_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RestoreError;

    #[test]
    fn trims_names() {
        let req = RestoreRequest::new("  u2 ", "\tbackup.tar.gz\n").unwrap();
        assert_eq!(req.instance_name(), "u2");
        assert_eq!(req.backup_name(), "backup.tar.gz");
        assert_eq!(req.object_key(), "u2/backup.tar.gz");
    }

    #[test]
    fn rejects_blank_names() {
        for (instance, backup) in [("", "b"), ("   ", "b"), ("u2", ""), ("u2", " \t "), ("", "")] {
            let err = RestoreRequest::new(instance, backup).unwrap_err();
            assert!(
                matches!(err, RestoreError::InvalidArguments { .. }),
                "({instance:?}, {backup:?}) -> {err:?}"
            );
        }
    }

    #[test]
    fn rejects_backup_paths() {
        for backup in ["../etc/passwd", "dir/backup.tar.gz", "..", ".", "a\\b"] {
            let err = RestoreRequest::new("u2", backup).unwrap_err();
            assert!(err.to_string().contains("file name"), "{backup}: {err}");
        }
    }
}
