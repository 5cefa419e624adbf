// SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
// SPDX-License-Identifier: Apache-2.0

//! # Virtualization manager
//!
//! [`InstanceManager`] is the narrow interface to the tool that owns instances.
//! [`LxcCli`] implements it by running the `lxc` command-line client. Standard
//! output is discarded; a non-zero exit status fails the call, with standard
//! error attached to the error.

use std::{ffi::OsStr, future::Future, path::Path, process::Stdio};

use snafu::prelude::*;
use tokio::process::Command;
use tracing::debug;

use crate::{
    config::LxcConfig,
    error::{ExitSnafu, InstanceExistsSnafu, SpawnSnafu, ToolError},
};

/// Operations the restore performs on the virtualization manager.
pub trait InstanceManager: Send + Sync + 'static {
    /// Pre-check before anything is downloaded. The restore is aborted if this returns an error.
    fn check_instance(&self, name: &str) -> impl Future<Output = Result<(), ToolError>> + Send;

    /// Imports a backup archive as a new instance.
    fn import_archive(&self, archive: &Path) -> impl Future<Output = Result<(), ToolError>> + Send;

    /// Starts an instance.
    fn start_instance(&self, name: &str) -> impl Future<Output = Result<(), ToolError>> + Send;
}

/// [`InstanceManager`] backed by the `lxc` command.
#[derive(Debug, Clone, Default)]
pub struct LxcCli {
    config: LxcConfig,
}

impl LxcCli {
    pub fn new(config: LxcConfig) -> Self {
        Self { config }
    }

    /// Runs `lxc` with `args`. Returns stdout if `capture_stdout` is set, otherwise stdout is discarded.
    async fn run<I, S>(&self, args: I, capture_stdout: bool) -> Result<Vec<u8>, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = self.config.program.display().to_string();
        let mut command = Command::new(&self.config.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(if capture_stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!(?command, "running");

        let output = command.output().await.context(SpawnSnafu {
            program: &program,
        })?;
        ensure!(
            output.status.success(),
            ExitSnafu {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
        );
        Ok(output.stdout)
    }
}

impl InstanceManager for LxcCli {
    /// Fails if an instance with exactly this name already exists, or if it cannot be listed.
    async fn check_instance(&self, name: &str) -> Result<(), ToolError> {
        let stdout = self
            .run(["list", name, "--format", "csv", "--columns", "n"], true)
            .await?;
        let listing = String::from_utf8_lossy(&stdout);
        ensure!(
            !listing.lines().any(|line| line.trim() == name),
            InstanceExistsSnafu { name }
        );
        Ok(())
    }

    async fn import_archive(&self, archive: &Path) -> Result<(), ToolError> {
        self.run([OsStr::new("import"), archive.as_os_str()], false)
            .await
            .map(drop)
    }

    async fn start_instance(&self, name: &str) -> Result<(), ToolError> {
        self.run(["start", name], false).await.map(drop)
    }
}
