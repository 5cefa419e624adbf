use std::{
    ffi::OsString,
    io::{self, IsTerminal},
    path::PathBuf,
};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum, error::ErrorKind};
use lxrestore::{prelude::*, progress::format_bytes};
use tracing::info;

mod render;
mod terminal;

use render::{DownloadProgress, SpinnerStatus};
pub use terminal::{ActiveBar, SuspendingWriter};

const RESTORE_AFTER_HELP: &str = "\
Example:
  lxrestore restore u2 backup_2022-02-16-04-1040.tar.gz

The backup is read from <bucket>/<INSTANCE>/<BACKUP>, staged under the staging
root, imported with `lxc import`, and started with `lxc start`.";

#[derive(Parser, Debug)]
#[command(
    name = "lxrestore",
    version,
    about = "Restore LXD instances from backups in S3-compatible storage"
)]
pub struct Cli {
    /// S3 endpoint url, for example http://127.0.0.1:9000
    #[arg(long, env = "LXRESTORE_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// S3 region
    #[arg(long, env = "LXRESTORE_REGION", global = true)]
    pub region: Option<String>,

    /// Bucket holding the backups [default: lxmin]
    #[arg(long, env = "LXRESTORE_BUCKET", global = true)]
    pub bucket: Option<String>,

    /// S3 access key
    #[arg(long, env = "LXRESTORE_ACCESS_KEY", hide_env_values = true, global = true)]
    pub access_key: Option<String>,

    /// S3 secret key
    #[arg(long, env = "LXRESTORE_SECRET_KEY", hide_env_values = true, global = true)]
    pub secret_key: Option<String>,

    /// Use virtual-hosted bucket addressing instead of path-style
    #[arg(long, global = true)]
    pub virtual_host_style: bool,

    /// Directory where the archive is staged before import [default: .]
    #[arg(long, env = "LXRESTORE_STAGING_ROOT", global = true)]
    pub staging_root: Option<PathBuf>,

    /// Path of the lxc client [default: lxc]
    #[arg(long, env = "LXRESTORE_LXC", global = true)]
    pub lxc: Option<PathBuf>,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose mode (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Color mode for CLI and log output
    #[arg(long, value_enum, default_value_t = ColorArg::Auto, global = true)]
    pub color: ColorArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a backup, import it, and start the instance
    #[command(after_help = RESTORE_AFTER_HELP)]
    Restore(RestoreArgs),
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Name of the instance to restore
    pub instance: String,

    /// Backup file name within the instance's folder
    pub backup: String,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ColorArg {
    Auto,
    Always,
    Never,
}

/// Parses the command line. Help and version requests print and exit with 0;
/// any other parse error is returned.
pub fn parse_cli_from_env() -> Result<Cli> {
    parse_cli_from(std::env::args_os())
}

fn parse_cli_from<I, T>(args: I) -> Result<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(cli),
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let rendered = err.to_string();
            let message = rendered.strip_prefix("error: ").unwrap_or(&rendered);
            Err(anyhow!(message.trim_end().to_string()))
        }
    }
}

/// Runs the parsed command. `active` is the bar slot the log writer suspends around.
pub async fn run(cli: Cli, active: ActiveBar) -> Result<()> {
    match &cli.command {
        Commands::Restore(args) => handle_restore(&cli, args, &active).await,
    }
}

async fn handle_restore(cli: &Cli, args: &RestoreArgs, active: &ActiveBar) -> Result<()> {
    let restorer = Restorer::new(
        restore_config(cli),
        S3Store::new(&s3_config(cli)),
        LxcCli::new(lxc_config(cli)),
    )
    .context("invalid configuration")?;

    let enabled = progress_enabled(cli.json, io::stderr().is_terminal());
    let progress = DownloadProgress::new(enabled, &args.backup, active.clone());
    let status = SpinnerStatus::new(enabled, active.clone());

    let summary = restorer
        .restore(&args.instance, &args.backup, progress, status)
        .await
        .with_context(|| format!("failed to restore {} from {}", args.instance, args.backup))?;
    info!(
        instance = %summary.instance,
        elapsed_ms = summary.elapsed_ms,
        "restore finished"
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "restored {} from {}/{} ({})",
            summary.instance,
            summary.bucket,
            summary.object_key,
            format_bytes(summary.bytes_transferred)
        );
    }
    Ok(())
}

fn restore_config(cli: &Cli) -> RestoreConfig {
    let mut config = RestoreConfig::default();
    if let Some(bucket) = &cli.bucket {
        config = config.bucket(bucket.as_str());
    }
    if let Some(root) = &cli.staging_root {
        config = config.staging_root(root.as_path());
    }
    config
}

fn s3_config(cli: &Cli) -> S3Config {
    let mut config = S3Config::default().force_path_style(!cli.virtual_host_style);
    if cli.endpoint.is_some() {
        config = config.endpoint(cli.endpoint.clone());
    }
    if let Some(region) = &cli.region {
        config = config.region(region.as_str());
    }
    if cli.access_key.is_some() || cli.secret_key.is_some() {
        let access_key = cli
            .access_key
            .clone()
            .unwrap_or_else(|| config.access_key.clone());
        let secret_key = cli
            .secret_key
            .clone()
            .unwrap_or_else(|| config.secret_key.to_string());
        config = config.credentials(access_key, secret_key);
    }
    config
}

fn lxc_config(cli: &Cli) -> LxcConfig {
    let config = LxcConfig::default();
    match &cli.lxc {
        Some(program) => config.program(program.as_path()),
        None => config,
    }
}

fn progress_enabled(json: bool, stderr_is_tty: bool) -> bool {
    !json && stderr_is_tty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_restore_positionals() {
        let cli = Cli::try_parse_from([
            "lxrestore",
            "restore",
            "u2",
            "backup_2022-02-16-04-1040.tar.gz",
        ])
        .unwrap();
        let Commands::Restore(args) = cli.command;
        assert_eq!(args.instance, "u2");
        assert_eq!(args.backup, "backup_2022-02-16-04-1040.tar.gz");
        assert!(!cli.json);
        assert_eq!(cli.color, ColorArg::Auto);
    }

    #[test]
    fn parse_rejects_missing_backup() {
        let err = parse_cli_from(["lxrestore", "restore", "u2"]).unwrap_err();
        assert!(err.to_string().contains("<BACKUP>"), "{err}");
    }

    #[test]
    fn parse_rejects_extra_arguments() {
        assert!(parse_cli_from(["lxrestore", "restore", "u2", "b.tar.gz", "extra"]).is_err());
    }

    #[test]
    fn parse_rejects_missing_command() {
        assert!(Cli::try_parse_from(["lxrestore"]).is_err());
    }

    #[test]
    fn parse_global_flags_after_command() {
        let cli = Cli::try_parse_from([
            "lxrestore",
            "restore",
            "u2",
            "b.tar.gz",
            "--json",
            "-vv",
            "--color",
            "never",
            "--bucket",
            "backups",
            "--staging-root",
            "/var/tmp/lx",
            "--virtual-host-style",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.color, ColorArg::Never);
        assert_eq!(cli.bucket.as_deref(), Some("backups"));
        assert!(cli.virtual_host_style);

        let config = restore_config(&cli);
        assert_eq!(config.bucket, "backups");
        assert_eq!(config.get_staging_root(), std::path::Path::new("/var/tmp/lx"));
        assert!(!s3_config(&cli).force_path_style);
    }

    #[test]
    fn credentials_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "lxrestore",
            "--endpoint",
            "http://127.0.0.1:9000",
            "--access-key",
            "minio",
            "--secret-key",
            "minio123",
            "restore",
            "u2",
            "b.tar.gz",
        ])
        .unwrap();
        let config = s3_config(&cli);
        assert_eq!(config.endpoint.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(config.access_key, "minio");
        assert_eq!(config.secret_key.as_str(), "minio123");
        assert!(config.force_path_style);
    }

    #[test]
    fn lxc_program_flag() {
        let cli = Cli::try_parse_from([
            "lxrestore",
            "--lxc",
            "/snap/bin/lxc",
            "restore",
            "u2",
            "b.tar.gz",
        ])
        .unwrap();
        assert_eq!(
            lxc_config(&cli).program,
            std::path::PathBuf::from("/snap/bin/lxc")
        );
    }

    #[test]
    fn progress_enabled_for_tty_human_output() {
        assert!(progress_enabled(false, true));
        assert!(!progress_enabled(true, true));
        assert!(!progress_enabled(false, false));
    }
}
