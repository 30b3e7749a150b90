//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "idman", version, about = "Cloud identity administration toolkit")]
pub struct Cli {
    /// Profile to use (falls back to the configured default).
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Configuration file (default: ~/.idman/config.yaml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Bulk assignment operations from input files.
    #[command(subcommand)]
    Bulk(BulkCommand),
    /// Declarative assignment templates.
    #[command(subcommand)]
    Templates(TemplatesCommand),
    /// Backup capture and management.
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Restore a backup into an instance.
    #[command(subcommand)]
    Restore(RestoreCommand),
    /// Retention enforcement and storage monitoring.
    #[command(subcommand)]
    Retention(RetentionCommand),
    /// Export a stored backup to an interchange file.
    Export(ExportArgs),
    /// Import backup data from an interchange file.
    Import(ImportArgs),
}

#[derive(Debug, Args)]
pub struct CommonBulkArgs {
    /// Input file (CSV or JSON) with name-based assignment rows.
    pub input_file: PathBuf,

    /// Validate and preview without making changes.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the interactive confirmation prompt.
    #[arg(long, short = 'y', visible_alias = "yes")]
    pub force: bool,

    /// Continue past individual failures (the default behaviour).
    #[arg(long, conflicts_with = "stop_on_error")]
    pub continue_on_error: bool,

    /// Stop dispatching after the first hard failure.
    #[arg(long)]
    pub stop_on_error: bool,

    /// Records processed per batch (1-50).
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=50))]
    pub batch_size: Option<u16>,
}

#[derive(Debug, Subcommand)]
pub enum BulkCommand {
    /// Create assignments from an input file.
    Assign(CommonBulkArgs),
    /// Revoke assignments from an input file.
    Revoke(CommonBulkArgs),
    /// Detect (and optionally revoke) assignments whose principal no
    /// longer exists.
    Orphans {
        /// Ignore the cached detection result and re-scan.
        #[arg(long)]
        refresh: bool,
        /// Revoke the detected orphaned assignments.
        #[arg(long)]
        cleanup: bool,
        #[arg(long, short = 'y')]
        force: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum TemplatesCommand {
    /// Save an example template under the given name.
    Create {
        name: String,
        /// Seed from an existing YAML/JSON template file.
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Validate a stored template against the directory.
    Validate { name: String },
    /// Show what applying a template would do.
    Preview { name: String },
    /// Apply a template's assignments.
    Apply {
        name: String,
        #[arg(long)]
        dry_run: bool,
        #[arg(long, short = 'y')]
        force: bool,
    },
    /// List stored templates.
    List,
    /// Show one template.
    Show { name: String },
    /// Delete a stored template.
    Delete {
        name: String,
        #[arg(long, short = 'y')]
        force: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    /// Capture a backup of the live instance.
    Create {
        /// Collect only resources changed since this RFC 3339 instant.
        #[arg(long)]
        incremental_since: Option<String>,
    },
    /// List stored backups.
    List,
    /// Delete a stored backup.
    Delete {
        backup_id: String,
        #[arg(long, short = 'y')]
        force: bool,
    },
    /// Verify a stored backup's integrity.
    Verify { backup_id: String },
    /// Compare two stored backups.
    Compare {
        source_backup_id: String,
        target_backup_id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    Overwrite,
    Skip,
    Merge,
    Prompt,
}

#[derive(Debug, Subcommand)]
pub enum RestoreCommand {
    /// Replay a backup into the target instance.
    Run {
        backup_id: String,
        #[arg(long, value_enum, default_value = "skip")]
        strategy: StrategyArg,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        skip_validation: bool,
        /// Target instance arn (defaults to the backup's source).
        #[arg(long)]
        target_instance_arn: Option<String>,
    },
    /// Show what a restore would change.
    Preview { backup_id: String },
    /// Validate backup/target compatibility.
    Validate {
        backup_id: String,
        #[arg(long)]
        target_instance_arn: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum RetentionCommand {
    /// Apply the retention policy to stored backups.
    Enforce {
        #[arg(long)]
        dry_run: bool,
    },
    /// Show storage usage by period.
    Usage,
    /// Check usage against configured limits.
    Alerts,
    /// Suggest retention policy adjustments.
    Recommend,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Json,
    Yaml,
    Csv,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    pub backup_id: String,
    /// Output file (or directory for CSV).
    #[arg(long, short = 'o')]
    pub output: PathBuf,
    #[arg(long, value_enum, default_value = "json")]
    pub format: FormatArg,
    /// Compress the payload with zstd.
    #[arg(long)]
    pub compress: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Input file (or directory for CSV).
    pub input: PathBuf,
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,
    /// Validate only; do not store.
    #[arg(long)]
    pub validate_only: bool,
}
