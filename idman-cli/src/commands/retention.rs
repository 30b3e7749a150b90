//! `idman retention ...`.

use std::sync::Arc;

use idman_core::errors::IdmanResult;
use idman_retention::engine::RetentionManager;
use idman_retention::usage::AlertLevel;

use crate::cli::RetentionCommand;
use crate::context::CommandContext;

pub async fn run(ctx: &CommandContext, command: RetentionCommand) -> IdmanResult<u8> {
    let manager = RetentionManager::new(Arc::clone(&ctx.storage))
        .with_limits(ctx.config.storage_limits.clone());
    match command {
        RetentionCommand::Enforce { dry_run } => {
            let result = manager.enforce(&ctx.config.retention, dry_run).await?;
            println!(
                "{}: {} backups {}, {} bytes freed",
                if dry_run { "dry-run" } else { "enforced" },
                result.deleted_backups.len(),
                if dry_run { "would be deleted" } else { "deleted" },
                result.freed_bytes
            );
            for backup_id in &result.deleted_backups {
                println!("  {backup_id}");
            }
            for error in &result.errors {
                eprintln!("error: {error}");
            }
            Ok(if result.success { 0 } else { 1 })
        }
        RetentionCommand::Usage => {
            let usage = manager.storage_usage().await?;
            println!(
                "{} backups, {} bytes total",
                usage.total_backup_count, usage.total_size_bytes
            );
            for (period, count) in &usage.count_by_period {
                let size = usage.size_by_period.get(period).copied().unwrap_or(0);
                println!("  {period}: {count} backups, {size} bytes");
            }
            if let (Some(oldest), Some(newest)) = (usage.oldest_backup, usage.newest_backup) {
                println!("  oldest {}, newest {}", oldest.to_rfc3339(), newest.to_rfc3339());
            }
            Ok(0)
        }
        RetentionCommand::Alerts => {
            let alerts = manager.check_storage_limits().await?;
            if alerts.is_empty() {
                println!("storage is within configured limits");
                return Ok(0);
            }
            let mut critical = false;
            for alert in &alerts {
                let label = match alert.level {
                    AlertLevel::Warning => "WARNING",
                    AlertLevel::Critical => {
                        critical = true;
                        "CRITICAL"
                    }
                };
                println!("{label}: {}", alert.message);
                println!("  action: {}", alert.recommended_action);
            }
            Ok(if critical { 1 } else { 0 })
        }
        RetentionCommand::Recommend => {
            let recommendations = manager.recommendations(&ctx.config.retention).await?;
            if recommendations.is_empty() {
                println!("no recommendations; retention looks healthy");
                return Ok(0);
            }
            for recommendation in recommendations {
                println!("{}: {}", recommendation.kind, recommendation.message);
                println!("  impact: {}", recommendation.impact);
            }
            Ok(0)
        }
    }
}
