//! `idman backup ...`.

use std::sync::Arc;

use chrono::DateTime;

use idman_backup::collector::IdentityCollector;
use idman_core::errors::{IdmanResult, ValidationError};
use idman_core::traits::IPrompter;
use idman_retention::engine::RetentionManager;

use crate::cli::BackupCommand;
use crate::context::CommandContext;
use crate::prompt::StdinPrompter;

pub async fn run(ctx: &CommandContext, command: BackupCommand) -> IdmanResult<u8> {
    match command {
        BackupCommand::Create { incremental_since } => {
            let collector =
                IdentityCollector::new(Arc::clone(&ctx.directory), &ctx.profile.instance_arn);
            let backup = match incremental_since {
                Some(stamp) => {
                    let since = DateTime::parse_from_rfc3339(&stamp)
                        .map_err(|e| ValidationError::Invalid {
                            context: "--incremental-since".to_string(),
                            reason: e.to_string(),
                        })?
                        .with_timezone(&chrono::Utc);
                    collector.collect_incremental(since).await?
                }
                None => collector.collect_all().await?,
            };
            println!(
                "captured {} resources ({} users, {} groups, {} permission sets, {} assignments)",
                backup.total_resources(),
                backup.users.len(),
                backup.groups.len(),
                backup.permission_sets.len(),
                backup.assignments.len()
            );
            let backup_id = ctx.storage.store(backup).await?;
            println!("stored backup {backup_id}");
            Ok(0)
        }
        BackupCommand::List => {
            let listed = ctx.storage.list(None).await?;
            if listed.is_empty() {
                println!("no backups stored");
                return Ok(0);
            }
            for metadata in listed {
                println!(
                    "{}  {}  {:?}  {} bytes  {:?}",
                    metadata.backup_id,
                    metadata.timestamp.to_rfc3339(),
                    metadata.backup_type,
                    metadata.size_bytes,
                    metadata.resource_counts
                );
            }
            Ok(0)
        }
        BackupCommand::Delete { backup_id, force } => {
            if !force && !StdinPrompter.confirm(&format!("Delete backup {backup_id}?")) {
                println!("cancelled");
                return Ok(0);
            }
            if ctx.storage.delete(&backup_id).await? {
                println!("deleted backup {backup_id}");
                Ok(0)
            } else {
                eprintln!("backup not found: {backup_id}");
                Ok(1)
            }
        }
        BackupCommand::Verify { backup_id } => {
            let issues = ctx.storage.verify_integrity(&backup_id).await?;
            for warning in &issues.warnings {
                println!("warning: {warning}");
            }
            if issues.is_valid {
                println!("backup {backup_id} passed its integrity check");
                Ok(0)
            } else {
                for error in &issues.errors {
                    eprintln!("error: {error}");
                }
                Ok(1)
            }
        }
        BackupCommand::Compare {
            source_backup_id,
            target_backup_id,
        } => {
            let manager = RetentionManager::new(Arc::clone(&ctx.storage));
            let comparison = manager.compare(&source_backup_id, &target_backup_id).await?;
            println!(
                "comparing {} -> {}",
                comparison.source_version.backup_id, comparison.target_version.backup_id
            );
            println!(
                "similarity {:.3}, size difference {} bytes, {}s apart",
                comparison.similarity_score,
                comparison.size_difference,
                comparison.time_difference_secs
            );
            for (kind, change) in &comparison.resource_changes {
                println!(
                    "  {kind}: {} -> {} ({:+}, {:+.1}%)",
                    change.source_count,
                    change.target_count,
                    change.difference,
                    change.percent_change
                );
            }
            Ok(0)
        }
    }
}
