//! `idman restore ...`.

use std::sync::Arc;

use idman_core::errors::IdmanResult;
use idman_core::models::{ConflictStrategy, RestoreOptions};
use idman_restore::engine::RestoreEngine;

use crate::cli::{RestoreCommand, StrategyArg};
use crate::context::CommandContext;
use crate::prompt::StdinPrompter;

fn strategy_of(arg: StrategyArg) -> ConflictStrategy {
    match arg {
        StrategyArg::Overwrite => ConflictStrategy::Overwrite,
        StrategyArg::Skip => ConflictStrategy::Skip,
        StrategyArg::Merge => ConflictStrategy::Merge,
        StrategyArg::Prompt => ConflictStrategy::Prompt,
    }
}

pub async fn run(ctx: &CommandContext, command: RestoreCommand) -> IdmanResult<u8> {
    let engine = RestoreEngine::new(Arc::clone(&ctx.directory), Arc::clone(&ctx.storage))
        .with_prompter(Arc::new(StdinPrompter));
    // Evict completed operation state after its inspection window.
    let reaper = engine.states().spawn_reaper();
    let outcome = execute(ctx, &engine, command).await;
    reaper.abort();
    outcome
}

async fn execute(
    ctx: &CommandContext,
    engine: &RestoreEngine,
    command: RestoreCommand,
) -> IdmanResult<u8> {
    match command {
        RestoreCommand::Run {
            backup_id,
            strategy,
            dry_run,
            skip_validation,
            target_instance_arn,
        } => {
            let options = RestoreOptions {
                conflict_strategy: strategy_of(strategy),
                dry_run,
                skip_validation,
                target_instance_arn,
                ..Default::default()
            };
            let result = engine.restore(&backup_id, &options).await?;
            println!("{}", result.message);
            for warning in &result.warnings {
                println!("warning: {warning}");
            }
            for (kind, count) in &result.changes_applied {
                println!("  {kind}: {count} applied");
            }
            if let Some(rollback) = &result.rollback {
                println!(
                    "rollback: {} ({} changes reverted)",
                    rollback.message, rollback.applied_changes_reverted
                );
                for error in &rollback.errors {
                    eprintln!("rollback error: {error}");
                }
            }
            for error in &result.errors {
                eprintln!("error: {error}");
            }
            Ok(if result.success { 0 } else { 1 })
        }
        RestoreCommand::Preview { backup_id } => {
            let preview = engine
                .preview(&backup_id, &RestoreOptions::default())
                .await?;
            for (kind, count) in &preview.changes_summary {
                println!("{kind}: {count} records would be processed");
            }
            if !preview.conflicts.is_empty() {
                println!("{} conflicts with existing resources:", preview.conflicts.len());
                for conflict in &preview.conflicts {
                    println!("  {} '{}'", conflict.resource_type, conflict.resource_id);
                }
            }
            for warning in &preview.warnings {
                println!("warning: {warning}");
            }
            if let Some(secs) = preview.estimated_duration_secs {
                println!("estimated duration: {secs}s");
            }
            Ok(0)
        }
        RestoreCommand::Validate {
            backup_id,
            target_instance_arn,
        } => {
            let target = target_instance_arn.unwrap_or_else(|| ctx.profile.instance_arn.clone());
            let issues = engine.validate_compatibility(&backup_id, &target).await?;
            for warning in &issues.warnings {
                println!("warning: {warning}");
            }
            if issues.is_valid {
                println!("backup {backup_id} is compatible with {target}");
                Ok(0)
            } else {
                for error in &issues.errors {
                    eprintln!("error: {error}");
                }
                Ok(1)
            }
        }
    }
}
