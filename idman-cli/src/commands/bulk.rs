//! `idman bulk assign|revoke`.

use std::sync::Arc;

use idman_bulk::executor::{BatchProcessor, BulkOperation};
use idman_bulk::ingest;
use idman_bulk::preview::{gate, summarize, PreviewDecision};
use idman_bulk::resolver::ResourceResolver;
use idman_bulk::tuner::PerformanceTuner;
use idman_core::errors::IdmanResult;

use crate::cli::{BulkCommand, CommonBulkArgs};
use crate::commands::print_error;
use crate::context::CommandContext;
use crate::prompt::StdinPrompter;

pub async fn run(ctx: &CommandContext, command: BulkCommand) -> IdmanResult<u8> {
    let (operation, args) = match command {
        BulkCommand::Assign(args) => (BulkOperation::Assign, args),
        BulkCommand::Revoke(args) => (BulkOperation::Revoke, args),
        BulkCommand::Orphans {
            refresh,
            cleanup,
            force,
        } => return orphans(ctx, refresh, cleanup, force).await,
    };
    execute(ctx, operation, args).await
}

async fn orphans(
    ctx: &CommandContext,
    refresh: bool,
    cleanup: bool,
    force: bool,
) -> IdmanResult<u8> {
    use idman_bulk::orphans::{detect_orphans, OrphanCache};
    use idman_core::traits::IPrompter;
    use std::time::Duration;

    let cache = OrphanCache::new(Duration::from_secs(ctx.config.orphan_cache_ttl_secs));
    let result = match (!refresh).then(|| cache.load(&ctx.profile_name)).flatten() {
        Some(cached) => {
            println!("using cached detection from {}", cached.timestamp.to_rfc3339());
            cached
        }
        None => {
            let fresh = detect_orphans(Arc::clone(&ctx.directory), &ctx.profile_name).await?;
            cache.save(&fresh)?;
            fresh
        }
    };

    if result.orphaned_assignments.is_empty() {
        println!("no orphaned assignments detected");
        return Ok(0);
    }
    println!("{} orphaned assignments:", result.orphaned_assignments.len());
    for orphan in &result.orphaned_assignments {
        println!(
            "  {} on {} in {}: {}",
            orphan.assignment.principal_id,
            orphan.permission_set_name,
            orphan.account_name,
            orphan.reason
        );
    }
    if !cleanup {
        return Ok(0);
    }
    if !force
        && !StdinPrompter.confirm(&format!(
            "Revoke {} orphaned assignments?",
            result.orphaned_assignments.len()
        ))
    {
        println!("cancelled");
        return Ok(0);
    }
    let mut failures = 0usize;
    for orphan in &result.orphaned_assignments {
        if let Err(error) = ctx.directory.delete_assignment(&orphan.assignment).await {
            failures += 1;
            print_error(&error);
        }
    }
    cache.clear(&ctx.profile_name);
    println!(
        "revoked {} orphaned assignments, {failures} failures",
        result.orphaned_assignments.len() - failures
    );
    Ok(if failures == 0 { 0 } else { 1 })
}

async fn execute(
    ctx: &CommandContext,
    operation: BulkOperation,
    args: CommonBulkArgs,
) -> IdmanResult<u8> {
    println!(
        "bulk {operation} from {} (profile {})",
        args.input_file.display(),
        ctx.profile_name
    );

    let batch = ingest::parse_file(&args.input_file)?;
    if !batch.is_clean() {
        eprintln!("input validation failed:");
        for error in &batch.errors {
            print_error(error);
        }
        return Ok(1);
    }
    println!("parsed {} records", batch.records.len());

    let resolver = ResourceResolver::new(Arc::clone(&ctx.directory));
    resolver.warm_cache_for(&batch.records).await?;
    let mut resolved = Vec::with_capacity(batch.records.len());
    for record in &batch.records {
        resolved.push(resolver.resolve_assignment(record).await);
    }

    let summary = summarize(&resolved, operation);
    println!(
        "preview: {} total, {} resolvable, {} unresolvable \
         ({} principals, {} permission sets, {} accounts)",
        summary.total,
        summary.resolvable,
        summary.unresolvable,
        summary.principals.len(),
        summary.permission_sets.len(),
        summary.accounts.len()
    );

    match gate(&summary, args.dry_run, args.force, &StdinPrompter) {
        PreviewDecision::DryRunComplete => {
            println!("dry-run complete, no changes made");
            return Ok(0);
        }
        PreviewDecision::Cancelled => {
            println!("cancelled");
            return Ok(0);
        }
        PreviewDecision::AbortUnresolvable => {
            eprintln!("cannot proceed: {} unresolvable records", summary.unresolvable);
            for item in resolved.iter().filter(|r| !r.success()) {
                for message in &item.resolution_errors {
                    eprintln!(
                        "  line {}: {message}",
                        item.record
                            .line_number
                            .map(|l| l.to_string())
                            .unwrap_or_else(|| "?".to_string())
                    );
                }
            }
            return Ok(1);
        }
        PreviewDecision::Proceed => {}
    }

    let valid: Vec<_> = resolved.into_iter().filter(|r| r.success()).collect();
    let tuning = PerformanceTuner::config_for(summary.accounts.len(), operation);
    let mut processor =
        BatchProcessor::new(Arc::clone(&ctx.directory)).with_tuning(&tuning);
    if let Some(batch_size) = args.batch_size {
        processor = processor.with_batch_size(batch_size as usize);
    }
    let continue_on_error = !args.stop_on_error;
    let results = processor
        .process(
            valid,
            operation,
            &ctx.profile.instance_arn,
            false,
            continue_on_error,
        )
        .await;

    println!(
        "{operation} finished in {}ms: {} succeeded, {} failed, {} skipped",
        results.duration_ms,
        results.success_count(),
        results.failure_count(),
        results.skip_count()
    );
    if !results.failed.is_empty() {
        eprintln!("failed records:");
        for item in &results.failed {
            eprintln!(
                "  {} / {} / {}: {}",
                item.record.principal_name,
                item.record.permission_set_name,
                item.record.account_name,
                item.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    Ok(if results.is_success() { 0 } else { 1 })
}
