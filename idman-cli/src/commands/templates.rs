//! `idman templates ...`.

use std::sync::Arc;

use idman_core::errors::IdmanResult;
use idman_core::traits::IPrompter;
use idman_templates::executor::TemplateExecutor;
use idman_templates::models::{
    Template, TemplateAssignment, TemplateMetadata, TemplateTarget,
};
use idman_templates::parser;
use idman_templates::store::TemplateStore;
use idman_templates::validator::TemplateValidator;

use crate::cli::TemplatesCommand;
use crate::context::CommandContext;
use crate::prompt::StdinPrompter;

fn store_for(ctx: &CommandContext) -> IdmanResult<TemplateStore> {
    TemplateStore::open(ctx.templates_dir())
}

/// Starter template written by `templates create` without `--from`.
fn example_template(name: &str) -> Template {
    let mut metadata = TemplateMetadata::new(name);
    metadata.description = Some("Example template granting developer access".to_string());
    metadata.version = Some("1.0".to_string());
    Template {
        metadata,
        assignments: vec![TemplateAssignment {
            entities: vec!["user:john.doe".to_string(), "group:developers".to_string()],
            permission_sets: vec!["DeveloperAccess".to_string(), "ReadOnlyAccess".to_string()],
            targets: TemplateTarget {
                account_ids: None,
                account_tags: Some(
                    [("Environment".to_string(), "development".to_string())]
                        .into_iter()
                        .collect(),
                ),
                exclude_accounts: None,
            },
        }],
    }
}

pub async fn run(ctx: &CommandContext, command: TemplatesCommand) -> IdmanResult<u8> {
    let store = store_for(ctx)?;
    match command {
        TemplatesCommand::Create { name, from } => {
            let mut template = match from {
                Some(path) => parser::parse_file(&path)?,
                None => example_template(&name),
            };
            template.metadata.name = name.clone();
            let errors = template.validate_structure();
            if !errors.is_empty() {
                for error in &errors {
                    eprintln!("error: {error}");
                }
                return Ok(1);
            }
            let path = store.save(&template, false)?;
            println!("created template '{name}' at {}", path.display());
            Ok(0)
        }
        TemplatesCommand::Validate { name } => {
            let Some(template) = store.get(&name)? else {
                eprintln!("template not found: {name}");
                return Ok(1);
            };
            let validator = TemplateValidator::new(Arc::clone(&ctx.directory));
            let validation = validator.validate(&template).await?;
            for warning in &validation.issues.warnings {
                println!("warning: {warning}");
            }
            if validation.is_valid() {
                println!(
                    "template '{name}' is valid ({} entities, {} accounts resolved)",
                    validation.resolved_entities.len(),
                    validation.resolved_accounts.len()
                );
                Ok(0)
            } else {
                for error in &validation.issues.errors {
                    eprintln!("error: {error}");
                }
                Ok(1)
            }
        }
        TemplatesCommand::Preview { name } => {
            let Some(template) = store.get(&name)? else {
                eprintln!("template not found: {name}");
                return Ok(1);
            };
            let executor =
                TemplateExecutor::new(Arc::clone(&ctx.directory), &ctx.profile.instance_arn);
            let preview = executor.preview(&template).await?;
            println!(
                "template '{}' expands to {} assignments across {} accounts",
                preview.template_name,
                preview.total_assignments,
                preview.resolved_accounts.len()
            );
            for entity in &preview.entities {
                println!(
                    "  entity {} {}",
                    entity.reference,
                    if entity.exists { "(exists)" } else { "(MISSING)" }
                );
            }
            for permission_set in &preview.permission_sets {
                println!(
                    "  permission set {} {}",
                    permission_set.name,
                    if permission_set.exists { "(exists)" } else { "(MISSING)" }
                );
            }
            Ok(if preview.issues.is_valid { 0 } else { 1 })
        }
        TemplatesCommand::Apply {
            name,
            dry_run,
            force,
        } => {
            let Some(template) = store.get(&name)? else {
                eprintln!("template not found: {name}");
                return Ok(1);
            };
            if !dry_run && !force {
                let question = format!("Apply template '{name}'?");
                if !StdinPrompter.confirm(&question) {
                    println!("cancelled");
                    return Ok(0);
                }
            }
            let executor =
                TemplateExecutor::new(Arc::clone(&ctx.directory), &ctx.profile.instance_arn);
            let result = executor.apply(&template, dry_run).await?;
            println!(
                "apply {}: {} created, {} skipped, {} failed ({}ms)",
                if dry_run { "(dry-run)" } else { "completed" },
                result.created.len(),
                result.skipped.len(),
                result.failed.len(),
                result.duration_ms
            );
            if let Some(message) = &result.error_message {
                eprintln!("error: {message}");
            }
            for failure in &result.failed {
                eprintln!(
                    "  {}:{} -> {}: {}",
                    failure.entity_type,
                    failure.entity_name,
                    failure.account_id,
                    failure.error.as_deref().unwrap_or("unknown error")
                );
            }
            Ok(if result.success { 0 } else { 1 })
        }
        TemplatesCommand::List => {
            let templates = store.list()?;
            if templates.is_empty() {
                println!("no templates in {}", store.directory().display());
                return Ok(0);
            }
            for info in templates {
                println!(
                    "{}  ({} assignments, {} entities, {} permission sets)",
                    info.name,
                    info.assignment_count,
                    info.entity_count,
                    info.permission_set_count
                );
            }
            Ok(0)
        }
        TemplatesCommand::Show { name } => {
            let Some(template) = store.get(&name)? else {
                eprintln!("template not found: {name}");
                return Ok(1);
            };
            println!(
                "{}",
                parser::to_string(&template, parser::TemplateFormat::Yaml)?
            );
            Ok(0)
        }
        TemplatesCommand::Delete { name, force } => {
            if !force && !StdinPrompter.confirm(&format!("Delete template '{name}'?")) {
                println!("cancelled");
                return Ok(0);
            }
            if store.delete(&name)? {
                println!("deleted template '{name}'");
                Ok(0)
            } else {
                eprintln!("template not found: {name}");
                Ok(1)
            }
        }
    }
}
