//! `idman export` and `idman import`.

use std::sync::Arc;

use idman_core::errors::{IdmanResult, ParsingError};
use idman_export::convert::{ExportDialect, ExportFormat};
use idman_export::manager::ExportImportManager;

use crate::cli::{ExportArgs, FormatArg, ImportArgs};
use crate::context::CommandContext;

fn dialect_of(arg: FormatArg) -> ExportDialect {
    match arg {
        FormatArg::Json => ExportDialect::Json,
        FormatArg::Yaml => ExportDialect::Yaml,
        FormatArg::Csv => ExportDialect::Csv,
    }
}

pub async fn run_export(ctx: &CommandContext, args: ExportArgs) -> IdmanResult<u8> {
    let manager = ExportImportManager::new(Arc::clone(&ctx.storage));
    let mut format = ExportFormat {
        dialect: dialect_of(args.format),
        compressed: false,
    };
    if args.compress {
        format = format.with_compression();
    }
    manager
        .export_backup(&args.backup_id, format, &args.output)
        .await?;
    println!(
        "exported backup {} to {}",
        args.backup_id,
        args.output.display()
    );
    Ok(0)
}

pub async fn run_import(ctx: &CommandContext, args: ImportArgs) -> IdmanResult<u8> {
    let dialect = match args.format {
        Some(format) => dialect_of(format),
        None if args.input.is_dir() => ExportDialect::Csv,
        None => ExportDialect::from_extension(&args.input).ok_or_else(|| {
            ParsingError::UnsupportedExtension {
                extension: args
                    .input
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("<none>")
                    .to_string(),
            }
        })?,
    };
    let format = ExportFormat {
        dialect,
        compressed: false,
    };

    let manager = ExportImportManager::new(Arc::clone(&ctx.storage));
    if args.validate_only {
        let issues = manager.validate_import(&args.input, format).await?;
        for warning in &issues.warnings {
            println!("warning: {warning}");
        }
        return if issues.is_valid {
            println!("import source is valid");
            Ok(0)
        } else {
            for error in &issues.errors {
                eprintln!("error: {error}");
            }
            Ok(1)
        };
    }

    let backup_id = manager.import_backup(&args.input, format).await?;
    println!("imported backup {backup_id}");
    Ok(0)
}
