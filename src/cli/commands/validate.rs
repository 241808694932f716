//! `tdb validate` command - Check device files against the device schema

use console::style;
use miette::Result;
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::cli::helpers::Workspace;
use crate::cli::GlobalOpts;
use crate::core::store::is_device_file;
use crate::schema::{FileValidationError, Validator};

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Files or directories to validate (default: the project's device directory)
    #[arg()]
    pub paths: Vec<PathBuf>,

    /// Stop at the first failing file
    #[arg(long)]
    pub fail_fast: bool,

    /// Show summary only, don't show individual errors
    #[arg(long)]
    pub summary: bool,
}

#[derive(Default)]
struct ValidationStats {
    files_checked: usize,
    files_passed: usize,
    files_failed: usize,
    total_errors: usize,
}

pub fn run(args: ValidateArgs, global: &GlobalOpts) -> Result<()> {
    let files = if args.paths.is_empty() {
        let ws = Workspace::open(global)?;
        ws.store.device_files()
    } else {
        expand_paths(&args.paths)
    };

    if files.is_empty() {
        if !global.quiet {
            println!("No device files to validate.");
        }
        return Ok(());
    }

    let validator = Validator::default();
    let mut stats = ValidationStats::default();

    for path in &files {
        stats.files_checked += 1;
        match validator.validate_file(path) {
            Ok(device) => {
                stats.files_passed += 1;
                log::debug!("{} is valid ({})", path.display(), device.id());
                if !args.summary && !global.quiet {
                    println!("{} {}", style("✓").green(), path.display());
                }
            }
            Err(e) => {
                let count = violation_count(&e);
                stats.files_failed += 1;
                stats.total_errors += count;

                if !args.summary {
                    println!(
                        "{} {} - {} error(s)",
                        style("✗").red(),
                        path.display(),
                        count
                    );
                    println!("{:?}", miette::Report::new(e));
                }

                if args.fail_fast {
                    break;
                }
            }
        }
    }

    if !global.quiet {
        println!();
        println!("{}", style("─".repeat(60)).dim());
        println!("{}", style("Validation Summary").bold());
        println!("{}", style("─".repeat(60)).dim());
        println!("  Files checked:  {}", style(stats.files_checked).cyan());
        println!("  Files passed:   {}", style(stats.files_passed).green());
        println!("  Files failed:   {}", style(stats.files_failed).red());
        println!("  Total errors:   {}", style(stats.total_errors).red());
        println!();
    }

    match stats.files_failed {
        0 => {
            if !global.quiet {
                println!("{} All files passed validation!", style("✓").green().bold());
            }
            Ok(())
        }
        1 => Err(miette::miette!("Validation failed: 1 file has errors")),
        n => Err(miette::miette!("Validation failed: {} files have errors", n)),
    }
}

fn violation_count(e: &FileValidationError) -> usize {
    match e {
        FileValidationError::Schema(v) => v.violation_count(),
        FileValidationError::Io { .. } | FileValidationError::Record(_) => 1,
    }
}

/// Expand paths - a directory yields every device file below it
fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                if is_device_file(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else {
            // Missing files surface as read errors
            files.push(path.clone());
        }
    }

    files.sort();
    files
}
