//! `tdb index` command - Manage the device index
//!
//! The index is a local SQLite database (`.tdb/index.db`) holding device
//! metadata for listing and search. It is derived from the device files
//! and can be deleted or rebuilt at any time.

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::Workspace;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::index::{DeviceIndex, GroupCount, SyncStats};

#[derive(Subcommand, Debug)]
pub enum IndexCommands {
    /// Rebuild the index from scratch
    Rebuild,

    /// Sync the index with changed device files (incremental)
    Sync,

    /// Show index statistics
    Status,
}

pub fn run(cmd: IndexCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        IndexCommands::Rebuild => run_rebuild(global),
        IndexCommands::Sync => run_sync(global),
        IndexCommands::Status => run_status(global),
    }
}

fn run_rebuild(global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let mut index = DeviceIndex::open_without_sync(&ws.project, ws.store.dir())?;

    if !global.quiet {
        println!("{} Rebuilding index...", style("→").blue());
    }
    let stats = index.rebuild()?;

    if !global.quiet {
        println!(
            "{} Index rebuilt in {}ms",
            style("✓").green(),
            stats.duration_ms
        );
        println!("  Files scanned:   {}", stats.files_scanned);
        println!("  Devices indexed: {}", stats.devices_added);
        print_invalid(&stats);
    }
    Ok(())
}

fn run_sync(global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let mut index = DeviceIndex::open_without_sync(&ws.project, ws.store.dir())?;
    let stats = index.sync()?;

    if global.quiet {
        return Ok(());
    }

    if stats.devices_added == 0 && stats.devices_updated == 0 && stats.devices_removed == 0 {
        println!("{} Index is up to date", style("✓").green());
    } else {
        println!(
            "{} Index synced in {}ms",
            style("✓").green(),
            stats.duration_ms
        );
        if stats.devices_added > 0 {
            println!("  Added:   {}", style(stats.devices_added).green());
        }
        if stats.devices_updated > 0 {
            println!("  Updated: {}", style(stats.devices_updated).yellow());
        }
        if stats.devices_removed > 0 {
            println!("  Removed: {}", style(stats.devices_removed).red());
        }
    }
    print_invalid(&stats);
    Ok(())
}

fn print_invalid(stats: &SyncStats) {
    if stats.files_invalid > 0 {
        println!(
            "  {} {} invalid file(s) skipped; run `tdb validate` for details",
            style("!").yellow(),
            stats.files_invalid
        );
    }
}

fn run_status(global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let index = DeviceIndex::open(&ws.project, ws.store.dir())?;
    let stats = index.stats();

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats).into_diagnostic()?);
            return Ok(());
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&stats).into_diagnostic()?);
            return Ok(());
        }
        _ => {}
    }

    println!("{}", style("Index Status").bold());
    println!("{}", style("─".repeat(40)).dim());
    println!("  Location:      {}", ws.project.index_path().display());
    println!("  Device dir:    {}", ws.store.dir().display());
    println!("  Total devices: {}", style(stats.total_devices).cyan());
    println!(
        "  Database size: {} KB",
        style(stats.db_size_bytes / 1024).cyan()
    );

    print_groups("By Class:", &stats.by_class);
    print_groups("By Manufacturer:", &stats.by_manufacturer);
    Ok(())
}

fn print_groups(title: &str, groups: &[GroupCount]) {
    if groups.is_empty() {
        return;
    }
    println!();
    println!("  {}", style(title).bold());
    for g in groups {
        println!("    {:<20} {}", g.group, g.count);
    }
}
