//! `tdb device` command - List, show and import devices

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{escape_csv, format_short_id_str, format_value, truncate_str, Workspace};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::index::{DeviceFilter, DeviceIndex, IndexedDevice};
use crate::core::store::{DeviceStore, YAML_SUFFIX};
use crate::entities::characteristic::CharacteristicKind;
use crate::entities::device::{DeviceClass, DeviceRecord};
use crate::schema::Validator;

#[derive(Subcommand, Debug)]
pub enum DeviceCommands {
    /// List devices from the index
    List(ListArgs),

    /// Show a device's details
    Show(ShowArgs),

    /// Validate a device file and add it to the database
    Import(ImportArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by device class (mosfet, igbt, diode)
    #[arg(long, short = 'c')]
    pub class: Option<DeviceClass>,

    /// Filter by manufacturer (case-insensitive)
    #[arg(long, short = 'm')]
    pub manufacturer: Option<String>,

    /// Only devices with this characteristic (e.g. e-on, channel-resistance)
    #[arg(long, short = 'k')]
    pub kind: Option<CharacteristicKind>,

    /// Search in name, part number and id
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Limit number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Show count only
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Device id (or id prefix), name or part number
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// Device file (.yaml or .json)
    pub file: PathBuf,

    /// Replace a device with the same id
    #[arg(long)]
    pub force: bool,

    /// Validate only, don't write anything
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(cmd: DeviceCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        DeviceCommands::List(args) => run_list(args, global),
        DeviceCommands::Show(args) => run_show(args, global),
        DeviceCommands::Import(args) => run_import(args, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let index = DeviceIndex::open(&ws.project, ws.store.dir())?;

    let filter = DeviceFilter {
        class: args.class,
        manufacturer: args.manufacturer,
        kind: args.kind.map(|k| k.as_str().to_string()),
        search: args.search,
        limit: args.limit,
    };
    let devices = index.list(&filter);

    if args.count {
        println!("{}", devices.len());
        return Ok(());
    }

    if devices.is_empty() {
        if !global.quiet {
            println!("No devices found.");
        }
        return Ok(());
    }

    let format = match global.format {
        OutputFormat::Auto => OutputFormat::Tsv,
        f => f,
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&devices).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(&devices).into_diagnostic()?;
            print!("{}", yaml);
        }
        OutputFormat::Csv => {
            println!("id,name,manufacturer,part_number,class,v_abs_max,i_abs_max,kinds");
            for d in &devices {
                println!(
                    "{},{},{},{},{},{},{},{}",
                    d.id,
                    escape_csv(&d.name),
                    escape_csv(&d.manufacturer),
                    escape_csv(&d.part_number),
                    d.class,
                    d.v_abs_max,
                    d.i_abs_max,
                    escape_csv(&d.kinds.join(" "))
                );
            }
        }
        OutputFormat::Md => {
            let mut builder = Builder::default();
            builder.push_record(["ID", "Name", "Manufacturer", "Class", "V max", "I max", "Kinds"]);
            for d in &devices {
                builder.push_record(list_row(d));
            }
            println!("{}", builder.build().with(Style::markdown()));
        }
        OutputFormat::Id => {
            for d in &devices {
                println!("{}", d.id);
            }
        }
        OutputFormat::Tsv | OutputFormat::Auto => {
            println!(
                "{:<16} {:<24} {:<16} {:<7} {:>8} {:>8}  {}",
                style("ID").bold(),
                style("NAME").bold(),
                style("MANUFACTURER").bold(),
                style("CLASS").bold(),
                style("V_MAX").bold(),
                style("I_MAX").bold(),
                style("KINDS").bold()
            );
            for d in &devices {
                println!(
                    "{:<16} {:<24} {:<16} {:<7} {:>8} {:>8}  {}",
                    style(format_short_id_str(&d.id)).cyan(),
                    truncate_str(&d.name, 23),
                    truncate_str(&d.manufacturer, 15),
                    d.class,
                    format_value(d.v_abs_max),
                    format_value(d.i_abs_max),
                    style(d.kinds.join(",")).dim()
                );
            }
            if !global.quiet {
                println!();
                println!("{} device(s) found", style(devices.len()).cyan());
            }
        }
    }

    Ok(())
}

fn list_row(d: &IndexedDevice) -> [String; 7] {
    [
        d.id.clone(),
        d.name.clone(),
        d.manufacturer.clone(),
        d.class.clone(),
        format_value(d.v_abs_max),
        format_value(d.i_abs_max),
        d.kinds.join(", "),
    ]
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let path = ws.store.locate(&args.id)?;
    let device = ws.store.read(&path)?;

    match global.format {
        OutputFormat::Yaml => {
            if path.to_string_lossy().ends_with(YAML_SUFFIX) {
                print!("{}", std::fs::read_to_string(&path).into_diagnostic()?);
            } else {
                print!("{}", serde_yml::to_string(&device).into_diagnostic()?);
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&device).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Id => println!("{}", device.id()),
        _ => print_device(&device),
    }
    Ok(())
}

fn print_device(device: &DeviceRecord) {
    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(device.id()).cyan());
    println!("{}: {}", style("Name").bold(), style(device.name()).yellow());
    println!(
        "{}: {} {}",
        style("Part").bold(),
        device.manufacturer(),
        device.part_number()
    );
    println!("{}: {}", style("Class").bold(), device.class());
    if let Some(housing) = device.housing() {
        println!("{}: {}", style("Housing").bold(), housing);
    }
    if let Some(url) = device.datasheet_url() {
        let version = device
            .datasheet_version()
            .map(|v| format!(" ({})", v))
            .unwrap_or_default();
        println!("{}: {}{}", style("Datasheet").bold(), url, version);
    }
    println!("{}", style("─".repeat(60)).dim());

    let r = device.ratings();
    println!(
        "{}: {} V, {} A",
        style("Absolute max").bold(),
        format_value(r.v_abs_max),
        format_value(r.i_abs_max)
    );
    if let Some(i) = r.i_cont {
        println!("{}: {} A", style("Continuous").bold(), format_value(i));
    }
    if let Some(t) = r.t_j_max {
        println!("{}: {} °C", style("Tj max").bold(), format_value(t));
    }
    if !device.nominal().is_empty() {
        println!("{}: {}", style("Nominal").bold(), device.nominal());
    }

    if device.characteristics().is_empty() {
        println!();
        println!("{}", style("No characteristics").dim());
        return;
    }

    let mut builder = Builder::default();
    builder.push_record(["Element", "Kind", "Conditions", "Unit", "Axes", "Samples"]);
    for rec in device.characteristics() {
        let axes: Vec<String> = rec
            .curve()
            .axes()
            .iter()
            .map(|a| {
                format!(
                    "{} [{}..{} {}]",
                    a.variable(),
                    format_value(a.min()),
                    format_value(a.max()),
                    a.unit()
                )
            })
            .collect();
        builder.push_record([
            device.element_of(rec).to_string(),
            rec.kind().to_string(),
            rec.conditions().to_string(),
            rec.unit().to_string(),
            axes.join("\n"),
            rec.curve().sample_count().to_string(),
        ]);
    }
    println!();
    println!("{}", builder.build().with(Style::rounded()));

    for element in device.elements() {
        let quantities: Vec<String> = device
            .available_quantities(element)
            .iter()
            .map(|q| q.to_string())
            .collect();
        println!(
            "{} ({}): {}",
            style("Quantities").bold(),
            element,
            quantities.join(", ")
        );
    }
}

fn run_import(args: ImportArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let validator = Validator::default();

    let device = validator
        .validate_file(&args.file)?
        .with_default_author(ws.config.author());

    let target = ws.store.path_for(device.id());
    if target.exists() && !args.force {
        return Err(miette::miette!(
            help = "use --force to replace it",
            "device {} already exists at {}",
            device.id(),
            target.display()
        ));
    }

    if args.dry_run {
        println!(
            "{} {} is valid ({} characteristic(s))",
            style("✓").green(),
            args.file.display(),
            device.characteristics().len()
        );
        return Ok(());
    }

    ws.store.save(&device)?;
    // Opening syncs the index with the new file
    DeviceIndex::open(&ws.project, ws.store.dir())?;

    if !global.quiet {
        println!(
            "{} Imported {} as {}",
            style("✓").green(),
            style(device.name()).yellow(),
            style(device.id()).cyan()
        );
        println!("   {}", style(target.display()).dim());
    }
    Ok(())
}
