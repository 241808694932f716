//! `tdb wp` command - Evaluate a device at one working point

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{format_value, working_point, Workspace};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::resolve::{ResolveError, WorkingPointResolver};
use crate::entities::characteristic::Element;
use crate::entities::quantity::{Quantity, ResolvedQuantity};
use crate::entities::working_point::WorkingPoint;

#[derive(clap::Args, Debug)]
pub struct WpArgs {
    /// Device id (or id prefix), name or part number
    pub id: String,

    /// Working point, e.g. "v=400,i=20,t=125,rg=2.2"
    #[arg(long, short = 'p')]
    pub point: Option<String>,

    /// Start from defaults derived from the device ratings
    #[arg(long)]
    pub quickstart: bool,

    /// Quantity to evaluate (repeatable; default: every available quantity)
    #[arg(long = "quantity", short = 'Q')]
    pub quantities: Vec<Quantity>,

    /// Evaluate the switch or the diode (default: the device's primary element)
    #[arg(long, short = 'e')]
    pub element: Option<Element>,
}

#[derive(Serialize)]
struct WpReport<'a> {
    device: String,
    element: Element,
    point: &'a WorkingPoint,
    results: Vec<&'a ResolvedQuantity>,
    failures: Vec<WpFailure>,
}

#[derive(Serialize)]
struct WpFailure {
    quantity: Quantity,
    error: String,
}

pub fn run(args: WpArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let device = ws.load(&args.id)?;
    let wp = working_point(&device, args.point.as_deref(), args.quickstart)?;
    log::info!("evaluating {} at {}", device.id(), wp);

    let mut resolver = WorkingPointResolver::new(&device);
    if let Some(element) = args.element {
        resolver = resolver.with_element(element);
    }
    let outcomes: Vec<(Quantity, Result<ResolvedQuantity, ResolveError>)> =
        if args.quantities.is_empty() {
            resolver.resolve_all(&wp)
        } else {
            let mut seen = Vec::new();
            args.quantities
                .iter()
                .filter(|q| {
                    let fresh = !seen.contains(*q);
                    seen.push(**q);
                    fresh
                })
                .map(|q| (*q, resolver.resolve(&wp, *q)))
                .collect()
        };

    if outcomes.is_empty() {
        return Err(miette::miette!(
            help = "add characteristics to the device file",
            "device {} has no {} characteristics to evaluate",
            device.id(),
            resolver.element()
        ));
    }

    // A single explicit quantity that fails is an error, with full diagnostics
    if outcomes.len() == 1 && !args.quantities.is_empty() {
        if let (_, Err(e)) = &outcomes[0] {
            return Err(e.clone().into());
        }
    }

    let results: Vec<&ResolvedQuantity> = outcomes
        .iter()
        .filter_map(|(_, r)| r.as_ref().ok())
        .collect();
    let failures: Vec<WpFailure> = outcomes
        .iter()
        .filter_map(|(q, r)| {
            r.as_ref().err().map(|e| WpFailure {
                quantity: *q,
                error: e.to_string(),
            })
        })
        .collect();

    let report = WpReport {
        device: device.id().to_string(),
        element: resolver.element(),
        point: &wp,
        results,
        failures,
    };

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&report).into_diagnostic()?);
        }
        OutputFormat::Tsv | OutputFormat::Csv => {
            let sep = if global.format == OutputFormat::Csv { "," } else { "\t" };
            println!("quantity{0}value{0}unit{0}extrapolated", sep);
            for r in &report.results {
                println!("{1}{0}{2}{0}{3}{0}{4}", sep, r.quantity, r.value, r.unit, r.extrapolated);
            }
        }
        OutputFormat::Id => {
            for r in &report.results {
                println!("{}", r.quantity);
            }
        }
        OutputFormat::Md | OutputFormat::Auto => print_report(&report, global),
    }

    if report.results.is_empty() {
        return Err(miette::miette!(
            "no quantity could be evaluated for {} at {}",
            device.name(),
            wp
        ));
    }
    Ok(())
}

fn print_report(report: &WpReport<'_>, global: &GlobalOpts) {
    if !global.quiet {
        println!(
            "{} ({}) at {}",
            style(&report.device).cyan(),
            report.element,
            style(report.point).yellow()
        );
    }

    let mut builder = Builder::default();
    builder.push_record(["Quantity", "Value", "Unit", ""]);
    for r in &report.results {
        builder.push_record([
            r.quantity.to_string(),
            format_value(r.value),
            r.unit.clone(),
            if r.extrapolated {
                "extrapolated".to_string()
            } else {
                String::new()
            },
        ]);
    }
    let mut table = builder.build();
    if global.format == OutputFormat::Md {
        table.with(Style::markdown());
    } else {
        table.with(Style::rounded());
    }
    println!("{}", table);

    for f in &report.failures {
        eprintln!(
            "{} {}: {}",
            style("✗").red(),
            style(f.quantity).bold(),
            f.error
        );
    }
}
