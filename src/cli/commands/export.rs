//! `tdb export` command - Evaluate quantities over many working points

use console::style;
use miette::Result;
use std::path::{Path, PathBuf};

use crate::cli::helpers::{working_point, write_output, Workspace};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::resolve::WorkingPointResolver;
use crate::entities::characteristic::Element;
use crate::entities::quantity::Quantity;
use crate::entities::working_point::WorkingPoint;
use crate::export::{
    build_export_view, build_full_export_view, serializer_for, ExportFormat,
};

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Device id (or id prefix), name or part number
    pub id: String,

    /// Working point (repeatable), e.g. --point i=10,t=25 --point i=20,t=125
    #[arg(long = "point", short = 'p', required_unless_present = "quickstart")]
    pub points: Vec<String>,

    /// Add the device's quickstart point
    #[arg(long)]
    pub quickstart: bool,

    /// Quantity to export (repeatable; default: every available quantity)
    #[arg(long = "quantity", short = 'Q')]
    pub quantities: Vec<Quantity>,

    /// Export the switch or the diode (default: the device's primary element)
    #[arg(long, short = 'e')]
    pub element: Option<Element>,

    /// Tera template file or name in the template directory (implies template format)
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Write to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn run(args: ExportArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let device = ws.load(&args.id)?;

    let mut points: Vec<WorkingPoint> = Vec::with_capacity(args.points.len() + 1);
    if args.quickstart {
        points.push(WorkingPoint::quickstart(&device));
    }
    for text in &args.points {
        points.push(working_point(&device, Some(text), false)?);
    }

    let mut resolver = WorkingPointResolver::new(&device);
    if let Some(element) = args.element {
        resolver = resolver.with_element(element);
    }
    let view = if args.quantities.is_empty() {
        build_full_export_view(resolver, &points)
    } else {
        build_export_view(resolver, &points, &args.quantities)
    };

    // The global -f picks the format; md renders through a template
    let format = match (global.format, &args.template) {
        (_, Some(_)) | (OutputFormat::Md, None) => ExportFormat::Template,
        (OutputFormat::Json, None) => ExportFormat::Json,
        (OutputFormat::Yaml, None) => ExportFormat::Yaml,
        (OutputFormat::Csv, None) => ExportFormat::Csv,
        (OutputFormat::Tsv, None) => ExportFormat::Tsv,
        (OutputFormat::Auto | OutputFormat::Id, None) => ws.config.default_format().parse()?,
    };

    let template = args
        .template
        .as_deref()
        .map(|t| locate_template(t, &ws.config.template_dir(&ws.project)));

    let serializer = serializer_for(format, template.as_deref())?;
    let text = serializer.to_string(&view)?;

    write_output(args.output.as_deref(), &text)?;
    if let Some(path) = &args.output {
        if !global.quiet {
            eprintln!(
                "{} Wrote {} export to {}",
                style("✓").green(),
                serializer.name(),
                style(path.display()).cyan()
            );
        }
    }

    if !view.is_complete() {
        eprintln!(
            "{} {} of {} (point, quantity) pair(s) could not be resolved",
            style("!").yellow(),
            view.failures.len(),
            view.requested()
        );
        for f in &view.failures {
            log::warn!("point {} {}: {}", f.point_index, f.quantity, f.error);
        }
    }
    Ok(())
}

/// A template path as given, or a name inside the project's template directory
fn locate_template(template: &Path, template_dir: &Path) -> PathBuf {
    if template.exists() {
        return template.to_path_buf();
    }
    let in_dir = template_dir.join(template);
    if in_dir.exists() {
        return in_dir;
    }
    let with_ext = template_dir.join(format!("{}.tera", template.display()));
    if with_ext.exists() {
        with_ext
    } else {
        template.to_path_buf()
    }
}
