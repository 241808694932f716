//! Serializers over [`ExportView`]

use std::fmt;
use std::io;
use std::path::Path;

use miette::Diagnostic;
use rust_embed::Embed;
use tera::Tera;
use thiserror::Error;

use super::ExportView;
use crate::entities::curve::Variable;

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

/// Name of the embedded template used when no file is given
pub const DEFAULT_TEMPLATE: &str = "summary.md.tera";

#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("failed to write export: {0}")]
    #[diagnostic(code(tdb::export::io))]
    Io(#[from] io::Error),

    #[error("JSON serialization failed: {0}")]
    #[diagnostic(code(tdb::export::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    #[diagnostic(code(tdb::export::yaml))]
    Yaml(#[from] serde_yml::Error),

    #[error("CSV serialization failed: {0}")]
    #[diagnostic(code(tdb::export::csv))]
    Csv(#[from] csv::Error),

    #[error("template error: {0}")]
    #[diagnostic(
        code(tdb::export::template),
        help("templates receive `device`, `element`, `points`, `quantities`, `entries` and `failures`")
    )]
    Template(String),

    #[error("unknown export format: {0}")]
    #[diagnostic(code(tdb::export::format), help("use json, yaml, csv, tsv or template"))]
    UnknownFormat(String),
}

impl From<tera::Error> for ExportError {
    fn from(err: tera::Error) -> Self {
        // Tera keeps the useful detail in the source chain
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        ExportError::Template(message)
    }
}

/// Writes an [`ExportView`] in one format
pub trait ExportSerializer {
    /// Format name, as accepted on the command line
    fn name(&self) -> &'static str;

    fn write(&self, view: &ExportView, out: &mut dyn io::Write) -> Result<(), ExportError>;

    fn to_string(&self, view: &ExportView) -> Result<String, ExportError> {
        let mut buf = Vec::new();
        self.write(view, &mut buf)?;
        String::from_utf8(buf).map_err(|e| ExportError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl ExportSerializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn write(&self, view: &ExportView, out: &mut dyn io::Write) -> Result<(), ExportError> {
        serde_json::to_writer_pretty(&mut *out, view)?;
        writeln!(out)?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct YamlSerializer;

impl ExportSerializer for YamlSerializer {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn write(&self, view: &ExportView, out: &mut dyn io::Write) -> Result<(), ExportError> {
        let text = serde_yml::to_string(view)?;
        out.write_all(text.as_bytes())?;
        Ok(())
    }
}

/// One row per requested (point, quantity) pair, failures included
#[derive(Debug, Clone, Copy)]
pub struct CsvSerializer {
    delimiter: u8,
}

impl CsvSerializer {
    pub fn comma() -> Self {
        Self { delimiter: b',' }
    }

    /// Tab-separated rows with the same columns
    pub fn tab() -> Self {
        Self { delimiter: b'\t' }
    }
}

impl Default for CsvSerializer {
    fn default() -> Self {
        Self::comma()
    }
}

const POINT_COLUMNS: [(&str, Variable); 6] = [
    ("t", Variable::Temperature),
    ("vg", Variable::GateVoltage),
    ("rg", Variable::GateResistance),
    ("v", Variable::Voltage),
    ("i", Variable::Current),
    ("time", Variable::Time),
];

fn cell(value: Option<impl fmt::Display>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl ExportSerializer for CsvSerializer {
    fn name(&self) -> &'static str {
        if self.delimiter == b'\t' {
            "tsv"
        } else {
            "csv"
        }
    }

    fn write(&self, view: &ExportView, out: &mut dyn io::Write) -> Result<(), ExportError> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(out);

        let mut header = vec!["point"];
        header.extend(POINT_COLUMNS.iter().map(|(name, _)| *name));
        header.extend(["quantity", "value", "unit", "extrapolated", "error"]);
        wtr.write_record(&header)?;

        for (index, point) in view.points.iter().enumerate() {
            for &quantity in &view.quantities {
                let mut row = vec![index.to_string()];
                row.extend(POINT_COLUMNS.iter().map(|(_, v)| cell(point.value(*v))));
                row.push(quantity.to_string());

                if let Some(resolved) = view.get(index, quantity) {
                    row.push(resolved.value.to_string());
                    row.push(resolved.unit.clone());
                    row.push(resolved.extrapolated.to_string());
                    row.push(String::new());
                } else {
                    row.extend([String::new(), String::new(), String::new()]);
                    row.push(cell(view.failure(index, quantity)));
                }
                wtr.write_record(&row)?;
            }
        }

        wtr.flush()?;
        Ok(())
    }
}

/// Renders the view through a Tera template
pub struct TemplateSerializer {
    tera: Tera,
    name: String,
}

impl TemplateSerializer {
    /// Use the embedded summary template
    pub fn embedded() -> Result<Self, ExportError> {
        let mut tera = Tera::default();
        for file in EmbeddedTemplates::iter() {
            let filename = file.as_ref();
            if let Some(content) = EmbeddedTemplates::get(filename) {
                let source = std::str::from_utf8(&content.data)
                    .map_err(|e| ExportError::Template(format!("{}: {}", filename, e)))?;
                tera.add_raw_template(filename, source)?;
            }
        }
        if !tera.get_template_names().any(|n| n == DEFAULT_TEMPLATE) {
            return Err(ExportError::Template(format!(
                "embedded template '{}' is missing",
                DEFAULT_TEMPLATE
            )));
        }
        Ok(Self {
            tera,
            name: DEFAULT_TEMPLATE.to_string(),
        })
    }

    /// Load a user template from disk
    pub fn from_file(path: &Path) -> Result<Self, ExportError> {
        let source = std::fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "template".to_string());
        Self::from_source(&name, &source)
    }

    pub fn from_source(name: &str, source: &str) -> Result<Self, ExportError> {
        let mut tera = Tera::default();
        tera.add_raw_template(name, source)?;
        Ok(Self {
            tera,
            name: name.to_string(),
        })
    }
}

impl ExportSerializer for TemplateSerializer {
    fn name(&self) -> &'static str {
        "template"
    }

    fn write(&self, view: &ExportView, out: &mut dyn io::Write) -> Result<(), ExportError> {
        let context = tera::Context::from_serialize(view)?;
        let rendered = self.tera.render(&self.name, &context)?;
        out.write_all(rendered.as_bytes())?;
        Ok(())
    }
}

/// Output formats accepted by `tdb export`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    Json,
    #[default]
    Yaml,
    Csv,
    Tsv,
    Template,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Yaml => "yaml",
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Template => "template",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "yaml" | "yml" => Ok(ExportFormat::Yaml),
            "csv" => Ok(ExportFormat::Csv),
            "tsv" => Ok(ExportFormat::Tsv),
            "template" | "tera" | "md" => Ok(ExportFormat::Template),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

/// Build the serializer for a format; `template` overrides the embedded one
pub fn serializer_for(
    format: ExportFormat,
    template: Option<&Path>,
) -> Result<Box<dyn ExportSerializer>, ExportError> {
    Ok(match format {
        ExportFormat::Json => Box::new(JsonSerializer),
        ExportFormat::Yaml => Box::new(YamlSerializer),
        ExportFormat::Csv => Box::new(CsvSerializer::comma()),
        ExportFormat::Tsv => Box::new(CsvSerializer::tab()),
        ExportFormat::Template => match template {
            Some(path) => Box::new(TemplateSerializer::from_file(path)?),
            None => Box::new(TemplateSerializer::embedded()?),
        },
    })
}
