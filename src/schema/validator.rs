//! Schema validation of device files with located error reporting

use std::path::Path;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{validator_for, ValidationError as JsonSchemaError, Validator as JsonValidator};
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::entities::device::DeviceRecord;
use crate::schema::registry::SchemaRegistry;
use crate::yaml::{self, DocumentFormat, SyntaxError};

/// Validation error with source location information
#[derive(Debug, Error, Diagnostic)]
#[error("schema validation failed: {summary}")]
#[diagnostic(code(tdb::schema::validation_error))]
pub struct ValidationError {
    summary: String,

    #[source_code]
    src: NamedSource<String>,

    #[related]
    violations: Vec<SchemaViolation>,
}

/// A single schema violation
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SchemaViolation {
    #[label("{}", self.hint)]
    span: SourceSpan,

    message: String,
    hint: String,

    #[help]
    help: Option<String>,
}

impl SchemaViolation {
    pub fn new(message: String, hint: String, span: SourceSpan, help: Option<String>) -> Self {
        Self {
            span,
            message,
            hint,
            help,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl ValidationError {
    pub fn new(filename: &str, source: &str, violations: Vec<SchemaViolation>) -> Self {
        let count = violations.len();
        let summary = if count == 1 {
            "1 error".to_string()
        } else {
            format!("{} errors", count)
        };
        Self {
            summary,
            src: NamedSource::new(filename, source.to_string()),
            violations,
        }
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[SchemaViolation] {
        &self.violations
    }
}

/// Why a device file failed `tdb validate`
#[derive(Debug, Error, Diagnostic)]
pub enum FileValidationError {
    #[error("cannot read {path:?}: {source}")]
    #[diagnostic(code(tdb::schema::io))]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] ValidationError),

    /// Passed the schema but failed record construction
    #[error(transparent)]
    #[diagnostic(transparent)]
    Record(#[from] SyntaxError),
}

/// Device schema validator
pub struct Validator {
    device: Option<JsonValidator>,
}

impl Validator {
    pub fn new(registry: &SchemaRegistry) -> Self {
        let device = registry.device().and_then(|schema| {
            let json: JsonValue = match serde_json::from_str(schema) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("device schema is not valid JSON: {}", e);
                    return None;
                }
            };
            match validator_for(&json) {
                Ok(v) => Some(v),
                Err(e) => {
                    log::warn!("device schema failed to compile: {}", e);
                    None
                }
            }
        });
        Self { device }
    }

    /// True if a device schema is loaded
    pub fn has_schema(&self) -> bool {
        self.device.is_some()
    }

    /// Check content against the device schema, collecting every violation
    pub fn validate(
        &self,
        content: &str,
        filename: &str,
        format: DocumentFormat,
    ) -> Result<(), ValidationError> {
        let value: JsonValue = match format {
            DocumentFormat::Yaml => serde_yml::from_str(content).map_err(|e| {
                let span = find_error_span(content, e.location().map(|l| (l.line(), l.column())));
                parse_failure(filename, content, format, e.to_string(), span)
            })?,
            DocumentFormat::Json => serde_json::from_str(content).map_err(|e| {
                let span = find_error_span(content, Some((e.line(), e.column())));
                parse_failure(filename, content, format, e.to_string(), span)
            })?,
        };

        let Some(schema) = &self.device else {
            return Ok(());
        };

        let violations: Vec<SchemaViolation> = schema
            .iter_errors(&value)
            .map(|e| error_to_violation(content, &e))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(filename, content, violations))
        }
    }

    /// Schema check followed by full record construction
    pub fn validate_file(&self, path: &Path) -> Result<DeviceRecord, FileValidationError> {
        let content = std::fs::read_to_string(path).map_err(|source| FileValidationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path.display().to_string();
        let format = yaml::format_of(path);

        self.validate(&content, &filename, format)?;
        Ok(yaml::parse_str::<DeviceRecord>(&content, &filename, format)?)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(&SchemaRegistry::default())
    }
}

fn parse_failure(
    filename: &str,
    content: &str,
    format: DocumentFormat,
    message: String,
    span: SourceSpan,
) -> ValidationError {
    let violation = SchemaViolation::new(
        format!("{} parse error: {}", format, message),
        format!("invalid {}", format),
        span,
        Some("check syntax: indentation, colons, brackets and quotes".to_string()),
    );
    ValidationError::new(filename, content, vec![violation])
}

fn error_to_violation(content: &str, error: &JsonSchemaError) -> SchemaViolation {
    let path = error.instance_path.to_string();
    let message = format_schema_error(error);
    let hint = format_error_hint(error);
    let help = generate_help_message(error);
    let span = find_path_span(content, &path);

    SchemaViolation::new(message, hint, span, help)
}

fn format_schema_error(error: &JsonSchemaError) -> String {
    let path = if error.instance_path.as_str().is_empty() {
        "document root".to_string()
    } else {
        format!("'{}'", error.instance_path)
    };

    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let prop = property
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| property.to_string());
            format!("missing required field '{}' at {}", prop, path)
        }
        ValidationErrorKind::Type { kind } => {
            format!("wrong type at {}: expected {:?}", path, kind)
        }
        ValidationErrorKind::Enum { options } => {
            format!(
                "invalid value at {}: must be one of: {}",
                path,
                format_enum_options(options)
            )
        }
        ValidationErrorKind::Pattern { pattern } => {
            format!("value at {} doesn't match pattern {}", path, pattern)
        }
        ValidationErrorKind::MinLength { limit } => {
            format!("value at {} is too short: minimum {} characters", path, limit)
        }
        ValidationErrorKind::MinItems { limit } => {
            format!("list at {} needs at least {} item(s)", path, limit)
        }
        ValidationErrorKind::ExclusiveMinimum { limit } => {
            format!("value at {} must be greater than {}", path, limit)
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            format!("unknown field(s) at {}: {}", path, unexpected.join(", "))
        }
        _ => format!("validation error at {}: {}", path, error),
    }
}

fn format_enum_options(options: &JsonValue) -> String {
    if let Some(arr) = options.as_array() {
        arr.iter()
            .map(|v| v.as_str().map(|s| s.to_string()).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        options.to_string()
    }
}

fn format_error_hint(error: &JsonSchemaError) -> String {
    match &error.kind {
        ValidationErrorKind::Required { .. } => "required field missing",
        ValidationErrorKind::Type { .. } => "wrong type",
        ValidationErrorKind::Enum { .. } => "invalid value",
        ValidationErrorKind::Pattern { .. } => "pattern mismatch",
        ValidationErrorKind::MinLength { .. } | ValidationErrorKind::MinItems { .. } => {
            "too short"
        }
        ValidationErrorKind::ExclusiveMinimum { .. } => "must be positive",
        ValidationErrorKind::AdditionalProperties { .. } => "unknown field",
        _ => "validation error",
    }
    .to_string()
}

fn generate_help_message(error: &JsonSchemaError) -> Option<String> {
    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let prop = property
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| property.to_string());
            Some(format!("add the '{}' field", prop))
        }
        ValidationErrorKind::Enum { options } => {
            Some(format!("valid values: {}", format_enum_options(options)))
        }
        ValidationErrorKind::Pattern { pattern } if pattern.contains("DEV-") => Some(
            "id format: DEV-[26 ULID characters], e.g. DEV-01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string(),
        ),
        ValidationErrorKind::AdditionalProperties { unexpected } if unexpected.len() == 1 => {
            Some(format!("remove '{}' or check its spelling", unexpected[0]))
        }
        ValidationErrorKind::AdditionalProperties { .. } => {
            Some("remove unknown fields or check their spelling".to_string())
        }
        _ => None,
    }
}

fn first_line_span(content: &str) -> SourceSpan {
    let len = content.find('\n').unwrap_or(content.len()).max(1);
    (0, len).into()
}

/// Span for a 1-based (line, column) location
fn find_error_span(content: &str, location: Option<(usize, usize)>) -> SourceSpan {
    let Some((line, column)) = location else {
        return first_line_span(content);
    };
    let line = line.saturating_sub(1);
    let column = column.saturating_sub(1);

    let mut offset = 0;
    for (i, line_content) in content.lines().enumerate() {
        if i == line {
            offset += column;
            break;
        }
        offset += line_content.len() + 1;
    }

    let offset = offset.min(content.len());
    let rest = &content[offset..];
    let len = rest.find('\n').unwrap_or(rest.len()).max(1);
    (offset, len).into()
}

/// Span for a JSON pointer such as `/characteristics/0/curve/axes`
fn find_path_span(content: &str, json_path: &str) -> SourceSpan {
    let parts: Vec<&str> = json_path.split('/').filter(|s| !s.is_empty()).collect();

    // Innermost named component; array indices have no key of their own
    let key = parts.iter().rev().find(|p| p.parse::<usize>().is_err());
    match key.and_then(|k| find_key_span(content, k)) {
        Some(span) => span,
        None => first_line_span(content),
    }
}

/// Span of `key:` (YAML) or `"key":` (JSON) at the start of a line
fn find_key_span(content: &str, key: &str) -> Option<SourceSpan> {
    let yaml_key = format!("{}:", key);
    let json_key = format!("\"{}\"", key);

    let mut offset = 0;
    for line in content.lines() {
        let trimmed = line.trim_start().trim_start_matches("- ");
        if trimmed.starts_with(&yaml_key) || trimmed.starts_with(&json_key) {
            let indent = line.len() - trimmed.len();
            return Some((offset + indent, trimmed.len()).into());
        }
        offset += line.len() + 1;
    }
    None
}
