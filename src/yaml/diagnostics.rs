//! Parse error diagnostics pointing into the offending device file

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::path::PathBuf;
use thiserror::Error;

/// Document format of a device file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentFormat::Yaml => write!(f, "YAML"),
            DocumentFormat::Json => write!(f, "JSON"),
        }
    }
}

/// Syntax or content error with source location
#[derive(Debug, Error, Diagnostic)]
#[error("{format} error: {message}")]
#[diagnostic(code(tdb::document::syntax))]
pub struct SyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("error here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    format: DocumentFormat,

    /// The underlying error message
    message: String,
}

impl SyntaxError {
    /// Create an error from a serde_yml error
    pub fn from_yaml_error(err: &serde_yml::Error, source: &str, filename: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));
        Self::at_location(
            DocumentFormat::Yaml,
            err.to_string(),
            source,
            filename,
            line,
            column,
        )
    }

    /// Create an error from a serde_json error
    pub fn from_json_error(err: &serde_json::Error, source: &str, filename: &str) -> Self {
        let line = err.line().max(1);
        let column = err.column().max(1);
        Self::at_location(
            DocumentFormat::Json,
            err.to_string(),
            source,
            filename,
            line,
            column,
        )
    }

    /// Create an error at a specific location
    pub fn at_location(
        format: DocumentFormat,
        message: impl Into<String>,
        source: &str,
        filename: &str,
        line: usize,
        column: usize,
    ) -> Self {
        let message = message.into();
        let offset = line_col_to_offset(source, line, column);

        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1)),
            help: generate_help(&message),
            format,
            message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }
}

/// Failure to read or parse a device document
#[derive(Debug, Error, Diagnostic)]
pub enum DocumentError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("cannot read {path:?}: {source}")]
    #[diagnostic(code(tdb::document::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convert line/column to byte offset
fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    let mut current_line = 1;

    for (i, ch) in source.char_indices() {
        if current_line == line {
            let mut col = 1;
            for (j, c) in source[i..].char_indices() {
                if col == column {
                    return i + j;
                }
                if c == '\n' {
                    break;
                }
                col += 1;
            }
            return (i + column.saturating_sub(1)).min(source.len().saturating_sub(1));
        }
        if ch == '\n' {
            current_line += 1;
        }
        offset = i;
    }

    offset
}

/// Suggest a fix based on the parser message
fn generate_help(message: &str) -> Option<String> {
    let msg_lower = message.to_lowercase();

    if msg_lower.contains("tab") {
        return Some(
            "YAML requires spaces for indentation, not tabs. Replace tabs with spaces.".to_string(),
        );
    }

    if msg_lower.contains("duplicate key") {
        return Some("Each key can only appear once. Remove or rename the duplicate key.".to_string());
    }

    if msg_lower.contains("trailing comma") {
        return Some("JSON does not allow a comma after the last item.".to_string());
    }

    if msg_lower.contains("strictly increasing") {
        return Some("Sort the axis samples and remove repeated values.".to_string());
    }

    if msg_lower.contains("expected") && msg_lower.contains("values for the axis grid") {
        return Some(
            "Dense 'values' must list one entry per grid node, first axis varying slowest."
                .to_string(),
        );
    }

    if msg_lower.contains("unknown variant") {
        return Some("Check the spelling of kinds, classes and axis variables.".to_string());
    }

    if msg_lower.contains("missing field") {
        return Some("Add the missing field; see 'tdb validate' for the full schema.".to_string());
    }

    if msg_lower.contains("mapping values are not allowed") {
        return Some("You may be missing a space after ':' or have incorrect indentation.".to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_to_offset() {
        let source = "line1\nline2\nline3";
        assert_eq!(line_col_to_offset(source, 1, 1), 0);
        assert_eq!(line_col_to_offset(source, 2, 1), 6);
        assert_eq!(line_col_to_offset(source, 3, 3), 14);
    }

    #[test]
    fn test_help_generation() {
        assert!(generate_help("found tab character").is_some());
        assert!(generate_help("duplicate key").is_some());
        assert!(generate_help("axis 'current' samples must be strictly increasing").is_some());
        assert!(generate_help("some random error").is_none());
    }

    #[test]
    fn test_json_error_location() {
        let source = "{\n  \"a\": 1,\n}";
        let err = serde_json::from_str::<serde_json::Value>(source).unwrap_err();
        let diag = SyntaxError::from_json_error(&err, source, "dev.tdb.json");
        assert_eq!(diag.format(), DocumentFormat::Json);
        assert!(diag.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_yaml_error_message() {
        let source = "name: [unclosed\n";
        let err = serde_yml::from_str::<serde_json::Value>(source).unwrap_err();
        let diag = SyntaxError::from_yaml_error(&err, source, "dev.tdb.yaml");
        assert_eq!(diag.format(), DocumentFormat::Yaml);
        assert!(!diag.message().is_empty());
    }
}
