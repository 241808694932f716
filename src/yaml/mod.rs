//! Reading device documents (YAML or JSON) with located diagnostics

pub mod diagnostics;

pub use diagnostics::{DocumentError, DocumentFormat, SyntaxError};

use serde::de::DeserializeOwned;
use std::path::Path;

/// Format implied by a file name (`.json` is JSON, anything else YAML)
pub fn format_of(path: &Path) -> DocumentFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
        _ => DocumentFormat::Yaml,
    }
}

/// Parse a document from a string
pub fn parse_str<T: DeserializeOwned + 'static>(
    source: &str,
    filename: &str,
    format: DocumentFormat,
) -> Result<T, SyntaxError> {
    match format {
        DocumentFormat::Yaml => serde_yml::from_str(source)
            .map_err(|e| SyntaxError::from_yaml_error(&e, source, filename)),
        DocumentFormat::Json => serde_json::from_str(source)
            .map_err(|e| SyntaxError::from_json_error(&e, source, filename)),
    }
}

/// Read and parse a document file
pub fn parse_file<T: DeserializeOwned + 'static>(path: &Path) -> Result<T, DocumentError> {
    let source = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let filename = path.to_string_lossy();
    Ok(parse_str(&source, &filename, format_of(path))?)
}
