//! Schema system - JSON Schema validation of device files

pub mod registry;
pub mod validator;

pub use registry::SchemaRegistry;
pub use validator::{FileValidationError, SchemaViolation, ValidationError, Validator};
