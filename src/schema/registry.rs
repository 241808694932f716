//! Embedded JSON schemas

use std::collections::HashMap;

use rust_embed::Embed;

#[derive(Embed)]
#[folder = "schemas/"]
struct EmbeddedSchemas;

/// Schema file for device records
pub const DEVICE_SCHEMA: &str = "device.schema.json";

/// Schemas by file name
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, String>,
}

impl SchemaRegistry {
    /// Registry with no schemas; everything validates
    pub fn empty() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.schemas.get(name).map(String::as_str)
    }

    pub fn device(&self) -> Option<&str> {
        self.get(DEVICE_SCHEMA)
    }

    /// Add or replace a schema
    pub fn insert(&mut self, name: impl Into<String>, schema: impl Into<String>) {
        self.schemas.insert(name.into(), schema.into());
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for file in EmbeddedSchemas::iter() {
            let name = file.as_ref();
            if let Some(content) = EmbeddedSchemas::get(name) {
                match std::str::from_utf8(&content.data) {
                    Ok(text) => registry.insert(name, text),
                    Err(e) => log::warn!("embedded schema {} is not UTF-8: {}", name, e),
                }
            }
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_schema_is_embedded() {
        let registry = SchemaRegistry::default();
        let schema = registry.device().unwrap();
        let json: serde_json::Value = serde_json::from_str(schema).unwrap();
        assert_eq!(json["title"], "Device");
    }

    #[test]
    fn test_empty_registry() {
        let registry = SchemaRegistry::empty();
        assert!(registry.device().is_none());
        assert_eq!(registry.names().count(), 0);
    }
}
