//! Configuration management with layered hierarchy
//!
//! Sources are merged in this order, later ones winning:
//! built-in defaults, `~/.config/tdb/config.yaml`, the project's
//! `.tdb/config.yaml`, then `TDB_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::project::{Project, DEVICE_DIR, PROJECT_DIR};

/// Default number of parsed devices kept in memory
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Default export format name
pub const DEFAULT_FORMAT: &str = "yaml";

/// Device database configuration with layered hierarchy
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding device files (relative to the project root)
    pub device_dir: Option<PathBuf>,

    /// Default export format
    pub default_format: Option<String>,

    /// Number of parsed devices kept in memory
    pub cache_capacity: Option<usize>,

    /// Directory searched for export templates
    pub template_dir: Option<PathBuf>,

    /// Author recorded on imported devices
    pub author: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        Self::load_for(Project::discover().ok().as_ref())
    }

    /// Load configuration for a known project (or none)
    pub fn load_for(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        if let Some(project) = project {
            if let Some(local) = Self::read_file(&project.tdb_dir().join("config.yaml")) {
                config.merge(local);
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("ignoring malformed config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Apply `TDB_*` overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("TDB_DEVICE_DIR") {
            self.device_dir = Some(PathBuf::from(dir));
        }
        if let Some(format) = lookup("TDB_FORMAT") {
            self.default_format = Some(format);
        }
        if let Some(capacity) = lookup("TDB_CACHE_CAPACITY") {
            match capacity.trim().parse() {
                Ok(n) => self.cache_capacity = Some(n),
                Err(_) => log::warn!("ignoring TDB_CACHE_CAPACITY={}: not a number", capacity),
            }
        }
        if let Some(author) = lookup("TDB_AUTHOR") {
            self.author = Some(author);
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "tdb")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Config) {
        if other.device_dir.is_some() {
            self.device_dir = other.device_dir;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
        if other.cache_capacity.is_some() {
            self.cache_capacity = other.cache_capacity;
        }
        if other.template_dir.is_some() {
            self.template_dir = other.template_dir;
        }
        if other.author.is_some() {
            self.author = other.author;
        }
    }

    /// Device directory for a project
    pub fn device_dir(&self, project: &Project) -> PathBuf {
        let dir = self
            .device_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEVICE_DIR));
        project.resolve_dir(&dir)
    }

    /// Template directory for a project
    pub fn template_dir(&self, project: &Project) -> PathBuf {
        let dir = self
            .template_dir
            .clone()
            .unwrap_or_else(|| Path::new(PROJECT_DIR).join("templates"));
        project.resolve_dir(&dir)
    }

    pub fn default_format(&self) -> &str {
        self.default_format.as_deref().unwrap_or(DEFAULT_FORMAT)
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY)
    }

    /// Get the author name, falling back to the login name
    pub fn author(&self) -> String {
        if let Some(ref author) = self.author {
            return author.clone();
        }
        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }
}
