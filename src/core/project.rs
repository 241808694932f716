//! Project discovery and structure

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Marker directory of a device database project
pub const PROJECT_DIR: &str = ".tdb";

/// Default directory holding device files
pub const DEVICE_DIR: &str = "devices";

/// A device database project on disk
#[derive(Debug, Clone)]
pub struct Project {
    /// Root directory of the project (parent of .tdb/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current =
            std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project at `path`; with `force`, re-initialize an existing one
    pub fn init(path: &Path, force: bool) -> Result<Self, ProjectError> {
        std::fs::create_dir_all(path).map_err(|e| ProjectError::IoError(e.to_string()))?;
        let root = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());

        let tdb_dir = root.join(PROJECT_DIR);
        if tdb_dir.exists() && !force {
            return Err(ProjectError::AlreadyExists(root));
        }

        std::fs::create_dir_all(tdb_dir.join("templates"))
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(tdb_dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::create_dir_all(root.join(DEVICE_DIR))
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        log::info!("initialized device database at {}", root.display());
        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# Transistor database configuration

# Directory holding *.tdb.yaml / *.tdb.json device files, relative to the project root
# device_dir: devices

# Default export format (json, yaml, csv, template)
# default_format: yaml

# Number of parsed devices kept in memory (0 disables caching)
# cache_capacity: 64

# Directory searched for export templates
# template_dir: .tdb/templates

# Author recorded on imported devices
# author: ""
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .tdb configuration directory
    pub fn tdb_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Path of the SQLite device index
    pub fn index_path(&self) -> PathBuf {
        self.tdb_dir().join("index.db")
    }

    /// Resolve a configured directory against the project root
    pub fn resolve_dir(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.root.join(dir)
        }
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error, Diagnostic)]
pub enum ProjectError {
    #[error("not a device database (searched from {searched_from:?})")]
    #[diagnostic(code(tdb::project::not_found), help("run 'tdb init' to create one"))]
    NotFound { searched_from: PathBuf },

    #[error("device database already exists at {0:?}")]
    #[diagnostic(code(tdb::project::exists), help("use --force to re-initialize"))]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    #[diagnostic(code(tdb::project::io))]
    IoError(String),
}
