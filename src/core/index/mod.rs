//! SQLite-backed device index for fast listing and search
//!
//! The index keeps device metadata (identity, class, ratings, available
//! characteristic kinds) so listing a large library does not parse every
//! curve. It is rebuilt from the device files at any time and syncs itself
//! incrementally on open: files whose mtime changed are re-hashed and only
//! re-parsed when their content differs.
//!
//! The index lives in `.tdb/index.db` and is never the source of truth.

mod queries;
mod schema;
mod sync;
mod types;

pub use types::*;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use miette::{IntoDiagnostic, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::core::project::Project;
use crate::core::store::is_device_file;

/// Current schema version - index is rebuilt on version mismatch
const SCHEMA_VERSION: i32 = 1;

/// The device index backed by SQLite
pub struct DeviceIndex {
    conn: Connection,
    project_root: PathBuf,
    device_dir: PathBuf,
    db_path: PathBuf,
}

impl DeviceIndex {
    /// Open or create the index for a project and bring it up to date
    pub fn open(project: &Project, device_dir: &Path) -> Result<Self> {
        let mut index = Self::open_without_sync(project, device_dir)?;
        index.auto_sync()?;
        Ok(index)
    }

    /// Open the index without scanning the device directory
    pub fn open_without_sync(project: &Project, device_dir: &Path) -> Result<Self> {
        let db_path = project.index_path();
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).into_diagnostic()?;
        }

        let needs_init = !db_path.exists();
        let conn = Connection::open(&db_path).into_diagnostic()?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .into_diagnostic()?;

        let mut index = Self {
            conn,
            project_root: project.root().to_path_buf(),
            device_dir: device_dir.to_path_buf(),
            db_path,
        };

        if needs_init {
            index.init_schema()?;
        } else if index.needs_schema_rebuild() {
            log::info!("device index schema changed, rebuilding");
            index.reinitialize_schema()?;
        }

        Ok(index)
    }

    /// Sync only if some device file is newer than the index or files vanished
    fn auto_sync(&mut self) -> Result<()> {
        let cached_max_mtime: Option<i64> = self
            .conn
            .query_row("SELECT MAX(file_mtime) FROM devices", [], |row| row.get(0))
            .optional()
            .into_diagnostic()?
            .flatten();

        let cached_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))
            .into_diagnostic()?;

        let files = self.device_files();
        let mut newer = false;
        for path in &files {
            if get_file_mtime(path)? > cached_max_mtime.unwrap_or(i64::MIN) {
                newer = true;
                break;
            }
        }

        if newer || files.len() as i64 != cached_count {
            let stats = self.sync()?;
            log::debug!(
                "index sync: {} added, {} updated, {} removed",
                stats.devices_added,
                stats.devices_updated,
                stats.devices_removed
            );
        }
        Ok(())
    }

    /// Device files below the configured directory
    fn device_files(&self) -> Vec<PathBuf> {
        if !self.device_dir.exists() {
            return Vec::new();
        }
        walkdir::WalkDir::new(&self.device_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .filter(|p| is_device_file(p))
            .collect()
    }

    fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.project_root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }

    /// Absolute path of an indexed file
    pub fn absolute_path(&self, file_path: &Path) -> PathBuf {
        if file_path.is_absolute() {
            file_path.to_path_buf()
        } else {
            self.project_root.join(file_path)
        }
    }

    /// Size of the database file
    fn db_size(&self) -> u64 {
        fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0)
    }
}

/// File modification time in nanoseconds since the Unix epoch
fn get_file_mtime(path: &Path) -> Result<i64> {
    let metadata = fs::metadata(path).into_diagnostic()?;
    let mtime = metadata
        .modified()
        .into_diagnostic()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    Ok(mtime)
}

/// Parse datetime string to DateTime<Utc>
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
