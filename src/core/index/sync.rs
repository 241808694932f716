//! Index synchronization with the device directory

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result};
use rusqlite::params;

use super::{get_file_mtime, DeviceIndex, SyncStats};
use crate::core::store::hash_file;
use crate::entities::device::DeviceRecord;
use crate::yaml;

impl DeviceIndex {
    /// Full rebuild of the index from the device files
    pub fn rebuild(&mut self) -> Result<SyncStats> {
        let start = std::time::Instant::now();
        let mut stats = SyncStats::default();

        self.conn
            .execute_batch("DELETE FROM device_kinds; DELETE FROM devices;")
            .into_diagnostic()?;

        for path in self.device_files() {
            stats.files_scanned += 1;
            match self.index_file(&path) {
                Ok(()) => stats.devices_added += 1,
                Err(e) => {
                    log::warn!("not indexing {}: {}", path.display(), e);
                    stats.files_invalid += 1;
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        log::info!(
            "indexed {} of {} device files",
            stats.devices_added,
            stats.files_scanned
        );
        Ok(stats)
    }

    /// Incremental sync - only re-parse changed files
    pub fn sync(&mut self) -> Result<SyncStats> {
        let start = std::time::Instant::now();
        let mut stats = SyncStats::default();

        let mut current: HashMap<String, PathBuf> = HashMap::new();
        for path in self.device_files() {
            current.insert(self.relative_path(&path), path);
            stats.files_scanned += 1;
        }

        let mut cached: HashMap<String, (i64, String)> = HashMap::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT file_path, file_mtime, file_hash FROM devices")
                .into_diagnostic()?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .into_diagnostic()?;
            for row in rows {
                let (path, mtime, hash) = row.into_diagnostic()?;
                cached.insert(path, (mtime, hash));
            }
        }

        for (rel_path, full_path) in &current {
            let needs_update = match cached.get(rel_path) {
                Some((cached_mtime, cached_hash)) => {
                    let mtime = get_file_mtime(full_path)?;
                    if mtime == *cached_mtime {
                        false
                    } else if hash_file(full_path).into_diagnostic()? == *cached_hash {
                        // touched but unchanged
                        self.conn
                            .execute(
                                "UPDATE devices SET file_mtime = ?1 WHERE file_path = ?2",
                                params![mtime, rel_path],
                            )
                            .into_diagnostic()?;
                        false
                    } else {
                        true
                    }
                }
                None => true,
            };

            if !needs_update {
                continue;
            }

            match self.index_file(full_path) {
                Ok(()) if cached.contains_key(rel_path) => stats.devices_updated += 1,
                Ok(()) => stats.devices_added += 1,
                Err(e) => {
                    log::warn!("not indexing {}: {}", full_path.display(), e);
                    stats.files_invalid += 1;
                    self.remove_path(rel_path)?;
                }
            }
        }

        for rel_path in cached.keys() {
            if !current.contains_key(rel_path) {
                self.remove_path(rel_path)?;
                stats.devices_removed += 1;
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        Ok(stats)
    }

    /// Parse, validate and index a single device file
    pub(super) fn index_file(&mut self, path: &Path) -> Result<()> {
        let device: DeviceRecord = yaml::parse_file(path)?;
        let mtime = get_file_mtime(path)?;
        let hash = hash_file(path).into_diagnostic()?;
        let rel_path = self.relative_path(path);
        let id = device.id().to_string();

        let tx = self.conn.transaction().into_diagnostic()?;

        // Same id moved to another file, or another file with this id
        tx.execute(
            "DELETE FROM devices WHERE id = ?1 OR file_path = ?2",
            params![id, rel_path],
        )
        .into_diagnostic()?;

        tx.execute(
            r#"INSERT INTO devices
               (id, name, manufacturer, part_number, class, housing, v_abs_max, i_abs_max,
                author, created, file_path, file_mtime, file_hash)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"#,
            params![
                id,
                device.name(),
                device.manufacturer(),
                device.part_number(),
                device.class().to_string(),
                device.housing(),
                device.ratings().v_abs_max,
                device.ratings().i_abs_max,
                device.author(),
                device.created().to_rfc3339(),
                rel_path,
                mtime,
                hash
            ],
        )
        .into_diagnostic()?;

        for kind in device.available_kinds() {
            let records = device.characteristics_of(kind).count() as i64;
            tx.execute(
                "INSERT INTO device_kinds (device_id, kind, records) VALUES (?1, ?2, ?3)",
                params![id, kind.as_str(), records],
            )
            .into_diagnostic()?;
        }

        tx.commit().into_diagnostic()?;
        Ok(())
    }

    /// Remove whatever device is indexed at a relative path
    fn remove_path(&self, rel_path: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM device_kinds WHERE device_id IN (SELECT id FROM devices WHERE file_path = ?1)",
                params![rel_path],
            )
            .into_diagnostic()?;
        self.conn
            .execute("DELETE FROM devices WHERE file_path = ?1", params![rel_path])
            .into_diagnostic()?;
        Ok(())
    }
}
