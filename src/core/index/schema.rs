//! Database schema initialization

use miette::{IntoDiagnostic, Result};
use rusqlite::params;

use super::{DeviceIndex, SCHEMA_VERSION};

impl DeviceIndex {
    /// Initialize database schema
    pub(super) fn init_schema(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Device metadata
            CREATE TABLE IF NOT EXISTS devices (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                manufacturer TEXT NOT NULL,
                part_number TEXT NOT NULL,
                class TEXT NOT NULL,
                housing TEXT,
                v_abs_max REAL NOT NULL,
                i_abs_max REAL NOT NULL,
                author TEXT,
                created TEXT NOT NULL,
                file_path TEXT NOT NULL UNIQUE,
                file_mtime INTEGER NOT NULL,
                file_hash TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_devices_class ON devices(class);
            CREATE INDEX IF NOT EXISTS idx_devices_manufacturer ON devices(manufacturer);
            CREATE INDEX IF NOT EXISTS idx_devices_part_number ON devices(part_number);

            -- Characteristic kinds per device
            CREATE TABLE IF NOT EXISTS device_kinds (
                device_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                records INTEGER NOT NULL,
                PRIMARY KEY (device_id, kind),
                FOREIGN KEY (device_id) REFERENCES devices(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_device_kinds_kind ON device_kinds(kind);
            "#,
            )
            .into_diagnostic()?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .into_diagnostic()?;

        Ok(())
    }

    /// Drop all tables and reinitialize schema, then rebuild
    pub(super) fn reinitialize_schema(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                DROP TABLE IF EXISTS schema_version;
                DROP TABLE IF EXISTS device_kinds;
                DROP TABLE IF EXISTS devices;
                "#,
            )
            .into_diagnostic()?;

        self.init_schema()?;
        self.rebuild()?;
        Ok(())
    }

    /// Check if schema version matches current version
    pub(super) fn needs_schema_rebuild(&self) -> bool {
        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);
        current != SCHEMA_VERSION
    }
}
