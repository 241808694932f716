//! Index query methods

use std::path::PathBuf;

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, DeviceFilter, DeviceIndex, GroupCount, IndexStats, IndexedDevice};

const DEVICE_COLUMNS: &str = "d.id, d.name, d.manufacturer, d.part_number, d.class, d.housing, \
     d.v_abs_max, d.i_abs_max, d.author, d.created, d.file_path, \
     (SELECT GROUP_CONCAT(kind, ',') FROM (SELECT kind FROM device_kinds k \
      WHERE k.device_id = d.id ORDER BY kind))";

fn device_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IndexedDevice> {
    let kinds: Option<String> = row.get(11)?;
    Ok(IndexedDevice {
        id: row.get(0)?,
        name: row.get(1)?,
        manufacturer: row.get(2)?,
        part_number: row.get(3)?,
        class: row.get(4)?,
        housing: row.get(5)?,
        v_abs_max: row.get(6)?,
        i_abs_max: row.get(7)?,
        author: row.get(8)?,
        created: parse_datetime(row.get::<_, String>(9)?),
        file_path: PathBuf::from(row.get::<_, String>(10)?),
        kinds: kinds
            .map(|s| {
                s.split(',')
                    .filter(|k| !k.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

impl DeviceIndex {
    /// Get one device by full id
    pub fn get(&self, id: &str) -> Option<IndexedDevice> {
        let sql = format!("SELECT {} FROM devices d WHERE d.id = ?1", DEVICE_COLUMNS);
        self.conn
            .query_row(&sql, params![id], device_from_row)
            .optional()
            .ok()
            .flatten()
    }

    /// List devices with filters, sorted by name
    pub fn list(&self, filter: &DeviceFilter) -> Vec<IndexedDevice> {
        let mut sql = format!("SELECT {} FROM devices d WHERE 1=1", DEVICE_COLUMNS);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![];

        if let Some(class) = filter.class {
            sql.push_str(" AND d.class = ?");
            params_vec.push(Box::new(class.to_string()));
        }

        if let Some(ref manufacturer) = filter.manufacturer {
            sql.push_str(" AND d.manufacturer = ? COLLATE NOCASE");
            params_vec.push(Box::new(manufacturer.clone()));
        }

        if let Some(ref kind) = filter.kind {
            sql.push_str(" AND EXISTS (SELECT 1 FROM device_kinds k WHERE k.device_id = d.id AND k.kind = ?)");
            params_vec.push(Box::new(kind.clone()));
        }

        if let Some(ref search) = filter.search {
            sql.push_str(" AND (d.name LIKE ? OR d.part_number LIKE ? OR d.id LIKE ?)");
            let pattern = format!("%{}%", search);
            params_vec.push(Box::new(pattern.clone()));
            params_vec.push(Box::new(pattern.clone()));
            params_vec.push(Box::new(pattern));
        }

        sql.push_str(" ORDER BY d.name COLLATE NOCASE, d.id");

        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = match self.conn.prepare(&sql) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("device index query failed: {}", e);
                return vec![];
            }
        };

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let rows = match stmt.query_map(params_refs.as_slice(), device_from_row) {
            Ok(r) => r,
            Err(_) => return vec![],
        };

        rows.filter_map(|r| r.ok()).collect()
    }

    fn group_counts(&self, column: &str) -> Vec<GroupCount> {
        let sql = format!(
            "SELECT {col}, COUNT(*) AS cnt FROM devices GROUP BY {col} ORDER BY cnt DESC, {col}",
            col = column
        );
        let mut stmt = match self.conn.prepare(&sql) {
            Ok(s) => s,
            Err(_) => return vec![],
        };

        let rows = match stmt.query_map([], |row| {
            Ok(GroupCount {
                group: row.get(0)?,
                count: row.get::<_, i64>(1)? as usize,
            })
        }) {
            Ok(r) => r,
            Err(_) => return vec![],
        };

        rows.filter_map(|r| r.ok()).collect()
    }

    /// Totals per class and manufacturer
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_devices: self
                .conn
                .query_row("SELECT COUNT(*) FROM devices", [], |row| row.get::<_, i64>(0))
                .unwrap_or(0) as usize,
            by_class: self.group_counts("class"),
            by_manufacturer: self.group_counts("manufacturer"),
            db_size_bytes: self.db_size(),
        }
    }
}
