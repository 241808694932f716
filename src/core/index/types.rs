//! Index type definitions

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entities::device::DeviceClass;

/// Device metadata as stored in the index (no curve data)
#[derive(Debug, Clone, Serialize)]
pub struct IndexedDevice {
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    pub part_number: String,
    pub class: String,
    pub housing: Option<String>,
    pub v_abs_max: f64,
    pub i_abs_max: f64,
    /// Characteristic kinds present, sorted
    pub kinds: Vec<String>,
    pub author: Option<String>,
    pub created: DateTime<Utc>,
    /// Path relative to the project root
    pub file_path: PathBuf,
}

/// Filter for listing devices
#[derive(Debug, Default, Clone)]
pub struct DeviceFilter {
    pub class: Option<DeviceClass>,
    /// Case-insensitive manufacturer match
    pub manufacturer: Option<String>,
    /// Only devices carrying this characteristic kind
    pub kind: Option<String>,
    /// Substring of name, part number or id
    pub search: Option<String>,
    pub limit: Option<usize>,
}

/// Result of a sync or rebuild
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub files_scanned: usize,
    pub devices_added: usize,
    pub devices_updated: usize,
    pub devices_removed: usize,
    /// Files that failed to parse or validate
    pub files_invalid: usize,
    pub duration_ms: u64,
}

/// Count of rows in one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub group: String,
    pub count: usize,
}

/// Index statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct IndexStats {
    pub total_devices: usize,
    pub by_class: Vec<GroupCount>,
    pub by_manufacturer: Vec<GroupCount>,
    pub db_size_bytes: u64,
}
