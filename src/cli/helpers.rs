//! Shared helper functions for CLI commands

use miette::{IntoDiagnostic, Result};

use crate::cli::GlobalOpts;
use crate::core::cache::DeviceCache;
use crate::core::config::Config;
use crate::core::project::Project;
use crate::core::store::FileDeviceStore;
use crate::entities::device::DeviceRecord;
use crate::entities::working_point::WorkingPoint;

/// Project, configuration and device store for a command
pub struct Workspace {
    pub project: Project,
    pub config: Config,
    pub store: FileDeviceStore,
}

impl Workspace {
    /// Discover the project (or use `--project`) and load its configuration
    pub fn open(global: &GlobalOpts) -> Result<Self> {
        let project = match &global.project {
            Some(path) => Project::discover_from(path)?,
            None => Project::discover()?,
        };
        let config = Config::load_for(Some(&project));
        let dir = config.device_dir(&project);
        log::debug!("device directory {}", dir.display());
        Ok(Self {
            store: FileDeviceStore::new(dir),
            project,
            config,
        })
    }

    /// Cache over this workspace's store, sized from the configuration
    pub fn cache(&self) -> DeviceCache<FileDeviceStore> {
        DeviceCache::new(self.store.clone(), self.config.cache_capacity())
    }

    pub fn load(&self, identifier: &str) -> Result<std::sync::Arc<DeviceRecord>> {
        Ok(self.cache().get(identifier)?)
    }
}

/// Build a working point from `--quickstart` and an optional `--point`
///
/// Values given in `--point` override the quickstart defaults.
pub fn working_point(
    device: &DeviceRecord,
    point: Option<&str>,
    quickstart: bool,
) -> Result<WorkingPoint> {
    let mut wp = if quickstart {
        WorkingPoint::quickstart(device)
    } else {
        WorkingPoint::new()
    };
    if let Some(text) = point {
        let given: WorkingPoint = text.parse()?;
        for (variable, value) in given.entries() {
            wp.set(variable, value);
        }
    }
    Ok(wp)
}

/// Format a string ID for display, truncating if too long
pub fn format_short_id_str(id: &str) -> String {
    if id.len() > 16 {
        format!("{}...", &id[..13])
    } else {
        id.to_string()
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Escape a string for CSV output
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Compact numeric display: four significant digits, scientific outside 1e-3..1e6
pub fn format_value(value: f64) -> String {
    let magnitude = value.abs();
    if value == 0.0 {
        "0".to_string()
    } else if !(1e-3..1e6).contains(&magnitude) {
        format!("{:.3e}", value)
    } else {
        let decimals = (3 - magnitude.log10().floor() as i32).max(0) as usize;
        let text = format!("{:.*}", decimals, value);
        if text.contains('.') {
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            text
        }
    }
}

/// Write text to a file or stdout
pub fn write_output(path: Option<&std::path::Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, text).into_diagnostic(),
        None => {
            print!("{}", text);
            Ok(())
        }
    }
}
