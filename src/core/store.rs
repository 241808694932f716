//! Device storage
//!
//! [`DeviceStore`] is the load/save boundary of the toolkit. The resolver
//! only ever sees validated [`DeviceRecord`]s; how they are persisted is up
//! to the store. [`FileDeviceStore`] keeps one `*.tdb.yaml` or `*.tdb.json`
//! file per device in a directory.

use miette::Diagnostic;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::identity::DeviceId;
use crate::entities::device::DeviceRecord;
use crate::yaml::{self, DocumentError, DocumentFormat};

/// Suffix of YAML device files
pub const YAML_SUFFIX: &str = ".tdb.yaml";

/// Suffix of JSON device files
pub const JSON_SUFFIX: &str = ".tdb.json";

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("no device matches '{identifier}' in {dir:?}")]
    #[diagnostic(
        code(tdb::store::not_found),
        help("use a device id (or id prefix), name or part number; 'tdb device list' shows all")
    )]
    NotFound { identifier: String, dir: PathBuf },

    #[error("'{identifier}' matches several devices: {matches}")]
    #[diagnostic(code(tdb::store::ambiguous), help("use a longer id prefix"))]
    Ambiguous { identifier: String, matches: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Document(#[from] DocumentError),

    #[error("cannot write {path:?}: {source}")]
    #[diagnostic(code(tdb::store::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize device {id}: {message}")]
    #[diagnostic(code(tdb::store::serialize))]
    Serialize { id: String, message: String },
}

/// Load/save boundary for device records
pub trait DeviceStore {
    /// Load a device by identifier (id, id prefix, name or part number)
    fn load(&self, identifier: &str) -> Result<DeviceRecord, StoreError>;

    /// Persist a device, replacing any earlier version with the same id
    fn save(&self, device: &DeviceRecord) -> Result<(), StoreError>;

    /// Every readable device; unreadable entries are skipped
    fn list(&self) -> Result<Vec<DeviceRecord>, StoreError>;

    /// Content hash of the stored form, used for cache invalidation.
    /// Stores that cannot detect changes return `None`.
    fn fingerprint(&self, _identifier: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }
}

/// True if `path` names a device file
pub fn is_device_file(path: &Path) -> bool {
    let name = path.to_string_lossy();
    name.ends_with(YAML_SUFFIX) || name.ends_with(JSON_SUFFIX)
}

/// Device id encoded in a device file name, if any
pub fn id_from_path(path: &Path) -> Option<DeviceId> {
    let name = path.file_name()?.to_str()?;
    let stem = name
        .strip_suffix(YAML_SUFFIX)
        .or_else(|| name.strip_suffix(JSON_SUFFIX))?;
    stem.parse().ok()
}

/// SHA-256 of a file's bytes, hex encoded
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// A directory of device files
#[derive(Debug, Clone)]
pub struct FileDeviceStore {
    dir: PathBuf,
}

impl FileDeviceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All device files below the store directory, sorted by path
    pub fn device_files(&self) -> Vec<PathBuf> {
        if !self.dir.exists() {
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&self.dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .filter(|p| is_device_file(p))
            .collect();
        files.sort();
        files
    }

    /// Parse one device file
    pub fn read(&self, path: &Path) -> Result<DeviceRecord, StoreError> {
        Ok(yaml::parse_file::<DeviceRecord>(path)?)
    }

    /// Parse every device file, keeping failures next to their path
    pub fn scan(&self) -> Vec<(PathBuf, Result<DeviceRecord, StoreError>)> {
        self.device_files()
            .into_iter()
            .map(|path| {
                let result = self.read(&path);
                (path, result)
            })
            .collect()
    }

    /// Find the file holding the device named by `identifier`
    pub fn locate(&self, identifier: &str) -> Result<PathBuf, StoreError> {
        let identifier = identifier.trim();

        let direct = Path::new(identifier);
        if is_device_file(direct) && direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        let files = self.device_files();

        let by_id: Vec<&PathBuf> = files
            .iter()
            .filter(|p| id_from_path(p).is_some_and(|id| id.matches_prefix(identifier)))
            .collect();
        if !by_id.is_empty() {
            return self.single(identifier, by_id);
        }

        let by_name: Vec<&PathBuf> = files
            .iter()
            .filter(|p| match self.read(p) {
                Ok(dev) => {
                    dev.name().eq_ignore_ascii_case(identifier)
                        || dev.part_number().eq_ignore_ascii_case(identifier)
                        || dev.id().matches_prefix(identifier)
                }
                Err(e) => {
                    log::warn!("skipping {}: {}", p.display(), e);
                    false
                }
            })
            .collect();
        self.single(identifier, by_name)
    }

    fn single(&self, identifier: &str, matches: Vec<&PathBuf>) -> Result<PathBuf, StoreError> {
        match matches.as_slice() {
            [] => Err(StoreError::NotFound {
                identifier: identifier.to_string(),
                dir: self.dir.clone(),
            }),
            [only] => Ok((*only).clone()),
            many => Err(StoreError::Ambiguous {
                identifier: identifier.to_string(),
                matches: many
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// Where a device is (or would be) stored
    pub fn path_for(&self, id: &DeviceId) -> PathBuf {
        let json = self.dir.join(format!("{}{}", id, JSON_SUFFIX));
        if json.exists() {
            json
        } else {
            self.dir.join(format!("{}{}", id, YAML_SUFFIX))
        }
    }

    fn io_error(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl DeviceStore for FileDeviceStore {
    fn load(&self, identifier: &str) -> Result<DeviceRecord, StoreError> {
        let path = self.locate(identifier)?;
        log::debug!("loading {}", path.display());
        self.read(&path)
    }

    fn save(&self, device: &DeviceRecord) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;

        let path = self.path_for(device.id());
        let serialized = match yaml::format_of(&path) {
            DocumentFormat::Json => serde_json::to_string_pretty(device)
                .map(|s| s + "\n")
                .map_err(|e| e.to_string()),
            DocumentFormat::Yaml => serde_yml::to_string(device).map_err(|e| e.to_string()),
        }
        .map_err(|message| StoreError::Serialize {
            id: device.id().to_string(),
            message,
        })?;

        std::fs::write(&path, serialized).map_err(|e| Self::io_error(&path, e))?;
        log::info!("saved {} to {}", device.id(), path.display());
        Ok(())
    }

    fn list(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        let mut devices = Vec::new();
        for (path, result) in self.scan() {
            match result {
                Ok(dev) => devices.push(dev),
                Err(e) => log::warn!("skipping {}: {}", path.display(), e),
            }
        }
        devices.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(b.id())));
        Ok(devices)
    }

    fn fingerprint(&self, identifier: &str) -> Result<Option<String>, StoreError> {
        let path = self.locate(identifier)?;
        let hash = hash_file(&path).map_err(|source| {
            StoreError::Document(DocumentError::Io {
                path: path.clone(),
                source,
            })
        })?;
        Ok(Some(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::characteristic::{CharacteristicKind, CharacteristicRecord, Conditions};
    use crate::entities::curve::{Axis, CurveSet, Variable};
    use crate::entities::device::{DeviceBuilder, DeviceClass, Ratings};
    use tempfile::tempdir;

    fn device(name: &str, part: &str) -> DeviceRecord {
        let curve = CurveSet::dense(
            vec![Axis::with_default_unit(Variable::Current, vec![0.0, 10.0]).unwrap()],
            vec![0.1, 0.2],
        )
        .unwrap();
        DeviceBuilder::new(name, "Wolfspeed", part, DeviceClass::Mosfet, Ratings::new(650.0, 37.0))
            .characteristic(
                CharacteristicRecord::new(
                    CharacteristicKind::ChannelResistance,
                    Conditions::new(),
                    "Ω",
                    curve,
                )
                .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_save_and_load_by_id() {
        let dir = tempdir().unwrap();
        let store = FileDeviceStore::new(dir.path().join("devices"));
        let dev = device("C3M0060065K", "C3M0060065K");
        store.save(&dev).unwrap();

        let path = store.path_for(dev.id());
        assert!(path.to_string_lossy().ends_with(YAML_SUFFIX));
        assert_eq!(id_from_path(&path), Some(*dev.id()));

        let loaded = store.load(&dev.id().to_string()).unwrap();
        assert_eq!(loaded, dev);
    }

    #[test]
    fn test_load_by_prefix_name_and_part_number() {
        let dir = tempdir().unwrap();
        let store = FileDeviceStore::new(dir.path());
        let dev = device("SiC 650V 60mOhm", "C3M0060065K");
        store.save(&dev).unwrap();

        let prefix = &dev.id().to_string()[..12];
        assert_eq!(store.load(prefix).unwrap().id(), dev.id());
        assert_eq!(store.load("sic 650v 60mohm").unwrap().id(), dev.id());
        assert_eq!(store.load("c3m0060065k").unwrap().id(), dev.id());
    }

    #[test]
    fn test_not_found_and_ambiguous() {
        let dir = tempdir().unwrap();
        let store = FileDeviceStore::new(dir.path());
        store.save(&device("A", "SAME")).unwrap();
        store.save(&device("B", "SAME")).unwrap();

        assert!(matches!(store.load("nothing"), Err(StoreError::NotFound { .. })));
        assert!(matches!(store.load("same"), Err(StoreError::Ambiguous { .. })));
    }

    #[test]
    fn test_json_files_are_read_and_kept_as_json() {
        let dir = tempdir().unwrap();
        let store = FileDeviceStore::new(dir.path());
        let dev = device("J", "J1");
        let path = dir.path().join(format!("{}{}", dev.id(), JSON_SUFFIX));
        std::fs::write(&path, serde_json::to_string(&dev).unwrap()).unwrap();

        assert_eq!(store.load("J1").unwrap(), dev);
        store.save(&dev.touched()).unwrap();
        assert_eq!(store.path_for(dev.id()), path);
        assert_eq!(store.device_files().len(), 1);
    }

    #[test]
    fn test_list_skips_broken_files() {
        let dir = tempdir().unwrap();
        let store = FileDeviceStore::new(dir.path());
        store.save(&device("B", "B1")).unwrap();
        store.save(&device("A", "A1")).unwrap();
        std::fs::write(dir.path().join("broken.tdb.yaml"), "name: [").unwrap();

        let names: Vec<String> = store
            .list()
            .unwrap()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(store.scan().iter().filter(|(_, r)| r.is_err()).count(), 1);
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let dir = tempdir().unwrap();
        let store = FileDeviceStore::new(dir.path());
        let dev = device("F", "F1");
        store.save(&dev).unwrap();

        let id = dev.id().to_string();
        let before = store.fingerprint(&id).unwrap().unwrap();
        assert_eq!(before.len(), 64);
        assert_eq!(store.fingerprint(&id).unwrap().unwrap(), before);

        store.save(&dev.touched()).unwrap();
        assert_ne!(store.fingerprint(&id).unwrap().unwrap(), before);
    }

    #[test]
    fn test_empty_or_missing_dir() {
        let store = FileDeviceStore::new("/nonexistent/devices");
        assert!(store.device_files().is_empty());
        assert!(store.list().unwrap().is_empty());
    }
}
