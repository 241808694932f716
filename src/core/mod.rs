//! Core module - resolution engine and the storage shell around it

pub mod cache;
pub mod config;
pub mod identity;
pub mod index;
pub mod interpolate;
pub mod project;
pub mod resolve;
pub mod store;

pub use cache::{CacheStats, DeviceCache};
pub use config::Config;
pub use identity::{DeviceId, IdParseError};
pub use index::{DeviceFilter, DeviceIndex, IndexStats, IndexedDevice, SyncStats};
pub use interpolate::{interpolate, InterpolateError, Interpolation};
pub use project::{Project, ProjectError};
pub use resolve::{resolve, ResolveError, Role, WorkingPointResolver};
pub use store::{DeviceStore, FileDeviceStore, StoreError};
