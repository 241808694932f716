//! TDB: Transistor Database
//!
//! A library and CLI for power semiconductor characteristics kept as plain
//! text device files. Curves digitized from datasheets are interpolated at
//! a working point to yield conduction and switching quantities.
//!
//! - [`entities`]: device records, curves and working points
//! - [`core`]: interpolation, resolution, storage, caching and indexing
//! - [`schema`]: JSON Schema validation of device files
//! - [`export`]: JSON, YAML, CSV and template output of evaluations

pub mod cli;
pub mod core;
pub mod entities;
pub mod export;
pub mod schema;
pub mod yaml;
