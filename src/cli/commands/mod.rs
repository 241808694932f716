//! CLI command implementations

pub mod completions;
pub mod device;
pub mod export;
pub mod index;
pub mod init;
pub mod validate;
pub mod wp;
