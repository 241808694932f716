//! CLI module - argument parsing, logging and command dispatch

pub mod args;
pub mod commands;
pub mod helpers;
pub mod logger;

pub use args::{Cli, Commands, GlobalOpts, OutputFormat};
