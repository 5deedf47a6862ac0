//! # chansync-cli
//!
//! Argument parsing and config loading for the `chansync` binary.

pub mod cli;
pub mod config;

pub use cli::{Cli, Commands};
pub use config::SyncConfig;
