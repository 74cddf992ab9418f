#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings
#[cfg(test)]
use hound as _;
#[cfg(test)]
use tempfile as _;

// Used by the binary only
use dotenvy as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;

// Re-export primary types for convenient access
pub use bootstrap::{CliConfig, CliContext, bootstrap, init_logging};
pub use commands::{Commands, SayArgs};
pub use error::CliError;
pub use parser::Cli;
