//! Command handlers.
//!
//! Handlers take the [`CliContext`](crate::CliContext), do the terminal I/O
//! and delegate the work to the library crates.

pub mod ping;
pub mod say;
