//! gossip-daemon library: configuration, key files and argument parsing.
//!
//! Kept separate from `main.rs` so tests can reach it.

pub mod config;
pub mod keyfile;
pub mod parse;

pub use config::Config;
pub use keyfile::load_or_create;
pub use parse::{parse_assignment, parse_endpoint};
