//! `mediaforge-worker` library crate.
//!
//! Command-line parsing and command handlers live here so they can be
//! tested; the binary entrypoint is `main.rs`.

pub mod cli;
pub mod commands;
pub mod history;
