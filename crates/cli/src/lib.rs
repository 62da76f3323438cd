//! `shelfwise` admin CLI: argument parsing, service wiring and command
//! execution. `main.rs` only bootstraps logging and prints the result.

pub mod app;
pub mod args;
pub mod commands;
