//! CLI module for shopmcp - command-line interface and subcommands.
//!
//! `serve` runs the tool server; everything else is a client session that
//! spawns (or embeds) one.

pub mod commands;
pub mod session;

pub use commands::Cli;
