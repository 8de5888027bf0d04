//! CLI module for the countdown widget.
//!
//! This module provides the command-line interface:
//! - `commands`: Command definitions using clap derive
//! - `client`: IPC client for daemon communication
//! - `display`: Tick rendering and report output

pub mod client;
pub mod commands;
pub mod display;

pub use client::IpcClient;
pub use commands::{ApplyArgs, Cli, Commands, CountdownArgs, RunArgs};
pub use display::Display;
