//! Gameshow Countdown Library
//!
//! Core of the Gameshow countdown widget: a repeating countdown that ticks
//! from a start value down to a stop value, reports success, and starts over.
//! It includes:
//! - Countdown state machine and its timer-driven engine
//! - Widget layer that applies settings pushed by the host app
//! - IPC server/client for daemon-CLI communication
//! - CLI command parsing and display utilities
//! - Type definitions for configuration, settings and state

pub mod cli;
pub mod daemon;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    AppInfo, CountdownConfig, CountdownError, CountdownPhase, CountdownState, IpcRequest,
    IpcResponse, ResponseData, SettingValue, WidgetSettings,
};

pub use daemon::{Countdown, CountdownEngine, CountdownWidget};
