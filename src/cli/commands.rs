//! Command definitions for the countdown CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::types::{CountdownConfig, DEFAULT_DELAY_SECONDS, DEFAULT_START_VALUE, DEFAULT_STOP_VALUE};

// ============================================================================
// CLI Structure
// ============================================================================

/// Gameshow countdown widget
#[derive(Parser, Debug)]
#[command(
    name = "gameshow-countdown",
    version,
    about = "Gameshow用カウントダウンウィジェット",
    long_about = "配信オーバーレイ向けのカウントダウンウィジェット。\n\
                  ホストアプリから設定を受け取り、指定間隔でカウントダウンを表示します。",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Daemon socket path (default: ~/.gameshow/countdown.sock)
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a countdown in the foreground
    Run(RunArgs),

    /// Run the widget renderer daemon
    Daemon(CountdownArgs),

    /// Push widget settings to the running daemon
    Apply(ApplyArgs),

    /// Stop the daemon's countdown
    Stop,

    /// Show the daemon's countdown status
    Status,

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Countdown Arguments
// ============================================================================

/// Countdown configuration arguments
#[derive(Args, Debug, Clone)]
pub struct CountdownArgs {
    /// Value the countdown starts from and resets to
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_START_VALUE,
        value_parser = clap::value_parser!(i64).range(0..)
    )]
    pub start: i64,

    /// Value that ends a cycle (must not exceed --start)
    #[arg(long = "stop", default_value_t = DEFAULT_STOP_VALUE, allow_negative_numbers = true)]
    pub stop_at: i64,

    /// Seconds between ticks (> 0)
    #[arg(short, long, default_value_t = DEFAULT_DELAY_SECONDS, value_parser = parse_delay)]
    pub delay: f64,
}

impl Default for CountdownArgs {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_VALUE,
            stop_at: DEFAULT_STOP_VALUE,
            delay: DEFAULT_DELAY_SECONDS,
        }
    }
}

impl CountdownArgs {
    /// Converts the arguments to a countdown configuration.
    pub fn to_config(&self) -> CountdownConfig {
        CountdownConfig::new(self.start, self.stop_at, self.delay)
    }
}

/// Arguments for the run command
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Countdown configuration
    #[command(flatten)]
    pub countdown: CountdownArgs,

    /// Exit after this many completed cycles (runs until Ctrl-C if omitted)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub cycles: Option<u32>,
}

/// Arguments for the apply command
#[derive(Args, Debug, Clone, Default)]
pub struct ApplyArgs {
    /// Countdown configuration
    #[command(flatten)]
    pub countdown: CountdownArgs,

    /// Twitch channel name to pass as app info
    #[arg(long, value_parser = validate_channel_name)]
    pub channel: Option<String>,
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Parses the delay in seconds.
///
/// - Must be a number
/// - Must be finite and greater than zero
fn parse_delay(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("数値で指定してください: {s}"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err("0より大きい秒数で指定してください".to_string());
    }
    Ok(value)
}

/// Validates the channel name.
///
/// - Must not be empty
/// - Must not exceed 25 characters
fn validate_channel_name(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("チャンネル名は空にできません".to_string());
    }
    if s.chars().count() > 25 {
        return Err("チャンネル名は25文字以内にしてください".to_string());
    }
    Ok(s.to_string())
}

// ============================================================================
// Tests
// ============================================================================
