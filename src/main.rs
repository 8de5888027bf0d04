//! Gameshow Countdown CLI
//!
//! Runs the countdown widget either in the foreground (`run`), as a daemon
//! that accepts settings pushes over a Unix socket (`daemon`), or talks to a
//! running daemon (`apply`, `stop`, `status`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tokio::sync::mpsc;

use gameshow_countdown::cli::{Cli, Commands, Display, IpcClient, RunArgs};
use gameshow_countdown::daemon::{self, default_socket_path, forward_to, CountdownEngine};

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// Logs go to stderr so stdout carries only the countdown display.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Run(args)) => {
            run_foreground(&args).await?;
        }
        Some(Commands::Daemon(args)) => {
            let socket_path = resolve_socket_path(cli.socket)?;
            daemon::run(&socket_path, args.to_config(), |state| {
                Display::show_tick(&state).context("表示の出力に失敗しました")
            })
            .await?;
        }
        Some(Commands::Apply(args)) => {
            let response = client(cli.socket)?.apply(&args).await?;
            Display::show_apply_success(&response);
        }
        Some(Commands::Stop) => {
            let response = client(cli.socket)?.stop().await?;
            Display::show_stop_success(&response);
        }
        Some(Commands::Status) => {
            let response = client(cli.socket)?.status().await?;
            Display::show_status(&response);
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// Runs a countdown in this process, printing every tick.
///
/// Returns after `cycles` completed cycles, or on Ctrl-C.
async fn run_foreground(args: &RunArgs) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut engine = CountdownEngine::start(args.countdown.to_config(), forward_to(tx))
        .context("カウントダウンを開始できませんでした")?;

    let shutdown = daemon::shutdown_signal();
    tokio::pin!(shutdown);

    let mut completed = 0;
    loop {
        tokio::select! {
            tick = rx.recv() => {
                let Some(state) = tick else { break };
                Display::show_tick(&state).context("表示の出力に失敗しました")?;

                if state.is_succeeded() {
                    completed += 1;
                    if args.cycles.is_some_and(|cycles| completed >= cycles) {
                        break;
                    }
                }
            }
            () = &mut shutdown => break,
        }
    }

    engine.stop();
    tracing::info!(cycles = completed, "Countdown finished");
    Ok(())
}

/// Returns the `--socket` path or the default one.
fn resolve_socket_path(socket: Option<PathBuf>) -> Result<PathBuf> {
    match socket {
        Some(path) => Ok(path),
        None => default_socket_path(),
    }
}

fn client(socket: Option<PathBuf>) -> Result<IpcClient> {
    Ok(IpcClient::with_socket_path(resolve_socket_path(socket)?))
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
