//! Daemon module for the countdown widget renderer.
//!
//! This module contains the core daemon functionality:
//! - `timer`: Countdown state machine and its scheduled engine
//! - `widget`: Translation of host settings pushes into engine calls
//! - `ipc`: Unix socket server and request dispatch
//!
//! `run` ties them together: it starts the countdown with an initial
//! configuration, renders every tick through the supplied callback and serves
//! IPC requests until Ctrl-C.

pub mod ipc;
pub mod timer;
pub mod widget;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UnixStream;
use tokio::sync::Mutex;

use crate::types::{CountdownConfig, CountdownState, IpcResponse};

pub use ipc::{default_socket_path, IpcServer, RequestHandler};
pub use timer::{forward_to, Countdown, CountdownEngine};
pub use widget::CountdownWidget;

/// Runs the daemon until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the socket cannot be bound or the initial countdown
/// cannot be started.
pub async fn run<F>(socket_path: &Path, config: CountdownConfig, on_tick: F) -> Result<()>
where
    F: Fn(CountdownState) -> anyhow::Result<()> + Send + Sync + 'static,
{
    run_until(socket_path, config, on_tick, shutdown_signal()).await
}

/// Runs the daemon until `shutdown` completes.
///
/// # Errors
///
/// Returns an error if the socket cannot be bound or the initial countdown
/// cannot be started.
pub async fn run_until<F, S>(
    socket_path: &Path,
    config: CountdownConfig,
    on_tick: F,
    shutdown: S,
) -> Result<()>
where
    F: Fn(CountdownState) -> anyhow::Result<()> + Send + Sync + 'static,
    S: Future<Output = ()>,
{
    let server = IpcServer::new(socket_path)?;

    let mut widget = CountdownWidget::new(on_tick);
    widget
        .start(config)
        .context("カウントダウンを開始できませんでした")?;
    let widget = Arc::new(Mutex::new(widget));
    let handler = RequestHandler::new(Arc::clone(&widget));

    tracing::info!(socket = %socket_path.display(), "Daemon listening");

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = server.accept() => match accepted {
                Ok(stream) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(&handler, stream).await {
                            let message = format!("{e:#}");
                            tracing::warn!(error = %message, "IPC request failed");
                        }
                    });
                }
                Err(e) => {
                    let message = format!("{e:#}");
                    tracing::warn!(error = %message, "Failed to accept IPC connection");
                }
            },
            () = &mut shutdown => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    widget.lock().await.stop();
    Ok(())
}

/// Serves one request-response exchange.
async fn serve_connection(handler: &RequestHandler, mut stream: UnixStream) -> Result<()> {
    let request = match IpcServer::receive_request(&mut stream).await {
        Ok(request) => request,
        Err(e) => {
            let response = IpcResponse::error(format!("リクエストが不正です: {e:#}"));
            // Best effort: the client may already be gone.
            let _ = IpcServer::send_response(&mut stream, &response).await;
            return Err(e);
        }
    };

    let response = handler.handle(request).await;
    IpcServer::send_response(&mut stream, &response).await
}

/// Completes on Ctrl-C.
///
/// Never completes if the signal handler cannot be installed.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
