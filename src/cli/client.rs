//! IPC client for talking to the countdown daemon.
//!
//! One request per connection: write the JSON request, shut down the write
//! half, read the JSON response. Only connecting is retried: once a request
//! may have reached the daemon it is never sent again.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::cli::commands::ApplyArgs;
use crate::types::{AppInfo, IpcRequest, IpcResponse, WidgetSettings};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (64KB)
const MAX_RESPONSE_SIZE: u64 = 65536;

/// Maximum retry attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
#[derive(Debug, Clone)]
pub struct IpcClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl IpcClient {
    /// Creates a client for a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Pushes widget settings (and optional channel) to the daemon.
    ///
    /// The configuration is validated locally before anything is sent.
    pub async fn apply(&self, args: &ApplyArgs) -> Result<IpcResponse> {
        let config = args.countdown.to_config();
        config.validate()?;

        let request = IpcRequest::ApplyWidgetSettings {
            widget_settings: Some(WidgetSettings::from(&config)),
            app_info: args.channel.as_deref().map(AppInfo::with_channel),
        };
        self.send_request(&request).await
    }

    /// Sends a stop command to the daemon.
    pub async fn stop(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Stop).await
    }

    /// Sends a status query to the daemon.
    pub async fn status(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Status).await
    }

    /// Sends a request and returns the daemon's success response.
    ///
    /// An error response from the daemon becomes an `Err` carrying its message.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let stream = self.connect_with_retry().await?;
        let response = self.exchange(stream, request).await?;

        if !response.is_success() {
            anyhow::bail!("{}", response.message);
        }
        Ok(response)
    }

    /// Connects to the daemon, retrying with a linearly growing delay.
    async fn connect_with_retry(&self) -> Result<UnixStream> {
        let mut attempt = 1;
        loop {
            match self.connect().await {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt < MAX_RETRIES => {
                    let message = format!("{e:#}");
                    tracing::warn!(attempt, max = MAX_RETRIES, error = %message, "Connect failed");

                    let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn connect(&self) -> Result<UnixStream> {
        timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("接続がタイムアウトしました")?
            .context("Daemonに接続できません。'gameshow-countdown daemon' を起動してください")
    }

    /// Performs one request-response exchange on a connected stream.
    async fn exchange(&self, mut stream: UnixStream, request: &IpcRequest) -> Result<IpcResponse> {
        let io_timeout = Duration::from_secs(IO_TIMEOUT_SECS);

        let request_json =
            serde_json::to_vec(request).context("リクエストのシリアライズに失敗しました")?;

        timeout(io_timeout, stream.write_all(&request_json))
            .await
            .context("書き込みがタイムアウトしました")?
            .context("リクエストの送信に失敗しました")?;

        // Closing the write half marks the end of the request.
        stream
            .shutdown()
            .await
            .context("シャットダウンに失敗しました")?;

        let mut buffer = Vec::new();
        timeout(
            io_timeout,
            (&mut stream).take(MAX_RESPONSE_SIZE).read_to_end(&mut buffer),
        )
        .await
        .context("読み込みがタイムアウトしました")?
        .context("レスポンスの受信に失敗しました")?;

        if buffer.is_empty() {
            anyhow::bail!("Daemonからの応答がありませんでした");
        }

        serde_json::from_slice(&buffer).context("レスポンスのパースに失敗しました")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::CountdownArgs;
    use crate::types::{ResponseData, SettingValue};
    use tokio::net::UnixListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::task::JoinHandle;

    // ------------------------------------------------------------------------
    // Helper functions
    // ------------------------------------------------------------------------

    fn create_temp_socket_path() -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        // Keep the directory so it's not deleted
        std::mem::forget(dir);
        path
    }

    /// Serves one connection: returns the received request and answers with `response`.
    fn spawn_mock_server(socket_path: &Path, response: IpcResponse) -> JoinHandle<IpcRequest> {
        let listener = UnixListener::bind(socket_path).unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            let mut buffer = Vec::new();
            stream.read_to_end(&mut buffer).await.unwrap();
            let request: IpcRequest = serde_json::from_slice(&buffer).unwrap();

            let json = serde_json::to_vec(&response).unwrap();
            stream.write_all(&json).await.unwrap();
            stream.flush().await.unwrap();

            request
        })
    }

    fn counting_data(current: i64) -> ResponseData {
        ResponseData {
            phase: Some("counting".to_string()),
            current: Some(current),
            start_value: Some(10),
            stop_value: Some(0),
            delay_seconds: Some(1.0),
            channel: None,
        }
    }

    // ------------------------------------------------------------------------
    // IpcClient Tests
    // ------------------------------------------------------------------------

    mod client_tests {
        use super::*;

        #[test]
        fn test_with_socket_path() {
            let path = PathBuf::from("/tmp/test.sock");
            let client = IpcClient::with_socket_path(path.clone());
            assert_eq!(client.socket_path(), path.as_path());
        }

        #[tokio::test(start_paused = true)]
        async fn test_connection_failure() {
            let socket_path = create_temp_socket_path();
            let client = IpcClient::with_socket_path(socket_path);

            let result = client.status().await;

            let message = format!("{:#}", result.unwrap_err());
            assert!(message.contains("Daemonに接続できません"));
        }

        #[tokio::test]
        async fn test_send_status_request() {
            let socket_path = create_temp_socket_path();
            let server = spawn_mock_server(
                &socket_path,
                IpcResponse::success("", Some(counting_data(7))),
            );

            let client = IpcClient::with_socket_path(socket_path);
            let response = client.status().await.unwrap();

            assert!(response.is_success());
            assert_eq!(response.data.unwrap().current, Some(7));
            assert!(matches!(server.await.unwrap(), IpcRequest::Status));
        }

        #[tokio::test]
        async fn test_send_stop_request() {
            let socket_path = create_temp_socket_path();
            let server = spawn_mock_server(
                &socket_path,
                IpcResponse::success("カウントダウンを停止しました", None),
            );

            let client = IpcClient::with_socket_path(socket_path);
            let response = client.stop().await.unwrap();

            assert_eq!(response.message, "カウントダウンを停止しました");
            assert!(matches!(server.await.unwrap(), IpcRequest::Stop));
        }

        #[tokio::test]
        async fn test_send_apply_request() {
            let socket_path = create_temp_socket_path();
            let server = spawn_mock_server(
                &socket_path,
                IpcResponse::success("ウィジェット設定を適用しました", Some(counting_data(5))),
            );

            let client = IpcClient::with_socket_path(socket_path);
            let args = ApplyArgs {
                countdown: CountdownArgs {
                    start: 5,
                    stop_at: 1,
                    delay: 0.5,
                },
                channel: Some("streamer".to_string()),
            };
            client.apply(&args).await.unwrap();

            match server.await.unwrap() {
                IpcRequest::ApplyWidgetSettings {
                    widget_settings: Some(settings),
                    app_info: Some(info),
                } => {
                    assert_eq!(settings.start_seconds, SettingValue::from(5));
                    assert_eq!(settings.stop_seconds, SettingValue::from(1));
                    assert_eq!(settings.delay_seconds, SettingValue::from(0.5));
                    assert_eq!(info.twitch_channel_name.as_deref(), Some("streamer"));
                    assert!(!info.has_access_token());
                }
                other => panic!("Expected ApplyWidgetSettings request, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_apply_rejects_invalid_config_locally() {
            let client = IpcClient::with_socket_path(create_temp_socket_path());
            let args = ApplyArgs {
                countdown: CountdownArgs {
                    start: 1,
                    stop_at: 5,
                    delay: 1.0,
                },
                channel: None,
            };

            let result = client.apply(&args).await;

            assert!(result.is_err());
        }

        #[tokio::test]
        async fn test_error_response_is_not_retried() {
            let socket_path = create_temp_socket_path();
            let server = spawn_mock_server(
                &socket_path,
                IpcResponse::error("カウントダウンは実行されていません"),
            );

            let client = IpcClient::with_socket_path(socket_path);
            let result = client.stop().await;

            assert_eq!(
                result.unwrap_err().to_string(),
                "カウントダウンは実行されていません"
            );
            server.await.unwrap();
        }

        #[tokio::test]
        async fn test_request_is_not_resent_after_lost_response() {
            let socket_path = create_temp_socket_path();
            let listener = UnixListener::bind(&socket_path).unwrap();
            let connections = Arc::new(AtomicUsize::new(0));
            let accepted = Arc::clone(&connections);
            tokio::spawn(async move {
                loop {
                    let (mut stream, _) = listener.accept().await.unwrap();
                    accepted.fetch_add(1, Ordering::SeqCst);

                    // Take the request, then hang up without answering.
                    let mut buffer = Vec::new();
                    let _ = stream.read_to_end(&mut buffer).await;
                    drop(stream);
                }
            });

            let client = IpcClient::with_socket_path(socket_path);
            let result = client.stop().await;

            let message = format!("{:#}", result.unwrap_err());
            assert!(message.contains("Daemonからの応答がありませんでした"));
            assert_eq!(connections.load(Ordering::SeqCst), 1);
        }
    }
}
