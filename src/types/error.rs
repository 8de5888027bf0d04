//! Error types for the countdown engine.

use thiserror::Error;

/// Errors reported synchronously by the countdown engine.
#[derive(Debug, Error)]
pub enum CountdownError {
    /// The configuration (or the host settings it came from) is malformed.
    #[error("設定が不正です: {0}")]
    InvalidConfig(String),

    /// The presentation callback failed while reporting the initial state.
    #[error("表示の更新に失敗しました: {0:#}")]
    TickFailed(anyhow::Error),
}

impl CountdownError {
    /// Creates an `InvalidConfig` error from a message.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns true if this error is an `InvalidConfig`.
    #[must_use]
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Self::InvalidConfig(_))
    }
}

/// Result type alias for countdown operations.
pub type Result<T> = std::result::Result<T, CountdownError>;
