//! Core data types for the countdown widget.
//!
//! This module defines the data structures used for:
//! - Countdown configuration with validation
//! - Countdown state and its tick transition
//! - Host-pushed widget settings and their normalization
//! - IPC request/response serialization

mod error;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use error::{CountdownError, Result};

// ============================================================================
// CountdownPhase
// ============================================================================

/// Represents the current phase of the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountdownPhase {
    /// Counting down towards the stop value
    #[default]
    Counting,
    /// The stop value was reached in this tick
    Succeeded,
}

impl CountdownPhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            CountdownPhase::Counting => "counting",
            CountdownPhase::Succeeded => "succeeded",
        }
    }
}

impl fmt::Display for CountdownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CountdownConfig
// ============================================================================

/// Default value the countdown resets to.
pub const DEFAULT_START_VALUE: i64 = 10;

/// Default terminal value of a cycle.
pub const DEFAULT_STOP_VALUE: i64 = 0;

/// Default seconds between ticks.
pub const DEFAULT_DELAY_SECONDS: f64 = 1.0;

/// Configuration for one countdown run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownConfig {
    /// Value the countdown starts from and resets to (>= 0)
    pub start_value: i64,
    /// Value that ends a cycle (<= start_value)
    pub stop_value: i64,
    /// Seconds between ticks (> 0)
    pub delay_seconds: f64,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            start_value: DEFAULT_START_VALUE,
            stop_value: DEFAULT_STOP_VALUE,
            delay_seconds: DEFAULT_DELAY_SECONDS,
        }
    }
}

impl CountdownConfig {
    /// Creates a configuration from its three values.
    pub fn new(start_value: i64, stop_value: i64, delay_seconds: f64) -> Self {
        Self {
            start_value,
            stop_value,
            delay_seconds,
        }
    }

    /// Returns the configuration with the specified start value.
    pub fn with_start_value(mut self, value: i64) -> Self {
        self.start_value = value;
        self
    }

    /// Returns the configuration with the specified stop value.
    pub fn with_stop_value(mut self, value: i64) -> Self {
        self.stop_value = value;
        self
    }

    /// Returns the configuration with the specified delay.
    pub fn with_delay_seconds(mut self, seconds: f64) -> Self {
        self.delay_seconds = seconds;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `CountdownError::InvalidConfig` if the delay is not a positive
    /// representable duration, the start value is negative, or the stop value
    /// cannot be reached by counting down from the start value.
    pub fn validate(&self) -> Result<()> {
        if !self.delay_seconds.is_finite() || self.delay_seconds <= 0.0 {
            return Err(CountdownError::invalid_config(format!(
                "delaySecondsは0より大きい数値で指定してください (指定値: {})",
                self.delay_seconds
            )));
        }
        match Duration::try_from_secs_f64(self.delay_seconds) {
            Ok(delay) if !delay.is_zero() => {}
            _ => {
                return Err(CountdownError::invalid_config(format!(
                    "delaySecondsが範囲外です (指定値: {})",
                    self.delay_seconds
                )));
            }
        }
        if self.start_value < 0 {
            return Err(CountdownError::invalid_config(format!(
                "startSecondsは0以上で指定してください (指定値: {})",
                self.start_value
            )));
        }
        if self.stop_value > self.start_value {
            return Err(CountdownError::invalid_config(format!(
                "stopSeconds ({}) はstartSeconds ({}) 以下で指定してください",
                self.stop_value, self.start_value
            )));
        }
        Ok(())
    }

    /// Returns the delay between ticks.
    ///
    /// Only meaningful for a validated configuration.
    pub fn delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_seconds).unwrap_or_default()
    }
}

// ============================================================================
// CountdownState
// ============================================================================

/// Current countdown value and phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownState {
    /// Currently displayed value
    pub current: i64,
    /// Current phase
    pub phase: CountdownPhase,
}

impl CountdownState {
    /// Creates a state seeded with the start value.
    pub fn new(start_value: i64) -> Self {
        Self {
            current: start_value,
            phase: CountdownPhase::Counting,
        }
    }

    /// Performs one tick transition and returns the state to report.
    ///
    /// The reported state carries the value as it was before the transition:
    /// the stop value with `Succeeded`, or the pre-decrement value with
    /// `Counting`. After a success the stored state is reset to the start
    /// value and is `Counting` again.
    pub fn advance(&mut self, config: &CountdownConfig) -> CountdownState {
        if self.current == config.stop_value {
            self.phase = CountdownPhase::Succeeded;
            let reported = *self;
            self.reset(config);
            reported
        } else {
            self.phase = CountdownPhase::Counting;
            let reported = *self;
            self.current -= 1;
            reported
        }
    }

    /// Resets to the start value of `config` in the `Counting` phase.
    pub fn reset(&mut self, config: &CountdownConfig) {
        self.current = config.start_value;
        self.phase = CountdownPhase::Counting;
    }

    /// Returns true if the stop value was reached.
    pub fn is_succeeded(&self) -> bool {
        self.phase == CountdownPhase::Succeeded
    }
}

// ============================================================================
// Widget Settings
// ============================================================================

const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// A numeric setting as pushed by the host, either a JSON number or the
/// string value of a form input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// JSON number
    Number(f64),
    /// Numeric text
    Text(String),
}

impl SettingValue {
    /// Normalizes the value to a number.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if text does not parse as a number.
    pub fn as_number(&self, field: &str) -> Result<f64> {
        match self {
            SettingValue::Number(n) => Ok(*n),
            SettingValue::Text(text) => text.trim().parse::<f64>().map_err(|_| {
                CountdownError::invalid_config(format!(
                    "{field}は数値で指定してください (指定値: {text:?})"
                ))
            }),
        }
    }

    /// Normalizes the value to a whole number.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the value is not numeric or not an integer
    /// within the `i64` range.
    pub fn as_integer(&self, field: &str) -> Result<i64> {
        if let SettingValue::Text(text) = self {
            if let Ok(n) = text.trim().parse::<i64>() {
                return Ok(n);
            }
        }

        let n = self.as_number(field)?;
        // 2^63 is the first float past i64::MAX, so the upper bound is exclusive.
        if n.is_finite() && n.fract() == 0.0 && n >= -I64_BOUND && n < I64_BOUND {
            Ok(n as i64)
        } else {
            Err(CountdownError::invalid_config(format!(
                "{field}は整数で指定してください (指定値: {n})"
            )))
        }
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Number(value as f64)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Number(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

fn default_start_seconds() -> SettingValue {
    SettingValue::Text(DEFAULT_START_VALUE.to_string())
}

fn default_stop_seconds() -> SettingValue {
    SettingValue::Text(DEFAULT_STOP_VALUE.to_string())
}

fn default_delay_seconds() -> SettingValue {
    SettingValue::Number(DEFAULT_DELAY_SECONDS)
}

/// Rendered size of the settings panel, attached by the panel for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Runtime metadata attached to pushed settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    /// Settings panel geometry
    pub geometry: Geometry,
}

/// Widget settings as pushed by the host app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetSettings {
    /// Start value
    #[serde(rename = "startSeconds", default = "default_start_seconds")]
    pub start_seconds: SettingValue,
    /// Stop value
    #[serde(rename = "stopSeconds", default = "default_stop_seconds")]
    pub stop_seconds: SettingValue,
    /// Delay between ticks in seconds
    #[serde(rename = "delaySeconds", default = "default_delay_seconds")]
    pub delay_seconds: SettingValue,
    /// Runtime metadata (informational only)
    #[serde(rename = "_runtime", default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeInfo>,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            start_seconds: default_start_seconds(),
            stop_seconds: default_stop_seconds(),
            delay_seconds: default_delay_seconds(),
            runtime: None,
        }
    }
}

impl WidgetSettings {
    /// Normalizes the settings into a validated countdown configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if any value is non-numeric or the resulting
    /// configuration fails validation.
    pub fn to_config(&self) -> Result<CountdownConfig> {
        let config = CountdownConfig {
            start_value: self.start_seconds.as_integer("startSeconds")?,
            stop_value: self.stop_seconds.as_integer("stopSeconds")?,
            delay_seconds: self.delay_seconds.as_number("delaySeconds")?,
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<&CountdownConfig> for WidgetSettings {
    fn from(config: &CountdownConfig) -> Self {
        Self {
            start_seconds: config.start_value.into(),
            stop_seconds: config.stop_value.into(),
            delay_seconds: config.delay_seconds.into(),
            runtime: None,
        }
    }
}

// ============================================================================
// AppInfo
// ============================================================================

/// Host app metadata passed alongside widget settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    /// OAuth token granted to the host app (opaque, never logged)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_access_token: Option<String>,
    /// Twitch channel the host app is authorized for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitch_channel_name: Option<String>,
}

impl AppInfo {
    /// Creates app info carrying only a channel name.
    pub fn with_channel(channel: impl Into<String>) -> Self {
        Self {
            oauth_access_token: None,
            twitch_channel_name: Some(channel.into()),
        }
    }

    /// Returns true if the host passed an access token.
    pub fn has_access_token(&self) -> bool {
        self.oauth_access_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}

impl fmt::Debug for AppInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppInfo")
            .field(
                "oauth_access_token",
                &self.oauth_access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("twitch_channel_name", &self.twitch_channel_name)
            .finish()
    }
}

// ============================================================================
// WidgetSnapshot
// ============================================================================

/// Point-in-time view of the widget for status reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSnapshot {
    /// Whether the engine is scheduling ticks
    pub running: bool,
    /// Countdown state
    pub state: CountdownState,
    /// Active configuration
    pub config: CountdownConfig,
    /// Channel name from the host app info
    pub channel: Option<String>,
}

// ============================================================================
// IPC Types
// ============================================================================

/// IPC request from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum IpcRequest {
    /// Push new widget settings and/or app info (the host's `SetWidgetSettings`)
    ApplyWidgetSettings {
        /// Settings to apply; `None` keeps the current configuration
        #[serde(rename = "widgetSettings", default, skip_serializing_if = "Option::is_none")]
        widget_settings: Option<WidgetSettings>,
        /// Host metadata; `None` keeps the stored app info
        #[serde(rename = "appInfo", default, skip_serializing_if = "Option::is_none")]
        app_info: Option<AppInfo>,
    },
    /// Stop the countdown
    Stop,
    /// Query the current status
    Status,
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    /// Current phase ("counting", "succeeded" or "stopped")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Current countdown value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<i64>,
    /// Configured start value
    #[serde(rename = "startValue", skip_serializing_if = "Option::is_none")]
    pub start_value: Option<i64>,
    /// Configured stop value
    #[serde(rename = "stopValue", skip_serializing_if = "Option::is_none")]
    pub stop_value: Option<i64>,
    /// Configured delay
    #[serde(rename = "delaySeconds", skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<f64>,
    /// Channel name from the host app info
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl ResponseData {
    /// Creates response data from a widget snapshot.
    pub fn from_snapshot(snapshot: &WidgetSnapshot) -> Self {
        let phase = if snapshot.running {
            snapshot.state.phase.as_str()
        } else {
            "stopped"
        };

        Self {
            phase: Some(phase.to_string()),
            current: Some(snapshot.state.current),
            start_value: Some(snapshot.config.start_value),
            stop_value: Some(snapshot.config.stop_value),
            delay_seconds: Some(snapshot.config.delay_seconds),
            channel: snapshot.channel.clone(),
        }
    }
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }

    /// Returns true for a success response.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

// ============================================================================
// Tests
// ============================================================================
