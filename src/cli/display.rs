//! Display utilities for the countdown CLI.
//!
//! Tick output goes to stdout one line per tick; everything else is a short
//! human-readable report.

use std::io::{self, Write};

use crate::types::{CountdownPhase, CountdownState, IpcResponse, ResponseData};

/// Text shown for a completed cycle.
pub const SUCCESS_TEXT: &str = "成功!";

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Renders a tick: the current value, or the success text at a cycle end.
    pub fn render_tick(state: &CountdownState) -> String {
        match state.phase {
            CountdownPhase::Counting => state.current.to_string(),
            CountdownPhase::Succeeded => SUCCESS_TEXT.to_string(),
        }
    }

    /// Prints a tick to stdout.
    ///
    /// # Errors
    ///
    /// Returns the write error, e.g. when stdout is a closed pipe.
    pub fn show_tick(state: &CountdownState) -> io::Result<()> {
        Self::write_tick(&mut io::stdout().lock(), state)
    }

    /// Writes a tick as one line and flushes it.
    pub fn write_tick(out: &mut impl Write, state: &CountdownState) -> io::Result<()> {
        writeln!(out, "{}", Self::render_tick(state))?;
        out.flush()
    }

    /// Shows a success message for applied settings.
    pub fn show_apply_success(response: &IpcResponse) {
        println!("* {}", response.message);

        if let Some(data) = &response.data {
            if let Some(config) = Self::format_config(data) {
                println!("  設定: {config}");
            }
            if let Some(channel) = &data.channel {
                println!("  チャンネル: {channel}");
            }
        }
    }

    /// Shows a success message for a stopped countdown.
    pub fn show_stop_success(response: &IpcResponse) {
        println!("[] {}", response.message);
    }

    /// Shows the current countdown status.
    pub fn show_status(response: &IpcResponse) {
        println!("カウントダウン ステータス");
        println!("─────────────────────────────");

        let Some(data) = &response.data else {
            println!("カウントダウンは起動していません");
            return;
        };

        let phase = data.phase.as_deref().unwrap_or("unknown");
        println!("状態: {}", Self::phase_label(phase));

        if phase != "stopped" {
            if let Some(current) = data.current {
                println!("現在値: {current}");
            }
        }
        if let Some(config) = Self::format_config(data) {
            println!("設定: {config}");
        }
        if let Some(channel) = &data.channel {
            println!("チャンネル: {channel}");
        }
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {message}");
    }

    fn phase_label(phase: &str) -> &str {
        match phase {
            "counting" => "カウント中",
            "succeeded" => "成功",
            "stopped" => "停止中",
            _ => phase,
        }
    }

    /// Formats "start → stop (delay秒間隔)" when all three values are present.
    fn format_config(data: &ResponseData) -> Option<String> {
        let start = data.start_value?;
        let stop = data.stop_value?;
        let delay = data.delay_seconds?;
        Some(format!("{start} → {stop} ({delay}秒間隔)"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn response_data() -> ResponseData {
        ResponseData {
            phase: Some("counting".to_string()),
            current: Some(4),
            start_value: Some(10),
            stop_value: Some(0),
            delay_seconds: Some(1.5),
            channel: Some("streamer".to_string()),
        }
    }

    mod render_tick_tests {
        use super::*;

        #[test]
        fn test_counting_renders_value() {
            let state = CountdownState::new(7);
            assert_eq!(Display::render_tick(&state), "7");
        }

        #[test]
        fn test_negative_value() {
            let state = CountdownState::new(-3);
            assert_eq!(Display::render_tick(&state), "-3");
        }

        #[test]
        fn test_succeeded_renders_success_text() {
            let state = CountdownState {
                current: 0,
                phase: CountdownPhase::Succeeded,
            };
            assert_eq!(Display::render_tick(&state), SUCCESS_TEXT);
        }
    }

    mod write_tick_tests {
        use super::*;

        struct ClosedPipe;

        impl Write for ClosedPipe {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        #[test]
        fn test_write_tick_lines() {
            let mut out = Vec::new();
            Display::write_tick(&mut out, &CountdownState::new(2)).unwrap();
            Display::write_tick(
                &mut out,
                &CountdownState {
                    current: 0,
                    phase: CountdownPhase::Succeeded,
                },
            )
            .unwrap();

            assert_eq!(String::from_utf8(out).unwrap(), "2\n成功!\n");
        }

        #[test]
        fn test_write_tick_reports_broken_pipe() {
            let err = Display::write_tick(&mut ClosedPipe, &CountdownState::new(1)).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        }
    }

    mod format_tests {
        use super::*;

        #[test]
        fn test_format_config() {
            assert_eq!(
                Display::format_config(&response_data()),
                Some("10 → 0 (1.5秒間隔)".to_string())
            );
        }

        #[test]
        fn test_format_config_incomplete() {
            let data = ResponseData {
                delay_seconds: None,
                ..response_data()
            };
            assert_eq!(Display::format_config(&data), None);
        }

        #[test]
        fn test_phase_label() {
            assert_eq!(Display::phase_label("counting"), "カウント中");
            assert_eq!(Display::phase_label("succeeded"), "成功");
            assert_eq!(Display::phase_label("stopped"), "停止中");
            assert_eq!(Display::phase_label("other"), "other");
        }
    }

    mod show_tests {
        use super::*;

        // Output goes to stdout/stderr; these only check nothing panics.

        #[test]
        fn test_show_status_without_data() {
            Display::show_status(&IpcResponse::success("", None));
        }

        #[test]
        fn test_show_status_with_data() {
            Display::show_status(&IpcResponse::success("", Some(response_data())));
        }

        #[test]
        fn test_show_apply_and_stop() {
            let response = IpcResponse::success("ok", Some(response_data()));
            Display::show_apply_success(&response);
            Display::show_stop_success(&response);
            Display::show_error("failure");
        }
    }
}
