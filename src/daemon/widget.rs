//! Countdown widget: the host-facing side of the countdown engine.
//!
//! The host app pushes settings at arbitrary times (`SetWidgetSettings`);
//! `CountdownWidget` translates each push into a `start` or `update_config`
//! call on its `CountdownEngine` and keeps the host's app info.

use std::sync::Arc;

use crate::types::{
    AppInfo, CountdownConfig, CountdownError, CountdownState, WidgetSettings, WidgetSnapshot,
};

use super::timer::CountdownEngine;

/// Presentation callback shared by every engine the widget starts.
pub type SharedTickCallback = Arc<dyn Fn(CountdownState) -> anyhow::Result<()> + Send + Sync>;

/// Owns the countdown engine on behalf of the host app.
pub struct CountdownWidget {
    /// Presentation callback handed to each engine
    on_tick: SharedTickCallback,
    /// Running (or halted) engine, if one was started
    engine: Option<CountdownEngine>,
    /// Last configuration applied
    config: CountdownConfig,
    /// Last app info pushed by the host
    app_info: Option<AppInfo>,
}

impl CountdownWidget {
    /// Creates a widget with no engine running.
    pub fn new<F>(on_tick: F) -> Self
    where
        F: Fn(CountdownState) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            on_tick: Arc::new(on_tick),
            engine: None,
            config: CountdownConfig::default(),
            app_info: None,
        }
    }

    /// Starts the countdown, replacing any existing engine.
    ///
    /// # Errors
    ///
    /// Returns the engine's start error; the previous engine is stopped
    /// regardless.
    pub fn start(&mut self, config: CountdownConfig) -> Result<(), CountdownError> {
        self.stop();

        let on_tick = Arc::clone(&self.on_tick);
        let engine = CountdownEngine::start(config, move |state| on_tick(state))?;

        self.engine = Some(engine);
        self.config = config;
        Ok(())
    }

    /// Handles a settings push from the host app.
    ///
    /// `None` settings keep the current configuration and `None` app info keeps
    /// the stored one. New settings update a running engine in place, or start
    /// a new one when none is running.
    ///
    /// # Errors
    ///
    /// Returns `CountdownError::InvalidConfig` without changing anything if the
    /// settings do not normalize to a valid configuration.
    pub fn set_widget_settings(
        &mut self,
        settings: Option<WidgetSettings>,
        app_info: Option<AppInfo>,
    ) -> Result<(), CountdownError> {
        if let Some(settings) = settings {
            let config = settings.to_config().inspect_err(|e| {
                tracing::warn!(error = %e, "Rejected widget settings");
            })?;

            if let Some(runtime) = settings.runtime {
                tracing::debug!(
                    width = runtime.geometry.width,
                    height = runtime.geometry.height,
                    "Settings panel geometry"
                );
            }

            match self.engine.as_ref() {
                Some(engine) if engine.is_running() => {
                    engine.update_config(config)?;
                    self.config = config;
                }
                _ => self.start(config)?,
            }
        }

        if let Some(info) = app_info {
            tracing::info!(
                channel = info.twitch_channel_name.as_deref().unwrap_or("-"),
                authenticated = info.has_access_token(),
                "App info updated"
            );
            self.app_info = Some(info);
        }

        Ok(())
    }

    /// Stops the countdown. Safe to call when nothing is running.
    pub fn stop(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.stop();
        }
    }

    /// Returns true while the engine is scheduling ticks.
    pub fn is_running(&self) -> bool {
        self.engine.as_ref().is_some_and(CountdownEngine::is_running)
    }

    /// Returns the last app info pushed by the host.
    pub fn app_info(&self) -> Option<&AppInfo> {
        self.app_info.as_ref()
    }

    /// Returns a point-in-time view for status reporting.
    pub fn snapshot(&self) -> WidgetSnapshot {
        let (state, config) = match self.engine.as_ref() {
            Some(engine) => (engine.state(), engine.config()),
            None => (CountdownState::new(self.config.start_value), self.config),
        };

        WidgetSnapshot {
            running: self.is_running(),
            state,
            config,
            channel: self
                .app_info
                .as_ref()
                .and_then(|info| info.twitch_channel_name.clone()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::timer::forward_to;
    use crate::types::{CountdownPhase, SettingValue};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tokio::time::{sleep, Duration};

    fn create_widget() -> (CountdownWidget, mpsc::UnboundedReceiver<CountdownState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (CountdownWidget::new(forward_to(tx)), rx)
    }

    fn settings(start: &str, stop: &str, delay: f64) -> WidgetSettings {
        WidgetSettings {
            start_seconds: SettingValue::from(start),
            stop_seconds: SettingValue::from(stop),
            delay_seconds: SettingValue::from(delay),
            runtime: None,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<CountdownState>) -> Vec<i64> {
        let mut values = Vec::new();
        while let Ok(state) = rx.try_recv() {
            values.push(state.current);
        }
        values
    }

    #[test]
    fn test_new_widget_is_idle() {
        let (widget, _rx) = create_widget();

        let snapshot = widget.snapshot();
        assert!(!snapshot.running);
        assert_eq!(snapshot.config, CountdownConfig::default());
        assert_eq!(snapshot.state.current, 10);
        assert_eq!(snapshot.channel, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_start_engine_when_idle() {
        let (mut widget, mut rx) = create_widget();

        widget
            .set_widget_settings(Some(settings("3", "0", 1.0)), None)
            .unwrap();

        assert!(widget.is_running());
        assert_eq!(drain(&mut rx), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_update_running_engine() {
        let (mut widget, mut rx) = create_widget();
        widget.start(CountdownConfig::new(3, 0, 1.0)).unwrap();
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(drain(&mut rx), vec![3, 3]);

        widget
            .set_widget_settings(Some(settings("5", "0", 1.0)), None)
            .unwrap();

        // Updated in place: no new initial report.
        assert!(drain(&mut rx).is_empty());
        assert_eq!(widget.snapshot().state.current, 5);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(drain(&mut rx), vec![5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_settings_change_nothing() {
        let (mut widget, _rx) = create_widget();
        widget.start(CountdownConfig::new(3, 0, 1.0)).unwrap();

        let result = widget.set_widget_settings(
            Some(settings("abc", "0", 1.0)),
            Some(AppInfo::with_channel("chan")),
        );

        assert!(result.unwrap_err().is_invalid_config());
        assert_eq!(widget.snapshot().config, CountdownConfig::new(3, 0, 1.0));
        assert!(widget.app_info().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_none_settings_keep_config_and_store_app_info() {
        let (mut widget, mut rx) = create_widget();
        widget.start(CountdownConfig::new(3, 0, 1.0)).unwrap();
        let _ = drain(&mut rx);

        widget
            .set_widget_settings(None, Some(AppInfo::with_channel("streamer")))
            .unwrap();

        let snapshot = widget.snapshot();
        assert_eq!(snapshot.config, CountdownConfig::new(3, 0, 1.0));
        assert_eq!(snapshot.state.current, 3);
        assert_eq!(snapshot.channel.as_deref(), Some("streamer"));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_then_settings_restart() {
        let (mut widget, mut rx) = create_widget();
        widget.start(CountdownConfig::new(3, 0, 1.0)).unwrap();
        widget.stop();
        widget.stop();
        assert!(!widget.is_running());

        sleep(Duration::from_secs(3)).await;
        assert_eq!(drain(&mut rx), vec![3]);

        widget
            .set_widget_settings(Some(settings("2", "0", 1.0)), None)
            .unwrap();

        assert!(widget.is_running());
        assert_eq!(drain(&mut rx), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_after_success_is_counting() {
        let (mut widget, mut rx) = create_widget();
        widget.start(CountdownConfig::new(1, 0, 1.0)).unwrap();

        // Initial report, then 1, then 0 (succeeded).
        let reported: Vec<CountdownState> = vec![
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ];
        assert_eq!(reported[2].phase, CountdownPhase::Succeeded);

        let snapshot = widget.snapshot();
        assert_eq!(snapshot.state.current, 1);
        assert_eq!(snapshot.state.phase, CountdownPhase::Counting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_restart_engine_halted_by_panic() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut widget = CountdownWidget::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                panic!("display panicked");
            }
            Ok(())
        });
        widget.start(CountdownConfig::new(3, 0, 1.0)).unwrap();

        sleep(Duration::from_secs(2)).await;
        assert!(!widget.is_running());

        widget
            .set_widget_settings(Some(settings("2", "0", 1.0)), None)
            .unwrap();

        // A fresh engine was started: its initial report is the third call.
        assert!(widget.is_running());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
