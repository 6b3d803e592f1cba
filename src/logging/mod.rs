//! Structured Logging & Tracing
//!
//! Provides structured logging via the `tracing` crate with:
//! - Level-based filtering, per module, overridable through `RUST_LOG`
//! - Timing spans for whole-floor generation
//! - Idempotent initialization (CLI, tests and bevy apps can all call it)

use std::sync::Once;
use std::time::Instant;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Installs the subscriber when added to a bevy app
#[derive(Default)]
pub struct LoggingPlugin {
    pub config: TracingConfig,
}

impl Plugin for LoggingPlugin {
    fn build(&self, _app: &mut App) {
        init_tracing(&self.config);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// `-v` count from the CLI: 0 = info, 1 = debug, 2+ = trace
    pub fn from_verbosity(verbosity: u8) -> Self {
        match verbosity {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// Configuration for tracing initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    pub default_level: LogLevel,
    pub module_filters: Vec<(String, LogLevel)>,
    pub show_thread_ids: bool,
    pub show_targets: bool,
    pub show_file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: LogLevel::Info,
            module_filters: vec![
                ("tower_floorgen::generation".to_string(), LogLevel::Info),
                ("tower_floorgen::sockets".to_string(), LogLevel::Warn),
                ("tower_floorgen::hotreload".to_string(), LogLevel::Info),
                // bevy internals are noisy at info
                ("bevy_app".to_string(), LogLevel::Warn),
                ("bevy_ecs".to_string(), LogLevel::Warn),
            ],
            show_thread_ids: false,
            show_targets: true,
            show_file_line: false,
        }
    }
}

impl TracingConfig {
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.default_level = level;
        for (module, filter) in &mut self.module_filters {
            if module.starts_with("tower_floorgen") {
                *filter = level;
            }
        }
        self
    }

    pub fn to_env_filter_string(&self) -> String {
        let mut parts = vec![self.default_level.as_str().to_string()];
        for (module, level) in &self.module_filters {
            parts.push(format!("{}={}", module, level.as_str()));
        }
        parts.join(",")
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

static TRACING_INIT: Once = Once::new();

/// Initialize tracing with default settings (idempotent)
pub fn init_tracing_default() {
    init_tracing(&TracingConfig::default());
}

/// Initialize tracing with custom config (first call wins)
pub fn init_tracing(config: &TracingConfig) {
    let filter_str = config.to_env_filter_string();
    let config = config.clone();
    TRACING_INIT.call_once(move || {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.show_targets)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_writer(std::io::stderr)
            .compact();

        // Another global subscriber (e.g. bevy's LogPlugin) may already be set
        let _ = subscriber.try_init();
    });
}

/// Wall-clock timer for a named operation; logs its duration at debug level when dropped
#[derive(Debug)]
pub struct TimingSpan {
    name: &'static str,
    started: Instant,
}

impl TimingSpan {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for TimingSpan {
    fn drop(&mut self) {
        tracing::debug!(
            operation = self.name,
            elapsed_ms = self.elapsed_ms(),
            "timing"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_verbosity() {
        assert_eq!(LogLevel::from_verbosity(0), LogLevel::Info);
        assert_eq!(LogLevel::from_verbosity(1), LogLevel::Debug);
        assert_eq!(LogLevel::from_verbosity(7), LogLevel::Trace);
    }

    #[test]
    fn test_env_filter_string() {
        let filter = TracingConfig::default().to_env_filter_string();
        assert!(filter.starts_with("info"));
        assert!(filter.contains("tower_floorgen::sockets=warn"));
        assert!(filter.contains("bevy_ecs=warn"));
    }

    #[test]
    fn test_with_level_only_touches_own_modules() {
        let filter = TracingConfig::default()
            .with_level(LogLevel::Trace)
            .to_env_filter_string();
        assert!(filter.starts_with("trace"));
        assert!(filter.contains("tower_floorgen::sockets=trace"));
        assert!(filter.contains("bevy_app=warn"));
    }

    #[test]
    fn test_tracing_config_json_roundtrip() {
        let config = TracingConfig::default();
        let restored = TracingConfig::from_json(&config.to_json()).unwrap();
        assert_eq!(restored.default_level, config.default_level);
        assert_eq!(restored.module_filters, config.module_filters);
    }

    #[test]
    fn test_init_tracing_idempotent() {
        init_tracing_default();
        init_tracing_default();
        init_tracing(&TracingConfig::default().with_level(LogLevel::Debug));
    }

    #[test]
    fn test_timing_span_measures() {
        let span = TimingSpan::new("test_operation");
        let sum: u64 = (0..1000).sum();
        assert!(sum > 0);
        assert!(span.elapsed_ms() >= 0.0);
    }
}
