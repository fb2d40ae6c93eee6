//! Structured logging initialisation.
//!
//! All diagnostics go through `tracing`. This module installs a
//! `tracing-subscriber` registry with an [`EnvFilter`] and a JSON or pretty
//! formatter, optionally writing through a `tracing-appender` non-blocking
//! buffer so request threads never block on stdout.
//!
//! ## Environment Variables
//!
//! - `BRRTMUX_LOG_LEVEL`: filter directive, e.g. `info` or `brrtmux=debug` (default `info`)
//! - `BRRTMUX_LOG_FORMAT`: `json` or `pretty` (default `json`)
//! - `BRRTMUX_LOG_ASYNC`: `true` / `false` (default `true`)
//! - `BRRTMUX_LOG_INCLUDE_LOCATION`: include file and line (default `false`)
//!
//! `RUST_LOG`, when set, takes precedence over `BRRTMUX_LOG_LEVEL`.

use anyhow::{Context, Result};
use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive: trace/debug/info/warn/error or a full `EnvFilter` string
    pub log_level: String,
    pub format: LogFormat,
    /// Write through a non-blocking buffered writer
    pub async_logging: bool,
    /// Include file:line location (dev only)
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            async_logging: true,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Parse configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            log_level: lookup("BRRTMUX_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: lookup("BRRTMUX_LOG_FORMAT")
                .map_or(defaults.format, |s| LogFormat::parse(&s)),
            async_logging: lookup("BRRTMUX_LOG_ASYNC")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.async_logging),
            include_location: lookup("BRRTMUX_LOG_INCLUDE_LOCATION")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.include_location),
        }
    }

    /// Configuration for local development and tests
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            include_location: true,
        }
    }
}

/// Keeps the non-blocking writer alive; logs buffered at drop are flushed.
#[must_use = "dropping the guard stops the background log writer"]
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
}

/// Initialise logging from the environment.
pub fn init_logging() -> Result<LogGuard> {
    init_logging_with_config(&LogConfig::from_env())
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if the filter directive is invalid or a global subscriber is
/// already installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<LogGuard> {
    let env_filter = match env::var("RUST_LOG") {
        Ok(directive) if !directive.is_empty() => EnvFilter::try_new(&directive),
        _ => EnvFilter::try_new(&config.log_level),
    }
    .with_context(|| format!("invalid log filter {:?}", config.log_level))?;

    let (writer, worker) = if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(writer), Some(guard))
    } else {
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout),
            None,
        )
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_list(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(LogGuard { _worker: worker })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> LogConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        LogConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]);
        assert_eq!(c, LogConfig::default());
        assert_eq!(c.log_level, "info");
        assert_eq!(c.format, LogFormat::Json);
        assert!(c.async_logging);
    }

    #[test]
    fn test_from_lookup() {
        let c = config(&[
            ("BRRTMUX_LOG_LEVEL", "brrtmux=debug"),
            ("BRRTMUX_LOG_FORMAT", "PRETTY"),
            ("BRRTMUX_LOG_ASYNC", "false"),
            ("BRRTMUX_LOG_INCLUDE_LOCATION", "true"),
        ]);
        assert_eq!(c.log_level, "brrtmux=debug");
        assert_eq!(c.format, LogFormat::Pretty);
        assert!(!c.async_logging);
        assert!(c.include_location);
    }

    #[test]
    fn test_unparsable_flags_use_defaults() {
        let c = config(&[("BRRTMUX_LOG_ASYNC", "maybe")]);
        assert!(c.async_logging);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("invalid"), LogFormat::Json);
    }
}
