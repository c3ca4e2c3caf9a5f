//! Tracing subscriber setup.
//!
//! Cache events are emitted under the `memora::cache` target. This module
//! installs a subscriber for applications that don't bring their own.
//!
//! # Environment Variables
//!
//! - `MEMORA_LOG` - filter directives, e.g. `info,memora::cache=debug` (default `info`)
//! - `MEMORA_LOG_FORMAT=pretty|json|compact` - output format (default `compact`)

use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter directives variable.
pub const ENV_LOG: &str = "MEMORA_LOG";
/// Output format variable.
pub const ENV_LOG_FORMAT: &str = "MEMORA_LOG_FORMAT";

const DEFAULT_FILTER: &str = "info";

/// Output format for log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Multi-line human readable format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
    /// JSON format for structured logging
    Json,
}

impl Format {
    /// Get format from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives
    pub filter: String,
    /// Output format
    pub format: Format,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: Format::default(),
        }
    }
}

impl TelemetryConfig {
    /// Read settings from `MEMORA_LOG` and `MEMORA_LOG_FORMAT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let filter = lookup(ENV_LOG)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());

        let format = lookup(ENV_LOG_FORMAT)
            .and_then(|value| Format::parse(&value))
            .unwrap_or_default();

        Self { filter, format }
    }
}

/// Install a global subscriber configured from the environment.
///
/// Does nothing if a global subscriber is already set.
pub fn init() {
    let _ = try_init_with(TelemetryConfig::from_env());
}

/// Install a global subscriber with explicit settings.
pub fn try_init_with(config: TelemetryConfig) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (pretty, compact, json) = match config.format {
        Format::Pretty => (Some(fmt::layer().pretty().with_writer(std::io::stderr)), None, None),
        Format::Compact => (None, Some(fmt::layer().compact().with_writer(std::io::stderr)), None),
        Format::Json => (None, None, Some(fmt::layer().json().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(compact)
        .with(json)
        .try_init()
}
