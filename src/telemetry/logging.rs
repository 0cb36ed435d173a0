//! Subscriber setup driven by the `[log]` section
//!
//! RUST_LOG, when set, overrides the configured level.

use serde::Deserialize;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    /// One JSON object per event, with span close timings
    Json,
}

/// `[log]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// error, warn, info, debug or trace; anything else falls back to info
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    pub fn level(&self) -> Level {
        parse_level(&self.level)
    }

    fn filter(&self) -> EnvFilter {
        if std::env::var_os("RUST_LOG").is_some() {
            return EnvFilter::from_default_env();
        }
        EnvFilter::default().add_directive(LevelFilter::from_level(self.level()).into())
    }
}

/// Install the global subscriber
///
/// Without a config the defaults apply (info, pretty). A subscriber that is
/// already installed is kept.
pub fn init_logging(config: Option<&LogConfig>) {
    let config = config.cloned().unwrap_or_default();

    let layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
        LogFormat::Pretty => fmt::layer().boxed(),
    };

    let _ = tracing_subscriber::registry()
        .with(layer)
        .with(config.filter())
        .try_init();
}

pub(crate) fn parse_level(level: &str) -> Level {
    level.parse().unwrap_or(Level::INFO)
}

pub(crate) fn is_known_level(level: &str) -> bool {
    level.parse::<Level>().is_ok()
}
