//! Log output setup for the `hubworker` binary.
//!
//! # Environment Variables
//!
//! - `HUBWORKER_LOG` - Log filter (overrides RUST_LOG)
//! - `HUBWORKER_LOG_FORMAT` - Output format: pretty, compact, json
//! - `RUST_LOG` - Standard Rust log filter (fallback)
//!
//! Without a filter the level follows `-v`: none = info, `-v` = debug,
//! `-vv` = trace. Reconnect noise lives at debug, so a down hub is quiet by
//! default.
//!
//! # Example
//!
//! ```no_run
//! use hubworker::logging::{LogConfig, LogFormat, init};
//!
//! init(&LogConfig::from_verbosity(1).with_format(LogFormat::Json).with_env_overrides())?;
//! # Ok::<(), hubworker::StartupError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::StartupError;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable.
    #[default]
    Pretty,
    /// Single line per record.
    Compact,
    /// One JSON object per record.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "full" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "unknown log format '{s}'; valid options: pretty, compact, json"
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        })
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base level when no filter is set.
    pub level: Level,
    pub format: LogFormat,
    /// Filter directive (overrides `level`).
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Maps the `-v` count to a base level.
    pub fn from_verbosity(verbose: u8) -> Self {
        let level = match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Applies `HUBWORKER_LOG`, `RUST_LOG` and `HUBWORKER_LOG_FORMAT`.
    ///
    /// A filter already set by the caller wins over the environment.
    pub fn with_env_overrides(mut self) -> Self {
        if self.filter.is_none() {
            self.filter = std::env::var("HUBWORKER_LOG")
                .or_else(|_| std::env::var("RUST_LOG"))
                .ok()
                .filter(|f| !f.trim().is_empty());
        }

        if let Ok(format) = std::env::var("HUBWORKER_LOG_FORMAT")
            && let Ok(f) = format.parse()
        {
            self.format = f;
        }

        self
    }

    fn build_filter(&self) -> Result<EnvFilter, StartupError> {
        match &self.filter {
            Some(filter) => EnvFilter::try_new(filter).map_err(|e| StartupError::Logging {
                reason: format!("invalid filter '{filter}': {e}"),
            }),
            None => Ok(EnvFilter::new(self.level.to_string().to_lowercase())),
        }
    }
}

/// Installs the global subscriber. Records go to stderr.
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init(config: &LogConfig) -> Result<(), StartupError> {
    let filter = config.build_filter()?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Pretty => registry
            .with(tfmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(tfmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(tfmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| StartupError::Logging {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("full".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Compact.to_string(), "compact");
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LogConfig::from_verbosity(0).level, Level::INFO);
        assert_eq!(LogConfig::from_verbosity(1).level, Level::DEBUG);
        assert_eq!(LogConfig::from_verbosity(5).level, Level::TRACE);
    }

    #[test]
    fn test_invalid_filter_is_startup_error() {
        let err = LogConfig::default()
            .with_filter("hubworker=notalevel")
            .build_filter()
            .unwrap_err();
        assert_eq!(err.as_label(), "startup_logging");
    }
}
