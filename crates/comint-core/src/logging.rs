//! Logging configuration and initialization for host embedders.
//!
//! Structured logging via `tracing` with per-module targets
//! (`comint::session`, `comint::pty`, `comint::buffer`, `comint::pipeline`,
//! `comint::complete`, `comint::ring`). `RUST_LOG` always wins when set.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: '{}'. Use 'text' or 'json'.", s)),
        }
    }
}

/// Logging preset levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogPreset {
    /// Production: lifecycle events only; per-chunk noise off.
    #[default]
    Production,
    /// Debug: detailed info for troubleshooting.
    Debug,
    /// Trace: everything, including per-chunk data.
    Trace,
    /// Quiet: warnings and errors only.
    Quiet,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    pub preset: LogPreset,
    pub format: LogFormat,
}

impl LogConfig {
    /// Build an EnvFilter from this configuration.
    pub fn build_filter(&self) -> EnvFilter {
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            return env_filter;
        }

        let directives = match self.preset {
            LogPreset::Production => {
                "comint::session=info,comint::pty=info,comint::complete=info,\
                 comint::buffer=warn,comint::pipeline=warn,comint::ring=off"
            }
            LogPreset::Debug => "comint=debug",
            LogPreset::Trace => "comint=trace",
            LogPreset::Quiet => "comint=warn",
        };

        EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize the tracing subscriber with the given configuration.
pub fn init(config: &LogConfig) {
    let filter = config.build_filter();

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(true))
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("invalid".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_presets_build_valid_filters() {
        for preset in [
            LogPreset::Production,
            LogPreset::Debug,
            LogPreset::Trace,
            LogPreset::Quiet,
        ] {
            let config = LogConfig {
                preset,
                format: LogFormat::Text,
            };
            // must not fall back to the hardcoded default
            let filter = config.build_filter();
            assert!(!filter.to_string().is_empty());
        }
    }
}
