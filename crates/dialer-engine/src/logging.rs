//! Tracing subscriber setup driven by the `[logging]` config section

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSettings;
use crate::error::{DialerError, Result};

/// How the dialer's log output is shaped
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub json: bool,
    /// Include file and line information
    pub file_info: bool,
    /// Emit a line with timings whenever a pacer tick span closes
    pub log_spans: bool,
    /// Per-target overrides such as `sqlx=warn`
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
            directives: Vec::new(),
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level) -> Self {
        LoggingConfig {
            level,
            ..Default::default()
        }
    }

    /// Build from the `[logging]` section, rejecting bad levels and directives
    pub fn from_settings(settings: &LoggingSettings) -> Result<Self> {
        let config = LoggingConfig {
            level: parse_log_level(&settings.level)?,
            json: settings.json,
            file_info: settings.file_info,
            log_spans: settings.log_spans,
            directives: settings.directives.clone(),
        };
        config.parsed_directives()?;
        Ok(config)
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }

    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn parsed_directives(&self) -> Result<Vec<Directive>> {
        self.directives
            .iter()
            .map(|d| {
                d.parse::<Directive>()
                    .map_err(|e| DialerError::config(format!("Invalid log directive {:?}: {}", d, e)))
            })
            .collect()
    }

    /// `RUST_LOG`, then the configured level, then the per-target overrides
    pub fn env_filter(&self) -> Result<EnvFilter> {
        let filter = EnvFilter::from_default_env().add_directive(self.level.into());
        Ok(self
            .parsed_directives()?
            .into_iter()
            .fold(filter, |filter, directive| filter.add_directive(directive)))
    }
}

/// Install the global tracing subscriber
///
/// Fails with a config error if a global subscriber is already installed.
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let filter = config.env_filter()?;

    let span_events = if config.log_spans {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        subscriber.with_writer(std::io::stdout).json().try_init()
    } else {
        subscriber.try_init()
    };

    installed.map_err(|e| DialerError::config(format!("failed to install subscriber: {}", e)))
}

pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| DialerError::config(format!("Invalid log level: {}", level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_from_settings() {
        let settings = LoggingSettings {
            level: "trace".to_string(),
            json: true,
            file_info: true,
            log_spans: true,
            directives: vec!["sqlx=warn".to_string(), "rvoip_dialer_engine::lease=debug".to_string()],
        };
        let config = LoggingConfig::from_settings(&settings).unwrap();
        assert_eq!(config.level, Level::TRACE);
        assert!(config.json);
        assert!(config.file_info);
        assert!(config.log_spans);
        assert_eq!(config.directives.len(), 2);
        assert!(config.env_filter().is_ok());
    }

    #[test]
    fn test_bad_directive_is_a_config_error() {
        let settings = LoggingSettings {
            directives: vec!["sqlx=shouting".to_string()],
            ..LoggingSettings::default()
        };
        assert!(matches!(LoggingConfig::from_settings(&settings), Err(DialerError::Config(_))));

        let config = LoggingConfig::default().with_directive("rvoip_dialer_engine=verbose");
        assert!(config.env_filter().is_err());
    }

    #[test]
    fn test_defaults_quiet_sqlx() {
        let config = LoggingConfig::from_settings(&LoggingSettings::default()).unwrap();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.directives, vec!["sqlx=warn".to_string()]);
        assert!(!config.log_spans);
    }
}
