//! Structured logging configuration for Conflate
//!
//! Diagnostics (malformed values, file creation notices) are tracing events.
//! They go to stderr by default so that stdout only carries reports.

use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{
    fmt::{self, time::UtcTime, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging configuration for Conflate
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: LogLevel,
    /// Log format (json, pretty, compact)
    pub format: LogFormat,
    /// Output destination (stderr, file, both)
    pub output: LogOutput,
    /// File path for file output
    pub file_path: Option<String>,
    /// Include source file and line numbers
    pub include_source: bool,
}

/// Log levels supported by Conflate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Multi-line, human-readable
    Pretty,
    /// One line per event
    Compact,
    /// JSON for log aggregation
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// Log output destinations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogOutput {
    Stderr,
    File,
    Both,
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            "both" => Ok(LogOutput::Both),
            _ => Err(format!("Invalid log output: {}", s)),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            file_path: None,
            include_source: false,
        }
    }
}

impl LogConfig {
    /// Verbose configuration used by `--verbose`
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_source: true,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `CONFLATE_LOG_*` variables on top of this configuration
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("CONFLATE_LOG_LEVEL") {
            if let Ok(parsed_level) = LogLevel::from_str(&level) {
                self.level = parsed_level;
            }
        }

        if let Ok(format) = std::env::var("CONFLATE_LOG_FORMAT") {
            if let Ok(parsed_format) = LogFormat::from_str(&format) {
                self.format = parsed_format;
            }
        }

        if let Ok(output) = std::env::var("CONFLATE_LOG_OUTPUT") {
            if let Ok(parsed_output) = LogOutput::from_str(&output) {
                self.output = parsed_output;
            }
        }

        if let Ok(file_path) = std::env::var("CONFLATE_LOG_FILE") {
            self.file_path = Some(file_path);
        }

        if let Ok(include_source) = std::env::var("CONFLATE_LOG_SOURCE") {
            self.include_source = include_source.to_lowercase() == "true";
        }

        self
    }
}

/// Initialize the global tracing subscriber with the given configuration
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = create_filter(config);

    let layers: Vec<BoxedLayer> = match (config.output, &config.file_path) {
        (LogOutput::Stderr, _) => vec![create_layer(config, std::io::stderr)],
        (LogOutput::File, Some(file_path)) => vec![create_file_layer(config, file_path)?],
        (LogOutput::Both, Some(file_path)) => vec![
            create_layer(config, std::io::stderr),
            create_file_layer(config, file_path)?,
        ],
        (LogOutput::File, None) | (LogOutput::Both, None) => {
            return Err("File path required for file output".into());
        }
    };

    tracing_subscriber::registry()
        .with(layers.with_filter(filter))
        .try_init()?;

    debug!("Logging initialized with config: {:?}", config);
    Ok(())
}

/// Create an environment filter based on the configuration
fn create_filter(config: &LogConfig) -> EnvFilter {
    // RUST_LOG wins over the configured level
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("conflate={}", config.level.as_str())))
}

fn create_layer<W>(config: &LogConfig, writer: W) -> BoxedLayer
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_timer(UtcTime::rfc_3339())
        .with_file(config.include_source)
        .with_line_number(config.include_source);

    match config.format {
        LogFormat::Pretty => Box::new(layer.pretty()),
        LogFormat::Compact => Box::new(layer.compact()),
        LogFormat::Json => Box::new(layer.json()),
    }
}

/// Create a file logging layer, appending to `file_path`
fn create_file_layer(config: &LogConfig, file_path: &str) -> Result<BoxedLayer, Box<dyn std::error::Error>> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)?;

    Ok(create_layer(config, Arc::new(file)))
}
