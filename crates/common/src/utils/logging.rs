use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to write logs to a daily rolling file
    #[serde(default)]
    pub file_logging: bool,

    /// Log file directory
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Log file name prefix
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Whether to log to console
    #[serde(default = "default_console_logging")]
    pub console_logging: bool,

    /// Log format (json, pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Whether to include target/module
    #[serde(default = "default_include_target")]
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_logging: false,
            log_dir: default_log_dir(),
            log_file: default_log_file(),
            console_logging: default_console_logging(),
            format: default_log_format(),
            include_target: default_include_target(),
        }
    }
}

// Default values
fn default_log_level() -> String { "info".to_string() }
fn default_log_dir() -> PathBuf { PathBuf::from("logs") }
fn default_log_file() -> String { "faucet.log".to_string() }
fn default_console_logging() -> bool { true }
fn default_log_format() -> String { "pretty".to_string() }
fn default_include_target() -> bool { true }

/// Log format types
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl From<&str> for LogFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process when file logging is enabled.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.console_logging {
        let console = fmt::layer().with_target(config.include_target);
        layers.push(match LogFormat::from(config.format.as_str()) {
            LogFormat::Json => console.json().boxed(),
            LogFormat::Compact => console.compact().boxed(),
            LogFormat::Pretty => console.pretty().boxed(),
        });
    }

    let mut guard = None;
    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_target(config.include_target)
                .with_writer(writer)
                .json()
                .boxed(),
        );
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(build_env_filter(config)?)
        .try_init()?;

    tracing::info!("Logging system initialized with level: {}", config.level);
    Ok(guard)
}

/// Build environment filter from configuration
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    let mut filter_string = config.level.clone();

    // RUST_LOG directives refine the configured level
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        if !rust_log.is_empty() {
            filter_string.push(',');
            filter_string.push_str(&rust_log);
        }
    }

    Ok(EnvFilter::try_new(filter_string)?)
}
