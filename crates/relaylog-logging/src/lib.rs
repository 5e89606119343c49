//! Structured logging for relaylog services
//!
//! Sets up a `tracing` subscriber with console and file output, and tags
//! spans with the replication source being processed.
//!
//! # Features
//!
//! - **JSONL Output**: structured JSON lines for log aggregation (default)
//! - **Pretty Console**: human readable output for development
//! - **Source Context**: [`SourceContextGuard`] tags spans with a source id
//! - **Per-Source Files**: [`LogConfig::for_source`] names the log file after one source
//! - **File Rotation**: daily/hourly log rotation via tracing-appender
//!
//! # Quick Start
//!
//! ```no_run
//! use relaylog_logging::{LogConfig, RelaySubscriberBuilder};
//!
//! let _guard = RelaySubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .try_init()
//!     .expect("logging already initialized");
//!
//! tracing::info!("relay started");
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleFormat, FileConfig, JsonFields, LogConfig, RotationStrategy, WRITER_TARGET};
pub use context::{SourceContextData, SourceContextGuard};
pub use layers::{jsonl_layer, SourceContextExtension, SourceContextLayer};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::TestWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Subscriber the output layers are stacked on
type BaseSubscriber = Layered<SourceContextLayer, Layered<EnvFilter, Registry>>;

type BoxedLayer = Box<dyn Layer<BaseSubscriber> + Send + Sync>;

/// Errors setting up logging
#[derive(Debug, Error)]
pub enum LogError {
    /// Log file or directory could not be created
    #[error("create log file: {0}")]
    Io(#[from] std::io::Error),

    /// Rolling appender could not be built
    #[error("create rolling log appender: {0}")]
    Appender(#[from] InitError),

    /// A global subscriber is already installed
    #[error("install global subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Builder for configuring and initializing the logging subscriber
///
/// By default console output uses JSONL format. Use
/// `LogConfig::development()` for human-readable output.
///
/// # Example
///
/// ```no_run
/// use relaylog_logging::{LogConfig, RelaySubscriberBuilder};
///
/// let _guard = RelaySubscriberBuilder::new()
///     .with_config(LogConfig::for_source("/var/log/relay", "mysql-replica-1"))
///     .with_writer_level("debug")
///     .try_init()
///     .expect("logging already initialized");
/// ```
pub struct RelaySubscriberBuilder {
    config: LogConfig,
}

impl RelaySubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the base filter directive
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Set the level of the relay writer's own events
    pub fn with_writer_level(mut self, level: impl Into<String>) -> Self {
        self.config.writer_level = Some(level.into());
        self
    }

    /// Choose the console format, or turn the console off
    pub fn with_console(mut self, format: ConsoleFormat) -> Self {
        self.config.console = format;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Build the output layers, without installing anything
    ///
    /// The returned guard flushes file output when dropped.
    fn build_layers(&self) -> Result<(Vec<BoxedLayer>, Option<WorkerGuard>), LogError> {
        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        let config = &self.config;
        let console: Option<BoxedLayer> = match (config.console, config.capture) {
            (ConsoleFormat::Off, _) => None,
            (ConsoleFormat::Pretty, true) => Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(config.ansi)
                    .with_target(true)
                    .with_writer(TestWriter::new())
                    .boxed(),
            ),
            (ConsoleFormat::Pretty, false) => Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(config.ansi)
                    .with_target(true)
                    .boxed(),
            ),
            (ConsoleFormat::Json, true) => Some(jsonl_layer(TestWriter::new(), config.json)),
            (ConsoleFormat::Json, false) => Some(jsonl_layer(std::io::stdout, config.json)),
        };
        layers.extend(console);

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = create_file_writer(file_config)?;
            layers.push(jsonl_layer(writer, self.config.json));
            guard = Some(file_guard);
        }

        Ok((layers, guard))
    }

    /// Install the subscriber globally
    ///
    /// Keep the returned guard alive for the duration of the program when
    /// file output is configured. Fails if a global subscriber is already set.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.filter_directives()));
        let (layers, guard) = self.build_layers()?;

        Registry::default()
            .with(env_filter)
            .with(SourceContextLayer::new())
            .with(layers)
            .try_init()?;
        Ok(guard)
    }
}

impl Default for RelaySubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the file sink: one truncated file for `Never`, a rolling appender otherwise
fn create_file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogError> {
    let prefix = config.file_prefix();
    let rotation = match config.rotation {
        RotationStrategy::Never => {
            fs::create_dir_all(&config.directory)?;
            let path = config.directory.join(format!("{}.log", prefix));
            let file = File::create(path)?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(prefix)
        .filename_suffix("log");
    if let Some(keep) = config.keep {
        builder = builder.max_log_files(keep);
    }
    let appender = builder.build(&config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging for testing (warnings only); safe to call from every test
pub fn init_testing() {
    let _ = RelaySubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
