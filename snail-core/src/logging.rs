//! Tracing setup for the Snail core.
//!
//! The router, container and dispatcher emit `tracing` events with structured
//! fields. This module installs a subscriber for them; it is optional, and
//! nothing in the core depends on a subscriber being present.
//!
//! ```no_run
//! use snail_core::logging::*;
//!
//! let _guard = TracingConfig::new()
//!     .level(TraceLevel::Debug)
//!     .format(TraceFormat::Pretty)
//!     .init();
//! info!("router ready");
//! ```
//!
//! `RUST_LOG` takes precedence over the configured level when set.

use std::io;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl TraceLevel {
    pub fn to_tracing_level(&self) -> Level {
        match self {
            TraceLevel::Trace => Level::TRACE,
            TraceLevel::Debug => Level::DEBUG,
            TraceLevel::Info => Level::INFO,
            TraceLevel::Warn => Level::WARN,
            TraceLevel::Error => Level::ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TraceLevel::Trace => "trace",
            TraceLevel::Debug => "debug",
            TraceLevel::Info => "info",
            TraceLevel::Warn => "warn",
            TraceLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    Json,
    Pretty,
    Compact,
}

/// Where events are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceOutput {
    Stdout,
    Stderr,
    /// Daily-rotated files `{directory}/{prefix}.YYYY-MM-DD`.
    RollingFile { directory: String, prefix: String },
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub level: TraceLevel,
    pub format: TraceFormat,
    pub output: TraceOutput,
    pub targets: bool,
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: TraceLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: TraceFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: TraceOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    /// Install the global subscriber.
    ///
    /// Returns the writer guard; keep it alive until shutdown so buffered events
    /// are flushed. Returns `None` when a global subscriber is already set.
    pub fn init(self) -> Option<WorkerGuard> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()));

        let (writer, guard) = match &self.output {
            TraceOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
            TraceOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
            TraceOutput::RollingFile { directory, prefix } => {
                tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, prefix))
            }
        };

        let registry = tracing_subscriber::registry().with(filter);
        let installed = match self.format {
            TraceFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_target(self.targets),
                )
                .try_init(),
            TraceFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_writer(writer)
                        .with_target(self.targets),
                )
                .try_init(),
            TraceFormat::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_ansi(false),
                )
                .try_init(),
        };

        installed.ok().map(|_| guard)
    }
}

impl Default for TracingConfig {
    /// JSON to stdout at info level.
    fn default() -> Self {
        Self {
            level: TraceLevel::Info,
            format: TraceFormat::Json,
            output: TraceOutput::Stdout,
            targets: true,
        }
    }
}
