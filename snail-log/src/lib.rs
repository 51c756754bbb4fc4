//! Snail Logging
//!
//! The category sinks the dispatcher and container write to, plus the
//! `trace!`..`error!` macros for free-form diagnostics. Both end up in the same
//! STDERR writer, configured once from the environment.
//!
//! ```rust
//! use snail_log::{debug, CategoryLogger, LogSink};
//!
//! debug!(target: "snail::router", "Matching route: {}", "/hello/world");
//!
//! let sink = CategoryLogger::default();
//! sink.log("GET /hello/world -> Index@hello", "router");
//! ```
//!
//! # Environment Variables
//!
//! - `SNAIL_DEBUG=1` - lower the default level to debug
//! - `SNAIL_LOG_LEVEL=trace|debug|info|warn|error|off` - takes precedence over `SNAIL_DEBUG`
//! - `SNAIL_LOG_FORMAT=json|text`

mod sink;

pub use sink::{CategoryLogger, LogSink, NullSink};

use once_cell::sync::Lazy;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Severity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "off" | "none" => Ok(Level::Off),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a written line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `<rfc3339> LEVEL [target] message`
    Text,
    /// One JSON object per line with `timestamp`, `level`, `target` and `message`.
    Json,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" | "compact" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Writer settings, read once from `SNAIL_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    pub format: Format,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: Format::Json,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build from a variable lookup. Unparsable values keep the default.
    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let debug = var("SNAIL_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let level = var("SNAIL_LOG_LEVEL")
            .and_then(|s| s.parse().ok())
            .unwrap_or(if debug { Level::Debug } else { Level::Info });
        let format = var("SNAIL_LOG_FORMAT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(Format::Json);

        Self { level, format }
    }

    pub fn enabled(&self, level: Level) -> bool {
        level != Level::Off && level >= self.level
    }

    /// Render one line, without the trailing newline.
    pub fn render(&self, level: Level, target: &str, message: &str) -> String {
        let timestamp = chrono::Utc::now().to_rfc3339();
        match self.format {
            Format::Json => serde_json::json!({
                "timestamp": timestamp,
                "level": level.as_str(),
                "target": target,
                "message": message,
            })
            .to_string(),
            Format::Text if target.is_empty() => {
                format!("{} {:5} {}", timestamp, level.as_str(), message)
            }
            Format::Text => format!("{} {:5} [{}] {}", timestamp, level.as_str(), target, message),
        }
    }
}

static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

#[doc(hidden)]
pub fn enabled(level: Level) -> bool {
    CONFIG.enabled(level)
}

#[doc(hidden)]
pub fn log(level: Level, target: &str, message: &str) {
    if CONFIG.enabled(level) {
        eprintln!("{}", CONFIG.render(level, target, message));
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:expr, $target:expr, $($arg:tt)+) => {
        if $crate::enabled($level) {
            $crate::log($level, $target, &format!($($arg)+));
        }
    };
}

#[macro_export]
macro_rules! trace {
    (target: $target:expr, $($arg:tt)+) => { $crate::__log!($crate::Level::Trace, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Trace, module_path!(), $($arg)+) };
}

/// Log at debug level. On with `SNAIL_DEBUG=1` or `SNAIL_LOG_LEVEL=debug`.
#[macro_export]
macro_rules! debug {
    (target: $target:expr, $($arg:tt)+) => { $crate::__log!($crate::Level::Debug, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Debug, module_path!(), $($arg)+) };
}

#[macro_export]
macro_rules! info {
    (target: $target:expr, $($arg:tt)+) => { $crate::__log!($crate::Level::Info, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Info, module_path!(), $($arg)+) };
}

#[macro_export]
macro_rules! warn {
    (target: $target:expr, $($arg:tt)+) => { $crate::__log!($crate::Level::Warn, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Warn, module_path!(), $($arg)+) };
}

#[macro_export]
macro_rules! error {
    (target: $target:expr, $($arg:tt)+) => { $crate::__log!($crate::Level::Error, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Error, module_path!(), $($arg)+) };
}
