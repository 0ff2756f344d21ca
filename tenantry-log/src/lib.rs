//! Tenantry Logging
//!
//! Structured logging for schema switches and migration runs, controlled by
//! `TENANTRY_*` environment variables.
//!
//! # Usage
//!
//! ```rust
//! use tenantry_log::{debug, info, warn};
//!
//! debug!("Switching search path");
//! info!(schema: "tenant_acme", "Applied {} migrations", 3);
//! warn!(target: "tenantry::orchestrator", "Schema {} missing, skipping", "tenant_x");
//! ```
//!
//! # Environment Variables
//!
//! - `TENANTRY_DEBUG=1` - Enable debug logging
//! - `TENANTRY_LOG_LEVEL=trace|debug|info|warn|error|off` - Minimum level
//! - `TENANTRY_LOG_FORMAT=pretty|compact|json` - Output format (default `json`)
//! - `TENANTRY_LOG_TIMESTAMPS=1|0` - Include timestamps

use once_cell::sync::Lazy;
use std::env;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

// ============================================================================
// Levels and formats
// ============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    /// Most verbose
    Trace = 0,
    /// Schema statements and context transitions
    Debug = 1,
    /// Per-tenant outcomes and run summaries
    Info = 2,
    /// Recoverable per-tenant failures
    Warn = 3,
    /// Aborted runs
    Error = 4,
    /// Nothing
    Off = 5,
}

impl Level {
    /// Upper-case level name.
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

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            4 => Level::Error,
            _ => Level::Off,
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
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human readable, one field per column
    Pretty,
    /// Single short line
    Compact,
    /// One JSON object per line
    Json,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Format::Pretty),
            "compact" => Ok(Format::Compact),
            "json" => Ok(Format::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

// ============================================================================
// Global configuration
// ============================================================================

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

/// Logging configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `TENANTRY_DEBUG`
    pub debug: bool,
    /// Minimum level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether to prefix lines with a timestamp
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            timestamps: true,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

impl LogConfig {
    /// Build from `TENANTRY_*` variables and publish level/debug globally.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let debug = env_flag("TENANTRY_DEBUG").unwrap_or(defaults.debug);
        let level = env::var("TENANTRY_LOG_LEVEL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(if debug { Level::Debug } else { defaults.level });
        let format = env::var("TENANTRY_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.format);
        let timestamps = env_flag("TENANTRY_LOG_TIMESTAMPS").unwrap_or(defaults.timestamps);

        DEBUG_ENABLED.store(debug, Ordering::SeqCst);
        LOG_LEVEL.store(level as u8, Ordering::SeqCst);

        Self {
            debug,
            level,
            format,
            timestamps,
        }
    }
}

/// Force configuration to be read now instead of on first log call.
pub fn init() {
    Lazy::force(&CONFIG);
}

/// The process-wide configuration.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

/// Whether `TENANTRY_DEBUG` (or [`set_debug`]) is on.
#[inline]
pub fn is_debug_enabled() -> bool {
    Lazy::force(&CONFIG);
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Whether `level` passes the current threshold.
#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    Lazy::force(&CONFIG);
    level != Level::Off && level as u8 >= LOG_LEVEL.load(Ordering::Relaxed)
}

/// Current threshold.
pub fn current_level() -> Level {
    Lazy::force(&CONFIG);
    Level::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Change the threshold at runtime.
pub fn set_level(level: Level) {
    Lazy::force(&CONFIG);
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Toggle debug mode at runtime. Enabling lowers the threshold to debug.
pub fn set_debug(enabled: bool) {
    Lazy::force(&CONFIG);
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    if enabled && current_level() > Level::Debug {
        set_level(Level::Debug);
    }
}

// ============================================================================
// Output
// ============================================================================

/// A single log line before formatting.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    /// Severity
    pub level: Level,
    /// Module path or explicit target
    pub target: &'a str,
    /// Tenant schema the line is about, if any
    pub schema: Option<&'a str>,
    /// Rendered message
    pub message: &'a str,
}

#[doc(hidden)]
pub fn log(level: Level, target: &str, schema: Option<&str>, message: &str) {
    if !is_level_enabled(level) {
        return;
    }
    let record = Record {
        level,
        target,
        schema,
        message,
    };
    let config = config();
    let line = match config.format {
        Format::Pretty => render_pretty(&record, config.timestamps),
        Format::Compact => render_compact(&record, config.timestamps),
        Format::Json => render_json(&record),
    };
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{line}");
}

/// Pretty rendering: `2024-01-01 00:00:00.000 INFO  [target] (schema) message`.
pub fn render_pretty(record: &Record<'_>, timestamps: bool) -> String {
    let mut out = String::new();
    if timestamps {
        out.push_str(&chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f ").to_string());
    }
    out.push_str(&format!("{:5} ", record.level.as_str()));
    if !record.target.is_empty() {
        out.push_str(&format!("[{}] ", record.target));
    }
    if let Some(schema) = record.schema {
        out.push_str(&format!("({schema}) "));
    }
    out.push_str(record.message);
    out
}

/// Compact rendering: `I tenant_a: message`.
pub fn render_compact(record: &Record<'_>, timestamps: bool) -> String {
    let mut out = String::new();
    if timestamps {
        out.push_str(&chrono::Local::now().format("%H:%M:%S ").to_string());
    }
    out.push(record.level.as_str().chars().next().unwrap_or('?'));
    out.push(' ');
    if let Some(schema) = record.schema {
        out.push_str(schema);
        out.push_str(": ");
    }
    out.push_str(record.message);
    out
}

/// JSON rendering, one object per line.
#[cfg(feature = "json")]
pub fn render_json(record: &Record<'_>) -> String {
    use serde::Serialize;

    #[derive(Serialize)]
    struct Entry<'a> {
        timestamp: String,
        level: &'a str,
        target: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        schema: Option<&'a str>,
        message: &'a str,
    }

    let entry = Entry {
        timestamp: chrono::Utc::now().to_rfc3339(),
        level: record.level.as_str(),
        target: record.target,
        schema: record.schema,
        message: record.message,
    };
    serde_json::to_string(&entry).unwrap_or_else(|_| record.message.to_string())
}

/// JSON rendering without serde.
#[cfg(not(feature = "json"))]
pub fn render_json(record: &Record<'_>) -> String {
    let schema = record
        .schema
        .map(|s| format!(r#","schema":"{}""#, escape_json(s)))
        .unwrap_or_default();
    format!(
        r#"{{"timestamp":"{}","level":"{}","target":"{}"{},"message":"{}"}}"#,
        chrono::Utc::now().to_rfc3339(),
        record.level.as_str(),
        escape_json(record.target),
        schema,
        escape_json(record.message)
    )
}

#[cfg(not(feature = "json"))]
fn escape_json(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

// ============================================================================
// Macros
// ============================================================================

#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:expr, target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($level) {
            $crate::log($level, $target, None, &format!($($arg)+));
        }
    };
    ($level:expr, schema: $schema:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($level) {
            $crate::log($level, module_path!(), Some(AsRef::<str>::as_ref(&$schema)), &format!($($arg)+));
        }
    };
    ($level:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($level) {
            $crate::log($level, module_path!(), None, &format!($($arg)+));
        }
    };
}

/// Log at trace level.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Trace, $($arg)+) };
}

/// Log at debug level. Also emitted when `TENANTRY_DEBUG=1`.
///
/// ```rust
/// use tenantry_log::debug;
///
/// debug!(schema: "tenant_a", "SET search_path issued");
/// ```
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Debug, $($arg)+) };
}

/// Log at info level.
#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Info, $($arg)+) };
}

/// Log at warn level.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Warn, $($arg)+) };
}

/// Log at error level.
#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => { $crate::__log!($crate::Level::Error, $($arg)+) };
}

// ============================================================================
// Tracing bridge
// ============================================================================

#[cfg(feature = "tracing")]
pub mod tracing_compat {
    //! Subscriber that honors `TENANTRY_LOG_LEVEL` when `RUST_LOG` is unset.

    use super::*;

    /// Build a fmt subscriber filtered at the configured level.
    pub fn subscriber() -> impl tracing::Subscriber {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::{EnvFilter, fmt};

        let level = match config().level {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        tracing_subscriber::registry().with(filter).with(fmt::layer())
    }
}
