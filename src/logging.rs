//! Log setup
//!
//! Library code logs through `tracing`; the binary installs a fmt subscriber
//! here. `RUST_LOG` takes precedence over the configured level.

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use tracing_subscriber::EnvFilter;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Verbosity, most severe first
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    #[default]
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Create a LogLevel from an integer; out of range falls back to Info
    pub fn from_i32(level: i32) -> Self {
        match level {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }

    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<i32>() {
            if !(1..=5).contains(&n) {
                bail!("log level out of range: {}", n);
            }
            return Ok(LogLevel::from_i32(n));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => bail!("unknown log level: {}", other),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Filter for `level`, unless `RUST_LOG` is set
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber
///
/// Writes to stderr, or appends to `log_file` without ANSI colours. Calling
/// it again after a successful install does nothing.
pub fn init(level: LogLevel, log_file: Option<&Path>) -> Result<()> {
    if INSTALLED.load(Ordering::SeqCst) {
        return Ok(());
    }

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(level));
    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install log subscriber: {}", e))?;

    INSTALLED.store(true, Ordering::SeqCst);
    tracing::info!(%level, file = ?log_file, "logging initialized");
    Ok(())
}
