//! Runtime options
//!
//! Options come from built-in defaults, then an optional `key = value`
//! config file, then the command line. File values and CLI values go
//! through the same `parse_*` helpers.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::warn;

use crate::chat::DEFAULT_LANGUAGE;
use crate::logging::LogLevel;

/// Backend used when neither the environment nor the options name one
pub const DEFAULT_BACKEND_URL: &str = "https://klaris.my.id/backend2";

/// Environment variable overriding [`DEFAULT_BACKEND_URL`]
pub const BACKEND_URL_ENV: &str = "TALKHEAD_BACKEND_URL";

pub const DEFAULT_FRAME_RATE: u32 = 60;
pub const MAX_FRAME_RATE: u32 = 240;

/// One day of headless running
pub const MAX_RUN_SECONDS: u64 = 86_400;

/// Application options that can be set via CLI or config file
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub backend_url: String,
    pub frame_rate: u32,
    /// How long the headless driver runs
    pub run_seconds: u64,
    pub speech_language: String,
    /// Fixes every random choice when set
    pub rng_seed: Option<u64>,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub chat_open: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            frame_rate: DEFAULT_FRAME_RATE,
            run_seconds: 10,
            speech_language: DEFAULT_LANGUAGE.to_string(),
            rng_seed: None,
            log_level: LogLevel::Info,
            log_file: None,
            request_timeout_secs: 30,
            chat_open: false,
        }
    }
}

impl Options {
    /// Fixed frame delta at the configured rate
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.max(1)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Total number of frames the headless driver runs
    pub fn frame_budget(&self) -> u64 {
        self.run_seconds.saturating_mul(u64::from(self.frame_rate))
    }

    /// Apply one config-file entry
    fn apply(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "backend_url" => self.backend_url = parse_backend_url(value)?,
            "frame_rate" | "fps" => self.frame_rate = parse_frame_rate(value)?,
            "run_seconds" | "seconds" => self.run_seconds = parse_seconds(value)?,
            "speech_language" | "lang" => self.speech_language = parse_language(value)?,
            "rng_seed" | "seed" => self.rng_seed = Some(parse_seed(value)?),
            "log_level" => self.log_level = value.parse()?,
            "log_file" => self.log_file = Some(PathBuf::from(value)),
            "request_timeout_secs" | "timeout" => self.request_timeout_secs = parse_timeout(value)?,
            "chat_open" => self.chat_open = parse_bool(value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Backend URL from the environment, or the built-in one
pub fn default_backend_url() -> String {
    match env::var(BACKEND_URL_ENV) {
        Ok(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => DEFAULT_BACKEND_URL.to_string(),
    }
}

/// Load options from a config file on top of the defaults
pub fn load_config(path: &Path) -> Result<Options> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_config(&data).with_context(|| format!("invalid config file {}", path.display()))
}

/// Parse `key = value` lines; `#` starts a comment
pub fn parse_config(data: &str) -> Result<Options> {
    let mut opts = Options::default();

    for (index, raw) in data.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            bail!("line {}: expected key = value", line_no);
        };
        let key = key.trim();
        let value = value.trim();

        let known = opts
            .apply(key, value)
            .with_context(|| format!("line {}: invalid value for {}", line_no, key))?;
        if !known {
            warn!(key, line = line_no, "unknown config key ignored");
        }
    }

    Ok(opts)
}

pub fn parse_frame_rate(s: &str) -> Result<u32> {
    let fps: u32 = s.trim().parse().context("Invalid frame rate")?;
    if fps == 0 || fps > MAX_FRAME_RATE {
        bail!("Frame rate out of range (1 to {})", MAX_FRAME_RATE);
    }
    Ok(fps)
}

pub fn parse_seconds(s: &str) -> Result<u64> {
    let secs: u64 = s.trim().parse().context("Invalid run time in seconds")?;
    if secs > MAX_RUN_SECONDS {
        bail!("Run time out of range (0 to {})", MAX_RUN_SECONDS);
    }
    Ok(secs)
}

pub fn parse_seed(s: &str) -> Result<u64> {
    s.trim().parse().context("Invalid random seed")
}

pub fn parse_timeout(s: &str) -> Result<u64> {
    let secs: u64 = s.trim().parse().context("Invalid request timeout")?;
    if secs == 0 {
        bail!("Request timeout must be positive");
    }
    Ok(secs)
}

/// BCP 47 style tag such as `id-ID`
pub fn parse_language(s: &str) -> Result<String> {
    let tag = s.trim();
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        bail!("Invalid speech language tag: {:?}", s);
    }
    Ok(tag.to_string())
}

pub fn parse_backend_url(s: &str) -> Result<String> {
    let url = s.trim().trim_end_matches('/');
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("Backend URL must start with http:// or https://");
    }
    Ok(url.to_string())
}

pub fn parse_bool(s: &str) -> Result<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("Invalid boolean: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("60").unwrap(), 60);
        assert_eq!(parse_frame_rate(" 240 ").unwrap(), 240);
        assert!(parse_frame_rate("0").is_err());
        assert!(parse_frame_rate("241").is_err());
        assert!(parse_frame_rate("fast").is_err());
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("0").unwrap(), 0);
        assert_eq!(parse_seconds("86400").unwrap(), MAX_RUN_SECONDS);
        assert!(parse_seconds("86401").is_err());
        assert!(parse_seconds("18446744073709551615").is_err());
        assert!(parse_seconds("-3").is_err());
    }

    #[test]
    fn test_frame_budget_saturates() {
        let opts = Options {
            run_seconds: u64::MAX,
            frame_rate: MAX_FRAME_RATE,
            ..Options::default()
        };
        assert_eq!(opts.frame_budget(), u64::MAX);
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("5").unwrap(), 5);
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("-1").is_err());
    }

    #[test]
    fn test_parse_language() {
        assert_eq!(parse_language("en-US").unwrap(), "en-US");
        assert!(parse_language("").is_err());
        assert!(parse_language("id ID").is_err());
    }

    #[test]
    fn test_parse_backend_url() {
        assert_eq!(
            parse_backend_url("http://localhost:8000/").unwrap(),
            "http://localhost:8000"
        );
        assert!(parse_backend_url("localhost:8000").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("Yes").unwrap());
        assert!(!parse_bool("off").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    #[serial]
    fn test_options_default() {
        env::remove_var(BACKEND_URL_ENV);
        let opts = Options::default();
        assert_eq!(opts.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(opts.frame_rate, 60);
        assert_eq!(opts.speech_language, "id-ID");
        assert_eq!(opts.log_level, LogLevel::Info);
        assert!(opts.rng_seed.is_none());
        assert!(!opts.chat_open);
        assert_eq!(opts.frame_budget(), 600);
    }

    #[test]
    #[serial]
    fn test_backend_url_from_env() {
        env::set_var(BACKEND_URL_ENV, "http://127.0.0.1:9000");
        let opts = Options::default();
        env::remove_var(BACKEND_URL_ENV);
        assert_eq!(opts.backend_url, "http://127.0.0.1:9000");
    }

    #[test]
    #[serial]
    fn test_parse_config() {
        let opts = parse_config(
            "# talkhead\n\
             fps = 30\n\
             seed = 42   # fixed\n\
             \n\
             lang=en-US\n\
             chat_open = yes\n\
             log_level = debug\n\
             colour = blue\n",
        )
        .unwrap();
        assert_eq!(opts.frame_rate, 30);
        assert_eq!(opts.rng_seed, Some(42));
        assert_eq!(opts.speech_language, "en-US");
        assert!(opts.chat_open);
        assert_eq!(opts.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_parse_config_errors_name_line_and_key() {
        let err = parse_config("fps = 30\nfps = 1000\n").unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("line 2"), "{msg}");
        assert!(msg.contains("fps"), "{msg}");

        let err = parse_config("just words\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    #[serial]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend_url = http://localhost:8000/").unwrap();
        writeln!(file, "timeout = 5").unwrap();
        let opts = load_config(file.path()).unwrap();
        assert_eq!(opts.backend_url, "http://localhost:8000");
        assert_eq!(opts.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("absent.cfg")).is_err());
    }
}
