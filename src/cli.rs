use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::{
    parse_backend_url, parse_frame_rate, parse_language, parse_seconds, parse_seed,
    parse_timeout, Options,
};
use crate::logging::LogLevel;

/// Talking avatar animation runtime
#[derive(Parser, Debug, Default)]
#[command(name = "talkhead")]
#[command(version)]
#[command(about = "Headless driver for the talking avatar animation core", long_about = None)]
pub struct Cli {
    /// Config file (key = value lines)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Question answering backend base URL
    #[arg(short, long, value_name = "URL")]
    pub backend_url: Option<String>,

    /// Frame rate of the render loop (1-240)
    #[arg(short, long, value_name = "FPS")]
    pub fps: Option<String>,

    /// How long to run, in seconds
    #[arg(short, long, value_name = "SECONDS")]
    pub seconds: Option<String>,

    /// Speech recognition language (e.g. id-ID)
    #[arg(short, long, value_name = "TAG")]
    pub lang: Option<String>,

    /// Random seed for reproducible animation
    #[arg(long, value_name = "SEED")]
    pub seed: Option<String>,

    /// Log level (error, warn, info, debug, trace or 1-5)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Send this question once the avatar is mounted
    #[arg(short, long, value_name = "TEXT")]
    pub query: Option<String>,

    /// Backend request timeout in seconds
    #[arg(short, long, value_name = "SECONDS")]
    pub timeout: Option<String>,

    /// Start with the chat panel open
    #[arg(long)]
    pub chat_open: bool,
}

impl Cli {
    /// Merge CLI arguments into the options struct
    pub fn merge_into_options(&self, mut opts: Options) -> Result<Options> {
        if let Some(ref url) = self.backend_url {
            opts.backend_url = parse_backend_url(url).context("Invalid backend URL")?;
        }

        if let Some(ref fps) = self.fps {
            opts.frame_rate = parse_frame_rate(fps)?;
        }

        if let Some(ref seconds) = self.seconds {
            opts.run_seconds = parse_seconds(seconds)?;
        }

        if let Some(ref lang) = self.lang {
            opts.speech_language = parse_language(lang)?;
        }

        if let Some(ref seed) = self.seed {
            opts.rng_seed = Some(parse_seed(seed)?);
        }

        if let Some(ref level) = self.log_level {
            opts.log_level = level
                .parse::<LogLevel>()
                .context("Invalid log level")?;
        }

        if let Some(ref log_file) = self.log_file {
            opts.log_file = Some(log_file.clone());
        }

        if let Some(ref timeout) = self.timeout {
            opts.request_timeout_secs = parse_timeout(timeout)?;
        }

        if self.chat_open {
            opts.chat_open = true;
        }

        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_args() {
        let cli = Cli::try_parse_from([
            "talkhead",
            "--fps",
            "30",
            "--seed",
            "7",
            "-q",
            "Apa kabar?",
            "--chat-open",
        ])
        .unwrap();
        assert_eq!(cli.fps.as_deref(), Some("30"));
        assert_eq!(cli.query.as_deref(), Some("Apa kabar?"));
        assert!(cli.chat_open);
    }

    #[test]
    fn test_merge_basic_options() {
        let cli = Cli {
            fps: Some("30".to_string()),
            seed: Some("42".to_string()),
            log_level: Some("trace".to_string()),
            chat_open: true,
            ..Default::default()
        };

        let opts = cli.merge_into_options(Options::default()).unwrap();
        assert_eq!(opts.frame_rate, 30);
        assert_eq!(opts.rng_seed, Some(42));
        assert_eq!(opts.log_level, LogLevel::Trace);
        assert!(opts.chat_open);
    }

    #[test]
    fn test_merge_keeps_file_values() {
        let file_opts = Options {
            frame_rate: 24,
            speech_language: "en-US".to_string(),
            ..Options::default()
        };
        let opts = Cli::default().merge_into_options(file_opts.clone()).unwrap();
        assert_eq!(opts, file_opts);
    }

    #[rstest]
    #[case::fps(Cli { fps: Some("0".into()), ..Default::default() })]
    #[case::seconds(Cli { seconds: Some("ten".into()), ..Default::default() })]
    #[case::timeout(Cli { timeout: Some("0".into()), ..Default::default() })]
    #[case::level(Cli { log_level: Some("chatty".into()), ..Default::default() })]
    #[case::url(Cli { backend_url: Some("ftp://x".into()), ..Default::default() })]
    fn test_invalid_values(#[case] cli: Cli) {
        assert!(cli.merge_into_options(Options::default()).is_err());
    }
}
