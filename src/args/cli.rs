use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::config::types::{DEFAULT_ERROR_STATUS, DEFAULT_USER_AGENT, DEFAULT_WORKERS};

use super::parsers::{parse_duration_arg, parse_header, parse_positive_usize};

/// Methods the CLI can issue without a request body.
#[derive(Debug, Clone, Copy, ValueEnum, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    Get,
    Head,
}

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Fetch or download URLs through a bounded pool of HTTP worker threads driven from a single tick loop."
)]
pub struct CliArgs {
    /// URLs to fetch
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Number of worker threads (maximum concurrent requests)
    #[arg(long, short = 'w', default_value_t = DEFAULT_WORKERS, value_parser = parse_positive_usize)]
    pub workers: usize,

    /// User-Agent header sent with every request
    #[arg(long = "user-agent", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Per-request timeout (supports ms/s/m/h)
    #[arg(long = "timeout", default_value = "30s", value_parser = parse_duration_arg)]
    pub request_timeout: Duration,

    /// Connection timeout (supports ms/s/m/h)
    #[arg(long = "connect-timeout", default_value = "10s", value_parser = parse_duration_arg)]
    pub connect_timeout: Duration,

    /// Responses with a status at or above this value count as failures
    #[arg(long = "error-status", default_value_t = DEFAULT_ERROR_STATUS, value_parser = clap::value_parser!(u16).range(100..=599))]
    pub error_status: u16,

    /// Path to a TOML or JSON config file (defaults to tickhttp.toml / tickhttp.json)
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Save response bodies into this directory instead of printing a summary
    #[arg(long = "download-dir", short = 'o')]
    pub download_dir: Option<PathBuf>,

    /// HTTP method
    #[arg(long, short = 'X', value_enum, default_value_t = FetchMethod::Get)]
    pub method: FetchMethod,

    /// Extra request header, 'Key: Value' (repeatable)
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// How often the client is pumped (supports ms/s/m/h)
    #[arg(long = "tick-ms", default_value = "10ms", value_parser = parse_duration_arg)]
    pub tick: Duration,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl CliArgs {
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            workers: self.workers,
            user_agent: self.user_agent.clone(),
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            error_status_threshold: self.error_status,
            idle_poll_interval: self.tick,
        }
    }
}
