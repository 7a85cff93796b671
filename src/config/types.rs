use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::args::FetchMethod;
use crate::error::{ConfigError, ValidationError};

use super::parse::parse_duration_value;

pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ERROR_STATUS: u16 = 400;
pub const DEFAULT_IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub const DEFAULT_USER_AGENT: &str = concat!("tickhttp/", env!("CARGO_PKG_VERSION"));

/// Settings for a [`Client`](crate::client::Client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Pool size: the maximum number of concurrently executing requests.
    pub workers: usize,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Responses with a status at or above this value end in `Error`.
    pub error_status_threshold: u16,
    /// Suggested pump cadence for hosts without their own tick.
    pub idle_poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            error_status_threshold: DEFAULT_ERROR_STATUS,
            idle_poll_interval: DEFAULT_IDLE_POLL_INTERVAL,
        }
    }
}

impl ClientConfig {
    /// # Errors
    ///
    /// Returns an error when a field is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::FieldMustBePositive { field: "workers" });
        }
        if !(100..=599).contains(&self.error_status_threshold) {
            return Err(ConfigError::ErrorStatusOutOfRange {
                value: self.error_status_threshold,
            });
        }
        Ok(())
    }

    /// Overlays the values set in `file` on top of `self`.
    ///
    /// # Errors
    ///
    /// Returns an error when a file value is invalid.
    pub fn merge_file(mut self, file: &ConfigFile) -> Result<Self, ConfigError> {
        if let Some(workers) = file.workers {
            self.workers = workers;
        }
        if let Some(user_agent) = file.user_agent.as_ref() {
            self.user_agent.clone_from(user_agent);
        }
        if let Some(timeout) = file.timeout.as_ref() {
            self.request_timeout = timeout.to_duration("timeout")?;
        }
        if let Some(timeout) = file.connect_timeout.as_ref() {
            self.connect_timeout = timeout.to_duration("connect_timeout")?;
        }
        if let Some(status) = file.error_status {
            self.error_status_threshold = status;
        }
        if let Some(tick) = file.tick.as_ref() {
            self.idle_poll_interval = tick.to_duration("tick")?;
        }
        self.validate()?;
        Ok(self)
    }
}

/// On-disk configuration (`tickhttp.toml` / `tickhttp.json`). Every field is
/// optional; unset fields keep their defaults or CLI values.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(alias = "concurrency")]
    pub workers: Option<usize>,
    pub user_agent: Option<String>,
    pub timeout: Option<DurationValue>,
    pub connect_timeout: Option<DurationValue>,
    pub error_status: Option<u16>,
    pub tick: Option<DurationValue>,
    pub method: Option<FetchMethod>,
    pub headers: Option<Vec<String>>,
    pub urls: Option<Vec<String>>,
    pub download_dir: Option<PathBuf>,
}

/// Either whole seconds or a `ms/s/m/h` string.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    /// # Errors
    ///
    /// Returns an error when the value is zero or malformed.
    pub fn to_duration(&self, field: &'static str) -> Result<Duration, ConfigError> {
        let parsed = match self {
            Self::Seconds(0) => Err(ValidationError::DurationZero),
            Self::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            Self::Text(text) => parse_duration_value(text),
        };
        parsed.map_err(|err| ConfigError::InvalidDuration { field, source: err })
    }
}
