use thiserror::Error;

/// Failures captured on a worker thread. They travel back to the control
/// thread as data inside the completion message.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transfer aborted by shutdown.")]
    Aborted,
    #[error("Failed to connect to {url}: {message}")]
    Connect { url: String, message: String },
    #[error("Request to {url} timed out.")]
    Timeout { url: String },
    #[error("Protocol error: {message}")]
    Protocol { message: String },
    #[error("Failed to read upload body: {source}")]
    Upload {
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to store response body: {source}")]
    Sink {
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to start transport session: {message}")]
    Session { message: String },
    #[error("Invalid request header '{name}'.")]
    InvalidHeader { name: String },
}

impl TransportError {
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    pub(crate) fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_owned(),
            }
        } else if err.is_connect() {
            Self::Connect {
                url: url.to_owned(),
                message: err.to_string(),
            }
        } else {
            Self::Protocol {
                message: err.to_string(),
            }
        }
    }
}
