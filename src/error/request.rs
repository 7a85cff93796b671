use std::path::PathBuf;

use thiserror::Error;

use super::TransportError;
use crate::request::{RequestId, RequestStatus};

/// Errors raised while building or manipulating a request on the control
/// thread.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Headers of request {id} are frozen (status {status}).")]
    HeadersFrozen { id: RequestId, status: RequestStatus },
    #[error("Request {id} cannot be cancelled while {status}.")]
    NotCancellable { id: RequestId, status: RequestStatus },
    #[error("Illegal transition of request {id} from {from} to {to}.")]
    IllegalTransition {
        id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    },
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unsupported URL scheme '{scheme}'. Use http or https.")]
    UnsupportedScheme { scheme: String },
    #[error("Failed to serialize JSON body: {source}")]
    SerializeJson {
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to read upload file '{path}': {source}")]
    UploadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to create download directory '{path}': {source}")]
    DownloadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Request body was already handed to a worker.")]
    BodyTaken,
}

/// The response arrived but could not be interpreted.
#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("Unable to parse JSON response: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to move download into '{path}': {source}")]
    PersistDownload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a request ended in `Error`.
#[derive(Debug, Error)]
pub enum Failure {
    #[error("transport failure: {0}")]
    Transport(#[source] TransportError),
    #[error("HTTP status {status}")]
    Http { status: u16 },
    #[error("finalize failure: {0}")]
    Finalize(#[source] FinalizeError),
}

impl Failure {
    /// HTTP status retained by the failure, if any response was received.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http { status } => Some(*status),
            Self::Transport(_) | Self::Finalize(_) => None,
        }
    }
}
