//! The network collaborator seen from a worker thread.
//!
//! A [`Transport`] is shared by the whole pool and opens one
//! [`TransportSession`] per worker thread. A session performs one blocking
//! call at a time and drives an [`Exchange`], the worker-side callback surface
//! that feeds the upload, stages response headers, receives body chunks and
//! publishes progress.
mod http;
mod runtime;

#[cfg(test)]
mod tests;

use std::io;

use crate::error::TransportError;
use crate::request::{Headers, Method, Progress, RequestId};

pub use http::ReqwestTransport;
pub(crate) use runtime::RuntimeLease;
pub use runtime::{global_cleanup, global_init, is_initialized, live_clients};

/// Immutable description of one transport call.
#[derive(Debug, Clone)]
pub struct TransportCall {
    pub id: RequestId,
    pub method: Method,
    pub url: String,
    pub headers: Headers,
}

/// Whether the session should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Abort,
}

/// Result of a transport call. `http_status` is 0 when no response arrived.
#[derive(Debug)]
pub struct TransportOutcome {
    pub result: Result<(), TransportError>,
    pub http_status: u16,
}

impl TransportOutcome {
    #[must_use]
    pub const fn completed(http_status: u16) -> Self {
        Self {
            result: Ok(()),
            http_status,
        }
    }

    #[must_use]
    pub const fn failed(error: TransportError, http_status: u16) -> Self {
        Self {
            result: Err(error),
            http_status,
        }
    }
}

/// Callbacks a session invokes on the worker thread while a call runs.
pub trait Exchange {
    /// Upload size in bytes; 0 when the request carries no body.
    fn upload_len(&self) -> u64;

    /// Reads the next slice of the upload. Returns 0 once exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error when the upload source fails.
    fn read_upload(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// The HTTP status line, e.g. `HTTP/1.1 200 OK`.
    fn status_line(&mut self, line: &str);

    fn header(&mut self, name: &str, value: &str);

    /// All response headers have been staged.
    fn headers_complete(&mut self);

    fn data(&mut self, chunk: &[u8]) -> Flow;

    /// Called regularly, including while the session waits on the network.
    fn progress(&mut self, progress: Progress) -> Flow;
}

/// Factory shared by every worker.
pub trait Transport: Send + Sync {
    /// Opens the per-thread session. Called once on each worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error when the session cannot be created; every call on that
    /// worker then fails with it.
    fn open_session(&self) -> Result<Box<dyn TransportSession>, TransportError>;
}

pub trait TransportSession {
    /// Performs `call`, blocking until it completes or `exchange` aborts it.
    fn perform(&mut self, call: &TransportCall, exchange: &mut dyn Exchange) -> TransportOutcome;
}

/// Reads the whole upload through `exchange`.
///
/// # Errors
///
/// Returns an error when the upload source fails.
pub fn collect_upload(exchange: &mut dyn Exchange) -> Result<Vec<u8>, TransportError> {
    let expected = usize::try_from(exchange.upload_len()).unwrap_or(0);
    let mut body = Vec::with_capacity(expected);
    let mut buf = [0_u8; 16 * 1024];
    loop {
        let read = exchange
            .read_upload(&mut buf)
            .map_err(|err| TransportError::Upload { source: err })?;
        match buf.get(..read) {
            Some([]) | None => return Ok(body),
            Some(chunk) => body.extend_from_slice(chunk),
        }
    }
}
