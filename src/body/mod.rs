//! Request body plumbing, split into small capabilities that are composed
//! per request kind.
//!
//! - [`PreparesBody`] runs once when the request is compiled and yields the
//!   upload source.
//! - [`ProducesUploadBody`] is driven by the worker while the transport
//!   uploads.
//! - [`ConsumesResponseBody`] receives response data on the worker and turns
//!   it into a [`ResponsePayload`] on the control thread.
mod buffered;
mod download;
mod form;
mod json;
mod upload;


use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::error::{FinalizeError, RequestError};
use crate::request::Headers;

pub use buffered::{BufferedResponse, DiscardResponse};
pub use download::FileDownload;
pub use form::FormBody;
pub use json::JsonBody;
pub use upload::{BytesUpload, FileUpload};

/// Compile-time body preparation (serialization, header derivation).
pub trait PreparesBody: Send {
    /// May add request headers and returns the source the worker will upload
    /// from. On error the body is left untouched so the request can be
    /// compiled again.
    ///
    /// # Errors
    ///
    /// Returns an error when the body cannot be produced.
    fn prepare(
        &self,
        headers: &mut Headers,
    ) -> Result<Box<dyn ProducesUploadBody>, RequestError>;
}

/// Worker-side upload source.
pub trait ProducesUploadBody: Send {
    /// Total number of bytes that will be uploaded.
    fn content_length(&self) -> u64;

    /// Fills `buf` with the next bytes. Returns 0 once exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying source cannot be read.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Releases per-request resources. Runs on the worker thread.
    fn release(&mut self) {}
}

/// Response body consumer.
pub trait ConsumesResponseBody: Send {
    /// Worker side: a chunk of response data arrived.
    ///
    /// # Errors
    ///
    /// Returns an error when the chunk cannot be stored; the transfer is then
    /// aborted.
    fn accept(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Worker side: the transport call returned, before the control thread
    /// sees the result.
    fn transfer_done(&mut self, _success: bool, _http_status: u16) {}

    /// Control side: turn the received data into a payload.
    ///
    /// # Errors
    ///
    /// Returns an error when a successful response cannot be interpreted.
    fn finalize(
        &mut self,
        success: bool,
        http_status: u16,
    ) -> Result<ResponsePayload, FinalizeError>;

    /// Worker side: release per-request resources after finalize.
    fn cleanup(&mut self) {}
}

/// What a finished request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Empty,
    Text(String),
    Json(serde_json::Value),
    /// Number of bytes that were received and discarded.
    Discarded(u64),
    File(PathBuf),
}

impl fmt::Display for ResponsePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("(empty)"),
            Self::Text(text) => write!(f, "text, {} bytes", text.len()),
            Self::Json(_) => f.write_str("json"),
            Self::Discarded(bytes) => write!(f, "{} bytes", bytes),
            Self::File(path) => write!(f, "saved to {}", path.display()),
        }
    }
}

impl ResponsePayload {
    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Empty | Self::Text(_) | Self::Discarded(_) | Self::File(_) => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Empty | Self::Json(_) | Self::Discarded(_) | Self::File(_) => None,
        }
    }
}

/// Body plumbing owned by a request until it is dispatched.
pub struct RequestBody {
    source: Option<Box<dyn PreparesBody>>,
    upload: Option<Box<dyn ProducesUploadBody>>,
    sink: Box<dyn ConsumesResponseBody>,
}

impl RequestBody {
    pub fn new(sink: impl ConsumesResponseBody + 'static) -> Self {
        Self {
            source: None,
            upload: None,
            sink: Box::new(sink),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl PreparesBody + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub(crate) fn prepare(&mut self, headers: &mut Headers) -> Result<(), RequestError> {
        // The source is only dropped once it produced an upload.
        if let Some(source) = self.source.as_ref() {
            self.upload = Some(source.prepare(headers)?);
            self.source = None;
        }
        Ok(())
    }

    pub(crate) fn into_transfer(self) -> Transfer {
        Transfer {
            upload: self.upload,
            sink: self.sink,
        }
    }
}

/// Body plumbing while a worker owns it.
pub struct Transfer {
    pub(crate) upload: Option<Box<dyn ProducesUploadBody>>,
    pub(crate) sink: Box<dyn ConsumesResponseBody>,
}
