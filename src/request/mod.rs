//! Requests and their lifecycle.
//!
//! A [`Request`] is shared (`Arc`) between the caller, the client's queue,
//! the callback registry and the worker executing it. Identity and request
//! headers are frozen once it leaves `Building`; the worker only ever writes
//! the progress counters, and every terminal field is written once from the
//! control thread during `Client::pump`.
mod progress;
mod status;


use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use tracing::debug;

use crate::body::{
    BufferedResponse, DiscardResponse, FileDownload, FileUpload, FormBody, JsonBody, RequestBody,
    ResponsePayload, Transfer,
};
use crate::error::{Failure, RequestError};
use crate::transport::TransportCall;

pub use progress::Progress;
pub(crate) use progress::ProgressCounters;
pub use status::RequestStatus;
use status::StatusCell;

/// Header map used for both request and response headers.
pub type Headers = BTreeMap<String, String>;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique request identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Head,
    Put,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Head => "HEAD",
            Self::Put => "PUT",
        }
    }

    /// Whether requests with this method stream an upload body.
    #[must_use]
    pub const fn sends_body(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work.
pub struct Request {
    id: RequestId,
    method: Method,
    url: String,
    status: StatusCell,
    headers: Mutex<Headers>,
    body: Mutex<Option<RequestBody>>,
    submitted: AtomicBool,
    progress: ProgressCounters,
    response_headers: OnceLock<Headers>,
    http_status: OnceLock<u16>,
    payload: OnceLock<ResponsePayload>,
    failure: OnceLock<Failure>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Request {
    /// Creates a request in `Building` with the given body plumbing.
    pub fn new(method: Method, url: impl Into<String>, body: RequestBody) -> Self {
        Self {
            id: RequestId::next(),
            method,
            url: url.into(),
            status: StatusCell::new(RequestStatus::Building),
            headers: Mutex::new(Headers::new()),
            body: Mutex::new(Some(body)),
            submitted: AtomicBool::new(false),
            progress: ProgressCounters::default(),
            response_headers: OnceLock::new(),
            http_status: OnceLock::new(),
            payload: OnceLock::new(),
            failure: OnceLock::new(),
        }
    }

    /// GET whose response body is buffered and interpreted on completion.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(
            Method::Get,
            url,
            RequestBody::new(BufferedResponse::default()),
        )
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(
            Method::Head,
            url,
            RequestBody::new(DiscardResponse::default()),
        )
    }

    /// URL-encoded form POST.
    pub fn post_form(url: impl Into<String>, form: FormBody) -> Self {
        Self::new(
            Method::Post,
            url,
            RequestBody::new(BufferedResponse::default()).with_source(form),
        )
    }

    /// POST of a JSON document, serialized when the request is compiled.
    pub fn post_json(url: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(
            Method::Post,
            url,
            RequestBody::new(BufferedResponse::default()).with_source(JsonBody::new(value)),
        )
    }

    /// PUT streaming a file from disk.
    pub fn put_file(url: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::new(
            Method::Put,
            url,
            RequestBody::new(BufferedResponse::default()).with_source(FileUpload::new(path)),
        )
    }

    /// GET written to `dest` through a temporary file.
    ///
    /// # Errors
    ///
    /// Returns an error when the destination directory cannot be created.
    pub fn download(url: impl Into<String>, dest: impl AsRef<Path>) -> Result<Self, RequestError> {
        let sink = FileDownload::new(dest)?;
        Ok(Self::new(Method::Get, url, RequestBody::new(sink)))
    }

    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.status.load()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status() == RequestStatus::Done
    }

    /// Sets a request header. Only allowed while `Building`.
    ///
    /// # Errors
    ///
    /// Returns an error once the request has been compiled.
    pub fn set_header(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), RequestError> {
        let mut headers = self.lock_headers();
        let status = self.status();
        if status != RequestStatus::Building {
            return Err(RequestError::HeadersFrozen {
                id: self.id,
                status,
            });
        }
        headers.insert(name.into(), value.into());
        Ok(())
    }

    #[must_use]
    pub fn request_headers(&self) -> Headers {
        self.lock_headers().clone()
    }

    /// Response headers, available from `HeadersReceived` on.
    #[must_use]
    pub fn response_headers(&self) -> Option<&Headers> {
        self.response_headers.get()
    }

    /// Case-insensitive response header lookup.
    #[must_use]
    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response_headers()?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// HTTP status of the response; `None` before completion or when no
    /// response was received.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        self.http_status.get().copied().filter(|status| *status != 0)
    }

    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        self.failure.get()
    }

    #[must_use]
    pub fn payload(&self) -> Option<&ResponsePayload> {
        self.payload.get()
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        self.progress.snapshot()
    }

    #[must_use]
    pub fn upload_fraction(&self) -> f64 {
        self.progress().upload_fraction()
    }

    #[must_use]
    pub fn download_fraction(&self) -> f64 {
        self.progress().download_fraction()
    }

    /// Cancels the request if it has not started executing.
    ///
    /// # Errors
    ///
    /// Returns an error unless the request is `Pending`.
    pub fn cancel(&self) -> Result<(), RequestError> {
        self.status
            .advance(RequestStatus::Pending, RequestStatus::Cancelled)
            .map_err(|status| RequestError::NotCancellable {
                id: self.id,
                status,
            })
    }

    fn lock_headers(&self) -> std::sync::MutexGuard<'_, Headers> {
        self.headers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_body(&self) -> std::sync::MutexGuard<'_, Option<RequestBody>> {
        self.body.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self, from: RequestStatus, to: RequestStatus) -> Result<(), RequestError> {
        self.status
            .advance(from, to)
            .map_err(|_| RequestError::IllegalTransition {
                id: self.id,
                from: self.status(),
                to,
            })
    }

    /// Claims the request for a single client. Returns false if it was
    /// already submitted somewhere.
    pub(crate) fn mark_submitted(&self) -> bool {
        !self.submitted.swap(true, Ordering::AcqRel)
    }

    /// Building -> Pending: validates the target and prepares the body.
    pub(crate) fn compile(&self) -> Result<(), RequestError> {
        validate_url(&self.url)?;
        let mut headers = self.lock_headers();
        let status = self.status();
        if status != RequestStatus::Building {
            return Err(RequestError::IllegalTransition {
                id: self.id,
                from: status,
                to: RequestStatus::Pending,
            });
        }
        if let Some(body) = self.lock_body().as_mut() {
            body.prepare(&mut headers)?;
        }
        drop(headers);
        self.advance(RequestStatus::Building, RequestStatus::Pending)
    }

    /// Pending -> Sending. Hands the body plumbing to the caller (the worker
    /// that is about to execute the request).
    pub(crate) fn begin_sending(&self) -> Result<(TransportCall, Transfer), RequestError> {
        self.advance(RequestStatus::Pending, RequestStatus::Sending)?;
        let body = self.lock_body().take().ok_or(RequestError::BodyTaken)?;
        let call = TransportCall {
            id: self.id,
            method: self.method,
            url: self.url.clone(),
            headers: self.request_headers(),
        };
        Ok((call, body.into_transfer()))
    }

    /// Worker side: publish progress counters.
    pub(crate) fn record_progress(&self, progress: Progress) {
        self.progress.store(progress);
    }

    /// Sending -> HeadersReceived, storing the response headers once.
    pub(crate) fn finalize_headers(&self, headers: Headers) -> Result<(), RequestError> {
        self.advance(RequestStatus::Sending, RequestStatus::HeadersReceived)?;
        if self.response_headers.set(headers).is_err() {
            debug!("Response headers already recorded for request {}.", self.id);
        }
        Ok(())
    }

    /// Moves the request into `Done` (no failure) or `Error`.
    pub(crate) fn finish(
        &self,
        http_status: u16,
        payload: Option<ResponsePayload>,
        failure: Option<Failure>,
    ) -> Result<(), RequestError> {
        let from = self.status();
        let to = if failure.is_some() {
            RequestStatus::Error
        } else {
            RequestStatus::Done
        };
        if self.http_status.set(http_status).is_err() {
            debug!("HTTP status already recorded for request {}.", self.id);
        }
        if let Some(payload) = payload
            && self.payload.set(payload).is_err()
        {
            debug!("Payload already recorded for request {}.", self.id);
        }
        if let Some(failure) = failure
            && self.failure.set(failure).is_err()
        {
            debug!("Failure already recorded for request {}.", self.id);
        }
        self.advance(from, to)
    }
}

fn validate_url(value: &str) -> Result<(), RequestError> {
    let parsed = url::Url::parse(value).map_err(|err| RequestError::InvalidUrl {
        url: value.to_owned(),
        source: err,
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(RequestError::UnsupportedScheme {
            scheme: other.to_owned(),
        }),
    }
}
