//! Poll-driven client: an admission queue in front of a fixed pool of worker
//! threads, advanced only from [`Client::pump`].
//!
//! Every terminal transition and every callback happens on the thread that
//! owns the client (the "control thread"). Workers execute transport calls
//! and report back by message; they never finalize a request themselves.
mod downloader;
mod pool;
mod queue;
mod registry;
mod worker;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Failure, TransportError};
use crate::request::{Request, RequestStatus};
use crate::transport::{ReqwestTransport, RuntimeLease, Transport};

pub use downloader::Downloader;
pub use pool::WorkerStatus;
pub use registry::{Callback, Delivery};

use pool::WorkerPool;
use queue::AdmissionQueue;
use registry::CallbackRegistry;
use worker::{Completion, WorkerEvent};

pub struct Client {
    config: ClientConfig,
    queue: AdmissionQueue,
    pool: WorkerPool,
    registry: CallbackRegistry,
    closed: bool,
    _lease: RuntimeLease,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("workers", &self.pool.size())
            .field("queued", &self.queue.len())
            .field("callbacks", &self.registry.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client backed by the default reqwest transport.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport runtime is not initialized or the
    /// pool size is zero.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(ReqwestTransport::new(&config));
        Self::with_transport(config, transport)
    }

    /// Creates a client that executes requests through `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport runtime is not initialized or the
    /// pool size is zero.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        let lease = RuntimeLease::acquire()?;
        let pool = WorkerPool::new(config.workers, transport, config.error_status_threshold)?;
        Ok(Self {
            config,
            queue: AdmissionQueue::default(),
            pool,
            registry: CallbackRegistry::default(),
            closed: false,
            _lease: lease,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Compiles (if still `Building`) and enqueues `request`. The optional
    /// callback fires once, from a later `pump`, when the request reaches
    /// `Done` or `Error`.
    ///
    /// # Errors
    ///
    /// Returns an error when the request is not in `Building`/`Pending`, was
    /// already submitted, fails to compile, or the client is shut down.
    pub fn submit(
        &mut self,
        request: &Arc<Request>,
        callback: Option<Callback>,
    ) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        let id = request.id();
        let status = request.status();
        match status {
            RequestStatus::Building => request
                .compile()
                .map_err(|err| ClientError::Compile { id, source: err })?,
            RequestStatus::Pending => {}
            RequestStatus::Sending
            | RequestStatus::HeadersReceived
            | RequestStatus::Done
            | RequestStatus::Error
            | RequestStatus::Cancelled => {
                return Err(ClientError::NotSubmittable { id, status });
            }
        }
        if !request.mark_submitted() {
            return Err(ClientError::AlreadySubmitted { id });
        }
        if let Some(callback) = callback {
            self.registry.insert(id, callback);
        }
        self.queue.push(Arc::clone(request));
        debug!("Queued request {} {} {}", id, request.method(), request.url());
        Ok(())
    }

    /// Advances every state machine. Call once per application tick; it
    /// never blocks.
    ///
    /// Drains worker reports (header staging, completions, cleanup
    /// acknowledgements) in arrival order, then dispatches at most one queued
    /// request to a free worker.
    ///
    /// # Errors
    ///
    /// Returns an error when a worker thread cannot be started. The request
    /// stays at the head of the queue and running workers are unaffected.
    pub fn pump(&mut self) -> Result<(), ClientError> {
        self.drain_events();
        if self.closed {
            return Ok(());
        }
        self.dispatch_next()
    }

    /// Requests queued but not yet handed to a worker.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Requests bound to a worker and not yet finalized.
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.pool
            .count(|status| matches!(status, WorkerStatus::Active | WorkerStatus::Finished))
    }

    /// No queued requests and every worker idle.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.pool.count(|status| !status.is_free()) == 0
    }

    #[must_use]
    pub fn worker_status(&self, index: usize) -> Option<WorkerStatus> {
        self.pool.status(index)
    }

    /// Stops the pool: queued requests are cancelled (their callbacks never
    /// fire), in-flight transfers are aborted, workers are joined, and any
    /// completion they reported is finalized and delivered. Runs on drop.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pool.signal_shutdown();

        let mut cancelled = 0_usize;
        while let Some(request) = self.queue.pop() {
            drop(self.registry.remove(request.id()));
            if request.cancel().is_ok() {
                cancelled = cancelled.saturating_add(1);
            }
        }
        if cancelled > 0 {
            warn!("Client shut down with {} queued request(s); cancelled.", cancelled);
        }

        self.pool.join_workers();
        self.drain_events();
        debug!("Client shut down.");
    }

    fn drain_events(&mut self) {
        while let Some(event) = self.pool.try_event() {
            match event {
                WorkerEvent::HeadersReady { index, headers } => {
                    if let Some(request) = self.pool.request(index)
                        && request.status() == RequestStatus::Sending
                        && let Err(err) = request.finalize_headers(headers)
                    {
                        warn!("Dropping headers for request {}: {}", request.id(), err);
                    }
                }
                WorkerEvent::Finished { index, completion } => {
                    self.pool.set_status(index, WorkerStatus::Finished);
                    self.complete(index, completion);
                }
                WorkerEvent::Ready { index } => {
                    self.pool.set_status(index, WorkerStatus::Ready);
                }
            }
        }
    }

    /// Finished -> terminal request state -> callback -> Cleaning.
    fn complete(&mut self, index: usize, completion: Completion) {
        let Completion {
            outcome,
            headers,
            mut sink,
        } = completion;
        let Some(request) = self.pool.request(index) else {
            error!("Worker {} finished without a bound request.", index);
            self.pool.begin_cleanup(index, sink);
            return;
        };

        if let Some(headers) = headers
            && request.status() == RequestStatus::Sending
            && let Err(err) = request.finalize_headers(headers)
        {
            warn!("Dropping headers for request {}: {}", request.id(), err);
        }

        let http_status = outcome.http_status;
        let mut recorded_status = http_status;
        let (payload, failure) = match outcome.result {
            Err(err) => {
                // A transport failure never reports an HTTP status, even when
                // headers had already arrived.
                recorded_status = 0;
                (
                    sink.finalize(false, http_status).ok(),
                    Some(Failure::Transport(err)),
                )
            }
            Ok(()) if http_status >= self.config.error_status_threshold => (
                sink.finalize(false, http_status).ok(),
                Some(Failure::Http {
                    status: http_status,
                }),
            ),
            Ok(()) => match sink.finalize(true, http_status) {
                Ok(payload) => (Some(payload), None),
                Err(err) => (None, Some(Failure::Finalize(err))),
            },
        };
        if let Some(failure) = failure.as_ref() {
            warn!("Request {} {} failed: {}", request.id(), request.url(), failure);
        }
        if failure.is_none() {
            debug!("Request {} done (status {}).", request.id(), http_status);
        }
        if let Err(err) = request.finish(recorded_status, payload, failure) {
            error!("Failed to finalize request {}: {}", request.id(), err);
        }

        if self.registry.dispatch(&request) == Some(Delivery::TargetGone) {
            debug!("Callback target for request {} is gone; skipped.", request.id());
        }
        self.pool.begin_cleanup(index, sink);
    }

    fn dispatch_next(&mut self) -> Result<(), ClientError> {
        let Some(index) = self.pool.free_slot() else {
            return Ok(());
        };
        let request = loop {
            let Some(request) = self.queue.pop() else {
                return Ok(());
            };
            if request.status() == RequestStatus::Pending {
                break request;
            }
            debug!("Discarding request {} ({}).", request.id(), request.status());
            drop(self.registry.remove(request.id()));
        };

        if let Err(err) = self.pool.ensure_started(index) {
            self.queue.push_front(request);
            return Err(err);
        }
        let (call, transfer) = match request.begin_sending() {
            Ok(handoff) => handoff,
            Err(err) => {
                debug!("Request {} not dispatched: {}", request.id(), err);
                drop(self.registry.remove(request.id()));
                return Ok(());
            }
        };
        debug!("Dispatching request {} to worker {}.", request.id(), index);
        if let Err(err) = self.pool.assign(index, Arc::clone(&request), call, transfer) {
            let failure = Failure::Transport(TransportError::Session {
                message: err.to_string(),
            });
            if let Err(finish_err) = request.finish(0, None, Some(failure)) {
                error!("Failed to finalize request {}: {}", request.id(), finish_err);
            }
            if self.registry.dispatch(&request) == Some(Delivery::TargetGone) {
                debug!("Callback target for request {} is gone; skipped.", request.id());
            }
            return Err(err);
        }
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown();
    }
}
