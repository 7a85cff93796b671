use thiserror::Error;

use crate::request::{RequestId, RequestStatus};

/// Failures reported synchronously to the caller of `submit`, `pump`, or the
/// global runtime functions.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request {id} cannot be submitted while {status}.")]
    NotSubmittable { id: RequestId, status: RequestStatus },
    #[error("Request {id} was already submitted.")]
    AlreadySubmitted { id: RequestId },
    #[error("Failed to compile request {id}: {source}")]
    Compile {
        id: RequestId,
        #[source]
        source: super::RequestError,
    },
    #[error("Unable to spawn worker thread {index}: {source}")]
    SpawnWorker {
        index: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("Worker {index} is no longer reachable.")]
    WorkerGone { index: usize },
    #[error("Worker pool size must be >= 1.")]
    EmptyPool,
    #[error("Client has been shut down.")]
    Closed,
    #[error("Failed to prepare download of '{url}': {source}")]
    PrepareDownload {
        url: String,
        #[source]
        source: super::RequestError,
    },
    #[error("Transport runtime is not initialized; call transport::global_init first.")]
    RuntimeNotInitialized,
    #[error("Transport runtime still has {count} live client(s).")]
    ClientsAlive { count: usize },
}
