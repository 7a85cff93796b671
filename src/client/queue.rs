use std::collections::VecDeque;
use std::sync::Arc;

use crate::request::Request;

/// Unbounded FIFO of compiled requests waiting for a worker.
#[derive(Debug, Default)]
pub(crate) struct AdmissionQueue {
    entries: VecDeque<Arc<Request>>,
}

impl AdmissionQueue {
    pub(crate) fn push(&mut self, request: Arc<Request>) {
        self.entries.push_back(request);
    }

    /// Puts a request back at the head, ahead of everything submitted later.
    pub(crate) fn push_front(&mut self, request: Arc<Request>) {
        self.entries.push_front(request);
    }

    pub(crate) fn pop(&mut self) -> Option<Arc<Request>> {
        self.entries.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
