use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use tracing::debug;

use crate::error::ClientError;
use crate::request::Request;

use super::{Callback, Client, Delivery};

type InFlight = RefCell<BTreeMap<String, Arc<Request>>>;

/// File downloads on top of a [`Client`], never fetching the same URL twice
/// at the same time.
pub struct Downloader {
    // Dropped first: shutdown delivers callbacks that still touch `in_flight`.
    client: Client,
    in_flight: Rc<InFlight>,
}

impl Downloader {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            in_flight: Rc::new(RefCell::new(BTreeMap::new())),
        }
    }

    /// Starts downloading `url` into `dest`, or returns the request already
    /// fetching `url`. `callback` is only attached to a newly created
    /// request.
    ///
    /// # Errors
    ///
    /// Returns an error when the destination cannot be prepared or the
    /// request cannot be submitted.
    pub fn download(
        &mut self,
        url: &str,
        dest: impl AsRef<Path>,
        callback: Option<Callback>,
    ) -> Result<Arc<Request>, ClientError> {
        if let Some(existing) = self.in_flight.borrow().get(url)
            && !existing.is_terminal()
        {
            debug!("Download of {} already in flight as {}.", url, existing.id());
            return Ok(Arc::clone(existing));
        }

        let request = Request::download(url, dest).map_err(|err| ClientError::PrepareDownload {
            url: url.to_owned(),
            source: err,
        })?;
        let request = Arc::new(request);
        let tracker = Callback::observing_local(&self.in_flight, move |in_flight, request| {
            in_flight.borrow_mut().remove(request.url());
            if let Some(callback) = callback
                && callback.deliver(request) == Delivery::TargetGone
            {
                debug!("Download callback target for {} is gone; skipped.", request.url());
            }
        });
        self.client.submit(&request, Some(tracker))?;
        self.in_flight
            .borrow_mut()
            .insert(url.to_owned(), Arc::clone(&request));
        Ok(request)
    }

    /// See [`Client::pump`].
    ///
    /// # Errors
    ///
    /// Returns an error when a worker thread cannot be started.
    pub fn pump(&mut self) -> Result<(), ClientError> {
        self.client.pump()
    }

    #[must_use]
    pub fn is_downloading(&self, url: &str) -> bool {
        self.in_flight
            .borrow()
            .get(url)
            .is_some_and(|request| !request.is_terminal())
    }

    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight
            .borrow()
            .values()
            .filter(|request| !request.is_terminal())
            .count()
    }

    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    pub const fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }
}
