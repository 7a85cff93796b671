use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::request::{Request, RequestId};

/// What happened when a completion notification was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The observed target was dropped before the request completed.
    TargetGone,
}

/// One-shot completion notification, invoked on the control thread from
/// inside `Client::pump`.
pub struct Callback {
    deliver: Box<dyn FnOnce(&Arc<Request>) -> Delivery>,
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}

impl Callback {
    /// A callback with no target to observe; it always fires.
    #[must_use]
    pub fn detached(callback: impl FnOnce(&Arc<Request>) + 'static) -> Self {
        Self {
            deliver: Box::new(move |request| {
                callback(request);
                Delivery::Delivered
            }),
        }
    }

    /// Fires only if `target` is still alive when the request completes.
    /// The registration holds a weak reference and never extends the
    /// target's lifetime.
    #[must_use]
    pub fn observing<T>(
        target: &Arc<T>,
        callback: impl FnOnce(&T, &Arc<Request>) + 'static,
    ) -> Self
    where
        T: ?Sized + 'static,
    {
        let target = Arc::downgrade(target);
        Self {
            deliver: Box::new(move |request| {
                target.upgrade().map_or(Delivery::TargetGone, |target| {
                    callback(&*target, request);
                    Delivery::Delivered
                })
            }),
        }
    }

    /// [`Callback::observing`] for single-threaded targets.
    #[must_use]
    pub fn observing_local<T>(
        target: &Rc<T>,
        callback: impl FnOnce(&T, &Arc<Request>) + 'static,
    ) -> Self
    where
        T: ?Sized + 'static,
    {
        let target = Rc::downgrade(target);
        Self {
            deliver: Box::new(move |request| {
                target.upgrade().map_or(Delivery::TargetGone, |target| {
                    callback(&*target, request);
                    Delivery::Delivered
                })
            }),
        }
    }

    pub(crate) fn deliver(self, request: &Arc<Request>) -> Delivery {
        (self.deliver)(request)
    }
}

/// At most one callback per request, removed when delivered or skipped.
#[derive(Debug, Default)]
pub(crate) struct CallbackRegistry {
    entries: BTreeMap<RequestId, Callback>,
}

impl CallbackRegistry {
    pub(crate) fn insert(&mut self, id: RequestId, callback: Callback) {
        self.entries.insert(id, callback);
    }

    pub(crate) fn remove(&mut self, id: RequestId) -> Option<Callback> {
        self.entries.remove(&id)
    }

    /// Delivers and forgets the callback for `request`, if any.
    pub(crate) fn dispatch(&mut self, request: &Arc<Request>) -> Option<Delivery> {
        self.remove(request.id())
            .map(|callback| callback.deliver(request))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
