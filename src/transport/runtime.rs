use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::ClientError;

#[derive(Debug, Default)]
struct RuntimeState {
    initialized: bool,
    live_clients: usize,
}

static RUNTIME: Lazy<Mutex<RuntimeState>> = Lazy::new(|| Mutex::new(RuntimeState::default()));

fn state() -> MutexGuard<'static, RuntimeState> {
    RUNTIME.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Initializes the process-wide transport runtime. Must run before the first
/// `Client` is created; repeated calls are no-ops.
pub fn global_init() {
    let mut state = state();
    if !state.initialized {
        state.initialized = true;
        debug!("Transport runtime initialized.");
    }
}

/// Tears the transport runtime down once every client is gone.
///
/// # Errors
///
/// Returns an error while any client is still alive.
pub fn global_cleanup() -> Result<(), ClientError> {
    let mut state = state();
    if state.live_clients > 0 {
        return Err(ClientError::ClientsAlive {
            count: state.live_clients,
        });
    }
    if state.initialized {
        state.initialized = false;
        debug!("Transport runtime cleaned up.");
    }
    Ok(())
}

#[must_use]
pub fn is_initialized() -> bool {
    state().initialized
}

#[must_use]
pub fn live_clients() -> usize {
    state().live_clients
}

/// Held by every client; keeps the runtime from being torn down under it.
#[derive(Debug)]
pub(crate) struct RuntimeLease {
    _private: (),
}

impl RuntimeLease {
    pub(crate) fn acquire() -> Result<Self, ClientError> {
        let mut state = state();
        if !state.initialized {
            return Err(ClientError::RuntimeNotInitialized);
        }
        state.live_clients = state.live_clients.saturating_add(1);
        Ok(Self { _private: () })
    }
}

impl Drop for RuntimeLease {
    fn drop(&mut self) {
        let mut state = state();
        state.live_clients = state.live_clients.saturating_sub(1);
    }
}
