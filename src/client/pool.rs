use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc::{
    self, UnboundedReceiver, UnboundedSender,
    error::{SendError, TryRecvError},
};
use tracing::{debug, error, warn};

use crate::body::{ConsumesResponseBody, Transfer};
use crate::error::ClientError;
use crate::request::Request;
use crate::shutdown::ShutdownSignal;
use crate::transport::{Transport, TransportCall};

use super::worker::{WorkerCommand, WorkerContext, WorkerEvent, run_worker};

/// Control-side view of a worker.
///
/// `Unused -> Active -> Finished -> Cleaning -> Ready -> Active -> ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Thread not started yet.
    Unused,
    /// A transport call is in flight.
    Active,
    /// Result reported, waiting for the control thread.
    Finished,
    /// Result consumed; the worker is releasing per-request resources.
    Cleaning,
    /// Idle and parked.
    Ready,
}

impl WorkerStatus {
    #[must_use]
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Unused | Self::Ready)
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unused => "unused",
            Self::Active => "active",
            Self::Finished => "finished",
            Self::Cleaning => "cleaning",
            Self::Ready => "ready",
        };
        f.write_str(label)
    }
}

struct WorkerSlot {
    status: WorkerStatus,
    commands: Option<UnboundedSender<WorkerCommand>>,
    handle: Option<JoinHandle<()>>,
    request: Option<Arc<Request>>,
}

impl WorkerSlot {
    const fn unused() -> Self {
        Self {
            status: WorkerStatus::Unused,
            commands: None,
            handle: None,
            request: None,
        }
    }
}

/// Starts the thread behind a worker slot.
pub(crate) type Spawner = Box<dyn FnMut(String, WorkerContext) -> io::Result<JoinHandle<()>>>;

pub(crate) fn spawn_worker_thread(name: String, ctx: WorkerContext) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(name)
        .spawn(move || run_worker(ctx))
}

/// Fixed-size set of worker threads, started lazily and reused.
pub(crate) struct WorkerPool {
    slots: Vec<WorkerSlot>,
    spawner: Spawner,
    transport: Arc<dyn Transport>,
    events_tx: UnboundedSender<WorkerEvent>,
    events_rx: UnboundedReceiver<WorkerEvent>,
    shutdown: ShutdownSignal,
    error_status_threshold: u16,
}

impl WorkerPool {
    pub(crate) fn new(
        size: usize,
        transport: Arc<dyn Transport>,
        error_status_threshold: u16,
    ) -> Result<Self, ClientError> {
        Self::with_spawner(
            size,
            transport,
            error_status_threshold,
            Box::new(spawn_worker_thread),
        )
    }

    pub(crate) fn with_spawner(
        size: usize,
        transport: Arc<dyn Transport>,
        error_status_threshold: u16,
        spawner: Spawner,
    ) -> Result<Self, ClientError> {
        if size == 0 {
            return Err(ClientError::EmptyPool);
        }
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            slots: (0..size).map(|_| WorkerSlot::unused()).collect(),
            spawner,
            transport,
            events_tx,
            events_rx,
            shutdown: ShutdownSignal::new(),
            error_status_threshold,
        })
    }

    pub(crate) const fn size(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn status(&self, index: usize) -> Option<WorkerStatus> {
        self.slots.get(index).map(|slot| slot.status)
    }

    pub(crate) fn count(&self, wanted: impl Fn(WorkerStatus) -> bool) -> usize {
        self.slots.iter().filter(|slot| wanted(slot.status)).count()
    }

    pub(crate) fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|slot| slot.status.is_free())
    }

    pub(crate) fn request(&self, index: usize) -> Option<Arc<Request>> {
        self.slots.get(index)?.request.clone()
    }

    pub(crate) fn set_status(&mut self, index: usize, status: WorkerStatus) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.status = status;
            if status == WorkerStatus::Ready {
                slot.request = None;
            }
        }
    }

    /// Starts the worker thread behind `index` on first use.
    pub(crate) fn ensure_started(&mut self, index: usize) -> Result<(), ClientError> {
        let Some(slot) = self.slots.get_mut(index) else {
            return Err(ClientError::WorkerGone { index });
        };
        if slot.commands.is_some() {
            return Ok(());
        }
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let ctx = WorkerContext {
            index,
            transport: Arc::clone(&self.transport),
            commands: commands_rx,
            events: self.events_tx.clone(),
            shutdown: self.shutdown.subscribe(),
            error_status_threshold: self.error_status_threshold,
        };
        let name = format!("tickhttp-worker-{}", index);
        let handle = (self.spawner)(name.clone(), ctx).map_err(|err| {
            error!("Failed to spawn {}: {}", name, err);
            ClientError::SpawnWorker { index, source: err }
        })?;
        debug!("Spawned worker {} ({})", index, name);
        slot.commands = Some(commands_tx);
        slot.handle = Some(handle);
        Ok(())
    }

    /// Binds `request` to a started, free worker and wakes it.
    pub(crate) fn assign(
        &mut self,
        index: usize,
        request: Arc<Request>,
        call: TransportCall,
        transfer: Transfer,
    ) -> Result<(), ClientError> {
        let Some(slot) = self.slots.get_mut(index) else {
            return Err(ClientError::WorkerGone { index });
        };
        let Some(commands) = slot.commands.as_ref() else {
            return Err(ClientError::WorkerGone { index });
        };
        let command = WorkerCommand::Assign {
            request: Arc::clone(&request),
            call,
            transfer,
        };
        if commands.send(command).is_err() {
            // Thread died; forget it so the next dispatch respawns.
            *slot = WorkerSlot::unused();
            return Err(ClientError::WorkerGone { index });
        }
        slot.status = WorkerStatus::Active;
        slot.request = Some(request);
        Ok(())
    }

    /// Finished -> Cleaning. The sink goes back to the worker so its
    /// resources are released on the thread that allocated them.
    pub(crate) fn begin_cleanup(&mut self, index: usize, sink: Box<dyn ConsumesResponseBody>) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        slot.status = WorkerStatus::Cleaning;
        let returned = match slot.commands.as_ref() {
            Some(commands) => match commands.send(WorkerCommand::Cleanup(sink)) {
                Ok(()) => None,
                Err(SendError(command)) => Some(command),
            },
            None => Some(WorkerCommand::Cleanup(sink)),
        };
        if let Some(WorkerCommand::Cleanup(mut sink)) = returned {
            // Worker already exited; clean up here instead.
            sink.cleanup();
            slot.status = WorkerStatus::Ready;
            slot.request = None;
        }
    }

    pub(crate) fn try_event(&mut self) -> Option<WorkerEvent> {
        match self.events_rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub(crate) fn signal_shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Tells every started worker to exit and waits for it.
    pub(crate) fn join_workers(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(commands) = slot.commands.take() {
                drop(commands.send(WorkerCommand::Shutdown));
            }
            if let Some(handle) = slot.handle.take()
                && handle.join().is_err()
            {
                warn!("Worker {} panicked.", index);
            }
        }
    }
}
