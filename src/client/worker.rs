use std::io;
use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, warn};

use crate::body::{ConsumesResponseBody, ProducesUploadBody, Transfer};
use crate::error::TransportError;
use crate::request::{Headers, Progress, Request};
use crate::shutdown::ShutdownWatch;
use crate::transport::{Exchange, Flow, Transport, TransportCall, TransportOutcome, TransportSession};

/// Key under which the status line is staged among the response headers.
pub(crate) const STATUS_LINE_KEY: &str = "HTTP";

/// Control thread -> worker.
pub(crate) enum WorkerCommand {
    Assign {
        request: Arc<Request>,
        call: TransportCall,
        transfer: Transfer,
    },
    /// The control thread consumed the result; release per-request resources.
    Cleanup(Box<dyn ConsumesResponseBody>),
    Shutdown,
}

/// Worker -> control thread.
pub(crate) enum WorkerEvent {
    HeadersReady {
        index: usize,
        headers: Headers,
    },
    Finished {
        index: usize,
        completion: Completion,
    },
    Ready {
        index: usize,
    },
}

/// Everything the control thread needs to finalize a request.
pub(crate) struct Completion {
    pub(crate) outcome: TransportOutcome,
    /// Headers not already sent through `HeadersReady`.
    pub(crate) headers: Option<Headers>,
    pub(crate) sink: Box<dyn ConsumesResponseBody>,
}

pub(crate) struct WorkerContext {
    pub(crate) index: usize,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) commands: UnboundedReceiver<WorkerCommand>,
    pub(crate) events: UnboundedSender<WorkerEvent>,
    pub(crate) shutdown: ShutdownWatch,
    pub(crate) error_status_threshold: u16,
}

/// Worker thread body: parks on the command channel between assignments and
/// exits on `Shutdown` or when the client goes away.
pub(crate) fn run_worker(mut ctx: WorkerContext) {
    let mut session = match ctx.transport.open_session() {
        Ok(session) => Ok(session),
        Err(err) => {
            error!("Worker {} failed to open a transport session: {}", ctx.index, err);
            Err(err.to_string())
        }
    };
    let mut upload: Option<Box<dyn ProducesUploadBody>> = None;

    while let Some(command) = ctx.commands.blocking_recv() {
        match command {
            WorkerCommand::Assign {
                request,
                call,
                transfer,
            } => {
                let Transfer {
                    upload: assigned,
                    sink,
                } = transfer;
                upload = assigned;
                let completion = execute(&ctx, &mut session, &request, &call, &mut upload, sink);
                if ctx
                    .events
                    .send(WorkerEvent::Finished {
                        index: ctx.index,
                        completion,
                    })
                    .is_err()
                {
                    break;
                }
            }
            WorkerCommand::Cleanup(mut sink) => {
                if let Some(mut finished) = upload.take() {
                    finished.release();
                }
                sink.cleanup();
                drop(sink);
                if ctx
                    .events
                    .send(WorkerEvent::Ready { index: ctx.index })
                    .is_err()
                {
                    break;
                }
            }
            WorkerCommand::Shutdown => break,
        }
    }

    if let Some(mut leftover) = upload.take() {
        leftover.release();
    }
    debug!("Worker {} exiting.", ctx.index);
}

fn execute(
    ctx: &WorkerContext,
    session: &mut Result<Box<dyn TransportSession>, String>,
    request: &Request,
    call: &TransportCall,
    upload: &mut Option<Box<dyn ProducesUploadBody>>,
    mut sink: Box<dyn ConsumesResponseBody>,
) -> Completion {
    debug!("Worker {} performing {} {}", ctx.index, call.method, call.url);
    let mut exchange = WorkerExchange {
        index: ctx.index,
        request,
        upload: upload.as_deref_mut(),
        sink: sink.as_mut(),
        events: &ctx.events,
        shutdown: &ctx.shutdown,
        headers: Headers::new(),
        headers_sent: false,
        sink_error: None,
    };
    let mut outcome = match session.as_mut() {
        Ok(session) => session.perform(call, &mut exchange),
        Err(message) => TransportOutcome::failed(
            TransportError::Session {
                message: message.clone(),
            },
            0,
        ),
    };
    let WorkerExchange {
        headers,
        headers_sent,
        sink_error,
        ..
    } = exchange;

    if let Some(err) = sink_error {
        warn!("Request {} response sink failed: {}", call.id, err);
        outcome.result = Err(TransportError::Sink { source: err });
    }
    let success =
        outcome.result.is_ok() && outcome.http_status < ctx.error_status_threshold;
    sink.transfer_done(success, outcome.http_status);

    let headers = (!headers_sent && !headers.is_empty()).then_some(headers);
    Completion {
        outcome,
        headers,
        sink,
    }
}

/// Worker-side view of the request while the transport call runs. Only
/// progress counters are written to the shared request; everything else is
/// staged here and handed to the control thread by message.
struct WorkerExchange<'a> {
    index: usize,
    request: &'a Request,
    upload: Option<&'a mut (dyn ProducesUploadBody + 'static)>,
    sink: &'a mut (dyn ConsumesResponseBody + 'static),
    events: &'a UnboundedSender<WorkerEvent>,
    shutdown: &'a ShutdownWatch,
    headers: Headers,
    headers_sent: bool,
    sink_error: Option<io::Error>,
}

impl Exchange for WorkerExchange<'_> {
    fn upload_len(&self) -> u64 {
        self.upload
            .as_ref()
            .map_or(0, |upload| upload.content_length())
    }

    fn read_upload(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.upload.as_mut().map_or(Ok(0), |upload| upload.fill(buf))
    }

    fn status_line(&mut self, line: &str) {
        self.headers
            .insert(STATUS_LINE_KEY.to_owned(), line.trim_end().to_owned());
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers
            .entry(name.to_owned())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_owned());
    }

    fn headers_complete(&mut self) {
        if self.headers_sent {
            return;
        }
        self.headers_sent = true;
        let headers = std::mem::take(&mut self.headers);
        drop(self.events.send(WorkerEvent::HeadersReady {
            index: self.index,
            headers,
        }));
    }

    fn data(&mut self, chunk: &[u8]) -> Flow {
        if self.shutdown.is_triggered() {
            return Flow::Abort;
        }
        match self.sink.accept(chunk) {
            Ok(()) => Flow::Continue,
            Err(err) => {
                self.sink_error = Some(err);
                Flow::Abort
            }
        }
    }

    fn progress(&mut self, progress: Progress) -> Flow {
        self.request.record_progress(progress);
        if self.shutdown.is_triggered() {
            Flow::Abort
        } else {
            Flow::Continue
        }
    }
}
