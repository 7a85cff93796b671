use std::cell::Cell;
use std::collections::BTreeMap;
use std::io;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::pool::{WorkerPool, spawn_worker_thread};
use super::worker::WorkerContext;
use super::{Callback, Client, Downloader, WorkerStatus};
use crate::body::ResponsePayload;
use crate::config::ClientConfig;
use crate::error::{ClientError, Failure, TransportError};
use crate::request::{Progress, Request, RequestStatus};
use crate::transport::{
    Exchange, Flow, Transport, TransportCall, TransportOutcome, TransportSession, global_init,
};

#[derive(Debug, Clone)]
struct Reply {
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    body: &'static [u8],
    fail: bool,
    reset_after_headers: bool,
    /// Park the call until `Script::release`.
    hold: bool,
}

impl Reply {
    const fn ok(body: &'static [u8]) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body,
            fail: false,
            reset_after_headers: false,
            hold: false,
        }
    }
}

#[derive(Default)]
struct Script {
    replies: Mutex<BTreeMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
    released: AtomicBool,
}

impl Script {
    fn release(&self) {
        self.released.store(true, Ordering::Release);
    }

    fn reply(&self, url: &str, reply: Reply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.insert(url.to_owned(), reply);
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

struct ScriptedTransport(Arc<Script>);

impl Transport for ScriptedTransport {
    fn open_session(&self) -> Result<Box<dyn TransportSession>, TransportError> {
        Ok(Box::new(ScriptedSession(Arc::clone(&self.0))))
    }
}

struct ScriptedSession(Arc<Script>);

impl TransportSession for ScriptedSession {
    fn perform(&mut self, call: &TransportCall, exchange: &mut dyn Exchange) -> TransportOutcome {
        if let Ok(mut calls) = self.0.calls.lock() {
            calls.push(call.url.clone());
        }
        let reply = self
            .0
            .replies
            .lock()
            .ok()
            .and_then(|replies| replies.get(&call.url).cloned())
            .unwrap_or_else(|| Reply::ok(b""));
        if reply.fail {
            return TransportOutcome::failed(
                TransportError::Connect {
                    url: call.url.clone(),
                    message: "refused".to_owned(),
                },
                0,
            );
        }
        while reply.hold && !self.0.released.load(Ordering::Acquire) {
            if exchange.progress(Progress::default()) == Flow::Abort {
                return TransportOutcome::failed(TransportError::Aborted, 0);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        exchange.status_line(&format!("HTTP/1.1 {}", reply.status));
        for (name, value) in &reply.headers {
            exchange.header(name, value);
        }
        exchange.headers_complete();
        if reply.reset_after_headers {
            return TransportOutcome::failed(
                TransportError::Protocol {
                    message: "connection reset".to_owned(),
                },
                reply.status,
            );
        }
        if exchange.data(reply.body) == Flow::Abort {
            return TransportOutcome::failed(TransportError::Aborted, reply.status);
        }
        TransportOutcome::completed(reply.status)
    }
}

fn client_with(workers: usize) -> Result<(Client, Arc<Script>), String> {
    global_init();
    let script = Arc::new(Script::default());
    let config = ClientConfig {
        workers,
        ..ClientConfig::default()
    };
    let client = Client::with_transport(config, Arc::new(ScriptedTransport(Arc::clone(&script))))
        .map_err(|err| format!("client failed: {}", err))?;
    Ok((client, script))
}

fn pump_until(client: &mut Client, mut done: impl FnMut(&Client) -> bool) -> Result<(), String> {
    let started = Instant::now();
    while !done(client) {
        if started.elapsed() > Duration::from_secs(5) {
            return Err(format!("timed out waiting on {:?}", client));
        }
        client.pump().map_err(|err| format!("pump failed: {}", err))?;
        std::thread::sleep(Duration::from_millis(1));
    }
    Ok(())
}

#[test]
fn zero_workers_rejected() -> Result<(), String> {
    global_init();
    let script = Arc::new(Script::default());
    let config = ClientConfig {
        workers: 0,
        ..ClientConfig::default()
    };
    match Client::with_transport(config, Arc::new(ScriptedTransport(script))) {
        Err(ClientError::EmptyPool) => Ok(()),
        other => Err(format!("expected EmptyPool, got {:?}", other.map(|_| ()))),
    }
}

#[test]
fn submit_rejects_double_and_terminal_requests() -> Result<(), String> {
    let (mut client, _script) = client_with(1)?;
    let request = Arc::new(Request::get("http://stub/one"));
    client
        .submit(&request, None)
        .map_err(|err| format!("submit failed: {}", err))?;
    match client.submit(&request, None) {
        Err(ClientError::AlreadySubmitted { .. }) => {}
        other => return Err(format!("expected AlreadySubmitted, got {:?}", other)),
    }

    let cancelled = Arc::new(Request::get("http://stub/two"));
    cancelled
        .compile()
        .map_err(|err| format!("compile failed: {}", err))?;
    cancelled
        .cancel()
        .map_err(|err| format!("cancel failed: {}", err))?;
    match client.submit(&cancelled, None) {
        Err(ClientError::NotSubmittable { status, .. }) if status == RequestStatus::Cancelled => {}
        other => return Err(format!("expected NotSubmittable, got {:?}", other)),
    }

    let invalid = Arc::new(Request::get("mailto:someone"));
    match client.submit(&invalid, None) {
        Err(ClientError::Compile { .. }) => Ok(()),
        other => Err(format!("expected Compile, got {:?}", other)),
    }
}

#[test]
fn idle_pump_is_noop() -> Result<(), String> {
    let (mut client, script) = client_with(2)?;
    for _ in 0..3 {
        client
            .pump()
            .map_err(|err| format!("pump failed: {}", err))?;
    }
    if !client.is_idle() || client.worker_status(0) != Some(WorkerStatus::Unused) {
        return Err("idle pump must not start workers".to_owned());
    }
    if !script.calls().is_empty() {
        return Err("idle pump must not call the transport".to_owned());
    }
    Ok(())
}

#[test]
fn worker_returns_to_ready_after_cleanup() -> Result<(), String> {
    let (mut client, _script) = client_with(1)?;
    let request = Arc::new(Request::get("http://stub/ready"));
    client
        .submit(&request, None)
        .map_err(|err| format!("submit failed: {}", err))?;
    client
        .pump()
        .map_err(|err| format!("pump failed: {}", err))?;
    if request.status() == RequestStatus::Pending {
        return Err("first pump must dispatch".to_owned());
    }
    pump_until(&mut client, |client| {
        client.worker_status(0) == Some(WorkerStatus::Ready)
    })?;
    if request.status() != RequestStatus::Done || !client.is_idle() {
        return Err(format!("unexpected state {:?}", request));
    }
    Ok(())
}

#[test]
fn headers_and_json_payload_are_finalized() -> Result<(), String> {
    let (mut client, script) = client_with(1)?;
    script.reply(
        "http://stub/json",
        Reply {
            headers: vec![("Content-Type", "application/json")],
            ..Reply::ok(br#"{"name":"tick"}"#)
        },
    );
    let request = Arc::new(Request::get("http://stub/json"));
    client
        .submit(&request, None)
        .map_err(|err| format!("submit failed: {}", err))?;
    pump_until(&mut client, |_| request.is_terminal())?;

    if request.response_header("content-type") != Some("application/json") {
        return Err(format!("headers missing: {:?}", request.response_headers()));
    }
    if request.response_header("HTTP") != Some("HTTP/1.1 200") {
        return Err("status line missing".to_owned());
    }
    match request.payload() {
        Some(ResponsePayload::Json(value)) if value["name"] == "tick" => Ok(()),
        other => Err(format!("unexpected payload {:?}", other)),
    }
}

#[test]
fn http_status_over_threshold_is_error() -> Result<(), String> {
    let (mut client, script) = client_with(1)?;
    script.reply(
        "http://stub/missing",
        Reply {
            status: 404,
            ..Reply::ok(b"not found")
        },
    );
    let request = Arc::new(Request::get("http://stub/missing"));
    client
        .submit(&request, None)
        .map_err(|err| format!("submit failed: {}", err))?;
    pump_until(&mut client, |_| request.is_terminal())?;

    if request.status() != RequestStatus::Error || request.http_status() != Some(404) {
        return Err(format!("unexpected outcome {:?}", request));
    }
    match request.failure() {
        Some(Failure::Http { status: 404 }) => {}
        other => return Err(format!("unexpected failure {:?}", other)),
    }
    if request.payload().and_then(ResponsePayload::as_text) != Some("not found") {
        return Err("error body should be kept as text".to_owned());
    }
    Ok(())
}

#[test]
fn unparsable_json_is_finalize_error() -> Result<(), String> {
    let (mut client, script) = client_with(1)?;
    script.reply("http://stub/broken", Reply::ok(b"{oops"));
    let request = Arc::new(Request::get("http://stub/broken"));
    client
        .submit(&request, None)
        .map_err(|err| format!("submit failed: {}", err))?;
    pump_until(&mut client, |_| request.is_terminal())?;
    match request.failure() {
        Some(Failure::Finalize(_)) => Ok(()),
        other => Err(format!("expected finalize failure, got {:?}", other)),
    }
}

#[test]
fn transport_failure_has_no_status() -> Result<(), String> {
    let (mut client, script) = client_with(1)?;
    script.reply(
        "http://stub/down",
        Reply {
            fail: true,
            ..Reply::ok(b"")
        },
    );
    let request = Arc::new(Request::get("http://stub/down"));
    client
        .submit(&request, None)
        .map_err(|err| format!("submit failed: {}", err))?;
    pump_until(&mut client, |_| request.is_terminal())?;
    if request.http_status().is_some() || request.response_headers().is_some() {
        return Err(format!("unexpected response data {:?}", request));
    }
    match request.failure() {
        Some(Failure::Transport(TransportError::Connect { .. })) => Ok(()),
        other => Err(format!("expected connect failure, got {:?}", other)),
    }
}

#[test]
fn transport_failure_after_headers_drops_status() -> Result<(), String> {
    let (mut client, script) = client_with(1)?;
    script.reply(
        "http://stub/reset",
        Reply {
            headers: vec![("Content-Type", "text/plain")],
            reset_after_headers: true,
            ..Reply::ok(b"partial")
        },
    );
    let request = Arc::new(Request::get("http://stub/reset"));
    client
        .submit(&request, None)
        .map_err(|err| format!("submit failed: {}", err))?;
    pump_until(&mut client, |_| request.is_terminal())?;

    if request.status() != RequestStatus::Error {
        return Err(format!("expected error, got {}", request.status()));
    }
    if request.http_status().is_some() {
        return Err(format!("unexpected status {:?}", request.http_status()));
    }
    match request.failure() {
        Some(failure @ Failure::Transport(TransportError::Protocol { .. }))
            if failure.http_status().is_none() =>
        {
            Ok(())
        }
        other => Err(format!("expected protocol failure, got {:?}", other)),
    }
}

#[test]
fn spawn_failure_requeues_head_and_keeps_running_workers() -> Result<(), String> {
    let (mut client, script) = client_with(2)?;
    let failures_left = Rc::new(Cell::new(1_u32));
    let remaining = Rc::clone(&failures_left);
    client.pool = WorkerPool::with_spawner(
        2,
        Arc::new(ScriptedTransport(Arc::clone(&script))),
        client.config.error_status_threshold,
        Box::new(move |name: String, ctx: WorkerContext| {
            if ctx.index == 1 && remaining.get() > 0 {
                remaining.set(remaining.get().saturating_sub(1));
                return Err(io::Error::other("thread limit reached"));
            }
            spawn_worker_thread(name, ctx)
        }),
    )
    .map_err(|err| format!("pool failed: {}", err))?;
    script.reply(
        "http://stub/slow",
        Reply {
            hold: true,
            ..Reply::ok(b"slow")
        },
    );

    let slow = Arc::new(Request::get("http://stub/slow"));
    let queued = Arc::new(Request::get("http://stub/queued"));
    let later = Arc::new(Request::get("http://stub/later"));
    for request in [&slow, &queued, &later] {
        client
            .submit(request, None)
            .map_err(|err| format!("submit failed: {}", err))?;
    }

    client
        .pump()
        .map_err(|err| format!("first pump failed: {}", err))?;
    match client.pump() {
        Err(ClientError::SpawnWorker { index: 1, .. }) => {}
        other => return Err(format!("expected SpawnWorker, got {:?}", other)),
    }
    if queued.status() != RequestStatus::Pending || client.pending_len() != 2 {
        return Err(format!(
            "queued request not kept: {} with {} pending",
            queued.status(),
            client.pending_len()
        ));
    }
    if client.worker_status(0) != Some(WorkerStatus::Active)
        || client.worker_status(1) != Some(WorkerStatus::Unused)
    {
        return Err(format!(
            "unexpected workers {:?} {:?}",
            client.worker_status(0),
            client.worker_status(1)
        ));
    }

    pump_until(&mut client, |_| queued.is_terminal() && later.is_terminal())?;
    if slow.is_terminal() {
        return Err("held request finished early".to_owned());
    }
    script.release();
    pump_until(&mut client, |_| slow.is_terminal())?;

    for request in [&slow, &queued, &later] {
        if request.status() != RequestStatus::Done {
            return Err(format!("{} ended {}", request.url(), request.status()));
        }
    }
    let calls = script.calls();
    let expected = ["http://stub/slow", "http://stub/queued", "http://stub/later"];
    if calls != expected {
        return Err(format!("unexpected dispatch order {:?}", calls));
    }
    if failures_left.get() != 0 {
        return Err("spawner was never asked for worker 1".to_owned());
    }
    Ok(())
}

#[test]
fn shutdown_cancels_queued_without_callbacks() -> Result<(), String> {
    let (mut client, script) = client_with(1)?;
    let fired = Rc::new(Cell::new(0_u32));
    let mut requests = Vec::new();
    for index in 0..3 {
        let request = Arc::new(Request::get(format!("http://stub/{}", index)));
        let counter = Rc::clone(&fired);
        client
            .submit(
                &request,
                Some(Callback::detached(move |_| counter.set(counter.get().saturating_add(1)))),
            )
            .map_err(|err| format!("submit failed: {}", err))?;
        requests.push(request);
    }
    client.shutdown();

    if requests
        .iter()
        .any(|request| request.status() != RequestStatus::Cancelled)
    {
        return Err(format!("expected all cancelled: {:?}", requests));
    }
    if fired.get() != 0 || !script.calls().is_empty() {
        return Err("cancelled requests must not run".to_owned());
    }
    match client.submit(&Arc::new(Request::get("http://stub/late")), None) {
        Err(ClientError::Closed) => Ok(()),
        other => Err(format!("expected Closed, got {:?}", other)),
    }
}

#[test]
fn shutdown_finalizes_reported_completion() -> Result<(), String> {
    let (mut client, _script) = client_with(1)?;
    let fired = Rc::new(Cell::new(false));
    let request = Arc::new(Request::get("http://stub/inflight"));
    let flag = Rc::clone(&fired);
    client
        .submit(&request, Some(Callback::detached(move |_| flag.set(true))))
        .map_err(|err| format!("submit failed: {}", err))?;
    client
        .pump()
        .map_err(|err| format!("pump failed: {}", err))?;
    client.shutdown();
    if !request.is_terminal() || request.status() == RequestStatus::Cancelled {
        return Err(format!("dispatched request must finish: {:?}", request));
    }
    if !fired.get() {
        return Err("callback of a finished request must fire".to_owned());
    }
    Ok(())
}

#[test]
fn downloader_dedups_in_flight_urls() -> Result<(), String> {
    let dir = tempfile::tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let (client, script) = client_with(1)?;
    script.reply("http://stub/file", Reply::ok(b"payload"));
    let mut downloader = Downloader::new(client);

    let dest = dir.path().join("file.bin");
    let first = downloader
        .download("http://stub/file", &dest, None)
        .map_err(|err| format!("download failed: {}", err))?;
    let second = downloader
        .download("http://stub/file", dir.path().join("other.bin"), None)
        .map_err(|err| format!("download failed: {}", err))?;
    if first.id() != second.id() || downloader.in_flight_len() != 1 {
        return Err("same URL must reuse the in-flight request".to_owned());
    }

    let started = Instant::now();
    while downloader.is_downloading("http://stub/file") {
        if started.elapsed() > Duration::from_secs(5) {
            return Err("download never finished".to_owned());
        }
        downloader
            .pump()
            .map_err(|err| format!("pump failed: {}", err))?;
        std::thread::sleep(Duration::from_millis(1));
    }
    if !first.is_success() {
        return Err(format!("download failed: {:?}", first.failure()));
    }
    let content = std::fs::read(&dest).map_err(|err| format!("read failed: {}", err))?;
    if content != b"payload" || script.calls().len() != 1 {
        return Err("download content or call count unexpected".to_owned());
    }
    Ok(())
}
