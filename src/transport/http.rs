use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::runtime::Runtime;
use tokio::time::{MissedTickBehavior, interval};

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::request::{Method, Progress};

use super::{
    Exchange, Flow, Transport, TransportCall, TransportOutcome, TransportSession, collect_upload,
};

/// How often an in-flight call re-checks [`Exchange::progress`] while it
/// waits on the network.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    user_agent: String,
    request_timeout: Duration,
    connect_timeout: Duration,
}

impl ReqwestTransport {
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            request_timeout: config.request_timeout,
            connect_timeout: config.connect_timeout,
        }
    }
}

impl Transport for ReqwestTransport {
    fn open_session(&self) -> Result<Box<dyn TransportSession>, TransportError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| TransportError::Session {
                message: err.to_string(),
            })?;
        let client = {
            let _guard = runtime.enter();
            reqwest::Client::builder()
                .user_agent(self.user_agent.as_str())
                .timeout(self.request_timeout)
                .connect_timeout(self.connect_timeout)
                .build()
                .map_err(|err| TransportError::Session {
                    message: err.to_string(),
                })?
        };
        Ok(Box::new(ReqwestSession { runtime, client }))
    }
}

/// One per worker thread; owns a current-thread runtime the worker blocks on.
struct ReqwestSession {
    runtime: Runtime,
    client: reqwest::Client,
}

impl TransportSession for ReqwestSession {
    fn perform(&mut self, call: &TransportCall, exchange: &mut dyn Exchange) -> TransportOutcome {
        let client = &self.client;
        self.runtime.block_on(perform_call(client, call, exchange))
    }
}

async fn perform_call(
    client: &reqwest::Client,
    call: &TransportCall,
    exchange: &mut dyn Exchange,
) -> TransportOutcome {
    let headers = match build_header_map(call) {
        Ok(headers) => headers,
        Err(err) => return TransportOutcome::failed(err, 0),
    };
    let mut progress = Progress::default();
    let mut builder = client
        .request(to_reqwest_method(call.method), call.url.as_str())
        .headers(headers);
    if exchange.upload_len() > 0 || call.method.sends_body() {
        let body = match collect_upload(exchange) {
            Ok(body) => body,
            Err(err) => return TransportOutcome::failed(err, 0),
        };
        progress.upload_total = u64::try_from(body.len()).unwrap_or(u64::MAX);
        builder = builder.body(body);
    }

    let mut ticker = interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let send = builder.send();
    tokio::pin!(send);
    let response = loop {
        tokio::select! {
            result = &mut send => break result,
            _ = ticker.tick() => {
                if exchange.progress(progress) == Flow::Abort {
                    return TransportOutcome::failed(TransportError::Aborted, 0);
                }
            }
        }
    };
    let response = match response {
        Ok(response) => response,
        Err(err) => {
            return TransportOutcome::failed(TransportError::from_reqwest(&call.url, &err), 0);
        }
    };

    progress.uploaded = progress.upload_total;
    let status = response.status();
    let http_status = status.as_u16();
    exchange.status_line(&format!(
        "{:?} {} {}",
        response.version(),
        http_status,
        status.canonical_reason().unwrap_or_default()
    ));
    for (name, value) in response.headers() {
        exchange.header(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
    }
    exchange.headers_complete();
    progress.download_total = response.content_length().unwrap_or(0);
    if exchange.progress(progress) == Flow::Abort {
        return TransportOutcome::failed(TransportError::Aborted, http_status);
    }

    let mut stream = response.bytes_stream();
    loop {
        tokio::select! {
            next = stream.next() => match next {
                Some(Ok(chunk)) => {
                    progress.downloaded = progress
                        .downloaded
                        .saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
                    if exchange.data(&chunk) == Flow::Abort
                        || exchange.progress(progress) == Flow::Abort
                    {
                        return TransportOutcome::failed(TransportError::Aborted, http_status);
                    }
                }
                Some(Err(err)) => {
                    return TransportOutcome::failed(
                        TransportError::from_reqwest(&call.url, &err),
                        http_status,
                    );
                }
                None => return TransportOutcome::completed(http_status),
            },
            _ = ticker.tick() => {
                if exchange.progress(progress) == Flow::Abort {
                    return TransportOutcome::failed(TransportError::Aborted, http_status);
                }
            }
        }
    }
}

fn build_header_map(call: &TransportCall) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(call.headers.len());
    for (key, value) in &call.headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| TransportError::InvalidHeader { name: key.clone() })?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::InvalidHeader { name: key.clone() })?;
        map.insert(name, value);
    }
    Ok(map)
}

const fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Head => reqwest::Method::HEAD,
        Method::Put => reqwest::Method::PUT,
    }
}
