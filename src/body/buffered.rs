use std::io;

use tracing::warn;

use crate::error::FinalizeError;

use super::{ConsumesResponseBody, ResponsePayload};

/// Buffers the whole response body and interprets it on completion:
/// empty bodies become [`ResponsePayload::Empty`], bodies starting with `{`
/// or `[` are parsed as JSON, anything else is kept as text.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    buffer: Vec<u8>,
}

impl ConsumesResponseBody for BufferedResponse {
    fn accept(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    fn finalize(
        &mut self,
        success: bool,
        http_status: u16,
    ) -> Result<ResponsePayload, FinalizeError> {
        let body = std::mem::take(&mut self.buffer);
        if !success {
            if !body.is_empty() {
                warn!(
                    "Response body for failed request (status {}): {}",
                    http_status,
                    String::from_utf8_lossy(&body)
                );
            }
            return Ok(text_or_empty(body));
        }
        match body.first() {
            None => {
                warn!("Empty response body (status {}).", http_status);
                Ok(ResponsePayload::Empty)
            }
            Some(b'{' | b'[') => serde_json::from_slice(&body)
                .map(ResponsePayload::Json)
                .map_err(|err| FinalizeError::Json { source: err }),
            Some(_) => Ok(text_or_empty(body)),
        }
    }

    fn cleanup(&mut self) {
        self.buffer = Vec::new();
    }
}

fn text_or_empty(body: Vec<u8>) -> ResponsePayload {
    if body.is_empty() {
        return ResponsePayload::Empty;
    }
    match String::from_utf8(body) {
        Ok(text) => ResponsePayload::Text(text),
        Err(err) => ResponsePayload::Text(String::from_utf8_lossy(err.as_bytes()).into_owned()),
    }
}

/// Counts response bytes without keeping them.
#[derive(Debug, Default)]
pub struct DiscardResponse {
    received: u64,
}

impl ConsumesResponseBody for DiscardResponse {
    fn accept(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.received = self
            .received
            .saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
        Ok(())
    }

    fn finalize(
        &mut self,
        _success: bool,
        _http_status: u16,
    ) -> Result<ResponsePayload, FinalizeError> {
        Ok(ResponsePayload::Discarded(self.received))
    }
}
