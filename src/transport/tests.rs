use std::io;

use super::{Exchange, Flow, collect_upload};
use crate::error::TransportError;
use crate::request::Progress;

struct ScriptedUpload {
    chunks: Vec<&'static [u8]>,
    fail: bool,
}

impl Exchange for ScriptedUpload {
    fn upload_len(&self) -> u64 {
        self.chunks.iter().map(|chunk| chunk.len() as u64).sum()
    }

    fn read_upload(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail {
            return Err(io::Error::other("disk gone"));
        }
        if self.chunks.is_empty() {
            return Ok(0);
        }
        let chunk = self.chunks.remove(0);
        let len = chunk.len().min(buf.len());
        if let (Some(dst), Some(src)) = (buf.get_mut(..len), chunk.get(..len)) {
            dst.copy_from_slice(src);
        }
        Ok(len)
    }

    fn status_line(&mut self, _line: &str) {}

    fn header(&mut self, _name: &str, _value: &str) {}

    fn headers_complete(&mut self) {}

    fn data(&mut self, _chunk: &[u8]) -> Flow {
        Flow::Continue
    }

    fn progress(&mut self, _progress: Progress) -> Flow {
        Flow::Continue
    }
}

#[test]
fn collect_upload_concatenates_chunks() -> Result<(), String> {
    let mut exchange = ScriptedUpload {
        chunks: vec![b"name=", b"bob"],
        fail: false,
    };
    let body = collect_upload(&mut exchange).map_err(|err| err.to_string())?;
    if body != b"name=bob" {
        return Err(format!("unexpected body {:?}", body));
    }
    Ok(())
}

#[test]
fn collect_upload_maps_source_errors() -> Result<(), String> {
    let mut exchange = ScriptedUpload {
        chunks: Vec::new(),
        fail: true,
    };
    match collect_upload(&mut exchange) {
        Err(TransportError::Upload { .. }) => Ok(()),
        other => Err(format!("expected upload error, got {:?}", other)),
    }
}

#[test]
fn lease_blocks_cleanup_while_alive() -> Result<(), String> {
    super::global_init();
    let lease = super::RuntimeLease::acquire().map_err(|err| err.to_string())?;
    if super::live_clients() == 0 {
        return Err("lease must be counted".to_owned());
    }
    if super::global_cleanup().is_ok() {
        return Err("cleanup must fail while a client is alive".to_owned());
    }
    drop(lease);
    Ok(())
}
