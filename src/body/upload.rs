use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::RequestError;
use crate::request::Headers;

use super::{PreparesBody, ProducesUploadBody};

/// In-memory upload source.
#[derive(Debug, Clone, Default)]
pub struct BytesUpload {
    data: Vec<u8>,
    offset: usize,
}

impl BytesUpload {
    #[must_use]
    pub const fn new(data: Vec<u8>) -> Self {
        Self { data, offset: 0 }
    }
}

impl ProducesUploadBody for BytesUpload {
    fn content_length(&self) -> u64 {
        u64::try_from(self.data.len()).unwrap_or(u64::MAX)
    }

    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.data.get(self.offset..).unwrap_or_default();
        let count = remaining.len().min(buf.len());
        if let (Some(dst), Some(src)) = (buf.get_mut(..count), remaining.get(..count)) {
            dst.copy_from_slice(src);
        }
        self.offset = self.offset.saturating_add(count);
        Ok(count)
    }

    fn release(&mut self) {
        self.data = Vec::new();
        self.offset = 0;
    }
}

/// Streams a file from disk. The length is read at compile time; the file is
/// opened lazily by the worker.
#[derive(Debug, Clone)]
pub struct FileUpload {
    path: PathBuf,
}

impl FileUpload {
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl PreparesBody for FileUpload {
    fn prepare(
        &self,
        headers: &mut Headers,
    ) -> Result<Box<dyn ProducesUploadBody>, RequestError> {
        let metadata = std::fs::metadata(&self.path).map_err(|err| RequestError::UploadFile {
            path: self.path.clone(),
            source: err,
        })?;
        let len = metadata.len();
        headers.insert("Content-Length".to_owned(), len.to_string());
        headers
            .entry("Content-Type".to_owned())
            .or_insert_with(|| "application/octet-stream".to_owned());
        Ok(Box::new(FileSource {
            path: self.path.clone(),
            len,
            file: None,
        }))
    }
}

struct FileSource {
    path: PathBuf,
    len: u64,
    file: Option<File>,
}

impl ProducesUploadBody for FileSource {
    fn content_length(&self) -> u64 {
        self.len
    }

    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.file.is_none() {
            self.file = Some(File::open(&self.path)?);
        }
        self.file.as_mut().map_or(Ok(0), |file| file.read(buf))
    }

    fn release(&mut self) {
        self.file = None;
    }
}
