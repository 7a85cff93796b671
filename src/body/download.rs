use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FinalizeError, RequestError};

use super::{ConsumesResponseBody, ResponsePayload};

const DOWNLOAD_OK_STATUS: u16 = 200;

/// Streams the response into `<dest>.tmp` and renames it into place once the
/// transfer succeeded with status 200. The temporary file is removed on any
/// other outcome, so `dest` never holds a partial download.
#[derive(Debug)]
pub struct FileDownload {
    dest: PathBuf,
    tmp: PathBuf,
    file: Option<File>,
    persisted: Option<io::Result<()>>,
}

impl FileDownload {
    /// # Errors
    ///
    /// Returns an error when the parent directory of `dest` cannot be
    /// created.
    pub fn new(dest: impl AsRef<Path>) -> Result<Self, RequestError> {
        let dest = dest.as_ref().to_path_buf();
        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
            && !parent.is_dir()
        {
            fs::create_dir_all(parent).map_err(|err| RequestError::DownloadDir {
                path: parent.to_path_buf(),
                source: err,
            })?;
        }
        let mut tmp = dest.clone().into_os_string();
        tmp.push(".tmp");
        Ok(Self {
            dest,
            tmp: PathBuf::from(tmp),
            file: None,
            persisted: None,
        })
    }

    #[must_use]
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.tmp
    }

    fn persist(&mut self) -> io::Result<()> {
        let mut file = match self.file.take() {
            Some(file) => file,
            None => File::create(&self.tmp)?,
        };
        file.flush()?;
        file.sync_all()?;
        drop(file);
        fs::rename(&self.tmp, &self.dest)
    }

    fn discard(&mut self) {
        if self.file.take().is_some() || self.tmp.exists() {
            if let Err(err) = fs::remove_file(&self.tmp) {
                warn!("Failed to remove {}: {}", self.tmp.display(), err);
            }
        }
    }
}

impl ConsumesResponseBody for FileDownload {
    fn accept(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.file.is_none() {
            self.file = Some(File::create(&self.tmp)?);
        }
        self.file
            .as_mut()
            .map_or(Ok(()), |file| file.write_all(chunk))
    }

    fn transfer_done(&mut self, success: bool, http_status: u16) {
        if success && http_status == DOWNLOAD_OK_STATUS {
            let result = self.persist();
            if let Err(err) = result.as_ref() {
                warn!("Failed to persist {}: {}", self.dest.display(), err);
                self.discard();
            } else {
                debug!("Downloaded {}", self.dest.display());
            }
            self.persisted = Some(result);
        } else {
            self.discard();
        }
    }

    fn finalize(
        &mut self,
        _success: bool,
        _http_status: u16,
    ) -> Result<ResponsePayload, FinalizeError> {
        match self.persisted.take() {
            Some(Ok(())) => Ok(ResponsePayload::File(self.dest.clone())),
            Some(Err(err)) => Err(FinalizeError::PersistDownload {
                path: self.dest.clone(),
                source: err,
            }),
            None => Ok(ResponsePayload::Empty),
        }
    }

    fn cleanup(&mut self) {
        self.discard();
    }
}
