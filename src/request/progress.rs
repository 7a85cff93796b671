use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of transfer progress. Totals are 0 when unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub uploaded: u64,
    pub upload_total: u64,
    pub downloaded: u64,
    pub download_total: u64,
}

impl Progress {
    #[must_use]
    pub const fn upload_fraction(&self) -> f64 {
        fraction(self.uploaded, self.upload_total)
    }

    #[must_use]
    pub const fn download_fraction(&self) -> f64 {
        fraction(self.downloaded, self.download_total)
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "Progress fractions are advisory display values"
)]
const fn fraction(now: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let now = if now > total { total } else { now };
    (now as f64) / (total as f64)
}

/// Advisory counters written only by the executing worker. Readers may see a
/// mix of old and new fields.
#[derive(Debug, Default)]
pub(crate) struct ProgressCounters {
    uploaded: AtomicU64,
    upload_total: AtomicU64,
    downloaded: AtomicU64,
    download_total: AtomicU64,
}

impl ProgressCounters {
    pub(crate) fn store(&self, progress: Progress) {
        self.uploaded.store(progress.uploaded, Ordering::Relaxed);
        self.upload_total
            .store(progress.upload_total, Ordering::Relaxed);
        self.downloaded.store(progress.downloaded, Ordering::Relaxed);
        self.download_total
            .store(progress.download_total, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> Progress {
        Progress {
            uploaded: self.uploaded.load(Ordering::Relaxed),
            upload_total: self.upload_total.load(Ordering::Relaxed),
            downloaded: self.downloaded.load(Ordering::Relaxed),
            download_total: self.download_total.load(Ordering::Relaxed),
        }
    }
}
