use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use bulletin_core::DownloadResult;
use bulletin_logging::{bulletin_info, bulletin_warn, LogScope};
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

use crate::fetch::RetryingFetcher;
use crate::headers::download_headers;
use crate::persist::{ensure_output_dir, persist_temp, PersistError};
use crate::session::Session;
use crate::types::map_reqwest_error;
use crate::{DownloadSettings, FailureKind, FetchError};

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub url: String,
    pub bytes: u64,
    pub total: Option<u64>,
    /// Size of the chunk that was just written.
    pub chunk: u64,
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: DownloadProgress);
}

/// Logs each time a download crosses a MiB boundary.
pub struct LogProgressSink {
    log: LogScope,
}

impl LogProgressSink {
    pub fn new(log: LogScope) -> Self {
        Self { log }
    }
}

impl ProgressSink for LogProgressSink {
    fn emit(&self, progress: DownloadProgress) {
        let before = progress.bytes.saturating_sub(progress.chunk) / MIB;
        if progress.bytes / MIB == before {
            return;
        }
        match progress.total.filter(|total| *total > 0) {
            Some(total) => bulletin_info!(
                self.log,
                "{}: {:.1}% ({} / {} bytes)",
                progress.url,
                progress.bytes as f64 * 100.0 / total as f64,
                progress.bytes,
                total
            ),
            None => bulletin_info!(self.log, "{}: {} bytes", progress.url, progress.bytes),
        }
    }
}

fn persistence(err: impl std::fmt::Display) -> FetchError {
    FetchError::new(FailureKind::Persistence, err.to_string())
}

impl From<PersistError> for FetchError {
    fn from(err: PersistError) -> Self {
        persistence(err)
    }
}

/// Streams a spreadsheet into a temp file beside the destination and renames
/// it into place once complete. Failures leave nothing under the final name.
pub struct Downloader {
    settings: DownloadSettings,
    max_retries: u32,
    referer: String,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    log: LogScope,
}

impl Downloader {
    pub fn new(
        settings: DownloadSettings,
        max_retries: u32,
        referer: impl Into<String>,
        cancel: CancellationToken,
        log: LogScope,
    ) -> Self {
        let progress = Arc::new(LogProgressSink::new(log.clone()));
        Self {
            settings,
            max_retries,
            referer: referer.into(),
            progress,
            cancel,
            log,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub async fn download(
        &self,
        session: &mut Session,
        fetcher: &RetryingFetcher,
        category: &str,
        url: &str,
        dest: &Path,
    ) -> Result<DownloadResult, FetchError> {
        let started = Instant::now();
        let dir = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        ensure_output_dir(dir)?;

        let response = fetcher
            .fetch_stream(session, url, download_headers(&self.referer), self.max_retries)
            .await?;

        let total = response.content_length();
        if let Some(declared) = total.filter(|len| *len > self.settings.max_bytes) {
            return Err(self.too_large(Some(declared)));
        }

        let mut tmp = NamedTempFile::new_in(dir).map_err(persistence)?;
        let mut hasher = Sha256::new();
        let mut written = 0u64;
        {
            let mut writer = BufWriter::with_capacity(self.settings.chunk_size, tmp.as_file_mut());
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                if self.cancel.is_cancelled() {
                    return Err(FetchError::cancelled());
                }
                let chunk = chunk.map_err(map_reqwest_error)?;
                written += chunk.len() as u64;
                if written > self.settings.max_bytes {
                    return Err(self.too_large(Some(written)));
                }
                writer.write_all(&chunk).map_err(persistence)?;
                hasher.update(&chunk);
                self.progress.emit(DownloadProgress {
                    url: url.to_string(),
                    bytes: written,
                    total,
                    chunk: chunk.len() as u64,
                });
            }
            writer.flush().map_err(persistence)?;
        }
        if self.cancel.is_cancelled() {
            return Err(FetchError::cancelled());
        }
        tmp.as_file_mut().sync_all().map_err(persistence)?;
        persist_temp(tmp, dest)?;

        if written < self.settings.min_plausible_bytes {
            bulletin_warn!(
                self.log,
                "{} is only {written} bytes; it may be an error page",
                dest.display()
            );
        }
        let duration = started.elapsed();
        bulletin_info!(
            self.log,
            "saved {} ({written} bytes in {:.1}s)",
            dest.display(),
            duration.as_secs_f64()
        );
        Ok(DownloadResult {
            category: category.to_string(),
            source_url: url.to_string(),
            path: dest.to_path_buf(),
            bytes: written,
            duration,
            sha256: hex(&hasher.finalize()),
        })
    }

    fn too_large(&self, actual: Option<u64>) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual,
            },
            "download exceeds the size limit",
        )
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
