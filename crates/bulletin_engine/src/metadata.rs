use std::fs;
use std::path::{Path, PathBuf};

use bulletin_core::DownloadResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub filename: String,
    pub path: String,
    pub size: u64,
    /// RFC 3339 modification time, empty when the platform does not report one.
    pub modified: String,
    pub sha256: String,
    pub source_url: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub timestamp: String,
    pub files: Vec<FileRecord>,
}

impl RunMetadata {
    /// Describes the downloads still present on disk.
    pub fn collect(timestamp: String, downloads: &[DownloadResult]) -> Self {
        let files = downloads
            .iter()
            .filter_map(|download| {
                let meta = fs::metadata(&download.path).ok()?;
                let modified = meta
                    .modified()
                    .map(|time| DateTime::<Utc>::from(time).to_rfc3339())
                    .unwrap_or_default();
                Some(FileRecord {
                    filename: download
                        .path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    path: download.path.display().to_string(),
                    size: meta.len(),
                    modified,
                    sha256: download.sha256.clone(),
                    source_url: download.source_url.clone(),
                    category: download.category.clone(),
                })
            })
            .collect();
        Self { timestamp, files }
    }

    pub fn save(&self, dir: &Path, filename: &str) -> Result<PathBuf, PersistError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        AtomicFileWriter::new(dir.to_path_buf()).write(filename, json.as_bytes())
    }

    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let raw = fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }
}
