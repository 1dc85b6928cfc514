use std::path::PathBuf;

use crate::{DownloadResult, RunReport};

/// A download the engine should perform next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDownload {
    pub category: String,
    pub url: String,
    /// File name inside the download directory, e.g. `tabla_de_bancos.xlsx`.
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    EstablishSession,
    FetchPage { url: String },
    DiscoverLinks { html: String, page_url: String },
    /// Courtesy delay between successive downloads.
    CourtesyPause,
    Download(PlannedDownload),
    ExtractTables { category: String, path: PathBuf },
    SaveMetadata { files: Vec<DownloadResult> },
    Finish(RunReport),
}
