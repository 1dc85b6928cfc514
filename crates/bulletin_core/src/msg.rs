use crate::{DownloadResult, LinkCandidate, TableOutput};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Begin a run.
    Start,
    /// Outcome of the session probe against the site root.
    SessionEstablished(bool),
    /// Page retrieval finished; `None` once the fetcher gave up.
    PageFetched { url: String, html: Option<String> },
    /// Discovery finished over the last fetched page.
    LinksDiscovered(Vec<LinkCandidate>),
    /// Download finished; `None` on terminal failure.
    DownloadFinished {
        category: String,
        result: Option<DownloadResult>,
    },
    /// Extraction finished for a downloaded file.
    TablesExtracted {
        category: String,
        tables: Vec<TableOutput>,
    },
    /// The run was cancelled; whatever is pending is abandoned.
    Cancelled,
}
