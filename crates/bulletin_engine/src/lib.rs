//! Bulletin engine: HTTP session, retrying fetches, link discovery,
//! downloads, workbook extraction and the effect-executing pipeline.
mod client;
mod config;
mod decode;
mod discover;
mod download;
mod fetch;
mod headers;
mod metadata;
mod persist;
mod pipeline;
mod session;
mod types;
mod workbook;

pub use client::{
    ChallengeClient, ChallengeSolver, Clearance, ClearanceCookie, ClientFactory, ClientKind,
    ClientSettings, HttpClient, PlainClient, ReqwestClientFactory, RequestSpec, SolverEndpoint,
};
pub use config::{
    Clock, DownloadSettings, FetchSettings, PipelineConfig, SessionSettings, DEFAULT_BASE_URL,
    DEFAULT_MIRROR_PATHS, DEFAULT_PAGE_PATH,
};
pub use decode::{decode_page, DecodedPage};
pub use discover::{
    default_tiers, ButtonContextTier, CandidateExtractor, DirectLinkTier, DiscoveryContext,
    LinkDiscovery, SectionHeaderTier, StructuredSectionTier,
};
pub use download::{DownloadProgress, Downloader, LogProgressSink, ProgressSink};
pub use fetch::{FetchAttempt, FetchedPage, Payload, RetryPolicy, RetryingFetcher};
pub use headers::{default_headers, download_headers, BROWSER_USER_AGENT};
pub use metadata::{FileRecord, RunMetadata};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pipeline::{ensure_usable, run_blocking, Pipeline};
pub use session::{Session, SessionConfig};
pub use types::{FailureKind, FetchError};
pub use workbook::{cell_text, find_sheet, ExtractError, ExtractedTable, WorkbookExtractor};

pub use tokio_util::sync::CancellationToken;
