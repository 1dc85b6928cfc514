use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bulletin_core::{
    default_extraction_targets, default_fallback_urls, default_target_categories,
    ExtractionTarget, RunSettings, TargetCategory,
};

pub const DEFAULT_BASE_URL: &str = "https://www.bcp.gov.py";
pub const DEFAULT_PAGE_PATH: &str = "/web/institucional/boletines-formato-macros";
/// Older locations of the listing page, tried after the primary one.
pub const DEFAULT_MIRROR_PATHS: [&str; 3] = [
    "/boletines-formato-macros",
    "/web/boletines-formato-macros",
    "/institucional/boletines-formato-macros",
];

/// Produces the timestamp written into the metadata record.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub probe_timeout: Duration,
    pub page_timeout: Duration,
    pub download_timeout: Duration,
    pub redirect_limit: usize,
    pub max_page_retries: u32,
    pub max_download_retries: u32,
    /// Delay before retry `n` is `backoff_base * 2^n`.
    pub backoff_base: Duration,
    /// A 403 whose body is longer than this counts as a block signal.
    pub block_body_threshold: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(30),
            page_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(60),
            redirect_limit: 10,
            max_page_retries: 3,
            max_download_retries: 2,
            backoff_base: Duration::from_secs(1),
            block_body_threshold: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub establish_attempts: u32,
    /// Wait after failed attempt `n` is `establish_step * (n + 1)`.
    pub establish_step: Duration,
    /// Solver proxy used by the challenge-capable client kind.
    pub challenge_solver: Option<String>,
    pub solver_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            establish_attempts: 3,
            establish_step: Duration::from_secs(1),
            challenge_solver: None,
            solver_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub chunk_size: usize,
    pub max_bytes: u64,
    /// Smaller files are kept but logged as suspicious.
    pub min_plausible_bytes: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            max_bytes: 100 * 1024 * 1024,
            min_plausible_bytes: 1024,
        }
    }
}

#[derive(Clone)]
pub struct PipelineConfig {
    pub base_url: String,
    /// Listing page followed by its mirrors.
    pub page_urls: Vec<String>,
    pub categories: Vec<TargetCategory>,
    pub extraction_targets: Vec<ExtractionTarget>,
    /// Category id to a previously known direct link.
    pub fallback_urls: Vec<(String, String)>,
    pub download_dir: PathBuf,
    pub metadata_filename: String,
    pub courtesy_pause: Duration,
    pub fetch: FetchSettings,
    pub session: SessionSettings,
    pub download: DownloadSettings,
    pub clock: Clock,
}

impl PipelineConfig {
    /// Defaults pointed at another host, keeping the site's path layout.
    pub fn for_site(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        let page_urls = std::iter::once(DEFAULT_PAGE_PATH)
            .chain(DEFAULT_MIRROR_PATHS)
            .map(|path| format!("{base}{path}"))
            .collect();
        Self {
            base_url: base,
            page_urls,
            categories: default_target_categories(),
            extraction_targets: default_extraction_targets(),
            fallback_urls: default_fallback_urls(),
            download_dir: PathBuf::from("downloads"),
            metadata_filename: "metadata.json".to_string(),
            courtesy_pause: Duration::from_secs(2),
            fetch: FetchSettings::default(),
            session: SessionSettings::default(),
            download: DownloadSettings::default(),
            clock: Arc::new(|| String::from("1970-01-01T00:00:00Z")),
        }
    }

    /// Page the download requests claim to come from.
    pub fn referer(&self) -> &str {
        self.page_urls
            .first()
            .map(String::as_str)
            .unwrap_or(self.base_url.as_str())
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            page_urls: self.page_urls.clone(),
            categories: self.categories.clone(),
            fallback_urls: self.fallback_urls.clone(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::for_site(DEFAULT_BASE_URL)
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("base_url", &self.base_url)
            .field("page_urls", &self.page_urls)
            .field("categories", &self.categories)
            .field("extraction_targets", &self.extraction_targets)
            .field("fallback_urls", &self.fallback_urls)
            .field("download_dir", &self.download_dir)
            .field("metadata_filename", &self.metadata_filename)
            .field("courtesy_pause", &self.courtesy_pause)
            .field("fetch", &self.fetch)
            .field("session", &self.session)
            .field("download", &self.download)
            .finish_non_exhaustive()
    }
}
