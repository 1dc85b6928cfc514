use std::collections::VecDeque;
use std::sync::Arc;

use bulletin_core::{
    update, Effect, Msg, PlannedDownload, RunOutcome, RunReport, RunState, UNKNOWN_TABLE_SUFFIX,
};
use bulletin_logging::{bulletin_error, bulletin_info, bulletin_warn, LogScope};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::{
    ChallengeSolver, ClientFactory, ClientSettings, ReqwestClientFactory, SolverEndpoint,
};
use crate::discover::LinkDiscovery;
use crate::download::{Downloader, ProgressSink};
use crate::fetch::RetryingFetcher;
use crate::metadata::RunMetadata;
use crate::session::{Session, SessionConfig};
use crate::workbook::WorkbookExtractor;
use crate::{FailureKind, FetchError, PipelineConfig};

/// Executes the run state machine's effects and feeds the outcomes back.
pub struct Pipeline {
    config: PipelineConfig,
    site_root: Url,
    session: Session,
    fetcher: RetryingFetcher,
    discovery: LinkDiscovery,
    downloader: Downloader,
    extractor: WorkbookExtractor,
    cancel: CancellationToken,
    log: LogScope,
}

impl Pipeline {
    /// Uses reqwest clients, plus a solver proxy when one is configured.
    pub fn new(config: PipelineConfig, log: LogScope) -> Result<Self, FetchError> {
        let solver = match config.session.challenge_solver.as_deref() {
            Some(endpoint) => Some(Arc::new(SolverEndpoint::new(
                endpoint,
                config.session.solver_timeout,
            )?) as Arc<dyn ChallengeSolver>),
            None => None,
        };
        let settings = ClientSettings {
            connect_timeout: config.fetch.connect_timeout,
            redirect_limit: config.fetch.redirect_limit,
        };
        Self::with_factory(config, Arc::new(ReqwestClientFactory::new(settings, solver)), log)
    }

    pub fn with_factory(
        config: PipelineConfig,
        factory: Arc<dyn ClientFactory>,
        log: LogScope,
    ) -> Result<Self, FetchError> {
        let site_root = Url::parse(&config.base_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let cancel = CancellationToken::new();
        let session = Session::new(
            SessionConfig {
                site_root: site_root.clone(),
                probe_timeout: config.fetch.probe_timeout,
                establish_attempts: config.session.establish_attempts,
                establish_step: config.session.establish_step,
            },
            factory,
            log.child("session"),
        )?;
        let fetcher =
            RetryingFetcher::new(config.fetch.clone(), cancel.clone(), log.child("fetch"));
        let downloader = Downloader::new(
            config.download.clone(),
            config.fetch.max_download_retries,
            config.referer(),
            cancel.clone(),
            log.child("download"),
        );
        let extractor =
            WorkbookExtractor::new(config.extraction_targets.clone(), log.child("extract"));
        Ok(Self {
            discovery: LinkDiscovery::new(log.child("discover")),
            config,
            site_root,
            session,
            fetcher,
            downloader,
            extractor,
            cancel,
            log,
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.downloader = self.downloader.with_progress(progress);
        self
    }

    pub fn with_discovery(mut self, discovery: LinkDiscovery) -> Self {
        self.discovery = discovery;
        self
    }

    /// Cancelling stops the run at the next chunk or retry boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn run(&mut self) -> RunReport {
        let mut state = RunState::new(self.config.run_settings());
        let mut queue = VecDeque::from([Msg::Start]);
        let mut report = None;

        while let Some(msg) = queue.pop_front() {
            let (next, effects) = update(state, msg);
            state = next;
            for effect in effects {
                match self.execute(effect, &mut report).await {
                    Some(Msg::Cancelled) => {
                        queue.push_back(Msg::Cancelled);
                        break;
                    }
                    Some(msg) => queue.push_back(msg),
                    None => {}
                }
            }
        }

        report.unwrap_or_else(|| state.report())
    }

    async fn execute(&mut self, effect: Effect, report: &mut Option<RunReport>) -> Option<Msg> {
        let bookkeeping = matches!(effect, Effect::Finish(_) | Effect::SaveMetadata { .. });
        if self.cancel.is_cancelled() && !bookkeeping {
            return Some(Msg::Cancelled);
        }
        match effect {
            Effect::EstablishSession => Some(Msg::SessionEstablished(
                self.session.establish(true).await,
            )),
            Effect::FetchPage { url } => {
                bulletin_info!(self.log, "fetching listing page {url}");
                let page = self
                    .fetcher
                    .fetch_page(&mut self.session, &url, self.config.fetch.max_page_retries)
                    .await;
                if page.is_none() && self.cancel.is_cancelled() {
                    return Some(Msg::Cancelled);
                }
                Some(Msg::PageFetched {
                    url,
                    html: page.map(|page| page.html),
                })
            }
            Effect::DiscoverLinks { html, page_url } => {
                bulletin_info!(self.log, "searching {page_url} for bulletin links");
                Some(Msg::LinksDiscovered(self.discovery.discover(
                    &html,
                    &self.site_root,
                    &self.config.categories,
                )))
            }
            Effect::CourtesyPause => match self.fetcher.pause(self.config.courtesy_pause).await {
                Ok(()) => None,
                Err(_) => Some(Msg::Cancelled),
            },
            Effect::Download(planned) => self.download(planned).await,
            Effect::ExtractTables { category, path } => {
                let suffix = self
                    .config
                    .categories
                    .iter()
                    .find(|c| c.id == category)
                    .map(|c| c.table_suffix.clone())
                    .unwrap_or_else(|| UNKNOWN_TABLE_SUFFIX.to_string());
                let tables = match self.extractor.extract(&path, &category, &suffix) {
                    Ok(tables) => tables,
                    Err(err) => {
                        bulletin_error!(self.log, "extraction failed for {category}: {err}");
                        Vec::new()
                    }
                };
                Some(Msg::TablesExtracted { category, tables })
            }
            Effect::SaveMetadata { files } => {
                let record = RunMetadata::collect((self.config.clock)(), &files);
                match record.save(&self.config.download_dir, &self.config.metadata_filename) {
                    Ok(path) => bulletin_info!(self.log, "metadata written to {}", path.display()),
                    Err(err) => bulletin_error!(self.log, "could not write metadata: {err}"),
                }
                None
            }
            Effect::Finish(final_report) => {
                self.log_summary(&final_report);
                *report = Some(final_report);
                None
            }
        }
    }

    async fn download(&mut self, planned: PlannedDownload) -> Option<Msg> {
        let dest = self.config.download_dir.join(&planned.file_name);
        bulletin_info!(self.log, "downloading {} from {}", planned.category, planned.url);
        let result = self
            .downloader
            .download(
                &mut self.session,
                &self.fetcher,
                &planned.category,
                &planned.url,
                &dest,
            )
            .await;
        match result {
            Ok(done) => Some(Msg::DownloadFinished {
                category: planned.category,
                result: Some(done),
            }),
            Err(err) if err.kind == FailureKind::Cancelled => Some(Msg::Cancelled),
            Err(err) => {
                bulletin_warn!(self.log, "download of {} failed: {err}", planned.category);
                Some(Msg::DownloadFinished {
                    category: planned.category,
                    result: None,
                })
            }
        }
    }

    fn log_summary(&self, report: &RunReport) {
        let line = format!(
            "{}/{} categories downloaded, {} table(s) extracted{}",
            report.downloaded.len(),
            report.requested,
            report.tables.len(),
            if report.used_fallback { " (fallback URLs)" } else { "" }
        );
        match report.outcome {
            RunOutcome::Success => bulletin_info!(self.log, "run complete: {line}"),
            RunOutcome::PartialSuccess => {
                bulletin_warn!(
                    self.log,
                    "run partially complete: {line}; missing {:?}",
                    report.missing
                )
            }
            RunOutcome::Failed => bulletin_error!(self.log, "run failed: {line}"),
        }
    }
}

/// Turns a run that produced nothing into an error.
pub fn ensure_usable(report: RunReport) -> Result<RunReport, FetchError> {
    match report.outcome {
        RunOutcome::Failed if report.cancelled => Err(FetchError::cancelled()),
        RunOutcome::Failed => Err(FetchError::new(
            FailureKind::FatalDiscovery,
            format!(
                "no category could be downloaded (missing {})",
                report.missing.join(", ")
            ),
        )),
        _ => Ok(report),
    }
}

/// Runs one pipeline on a fresh current-thread runtime.
pub fn run_blocking(config: PipelineConfig, log: LogScope) -> Result<RunReport, FetchError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| FetchError::new(FailureKind::Transport, err.to_string()))?;
    runtime.block_on(async move {
        let mut pipeline = Pipeline::new(config, log)?;
        Ok(pipeline.run().await)
    })
}
