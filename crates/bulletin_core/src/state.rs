use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use crate::{PlannedDownload, TargetCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Init,
    EstablishingSession,
    FetchingPage,
    DiscoveringLinks,
    Downloading,
    Extracting,
    Done,
    Failed,
}

/// A file persisted under its final name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub category: String,
    pub source_url: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub duration: Duration,
    /// Lowercase hex SHA-256 of the body.
    pub sha256: String,
}

/// A worksheet written out as CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOutput {
    pub category: String,
    pub label: String,
    pub sheet: String,
    pub path: PathBuf,
    pub rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every requested category was downloaded.
    Success,
    /// Some, but not all, categories were downloaded.
    PartialSuccess,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub requested: usize,
    pub downloaded: Vec<DownloadResult>,
    pub tables: Vec<TableOutput>,
    pub missing: Vec<String>,
    pub used_fallback: bool,
    pub fallback_reason: Option<String>,
    pub cancelled: bool,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome != RunOutcome::Failed
    }
}

/// Static inputs of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Listing page followed by known mirrors, tried in order.
    pub page_urls: Vec<String>,
    pub categories: Vec<TargetCategory>,
    /// Category id to previously known direct link.
    pub fallback_urls: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    settings: RunSettings,
    phase: Phase,
    next_page: usize,
    queue: VecDeque<PlannedDownload>,
    in_flight: Option<String>,
    downloads_started: usize,
    downloaded: Vec<DownloadResult>,
    tables: Vec<TableOutput>,
    missing: Vec<String>,
    used_fallback: bool,
    fallback_reason: Option<String>,
    cancelled: bool,
}

impl RunState {
    pub fn new(settings: RunSettings) -> Self {
        Self {
            settings,
            phase: Phase::Init,
            next_page: 0,
            queue: VecDeque::new(),
            in_flight: None,
            downloads_started: 0,
            downloaded: Vec::new(),
            tables: Vec::new(),
            missing: Vec::new(),
            used_fallback: false,
            fallback_reason: None,
            cancelled: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Done | Phase::Failed)
    }

    pub fn used_fallback(&self) -> bool {
        self.used_fallback
    }

    pub fn report(&self) -> RunReport {
        let requested = self.settings.categories.len();
        let outcome = if self.downloaded.is_empty() {
            RunOutcome::Failed
        } else if self.missing.is_empty() && self.downloaded.len() >= requested {
            RunOutcome::Success
        } else {
            RunOutcome::PartialSuccess
        };
        RunReport {
            requested,
            downloaded: self.downloaded.clone(),
            tables: self.tables.clone(),
            missing: self.missing.clone(),
            used_fallback: self.used_fallback,
            fallback_reason: self.fallback_reason.clone(),
            cancelled: self.cancelled,
            outcome,
        }
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn take_next_page(&mut self) -> Option<String> {
        let url = self.settings.page_urls.get(self.next_page).cloned();
        if url.is_some() {
            self.next_page += 1;
        }
        url
    }

    pub(crate) fn plan(&mut self, downloads: Vec<PlannedDownload>) {
        self.queue = downloads.into();
    }

    pub(crate) fn pop_download(&mut self) -> Option<(PlannedDownload, bool)> {
        let next = self.queue.pop_front()?;
        let needs_pause = self.downloads_started > 0;
        self.downloads_started += 1;
        self.in_flight = Some(next.category.clone());
        Some((next, needs_pause))
    }

    pub(crate) fn record_download(&mut self, category: &str, result: Option<DownloadResult>) {
        self.in_flight = None;
        match result {
            Some(result) => self.downloaded.push(result),
            None => self.mark_missing(category),
        }
    }

    pub(crate) fn record_tables(&mut self, tables: Vec<TableOutput>) {
        self.tables.extend(tables);
    }

    pub(crate) fn mark_missing(&mut self, category: &str) {
        if !self.missing.iter().any(|m| m == category) {
            self.missing.push(category.to_string());
        }
    }

    pub(crate) fn mark_fallback(&mut self, reason: &str) {
        self.used_fallback = true;
        self.fallback_reason = Some(reason.to_string());
    }

    /// Everything not yet downloaded becomes missing.
    pub(crate) fn abandon_pending(&mut self) {
        self.cancelled = true;
        if let Some(category) = self.in_flight.take() {
            if !self.downloaded.iter().any(|d| d.category == category) {
                self.mark_missing(&category);
            }
        }
        let pending: Vec<String> = self.queue.drain(..).map(|p| p.category).collect();
        for category in pending {
            self.mark_missing(&category);
        }
        if matches!(
            self.phase,
            Phase::Init | Phase::EstablishingSession | Phase::FetchingPage | Phase::DiscoveringLinks
        ) {
            let all: Vec<String> = self.settings.categories.iter().map(|c| c.id.clone()).collect();
            for category in all {
                self.mark_missing(&category);
            }
        }
    }

    pub(crate) fn downloaded_files(&self) -> Vec<DownloadResult> {
        self.downloaded.clone()
    }
}
