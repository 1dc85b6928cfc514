//! Optional RON settings file layered over the built-in site defaults.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bulletin_engine::{PipelineConfig, DEFAULT_PAGE_PATH};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "bulletin.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Every field is optional; unset fields keep the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    pub page_url: Option<String>,
    pub mirror_urls: Option<Vec<String>>,
    /// Category id to direct download link.
    pub fallback_urls: Option<BTreeMap<String, String>>,
    pub download_dir: Option<PathBuf>,
    pub challenge_solver: Option<String>,
    pub max_page_retries: Option<u32>,
    pub max_download_retries: Option<u32>,
    pub establish_attempts: Option<u32>,
    pub backoff_base_secs: Option<u64>,
    pub courtesy_pause_secs: Option<u64>,
    pub probe_timeout_secs: Option<u64>,
    pub page_timeout_secs: Option<u64>,
    pub download_timeout_secs: Option<u64>,
    pub block_body_threshold: Option<usize>,
    pub max_download_bytes: Option<u64>,
}

impl ConfigFile {
    /// Reads `path`, or `bulletin.ron` when present, or nothing.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&text).map_err(|message| ConfigError::Parse { path, message })
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        ron::from_str(text).map_err(|err| err.to_string())
    }

    pub fn into_pipeline_config(self) -> PipelineConfig {
        let mut config = match &self.base_url {
            Some(base) => PipelineConfig::for_site(base),
            None => PipelineConfig::default(),
        };

        if self.page_url.is_some() || self.mirror_urls.is_some() {
            let primary = self
                .page_url
                .unwrap_or_else(|| format!("{}{DEFAULT_PAGE_PATH}", config.base_url));
            let mirrors = self
                .mirror_urls
                .unwrap_or_else(|| config.page_urls.iter().skip(1).cloned().collect());
            config.page_urls = std::iter::once(primary).chain(mirrors).collect();
        }
        if let Some(fallbacks) = self.fallback_urls {
            config.fallback_urls = fallbacks.into_iter().collect();
        }
        if let Some(dir) = self.download_dir {
            config.download_dir = dir;
        }
        if self.challenge_solver.is_some() {
            config.session.challenge_solver = self.challenge_solver;
        }
        if let Some(n) = self.max_page_retries {
            config.fetch.max_page_retries = n;
        }
        if let Some(n) = self.max_download_retries {
            config.fetch.max_download_retries = n;
        }
        if let Some(n) = self.establish_attempts {
            config.session.establish_attempts = n;
        }
        if let Some(secs) = self.backoff_base_secs {
            config.fetch.backoff_base = Duration::from_secs(secs);
        }
        if let Some(secs) = self.courtesy_pause_secs {
            config.courtesy_pause = Duration::from_secs(secs);
        }
        if let Some(secs) = self.probe_timeout_secs {
            config.fetch.probe_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.page_timeout_secs {
            config.fetch.page_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.download_timeout_secs {
            config.fetch.download_timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = self.block_body_threshold {
            config.fetch.block_body_threshold = bytes;
        }
        if let Some(bytes) = self.max_download_bytes {
            config.download.max_bytes = bytes;
        }
        config
    }
}
