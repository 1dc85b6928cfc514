use std::time::{Duration, Instant};

use bulletin_logging::{bulletin_debug, bulletin_info, bulletin_warn, LogScope};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Response;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::RequestSpec;
use crate::decode::decode_page;
use crate::session::Session;
use crate::types::map_reqwest_error;
use crate::{FailureKind, FetchError, FetchSettings};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub backoff_base: Duration,
    pub block_body_threshold: usize,
}

impl RetryPolicy {
    pub fn from_settings(settings: &FetchSettings) -> Self {
        Self {
            backoff_base: settings.backoff_base,
            block_body_threshold: settings.block_body_threshold,
        }
    }

    /// Delay after failed attempt `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Page,
    Spreadsheet,
}

impl Payload {
    fn plausible(self, content_type: &str) -> bool {
        let ct = content_type.to_ascii_lowercase();
        match self {
            Payload::Page => ct.contains("text/html") || ct.contains("application/xhtml"),
            Payload::Spreadsheet => {
                ["spreadsheet", "excel", "vnd.ms", "octet-stream", "application/zip"]
                    .iter()
                    .any(|marker| ct.contains(marker))
            }
        }
    }
}

/// Outcome class of one request, driving the retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    pub url: String,
    pub index: u32,
    pub outcome: Result<(), FailureKind>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub html: String,
    pub encoding_label: String,
}

enum Body {
    Read(Vec<u8>),
    Stream(Response),
}

/// Wraps single requests with bounded retries, backoff and session resets.
///
/// `max_retries` counts retries, so a call makes at most `max_retries + 1`
/// requests. A block signal triggers a reset and a fresh probe before every
/// retry; transport failures reset only from the second retry on; retryable
/// statuses just back off. Anything else ends the call immediately.
pub struct RetryingFetcher {
    settings: FetchSettings,
    policy: RetryPolicy,
    cancel: CancellationToken,
    log: LogScope,
}

impl RetryingFetcher {
    pub fn new(settings: FetchSettings, cancel: CancellationToken, log: LogScope) -> Self {
        Self {
            policy: RetryPolicy::from_settings(&settings),
            settings,
            cancel,
            log,
        }
    }

    /// Fetches and decodes an HTML page. `None` once retries are exhausted
    /// or a terminal status is seen.
    pub async fn fetch_page(
        &self,
        session: &mut Session,
        url: &str,
        max_retries: u32,
    ) -> Option<FetchedPage> {
        let request = match parse_url(url) {
            Ok(parsed) => RequestSpec::get(parsed, self.settings.page_timeout),
            Err(err) => {
                bulletin_warn!(self.log, "skipping page {url}: {err}");
                return None;
            }
        };
        match self
            .execute(session, request, Payload::Page, true, max_retries)
            .await
        {
            Ok((response_meta, Body::Read(bytes))) => {
                let decoded = decode_page(&bytes, response_meta.content_type.as_deref());
                if decoded.lossy {
                    bulletin_warn!(
                        self.log,
                        "page {url} had undecodable bytes ({})",
                        decoded.encoding_label
                    );
                }
                Some(FetchedPage {
                    url: url.to_string(),
                    final_url: response_meta.final_url,
                    content_type: response_meta.content_type,
                    html: decoded.text,
                    encoding_label: decoded.encoding_label,
                })
            }
            Ok((_, Body::Stream(_))) => None,
            Err(err) => {
                bulletin_warn!(self.log, "giving up on page {url}: {err}");
                None
            }
        }
    }

    /// Opens a streaming download. The caller owns reading the body.
    pub async fn fetch_stream(
        &self,
        session: &mut Session,
        url: &str,
        headers: HeaderMap,
        max_retries: u32,
    ) -> Result<Response, FetchError> {
        let request =
            RequestSpec::get(parse_url(url)?, self.settings.download_timeout).with_headers(headers);
        match self
            .execute(session, request, Payload::Spreadsheet, false, max_retries)
            .await?
        {
            (_, Body::Stream(response)) => Ok(response),
            (_, Body::Read(_)) => Err(FetchError::new(
                FailureKind::Transport,
                "download body was consumed early",
            )),
        }
    }

    /// Runs the attempt loop for one request.
    ///
    /// After a block the session is reset and re-established with a single
    /// `probe()` in place of a full `Session::establish()`, so a call never
    /// performs more than `max_retries` resets. The probe result is only logged.
    async fn execute(
        &self,
        session: &mut Session,
        request: RequestSpec,
        payload: Payload,
        read_body: bool,
        max_retries: u32,
    ) -> Result<(ResponseMeta, Body), FetchError> {
        let url = request.url.to_string();
        let mut attempt = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(FetchError::cancelled());
            }
            let started = Instant::now();
            let result = self.attempt(session, request.clone(), read_body).await;
            let record = FetchAttempt {
                url: url.clone(),
                index: attempt,
                outcome: result.as_ref().map(|_| ()).map_err(|err| err.kind.clone()),
                elapsed: started.elapsed(),
            };
            bulletin_debug!(self.log, "{record:?}");

            let err = match result {
                Ok((meta, body)) => {
                    self.check_content_kind(&url, payload, meta.content_type.as_deref());
                    return Ok((meta, body));
                }
                Err(err) => err,
            };
            let retries_left = attempt < max_retries;
            let retryable = match &err.kind {
                FailureKind::Blocked { .. } => true,
                FailureKind::Transport | FailureKind::Timeout => true,
                FailureKind::InvalidResponse { status } => FailureKind::is_retryable_status(*status),
                _ => false,
            };
            if !retryable || !retries_left {
                bulletin_warn!(
                    self.log,
                    "{url}: attempt {}/{} failed ({err}); not retrying",
                    attempt + 1,
                    max_retries + 1
                );
                return Err(err);
            }
            bulletin_warn!(
                self.log,
                "{url}: attempt {}/{} failed ({err}); retrying",
                attempt + 1,
                max_retries + 1
            );

            match err.kind {
                FailureKind::Blocked { .. } => {
                    if let Err(reset_err) = session.reset("block signal", true) {
                        bulletin_warn!(self.log, "session reset failed: {reset_err}");
                    }
                    match session.probe().await {
                        Ok(()) => bulletin_info!(self.log, "session re-established after block"),
                        Err(probe_err) => {
                            bulletin_warn!(self.log, "re-establish probe failed: {probe_err}")
                        }
                    }
                }
                FailureKind::Transport | FailureKind::Timeout if attempt >= 1 => {
                    if let Err(reset_err) = session.reset("repeated transport failure", true) {
                        bulletin_warn!(self.log, "session reset failed: {reset_err}");
                    }
                }
                _ => {}
            }

            self.pause(self.policy.backoff(attempt)).await?;
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        session: &mut Session,
        request: RequestSpec,
        read_body: bool,
    ) -> Result<(ResponseMeta, Body), FetchError> {
        let response = session.send(request).await?;
        let status = response.status();
        let meta = ResponseMeta::from_response(&response);

        if status.is_success() {
            if read_body {
                let bytes = response.bytes().await.map_err(map_reqwest_error)?;
                return Ok((meta, Body::Read(bytes.to_vec())));
            }
            return Ok((meta, Body::Stream(response)));
        }

        let code = status.as_u16();
        if code == 403 {
            let body_len = response.bytes().await.map(|b| b.len()).unwrap_or(0);
            if body_len > self.policy.block_body_threshold {
                return Err(FetchError::new(
                    FailureKind::Blocked { body_len },
                    format!("{status} with {body_len}-byte body"),
                ));
            }
            return Err(FetchError::new(
                FailureKind::InvalidResponse { status: code },
                format!("{status} with {body_len}-byte body"),
            ));
        }
        if code == 404 || code == 410 {
            return Err(FetchError::new(FailureKind::NotFound, status.to_string()));
        }
        Err(FetchError::new(
            FailureKind::InvalidResponse { status: code },
            status.to_string(),
        ))
    }

    fn check_content_kind(&self, url: &str, payload: Payload, content_type: Option<&str>) {
        match content_type {
            Some(ct) if payload.plausible(ct) => {}
            Some(ct) => bulletin_warn!(
                self.log,
                "{url}: unexpected content type {ct} for {payload:?} payload"
            ),
            None => bulletin_warn!(self.log, "{url}: response has no content type"),
        }
    }

    /// Sleeps unless the run is cancelled first.
    pub async fn pause(&self, duration: Duration) -> Result<(), FetchError> {
        if duration.is_zero() {
            return if self.cancel.is_cancelled() {
                Err(FetchError::cancelled())
            } else {
                Ok(())
            };
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(FetchError::cancelled()),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
struct ResponseMeta {
    final_url: String,
    content_type: Option<String>,
}

impl ResponseMeta {
    fn from_response(response: &Response) -> Self {
        Self {
            final_url: response.url().to_string(),
            content_type: response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
        }
    }
}

fn parse_url(url: &str) -> Result<Url, FetchError> {
    Url::parse(url).map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            backoff_base: Duration::from_millis(100),
            block_body_threshold: 1000,
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn spreadsheet_payload_accepts_binary_types() {
        assert!(Payload::Spreadsheet.plausible("application/octet-stream"));
        assert!(Payload::Spreadsheet
            .plausible("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"));
        assert!(!Payload::Spreadsheet.plausible("text/html; charset=utf-8"));
        assert!(Payload::Page.plausible("TEXT/HTML"));
    }
}
