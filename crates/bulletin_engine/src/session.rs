use std::sync::Arc;
use std::time::Duration;

use bulletin_logging::{bulletin_debug, bulletin_info, bulletin_warn, LogScope};
use reqwest::cookie::Jar;
use reqwest::header::HeaderMap;
use reqwest::Response;
use url::Url;

use crate::client::{ClientFactory, ClientKind, HttpClient, RequestSpec};
use crate::headers::default_headers;
use crate::{FailureKind, FetchError};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub site_root: Url,
    pub probe_timeout: Duration,
    pub establish_attempts: u32,
    pub establish_step: Duration,
}

/// The single live HTTP client together with its cookie jar and header profile.
///
/// A reset drops all three and builds them again from scratch. Once the
/// challenge solver has failed, the session stays on the plain client.
pub struct Session {
    factory: Arc<dyn ClientFactory>,
    config: SessionConfig,
    headers: HeaderMap,
    client: Box<dyn HttpClient>,
    jar: Arc<Jar>,
    prepared: bool,
    solver_failed: bool,
    generation: u64,
    log: LogScope,
}

impl Session {
    /// Starts with the challenge-capable kind when the factory offers it.
    pub fn new(
        config: SessionConfig,
        factory: Arc<dyn ClientFactory>,
        log: LogScope,
    ) -> Result<Self, FetchError> {
        let headers = default_headers();
        let kind = pick_kind(factory.as_ref(), true, &log);
        let jar = Arc::new(Jar::default());
        let client = factory.build(kind, headers.clone(), jar.clone())?;
        bulletin_debug!(log, "session created with {} client", kind.label());
        Ok(Self {
            factory,
            config,
            headers,
            client,
            jar,
            prepared: false,
            solver_failed: false,
            generation: 0,
            log,
        })
    }

    pub fn kind(&self) -> ClientKind {
        self.client.kind()
    }

    /// Number of resets performed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn site_root(&self) -> &Url {
        &self.config.site_root
    }

    /// Header profile the current client was built with.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn cookies(&self) -> Arc<Jar> {
        self.jar.clone()
    }

    /// Replaces the client, jar and headers. On build failure the old client stays.
    pub fn reset(&mut self, reason: &str, prefer_challenge: bool) -> Result<(), FetchError> {
        let kind = pick_kind(
            self.factory.as_ref(),
            prefer_challenge && !self.solver_failed,
            &self.log,
        );
        let headers = default_headers();
        let jar = Arc::new(Jar::default());
        let client = match self.factory.build(kind, headers.clone(), jar.clone()) {
            Ok(client) => client,
            Err(err) if kind == ClientKind::ChallengeCapable => {
                bulletin_warn!(
                    self.log,
                    "challenge-capable client unavailable ({err}); using plain client"
                );
                self.factory
                    .build(ClientKind::Plain, headers.clone(), jar.clone())?
            }
            Err(err) => return Err(err),
        };
        self.client = client;
        self.headers = headers;
        self.jar = jar;
        self.prepared = false;
        self.generation += 1;
        bulletin_info!(
            self.log,
            "session reset #{} ({reason}); now using {} client",
            self.generation,
            self.client.kind().label()
        );
        Ok(())
    }

    /// Sends through the current client, preparing it first if needed.
    ///
    /// A challenge client whose preparation fails is swapped for a plain one
    /// over the same jar and headers, and the request goes out degraded.
    pub async fn send(&mut self, request: RequestSpec) -> Result<Response, FetchError> {
        if !self.prepared {
            if let Err(err) = self.client.prepare(&self.config.site_root).await {
                if self.client.kind() != ClientKind::ChallengeCapable {
                    return Err(err);
                }
                self.degrade_to_plain(&err)?;
            }
            self.prepared = true;
        }
        self.client.send(request).await
    }

    fn degrade_to_plain(&mut self, cause: &FetchError) -> Result<(), FetchError> {
        self.solver_failed = true;
        self.client = self
            .factory
            .build(ClientKind::Plain, self.headers.clone(), self.jar.clone())?;
        bulletin_warn!(
            self.log,
            "challenge solver failed ({cause}); continuing with plain client"
        );
        Ok(())
    }

    /// One lightweight request against the site root.
    pub async fn probe(&mut self) -> Result<(), FetchError> {
        let request = RequestSpec::get(self.config.site_root.clone(), self.config.probe_timeout);
        let response = self.send(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let kind = if status.as_u16() == 403 {
            FailureKind::Blocked { body_len: 0 }
        } else {
            FailureKind::InvalidResponse {
                status: status.as_u16(),
            }
        };
        Err(FetchError::new(kind, format!("site root answered {status}")))
    }

    /// Confirms the site is usable, resetting between failed attempts.
    ///
    /// Returns false when every attempt failed; callers continue degraded.
    pub async fn establish(&mut self, prefer_challenge: bool) -> bool {
        let attempts = self.config.establish_attempts.max(1);
        for attempt in 0..attempts {
            match self.probe().await {
                Ok(()) => {
                    bulletin_info!(
                        self.log,
                        "session established with {} client",
                        self.kind().label()
                    );
                    return true;
                }
                Err(err) => {
                    bulletin_warn!(
                        self.log,
                        "session attempt {}/{} failed: {err}",
                        attempt + 1,
                        attempts
                    );
                    if attempt + 1 == attempts {
                        break;
                    }
                    if matches!(
                        err.kind,
                        FailureKind::Blocked { .. } | FailureKind::Transport | FailureKind::Timeout
                    ) {
                        if let Err(reset_err) = self.reset(&err.to_string(), prefer_challenge) {
                            bulletin_warn!(self.log, "session reset failed: {reset_err}");
                        }
                    }
                    tokio::time::sleep(self.config.establish_step * (attempt + 1)).await;
                }
            }
        }
        bulletin_warn!(self.log, "could not establish a session; continuing degraded");
        false
    }
}

fn pick_kind(factory: &dyn ClientFactory, prefer_challenge: bool, log: &LogScope) -> ClientKind {
    if !prefer_challenge {
        return ClientKind::Plain;
    }
    if factory.supports(ClientKind::ChallengeCapable) {
        ClientKind::ChallengeCapable
    } else {
        bulletin_debug!(log, "no challenge solver configured; using plain client");
        ClientKind::Plain
    }
}
