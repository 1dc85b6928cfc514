use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, Response};
use serde::Deserialize;
use url::Url;

use crate::types::map_reqwest_error;
use crate::{FailureKind, FetchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Plain,
    /// Obtains clearance from a challenge solver before its first request.
    ChallengeCapable,
}

impl ClientKind {
    pub fn label(self) -> &'static str {
        match self {
            ClientKind::Plain => "plain",
            ClientKind::ChallengeCapable => "challenge-capable",
        }
    }
}

/// One outgoing request; headers are merged over the client's defaults.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub timeout: Duration,
}

impl RequestSpec {
    pub fn get(url: Url, timeout: Duration) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            timeout,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    fn kind(&self) -> ClientKind;

    /// Runs once per client before its first request.
    async fn prepare(&self, _site_root: &Url) -> Result<(), FetchError> {
        Ok(())
    }

    async fn send(&self, request: RequestSpec) -> Result<Response, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub redirect_limit: usize,
}

fn build_reqwest(
    settings: &ClientSettings,
    headers: HeaderMap,
    jar: Arc<Jar>,
) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .default_headers(headers)
        .cookie_provider(jar)
        .connect_timeout(settings.connect_timeout)
        .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
        .build()
        .map_err(|err| FetchError::new(FailureKind::Transport, err.to_string()))
}

async fn send_with(
    client: &reqwest::Client,
    request: RequestSpec,
) -> Result<Response, FetchError> {
    client
        .request(request.method, request.url)
        .headers(request.headers)
        .timeout(request.timeout)
        .send()
        .await
        .map_err(map_reqwest_error)
}

pub struct PlainClient {
    client: reqwest::Client,
}

impl PlainClient {
    pub fn new(
        settings: &ClientSettings,
        headers: HeaderMap,
        jar: Arc<Jar>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_reqwest(settings, headers, jar)?,
        })
    }
}

#[async_trait::async_trait]
impl HttpClient for PlainClient {
    fn kind(&self) -> ClientKind {
        ClientKind::Plain
    }

    async fn send(&self, request: RequestSpec) -> Result<Response, FetchError> {
        send_with(&self.client, request).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClearanceCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// What a solver hands back after passing the site's verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clearance {
    pub cookies: Vec<ClearanceCookie>,
    pub user_agent: Option<String>,
}

#[async_trait::async_trait]
pub trait ChallengeSolver: Send + Sync {
    async fn solve(&self, url: &Url) -> Result<Clearance, FetchError>;
}

/// Client that installs solver clearance into its cookie jar and
/// presents the solver's user agent on every request.
pub struct ChallengeClient {
    client: reqwest::Client,
    jar: Arc<Jar>,
    solver: Arc<dyn ChallengeSolver>,
    user_agent: Mutex<Option<HeaderValue>>,
}

impl ChallengeClient {
    pub fn new(
        settings: &ClientSettings,
        headers: HeaderMap,
        jar: Arc<Jar>,
        solver: Arc<dyn ChallengeSolver>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_reqwest(settings, headers, jar.clone())?,
            jar,
            solver,
            user_agent: Mutex::new(None),
        })
    }

    fn clearance_user_agent(&self) -> Option<HeaderValue> {
        self.user_agent
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

#[async_trait::async_trait]
impl HttpClient for ChallengeClient {
    fn kind(&self) -> ClientKind {
        ClientKind::ChallengeCapable
    }

    async fn prepare(&self, site_root: &Url) -> Result<(), FetchError> {
        let clearance = self.solver.solve(site_root).await?;
        for cookie in &clearance.cookies {
            let mut raw = format!("{}={}", cookie.name, cookie.value);
            if let Some(path) = cookie.path.as_deref().filter(|p| !p.is_empty()) {
                raw.push_str("; Path=");
                raw.push_str(path);
            }
            self.jar.add_cookie_str(&raw, site_root);
        }
        let agent = clearance
            .user_agent
            .as_deref()
            .and_then(|ua| HeaderValue::from_str(ua).ok());
        if let Ok(mut guard) = self.user_agent.lock() {
            *guard = agent;
        }
        Ok(())
    }

    async fn send(&self, mut request: RequestSpec) -> Result<Response, FetchError> {
        if let Some(agent) = self.clearance_user_agent() {
            request.headers.insert(USER_AGENT, agent);
        }
        send_with(&self.client, request).await
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SolverRequest<'a> {
    cmd: &'static str,
    url: &'a str,
    max_timeout: u64,
}

#[derive(Deserialize)]
struct SolverReply {
    status: String,
    #[serde(default)]
    message: String,
    solution: Option<SolverSolution>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolverSolution {
    #[serde(default)]
    cookies: Vec<ClearanceCookie>,
    user_agent: Option<String>,
}

/// Solver proxy speaking the `request.get` JSON command protocol.
pub struct SolverEndpoint {
    endpoint: Url,
    client: reqwest::Client,
    max_timeout: Duration,
}

impl SolverEndpoint {
    pub fn new(endpoint: &str, max_timeout: Duration) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| FetchError::new(FailureKind::Transport, err.to_string()))?;
        Ok(Self {
            endpoint,
            client,
            max_timeout,
        })
    }
}

#[async_trait::async_trait]
impl ChallengeSolver for SolverEndpoint {
    async fn solve(&self, url: &Url) -> Result<Clearance, FetchError> {
        let body = serde_json::to_vec(&SolverRequest {
            cmd: "request.get",
            url: url.as_str(),
            max_timeout: self.max_timeout.as_millis() as u64,
        })
        .map_err(|err| FetchError::new(FailureKind::Transport, err.to_string()))?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            // Give the proxy a little longer than it gives the browser.
            .timeout(self.max_timeout + Duration::from_secs(10))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::InvalidResponse {
                    status: status.as_u16(),
                },
                "challenge solver rejected the request",
            ));
        }
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        let reply: SolverReply = serde_json::from_slice(&bytes).map_err(|err| {
            FetchError::new(FailureKind::InvalidResponse { status: 200 }, err.to_string())
        })?;
        match (reply.status.as_str(), reply.solution) {
            ("ok", Some(solution)) => Ok(Clearance {
                cookies: solution.cookies,
                user_agent: solution.user_agent,
            }),
            _ => Err(FetchError::new(FailureKind::Blocked { body_len: 0 }, reply.message)),
        }
    }
}

/// Builds clients of either kind for the session manager.
pub trait ClientFactory: Send + Sync {
    fn supports(&self, kind: ClientKind) -> bool;

    fn build(
        &self,
        kind: ClientKind,
        headers: HeaderMap,
        jar: Arc<Jar>,
    ) -> Result<Box<dyn HttpClient>, FetchError>;
}

pub struct ReqwestClientFactory {
    settings: ClientSettings,
    solver: Option<Arc<dyn ChallengeSolver>>,
}

impl ReqwestClientFactory {
    pub fn new(settings: ClientSettings, solver: Option<Arc<dyn ChallengeSolver>>) -> Self {
        Self { settings, solver }
    }
}

impl ClientFactory for ReqwestClientFactory {
    fn supports(&self, kind: ClientKind) -> bool {
        match kind {
            ClientKind::Plain => true,
            ClientKind::ChallengeCapable => self.solver.is_some(),
        }
    }

    fn build(
        &self,
        kind: ClientKind,
        headers: HeaderMap,
        jar: Arc<Jar>,
    ) -> Result<Box<dyn HttpClient>, FetchError> {
        match (kind, &self.solver) {
            (ClientKind::ChallengeCapable, Some(solver)) => Ok(Box::new(ChallengeClient::new(
                &self.settings,
                headers,
                jar,
                solver.clone(),
            )?)),
            (ClientKind::ChallengeCapable, None) => Err(FetchError::new(
                FailureKind::Transport,
                "no challenge solver configured",
            )),
            (ClientKind::Plain, _) => {
                Ok(Box::new(PlainClient::new(&self.settings, headers, jar)?))
            }
        }
    }
}
