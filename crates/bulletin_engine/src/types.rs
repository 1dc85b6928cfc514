use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "run cancelled")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection, TLS or body-read failure.
    Transport,
    Timeout,
    /// Denial status carrying a non-trivial body.
    Blocked { body_len: usize },
    InvalidResponse { status: u16 },
    NotFound,
    Persistence,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Cancelled,
    InvalidUrl,
    FatalDiscovery,
}

impl FailureKind {
    /// Statuses the server may answer differently on a later attempt.
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 408 | 429) || (500..600).contains(&status)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Blocked { body_len } => {
                write!(f, "blocked (denial page of {body_len} bytes)")
            }
            FailureKind::InvalidResponse { status } => write!(f, "http status {status}"),
            FailureKind::NotFound => write!(f, "not found"),
            FailureKind::Persistence => write!(f, "persistence error"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::FatalDiscovery => write!(f, "no usable source for any category"),
        }
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return FetchError::new(FailureKind::InvalidUrl, err.to_string());
    }
    FetchError::new(FailureKind::Transport, err.to_string())
}
