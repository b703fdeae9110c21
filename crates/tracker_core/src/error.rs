use thiserror::Error;

/// Why a request to the job service did not produce a usable answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestFailure {
    /// Redirected to a login page or answered with non-JSON content.
    /// Terminal: the client reloads and never retries.
    #[error("session expired")]
    AuthExpired,
    #[error("server error: {status}")]
    Server { status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RequestFailure {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, RequestFailure::AuthExpired)
    }
}
