use std::collections::BTreeSet;

use thiserror::Error;

/// Everything that can go wrong in a session turn. None of these are
/// fatal, the session always stays usable for the next request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("Missing required configuration: {}", join(.missing))]
    ConfigIncomplete { missing: BTreeSet<String> },

    #[error("Failed to connect: {0}")]
    ResourceConstructionFailed(String),

    #[error("An error occurred: {0}")]
    ResponderFailed(String),

    #[error("Request timed out: {0}")]
    ResponderTimeout(String),

    /// The request itself can't be answered, e.g. a malformed URL.
    #[error("{0}")]
    InvalidRequest(String),
}

fn join(fields: &BTreeSet<String>) -> String {
    fields.iter().cloned().collect::<Vec<_>>().join(", ")
}

impl SessionError {
    pub fn construction(err: anyhow::Error) -> Self {
        Self::ResourceConstructionFailed(format!("{:#}", err))
    }

    /// Converts an error raised while responding. Timeouts anywhere in
    /// the chain (HTTP client or database pool) are kept distinct so
    /// they can be reported as such.
    pub fn responder(err: anyhow::Error) -> Self {
        let is_timeout = err.chain().any(|cause| {
            if let Some(e) = cause.downcast_ref::<reqwest::Error>() {
                return e.is_timeout();
            }
            if let Some(sqlx::Error::PoolTimedOut) = cause.downcast_ref::<sqlx::Error>() {
                return true;
            }
            cause.downcast_ref::<tokio::time::error::Elapsed>().is_some()
        });
        if is_timeout {
            Self::ResponderTimeout(format!("{:#}", err))
        } else {
            Self::ResponderFailed(format!("{:#}", err))
        }
    }

    /// True for errors raised while responding, including rejected
    /// requests. These get recorded in the transcript instead of
    /// blocking the session.
    pub fn is_responder_failure(&self) -> bool {
        matches!(
            self,
            Self::ResponderFailed(_) | Self::ResponderTimeout(_) | Self::InvalidRequest(_)
        )
    }
}
