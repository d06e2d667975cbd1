//! Error taxonomy for every Ragmate operation.
//!
//! Three kinds matter to callers:
//! - `Validation` — bad input, rejected before any network call, never retried.
//! - `Transport` — non-2xx status or network failure; retryable for 429/5xx.
//! - `Consistency` — a multi-step operation failed partway (e.g. the origin
//!   upload succeeded but the attach did not); never retried automatically,
//!   the caller decides on the compensating action.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagmateError>;

/// The step of a multi-step operation that failed partway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Origin upload succeeded, attaching to the vector store failed.
    Attach,
    /// Detaching the file from the vector store failed.
    Detach,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Attach => write!(f, "attach"),
            Stage::Detach => write!(f, "detach"),
        }
    }
}

#[derive(Error, Debug)]
pub enum RagmateError {
    /// Input rejected before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Non-2xx HTTP status or network failure (status 0 = no response).
    #[error("Transport error (status {status}): {body}")]
    Transport { status: u16, body: String },

    /// Partial multi-step failure; `orphan_file_id` names the resource left
    /// behind on the remote side so the caller can compensate.
    #[error("Consistency error at {stage}: {detail}")]
    Consistency {
        stage: Stage,
        detail: String,
        orphan_file_id: Option<String>,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagmateError {
    /// Transport failure from a network-level error (no HTTP response).
    pub fn network(detail: impl Into<String>) -> Self {
        RagmateError::Transport {
            status: 0,
            body: detail.into(),
        }
    }

    /// Whether a retry layer may re-issue the failed call.
    ///
    /// Only transport failures qualify: 429, any 5xx, and status 0
    /// (connection refused, timeout, DNS). Other 4xx are fail-fast,
    /// and Validation/Consistency are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            RagmateError::Transport { status, .. } => {
                *status == 0 || *status == 429 || (500..600).contains(status)
            }
            _ => false,
        }
    }

    /// The HTTP status carried by a transport error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            RagmateError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(RagmateError::Transport { status: 429, body: String::new() }.is_retryable());
        assert!(RagmateError::Transport { status: 503, body: String::new() }.is_retryable());
        assert!(RagmateError::network("connection refused").is_retryable());
        assert!(!RagmateError::Transport { status: 404, body: String::new() }.is_retryable());
        assert!(!RagmateError::Validation("bad".into()).is_retryable());
        assert!(
            !RagmateError::Consistency {
                stage: Stage::Attach,
                detail: "attach failed".into(),
                orphan_file_id: Some("file_x".into()),
            }
            .is_retryable()
        );
    }
}
