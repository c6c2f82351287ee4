mod http;
pub mod wire;

pub use http::{PlatformClient, PlatformSettings};

use async_trait::async_trait;

use crate::model::*;

/// The remote booking platform as the core sees it.
///
/// Implementations own their transport. The core never calls two methods of
/// one gateway concurrently, so implementations need not tolerate it.
#[async_trait]
pub trait BookingGateway: Send + Sync {
    /// Read-only availability read for one pool and date.
    async fn query_availability(&self, query: &AvailabilityQuery) -> Result<AvailabilitySnapshot, GatewayError>;

    /// Side-effecting claim of one instance for `identity`. Exactly one request,
    /// no retry.
    async fn submit_claim(&self, candidate: &Candidate, identity: &Identity) -> Result<ClaimResponse, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    /// Well-formed answer whose `actionState` says no.
    #[error("platform refused (actionState {state:?}): {message}")]
    Refused { state: Option<i64>, message: String },
}

impl GatewayError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else if e.is_decode() {
            GatewayError::Malformed(e.to_string())
        } else {
            GatewayError::Transport(e.to_string())
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Transport(_) => "transport_error",
            GatewayError::Timeout => "timeout",
            GatewayError::Status { .. } => "http_error",
            GatewayError::Malformed(_) => "malformed",
            GatewayError::Refused { .. } => "refused",
        }
    }
}
