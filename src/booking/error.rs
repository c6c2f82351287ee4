use crate::auth::ProfileError;
use crate::gateway::GatewayError;
use crate::model::ClaimAttempt;

/// Why a booking cycle ended without a reservation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CycleError {
    /// No usable identity; nothing was queried or claimed.
    #[error("identity not established: {0}")]
    Precondition(ProfileError),
    #[error("availability query failed: {0}")]
    Query(GatewayError),
    /// The snapshot had nothing unlocked for the window.
    #[error("no unlocked slot for window {window}")]
    NoMatch { window: String },
    /// Every candidate was tried and none stuck.
    #[error("all {} candidates failed", .attempts.len())]
    Exhausted { attempts: Vec<ClaimAttempt> },
    #[error("cancelled")]
    Cancelled,
    #[error("runtime error: {0}")]
    Runtime(String),
}
