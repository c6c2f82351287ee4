use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use ulid::Ulid;

use crate::gateway::GatewayError;
use crate::limits::ACTION_OK_STATE;
use crate::model::*;
use crate::notify::Progress;
use crate::observability::{CLAIM_ATTEMPTS_TOTAL, CLAIM_DURATION_SECONDS, outcome_label};

use super::BookingEngine;

/// How a contention run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Claimed {
        candidate: Candidate,
        payment_handle: String,
        order: Value,
        /// Every attempt made, the successful one last.
        attempts: Vec<ClaimAttempt>,
    },
    Exhausted {
        attempts: Vec<ClaimAttempt>,
    },
    /// Cancellation was observed between attempts.
    Cancelled {
        attempts: Vec<ClaimAttempt>,
    },
}

/// Success needs both the success state and a payment handle; anything else
/// is a rejection, and a failed exchange is a fault.
pub fn classify(result: Result<ClaimResponse, GatewayError>) -> ClaimOutcome {
    let response = match result {
        Ok(r) => r,
        Err(e) => return ClaimOutcome::Faulted { cause: e.to_string() },
    };
    match (response.status, response.payment_handle) {
        (Some(ACTION_OK_STATE), Some(payment_handle)) => ClaimOutcome::Claimed {
            payment_handle,
            order: response.data,
        },
        (Some(ACTION_OK_STATE), None) => ClaimOutcome::Rejected {
            reason: response
                .message
                .unwrap_or_else(|| "success state without payment handle".into()),
        },
        (state, _) => ClaimOutcome::Rejected {
            reason: response.message.unwrap_or_else(|| match state {
                Some(s) => format!("actionState {s}"),
                None => "no actionState in response".into(),
            }),
        },
    }
}

impl BookingEngine {
    /// Claim the first candidate that the platform will give us.
    ///
    /// `Attempting(i)` issues exactly one claim for `candidates[i]`; success
    /// is terminal, any other outcome moves to `i + 1`, and running past the
    /// end is `Exhausted`. A faulted attempt consumes its candidate just like a
    /// rejected one. Cancellation is checked before each attempt; an attempt
    /// in flight runs to completion (bounded by `exchange_timeout`).
    pub async fn resolve(
        &self,
        run_id: Ulid,
        candidates: &[Candidate],
        identity: &Identity,
        cancel: &CancellationToken,
    ) -> Resolution {
        let mut attempts = Vec::with_capacity(candidates.len());

        for (index, candidate) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("[{run_id}] cancelled after {index} attempts");
                return Resolution::Cancelled { attempts };
            }
            self.report(
                run_id,
                Progress::AttemptStarted {
                    index,
                    candidate: candidate.clone(),
                },
            );

            let started = Instant::now();
            let result = self
                .bounded(self.gateway.submit_claim(candidate, identity), || GatewayError::Timeout)
                .await;
            metrics::histogram!(CLAIM_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

            let outcome = classify(result);
            metrics::counter!(CLAIM_ATTEMPTS_TOTAL, "outcome" => outcome_label(&outcome)).increment(1);
            if !outcome.is_claimed() {
                warn!("[{run_id}] {candidate} not claimed, moving on: {outcome}");
            }
            self.report(
                run_id,
                Progress::AttemptFinished {
                    index,
                    candidate: candidate.clone(),
                    outcome: outcome.clone(),
                },
            );

            let claimed = match &outcome {
                ClaimOutcome::Claimed { payment_handle, order } => Some((payment_handle.clone(), order.clone())),
                _ => None,
            };
            attempts.push(ClaimAttempt {
                candidate: candidate.clone(),
                outcome,
            });
            if let Some((payment_handle, order)) = claimed {
                return Resolution::Claimed {
                    candidate: candidate.clone(),
                    payment_handle,
                    order,
                    attempts,
                };
            }
        }

        Resolution::Exhausted { attempts }
    }
}
