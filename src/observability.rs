use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::booking::CycleError;
use crate::model::{Booked, ClaimOutcome};

// ── Claims ──────────────────────────────────────────────────────

/// Counter: claim requests issued. Labels: outcome.
pub const CLAIM_ATTEMPTS_TOTAL: &str = "courtrush_claim_attempts_total";

/// Histogram: claim round-trip in seconds, timeouts included.
pub const CLAIM_DURATION_SECONDS: &str = "courtrush_claim_duration_seconds";

// ── Cycles ──────────────────────────────────────────────────────

/// Counter: finished booking cycles. Labels: result.
pub const CYCLES_TOTAL: &str = "courtrush_cycles_total";

/// Histogram: how late the release gate opened, in seconds.
pub const GATE_LATENESS_SECONDS: &str = "courtrush_gate_lateness_seconds";

// ── Gateway ─────────────────────────────────────────────────────

/// Counter: HTTP exchanges with the platform. Labels: op, status.
pub const GATEWAY_REQUESTS_TOTAL: &str = "courtrush_gateway_requests_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

pub fn outcome_label(outcome: &ClaimOutcome) -> &'static str {
    match outcome {
        ClaimOutcome::Claimed { .. } => "claimed",
        ClaimOutcome::Rejected { .. } => "rejected",
        ClaimOutcome::Faulted { .. } => "faulted",
    }
}

pub fn cycle_label(result: &Result<Booked, CycleError>) -> &'static str {
    match result {
        Ok(_) => "booked",
        Err(CycleError::Precondition(_)) => "precondition",
        Err(CycleError::Query(_)) => "query_failed",
        Err(CycleError::NoMatch { .. }) => "no_match",
        Err(CycleError::Exhausted { .. }) => "exhausted",
        Err(CycleError::Cancelled) => "cancelled",
        Err(CycleError::Runtime(_)) => "runtime",
    }
}
