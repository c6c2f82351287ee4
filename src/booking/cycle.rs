use tokio_util::sync::CancellationToken;

use crate::auth::ProfileError;
use crate::gate::{GateOutcome, ReleaseGate, ReleaseInstant};
use crate::gateway::GatewayError;
use crate::model::*;
use crate::notify::Progress;
use crate::observability::{CYCLES_TOTAL, GATE_LATENESS_SECONDS, cycle_label};

use super::catalog::resolve_candidates;
use super::resolver::Resolution;
use super::{BookingEngine, CycleError};

impl BookingEngine {
    /// Run one booking cycle to a definite result.
    ///
    /// Identity first, then a fresh availability read, then the release gate,
    /// then sequential claims. Failures before the first claim end the run
    /// immediately; per-candidate failures only move to the next candidate.
    pub async fn run_booking_cycle(
        &self,
        request: &BookingRequest,
        cancel: &CancellationToken,
    ) -> Result<Booked, CycleError> {
        let run_id = request.run_id;
        let result = self.cycle(request, cancel).await;

        metrics::counter!(CYCLES_TOTAL, "result" => cycle_label(&result)).increment(1);
        let summary = match &result {
            Ok(b) => format!(
                "booked {} (ID: {}) after {} attempts, pay at {}",
                b.display_name, b.instance_id, b.attempts, b.payment_handle
            ),
            Err(e) => format!("booking failed: {e}"),
        };
        self.report(run_id, Progress::Finished { summary });
        self.notify.remove(&run_id);
        result
    }

    /// Drive one cycle on a private current-thread runtime.
    ///
    /// For callers without an async runtime, e.g. a UI worker thread. Inside
    /// a tokio runtime this refuses with `CycleError::Runtime`; await
    /// [`run_booking_cycle`](Self::run_booking_cycle) there instead.
    pub fn run_blocking(
        &self,
        request: &BookingRequest,
        cancel: &CancellationToken,
    ) -> Result<Booked, CycleError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(CycleError::Runtime(
                "run_blocking called from inside an async runtime".into(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CycleError::Runtime(e.to_string()))?;
        runtime.block_on(self.run_booking_cycle(request, cancel))
    }

    async fn cycle(&self, request: &BookingRequest, cancel: &CancellationToken) -> Result<Booked, CycleError> {
        let run_id = request.run_id;
        self.report(
            run_id,
            Progress::Started {
                date: request.date.to_string(),
                window: request.window.clone(),
            },
        );

        // Fixed at run start, before any network time is spent.
        let release = self
            .settings
            .release_at
            .map(|t| ReleaseInstant::next(self.clock.now(), t));

        let identity = self
            .bounded(self.profiles.identity(), || ProfileError::Gateway(GatewayError::Timeout))
            .await
            .map_err(CycleError::Precondition)?;
        self.report(
            run_id,
            Progress::IdentityReady {
                user_id: identity.user_id().to_string(),
            },
        );

        let query = AvailabilityQuery {
            space_id: self.settings.space_id.clone(),
            sport_type: self.settings.sport_type.clone(),
            date: request.date,
        };
        let snapshot = self
            .bounded(self.gateway.query_availability(&query), || GatewayError::Timeout)
            .await
            .map_err(CycleError::Query)?;
        self.report(run_id, Progress::SnapshotLoaded { entries: snapshot.len() });

        let candidates = resolve_candidates(&snapshot, &request.window);
        if candidates.is_empty() {
            return Err(CycleError::NoMatch {
                window: request.window.clone(),
            });
        }
        self.report(
            run_id,
            Progress::CandidatesResolved {
                candidates: candidates.clone(),
            },
        );

        if let Some(release) = release {
            self.report(
                run_id,
                Progress::WaitingForRelease {
                    target: release.instant().clone(),
                },
            );
            let gate = ReleaseGate::new(self.clock.clone());
            let outcome = gate
                .wait(&release, cancel, |seconds_left| {
                    self.report(run_id, Progress::Countdown { seconds_left })
                })
                .await;
            match outcome {
                GateOutcome::Cancelled => return Err(CycleError::Cancelled),
                GateOutcome::Reached { lateness } => {
                    metrics::histogram!(GATE_LATENESS_SECONDS).record(lateness.as_secs_f64());
                    self.report(run_id, Progress::ReleaseReached { lateness });
                }
            }
        }

        match self.resolve(run_id, &candidates, &identity, cancel).await {
            Resolution::Claimed {
                candidate,
                payment_handle,
                order,
                attempts,
            } => Ok(Booked {
                run_id,
                instance_id: candidate.instance_id,
                display_name: candidate.display_name,
                payment_handle,
                order,
                attempts: attempts.len(),
            }),
            Resolution::Exhausted { attempts } => Err(CycleError::Exhausted { attempts }),
            Resolution::Cancelled { .. } => Err(CycleError::Cancelled),
        }
    }
}
