use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::limits::*;
use crate::model::REFERENCE_TZ;

/// Wall-clock source. Swappable so the gate can run on paused time in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The moment bookings open, in the reference zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInstant {
    at: DateTime<Tz>,
}

impl ReleaseInstant {
    pub fn at(at: DateTime<Tz>) -> Self {
        Self { at }
    }

    /// Today's `time_of_day` (reference zone) if still ahead of `now`, else tomorrow's.
    pub fn next(now: DateTime<Utc>, time_of_day: NaiveTime) -> Self {
        let local_now = now.with_timezone(&REFERENCE_TZ);
        let today = local_now.date_naive();
        let at = local_at(today, time_of_day);
        if local_now < at {
            return Self { at };
        }
        let tomorrow = today.succ_opt().unwrap_or(today);
        Self {
            at: local_at(tomorrow, time_of_day),
        }
    }

    pub fn instant(&self) -> &DateTime<Tz> {
        &self.at
    }
}

fn local_at(date: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
    let naive = date.and_time(time);
    // Asia/Shanghai has had no DST since 1991, so `earliest` is always the one.
    REFERENCE_TZ
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| REFERENCE_TZ.from_utc_datetime(&naive))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Target reached; `lateness` is how far past it the flow resumed.
    Reached { lateness: Duration },
    Cancelled,
}

/// Holds a flow until a release instant using timed sleeps.
///
/// Far from the target the clock is re-sampled at most every
/// `MAX_COARSE_SLEEP`; inside `COARSE_THRESHOLD` the gate steps on whole
/// seconds, and the final step sleeps exactly the remainder. Tokio sleeps never
/// end early, and every wake re-reads the wall clock, so the gate cannot open
/// before the target even if the system clock is adjusted underneath it.
pub struct ReleaseGate {
    clock: Arc<dyn Clock>,
    countdown_secs: u64,
}

impl ReleaseGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            countdown_secs: COUNTDOWN_SECS,
        }
    }

    pub fn with_countdown(mut self, secs: u64) -> Self {
        self.countdown_secs = secs;
        self
    }

    /// Wait for `target`, calling `on_countdown` once per whole second left
    /// during the last `countdown_secs`.
    pub async fn wait(
        &self,
        target: &ReleaseInstant,
        cancel: &CancellationToken,
        mut on_countdown: impl FnMut(u64),
    ) -> GateOutcome {
        let target = target.at.with_timezone(&Utc);
        let mut last_announced = None;

        loop {
            let now = self.clock.now();
            let remaining = match (target - now).to_std() {
                Ok(d) if !d.is_zero() => d,
                _ => {
                    let lateness = (now - target).to_std().unwrap_or_default();
                    return GateOutcome::Reached { lateness };
                }
            };
            if cancel.is_cancelled() {
                return GateOutcome::Cancelled;
            }

            let secs_left = ceil_secs(remaining);
            if secs_left <= self.countdown_secs && last_announced != Some(secs_left) {
                last_announced = Some(secs_left);
                on_countdown(secs_left);
            }

            let step = next_step(remaining);
            debug!("gate: {remaining:?} left, sleeping {step:?}");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return GateOutcome::Cancelled,
                _ = tokio::time::sleep(step) => {}
            }
        }
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

fn next_step(remaining: Duration) -> Duration {
    let one = Duration::from_secs(1);
    if remaining > COARSE_THRESHOLD {
        (remaining - COARSE_THRESHOLD).min(MAX_COARSE_SLEEP)
    } else if remaining > one {
        // Land on whole seconds so the countdown ticks evenly.
        let frac = remaining - Duration::from_secs(remaining.as_secs());
        if frac.is_zero() { one } else { frac }
    } else {
        remaining
    }
}

/// Wall clock driven by tokio's (pausable) clock.
#[cfg(test)]
pub(crate) struct TokioClock {
    origin: DateTime<Utc>,
    started: tokio::time::Instant,
    pub(crate) samples: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl TokioClock {
    pub(crate) fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            started: tokio::time::Instant::now(),
            samples: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        self.samples.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let elapsed = chrono::TimeDelta::from_std(self.started.elapsed()).unwrap_or_default();
        self.origin + elapsed
    }
}
