use std::fmt;
use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::limits::PROGRESS_CHANNEL_CAPACITY;
use crate::model::{Candidate, ClaimOutcome};

/// Status line of a running cycle. Informational only; nothing reacts to it.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Started { date: String, window: String },
    IdentityReady { user_id: String },
    SnapshotLoaded { entries: usize },
    CandidatesResolved { candidates: Vec<Candidate> },
    WaitingForRelease { target: DateTime<Tz> },
    Countdown { seconds_left: u64 },
    ReleaseReached { lateness: Duration },
    AttemptStarted { index: usize, candidate: Candidate },
    AttemptFinished { index: usize, candidate: Candidate, outcome: ClaimOutcome },
    Finished { summary: String },
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::Started { date, window } => write!(f, "booking {date} {window}"),
            Progress::IdentityReady { user_id } => write!(f, "identity ready for user {user_id}"),
            Progress::SnapshotLoaded { entries } => write!(f, "availability loaded: {entries} slots listed"),
            Progress::CandidatesResolved { candidates } => {
                write!(f, "{} candidates, best first:", candidates.len())?;
                for c in candidates {
                    write!(f, "\n  - {c}")?;
                }
                Ok(())
            }
            Progress::WaitingForRelease { target } => {
                write!(f, "waiting for release at {}", target.format("%Y-%m-%d %H:%M:%S %Z"))
            }
            Progress::Countdown { seconds_left } => write!(f, "countdown: {seconds_left}s"),
            Progress::ReleaseReached { lateness } => {
                write!(f, "release reached (+{}ms), claiming", lateness.as_millis())
            }
            Progress::AttemptStarted { index, candidate } => {
                write!(f, "attempt #{}: {candidate}", index + 1)
            }
            Progress::AttemptFinished { index, candidate, outcome } => {
                write!(f, "attempt #{} {}: {outcome}", index + 1, candidate.display_name)
            }
            Progress::Finished { summary } => write!(f, "{summary}"),
        }
    }
}

/// Broadcast hub for progress per booking run.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Progress>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a run's progress. Creates the channel if needed, so
    /// subscribing before the run starts misses nothing.
    pub fn subscribe(&self, run_id: Ulid) -> broadcast::Receiver<Progress> {
        let sender = self
            .channels
            .entry(run_id)
            .or_insert_with(|| broadcast::channel(PROGRESS_CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, run_id: Ulid, progress: &Progress) {
        if let Some(sender) = self.channels.get(&run_id) {
            let _ = sender.send(progress.clone());
        }
    }

    /// Drop a finished run's channel; receivers see the stream close.
    pub fn remove(&self, run_id: &Ulid) {
        self.channels.remove(run_id);
    }

    pub fn active_runs(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let run = Ulid::new();
        let mut rx = hub.subscribe(run);

        let progress = Progress::SnapshotLoaded { entries: 3 };
        hub.send(run, &progress);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, progress);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let run = Ulid::new();
        hub.send(run, &Progress::Countdown { seconds_left: 1 });
        assert_eq!(hub.active_runs(), 0);
    }

    #[tokio::test]
    async fn remove_closes_stream() {
        let hub = NotifyHub::new();
        let run = Ulid::new();
        let mut rx = hub.subscribe(run);
        hub.remove(&run);
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
    }

    #[tokio::test]
    async fn runs_are_isolated() {
        let hub = NotifyHub::new();
        let (a, b) = (Ulid::new(), Ulid::new());
        let mut rx_a = hub.subscribe(a);
        let _rx_b = hub.subscribe(b);
        hub.send(b, &Progress::Countdown { seconds_left: 2 });
        hub.send(a, &Progress::Countdown { seconds_left: 1 });
        assert_eq!(rx_a.recv().await.unwrap(), Progress::Countdown { seconds_left: 1 });
    }

    #[test]
    fn candidate_list_renders_one_per_line() {
        let p = Progress::CandidatesResolved {
            candidates: vec![
                Candidate {
                    instance_id: "A1".into(),
                    display_name: "Court West".into(),
                },
                Candidate {
                    instance_id: "A2".into(),
                    display_name: "Court East".into(),
                },
            ],
        };
        assert_eq!(
            p.to_string(),
            "2 candidates, best first:\n  - Court West (ID: A1)\n  - Court East (ID: A2)"
        );
    }
}
