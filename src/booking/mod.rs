mod catalog;
mod cycle;
mod error;
mod resolver;

pub use catalog::resolve_candidates;
pub use error::CycleError;
pub use resolver::{Resolution, classify};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use tracing::info;
use ulid::Ulid;

use crate::auth::ProfileProvider;
use crate::gate::Clock;
use crate::gateway::BookingGateway;
use crate::limits::DEFAULT_REQUEST_TIMEOUT;
use crate::notify::{NotifyHub, Progress};

/// Per-process knobs of a booking cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSettings {
    pub space_id: String,
    pub sport_type: String,
    /// Release time of day in the reference zone; `None` claims immediately.
    pub release_at: Option<NaiveTime>,
    /// Upper bound on every gateway and profile exchange.
    pub exchange_timeout: Duration,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            space_id: "111162".into(),
            sport_type: "2".into(),
            release_at: Some(crate::config::default_release_time()),
            exchange_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Runs booking cycles: identity, availability, release gate, contention.
///
/// One cycle is one sequential flow; the engine never has two claims of the
/// same run in flight. Separate runs may share an engine.
pub struct BookingEngine {
    gateway: Arc<dyn BookingGateway>,
    profiles: Arc<dyn ProfileProvider>,
    clock: Arc<dyn Clock>,
    pub notify: Arc<NotifyHub>,
    settings: CycleSettings,
}

impl BookingEngine {
    pub fn new(
        gateway: Arc<dyn BookingGateway>,
        profiles: Arc<dyn ProfileProvider>,
        clock: Arc<dyn Clock>,
        notify: Arc<NotifyHub>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            gateway,
            profiles,
            clock,
            notify,
            settings,
        }
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// Log a progress line and hand it to the run's subscribers.
    fn report(&self, run_id: Ulid, progress: Progress) {
        info!("[{run_id}] {progress}");
        self.notify.send(run_id, &progress);
    }

    /// Await `fut` for at most `exchange_timeout`.
    async fn bounded<T, E>(
        &self,
        fut: impl Future<Output = Result<T, E>>,
        on_timeout: impl FnOnce() -> E,
    ) -> Result<T, E> {
        tokio::time::timeout(self.settings.exchange_timeout, fut)
            .await
            .unwrap_or_else(|_| Err(on_timeout()))
    }
}
