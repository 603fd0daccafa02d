//! Sequential status polling for one simulation job.
//!
//! [`PollLoop`] holds at most one outstanding step: either a scheduled
//! delay or a single in-flight status request. A new request is never
//! issued before the previous one resolved, and [`PollLoop::stop`] drops
//! whatever is outstanding so a late response can never be applied.
//!
//! [`PollLoop::next_response`] is cancel-safe: the delay and the request
//! future live inside the loop, so dropping the returned future (e.g. when
//! another `tokio::select!` branch wins) loses no progress.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use battlefield_core::snapshot::StatusSnapshot;
use battlefield_core::types::SimulationId;
use futures::future::BoxFuture;
use tokio::time::Sleep;

use crate::api::ArenaApiError;
use crate::backend::SimulationBackend;

/// Outcome of one status request.
pub type PollResult = Result<StatusSnapshot, ArenaApiError>;

enum PollState {
    Idle,
    Waiting {
        simulation_id: SimulationId,
        delay: Pin<Box<Sleep>>,
    },
    InFlight {
        simulation_id: SimulationId,
        request: BoxFuture<'static, PollResult>,
    },
}

pub struct PollLoop<B> {
    backend: Arc<B>,
    interval: Duration,
    state: PollState,
}

impl<B: SimulationBackend> PollLoop<B> {
    pub fn new(backend: Arc<B>, interval: Duration) -> Self {
        Self {
            backend,
            interval,
            state: PollState::Idle,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Begin polling `simulation_id`: the first request goes out
    /// immediately. Anything already outstanding is dropped.
    pub fn start(&mut self, simulation_id: SimulationId) {
        let request = self.request(&simulation_id);
        self.state = PollState::InFlight {
            simulation_id,
            request,
        };
    }

    /// Schedule exactly one more request after the poll interval.
    pub fn schedule(&mut self, simulation_id: SimulationId) {
        self.state = PollState::Waiting {
            simulation_id,
            delay: Box::pin(tokio::time::sleep(self.interval)),
        };
    }

    /// Drop any scheduled delay or in-flight request.
    ///
    /// Returns `true` if something was outstanding.
    pub fn stop(&mut self) -> bool {
        let was_active = self.is_active();
        self.state = PollState::Idle;
        was_active
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, PollState::Idle)
    }

    /// Wait for the next status response.
    ///
    /// Pends forever while idle. After a response is returned the loop is
    /// idle again until [`schedule`](Self::schedule) is called.
    pub async fn next_response(&mut self) -> (SimulationId, PollResult) {
        loop {
            match &mut self.state {
                PollState::Idle => std::future::pending::<()>().await,
                PollState::Waiting {
                    simulation_id,
                    delay,
                } => {
                    delay.as_mut().await;
                    let simulation_id = simulation_id.clone();
                    let request = self.request(&simulation_id);
                    self.state = PollState::InFlight {
                        simulation_id,
                        request,
                    };
                }
                PollState::InFlight {
                    simulation_id,
                    request,
                } => {
                    let result = request.as_mut().await;
                    let simulation_id = simulation_id.clone();
                    self.state = PollState::Idle;
                    return (simulation_id, result);
                }
            }
        }
    }

    fn request(&self, simulation_id: &str) -> BoxFuture<'static, PollResult> {
        let backend = Arc::clone(&self.backend);
        let simulation_id = simulation_id.to_string();
        tracing::debug!(simulation_id = %simulation_id, "Requesting simulation status");
        Box::pin(async move { backend.simulation_status(&simulation_id).await })
    }
}
