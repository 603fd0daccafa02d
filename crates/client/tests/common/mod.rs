#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use battlefield_client::api::ArenaApiError;
use battlefield_client::backend::SimulationBackend;
use battlefield_client::controller::{Controller, ControllerHandle};
use battlefield_core::catalog::{AgentCatalog, Dataset};
use battlefield_core::selection::{RunRequest, Slot};
use battlefield_core::snapshot::StatusSnapshot;
use battlefield_core::types::SimulationId;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Roster used by most tests, in slot order.
pub const ROSTER: [&str; 6] = ["A", "B", "GPT-X", "D", "E", "F"];

pub const DATASET: &str = "AAPL_data.csv";

/// Poll interval used by controller tests.
pub const FAST_POLL: Duration = Duration::from_millis(1);

/// Upper bound for any single wait in a test.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One scripted answer to a status request.
pub enum Step {
    Snapshot(StatusSnapshot),
    Fail(ArenaApiError),
    /// Answer with the snapshot once the gate is notified.
    Gated(Arc<Notify>, StatusSnapshot),
}

/// In-memory backend answering from a script and counting calls.
///
/// Once the status script is exhausted every further status request
/// pends forever, so a run stays `running` until the test acts.
pub struct ScriptedBackend {
    catalog: Option<AgentCatalog>,
    datasets: Vec<Dataset>,
    start_failures: Mutex<VecDeque<ArenaApiError>>,
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<RunRequest>>,
    start_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            catalog: Some(catalog()),
            datasets: vec![Dataset::from_filename(DATASET)],
            start_failures: Mutex::new(VecDeque::new()),
            steps: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            start_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn without_datasets(mut self) -> Self {
        self.datasets.clear();
        self
    }

    pub fn without_catalog(mut self) -> Self {
        self.catalog = None;
        self
    }

    pub fn reject_next_start(self, status: u16, message: &str) -> Self {
        self.start_failures
            .lock()
            .unwrap()
            .push_back(ArenaApiError::ApiError {
                status,
                message: message.to_string(),
            });
        self
    }

    pub fn then(self, step: Step) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    pub fn then_json(self, json: &str) -> Self {
        self.then(Step::Snapshot(snapshot(json)))
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SimulationBackend for ScriptedBackend {
    async fn list_agents(&self) -> Result<AgentCatalog, ArenaApiError> {
        self.catalog.clone().ok_or_else(|| ArenaApiError::ApiError {
            status: 503,
            message: "catalog unavailable".into(),
        })
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>, ArenaApiError> {
        Ok(self.datasets.clone())
    }

    async fn start_run(&self, request: &RunRequest) -> Result<SimulationId, ArenaApiError> {
        let n = self.start_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        if let Some(err) = self.start_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(format!("sim_{n}"))
    }

    async fn simulation_status(
        &self,
        _simulation_id: &str,
    ) -> Result<StatusSnapshot, ArenaApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Snapshot(snapshot)) => Ok(snapshot),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Gated(gate, snapshot)) => {
                gate.notified().await;
                Ok(snapshot)
            }
            None => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn catalog() -> AgentCatalog {
    let mut providers = BTreeMap::new();
    providers.insert("anthropic".to_string(), vec!["A".into(), "B".into()]);
    providers.insert("openai".to_string(), vec!["GPT-X".into(), "D".into()]);
    providers.insert("meta".to_string(), vec!["E".into(), "F".into()]);
    AgentCatalog::new(providers)
}

pub fn snapshot(json: &str) -> StatusSnapshot {
    serde_json::from_str(json).expect("valid snapshot fixture")
}

pub fn running(progress: u8, message: &str) -> Step {
    Step::Snapshot(snapshot(&format!(
        r#"{{"status":"running","progress":{progress},"message":"{message}"}}"#
    )))
}

pub fn completed() -> Step {
    Step::Snapshot(snapshot(
        r#"{
            "status": "completed",
            "progress": 100,
            "results": {
                "winner": {"name": "GPT-X", "roi": 15.3},
                "leaderboard": [
                    {"name": "GPT-X", "roi": 15.3, "current_value": 11530.0},
                    {"name": "A", "roi": 4.1, "current_value": 10410.0},
                    {"name": "B", "roi": -2.0, "current_value": 9800.0}
                ]
            }
        }"#,
    ))
}

// ---------------------------------------------------------------------------
// Controller helpers
// ---------------------------------------------------------------------------

/// Bootstrap a controller over `backend`, fill every slot from [`ROSTER`]
/// and spawn it.
pub async fn spawn_ready(backend: Arc<ScriptedBackend>) -> (ControllerHandle, JoinHandle<()>) {
    let mut controller = Controller::with_poll_interval(backend, FAST_POLL);
    controller.bootstrap().await.expect("bootstrap should succeed");
    for (slot, agent) in Slot::ALL.into_iter().zip(ROSTER) {
        controller.select(slot, Some(agent.to_string()));
    }
    controller.spawn()
}

/// Await `fut`, failing the test if it takes unreasonably long.
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(TEST_TIMEOUT, fut)
        .await
        .expect("timed out waiting for the controller")
}

/// Wait until `condition` holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    within(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
}
