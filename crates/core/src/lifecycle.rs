//! Lifecycle view model for one controller session.
//!
//! [`LifecycleViewModel`] is the single owned aggregate the presentation
//! layer reads. Run state only changes through the transitions below:
//!
//! ```text
//!   idle --begin_run--> running --apply_snapshot--> completed | errored
//!     ^                    |            (transport) fail_transport
//!     +------- reset ------+------------------------+
//! ```
//!
//! Selection and dataset edits are independent of the run state and
//! survive [`reset`](LifecycleViewModel::reset).

use chrono::Utc;
use serde::Serialize;

use crate::catalog::{AgentCatalog, Dataset};
use crate::progress::{GenerationTracker, ProgressMessage};
use crate::selection::{RunRequest, SelectionRegistry, Slot};
use crate::snapshot::{SimulationResults, SimulationStatus, StatusSnapshot};
use crate::types::{AgentId, SimulationId, Timestamp};

/// Highest progress value shown while a run is still in flight. `100` is
/// reserved for a completed run.
pub const MAX_RUNNING_PROGRESS: u8 = 99;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Completed,
    Errored,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Errored)
    }
}

/// What applying a snapshot did to the run.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOutcome {
    /// Still running; another poll should be scheduled.
    Continue {
        message: ProgressMessage,
        preview_changed: bool,
    },
    /// The run completed. No further polls.
    Completed,
    /// The service reported an error. No further polls.
    Failed { error: String },
    /// No run is active; the snapshot was discarded.
    Ignored,
}

/// The aggregate observable state of the controller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LifecycleViewModel {
    catalog: AgentCatalog,
    datasets: Vec<Dataset>,
    dataset: Option<String>,
    selection: SelectionRegistry,

    phase: RunPhase,
    simulation_id: Option<SimulationId>,
    submitted_agents: Vec<AgentId>,
    progress: u8,
    current_task: String,
    generation: GenerationTracker,
    results: Option<SimulationResults>,
    error: Option<String>,
    started_at: Option<Timestamp>,
    finished_at: Option<Timestamp>,
}

impl LifecycleViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- catalog / datasets ----

    /// Install the agent catalog fetched at startup.
    pub fn set_catalog(&mut self, catalog: AgentCatalog) {
        self.catalog = catalog;
    }

    /// Install the dataset listing. The first entry becomes the chosen
    /// dataset unless one is already chosen.
    pub fn set_datasets(&mut self, datasets: Vec<Dataset>) {
        if self.dataset.is_none() {
            self.dataset = datasets.first().map(|d| d.filename.clone());
        }
        self.datasets = datasets;
    }

    pub fn choose_dataset(&mut self, filename: Option<String>) {
        self.dataset = filename.filter(|f| !f.trim().is_empty());
    }

    pub fn catalog(&self) -> &AgentCatalog {
        &self.catalog
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn dataset(&self) -> Option<&str> {
        self.dataset.as_deref()
    }

    // ---- selection ----

    pub fn select(&mut self, slot: Slot, agent: Option<AgentId>) {
        self.selection.select(slot, agent);
    }

    pub fn selection(&self) -> &SelectionRegistry {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionRegistry {
        &mut self.selection
    }

    // ---- run transitions ----

    /// Enter `running` for a freshly created job.
    ///
    /// Progress restarts at 0 and every distinct submitted identifier is
    /// marked pending.
    pub fn begin_run(&mut self, simulation_id: SimulationId, request: &RunRequest) {
        self.phase = RunPhase::Running;
        self.simulation_id = Some(simulation_id);
        self.submitted_agents = request.agents.clone();
        self.progress = 0;
        self.current_task = "Starting simulation...".to_string();
        self.generation = GenerationTracker::for_roster(&request.agents);
        self.results = None;
        self.error = None;
        self.started_at = Some(Utc::now());
        self.finished_at = None;
    }

    /// Apply one poll response.
    pub fn apply_snapshot(&mut self, snapshot: &StatusSnapshot) -> SnapshotOutcome {
        if self.phase() != RunPhase::Running {
            return SnapshotOutcome::Ignored;
        }

        match snapshot.status {
            SimulationStatus::Completed => {
                self.results = snapshot.results.clone();
                self.progress = 100;
                if let Some(message) = &snapshot.message {
                    self.current_task = message.clone();
                }
                self.finish(RunPhase::Completed);
                SnapshotOutcome::Completed
            }
            SimulationStatus::Error => {
                let error = snapshot
                    .error
                    .clone()
                    .or_else(|| snapshot.message.clone())
                    .unwrap_or_else(|| "Simulation failed".to_string());
                self.fail(error.clone());
                SnapshotOutcome::Failed { error }
            }
            SimulationStatus::Starting | SimulationStatus::Running | SimulationStatus::Unknown => {
                self.progress = snapshot.percent().min(MAX_RUNNING_PROGRESS);

                let message = match &snapshot.message {
                    Some(text) => {
                        self.current_task = text.clone();
                        self.generation.apply_message(text)
                    }
                    None => ProgressMessage::Other,
                };

                let preview_changed = match &snapshot.code_preview {
                    Some(code) => self
                        .generation
                        .apply_preview(code, snapshot.preview_model.as_deref()),
                    None => false,
                };

                SnapshotOutcome::Continue {
                    message,
                    preview_changed,
                }
            }
        }
    }

    /// Polling failed at the transport level. Terminal for the run.
    pub fn fail_transport(&mut self, error: impl Into<String>) {
        if self.phase() == RunPhase::Running {
            self.fail(error.into());
        }
    }

    /// Job creation was rejected or unreachable. The run never starts.
    pub fn fail_submission(&mut self, error: impl Into<String>) {
        self.reset();
        self.error = Some(error.into());
    }

    /// Return to `idle` from any state.
    ///
    /// Clears every run-derived field; selection, dataset and catalog are
    /// kept so the same run can be launched again.
    pub fn reset(&mut self) {
        self.phase = RunPhase::Idle;
        self.simulation_id = None;
        self.submitted_agents.clear();
        self.progress = 0;
        self.current_task.clear();
        self.generation = GenerationTracker::default();
        self.results = None;
        self.error = None;
        self.started_at = None;
        self.finished_at = None;
    }

    fn fail(&mut self, error: String) {
        self.current_task = format!("Error: {error}");
        self.error = Some(error);
        self.finish(RunPhase::Errored);
    }

    fn finish(&mut self, phase: RunPhase) {
        self.phase = phase;
        self.finished_at = Some(Utc::now());
    }

    // ---- read-only projection ----

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Run flag: `true` only while a job is being polled.
    pub fn is_running(&self) -> bool {
        self.phase() == RunPhase::Running
    }

    /// `true` when the instructional panel should be shown instead of the
    /// progress panel.
    pub fn show_instructions(&self) -> bool {
        self.phase() == RunPhase::Idle
    }

    pub fn simulation_id(&self) -> Option<&str> {
        self.simulation_id.as_deref()
    }

    /// Identifiers frozen into the active run at submission time.
    pub fn submitted_agents(&self) -> &[AgentId] {
        &self.submitted_agents
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn current_task(&self) -> &str {
        &self.current_task
    }

    pub fn generation(&self) -> &GenerationTracker {
        &self.generation
    }

    pub fn results(&self) -> Option<&SimulationResults> {
        self.results.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<Timestamp> {
        self.finished_at
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
