//! Simulation orchestration controller.
//!
//! [`Controller`] owns the [`LifecycleViewModel`] and the [`PollLoop`].
//! Once [`spawn`](Controller::spawn)ed it runs as a single task that
//! serializes every mutation: commands from [`ControllerHandle`]s and poll
//! responses are handled one at a time inside one `tokio::select!` loop,
//! so no locking is needed and a reset always lands before any response
//! that was still in flight.
//!
//! The latest view model is published on a [`watch`] channel; lifecycle
//! changes are additionally broadcast as [`RunEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use battlefield_core::error::CoreError;
use battlefield_core::lifecycle::{LifecycleViewModel, RunPhase, SnapshotOutcome};
use battlefield_core::progress::ProgressMessage;
use battlefield_core::selection::Slot;
use battlefield_core::types::{AgentId, SimulationId};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::SimulationBackend;
use crate::config::ClientConfig;
use crate::events::RunEvent;
use crate::poll::{PollLoop, PollResult};

/// Broadcast channel capacity for run events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Command queue capacity between handles and the controller task.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Errors surfaced to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum RunError {
    /// Incomplete selection or missing dataset. No request was sent.
    #[error("{0}")]
    Validation(String),

    /// Job creation was rejected or the service was unreachable.
    #[error("Failed to start simulation: {0}")]
    Submission(String),

    /// Polling failed at the network or decoding level.
    #[error("Lost contact with simulation: {0}")]
    Transport(String),

    /// The service reported the job as failed.
    #[error("Simulation failed: {0}")]
    Remote(String),

    /// The agent catalog could not be loaded.
    #[error("Failed to load agent catalog: {0}")]
    Startup(String),

    /// Submit was requested while a run is still being polled.
    #[error("A simulation is already running")]
    AlreadyRunning,

    /// The controller task has stopped.
    #[error("Controller is no longer running")]
    ControllerGone,
}

impl From<CoreError> for RunError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => RunError::Validation(msg),
        }
    }
}

/// Requests sent from a [`ControllerHandle`] to the controller task.
#[derive(Debug)]
enum Command {
    Select {
        slot: Slot,
        agent: Option<AgentId>,
    },
    ChooseDataset {
        filename: Option<String>,
    },
    Autofill {
        reply: oneshot::Sender<usize>,
    },
    Submit {
        reply: oneshot::Sender<Result<SimulationId, RunError>>,
    },
    Reset,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct Controller<B: SimulationBackend> {
    backend: Arc<B>,
    view: LifecycleViewModel,
    poll: PollLoop<B>,
    view_tx: watch::Sender<LifecycleViewModel>,
    event_tx: broadcast::Sender<RunEvent>,
}

impl<B: SimulationBackend> Controller<B> {
    pub fn new(backend: Arc<B>, config: &ClientConfig) -> Self {
        Self::with_poll_interval(backend, config.poll_interval)
    }

    pub fn with_poll_interval(backend: Arc<B>, poll_interval: Duration) -> Self {
        let view = LifecycleViewModel::new();
        let (view_tx, _) = watch::channel(view.clone());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            poll: PollLoop::new(Arc::clone(&backend), poll_interval),
            backend,
            view,
            view_tx,
            event_tx,
        }
    }

    pub fn view(&self) -> &LifecycleViewModel {
        &self.view
    }

    /// Load the agent catalog and dataset listing.
    ///
    /// A missing catalog is fatal. A missing dataset listing only leaves
    /// the dataset unset; submit validation reports it later.
    pub async fn bootstrap(&mut self) -> Result<(), RunError> {
        let backend = Arc::clone(&self.backend);

        let catalog = backend
            .list_agents()
            .await
            .map_err(|e| RunError::Startup(e.to_string()))?;

        match backend.list_datasets().await {
            Ok(datasets) => {
                tracing::info!(
                    agents = catalog.len(),
                    datasets = datasets.len(),
                    default_dataset = datasets.first().map(|d| d.filename.as_str()),
                    "Catalog loaded",
                );
                self.view.set_datasets(datasets);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load dataset listing");
            }
        }

        self.view.set_catalog(catalog);
        self.publish();
        Ok(())
    }

    // ---- selection ----

    pub fn select(&mut self, slot: Slot, agent: Option<AgentId>) {
        tracing::debug!(?slot, agent = agent.as_deref(), "Slot selected");
        self.view.select(slot, agent);
        self.publish();
    }

    pub fn choose_dataset(&mut self, filename: Option<String>) {
        self.view.choose_dataset(filename);
        self.publish();
    }

    /// Fill empty slots from the catalog. Returns how many were filled.
    pub fn autofill(&mut self) -> usize {
        let catalog = self.view.catalog().clone();
        let filled = self.view.selection_mut().autofill(&catalog);
        self.publish();
        filled
    }

    // ---- run transitions ----

    /// Validate the selection and create a simulation job.
    ///
    /// On success the view model enters `running` and the first status
    /// request is issued as soon as the controller loop runs.
    pub async fn submit(&mut self) -> Result<SimulationId, RunError> {
        if self.view.is_running() {
            return Err(RunError::AlreadyRunning);
        }

        let request = self
            .view
            .selection()
            .build_run_request(self.view.dataset())?;

        tracing::info!(
            agents = ?request.agents,
            stock = %request.stock,
            "Submitting simulation",
        );

        self.poll.stop();
        let backend = Arc::clone(&self.backend);

        match backend.start_run(&request).await {
            Ok(simulation_id) => {
                tracing::info!(simulation_id = %simulation_id, "Simulation started");
                self.view.begin_run(simulation_id.clone(), &request);
                self.poll.start(simulation_id.clone());
                self.emit(RunEvent::RunStarted {
                    simulation_id: simulation_id.clone(),
                    agents: request.agents,
                    stock: request.stock,
                });
                self.publish();
                Ok(simulation_id)
            }
            Err(e) => {
                let message = e
                    .server_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Could not reach simulation service: {e}"));
                tracing::error!(error = %e, "Failed to start simulation");
                self.view.fail_submission(message.clone());
                self.publish();
                Err(RunError::Submission(message))
            }
        }
    }

    /// Return to idle from any state, cancelling any scheduled or
    /// in-flight poll. The selection is kept.
    pub fn reset(&mut self) {
        let cancelled_poll = self.poll.stop();
        tracing::info!(
            simulation_id = self.view.simulation_id(),
            phase = ?self.view.phase(),
            cancelled_poll,
            "Controller reset",
        );
        self.view.reset();
        self.emit(RunEvent::RunReset);
        self.publish();
    }

    /// Apply one poll response and schedule the next poll if the run is
    /// still going.
    fn handle_poll_result(&mut self, simulation_id: SimulationId, result: PollResult) {
        if self.view.simulation_id() != Some(simulation_id.as_str()) {
            tracing::warn!(
                simulation_id = %simulation_id,
                "Discarding status for a run that is no longer active",
            );
            return;
        }

        match result {
            Ok(snapshot) => match self.view.apply_snapshot(&snapshot) {
                SnapshotOutcome::Continue {
                    message,
                    preview_changed,
                } => {
                    tracing::debug!(
                        simulation_id = %simulation_id,
                        status = ?snapshot.status,
                        progress = self.view.progress(),
                        message = self.view.current_task(),
                        "Simulation progress",
                    );
                    self.emit(RunEvent::Progress {
                        simulation_id: simulation_id.clone(),
                        percent: self.view.progress(),
                        message: self.view.current_task().to_string(),
                    });
                    match message {
                        ProgressMessage::Generating {
                            index,
                            total,
                            agent,
                        } => self.emit(RunEvent::AgentGenerating {
                            simulation_id: simulation_id.clone(),
                            agent,
                            index,
                            total,
                        }),
                        ProgressMessage::AllGenerated => {
                            self.emit(RunEvent::GenerationFinished {
                                simulation_id: simulation_id.clone(),
                            })
                        }
                        ProgressMessage::Other => {}
                    }
                    if preview_changed {
                        self.emit(RunEvent::PreviewUpdated {
                            simulation_id: simulation_id.clone(),
                            source: snapshot.preview_model.clone(),
                        });
                    }
                    self.poll.schedule(simulation_id);
                }
                SnapshotOutcome::Completed => {
                    tracing::info!(
                        simulation_id = %simulation_id,
                        winner = self.view.results().map(|r| r.winner.name.as_str()),
                        "Simulation completed",
                    );
                    self.emit(RunEvent::RunCompleted {
                        simulation_id,
                        results: self.view.results().cloned(),
                    });
                }
                SnapshotOutcome::Failed { error } => {
                    tracing::error!(simulation_id = %simulation_id, error = %error, "Simulation failed");
                    self.emit(RunEvent::RunFailed {
                        simulation_id,
                        error: RunError::Remote(error),
                    });
                }
                SnapshotOutcome::Ignored => {
                    tracing::debug!(simulation_id = %simulation_id, "Ignoring status outside a run");
                }
            },
            Err(e) => {
                let error = e.to_string();
                tracing::error!(simulation_id = %simulation_id, error = %error, "Status request failed");
                self.view.fail_transport(error.clone());
                self.emit(RunEvent::RunFailed {
                    simulation_id,
                    error: RunError::Transport(error),
                });
            }
        }

        self.publish();
    }

    // ---- task ----

    /// Run the controller on its own task and return a handle to it.
    pub fn spawn(self) -> (ControllerHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();

        let handle = ControllerHandle {
            commands: command_tx,
            view: self.view_tx.subscribe(),
            events: self.event_tx.clone(),
            shutdown: shutdown.clone(),
        };

        let task = tokio::spawn(self.run(command_rx, shutdown));
        (handle, task)
    }

    /// Controller loop: handle commands and poll responses until shutdown
    /// or until every handle is dropped.
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, shutdown: CancellationToken) {
        tracing::info!(
            poll_interval_ms = self.poll.interval().as_millis() as u64,
            "Controller started",
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                (simulation_id, result) = self.poll.next_response() => {
                    self.handle_poll_result(simulation_id, result);
                }
            }
        }

        self.poll.stop();
        tracing::info!("Controller stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Select { slot, agent } => self.select(slot, agent),
            Command::ChooseDataset { filename } => self.choose_dataset(filename),
            Command::Autofill { reply } => {
                let _ = reply.send(self.autofill());
            }
            Command::Submit { reply } => {
                let result = self.submit().await;
                let _ = reply.send(result);
            }
            Command::Reset => self.reset(),
        }
    }

    fn emit(&self, event: RunEvent) {
        // Zero receivers is fine.
        let _ = self.event_tx.send(event);
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view.clone());
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable handle to a spawned [`Controller`].
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<LifecycleViewModel>,
    events: broadcast::Sender<RunEvent>,
    shutdown: CancellationToken,
}

impl ControllerHandle {
    /// Snapshot of the current view model.
    pub fn view(&self) -> LifecycleViewModel {
        self.view.borrow().clone()
    }

    /// A receiver that observes every published view model.
    pub fn watch(&self) -> watch::Receiver<LifecycleViewModel> {
        self.view.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    pub async fn select(&self, slot: Slot, agent: Option<AgentId>) -> Result<(), RunError> {
        self.send(Command::Select { slot, agent }).await
    }

    pub async fn choose_dataset(&self, filename: Option<String>) -> Result<(), RunError> {
        self.send(Command::ChooseDataset { filename }).await
    }

    pub async fn autofill(&self) -> Result<usize, RunError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Autofill { reply }).await?;
        rx.await.map_err(|_| RunError::ControllerGone)
    }

    pub async fn submit(&self) -> Result<SimulationId, RunError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Submit { reply }).await?;
        rx.await.map_err(|_| RunError::ControllerGone)?
    }

    /// The "Back" action: return to idle, discarding any pending poll.
    pub async fn reset(&self) -> Result<(), RunError> {
        self.send(Command::Reset).await
    }

    /// Wait until the view model leaves `running` and return it.
    ///
    /// Resolves on completion, on error, or when a reset returns the
    /// controller to idle.
    pub async fn wait_until_settled(&self) -> Result<LifecycleViewModel, RunError> {
        let mut rx = self.view.clone();
        let view = rx
            .wait_for(|view| view.phase() != RunPhase::Running)
            .await
            .map_err(|_| RunError::ControllerGone)?;
        Ok(view.clone())
    }

    /// Stop the controller task.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn send(&self, command: Command) -> Result<(), RunError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RunError::ControllerGone)
    }
}
