//! Events emitted by the controller.
//!
//! These are high-level lifecycle changes derived from status snapshots.
//! Subscribers (loggers, presentation layers) receive them over a
//! [`tokio::sync::broadcast`] channel via
//! [`ControllerHandle::subscribe`](crate::controller::ControllerHandle::subscribe).

use battlefield_core::snapshot::SimulationResults;
use battlefield_core::types::{AgentId, SimulationId};
use serde::Serialize;

use crate::controller::RunError;

#[derive(Debug, Clone, Serialize)]
pub enum RunEvent {
    /// A job was created and polling started.
    RunStarted {
        simulation_id: SimulationId,
        agents: Vec<AgentId>,
        stock: String,
    },

    /// A non-terminal snapshot was applied.
    Progress {
        simulation_id: SimulationId,
        /// Displayed completion percentage (0-99 while running).
        percent: u8,
        message: String,
    },

    /// An agent started generating its algorithm.
    AgentGenerating {
        simulation_id: SimulationId,
        agent: AgentId,
        index: usize,
        total: usize,
    },

    /// Every agent finished generating.
    GenerationFinished { simulation_id: SimulationId },

    /// The displayed code preview changed.
    PreviewUpdated {
        simulation_id: SimulationId,
        source: Option<AgentId>,
    },

    /// The job completed.
    RunCompleted {
        simulation_id: SimulationId,
        results: Option<SimulationResults>,
    },

    /// The job failed: [`RunError::Remote`] when the service reported an
    /// error, [`RunError::Transport`] when polling itself failed.
    RunFailed {
        simulation_id: SimulationId,
        error: RunError,
    },

    /// The controller returned to idle.
    RunReset,
}
