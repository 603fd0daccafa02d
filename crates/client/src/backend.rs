//! The seam between the controller and the simulation service.
//!
//! The controller only talks to a [`SimulationBackend`]; [`ArenaApi`] is
//! the HTTP implementation. Tests substitute scripted backends.

use async_trait::async_trait;
use battlefield_core::catalog::{AgentCatalog, Dataset};
use battlefield_core::selection::RunRequest;
use battlefield_core::snapshot::StatusSnapshot;
use battlefield_core::types::SimulationId;

use crate::api::{ArenaApi, ArenaApiError};

/// Operations the controller needs from the simulation service.
#[async_trait]
pub trait SimulationBackend: Send + Sync + 'static {
    /// Fetch the provider-grouped agent catalog.
    async fn list_agents(&self) -> Result<AgentCatalog, ArenaApiError>;

    /// Fetch the datasets a run can use.
    async fn list_datasets(&self) -> Result<Vec<Dataset>, ArenaApiError>;

    /// Create a simulation job and return its handle.
    async fn start_run(&self, request: &RunRequest) -> Result<SimulationId, ArenaApiError>;

    /// Fetch the current status snapshot of a job.
    async fn simulation_status(
        &self,
        simulation_id: &str,
    ) -> Result<StatusSnapshot, ArenaApiError>;
}

#[async_trait]
impl SimulationBackend for ArenaApi {
    async fn list_agents(&self) -> Result<AgentCatalog, ArenaApiError> {
        ArenaApi::list_agents(self).await
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>, ArenaApiError> {
        ArenaApi::list_datasets(self).await
    }

    async fn start_run(&self, request: &RunRequest) -> Result<SimulationId, ArenaApiError> {
        ArenaApi::start_run(self, request).await
    }

    async fn simulation_status(
        &self,
        simulation_id: &str,
    ) -> Result<StatusSnapshot, ArenaApiError> {
        ArenaApi::simulation_status(self, simulation_id).await
    }
}
