/// Participant identifiers are opaque strings issued by the agent catalog.
pub type AgentId = String;

/// Opaque job handle returned by the simulation service.
pub type SimulationId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
