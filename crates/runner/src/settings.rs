//! Runner settings loaded from environment variables.
//!
//! | Variable       | Default         | Description                                   |
//! |----------------|-----------------|-----------------------------------------------|
//! | `ARENA_AGENTS` | autofill        | Six comma-separated identifiers in slot order |
//! | `ARENA_STOCK`  | first dataset   | Dataset file name sent as `stock`             |
//!
//! Service connection variables are read by [`ClientConfig::from_env`].

use battlefield_client::config::{ClientConfig, ConfigError};
use battlefield_core::selection::SLOT_COUNT;
use battlefield_core::types::AgentId;

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub client: ClientConfig,
    /// Explicit roster, in slot order. `None` fills slots from the catalog.
    pub agents: Option<Vec<AgentId>>,
    /// Explicit dataset. `None` keeps the service's first dataset.
    pub stock: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("ARENA_AGENTS must list exactly {expected} agents (got {count})")]
    AgentCount { expected: usize, count: usize },
}

impl RunnerSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let client = ClientConfig::from_env()?;
        let agents = match std::env::var("ARENA_AGENTS") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_agent_list(&raw)?),
            _ => None,
        };
        let stock = std::env::var("ARENA_STOCK").ok().and_then(|v| parse_stock(&v));

        Ok(Self {
            client,
            agents,
            stock,
        })
    }
}

/// Split a comma-separated roster. Blank entries are skipped; the result
/// must hold exactly one identifier per slot.
pub fn parse_agent_list(raw: &str) -> Result<Vec<AgentId>, SettingsError> {
    let agents: Vec<AgentId> = raw
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();

    if agents.len() != SLOT_COUNT {
        return Err(SettingsError::AgentCount {
            expected: SLOT_COUNT,
            count: agents.len(),
        });
    }
    Ok(agents)
}

pub fn parse_stock(raw: &str) -> Option<String> {
    let stock = raw.trim();
    (!stock.is_empty()).then(|| stock.to_string())
}
