//! Agent catalog and dataset descriptors.
//!
//! Both are fetched once at startup from the simulation service. The
//! catalog groups participant identifiers by provider; the dataset
//! listing names the market data files a run can be launched against.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::AgentId;

/// Suffix the service uses for market data files (`AAPL_data.csv`).
pub const DATA_FILE_SUFFIX: &str = "_data.csv";

// ---------------------------------------------------------------------------
// Agent catalog
// ---------------------------------------------------------------------------

/// Provider name -> ordered list of participant identifiers.
///
/// Immutable once fetched. Providers iterate in name order; identifiers
/// keep the order the service listed them in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentCatalog {
    providers: BTreeMap<String, Vec<AgentId>>,
}

impl AgentCatalog {
    pub fn new(providers: BTreeMap<String, Vec<AgentId>>) -> Self {
        Self { providers }
    }

    /// Iterate `(provider, identifiers)` groups.
    pub fn providers(&self) -> impl Iterator<Item = (&str, &[AgentId])> {
        self.providers
            .iter()
            .map(|(name, agents)| (name.as_str(), agents.as_slice()))
    }

    /// Every identifier in the catalog, provider by provider.
    pub fn agents(&self) -> impl Iterator<Item = &str> {
        self.providers.values().flatten().map(String::as_str)
    }

    pub fn contains(&self, agent: &str) -> bool {
        self.agents().any(|a| a == agent)
    }

    /// Total number of identifiers across all providers.
    pub fn len(&self) -> usize {
        self.providers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

/// A market data file a simulation can be run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dataset {
    /// File name sent as the `stock` field of a run request.
    pub filename: String,
    /// Display ticker, e.g. `AAPL`.
    pub ticker: String,
}

impl Dataset {
    /// Build a dataset from a bare filename, deriving the ticker the same
    /// way the service does (`aapl_data.csv` -> `AAPL`).
    pub fn from_filename(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let ticker = ticker_from_filename(&filename);
        Self { filename, ticker }
    }
}

/// Derive a display ticker from a data file name.
pub fn ticker_from_filename(filename: &str) -> String {
    let stem = filename
        .strip_suffix(DATA_FILE_SUFFIX)
        .or_else(|| filename.strip_suffix(".csv"))
        .unwrap_or(filename);
    stem.to_uppercase()
}

/// One entry of the `/api/data_files` listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DatasetDescriptor {
    Filename(String),
    Detailed {
        filename: String,
        #[serde(default)]
        ticker: Option<String>,
    },
}

impl From<DatasetDescriptor> for Dataset {
    fn from(descriptor: DatasetDescriptor) -> Self {
        match descriptor {
            DatasetDescriptor::Filename(filename) => Dataset::from_filename(filename),
            DatasetDescriptor::Detailed {
                filename,
                ticker: Some(ticker),
            } if !ticker.trim().is_empty() => Dataset { filename, ticker },
            DatasetDescriptor::Detailed { filename, .. } => Dataset::from_filename(filename),
        }
    }
}

/// Body of `GET /api/data_files`: either a bare array or `{"stocks": [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DataFilesPayload {
    List(Vec<DatasetDescriptor>),
    Wrapped { stocks: Vec<DatasetDescriptor> },
}

impl DataFilesPayload {
    /// Normalize the listing into datasets, preserving service order.
    pub fn into_datasets(self) -> Vec<Dataset> {
        let descriptors = match self {
            DataFilesPayload::List(list) => list,
            DataFilesPayload::Wrapped { stocks } => stocks,
        };
        descriptors.into_iter().map(Dataset::from).collect()
    }
}
