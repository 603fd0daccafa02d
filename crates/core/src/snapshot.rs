//! Status snapshots reported by `GET /api/simulation/{id}`.
//!
//! A snapshot is ephemeral: each poll supersedes the previous one.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::AgentId;

/// Status tag of a snapshot.
///
/// The service reports `starting` before its background job picks the run
/// up; that and any unrecognised tag are treated as still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    Starting,
    Running,
    Completed,
    Error,
    #[serde(other)]
    Unknown,
}

impl SimulationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SimulationStatus::Completed | SimulationStatus::Error)
    }
}

/// One poll response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: SimulationStatus,
    /// Percentage as reported. Not guaranteed monotonic.
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code_preview: Option<String>,
    /// Identifier the code preview was generated by.
    #[serde(default)]
    pub preview_model: Option<AgentId>,
    /// Present only when `status` is `completed`.
    #[serde(default)]
    pub results: Option<SimulationResults>,
    /// Present only when `status` is `error`.
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusSnapshot {
    /// Reported progress clamped into `0..=100` and rounded.
    pub fn percent(&self) -> u8 {
        if self.progress.is_nan() {
            return 0;
        }
        self.progress.clamp(0.0, 100.0).round() as u8
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Terminal payload of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    pub winner: Winner,
    /// Ranked by the service (descending ROI). Kept in service order.
    #[serde(default)]
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Winner {
    pub name: AgentId,
    /// Return on investment in percent.
    pub roi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: AgentId,
    pub roi: f64,
    /// Ending portfolio value.
    pub current_value: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub cash: Option<f64>,
    /// Shares held at the end. Fractional when the service traded partial
    /// quantities.
    #[serde(default, deserialize_with = "lenient_number")]
    pub stock: Option<f64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub trades: Option<u64>,
}

/// Display-only numeric field: any non-numeric value decodes as `None`.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Value(f64),
        Other(IgnoredAny),
    }

    Ok(match Option::<Number>::deserialize(deserializer)? {
        Some(Number::Value(n)) if n.is_finite() => Some(n),
        _ => None,
    })
}

/// Like [`lenient_number`], rounded to a non-negative count.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(lenient_number(deserializer)?
        .filter(|n| *n >= 0.0)
        .map(|n| n.round() as u64))
}
