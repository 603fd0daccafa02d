//! Progress interpretation for running simulations.
//!
//! The service reports generation progress only as free text, e.g.
//! `"Generating algorithm 3/6 using openai/gpt-4o-mini..."` followed by
//! `"All algorithms generated successfully!"`. This module turns that text
//! into a per-participant [`GenerationState`] map. It performs no I/O and
//! never fails: text it does not recognise is an opaque status line.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::types::AgentId;

/// Matches "generating <item> <k> of|/ <n> using <identifier>", with an
/// optional trailing ellipsis.
pub const GENERATING_PATTERN: &str =
    r"(?i)^\s*generating\s+\w+\s+(\d+)\s*(?:/|of)\s*(\d+)\s+using\s+(.+?)\s*(?:\.{3}|…)?\s*$";

/// Matches "all <items> generated successfully".
pub const ALL_GENERATED_PATTERN: &str = r"(?i)^\s*all\s+\w+\s+generated\s+successfully\b";

static GENERATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(GENERATING_PATTERN).expect("valid regex"));

static ALL_GENERATED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ALL_GENERATED_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// Message classification
// ---------------------------------------------------------------------------

/// A status message classified by its effect on generation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressMessage {
    /// Item `index` of `total` (1-based) is being generated by `agent`.
    Generating {
        index: usize,
        total: usize,
        agent: AgentId,
    },
    /// Every item has been generated.
    AllGenerated,
    /// Anything else.
    Other,
}

/// Classify a status message.
pub fn parse_message(message: &str) -> ProgressMessage {
    if let Some(caps) = GENERATING_RE.captures(message) {
        let index = caps[1].parse().ok();
        let total = caps[2].parse().ok();
        let agent = caps[3].trim();
        if let (Some(index), Some(total)) = (index, total) {
            if !agent.is_empty() {
                return ProgressMessage::Generating {
                    index,
                    total,
                    agent: agent.to_string(),
                };
            }
        }
    }
    if ALL_GENERATED_RE.is_match(message) {
        return ProgressMessage::AllGenerated;
    }
    ProgressMessage::Other
}

// ---------------------------------------------------------------------------
// Generation state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Pending,
    Generating,
    Done,
}

/// The most recent code preview and the identifier it is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodePreview {
    pub code: String,
    pub source: Option<AgentId>,
}

/// Derived per-participant generation progress for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationTracker {
    /// Submitted identifiers in submission order.
    roster: Vec<AgentId>,
    states: BTreeMap<AgentId, GenerationState>,
    last_generating: Option<AgentId>,
    preview: Option<CodePreview>,
}

impl GenerationTracker {
    /// Start tracking a run: every distinct submitted identifier is pending.
    pub fn for_roster(agents: &[AgentId]) -> Self {
        let mut roster: Vec<AgentId> = Vec::with_capacity(agents.len());
        for agent in agents {
            if !roster.contains(agent) {
                roster.push(agent.clone());
            }
        }
        let states = roster
            .iter()
            .map(|agent| (agent.clone(), GenerationState::Pending))
            .collect();
        Self {
            roster,
            states,
            last_generating: None,
            preview: None,
        }
    }

    pub fn state_of(&self, agent: &str) -> Option<GenerationState> {
        self.states.get(agent).copied()
    }

    pub fn states(&self) -> &BTreeMap<AgentId, GenerationState> {
        &self.states
    }

    pub fn last_generating(&self) -> Option<&str> {
        self.last_generating.as_deref()
    }

    pub fn preview(&self) -> Option<&CodePreview> {
        self.preview.as_ref()
    }

    /// Apply a status message. Returns how it was classified.
    pub fn apply_message(&mut self, message: &str) -> ProgressMessage {
        let parsed = parse_message(message);
        match &parsed {
            ProgressMessage::Generating { index, agent, .. } => {
                self.mark_generating(*index, agent);
            }
            ProgressMessage::AllGenerated => {
                for state in self.states.values_mut() {
                    *state = GenerationState::Done;
                }
                self.last_generating = None;
            }
            ProgressMessage::Other => {}
        }
        parsed
    }

    /// Replace the displayed preview when either its text or its source
    /// changed. Returns `true` when the preview was replaced.
    pub fn apply_preview(&mut self, code: &str, source: Option<&str>) -> bool {
        let unchanged = self
            .preview
            .as_ref()
            .is_some_and(|p| p.code == code && p.source.as_deref() == source);
        if unchanged {
            return false;
        }
        self.preview = Some(CodePreview {
            code: code.to_string(),
            source: source.map(str::to_string),
        });
        true
    }

    fn mark_generating(&mut self, index: usize, agent: &str) {
        // A repeated or stale message never moves a finished agent back.
        if self.state_of(agent) == Some(GenerationState::Done) {
            return;
        }

        if let Some(previous) = self.last_generating.take() {
            if previous != agent {
                self.states.insert(previous, GenerationState::Done);
            }
        }

        // Sequential polling can skip messages; everything submitted
        // before item `index` has been generated already.
        let earlier = index.saturating_sub(1).min(self.roster.len());
        for earlier_agent in &self.roster[..earlier] {
            if earlier_agent != agent {
                self.states
                    .insert(earlier_agent.clone(), GenerationState::Done);
            }
        }

        self.states
            .insert(agent.to_string(), GenerationState::Generating);
        self.last_generating = Some(agent.to_string());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn roster(names: &[&str]) -> Vec<AgentId> {
        names.iter().map(|n| n.to_string()).collect()
    }

    // -- parsing --

    #[test]
    fn parses_service_generating_message() {
        assert_eq!(
            parse_message("Generating algorithm 3/6 using openai/gpt-4o-mini:free..."),
            ProgressMessage::Generating {
                index: 3,
                total: 6,
                agent: "openai/gpt-4o-mini:free".to_string(),
            }
        );
    }

    #[test]
    fn parses_of_form_without_ellipsis() {
        assert_matches!(
            parse_message("generating item 2 of 6 using B"),
            ProgressMessage::Generating { index: 2, total: 6, agent } if agent == "B"
        );
    }

    #[test]
    fn parses_unicode_ellipsis() {
        assert_matches!(
            parse_message("Generating algorithm 1/6 using A…"),
            ProgressMessage::Generating { agent, .. } if agent == "A"
        );
    }

    #[test]
    fn parses_completion_phrase() {
        assert_eq!(
            parse_message("All algorithms generated successfully!"),
            ProgressMessage::AllGenerated
        );
        assert_eq!(
            parse_message("all items generated successfully"),
            ProgressMessage::AllGenerated
        );
    }

    #[test]
    fn negated_completion_phrase_is_opaque() {
        assert_eq!(
            parse_message("Not all algorithms generated successfully; retrying"),
            ProgressMessage::Other
        );
    }

    #[test]
    fn other_messages_are_opaque() {
        assert_eq!(parse_message("Starting simulation..."), ProgressMessage::Other);
        assert_eq!(
            parse_message("Generating algorithms for AAPL..."),
            ProgressMessage::Other
        );
        assert_eq!(parse_message(""), ProgressMessage::Other);
    }

    // -- tracker --

    #[test]
    fn roster_starts_pending_and_deduplicates() {
        let tracker = GenerationTracker::for_roster(&roster(&["A", "B", "A"]));
        assert_eq!(tracker.states().len(), 2);
        assert_eq!(tracker.state_of("A"), Some(GenerationState::Pending));
        assert_eq!(tracker.last_generating(), None);
    }

    #[test]
    fn sequence_ends_with_everyone_done() {
        let mut tracker = GenerationTracker::default();
        tracker.apply_message("generating item 1/6 using A...");
        assert_eq!(tracker.state_of("A"), Some(GenerationState::Generating));

        tracker.apply_message("generating item 2/6 using B...");
        assert_eq!(tracker.state_of("A"), Some(GenerationState::Done));
        assert_eq!(tracker.state_of("B"), Some(GenerationState::Generating));

        tracker.apply_message("all items generated successfully");
        assert!(tracker
            .states()
            .values()
            .all(|s| *s == GenerationState::Done));
        assert_eq!(tracker.last_generating(), None);
    }

    #[test]
    fn skipped_messages_mark_earlier_roster_done() {
        let mut tracker =
            GenerationTracker::for_roster(&roster(&["A", "B", "GPT-X", "D", "E", "F"]));
        tracker.apply_message("Generating algorithm 3/6 using GPT-X...");

        assert_eq!(tracker.state_of("A"), Some(GenerationState::Done));
        assert_eq!(tracker.state_of("B"), Some(GenerationState::Done));
        assert_eq!(tracker.state_of("GPT-X"), Some(GenerationState::Generating));
        assert_eq!(tracker.state_of("D"), Some(GenerationState::Pending));
    }

    #[test]
    fn repeated_message_is_idempotent() {
        let mut tracker = GenerationTracker::for_roster(&roster(&["A", "B"]));
        tracker.apply_message("Generating algorithm 2/2 using B...");
        let before = tracker.clone();
        tracker.apply_message("Generating algorithm 2/2 using B...");
        assert_eq!(tracker, before);
    }

    #[test]
    fn stale_message_does_not_regress_done_agent() {
        let mut tracker = GenerationTracker::for_roster(&roster(&["A", "B"]));
        tracker.apply_message("Generating algorithm 1/2 using A...");
        tracker.apply_message("Generating algorithm 2/2 using B...");
        tracker.apply_message("Generating algorithm 1/2 using A...");

        assert_eq!(tracker.state_of("A"), Some(GenerationState::Done));
        assert_eq!(tracker.state_of("B"), Some(GenerationState::Generating));
        assert_eq!(tracker.last_generating(), Some("B"));
    }

    #[test]
    fn unknown_agent_is_added() {
        let mut tracker = GenerationTracker::for_roster(&roster(&["A"]));
        tracker.apply_message("Generating algorithm 1/1 using Z...");
        assert_eq!(tracker.state_of("Z"), Some(GenerationState::Generating));
        assert_eq!(tracker.state_of("A"), Some(GenerationState::Pending));
    }

    #[test]
    fn other_message_leaves_map_unchanged() {
        let mut tracker = GenerationTracker::for_roster(&roster(&["A"]));
        let before = tracker.clone();
        assert_eq!(tracker.apply_message("Running market..."), ProgressMessage::Other);
        assert_eq!(tracker, before);
    }

    // -- preview --

    #[test]
    fn preview_replaced_only_on_change() {
        let mut tracker = GenerationTracker::default();
        assert!(tracker.apply_preview("def f(): pass", Some("A")));
        assert!(!tracker.apply_preview("def f(): pass", Some("A")));
        assert!(tracker.apply_preview("def g(): pass", Some("A")));
        assert!(tracker.apply_preview("def g(): pass", Some("B")));
        assert!(tracker.apply_preview("def g(): pass", None));

        let preview = tracker.preview().unwrap();
        assert_eq!(preview.code, "def g(): pass");
        assert_eq!(preview.source, None);
    }
}
