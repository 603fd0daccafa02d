//! Six-slot participant selection.
//!
//! Two opposing groups of three slots each. The registry never rejects a
//! `select` call; duplicate identifiers are kept out by only ever offering
//! identifiers that no *other* slot holds (see [`SelectionRegistry::options_for`]).

use std::collections::BTreeSet;

use serde::Serialize;

use crate::catalog::AgentCatalog;
use crate::error::CoreError;
use crate::types::AgentId;

/// Number of slots a run requires.
pub const SLOT_COUNT: usize = 6;

/// Slots per side.
pub const SLOTS_PER_SIDE: usize = 3;

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// One of the six fixed participant positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Left1,
    Left2,
    Left3,
    Right1,
    Right2,
    Right3,
}

impl Slot {
    /// All slots in submission order: the left group, then the right group.
    pub const ALL: [Slot; SLOT_COUNT] = [
        Slot::Left1,
        Slot::Left2,
        Slot::Left3,
        Slot::Right1,
        Slot::Right2,
        Slot::Right3,
    ];

    pub fn side(self) -> Side {
        match self {
            Slot::Left1 | Slot::Left2 | Slot::Left3 => Side::Left,
            Slot::Right1 | Slot::Right2 | Slot::Right3 => Side::Right,
        }
    }

    /// Position of this slot in [`Slot::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Slot at `index` within [`Slot::ALL`], if in range.
    pub fn from_index(index: usize) -> Option<Slot> {
        Slot::ALL.get(index).copied()
    }

    /// The three slots belonging to `side`, in order.
    pub fn group(side: Side) -> [Slot; SLOTS_PER_SIDE] {
        match side {
            Side::Left => [Slot::Left1, Slot::Left2, Slot::Left3],
            Side::Right => [Slot::Right1, Slot::Right2, Slot::Right3],
        }
    }
}

// ---------------------------------------------------------------------------
// Offering
// ---------------------------------------------------------------------------

/// A catalog identifier as offered for one particular slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotOption {
    pub agent: AgentId,
    /// `true` when another slot already holds this identifier.
    pub disabled: bool,
    /// `true` when the queried slot itself holds this identifier.
    pub selected: bool,
}

/// Offered identifiers for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderOptions {
    pub provider: String,
    pub options: Vec<SlotOption>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A validated, frozen run request: six distinct identifiers in slot order
/// plus the dataset file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRequest {
    pub agents: Vec<AgentId>,
    pub stock: String,
}

/// Slot -> optional identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionRegistry {
    slots: [Option<AgentId>; SLOT_COUNT],
}

impl SelectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `slot` to `agent`, overwriting only that slot's prior value.
    ///
    /// Passing `None` or a blank identifier empties the slot. Other slots
    /// are never touched.
    pub fn select(&mut self, slot: Slot, agent: Option<AgentId>) {
        self.slots[slot.index()] = agent.filter(|a| !a.trim().is_empty());
    }

    pub fn clear(&mut self, slot: Slot) {
        self.slots[slot.index()] = None;
    }

    pub fn clear_all(&mut self) {
        self.slots = Default::default();
    }

    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.slots[slot.index()].as_deref()
    }

    /// `(slot, value)` pairs in submission order.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, Option<&str>)> {
        Slot::ALL.into_iter().map(move |slot| (slot, self.get(slot)))
    }

    /// Values of one side's three slots.
    pub fn group(&self, side: Side) -> [Option<&str>; SLOTS_PER_SIDE] {
        Slot::group(side).map(|slot| self.get(slot))
    }

    /// Identifiers held by every slot except `slot`.
    ///
    /// These are the identifiers that must not be offered for `slot`. The
    /// slot's own value is never included, so re-confirming it is allowed.
    pub fn disabled_for(&self, slot: Slot) -> BTreeSet<&str> {
        self.iter()
            .filter(|(other, _)| *other != slot)
            .filter_map(|(_, agent)| agent)
            .collect()
    }

    /// Whether `agent` may be offered for `slot`.
    pub fn is_offered(&self, slot: Slot, agent: &str) -> bool {
        !self.disabled_for(slot).contains(agent)
    }

    /// The catalog as offered for `slot`, grouped by provider.
    pub fn options_for(&self, slot: Slot, catalog: &AgentCatalog) -> Vec<ProviderOptions> {
        let disabled = self.disabled_for(slot);
        let current = self.get(slot);

        catalog
            .providers()
            .map(|(provider, agents)| ProviderOptions {
                provider: provider.to_string(),
                options: agents
                    .iter()
                    .map(|agent| SlotOption {
                        agent: agent.clone(),
                        disabled: disabled.contains(agent.as_str()),
                        selected: current == Some(agent.as_str()),
                    })
                    .collect(),
            })
            .collect()
    }

    /// Fill every empty slot with the first identifier offered for it.
    ///
    /// Returns the number of slots filled. Slots stay empty once the
    /// catalog runs out of unclaimed identifiers.
    pub fn autofill(&mut self, catalog: &AgentCatalog) -> usize {
        let mut filled = 0;
        for slot in Slot::ALL {
            if self.get(slot).is_some() {
                continue;
            }
            let pick = {
                let disabled = self.disabled_for(slot);
                catalog
                    .agents()
                    .find(|agent| !disabled.contains(agent))
                    .map(str::to_string)
            };
            if let Some(agent) = pick {
                self.select(slot, Some(agent));
                filled += 1;
            }
        }
        filled
    }

    /// Selected identifiers in slot order, skipping empty slots.
    pub fn selected_agents(&self) -> Vec<AgentId> {
        self.slots.iter().flatten().cloned().collect()
    }

    /// Number of distinct non-empty identifiers across all slots.
    pub fn distinct_count(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// `true` when all six slots hold distinct identifiers.
    pub fn is_complete(&self) -> bool {
        self.distinct_count() == SLOT_COUNT
    }

    /// Check run preconditions and freeze the selection into a request.
    ///
    /// Fails when fewer than six distinct identifiers are selected or no
    /// dataset is chosen.
    pub fn build_run_request(&self, dataset: Option<&str>) -> Result<RunRequest, CoreError> {
        let distinct = self.distinct_count();
        if distinct < SLOT_COUNT {
            return Err(CoreError::Validation(format!(
                "Please select {SLOT_COUNT} distinct agents before starting (got {distinct})"
            )));
        }
        let stock = match dataset.map(str::trim) {
            Some(stock) if !stock.is_empty() => stock.to_string(),
            _ => {
                return Err(CoreError::Validation(
                    "Please choose a dataset before starting".to_string(),
                ))
            }
        };
        Ok(RunRequest {
            agents: self.selected_agents(),
            stock,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;
    use proptest::prelude::*;

    use super::*;

    fn catalog() -> AgentCatalog {
        let mut providers = BTreeMap::new();
        providers.insert(
            "openai".to_string(),
            vec!["gpt-a".to_string(), "gpt-b".to_string(), "gpt-c".to_string()],
        );
        providers.insert(
            "google".to_string(),
            vec![
                "gemini-a".to_string(),
                "gemini-b".to_string(),
                "gemini-c".to_string(),
                "gemini-d".to_string(),
            ],
        );
        AgentCatalog::new(providers)
    }

    fn full_registry() -> SelectionRegistry {
        let mut registry = SelectionRegistry::new();
        for (slot, agent) in Slot::ALL.into_iter().zip(["a", "b", "c", "d", "e", "f"]) {
            registry.select(slot, Some(agent.to_string()));
        }
        registry
    }

    // -- slots --

    #[test]
    fn slot_groups_and_indices() {
        assert_eq!(Slot::group(Side::Left), [Slot::Left1, Slot::Left2, Slot::Left3]);
        assert_eq!(Slot::Right1.side(), Side::Right);
        assert_eq!(Slot::Right3.index(), 5);
        assert_eq!(Slot::from_index(3), Some(Slot::Right1));
        assert_eq!(Slot::from_index(6), None);
    }

    // -- select / disabled --

    #[test]
    fn select_overwrites_only_that_slot() {
        let mut registry = SelectionRegistry::new();
        registry.select(Slot::Left1, Some("a".into()));
        registry.select(Slot::Left2, Some("b".into()));
        registry.select(Slot::Left1, Some("c".into()));

        assert_eq!(registry.get(Slot::Left1), Some("c"));
        assert_eq!(registry.get(Slot::Left2), Some("b"));
    }

    #[test]
    fn select_does_not_clear_other_slots() {
        let mut registry = SelectionRegistry::new();
        registry.select(Slot::Left1, Some("a".into()));
        registry.select(Slot::Right1, Some("a".into()));

        assert_eq!(registry.get(Slot::Left1), Some("a"));
        assert_eq!(registry.get(Slot::Right1), Some("a"));
        assert_eq!(registry.distinct_count(), 1);
    }

    #[test]
    fn empty_string_clears_slot() {
        let mut registry = SelectionRegistry::new();
        registry.select(Slot::Left1, Some("a".into()));
        registry.select(Slot::Left1, Some(String::new()));
        assert_eq!(registry.get(Slot::Left1), None);
    }

    #[test]
    fn blank_identifier_clears_slot_and_is_never_submitted() {
        let mut registry = SelectionRegistry::new();
        for (slot, agent) in Slot::ALL.into_iter().zip(["a", "b", "c", "d", "e"]) {
            registry.select(slot, Some(agent.into()));
        }
        registry.select(Slot::Right3, Some("  ".into()));

        assert_eq!(registry.get(Slot::Right3), None);
        assert_eq!(registry.distinct_count(), 5);
        assert!(registry.build_run_request(Some("AAPL_data.csv")).is_err());
    }

    #[test]
    fn disabled_excludes_own_value() {
        let mut registry = SelectionRegistry::new();
        registry.select(Slot::Left1, Some("a".into()));
        registry.select(Slot::Right2, Some("b".into()));

        let disabled = registry.disabled_for(Slot::Left1);
        assert!(disabled.contains("b"));
        assert!(!disabled.contains("a"));
        assert!(registry.is_offered(Slot::Left1, "a"));
        assert!(!registry.is_offered(Slot::Left2, "a"));
    }

    #[test]
    fn options_flag_disabled_and_selected() {
        let mut registry = SelectionRegistry::new();
        registry.select(Slot::Left1, Some("gpt-a".into()));
        registry.select(Slot::Left2, Some("gemini-b".into()));

        let groups = registry.options_for(Slot::Left1, &catalog());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].provider, "google");

        let find = |agent: &str| {
            groups
                .iter()
                .flat_map(|g| g.options.iter())
                .find(|o| o.agent == agent)
                .cloned()
                .unwrap()
        };
        assert!(find("gpt-a").selected);
        assert!(!find("gpt-a").disabled);
        assert!(find("gemini-b").disabled);
        assert!(!find("gpt-b").disabled);
    }

    // -- autofill --

    #[test]
    fn autofill_fills_empty_slots_with_distinct_agents() {
        let mut registry = SelectionRegistry::new();
        registry.select(Slot::Right1, Some("gemini-a".into()));

        let filled = registry.autofill(&catalog());
        assert_eq!(filled, 5);
        assert!(registry.is_complete());
        assert_eq!(registry.get(Slot::Right1), Some("gemini-a"));
        assert_eq!(registry.get(Slot::Left1), Some("gemini-b"));
    }

    #[test]
    fn autofill_stops_when_catalog_exhausted() {
        let mut providers = BTreeMap::new();
        providers.insert("p".to_string(), vec!["x".to_string(), "y".to_string()]);
        let mut registry = SelectionRegistry::new();

        assert_eq!(registry.autofill(&AgentCatalog::new(providers)), 2);
        assert_eq!(registry.selected_agents(), vec!["x", "y"]);
        assert!(!registry.is_complete());
    }

    // -- run request --

    #[test]
    fn run_request_in_slot_order() {
        let request = full_registry()
            .build_run_request(Some("AAPL_data.csv"))
            .unwrap();
        assert_eq!(request.agents, vec!["a", "b", "c", "d", "e", "f"]);
        assert_eq!(request.stock, "AAPL_data.csv");
    }

    #[test]
    fn run_request_rejects_incomplete_selection() {
        let mut registry = full_registry();
        registry.clear(Slot::Right3);
        assert_matches!(
            registry.build_run_request(Some("AAPL_data.csv")),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn run_request_rejects_duplicates() {
        let mut registry = full_registry();
        registry.select(Slot::Right3, Some("a".into()));
        assert_matches!(
            registry.build_run_request(Some("AAPL_data.csv")),
            Err(CoreError::Validation(msg)) if msg.contains("got 5")
        );
    }

    #[test]
    fn run_request_requires_dataset() {
        let registry = full_registry();
        assert_matches!(registry.build_run_request(None), Err(CoreError::Validation(_)));
        assert_matches!(registry.build_run_request(Some("  ")), Err(CoreError::Validation(_)));
    }

    #[test]
    fn clear_all_empties_every_slot() {
        let mut registry = full_registry();
        registry.clear_all();
        assert!(registry.selected_agents().is_empty());
        assert_eq!(registry.group(Side::Left), [None, None, None]);
    }

    // -- duplicate prevention --

    proptest! {
        /// Any sequence of selections drawn from what the registry offers
        /// keeps every non-empty identifier in at most one slot.
        #[test]
        fn offered_selections_never_duplicate(
            steps in proptest::collection::vec((0usize..SLOT_COUNT, 0usize..8, any::<bool>()), 0..64)
        ) {
            let pool = ["a", "b", "c", "d", "e", "f", "g", "h"];
            let mut registry = SelectionRegistry::new();

            for (slot_index, agent_index, clear) in steps {
                let slot = Slot::from_index(slot_index).unwrap();
                if clear {
                    registry.clear(slot);
                    continue;
                }
                let agent = pool[agent_index];
                if registry.is_offered(slot, agent) {
                    registry.select(slot, Some(agent.to_string()));
                }
            }

            let selected = registry.selected_agents();
            let distinct: BTreeSet<&String> = selected.iter().collect();
            prop_assert_eq!(selected.len(), distinct.len());
        }
    }
}
