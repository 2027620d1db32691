//! Mind — an epistemic agent owning states and beliefs.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::{BeliefId, MindId, Sid, StateId};

/// Mind variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MindKind {
    /// The primordial root. Singleton; no parent; its origin is the one
    /// Timeless state.
    Logos,
    /// Child of Logos; realm of shared prototype beliefs.
    Eidos,
    /// Every other mind. Parent required.
    Materia,
}

impl MindKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            MindKind::Logos => "Logos",
            MindKind::Eidos => "Eidos",
            MindKind::Materia => "Materia",
        }
    }
}

/// An epistemic agent. Owns its states and beliefs (by id, in the engine
/// tables); other minds reference them only through subjects, late-bound
/// at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mind {
    pub id: MindId,
    pub kind: MindKind,
    pub label: Option<String>,
    pub parent: Option<MindId>,
    /// The first state of this mind. Set during construction, before any
    /// user operation can observe the mind.
    pub origin_state: Option<StateId>,
    /// The subject this mind identifies as (Materia).
    pub self_subject: Option<Sid>,
    pub states: Vec<StateId>,
    pub beliefs: Vec<BeliefId>,
    pub children: Vec<MindId>,
    /// Non-owning index: ground state → states of this mind anchored
    /// there. Rebuilt on load.
    pub states_by_ground: HashMap<Option<StateId>, Vec<StateId>>,
}

impl Mind {
    pub fn new(id: MindId, kind: MindKind, label: Option<String>, parent: Option<MindId>) -> Self {
        Self {
            id,
            kind,
            label,
            parent,
            origin_state: None,
            self_subject: None,
            states: Vec::new(),
            beliefs: Vec::new(),
            children: Vec::new(),
            states_by_ground: HashMap::new(),
        }
    }

    pub fn states_for_ground(&self, ground: Option<StateId>) -> &[StateId] {
        self.states_by_ground.get(&ground).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(MindKind::Logos.type_name(), "Logos");
        assert_eq!(MindKind::Eidos.type_name(), "Eidos");
        assert_eq!(MindKind::Materia.type_name(), "Materia");
    }

    #[test]
    fn test_states_for_unknown_ground_is_empty() {
        let m = Mind::new(MindId(1), MindKind::Materia, None, Some(MindId(0)));
        assert!(m.states_for_ground(Some(StateId(42))).is_empty());
    }
}
