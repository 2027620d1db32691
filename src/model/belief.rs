//! Belief — a versioned assertion inside a state.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{BeliefId, MindId, Sid, StateId, TraitId, Value};
use crate::model::ArchetypeId;

/// An inheritance parent of a belief: either a schema archetype or
/// another belief (prototype inheritance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Base {
    Archetype(ArchetypeId),
    Belief(BeliefId),
}

/// A stored `(certainty, replacement)` pair expressing a fuzzy inherited
/// alternative. When the belief itself does not settle a trait, its
/// promotions surface as a [`crate::model::Fuzzy`] value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub certainty: f64,
    pub belief: BeliefId,
}

/// A versioned assertion. Immutable once the state it was inserted into
/// locks; new versions are made with `replace` (supersede) or
/// `branch_belief` (superposition) and share the [`Sid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Belief {
    pub id: BeliefId,
    pub sid: Sid,
    pub label: Option<String>,
    pub in_mind: MindId,
    /// The state this version was inserted into.
    pub origin_state: Option<StateId>,
    /// Ordered inheritance parents. Order is significant: breadth-first
    /// resolution consults them in declaration order.
    pub bases: SmallVec<[Base; 2]>,
    /// Own trait values. Absent key = inherit through bases; present key
    /// with `Value::Null` = explicitly blocked at this belief.
    pub traits: HashMap<TraitId, Value>,
    pub promotions: Vec<Promotion>,
    /// Forwarding pointer to the surviving version after a convergence
    /// collapse. Engine metadata, not frozen trait data.
    pub resolution: Option<BeliefId>,
    pub locked: bool,
}

impl Belief {
    pub fn has_own_trait(&self, tid: TraitId) -> bool {
        self.traits.contains_key(&tid)
    }

    /// Direct archetype bases, in declaration order.
    pub fn archetype_bases(&self) -> impl Iterator<Item = ArchetypeId> + '_ {
        self.bases.iter().filter_map(|b| match b {
            Base::Archetype(a) => Some(*a),
            Base::Belief(_) => None,
        })
    }
}

// ============================================================================
// Construction DTOs
// ============================================================================

/// A base reference in a [`BeliefSpec`], before label resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseRef {
    /// Archetype by label, resolved against the schema registry.
    Archetype(String),
    /// Another belief by id.
    Belief(BeliefId),
}

impl From<&str> for BaseRef {
    fn from(label: &str) -> Self {
        BaseRef::Archetype(label.to_owned())
    }
}

impl From<BeliefId> for BaseRef {
    fn from(id: BeliefId) -> Self {
        BaseRef::Belief(id)
    }
}

/// Template for inserting a belief into an open state.
#[derive(Debug, Clone, Default)]
pub struct BeliefSpec {
    pub label: Option<String>,
    pub bases: Vec<BaseRef>,
    /// Trait assignments by traittype label.
    pub traits: Vec<(String, Value)>,
    /// Reuse an existing subject (new version of an existing thing).
    /// `None` mints a fresh subject.
    pub subject: Option<Sid>,
    pub promotions: Vec<Promotion>,
}

impl BeliefSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_base(mut self, base: impl Into<BaseRef>) -> Self {
        self.bases.push(base.into());
        self
    }

    pub fn with_trait(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.traits.push((name.into(), value.into()));
        self
    }

    pub fn with_subject(mut self, sid: Sid) -> Self {
        self.subject = Some(sid);
        self
    }

    pub fn with_promotion(mut self, certainty: f64, belief: BeliefId) -> Self {
        self.promotions.push(Promotion { certainty, belief });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builder() {
        let spec = BeliefSpec::new()
            .with_label("hammer")
            .with_base("Tool")
            .with_trait("color", "gray");

        assert_eq!(spec.label.as_deref(), Some("hammer"));
        assert_eq!(spec.bases, vec![BaseRef::Archetype("Tool".into())]);
        assert_eq!(spec.traits, vec![("color".into(), Value::Str("gray".into()))]);
        assert!(spec.subject.is_none());
    }

    #[test]
    fn test_base_ref_from_belief_id() {
        assert_eq!(BaseRef::from(BeliefId(9)), BaseRef::Belief(BeliefId(9)));
    }
}
