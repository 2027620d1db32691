//! Archetype — a named schema fragment in a multiple-inheritance DAG.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::model::{ArchetypeId, BeliefSpec, TraitId, Value};

/// A schema fragment. `bases` is order-significant: breadth-first walks
/// consult them in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archetype {
    pub id: ArchetypeId,
    pub label: String,
    pub bases: SmallVec<[ArchetypeId; 2]>,
    /// Traits template: `Some(value)` is a real default, `None` means
    /// "slot declared, no default".
    pub template: HashMap<TraitId, Option<Value>>,
}

impl Archetype {
    pub fn declares(&self, tid: TraitId) -> bool {
        self.template.contains_key(&tid)
    }

    pub fn default_for(&self, tid: TraitId) -> Option<&Value> {
        self.template.get(&tid).and_then(|slot| slot.as_ref())
    }
}

// ============================================================================
// Registration DTOs
// ============================================================================

/// A template default before materialization: either a plain value or a
/// nested mind the registry turns into an Eidos prototype mind.
#[derive(Debug, Clone)]
pub enum TemplateValue {
    Value(Value),
    Mind(MindTemplate),
}

impl From<Value> for TemplateValue {
    fn from(v: Value) -> Self {
        TemplateValue::Value(v)
    }
}

impl From<&str> for TemplateValue {
    fn from(v: &str) -> Self {
        TemplateValue::Value(Value::from(v))
    }
}

/// Definition of a prototype mind embedded in an archetype template.
/// Materialized at registration as a Materia under Eidos, locked, with
/// the listed beliefs in its origin state.
#[derive(Debug, Clone, Default)]
pub struct MindTemplate {
    pub label: Option<String>,
    pub beliefs: Vec<BeliefSpec>,
}

impl MindTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_belief(mut self, spec: BeliefSpec) -> Self {
        self.beliefs.push(spec);
        self
    }
}

/// Definition of an archetype, passed to `register`.
#[derive(Debug, Clone, Default)]
pub struct ArchetypeDef {
    pub label: String,
    /// Base archetype labels, declaration order.
    pub bases: Vec<String>,
    /// `None` declares a slot without a default.
    pub traits: Vec<(String, Option<TemplateValue>)>,
}

impl ArchetypeDef {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), ..Default::default() }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    pub fn with_trait(mut self, name: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        self.traits.push((name.into(), Some(value.into())));
        self
    }

    pub fn with_slot(mut self, name: impl Into<String>) -> Self {
        self.traits.push((name.into(), None));
        self
    }
}
