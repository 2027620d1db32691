//! # Schema
//!
//! What a belief can be (archetypes) and what a trait means (traittypes):
//! value kinds, container flags, composition rules, mind scoping and
//! perceptual exposure. Registered once per engine lifetime.

pub mod archetype;
pub mod registry;
pub mod traittype;

pub use archetype::{Archetype, ArchetypeDef, MindTemplate, TemplateValue};
pub use registry::{SchemaRegistry, ABOUT, OBSERVED, PERCEPTION, PERCEPTION_EVENT};
pub use traittype::{Composer, Exposure, MindScope, Traittype, TraittypeDef, ValueKind};

use crate::model::BeliefSpec;

/// Everything `register` installs in one call: trait slots, the
/// archetype DAG, and shared prototype beliefs for Eidos.
#[derive(Debug, Clone, Default)]
pub struct SchemaDef {
    pub traittypes: Vec<TraittypeDef>,
    pub archetypes: Vec<ArchetypeDef>,
    pub shared_beliefs: Vec<BeliefSpec>,
}

impl SchemaDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_traittype(mut self, def: TraittypeDef) -> Self {
        self.traittypes.push(def);
        self
    }

    pub fn with_archetype(mut self, def: ArchetypeDef) -> Self {
        self.archetypes.push(def);
        self
    }

    pub fn with_shared_belief(mut self, spec: BeliefSpec) -> Self {
        self.shared_beliefs.push(spec);
        self
    }
}
