//! Process-scoped schema registry: traittypes and archetypes.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::model::{ArchetypeId, TraitId, Value};
use crate::{Error, Result};

use super::archetype::Archetype;
use super::traittype::{Composer, MindScope, Traittype, TraittypeDef, ValueKind};

/// Label of the built-in knowledge-link trait: a knowledge belief points
/// at the ground entity it is about.
pub const ABOUT: &str = "@about";
/// Label of the built-in perception-event trait: the subjects observed.
pub const OBSERVED: &str = "@observed";
/// Base archetype of perceived beliefs.
pub const PERCEPTION: &str = "Perception";
/// Archetype of the event belief built by `perceive`.
pub const PERCEPTION_EVENT: &str = "PerceptionEvent";

/// Shared schema tables. Archetypes and traittypes live for the whole
/// engine; ids are dense indexes in registration order, which is also
/// the iteration order contract of `get_traits`.
#[derive(Debug)]
pub struct SchemaRegistry {
    traittypes: Vec<Traittype>,
    archetypes: Vec<Archetype>,
    trait_by_label: HashMap<String, TraitId>,
    archetype_by_label: HashMap<String, ArchetypeId>,
    /// User schema installed? Registration is once per engine lifetime.
    pub registered: bool,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        let mut reg = Self {
            traittypes: Vec::new(),
            archetypes: Vec::new(),
            trait_by_label: HashMap::new(),
            archetype_by_label: HashMap::new(),
            registered: false,
        };
        reg.install_builtins();
        reg
    }

    fn install_builtins(&mut self) {
        self.add_traittype(
            TraittypeDef::new(ABOUT, ValueKind::Subject).scope(MindScope::Parent),
        )
        .expect("builtin traittype");
        self.add_traittype(
            TraittypeDef::new(OBSERVED, ValueKind::Subject).container(),
        )
        .expect("builtin traittype");

        let about = self.trait_by_label[ABOUT];
        let observed = self.trait_by_label[OBSERVED];

        let mut perception = HashMap::new();
        perception.insert(about, None);
        self.add_archetype(PERCEPTION, SmallVec::new(), perception)
            .expect("builtin archetype");

        let mut event = HashMap::new();
        event.insert(observed, None);
        self.add_archetype(PERCEPTION_EVENT, SmallVec::new(), event)
            .expect("builtin archetype");
    }

    // ========================================================================
    // Registration
    // ========================================================================

    pub fn add_traittype(&mut self, def: TraittypeDef) -> Result<TraitId> {
        if self.trait_by_label.contains_key(&def.label) {
            return Err(Error::Schema(format!("traittype '{}' already registered", def.label)));
        }
        let composer = match (def.composable, def.container, def.kind) {
            (false, _, _) => Composer::Concat,
            (true, _, ValueKind::Mind) => Composer::Minds,
            (true, true, _) => Composer::Concat,
            (true, false, kind) => {
                return Err(Error::Schema(format!(
                    "traittype '{}': composable scalar of kind {kind:?} is not supported",
                    def.label
                )));
            }
        };
        let id = TraitId(self.traittypes.len() as u32);
        self.trait_by_label.insert(def.label.clone(), id);
        self.traittypes.push(Traittype {
            id,
            label: def.label,
            kind: def.kind,
            container: def.container,
            composable: def.composable,
            mind_scope: def.mind_scope,
            exposure: def.exposure,
            composer,
        });
        Ok(id)
    }

    /// Insert an archetype whose template is already label-resolved.
    pub fn add_archetype(
        &mut self,
        label: &str,
        bases: SmallVec<[ArchetypeId; 2]>,
        template: HashMap<TraitId, Option<Value>>,
    ) -> Result<ArchetypeId> {
        if self.archetype_by_label.contains_key(label) {
            return Err(Error::Schema(format!("archetype '{label}' already registered")));
        }
        for tid in template.keys() {
            if tid.0 as usize >= self.traittypes.len() {
                return Err(Error::Schema(format!(
                    "archetype '{label}' references unknown traittype {}",
                    tid.0
                )));
            }
        }
        let id = ArchetypeId(self.archetypes.len() as u32);
        self.archetype_by_label.insert(label.to_owned(), id);
        self.archetypes.push(Archetype { id, label: label.to_owned(), bases, template });
        Ok(id)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn traittype(&self, id: TraitId) -> Result<&Traittype> {
        self.traittypes
            .get(id.0 as usize)
            .ok_or_else(|| Error::NotFound(format!("traittype {}", id.0)))
    }

    pub fn traittype_by_label(&self, label: &str) -> Result<&Traittype> {
        let id = self
            .trait_by_label
            .get(label)
            .ok_or_else(|| Error::NotFound(format!("traittype '{label}'")))?;
        Ok(&self.traittypes[id.0 as usize])
    }

    pub fn archetype(&self, id: ArchetypeId) -> Result<&Archetype> {
        self.archetypes
            .get(id.0 as usize)
            .ok_or_else(|| Error::NotFound(format!("archetype {}", id.0)))
    }

    pub fn archetype_by_label(&self, label: &str) -> Result<&Archetype> {
        let id = self
            .archetype_by_label
            .get(label)
            .ok_or_else(|| Error::NotFound(format!("archetype '{label}'")))?;
        Ok(&self.archetypes[id.0 as usize])
    }

    /// All traittypes in registration order.
    pub fn traittypes(&self) -> &[Traittype] {
        &self.traittypes
    }

    /// Breadth-first DAG walk over `bases`, most specific first,
    /// first-occurrence dedup. Includes `id` itself at the front.
    pub fn ancestors(&self, id: ArchetypeId) -> Result<Vec<ArchetypeId>> {
        let mut order = Vec::new();
        let mut queue = std::collections::VecDeque::from([id]);
        while let Some(next) = queue.pop_front() {
            if order.contains(&next) {
                continue;
            }
            order.push(next);
            queue.extend(self.archetype(next)?.bases.iter().copied());
        }
        Ok(order)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_present() {
        let reg = SchemaRegistry::new();
        assert!(reg.traittype_by_label(ABOUT).is_ok());
        assert!(reg.traittype_by_label(OBSERVED).is_ok());
        assert!(reg.archetype_by_label(PERCEPTION).is_ok());
        assert!(reg.archetype_by_label(PERCEPTION_EVENT).is_ok());
    }

    #[test]
    fn test_composable_scalar_rejected() {
        let mut reg = SchemaRegistry::new();
        let err = reg
            .add_traittype(TraittypeDef::new("weight", ValueKind::Num).composable())
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_composable_mind_gets_minds_composer() {
        let mut reg = SchemaRegistry::new();
        let id = reg
            .add_traittype(TraittypeDef::new("mind", ValueKind::Mind).composable())
            .unwrap();
        assert_eq!(reg.traittype(id).unwrap().composer, Composer::Minds);
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut reg = SchemaRegistry::new();
        reg.add_traittype(TraittypeDef::new("color", ValueKind::Str)).unwrap();
        assert!(reg.add_traittype(TraittypeDef::new("color", ValueKind::Str)).is_err());
    }

    #[test]
    fn test_ancestors_bfs_order() {
        let mut reg = SchemaRegistry::new();
        let thing = reg.add_archetype("Thing", SmallVec::new(), HashMap::new()).unwrap();
        let tool = reg
            .add_archetype("Tool", SmallVec::from_slice(&[thing]), HashMap::new())
            .unwrap();
        let weapon = reg
            .add_archetype("Weapon", SmallVec::from_slice(&[thing]), HashMap::new())
            .unwrap();
        let hammer = reg
            .add_archetype("WarHammer", SmallVec::from_slice(&[tool, weapon]), HashMap::new())
            .unwrap();

        // Most specific first, bases in declaration order, diamond deduped.
        assert_eq!(reg.ancestors(hammer).unwrap(), vec![hammer, tool, weapon, thing]);
    }
}
