//! # Store
//!
//! The process-scoped tables behind an engine: id → entity for minds,
//! states, beliefs and subjects, the schema registry, and the non-owning
//! caches (trait memo, reverse trait index, per-state subject index,
//! compose results).
//!
//! All engine logic runs as `Store` methods under one lock held by the
//! [`crate::Engine`] handle; nothing here takes a lock itself, so deep
//! recursion (resolution, visibility) never re-enters.

pub mod states;
pub mod visibility;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use tracing::debug;

use crate::model::{
    Belief, BeliefId, IdSequence, Mind, MindId, MindKind, Sid, State, StateId, StateKind,
    StateSpec, Subject, TraitId, Value, ValueKey,
};
use crate::schema::{ArchetypeDef, SchemaDef, SchemaRegistry, TemplateValue};
use crate::{Error, Result};

/// Everything the engine knows, in one place.
pub struct Store {
    pub(crate) ids: IdSequence,
    pub(crate) schema: SchemaRegistry,

    pub(crate) minds: HashMap<MindId, Mind>,
    pub(crate) states: HashMap<StateId, State>,
    pub(crate) beliefs: HashMap<BeliefId, Belief>,
    pub(crate) subjects: HashMap<Sid, Subject>,
    pub(crate) subjects_by_label: HashMap<String, Sid>,

    pub(crate) logos: MindId,
    pub(crate) eidos: MindId,
    pub(crate) timeless: StateId,
    pub(crate) eidos_state: StateId,

    // ------------------------------------------------------------------
    // Non-owning caches. Never serialized; rebuilt on demand.
    // ------------------------------------------------------------------
    /// Memoized trait resolution for locked states.
    pub(crate) trait_cache: HashMap<(StateId, BeliefId, TraitId), Option<Value>>,
    /// Reverse trait index: (state, trait) → value identity → referencing
    /// beliefs in visibility order.
    pub(crate) rev_index: HashMap<(StateId, TraitId), HashMap<ValueKey, Vec<BeliefId>>>,
    /// Per locked state: subject → visible versions in visibility order.
    pub(crate) subject_index: HashMap<StateId, HashMap<Sid, SmallVec<[BeliefId; 1]>>>,
    /// Mind composition results, keyed by ordered component minds.
    pub(crate) composed_minds: HashMap<Vec<MindId>, MindId>,
}

impl Store {
    /// Bootstrap a fresh world: Logos with its Timeless origin, and
    /// Eidos with an open prototype state grounded in it.
    pub fn new() -> Self {
        let ids = IdSequence::new();
        let schema = SchemaRegistry::new();

        let logos_id = MindId(ids.next_id());
        let timeless_id = StateId(ids.next_id());
        let eidos_id = MindId(ids.next_id());
        let eidos_state_id = StateId(ids.next_id());

        let mut logos = Mind::new(logos_id, MindKind::Logos, None, None);
        logos.origin_state = Some(timeless_id);
        logos.states.push(timeless_id);
        logos.states_by_ground.entry(None).or_default().push(timeless_id);
        logos.children.push(eidos_id);

        let timeless = State {
            id: timeless_id,
            mind: logos_id,
            kind: StateKind::Timeless,
            tt: None,
            vt: None,
            certainty: 1.0,
            base: None,
            ground_state: None,
            self_subject: None,
            insert: Vec::new(),
            remove: Vec::new(),
            locked: true,
        };

        let mut eidos = Mind::new(eidos_id, MindKind::Eidos, None, Some(logos_id));
        eidos.origin_state = Some(eidos_state_id);
        eidos.states.push(eidos_state_id);
        eidos
            .states_by_ground
            .entry(Some(timeless_id))
            .or_default()
            .push(eidos_state_id);

        let eidos_state = State {
            id: eidos_state_id,
            mind: eidos_id,
            kind: StateKind::Temporal { tracks: None },
            tt: Some(0),
            vt: Some(0),
            certainty: 1.0,
            base: None,
            ground_state: Some(timeless_id),
            self_subject: None,
            insert: Vec::new(),
            remove: Vec::new(),
            locked: false,
        };

        let mut minds = HashMap::new();
        minds.insert(logos_id, logos);
        minds.insert(eidos_id, eidos);

        let mut states = HashMap::new();
        states.insert(timeless_id, timeless);
        states.insert(eidos_state_id, eidos_state);

        Self {
            ids,
            schema,
            minds,
            states,
            beliefs: HashMap::new(),
            subjects: HashMap::new(),
            subjects_by_label: HashMap::new(),
            logos: logos_id,
            eidos: eidos_id,
            timeless: timeless_id,
            eidos_state: eidos_state_id,
            trait_cache: HashMap::new(),
            rev_index: HashMap::new(),
            subject_index: HashMap::new(),
            composed_minds: HashMap::new(),
        }
    }

    // ========================================================================
    // Entity access
    // ========================================================================

    pub fn mind(&self, id: MindId) -> Result<&Mind> {
        self.minds.get(&id).ok_or_else(|| Error::NotFound(format!("mind {id}")))
    }

    pub fn mind_mut(&mut self, id: MindId) -> Result<&mut Mind> {
        self.minds.get_mut(&id).ok_or_else(|| Error::NotFound(format!("mind {id}")))
    }

    pub fn state(&self, id: StateId) -> Result<&State> {
        self.states.get(&id).ok_or_else(|| Error::NotFound(format!("state {id}")))
    }

    pub fn state_mut(&mut self, id: StateId) -> Result<&mut State> {
        self.states.get_mut(&id).ok_or_else(|| Error::NotFound(format!("state {id}")))
    }

    pub fn belief(&self, id: BeliefId) -> Result<&Belief> {
        self.beliefs.get(&id).ok_or_else(|| Error::NotFound(format!("belief {id}")))
    }

    pub fn belief_mut(&mut self, id: BeliefId) -> Result<&mut Belief> {
        self.beliefs.get_mut(&id).ok_or_else(|| Error::NotFound(format!("belief {id}")))
    }

    pub fn subject(&self, sid: Sid) -> Result<&Subject> {
        self.subjects.get(&sid).ok_or_else(|| Error::NotFound(format!("subject {sid}")))
    }

    pub fn subject_by_label(&self, label: &str) -> Result<Sid> {
        self.subjects_by_label
            .get(label)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("subject '{label}'")))
    }

    // ========================================================================
    // Minds
    // ========================================================================

    pub fn create_mind(&mut self, parent: MindId, label: Option<String>) -> Result<MindId> {
        self.mind(parent)?;
        let id = MindId(self.ids.next_id());
        let mind = Mind::new(id, MindKind::Materia, label, Some(parent));
        self.minds.insert(id, mind);
        self.mind_mut(parent)?.children.push(id);
        Ok(id)
    }

    // ========================================================================
    // Schema registration
    // ========================================================================

    /// Install the user schema: traittypes, the archetype DAG (with any
    /// embedded prototype minds materialized under Eidos), and shared
    /// beliefs into the Eidos prototype state, which then locks.
    ///
    /// Idempotent only per engine lifetime: a second call is a `Schema`
    /// error. A fresh engine is the reset hook.
    pub fn register(&mut self, def: SchemaDef) -> Result<()> {
        if self.schema.registered {
            return Err(Error::Schema(
                "schema already registered for this engine; reset required".into(),
            ));
        }

        for tt in def.traittypes {
            self.schema.add_traittype(tt)?;
        }
        for arch in def.archetypes {
            self.register_archetype(arch)?;
        }

        let eidos_state = self.eidos_state;
        for spec in def.shared_beliefs {
            self.add_belief(eidos_state, spec)?;
        }
        self.lock_state(eidos_state)?;

        self.schema.registered = true;
        debug!(
            traittypes = self.schema.traittypes().len(),
            "schema registered"
        );
        Ok(())
    }

    /// Archetype bases must be declared before use (earlier in the same
    /// `register` call or built in).
    fn register_archetype(&mut self, def: ArchetypeDef) -> Result<()> {
        let mut bases = SmallVec::new();
        for base in &def.bases {
            let arch = self
                .schema
                .archetype_by_label(base)
                .map_err(|_| Error::Schema(format!("unknown base archetype '{base}'")))?;
            bases.push(arch.id);
        }

        let mut template = HashMap::new();
        for (name, slot) in def.traits {
            let tt = self
                .schema
                .traittype_by_label(&name)
                .map_err(|_| Error::Schema(format!("unknown traittype '{name}'")))?
                .clone();
            let resolved = match slot {
                None => None,
                Some(TemplateValue::Value(v)) => {
                    tt.admits(&v)?;
                    Some(v)
                }
                Some(TemplateValue::Mind(tmpl)) => {
                    let mind = self.materialize_prototype_mind(tmpl)?;
                    Some(Value::Mind(mind))
                }
            };
            template.insert(tt.id, resolved);
        }

        self.schema.add_archetype(&def.label, bases, template)?;
        Ok(())
    }

    /// Turn a mind template into a locked prototype mind under Eidos.
    fn materialize_prototype_mind(
        &mut self,
        tmpl: crate::schema::MindTemplate,
    ) -> Result<MindId> {
        let mind = self.create_mind(self.eidos, tmpl.label)?;
        let state = self.create_state(
            mind,
            StateSpec::new(self.eidos_state).at(0, 0),
        )?;
        self.mind_mut(mind)?.origin_state = Some(state);
        for spec in tmpl.beliefs {
            self.add_belief(state, spec)?;
        }
        self.lock_state(state)?;
        Ok(mind)
    }

    // ========================================================================
    // Cache maintenance
    // ========================================================================

    /// Drop every cached result that involves `state`. Called on any
    /// mutation while open, on lock, and on convergence resolution.
    pub(crate) fn invalidate_state_caches(&mut self, state: StateId) {
        self.trait_cache.retain(|(s, _, _), _| *s != state);
        self.rev_index.retain(|(s, _), _| *s != state);
        self.subject_index.remove(&state);
    }

    /// Invalidate `state` plus every state that can read through it
    /// (base chains, tracks overlays, convergence membership).
    pub(crate) fn invalidate_downstream(&mut self, state: StateId) {
        let mut affected: HashSet<StateId> = HashSet::new();
        affected.insert(state);
        // Fixpoint over the (small) state table: anything that reaches an
        // affected state through base / tracks / components is affected.
        loop {
            let before = affected.len();
            for s in self.states.values() {
                if affected.contains(&s.id) {
                    continue;
                }
                let reaches = s.base.is_some_and(|b| affected.contains(&b))
                    || s.tracks().is_some_and(|t| affected.contains(&t))
                    || s.components().iter().any(|c| affected.contains(c));
                if reaches {
                    affected.insert(s.id);
                }
            }
            if affected.len() == before {
                break;
            }
        }
        for s in affected {
            self.invalidate_state_caches(s);
        }
    }

    // ========================================================================
    // Base-chain helpers
    // ========================================================================

    /// Is `ancestor` reachable from `state` through `base` links
    /// (including `state == ancestor`)?
    pub fn is_base_ancestor(&self, ancestor: StateId, state: StateId) -> Result<bool> {
        let mut cur = Some(state);
        while let Some(id) = cur {
            if id == ancestor {
                return Ok(true);
            }
            cur = self.state(id)?.base;
        }
        Ok(false)
    }

    /// The mind's most recent locked state, by (vt, tt, id).
    pub fn current_state(&self, mind: MindId) -> Result<StateId> {
        let m = self.mind(mind)?;
        m.states
            .iter()
            .filter_map(|id| self.states.get(id))
            .filter(|s| s.locked)
            .max_by_key(|s| (s.vt, s.tt, s.id))
            .map(|s| s.id)
            .or(m.origin_state)
            .ok_or_else(|| Error::NotFound(format!("mind {mind} has no states")))
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
