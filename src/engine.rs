//! The engine handle — the one entry point external callers hold.
//!
//! An [`Engine`] wraps the store in `Arc<RwLock<…>>` and is cheap to
//! clone. All operations are synchronous; the lock exists so the handle
//! is `Send + Sync` like any well-behaved type, not because the engine
//! schedules anything. The single-threaded contract of the core means
//! the lock is never contended in normal use.

use std::io::Write;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value as Json;

use crate::model::{
    ArchetypeId, Belief, BeliefId, BeliefSpec, BranchSpec, Mind, MindId, Sid, State, StateId,
    StateSpec, Subject, TraitId, Value,
};
use crate::perception::{LearnSpec, TemplateSpec};
use crate::schema::{Exposure, SchemaDef};
use crate::store::Store;
use crate::Result;

/// Handle to one knowledge-base world: Logos, Eidos, and everything the
/// caller builds on top.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<RwLock<Store>>,
}

impl Engine {
    /// Bootstrap a fresh world. This is also the reset hook: singletons
    /// (Logos, Eidos, the Timeless state) are per-engine, so dropping an
    /// engine and creating a new one resets everything.
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(Store::new())) }
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Install the schema: traittypes, archetypes, shared Eidos beliefs.
    /// Once per engine lifetime.
    pub fn register(&self, schema: SchemaDef) -> Result<()> {
        self.inner.write().register(schema)
    }

    pub fn logos(&self) -> MindId {
        self.inner.read().logos
    }

    pub fn eidos(&self) -> MindId {
        self.inner.read().eidos
    }

    /// The one Timeless state, ground of the primordial minds.
    pub fn logos_state(&self) -> StateId {
        self.inner.read().timeless
    }

    /// The Eidos prototype state (locked after `register`).
    pub fn eidos_state(&self) -> StateId {
        self.inner.read().eidos_state
    }

    pub fn archetype_by_label(&self, label: &str) -> Result<ArchetypeId> {
        Ok(self.inner.read().schema.archetype_by_label(label)?.id)
    }

    pub fn traittype_by_label(&self, label: &str) -> Result<TraitId> {
        Ok(self.inner.read().schema.traittype_by_label(label)?.id)
    }

    /// Ancestors of an archetype, breadth-first, the archetype itself
    /// first.
    pub fn archetype_ancestors(&self, id: ArchetypeId) -> Result<Vec<ArchetypeId>> {
        self.inner.read().schema.ancestors(id)
    }

    // ========================================================================
    // Entity snapshots
    // ========================================================================

    pub fn mind(&self, id: MindId) -> Result<Mind> {
        self.inner.read().mind(id).map(Mind::clone)
    }

    pub fn state(&self, id: StateId) -> Result<State> {
        self.inner.read().state(id).map(State::clone)
    }

    pub fn belief(&self, id: BeliefId) -> Result<Belief> {
        self.inner.read().belief(id).map(Belief::clone)
    }

    pub fn subject(&self, sid: Sid) -> Result<Subject> {
        self.inner.read().subject(sid).map(Subject::clone)
    }

    pub fn subject_by_label(&self, label: &str) -> Result<Sid> {
        self.inner.read().subject_by_label(label)
    }

    // ========================================================================
    // Minds
    // ========================================================================

    pub fn create_mind(&self, parent: MindId, label: Option<&str>) -> Result<MindId> {
        self.inner.write().create_mind(parent, label.map(str::to_owned))
    }

    /// Child mind grounded at `ground_state`, identifying as
    /// `ground_belief`'s subject, seeded through `learn_about`.
    pub fn create_mind_from_template(
        &self,
        ground_state: StateId,
        ground_belief: BeliefId,
        spec: TemplateSpec,
    ) -> Result<MindId> {
        self.inner.write().create_mind_from_template(ground_state, ground_belief, spec)
    }

    pub fn states_by_ground(&self, mind: MindId, ground: StateId) -> Result<Vec<StateId>> {
        self.inner.read().states_by_ground(mind, ground)
    }

    /// Branch tips of the mind's state DAG for `ground` with `tt ≤ tt`.
    pub fn states_at_tt(&self, mind: MindId, ground: StateId, tt: i64) -> Result<Vec<StateId>> {
        self.inner.read().states_at_tt(mind, ground, tt)
    }

    /// Newest-first recall of a subject across the mind's states.
    pub fn recall_by_subject(
        &self,
        mind: MindId,
        sid: Sid,
        until_tt: Option<i64>,
    ) -> Result<Option<(StateId, BeliefId)>> {
        self.inner.write().recall_by_subject(mind, sid, until_tt)
    }

    // ========================================================================
    // States
    // ========================================================================

    pub fn create_state(&self, mind: MindId, spec: StateSpec) -> Result<StateId> {
        self.inner.write().create_state(mind, spec)
    }

    pub fn add_belief(&self, state: StateId, spec: BeliefSpec) -> Result<BeliefId> {
        self.inner.write().add_belief(state, spec)
    }

    pub fn remove_beliefs(&self, state: StateId, beliefs: &[BeliefId]) -> Result<()> {
        self.inner.write().remove_beliefs(state, beliefs)
    }

    pub fn branch(&self, state: StateId, spec: BranchSpec) -> Result<StateId> {
        self.inner.write().branch_state(state, spec)
    }

    pub fn lock(&self, state: StateId) -> Result<()> {
        self.inner.write().lock_state(state)
    }

    /// Compose locked sibling states into one logical state.
    pub fn converge(
        &self,
        mind: MindId,
        ground: StateId,
        components: &[StateId],
        vt: i64,
    ) -> Result<StateId> {
        self.inner.write().converge(mind, ground, components, vt)
    }

    /// Collapse a convergence to one component; observation resolving a
    /// timeline superposition.
    pub fn register_resolution(&self, convergence: StateId, component: StateId) -> Result<()> {
        self.inner.write().register_resolution(convergence, component)
    }

    /// All beliefs visible in `state`: local inserts, base inherits,
    /// tracked inherits — in that order.
    pub fn get_beliefs(&self, state: StateId) -> Result<Vec<BeliefId>> {
        self.inner.read().visible_beliefs(state)
    }

    pub fn get_belief_by_label(&self, state: StateId, label: &str) -> Result<BeliefId> {
        self.inner.write().belief_by_label(state, label)
    }

    /// The visible version of a subject in `state`.
    pub fn get_belief_by_subject(&self, state: StateId, sid: Sid) -> Result<BeliefId> {
        self.inner.write().belief_by_subject(state, sid)
    }

    /// All visible versions (superposition-aware).
    pub fn get_beliefs_by_subject(&self, state: StateId, sid: Sid) -> Result<Vec<BeliefId>> {
        Ok(self.inner.write().visible_by_subject(state, sid)?.into_vec())
    }

    // ========================================================================
    // Traits
    // ========================================================================

    /// Resolve one trait of `belief` as seen from `state`. `None` means
    /// undefined (inherit found nothing); `Some(Value::Null)` is an
    /// explicit block.
    pub fn get_trait(
        &self,
        state: StateId,
        belief: BeliefId,
        name: &str,
    ) -> Result<Option<Value>> {
        let mut store = self.inner.write();
        let tid = store.schema.traittype_by_label(name)?.id;
        store.resolve_trait(state, belief, tid)
    }

    /// Dense trait enumeration in traittype registration order,
    /// consistent with [`Engine::get_trait`].
    pub fn get_traits(&self, state: StateId, belief: BeliefId) -> Result<Vec<(String, Value)>> {
        let mut store = self.inner.write();
        let resolved = store.resolve_traits(state, belief)?;
        let mut out = Vec::with_capacity(resolved.len());
        for (tid, value) in resolved {
            out.push((store.schema.traittype(tid)?.label.clone(), value));
        }
        Ok(out)
    }

    /// Archetype labels of a belief, breadth-first, most specific first.
    pub fn get_archetypes(&self, belief: BeliefId) -> Result<Vec<String>> {
        let store = self.inner.read();
        let mut out = Vec::new();
        for aid in store.archetypes_of(belief)? {
            out.push(store.schema.archetype(aid)?.label.clone());
        }
        Ok(out)
    }

    /// Supersede `belief` in `state` with a new version carrying the
    /// given trait overrides.
    pub fn replace(
        &self,
        state: StateId,
        belief: BeliefId,
        overrides: &[(String, Value)],
    ) -> Result<BeliefId> {
        self.inner.write().replace(state, belief, overrides)
    }

    /// New version alongside the old one (superposition).
    pub fn branch_belief(
        &self,
        state: StateId,
        belief: BeliefId,
        overrides: &[(String, Value)],
    ) -> Result<BeliefId> {
        self.inner.write().branch_belief(state, belief, overrides)
    }

    /// Beliefs visible in `state` whose resolved `name` value references
    /// this belief's subject, across tracks and convergence components.
    pub fn rev_trait(
        &self,
        state: StateId,
        belief: BeliefId,
        name: &str,
    ) -> Result<Vec<BeliefId>> {
        let mut store = self.inner.write();
        let tid = store.schema.traittype_by_label(name)?.id;
        let sid = store.belief(belief)?.sid;
        store.rev_trait_by_sid(state, sid, tid)
    }

    // ========================================================================
    // Perception
    // ========================================================================

    pub fn perceive(
        &self,
        state: StateId,
        entities: &[BeliefId],
        modalities: &[Exposure],
    ) -> Result<BeliefId> {
        self.inner.write().perceive(state, entities, modalities)
    }

    pub fn learn_about(
        &self,
        state: StateId,
        source: BeliefId,
        spec: &LearnSpec,
    ) -> Result<BeliefId> {
        self.inner.write().learn_about(state, source, spec)
    }

    pub fn recognize(&self, state: StateId, source: BeliefId) -> Result<Vec<BeliefId>> {
        self.inner.write().recognize(state, source)
    }

    // ========================================================================
    // Codec
    // ========================================================================

    /// Serialize a mind (with nested children) deterministically.
    pub fn save_mind(&self, mind: MindId) -> Result<Json> {
        crate::codec::save_mind(&self.inner.read(), mind)
    }

    /// One belief in the dump format.
    pub fn belief_to_json(&self, belief: BeliefId) -> Result<Json> {
        crate::codec::belief_to_json(&self.inner.read(), belief)
    }

    /// One state in the dump format.
    pub fn state_to_json(&self, state: StateId) -> Result<Json> {
        crate::codec::state_to_json(&self.inner.read(), state)
    }

    pub fn save_mind_to_writer(&self, mind: MindId, writer: &mut dyn Write) -> Result<()> {
        crate::codec::save_mind_to_writer(&self.inner.read(), mind, writer)
    }

    /// Two-pass load; ids preserved. Requires the schema registered.
    pub fn load(&self, json: &Json) -> Result<MindId> {
        crate::codec::load(&mut self.inner.write(), json)
    }

    pub fn load_str(&self, input: &str) -> Result<MindId> {
        crate::codec::load_str(&mut self.inner.write(), input)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
