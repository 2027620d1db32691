//! Trait resolution: local values, composable and first-wins inheritance,
//! promotions, and mind composition.
//!
//! The algorithm is the load-bearing contract of the whole engine and is
//! deliberately explicit about its four paths:
//!
//! 1. a local value wins outright (explicit `Null` blocks);
//! 2. promotions surface as a [`Fuzzy`] when nothing closer settled the
//!    trait;
//! 3. composable traits collect one contribution per base, deduplicate
//!    by value identity and compose when two or more remain — a `Null`
//!    contribution is empty at that base but never blocks its siblings;
//! 4. non-composable traits walk the base DAG breadth-first and the
//!    first defining node wins, archetype defaults counting as real
//!    values and declared-without-default slots not counting at all.
//!
//! Results are memoized per `(locked state, belief, traittype)`.

use std::collections::VecDeque;

use hashbrown::HashSet;

use crate::model::{
    ArchetypeId, Base, BeliefId, Fuzzy, FuzzyAlt, MindId, StateId, TraitId, Value, ValueKey,
};
use crate::schema::{Composer, Traittype};
use crate::store::Store;
use crate::{Error, Result};

impl Store {
    /// Resolve one trait of one belief as seen from `state`.
    ///
    /// `None` means the trait is not defined anywhere along the belief's
    /// bases — distinct from `Some(Value::Null)`, which is an explicit
    /// block.
    pub fn resolve_trait(
        &mut self,
        state: StateId,
        belief: BeliefId,
        tid: TraitId,
    ) -> Result<Option<Value>> {
        if let Some(hit) = self.trait_cache.get(&(state, belief, tid)) {
            return Ok(hit.clone());
        }
        let out = self.resolve_belief_node(state, belief, tid)?;
        if self.state(state)?.locked {
            self.trait_cache.insert((state, belief, tid), out.clone());
        }
        Ok(out)
    }

    /// Dense enumeration consistent with [`Store::resolve_trait`], in
    /// traittype registration order.
    pub fn resolve_traits(
        &mut self,
        state: StateId,
        belief: BeliefId,
    ) -> Result<Vec<(TraitId, Value)>> {
        let count = self.schema.traittypes().len() as u32;
        let mut out = Vec::new();
        for i in 0..count {
            let tid = TraitId(i);
            if let Some(v) = self.resolve_trait(state, belief, tid)? {
                out.push((tid, v));
            }
        }
        Ok(out)
    }

    /// Archetypes of a belief, breadth-first over its base DAG, most
    /// specific first, first-occurrence dedup.
    pub fn archetypes_of(&self, belief: BeliefId) -> Result<Vec<ArchetypeId>> {
        let mut out = Vec::new();
        let mut queue: VecDeque<Base> = self.belief(belief)?.bases.iter().copied().collect();
        let mut visited: HashSet<Base> = HashSet::new();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            match node {
                Base::Archetype(a) => {
                    if !out.contains(&a) {
                        out.push(a);
                    }
                    queue.extend(self.schema.archetype(a)?.bases.iter().map(|b| Base::Archetype(*b)));
                }
                Base::Belief(b) => {
                    queue.extend(self.belief(b)?.bases.iter().copied());
                }
            }
        }
        Ok(out)
    }

    // ========================================================================
    // Node resolution
    // ========================================================================

    fn resolve_belief_node(
        &mut self,
        state: StateId,
        bid: BeliefId,
        tid: TraitId,
    ) -> Result<Option<Value>> {
        let belief = self.belief(bid)?.clone();

        // 1. Local value, including the explicit Null block.
        if let Some(v) = belief.traits.get(&tid) {
            return Ok(Some(v.clone()));
        }

        // 2. Promotions: fuzzy inherited alternatives. Nothing closer
        // overrode the trait (or we would have returned above).
        if !belief.promotions.is_empty() {
            if let Some(fuzzy) = self.promote(state, &belief.promotions, tid)? {
                return Ok(Some(fuzzy));
            }
        }

        let tt = self.schema.traittype(tid)?.clone();
        if tt.composable {
            self.resolve_composable(state, &belief.bases, tid, &tt)
        } else {
            self.resolve_first_wins(state, &belief.bases, tid)
        }
    }

    /// Resolution seen through an archetype: its own template default,
    /// or its bases.
    fn resolve_archetype_node(
        &mut self,
        state: StateId,
        aid: ArchetypeId,
        tid: TraitId,
    ) -> Result<Option<Value>> {
        let arch = self.schema.archetype(aid)?.clone();
        if let Some(slot) = arch.template.get(&tid) {
            if let Some(v) = slot {
                return Ok(Some(v.clone()));
            }
            // Declared without a default: the slot exists but does not
            // define a value; keep searching the bases.
        }
        let bases: Vec<Base> = arch.bases.iter().map(|b| Base::Archetype(*b)).collect();
        let tt = self.schema.traittype(tid)?.clone();
        if tt.composable {
            self.resolve_composable(state, &bases, tid, &tt)
        } else {
            self.resolve_first_wins(state, &bases, tid)
        }
    }

    fn resolve_base(
        &mut self,
        state: StateId,
        base: Base,
        tid: TraitId,
    ) -> Result<Option<Value>> {
        match base {
            Base::Archetype(a) => self.resolve_archetype_node(state, a, tid),
            Base::Belief(b) => self.resolve_trait(state, b, tid),
        }
    }

    // ========================================================================
    // Composable path
    // ========================================================================

    fn resolve_composable(
        &mut self,
        state: StateId,
        bases: &[Base],
        tid: TraitId,
        tt: &Traittype,
    ) -> Result<Option<Value>> {
        let mut touched = false;
        let mut seen: HashSet<ValueKey> = HashSet::new();
        let mut contributions: Vec<Value> = Vec::new();

        for base in bases {
            match self.resolve_base(state, *base, tid)? {
                None => {}
                Some(Value::Null) => {
                    // The block applies where it was declared, not to
                    // sibling bases.
                    touched = true;
                }
                Some(v) => {
                    touched = true;
                    if seen.insert(v.identity()) {
                        contributions.push(v);
                    }
                }
            }
        }

        if !touched {
            return Ok(None);
        }
        match contributions.len() {
            0 => Ok(Some(Value::Null)),
            1 => Ok(Some(contributions.remove(0))),
            _ => self.compose(tt, contributions).map(Some),
        }
    }

    fn compose(&mut self, tt: &Traittype, values: Vec<Value>) -> Result<Value> {
        match tt.composer {
            Composer::Concat => {
                let mut seen: HashSet<ValueKey> = HashSet::new();
                let mut out: Vec<Value> = Vec::new();
                for v in values {
                    let Value::List(items) = v else {
                        return Err(Error::Schema(format!(
                            "trait '{}' composes containers, got {}",
                            tt.label,
                            v.type_name()
                        )));
                    };
                    for item in items {
                        if seen.insert(item.identity()) {
                            out.push(item);
                        }
                    }
                }
                Ok(Value::List(out))
            }
            Composer::Minds => {
                let mut minds = Vec::with_capacity(values.len());
                for v in values {
                    let Value::Mind(m) = v else {
                        return Err(Error::Schema(format!(
                            "trait '{}' composes minds, got {}",
                            tt.label,
                            v.type_name()
                        )));
                    };
                    minds.push(m);
                }
                self.compose_minds(&minds).map(Value::Mind)
            }
        }
    }

    /// Compose component minds into one: a fresh Materia whose origin is
    /// a Convergence over the components' current states. Order is
    /// significant; results are cached so repeated reads return the
    /// identical mind.
    pub fn compose_minds(&mut self, minds: &[MindId]) -> Result<MindId> {
        if let Some(hit) = self.composed_minds.get(minds) {
            return Ok(*hit);
        }

        let mut component_states = Vec::with_capacity(minds.len());
        for m in minds {
            component_states.push(self.current_state(*m)?);
        }
        let ground = self
            .state(component_states[0])?
            .ground_state
            .ok_or_else(|| Error::Consistency("component mind state has no ground".into()))?;
        let vt = component_states
            .iter()
            .filter_map(|s| self.states.get(s).and_then(|st| st.vt))
            .max()
            .unwrap_or(0);

        let parent = self.mind(minds[0])?.parent.unwrap_or(self.eidos);
        let composed = self.create_mind(parent, None)?;
        let convergence = self.converge(composed, ground, &component_states, vt)?;
        self.mind_mut(composed)?.origin_state = Some(convergence);

        self.composed_minds.insert(minds.to_vec(), composed);
        Ok(composed)
    }

    // ========================================================================
    // Non-composable path
    // ========================================================================

    fn resolve_first_wins(
        &mut self,
        state: StateId,
        bases: &[Base],
        tid: TraitId,
    ) -> Result<Option<Value>> {
        let mut queue: VecDeque<Base> = bases.iter().copied().collect();
        let mut visited: HashSet<Base> = HashSet::new();

        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            match node {
                Base::Archetype(a) => {
                    let arch = self.schema.archetype(a)?.clone();
                    if let Some(slot) = arch.template.get(&tid) {
                        if let Some(v) = slot {
                            return Ok(Some(v.clone()));
                        }
                    }
                    queue.extend(arch.bases.iter().map(|b| Base::Archetype(*b)));
                }
                Base::Belief(bid) => {
                    let belief = self.belief(bid)?.clone();
                    if let Some(v) = belief.traits.get(&tid) {
                        return Ok(Some(v.clone()));
                    }
                    if !belief.promotions.is_empty() {
                        if let Some(fuzzy) = self.promote(state, &belief.promotions, tid)? {
                            return Ok(Some(fuzzy));
                        }
                    }
                    queue.extend(belief.bases.iter().copied());
                }
            }
        }
        Ok(None)
    }

    // ========================================================================
    // Promotions
    // ========================================================================

    /// Build the fuzzy alternatives a promotion set offers for `tid`.
    /// `None` when no replacement defines the trait.
    fn promote(
        &mut self,
        state: StateId,
        promotions: &[crate::model::Promotion],
        tid: TraitId,
    ) -> Result<Option<Value>> {
        let promotions = promotions.to_vec();
        let mut alternatives = Vec::new();
        for p in &promotions {
            if let Some(v) = self.resolve_trait(state, p.belief, tid)? {
                if !v.is_null() {
                    alternatives.push(FuzzyAlt { certainty: p.certainty, value: v });
                }
            }
        }
        if alternatives.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Value::Fuzzy(Fuzzy { alternatives })))
        }
    }
}
