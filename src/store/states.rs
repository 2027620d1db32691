//! State lifecycle: open, mutate, lock, branch, converge, resolve.

use tracing::{debug, trace};

use crate::model::{
    Base, BaseRef, Belief, BeliefId, BeliefSpec, BranchSpec, MindId, Sid, State, StateId,
    StateKind, StateSpec, Subject, Value,
};
use crate::{Error, Result};

use super::Store;

impl Store {
    // ========================================================================
    // Opening states
    // ========================================================================

    /// Open a new root state in `mind` for the given ground.
    ///
    /// `tt` defaults to the ground's `vt` and, for a non-Timeless ground,
    /// must equal it (fork invariant). `vt` defaults to `tt` and may lie
    /// before it (memory states).
    pub fn create_state(&mut self, mind: MindId, spec: StateSpec) -> Result<StateId> {
        self.mind(mind)?;
        let ground_id = spec
            .ground
            .ok_or_else(|| Error::Temporal("a state needs a ground state".into()))?;
        let ground = self.state(ground_id)?;
        let ground_vt = ground.vt;
        let ground_timeless = ground.is_timeless();

        let tt = spec.tt.or(ground_vt).unwrap_or(0);
        if !ground_timeless && Some(tt) != ground_vt {
            return Err(Error::Temporal(format!(
                "fork invariant: tt {tt} must equal ground vt {:?}",
                ground_vt
            )));
        }
        let vt = spec.vt.unwrap_or(tt);

        let certainty = spec.certainty.unwrap_or(1.0);
        if !(0.0..=1.0).contains(&certainty) {
            return Err(Error::Schema(format!("certainty {certainty} outside [0, 1]")));
        }

        if let Some(tracks) = spec.tracks {
            self.check_tracks_target(tracks, vt, None)?;
        }

        let id = StateId(self.ids.next_id());
        let state = State {
            id,
            mind,
            kind: StateKind::Temporal { tracks: spec.tracks },
            tt: Some(tt),
            vt: Some(vt),
            certainty,
            base: None,
            ground_state: Some(ground_id),
            self_subject: spec.self_subject,
            insert: Vec::new(),
            remove: Vec::new(),
            locked: false,
        };
        self.states.insert(id, state);

        let m = self.mind_mut(mind)?;
        m.states.push(id);
        m.states_by_ground.entry(Some(ground_id)).or_default().push(id);
        if m.origin_state.is_none() {
            m.origin_state = Some(id);
        }
        trace!(%mind, state = %id, tt, vt, "state opened");
        Ok(id)
    }

    /// Validate a tracks target: locked, not in the future of `vt`, and
    /// not on the tracking state's own base chain.
    fn check_tracks_target(
        &self,
        tracks: StateId,
        vt: i64,
        base_of_self: Option<StateId>,
    ) -> Result<()> {
        let target = self.state(tracks)?;
        if !target.locked {
            return Err(Error::Temporal(format!("tracks target {tracks} is not locked")));
        }
        if target.vt.is_some_and(|tv| tv > vt) {
            return Err(Error::Temporal(format!(
                "tracks target {tracks} lies in the future (vt {:?} > {vt})",
                target.vt
            )));
        }
        if let Some(base) = base_of_self {
            if self.is_base_ancestor(tracks, base)? {
                return Err(Error::Temporal(format!(
                    "tracks target {tracks} is on the tracking state's own base chain"
                )));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Mutation (open states only)
    // ========================================================================

    fn expect_open(&self, state: StateId) -> Result<()> {
        if self.state(state)?.locked {
            Err(Error::Locked(format!("state {state} is locked")))
        } else {
            Ok(())
        }
    }

    /// Insert a new belief (or a new version of an existing subject)
    /// into an open state.
    pub fn add_belief(&mut self, state: StateId, spec: BeliefSpec) -> Result<BeliefId> {
        self.expect_open(state)?;
        let mind = self.state(state)?.mind;

        let mut bases = smallvec::SmallVec::new();
        for base in &spec.bases {
            bases.push(match base {
                BaseRef::Archetype(label) => {
                    let arch = self
                        .schema
                        .archetype_by_label(label)
                        .map_err(|_| Error::Schema(format!("unknown archetype '{label}'")))?;
                    Base::Archetype(arch.id)
                }
                BaseRef::Belief(id) => {
                    self.belief(*id)?;
                    Base::Belief(*id)
                }
            });
        }

        let mut traits = hashbrown::HashMap::new();
        for (name, value) in &spec.traits {
            let tt = self
                .schema
                .traittype_by_label(name)
                .map_err(|_| Error::Schema(format!("unknown traittype '{name}'")))?;
            tt.admits(value)?;
            traits.insert(tt.id, value.clone());
        }

        for p in &spec.promotions {
            self.belief(p.belief)?;
            if !(0.0..=1.0).contains(&p.certainty) {
                return Err(Error::Schema(format!("promotion certainty {} outside [0, 1]", p.certainty)));
            }
        }

        let sid = match spec.subject {
            Some(sid) => {
                self.subject(sid)?;
                sid
            }
            None => {
                if let Some(label) = &spec.label {
                    if self.subjects_by_label.contains_key(label) {
                        return Err(Error::Schema(format!(
                            "label '{label}' already names a subject; pass that subject to version it"
                        )));
                    }
                }
                let sid = Sid(self.ids.next_id());
                self.subjects.insert(sid, Subject::new(sid, spec.label.clone(), mind));
                if let Some(label) = &spec.label {
                    self.subjects_by_label.insert(label.clone(), sid);
                }
                sid
            }
        };

        let label = spec.label.or_else(|| self.subjects[&sid].label.clone());

        let id = BeliefId(self.ids.next_id());
        let belief = Belief {
            id,
            sid,
            label,
            in_mind: mind,
            origin_state: Some(state),
            bases,
            traits,
            promotions: spec.promotions,
            resolution: None,
            locked: false,
        };
        self.beliefs.insert(id, belief);
        self.mind_mut(mind)?.beliefs.push(id);
        self.state_mut(state)?.insert.push(id);
        self.invalidate_state_caches(state);
        Ok(id)
    }

    /// Remove beliefs from an open state. A locally inserted belief is
    /// dropped from `insert`; an inherited or tracked one is shadowed
    /// through the `remove` list.
    pub fn remove_beliefs(&mut self, state: StateId, ids: &[BeliefId]) -> Result<()> {
        self.expect_open(state)?;
        for id in ids {
            self.belief(*id)?;
            let st = self.state_mut(state)?;
            if let Some(pos) = st.insert.iter().position(|b| b == id) {
                st.insert.remove(pos);
            } else if !st.remove.contains(id) {
                st.remove.push(*id);
            }
        }
        self.invalidate_state_caches(state);
        Ok(())
    }

    /// Create a new version of `old` in `state` with the given trait
    /// overrides, superseding the old version there.
    pub fn replace(
        &mut self,
        state: StateId,
        old: BeliefId,
        overrides: &[(String, Value)],
    ) -> Result<BeliefId> {
        let new = self.new_version(state, old, overrides)?;
        let st = self.state_mut(state)?;
        if let Some(pos) = st.insert.iter().position(|b| *b == old) {
            // The new version was just pushed; drop the old one only.
            st.insert.remove(pos);
        } else if !st.remove.contains(&old) {
            st.remove.push(old);
        }
        self.invalidate_state_caches(state);
        Ok(new)
    }

    /// Like [`Store::replace`], but keeps the old version visible —
    /// both coexist in the state (superposition).
    pub fn branch_belief(
        &mut self,
        state: StateId,
        old: BeliefId,
        overrides: &[(String, Value)],
    ) -> Result<BeliefId> {
        self.new_version(state, old, overrides)
    }

    fn new_version(
        &mut self,
        state: StateId,
        old: BeliefId,
        overrides: &[(String, Value)],
    ) -> Result<BeliefId> {
        self.expect_open(state)?;
        let mind = self.state(state)?.mind;
        let prev = self.belief(old)?.clone();

        let mut traits = prev.traits.clone();
        for (name, value) in overrides {
            let tt = self
                .schema
                .traittype_by_label(name)
                .map_err(|_| Error::Schema(format!("unknown traittype '{name}'")))?;
            tt.admits(value)?;
            traits.insert(tt.id, value.clone());
        }

        let id = BeliefId(self.ids.next_id());
        let belief = Belief {
            id,
            sid: prev.sid,
            label: prev.label.clone(),
            in_mind: mind,
            origin_state: Some(state),
            bases: prev.bases.clone(),
            traits,
            promotions: prev.promotions.clone(),
            resolution: None,
            locked: false,
        };
        self.beliefs.insert(id, belief);
        self.mind_mut(mind)?.beliefs.push(id);
        self.state_mut(state)?.insert.push(id);
        self.invalidate_state_caches(state);
        Ok(id)
    }

    // ========================================================================
    // Lock
    // ========================================================================

    /// One-way freeze. Idempotent. After this, the state and the traits
    /// of every belief in its `insert` are deeply immutable, and the
    /// subject / reverse indexes become cacheable.
    pub fn lock_state(&mut self, state: StateId) -> Result<()> {
        if self.state(state)?.locked {
            return Ok(());
        }
        let inserted = self.state(state)?.insert.clone();
        for bid in inserted {
            self.belief_mut(bid)?.locked = true;
        }
        self.state_mut(state)?.locked = true;
        self.invalidate_state_caches(state);
        debug!(state = %state, "state locked");
        Ok(())
    }

    // ========================================================================
    // Branch
    // ========================================================================

    /// Branch a locked state forward along its mind's timeline.
    pub fn branch_state(&mut self, source: StateId, spec: BranchSpec) -> Result<StateId> {
        let src = self.state(source)?.clone();
        if !src.locked {
            return Err(Error::Temporal(format!("branch source {source} is not locked")));
        }
        let ground_id = spec
            .ground
            .ok_or_else(|| Error::Temporal("branch requires a ground state".into()))?;
        let ground = self.state(ground_id)?;
        let ground_vt = ground.vt;

        let tt = spec.tt.or(ground_vt).or(src.tt).unwrap_or(0);
        if src.tt.is_some_and(|src_tt| tt < src_tt) {
            return Err(Error::Temporal(format!(
                "tt must not go backward: {tt} < base tt {:?}",
                src.tt
            )));
        }
        let vt = spec
            .vt
            .ok_or_else(|| Error::Temporal("branch requires a vt".into()))?;
        if src.vt.is_some_and(|src_vt| vt < src_vt) {
            return Err(Error::Temporal(format!(
                "vt must not go backward: {vt} < base vt {:?}",
                src.vt
            )));
        }

        // Overlay auto-advance: follow the tracked timeline to its
        // latest locked descendant that is not past the new vt.
        let tracks = match src.tracks() {
            None => None,
            Some(old) => {
                let advanced = self.advance_tracks(old, vt)?;
                self.check_tracks_target(advanced, vt, Some(source))?;
                Some(advanced)
            }
        };

        let certainty = spec.certainty.unwrap_or(src.certainty);
        if !(0.0..=1.0).contains(&certainty) {
            return Err(Error::Schema(format!("certainty {certainty} outside [0, 1]")));
        }

        let id = StateId(self.ids.next_id());
        let state = State {
            id,
            mind: src.mind,
            kind: StateKind::Temporal { tracks },
            tt: Some(tt),
            vt: Some(vt),
            certainty,
            base: Some(source),
            ground_state: Some(ground_id),
            self_subject: src.self_subject,
            insert: Vec::new(),
            remove: Vec::new(),
            locked: false,
        };
        self.states.insert(id, state);

        let m = self.mind_mut(src.mind)?;
        m.states.push(id);
        m.states_by_ground.entry(Some(ground_id)).or_default().push(id);
        trace!(source = %source, state = %id, vt, "state branched");
        Ok(id)
    }

    /// Latest locked state in the tracked timeline (descendants of the
    /// old target through `base`, same mind) with `vt ≤ new_vt`.
    fn advance_tracks(&self, old: StateId, new_vt: i64) -> Result<StateId> {
        let old_mind = self.state(old)?.mind;
        let mut best = old;
        let mut best_key = (self.state(old)?.vt, self.state(old)?.tt, old);
        for s in self.states.values() {
            if s.mind != old_mind || !s.locked {
                continue;
            }
            if s.vt.is_none_or(|vt| vt > new_vt) {
                continue;
            }
            if !self.is_base_ancestor(old, s.id)? {
                continue;
            }
            let key = (s.vt, s.tt, s.id);
            if key > best_key {
                best = s.id;
                best_key = key;
            }
        }
        Ok(best)
    }

    // ========================================================================
    // Convergence
    // ========================================================================

    /// Compose locked sibling/cousin states into one logical state.
    ///
    /// The result is born locked: it has no insert set of its own and is
    /// fully determined by its components.
    pub fn converge(
        &mut self,
        mind: MindId,
        ground: StateId,
        components: &[StateId],
        vt: i64,
    ) -> Result<StateId> {
        self.mind(mind)?;
        if components.is_empty() {
            return Err(Error::Consistency("a convergence needs at least one component".into()));
        }
        for c in components {
            let comp = self.state(*c)?;
            if !comp.locked {
                return Err(Error::Consistency(format!("component {c} is not locked")));
            }
            if comp.ground_state != Some(ground) {
                return Err(Error::Consistency(format!(
                    "component {c} disagrees on ground state ({:?} vs {ground})",
                    comp.ground_state
                )));
            }
        }
        for a in components {
            for b in components {
                if a != b && self.is_base_ancestor(*a, *b)? {
                    return Err(Error::Consistency(format!(
                        "component {a} lies on component {b}'s base chain"
                    )));
                }
            }
        }

        let tt = self.state(ground)?.vt;
        let id = StateId(self.ids.next_id());
        let state = State {
            id,
            mind,
            kind: StateKind::Convergence {
                components: components.to_vec(),
                resolution: None,
            },
            tt,
            vt: Some(vt),
            certainty: 1.0,
            base: None,
            ground_state: Some(ground),
            self_subject: None,
            insert: Vec::new(),
            remove: Vec::new(),
            locked: true,
        };
        self.states.insert(id, state);

        let m = self.mind_mut(mind)?;
        m.states.push(id);
        m.states_by_ground.entry(Some(ground)).or_default().push(id);
        debug!(state = %id, components = components.len(), "convergence created");
        Ok(id)
    }

    /// Collapse a convergence to one of its components. One-shot; every
    /// read afterwards sees only the resolved component, and superseded
    /// belief versions gain forwarding pointers to the surviving ones.
    pub fn register_resolution(&mut self, convergence: StateId, component: StateId) -> Result<()> {
        let state = self.state(convergence)?;
        let StateKind::Convergence { components, resolution } = &state.kind else {
            return Err(Error::Consistency(format!("state {convergence} is not a convergence")));
        };
        if resolution.is_some() {
            return Err(Error::Consistency(format!("convergence {convergence} is already resolved")));
        }
        if !components.contains(&component) {
            return Err(Error::Consistency(format!(
                "{component} is not a component of convergence {convergence}"
            )));
        }
        let components = components.clone();

        // Forward superseded versions to the surviving ones.
        let mut winners: hashbrown::HashMap<Sid, BeliefId> = hashbrown::HashMap::new();
        for bid in self.visible_beliefs(component)? {
            let sid = self.belief(bid)?.sid;
            winners.entry(sid).or_insert(bid);
        }
        for c in components {
            if c == component {
                continue;
            }
            for bid in self.visible_beliefs(c)? {
                let sid = self.belief(bid)?.sid;
                if let Some(winner) = winners.get(&sid) {
                    if *winner != bid {
                        self.belief_mut(bid)?.resolution = Some(*winner);
                    }
                }
            }
        }

        match &mut self.state_mut(convergence)?.kind {
            StateKind::Convergence { resolution, .. } => *resolution = Some(component),
            _ => unreachable!(),
        }
        self.invalidate_downstream(convergence);
        debug!(state = %convergence, winner = %component, "convergence resolved");
        Ok(())
    }

    // ========================================================================
    // Timeline queries
    // ========================================================================

    pub fn states_by_ground(&self, mind: MindId, ground: StateId) -> Result<Vec<StateId>> {
        Ok(self.mind(mind)?.states_for_ground(Some(ground)).to_vec())
    }

    /// Branch tips of the mind's state DAG for `ground`, restricted to
    /// `state.tt ≤ tt`. A state is a tip when no other candidate reaches
    /// it through its base chain.
    pub fn states_at_tt(&self, mind: MindId, ground: StateId, tt: i64) -> Result<Vec<StateId>> {
        let candidates: Vec<StateId> = self
            .mind(mind)?
            .states_for_ground(Some(ground))
            .iter()
            .copied()
            .filter(|id| {
                self.states
                    .get(id)
                    .and_then(|s| s.tt)
                    .is_some_and(|stt| stt <= tt)
            })
            .collect();

        let mut tips = Vec::new();
        for c in &candidates {
            let mut is_tip = true;
            for other in &candidates {
                if other != c && self.is_base_ancestor(*c, *other)? {
                    is_tip = false;
                    break;
                }
            }
            if is_tip {
                tips.push(*c);
            }
        }
        Ok(tips)
    }
}
