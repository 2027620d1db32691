//! Perception and recall — derived operations that consume only core
//! contracts: visibility, resolution and the reverse `@about` index.
//!
//! A mind never references another mind's beliefs directly. It perceives
//! entities of its ground state and keeps its own *knowledge beliefs*,
//! linked to the outer reality through the `@about` trait.

use hashbrown::HashMap;
use tracing::trace;

use crate::model::{BaseRef, BeliefId, BeliefSpec, MindId, Sid, StateId, StateSpec, TraitId, Value};
use crate::schema::{Exposure, ABOUT, OBSERVED, PERCEPTION, PERCEPTION_EVENT};
use crate::store::Store;
use crate::{Error, Result};

/// What `learn_about` copies: explicitly named traits plus everything
/// observable through the given modalities.
#[derive(Debug, Clone, Default)]
pub struct LearnSpec {
    pub traits: Vec<String>,
    pub modalities: Vec<Exposure>,
}

impl LearnSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trait(mut self, name: impl Into<String>) -> Self {
        self.traits.push(name.into());
        self
    }

    pub fn with_modality(mut self, modality: Exposure) -> Self {
        self.modalities.push(modality);
        self
    }
}

/// Seed description for a mind created from a ground belief.
#[derive(Debug, Clone, Default)]
pub struct TemplateSpec {
    pub label: Option<String>,
    /// Ground beliefs the new mind learns about at birth.
    pub learn: Vec<BeliefId>,
    pub traits: Vec<String>,
    pub modalities: Vec<Exposure>,
}

impl TemplateSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_learn(mut self, belief: BeliefId) -> Self {
        self.learn.push(belief);
        self
    }

    pub fn with_trait(mut self, name: impl Into<String>) -> Self {
        self.traits.push(name.into());
        self
    }

    pub fn with_modality(mut self, modality: Exposure) -> Self {
        self.modalities.push(modality);
        self
    }
}

impl Store {
    fn about_tid(&self) -> Result<TraitId> {
        Ok(self.schema.traittype_by_label(ABOUT)?.id)
    }

    // ========================================================================
    // learn_about
    // ========================================================================

    /// Create or update (via `replace`) the knowledge belief in `state`
    /// about `source`, a belief of the state's ground. Copies the
    /// requested traits, recursively dereferencing Subject values into
    /// local knowledge subjects. Cycle-safe.
    pub fn learn_about(
        &mut self,
        state: StateId,
        source: BeliefId,
        spec: &LearnSpec,
    ) -> Result<BeliefId> {
        let ground = self
            .state(state)?
            .ground_state
            .ok_or_else(|| Error::Identity(format!("state {state} has no ground to learn from")))?;
        let mut visited: HashMap<Sid, Sid> = HashMap::new();
        self.learn_about_inner(state, ground, source, spec, &mut visited)
    }

    fn learn_about_inner(
        &mut self,
        state: StateId,
        ground: StateId,
        source: BeliefId,
        spec: &LearnSpec,
        visited: &mut HashMap<Sid, Sid>,
    ) -> Result<BeliefId> {
        let src = self.belief(source)?.clone();
        if let Some(local_sid) = visited.get(&src.sid).copied() {
            return self.belief_by_subject(state, local_sid);
        }

        let about = self.about_tid()?;
        let existing = self.rev_trait_by_sid(state, src.sid, about)?.first().copied();

        // Make sure a knowledge belief exists and is recorded before any
        // recursion — trait values may loop back to this subject.
        let knowledge = match existing {
            Some(k) => k,
            None => {
                let mut bases: Vec<BaseRef> = Vec::new();
                for aid in self.archetypes_of(source)? {
                    bases.push(BaseRef::Archetype(self.schema.archetype(aid)?.label.clone()));
                }
                self.add_belief(
                    state,
                    BeliefSpec {
                        label: None,
                        bases,
                        traits: vec![(ABOUT.to_owned(), Value::Subject(src.sid))],
                        subject: None,
                        promotions: Vec::new(),
                    },
                )?
            }
        };
        let knowledge_sid = self.belief(knowledge)?.sid;
        visited.insert(src.sid, knowledge_sid);

        let mut tids: Vec<TraitId> = Vec::new();
        for name in &spec.traits {
            let tid = self.schema.traittype_by_label(name)?.id;
            if !tids.contains(&tid) {
                tids.push(tid);
            }
        }
        if !spec.modalities.is_empty() {
            for tt in self.schema.traittypes().to_vec() {
                if spec.modalities.contains(&tt.exposure) && !tids.contains(&tt.id) {
                    tids.push(tt.id);
                }
            }
        }

        let mut overrides: Vec<(String, Value)> = Vec::new();
        for tid in tids {
            let Some(value) = self.resolve_trait(ground, source, tid)? else {
                continue;
            };
            let value = self.deref_value(state, ground, value, spec, visited)?;
            overrides.push((self.schema.traittype(tid)?.label.clone(), value));
        }

        if overrides.is_empty() {
            return Ok(knowledge);
        }
        trace!(state = %state, source = %source, traits = overrides.len(), "learned about belief");
        self.replace(state, knowledge, &overrides)
    }

    /// Rewrite ground-side Subject references into local knowledge
    /// subjects, learning stubs for entities seen for the first time.
    fn deref_value(
        &mut self,
        state: StateId,
        ground: StateId,
        value: Value,
        spec: &LearnSpec,
        visited: &mut HashMap<Sid, Sid>,
    ) -> Result<Value> {
        Ok(match value {
            Value::Subject(sid) => Value::Subject(self.learn_subject(state, ground, sid, spec, visited)?),
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.deref_value(state, ground, item, spec, visited)?);
                }
                Value::List(out)
            }
            Value::Fuzzy(mut fuzzy) => {
                for alt in &mut fuzzy.alternatives {
                    alt.value =
                        self.deref_value(state, ground, alt.value.clone(), spec, visited)?;
                }
                Value::Fuzzy(fuzzy)
            }
            other => other,
        })
    }

    fn learn_subject(
        &mut self,
        state: StateId,
        ground: StateId,
        sid: Sid,
        spec: &LearnSpec,
        visited: &mut HashMap<Sid, Sid>,
    ) -> Result<Sid> {
        if let Some(local) = visited.get(&sid) {
            return Ok(*local);
        }
        match self.belief_by_subject(ground, sid) {
            Ok(source) => {
                let knowledge = self.learn_about_inner(state, ground, source, spec, visited)?;
                Ok(self.belief(knowledge)?.sid)
            }
            // Optional resolution: a subject with no ground version stays
            // as-is instead of failing the whole copy.
            Err(Error::Identity(_)) | Err(Error::NotFound(_)) => Ok(sid),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // perceive / recognize
    // ========================================================================

    /// Observe ground entities through the given modalities and record a
    /// perception event in `state`.
    ///
    /// Identified entities (identity certain, `@about` recognition hits)
    /// are referenced through their existing knowledge subject; the rest
    /// get a fresh perceived belief with `@about = Null` carrying only
    /// the observable traits.
    pub fn perceive(
        &mut self,
        state: StateId,
        entities: &[BeliefId],
        modalities: &[Exposure],
    ) -> Result<BeliefId> {
        let ground = self
            .state(state)?
            .ground_state
            .ok_or_else(|| Error::Identity(format!("state {state} has no ground to perceive")))?;
        let about = self.about_tid()?;

        let mut observed: Vec<Value> = Vec::with_capacity(entities.len());
        for &entity in entities {
            let src = self.belief(entity)?.clone();
            let identity_certain = src.promotions.is_empty();
            let matches = self.rev_trait_by_sid(state, src.sid, about)?;

            if identity_certain && !matches.is_empty() {
                observed.push(Value::Subject(self.belief(matches[0])?.sid));
                continue;
            }

            let mut traits: Vec<(String, Value)> = vec![(ABOUT.to_owned(), Value::Null)];
            for tt in self.schema.traittypes().to_vec() {
                if tt.exposure == Exposure::Internal || !modalities.contains(&tt.exposure) {
                    continue;
                }
                if let Some(v) = self.resolve_trait(ground, entity, tt.id)? {
                    if !v.is_null() {
                        traits.push((tt.label.clone(), v));
                    }
                }
            }
            let perceived = self.add_belief(
                state,
                BeliefSpec {
                    label: None,
                    bases: vec![BaseRef::Archetype(PERCEPTION.to_owned())],
                    traits,
                    subject: None,
                    promotions: Vec::new(),
                },
            )?;
            observed.push(Value::Subject(self.belief(perceived)?.sid));
        }

        self.add_belief(
            state,
            BeliefSpec {
                label: None,
                bases: vec![BaseRef::Archetype(PERCEPTION_EVENT.to_owned())],
                traits: vec![(OBSERVED.to_owned(), Value::List(observed))],
                subject: None,
                promotions: Vec::new(),
            },
        )
    }

    /// Knowledge beliefs in `state` about the given ground belief's
    /// subject. Misses yield an empty result, never an error.
    pub fn recognize(&mut self, state: StateId, source: BeliefId) -> Result<Vec<BeliefId>> {
        let sid = match self.belief(source) {
            Ok(b) => b.sid,
            Err(Error::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let about = self.about_tid()?;
        match self.rev_trait_by_sid(state, sid, about) {
            Ok(found) => Ok(found),
            Err(Error::NotFound(_)) | Err(Error::Identity(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Recall
    // ========================================================================

    /// Newest-first scan of the mind's branch tips for a visible version
    /// of `sid`, optionally bounded by transaction time.
    pub fn recall_by_subject(
        &mut self,
        mind: MindId,
        sid: Sid,
        until_tt: Option<i64>,
    ) -> Result<Option<(StateId, BeliefId)>> {
        let candidates: Vec<StateId> = self
            .mind(mind)?
            .states
            .iter()
            .copied()
            .filter(|id| match until_tt {
                Some(bound) => self
                    .states
                    .get(id)
                    .and_then(|s| s.tt)
                    .is_none_or(|tt| tt <= bound),
                None => true,
            })
            .collect();

        // Only branch tips count. A state another candidate reaches
        // through its base chain is a superseded snapshot; scanning it
        // would resurrect versions the tip replaced or removed.
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

        tips.sort_by_key(|id| {
            let s = &self.states[id];
            std::cmp::Reverse((s.vt, s.tt, s.id))
        });
        for state in tips {
            if let Some(found) = self.visible_by_subject(state, sid)?.first() {
                return Ok(Some((state, *found)));
            }
        }
        Ok(None)
    }

    // ========================================================================
    // Minds from templates
    // ========================================================================

    /// Create a child mind grounded at `ground_state`, identifying as
    /// `ground_belief`'s subject, seeded by learning about the listed
    /// ground beliefs.
    pub fn create_mind_from_template(
        &mut self,
        ground_state: StateId,
        ground_belief: BeliefId,
        spec: TemplateSpec,
    ) -> Result<MindId> {
        let parent = self.state(ground_state)?.mind;
        let self_sid = self.belief(ground_belief)?.sid;

        let mind = self.create_mind(parent, spec.label.clone())?;
        self.mind_mut(mind)?.self_subject = Some(self_sid);

        let origin = self.create_state(mind, StateSpec::new(ground_state).with_self(self_sid))?;

        let learn = LearnSpec { traits: spec.traits, modalities: spec.modalities };
        for belief in &spec.learn {
            self.learn_about(origin, *belief, &learn)?;
        }
        Ok(mind)
    }
}
