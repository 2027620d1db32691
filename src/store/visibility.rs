//! Belief visibility: base-chain layering, tracks overlays, convergence
//! first-wins.

use hashbrown::HashSet;
use smallvec::SmallVec;

use crate::model::{BeliefId, Sid, StateId, StateKind};
use crate::{Error, Result};

use super::Store;

impl Store {
    /// All beliefs visible in `state`, in the contract order: local
    /// inserts (declaration order), then base-chain inherits, then
    /// tracked inherits. Convergences yield the union of their
    /// components with subject-level first-wins dedup, or only the
    /// resolved component once collapsed.
    pub fn visible_beliefs(&self, state: StateId) -> Result<Vec<BeliefId>> {
        let st = self.state(state)?;
        match &st.kind {
            StateKind::Convergence { components, resolution } => {
                if let Some(winner) = resolution {
                    return self.visible_beliefs(*winner);
                }
                let mut out = Vec::new();
                let mut claimed: HashSet<Sid> = HashSet::new();
                for c in components {
                    let mut newly: Vec<Sid> = Vec::new();
                    for bid in self.visible_beliefs(*c)? {
                        let sid = self.belief(bid)?.sid;
                        if !claimed.contains(&sid) {
                            out.push(bid);
                            newly.push(sid);
                        }
                    }
                    // A component may hold superposed versions of one
                    // subject; claims only take effect at the component
                    // boundary so all of them survive.
                    claimed.extend(newly);
                }
                Ok(out)
            }
            _ => {
                let mut out: Vec<BeliefId> = st.insert.clone();

                let mut shadowed: HashSet<Sid> = HashSet::new();
                for bid in &st.insert {
                    shadowed.insert(self.belief(*bid)?.sid);
                }
                for bid in &st.remove {
                    shadowed.insert(self.belief(*bid)?.sid);
                }

                if let Some(base) = st.base {
                    for bid in self.visible_beliefs(base)? {
                        if !shadowed.contains(&self.belief(bid)?.sid) {
                            out.push(bid);
                        }
                    }
                }

                if let Some(tracks) = st.tracks() {
                    let mut covered = shadowed;
                    for bid in &out {
                        covered.insert(self.belief(*bid)?.sid);
                    }
                    for bid in self.visible_beliefs(tracks)? {
                        if !covered.contains(&self.belief(bid)?.sid) {
                            out.push(bid);
                        }
                    }
                }

                Ok(out)
            }
        }
    }

    /// All visible versions of `sid` in `state`, in visibility order.
    /// More than one entry means superposition.
    pub fn visible_by_subject(&mut self, state: StateId, sid: Sid) -> Result<SmallVec<[BeliefId; 1]>> {
        if self.state(state)?.locked {
            self.ensure_subject_index(state)?;
            return Ok(self
                .subject_index
                .get(&state)
                .and_then(|idx| idx.get(&sid))
                .cloned()
                .unwrap_or_default());
        }
        let mut out = SmallVec::new();
        for bid in self.visible_beliefs(state)? {
            if self.belief(bid)?.sid == sid {
                out.push(bid);
            }
        }
        Ok(out)
    }

    /// The visible version of `sid` in `state`. `Identity` error when
    /// the subject has no belief there.
    pub fn belief_by_subject(&mut self, state: StateId, sid: Sid) -> Result<BeliefId> {
        self.visible_by_subject(state, sid)?
            .first()
            .copied()
            .ok_or_else(|| Error::Identity(format!("subject {sid} has no belief in state {state}")))
    }

    /// Look up by subject label, then resolve the visible version.
    pub fn belief_by_label(&mut self, state: StateId, label: &str) -> Result<BeliefId> {
        let sid = self.subject_by_label(label)?;
        self.belief_by_subject(state, sid)
    }

    fn ensure_subject_index(&mut self, state: StateId) -> Result<()> {
        if self.subject_index.contains_key(&state) {
            return Ok(());
        }
        let mut index: hashbrown::HashMap<Sid, SmallVec<[BeliefId; 1]>> = hashbrown::HashMap::new();
        for bid in self.visible_beliefs(state)? {
            let sid = self.belief(bid)?.sid;
            index.entry(sid).or_default().push(bid);
        }
        self.subject_index.insert(state, index);
        Ok(())
    }
}
