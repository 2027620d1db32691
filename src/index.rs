//! Reverse trait index: for each (state, traittype), which visible
//! beliefs resolve to a given value.
//!
//! Built lazily at the first `rev_trait` call on a locked state and kept
//! until the state's caches are invalidated (mutation while open,
//! convergence resolution). Open states are answered with a fresh scan —
//! their contents change under the caller's feet by design.
//!
//! The index recurses into tracks overlays and convergence components
//! for free: it is built over [`Store::visible_beliefs`], which already
//! layers those in.

use hashbrown::{HashMap, HashSet};

use crate::model::{BeliefId, Sid, StateId, TraitId, Value, ValueKey};
use crate::store::Store;
use crate::Result;

impl Store {
    /// All beliefs visible in `state` whose resolved value for `tid`
    /// equals `key` — or, for containers and fuzzy values, contains it.
    pub fn beliefs_referencing(
        &mut self,
        state: StateId,
        tid: TraitId,
        key: &ValueKey,
    ) -> Result<Vec<BeliefId>> {
        if self.state(state)?.locked {
            if !self.rev_index.contains_key(&(state, tid)) {
                let built = self.build_rev_index(state, tid)?;
                self.rev_index.insert((state, tid), built);
            }
            return Ok(self
                .rev_index
                .get(&(state, tid))
                .and_then(|idx| idx.get(key))
                .cloned()
                .unwrap_or_default());
        }
        let idx = self.build_rev_index(state, tid)?;
        Ok(idx.get(key).cloned().unwrap_or_default())
    }

    /// Beliefs in `state` whose `tid` value references the subject
    /// `sid`. This is the `rev_trait` query shape: "who points at me".
    pub fn rev_trait_by_sid(
        &mut self,
        state: StateId,
        sid: Sid,
        tid: TraitId,
    ) -> Result<Vec<BeliefId>> {
        self.beliefs_referencing(state, tid, &ValueKey::Subject(sid))
    }

    fn build_rev_index(
        &mut self,
        state: StateId,
        tid: TraitId,
    ) -> Result<HashMap<ValueKey, Vec<BeliefId>>> {
        let mut index: HashMap<ValueKey, Vec<BeliefId>> = HashMap::new();
        for bid in self.visible_beliefs(state)? {
            let Some(value) = self.resolve_trait(state, bid, tid)? else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            for key in index_keys(&value) {
                index.entry(key).or_default().push(bid);
            }
        }
        Ok(index)
    }
}

/// The identity keys one resolved value is findable under: itself, each
/// container element, and every subject it references anywhere.
fn index_keys(value: &Value) -> HashSet<ValueKey> {
    let mut keys: HashSet<ValueKey> = HashSet::new();
    keys.insert(value.identity());
    if let Value::List(items) = value {
        for item in items {
            keys.insert(item.identity());
        }
    }
    for sid in value.subjects() {
        keys.insert(ValueKey::Subject(sid));
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_keys_cover_elements_and_subjects() {
        let v = Value::List(vec![Value::Subject(Sid(3)), Value::Str("x".into())]);
        let keys = index_keys(&v);
        assert!(keys.contains(&ValueKey::Subject(Sid(3))));
        assert!(keys.contains(&ValueKey::Str("x".into())));
        assert!(keys.contains(&v.identity()));
    }

    #[test]
    fn test_index_keys_scalar() {
        let v = Value::Subject(Sid(9));
        let keys = index_keys(&v);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&ValueKey::Subject(Sid(9))));
    }
}
