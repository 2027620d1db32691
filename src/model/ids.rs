//! Entity identifiers and the process-scoped id sequence.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque mind identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MindId(pub u64);

/// Opaque state identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub u64);

/// Opaque belief identifier. Unique per *version*; versions of the same
/// thing share a [`Sid`], not a `BeliefId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BeliefId(pub u64);

/// Subject identifier — the permanent identity shared by all versions
/// of one belief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sid(pub u64);

/// Index of a registered traittype, dense from 0 in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TraitId(pub u32);

/// Index of a registered archetype, dense from 0 in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArchetypeId(pub u32);

impl std::fmt::Display for MindId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for BeliefId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for Sid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source for minds, states, beliefs and subjects.
///
/// One sequence covers all entity kinds, so an id seen anywhere in a
/// serialized mind is unambiguous. Ids are never reused; the codec loader
/// calls [`IdSequence::advance_past`] so freshly minted ids never collide
/// with loaded ones.
#[derive(Debug)]
pub struct IdSequence {
    next: AtomicU64,
}

impl IdSequence {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Ensure future ids are strictly greater than `id`.
    pub fn advance_past(&self, id: u64) {
        let mut cur = self.next.load(Ordering::Relaxed);
        while cur <= id {
            match self.next.compare_exchange(cur, id + 1, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(seen) => cur = seen,
            }
        }
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}
