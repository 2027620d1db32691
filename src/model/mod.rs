//! # Entity Model
//!
//! Pure data types that cross every boundary of the engine:
//! ids, values, subjects, beliefs, states and minds.
//!
//! Design rule: no engine logic here — no lookups, no resolution, no
//! I/O. Everything references everything else by id; the store owns the
//! entities and the tables.

pub mod belief;
pub mod ids;
pub mod mind;
pub mod state;
pub mod subject;
pub mod value;

pub use belief::{Base, BaseRef, Belief, BeliefSpec, Promotion};
pub use ids::{ArchetypeId, BeliefId, IdSequence, MindId, Sid, StateId, TraitId};
pub use mind::{Mind, MindKind};
pub use state::{BranchSpec, State, StateKind, StateSpec};
pub use subject::Subject;
pub use value::{Fuzzy, FuzzyAlt, Value, ValueKey};
