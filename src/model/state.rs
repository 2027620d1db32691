//! State — an immutable-once-locked container of beliefs.

use serde::{Deserialize, Serialize};

use super::{BeliefId, MindId, Sid, StateId};

/// Variant-specific payload of a [`State`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateKind {
    /// A timeline snapshot in one mind, layered over an optional `base`
    /// in the same mind and optionally overlaying a `tracks` target.
    Temporal { tracks: Option<StateId> },
    /// The single process-wide ground of the primordial mind.
    /// `ground_state`, `tt` and `vt` are all absent.
    Timeless,
    /// Composition of locked component states sharing one ground.
    /// `resolution` collapses the superposition to one component.
    Convergence {
        components: Vec<StateId>,
        resolution: Option<StateId>,
    },
}

/// A snapshot of beliefs. Open states are the only mutable objects in the
/// engine; locking is one-way and freezes `insert`, `remove`, `tracks`,
/// `base` and the traits of every inserted belief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub mind: MindId,
    pub kind: StateKind,
    /// Transaction time: when this snapshot was recorded.
    pub tt: Option<i64>,
    /// Valid time: when its content is believed true.
    pub vt: Option<i64>,
    pub certainty: f64,
    /// Previous state in the same mind's timeline.
    pub base: Option<StateId>,
    /// The parent-mind state this state is an opinion about.
    pub ground_state: Option<StateId>,
    /// The believing agent's own subject, when known.
    pub self_subject: Option<Sid>,
    /// Beliefs inserted here, in declaration order.
    pub insert: Vec<BeliefId>,
    /// Beliefs removed relative to the base chain / tracks overlay.
    /// Referenced by id only; the versions live in their origin states.
    pub remove: Vec<BeliefId>,
    pub locked: bool,
}

impl State {
    pub fn is_temporal(&self) -> bool {
        matches!(self.kind, StateKind::Temporal { .. })
    }

    pub fn is_timeless(&self) -> bool {
        matches!(self.kind, StateKind::Timeless)
    }

    pub fn is_convergence(&self) -> bool {
        matches!(self.kind, StateKind::Convergence { .. })
    }

    pub fn tracks(&self) -> Option<StateId> {
        match self.kind {
            StateKind::Temporal { tracks } => tracks,
            _ => None,
        }
    }

    pub fn components(&self) -> &[StateId] {
        match &self.kind {
            StateKind::Convergence { components, .. } => components,
            _ => &[],
        }
    }

    pub fn resolution(&self) -> Option<StateId> {
        match &self.kind {
            StateKind::Convergence { resolution, .. } => *resolution,
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            StateKind::Temporal { .. } => "Temporal",
            StateKind::Timeless => "Timeless",
            StateKind::Convergence { .. } => "Convergence",
        }
    }
}

// ============================================================================
// Construction DTOs
// ============================================================================

/// Options for opening a new root state in a mind.
#[derive(Debug, Clone, Default)]
pub struct StateSpec {
    /// The parent-mind state this one is an opinion about.
    pub ground: Option<StateId>,
    /// Defaults to the ground's `vt` (fork invariant).
    pub tt: Option<i64>,
    /// Defaults to `tt`.
    pub vt: Option<i64>,
    /// Defaults to 1.0.
    pub certainty: Option<f64>,
    pub self_subject: Option<Sid>,
    /// Overlay target; must be locked, not in the future, and off this
    /// state's own base chain.
    pub tracks: Option<StateId>,
}

impl StateSpec {
    pub fn new(ground: StateId) -> Self {
        Self { ground: Some(ground), ..Default::default() }
    }

    pub fn at(mut self, tt: i64, vt: i64) -> Self {
        self.tt = Some(tt);
        self.vt = Some(vt);
        self
    }

    pub fn with_vt(mut self, vt: i64) -> Self {
        self.vt = Some(vt);
        self
    }

    pub fn with_certainty(mut self, certainty: f64) -> Self {
        self.certainty = Some(certainty);
        self
    }

    pub fn with_self(mut self, sid: Sid) -> Self {
        self.self_subject = Some(sid);
        self
    }

    pub fn with_tracks(mut self, tracks: StateId) -> Self {
        self.tracks = Some(tracks);
        self
    }
}

/// Options for branching a locked state forward.
#[derive(Debug, Clone, Default)]
pub struct BranchSpec {
    pub ground: Option<StateId>,
    pub vt: Option<i64>,
    /// Defaults to the ground's `vt`.
    pub tt: Option<i64>,
    /// Defaults to the source state's certainty.
    pub certainty: Option<f64>,
}

impl BranchSpec {
    pub fn new(ground: StateId, vt: i64) -> Self {
        Self { ground: Some(ground), vt: Some(vt), ..Default::default() }
    }

    pub fn with_tt(mut self, tt: i64) -> Self {
        self.tt = Some(tt);
        self
    }

    pub fn with_certainty(mut self, certainty: f64) -> Self {
        self.certainty = Some(certainty);
        self
    }
}
