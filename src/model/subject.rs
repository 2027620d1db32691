//! Subject — the permanent identity token shared by all versions of a belief.

use serde::{Deserialize, Serialize};

use super::{MindId, Sid};

/// A stable identity. Two beliefs are versions of the same thing iff they
/// share a subject. Equality is by [`Sid`]; the label is a human handle
/// and never participates in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub sid: Sid,
    pub label: Option<String>,
    /// The mind that first defined this subject. Non-owning back edge;
    /// rebuilt on load.
    pub mind: MindId,
}

impl Subject {
    pub fn new(sid: Sid, label: Option<String>, mind: MindId) -> Self {
        Self { sid, label, mind }
    }
}
