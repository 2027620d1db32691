//! Traittype — a named, typed trait slot with composition and scoping
//! metadata.

use serde::{Deserialize, Serialize};

use crate::model::{TraitId, Value};
use crate::{Error, Result};

/// Expected kind of a trait's (element) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    /// Int or Float.
    Num,
    Str,
    Subject,
    State,
    Mind,
    Archetype,
}

/// Which state a Subject value is dereferenced against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MindScope {
    /// Resolve inside the reading state's own mind.
    Own,
    /// Resolve in the ground state (the outer reality the reading state
    /// is an opinion about).
    Parent,
}

/// Perceptual channel a trait is observable through. `Internal` traits
/// are never perceived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exposure {
    Internal,
    Visual,
    Spatial,
    Auditory,
    Olfactory,
}

/// Composition rule for composable traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Composer {
    /// Containers: concatenate, dedup by value identity, first
    /// occurrence wins.
    Concat,
    /// Mind values: build a mind whose origin is a Convergence over the
    /// component minds' states.
    Minds,
}

/// A registered trait slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Traittype {
    pub id: TraitId,
    pub label: String,
    pub kind: ValueKind,
    /// Ordered sequence of `kind` rather than a single value.
    pub container: bool,
    pub composable: bool,
    pub mind_scope: MindScope,
    pub exposure: Exposure,
    pub composer: Composer,
}

impl Traittype {
    /// Validate a value against this slot's kind and container flag.
    ///
    /// `Null` always passes (it is the block marker), and a Fuzzy passes
    /// when each alternative passes.
    pub fn admits(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        if let Value::Fuzzy(f) = value {
            for alt in &f.alternatives {
                self.admits(&alt.value)?;
            }
            return Ok(());
        }
        if self.container {
            let Value::List(items) = value else {
                return Err(Error::Schema(format!(
                    "trait '{}' holds a container, got {}",
                    self.label,
                    value.type_name()
                )));
            };
            for item in items {
                self.admits_element(item)?;
            }
            Ok(())
        } else {
            self.admits_element(value)
        }
    }

    fn admits_element(&self, value: &Value) -> Result<()> {
        let ok = match self.kind {
            ValueKind::Bool => matches!(value, Value::Bool(_)),
            ValueKind::Num => matches!(value, Value::Int(_) | Value::Float(_)),
            ValueKind::Str => matches!(value, Value::Str(_)),
            ValueKind::Subject => matches!(value, Value::Subject(_)),
            ValueKind::State => matches!(value, Value::State(_)),
            ValueKind::Mind => matches!(value, Value::Mind(_)),
            ValueKind::Archetype => matches!(value, Value::Archetype(_)),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::Schema(format!(
                "trait '{}' expects {:?}, got {}",
                self.label,
                self.kind,
                value.type_name()
            )))
        }
    }
}

// ============================================================================
// Registration DTO
// ============================================================================

/// Definition of a traittype, passed to `register`.
#[derive(Debug, Clone)]
pub struct TraittypeDef {
    pub label: String,
    pub kind: ValueKind,
    pub container: bool,
    pub composable: bool,
    pub mind_scope: MindScope,
    pub exposure: Exposure,
}

impl TraittypeDef {
    pub fn new(label: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            label: label.into(),
            kind,
            container: false,
            composable: false,
            mind_scope: MindScope::Own,
            exposure: Exposure::Internal,
        }
    }

    pub fn container(mut self) -> Self {
        self.container = true;
        self
    }

    pub fn composable(mut self) -> Self {
        self.composable = true;
        self
    }

    pub fn scope(mut self, scope: MindScope) -> Self {
        self.mind_scope = scope;
        self
    }

    pub fn exposure(mut self, exposure: Exposure) -> Self {
        self.exposure = exposure;
        self
    }
}
