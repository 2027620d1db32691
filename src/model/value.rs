//! Universal trait value type.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ArchetypeId, MindId, Sid, StateId};

/// A trait value as stored on a belief or resolved through its bases.
///
/// Covers the whole value space of the knowledge base:
/// - Scalars: Bool, Int, Float, Str
/// - Entity references: Subject, State, Mind, Archetype
/// - Containers: List (ordered)
/// - Uncertainty: Fuzzy
///
/// `Null` is a real value: a belief that stores `Null` for a trait
/// *blocks* inheritance of that trait at that belief. A trait that is
/// simply absent inherits through the belief's bases instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),

    // Entity references — always late-bound ids, never owned entities.
    Subject(Sid),
    State(StateId),
    Mind(MindId),
    Archetype(ArchetypeId),

    List(Vec<Value>),
    Fuzzy(Fuzzy),
}

/// A set of weighted alternatives for an uncertain value.
///
/// The empty set is the canonical `unknown`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fuzzy {
    pub alternatives: Vec<FuzzyAlt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyAlt {
    pub certainty: f64,
    pub value: Value,
}

impl Fuzzy {
    /// The Fuzzy with no alternatives.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.alternatives.is_empty()
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Hashable identity form of a [`Value`], used for deduplication during
/// composition and as the key of the reverse trait index.
///
/// Floats are keyed by their bit pattern; two NaNs with the same bits are
/// identical for dedup purposes, which is exactly what the index needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
    Subject(Sid),
    State(StateId),
    Mind(MindId),
    Archetype(ArchetypeId),
    List(Vec<ValueKey>),
    Fuzzy(Vec<(u64, ValueKey)>),
}

impl Value {
    pub fn identity(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int(i) => ValueKey::Int(*i),
            Value::Float(f) => ValueKey::Float(f.to_bits()),
            Value::Str(s) => ValueKey::Str(s.clone()),
            Value::Subject(s) => ValueKey::Subject(*s),
            Value::State(s) => ValueKey::State(*s),
            Value::Mind(m) => ValueKey::Mind(*m),
            Value::Archetype(a) => ValueKey::Archetype(*a),
            Value::List(l) => ValueKey::List(l.iter().map(Value::identity).collect()),
            Value::Fuzzy(f) => ValueKey::Fuzzy(
                f.alternatives
                    .iter()
                    .map(|a| (a.certainty.to_bits(), a.value.identity()))
                    .collect(),
            ),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::Str(_) => "STRING",
            Value::Subject(_) => "SUBJECT",
            Value::State(_) => "STATE",
            Value::Mind(_) => "MIND",
            Value::Archetype(_) => "ARCHETYPE",
            Value::List(_) => "LIST",
            Value::Fuzzy(_) => "FUZZY",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_subject(&self) -> Option<Sid> {
        match self {
            Value::Subject(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// All subject ids referenced by this value, including inside lists
    /// and fuzzy alternatives. Used by the reverse trait index.
    pub fn subjects(&self) -> Vec<Sid> {
        let mut out = Vec::new();
        self.collect_subjects(&mut out);
        out
    }

    fn collect_subjects(&self, out: &mut Vec<Sid>) {
        match self {
            Value::Subject(s) => out.push(*s),
            Value::List(l) => {
                for v in l {
                    v.collect_subjects(out);
                }
            }
            Value::Fuzzy(f) => {
                for alt in &f.alternatives {
                    alt.value.collect_subjects(out);
                }
            }
            _ => {}
        }
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}
impl From<Sid> for Value {
    fn from(v: Sid) -> Self {
        Value::Subject(v)
    }
}
impl From<StateId> for Value {
    fn from(v: StateId) -> Self {
        Value::State(v)
    }
}
impl From<MindId> for Value {
    fn from(v: MindId) -> Self {
        Value::Mind(v)
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Value::Subject(s) => write!(f, "subject({s})"),
            Value::State(s) => write!(f, "state({s})"),
            Value::Mind(m) => write!(f, "mind({m})"),
            Value::Archetype(a) => write!(f, "archetype({})", a.0),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Fuzzy(fz) => {
                if fz.is_unknown() {
                    return write!(f, "unknown");
                }
                write!(f, "fuzzy{{")?;
                for (i, alt) in fz.alternatives.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", alt.certainty, alt.value)?;
                }
                write!(f, "}}")
            }
        }
    }
}
