//! # noema-rs — Multi-Mind, Multi-Version Knowledge Base
//!
//! A store in which many *minds* — the world, its characters, their
//! hypothetical theories — each hold versioned, layered collections of
//! *beliefs* about entities, with the temporal and epistemic
//! relationships between minds as first-class data.
//!
//! ## Design Principles
//!
//! 1. **Ids cross all boundaries**: entities reference each other through
//!    opaque ids; the store owns everything, cycles cost nothing
//! 2. **Identity through Subject**: versions of one thing share a `Sid`;
//!    cross-mind references are late-bound at read time
//! 3. **Locked means immutable**: an open state is the only mutable
//!    object in the system, and locking is one-way
//! 4. **Resolution is the contract**: trait reads compose, override and
//!    inherit the same way everywhere, bit-reproducibly
//!
//! ## Quick Start
//!
//! ```rust
//! use noema_rs::{Engine, BeliefSpec, StateSpec, Value};
//! use noema_rs::schema::{ArchetypeDef, SchemaDef, TraittypeDef, ValueKind};
//!
//! # fn example() -> noema_rs::Result<()> {
//! let engine = Engine::new();
//! engine.register(
//!     SchemaDef::new()
//!         .with_traittype(TraittypeDef::new("color", ValueKind::Str))
//!         .with_archetype(ArchetypeDef::new("Tool").with_trait("color", "gray")),
//! )?;
//!
//! // A world mind over the primordial ground
//! let world = engine.create_mind(engine.logos(), Some("world"))?;
//! let state = engine.create_state(world, StateSpec::new(engine.logos_state()).at(1, 1))?;
//!
//! let hammer = engine.add_belief(state, BeliefSpec::new().with_label("hammer").with_base("Tool"))?;
//! engine.lock(state)?;
//!
//! assert_eq!(engine.get_trait(state, hammer, "color")?, Some(Value::from("gray")));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## State lifecycle
//!
//! | Step | Operation |
//! |------|-----------|
//! | open | `create_state` / `branch` |
//! | mutate | `add_belief`, `remove_beliefs`, `replace` |
//! | freeze | `lock` (one-way, idempotent) |
//! | fork | `branch` from a locked state |
//! | merge | `converge`, then optionally `register_resolution` |

// ============================================================================
// Modules
// ============================================================================

pub mod codec;
pub mod engine;
pub mod index;
pub mod model;
pub mod perception;
pub mod resolve;
pub mod schema;
pub mod store;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    ArchetypeId, Base, BaseRef, Belief, BeliefId, BeliefSpec, BranchSpec, Fuzzy, FuzzyAlt, Mind,
    MindId, MindKind, Promotion, Sid, State, StateId, StateKind, StateSpec, Subject, TraitId,
    Value, ValueKey,
};

// ============================================================================
// Re-exports: Schema
// ============================================================================

pub use schema::{
    ArchetypeDef, Exposure, MindScope, MindTemplate, SchemaDef, TemplateValue, TraittypeDef,
    ValueKind,
};

// ============================================================================
// Re-exports: Engine & perception
// ============================================================================

pub use engine::Engine;
pub use perception::{LearnSpec, TemplateSpec};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Locked: {0}")]
    Locked(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Temporal error: {0}")]
    Temporal(String),

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
