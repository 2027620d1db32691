//! Failure modes: every error kind fires on its documented condition and
//! nothing else.

use noema_rs::schema::{ArchetypeDef, SchemaDef, TraittypeDef, ValueKind};
use noema_rs::{BeliefSpec, BranchSpec, Engine, Error, StateSpec, Value};

fn seed_engine() -> Engine {
    let engine = Engine::new();
    engine
        .register(
            SchemaDef::new()
                .with_traittype(TraittypeDef::new("color", ValueKind::Str))
                .with_traittype(TraittypeDef::new("tags", ValueKind::Str).container())
                .with_archetype(ArchetypeDef::new("Tool").with_trait("color", "gray")),
        )
        .unwrap();
    engine
}

fn world_state(engine: &Engine) -> (noema_rs::MindId, noema_rs::StateId) {
    let world = engine.create_mind(engine.logos(), Some("world")).unwrap();
    let state = engine.create_state(world, StateSpec::new(engine.logos_state()).at(1, 1)).unwrap();
    (world, state)
}

// ============================================================================
// Locked: mutation after lock always fails fast
// ============================================================================

#[test]
fn test_locked_state_rejects_mutation() {
    let engine = seed_engine();
    let (_, state) = world_state(&engine);
    let hammer = engine
        .add_belief(state, BeliefSpec::new().with_label("hammer").with_base("Tool"))
        .unwrap();
    engine.lock(state).unwrap();
    // Locking again is fine.
    engine.lock(state).unwrap();

    assert!(matches!(
        engine.add_belief(state, BeliefSpec::new().with_label("x")),
        Err(Error::Locked(_))
    ));
    assert!(matches!(
        engine.replace(state, hammer, &[("color".to_string(), Value::from("red"))]),
        Err(Error::Locked(_))
    ));
    assert!(matches!(
        engine.branch_belief(state, hammer, &[]),
        Err(Error::Locked(_))
    ));
    assert!(matches!(engine.remove_beliefs(state, &[hammer]), Err(Error::Locked(_))));
}

// ============================================================================
// Temporal: fork invariant, monotonicity, tracks constraints
// ============================================================================

#[test]
fn test_branch_requires_locked_source() {
    let engine = seed_engine();
    let (_, state) = world_state(&engine);
    assert!(matches!(
        engine.branch(state, BranchSpec::new(engine.logos_state(), 2)),
        Err(Error::Temporal(_))
    ));
}

#[test]
fn test_vt_must_not_go_backward() {
    let engine = seed_engine();
    let (_, state) = world_state(&engine);
    engine.lock(state).unwrap();
    assert!(matches!(
        engine.branch(state, BranchSpec::new(engine.logos_state(), 0)),
        Err(Error::Temporal(_))
    ));
}

#[test]
fn test_fork_invariant_against_ground() {
    let engine = seed_engine();
    let (world, ground) = world_state(&engine);
    engine.lock(ground).unwrap();

    let npc = engine.create_mind(world, Some("npc")).unwrap();
    // ground.vt is 1; an npc root state recorded at tt=5 breaks the fork
    // invariant.
    let spec = StateSpec::new(ground).at(5, 5);
    assert!(matches!(engine.create_state(npc, spec), Err(Error::Temporal(_))));
    // Matching tt is fine, vt may trail it.
    assert!(engine.create_state(npc, StateSpec::new(ground).at(1, 0)).is_ok());
}

#[test]
fn test_tracks_target_must_be_locked_and_past() {
    let engine = seed_engine();
    let (world, open_state) = world_state(&engine);

    let overlay = engine.create_mind(world, Some("overlay")).unwrap();
    // Unlocked target.
    assert!(matches!(
        engine.create_state(
            overlay,
            StateSpec::new(engine.logos_state()).at(1, 1).with_tracks(open_state)
        ),
        Err(Error::Temporal(_))
    ));

    engine.lock(open_state).unwrap();
    // Future target: tracked vt 1 > overlay vt 0.
    assert!(matches!(
        engine.create_state(
            overlay,
            StateSpec::new(engine.logos_state()).at(0, 0).with_tracks(open_state)
        ),
        Err(Error::Temporal(_))
    ));
}

// ============================================================================
// Schema: unknown names, kind and container mismatches
// ============================================================================

#[test]
fn test_schema_violations() {
    let engine = seed_engine();
    let (_, state) = world_state(&engine);

    assert!(matches!(
        engine.add_belief(state, BeliefSpec::new().with_trait("no_such_trait", "x")),
        Err(Error::Schema(_))
    ));
    assert!(matches!(
        engine.add_belief(state, BeliefSpec::new().with_base("NoSuchArchetype")),
        Err(Error::Schema(_))
    ));
    // Wrong kind.
    assert!(matches!(
        engine.add_belief(state, BeliefSpec::new().with_trait("color", Value::Int(3))),
        Err(Error::Schema(_))
    ));
    // Scalar where a container is declared.
    assert!(matches!(
        engine.add_belief(state, BeliefSpec::new().with_trait("tags", "not-a-list")),
        Err(Error::Schema(_))
    ));
    // Certainty out of range.
    assert!(matches!(
        engine.create_state(
            engine.logos(),
            StateSpec::new(engine.logos_state()).at(1, 1).with_certainty(1.5)
        ),
        Err(Error::Schema(_))
    ));
}

#[test]
fn test_reregistration_needs_reset() {
    let engine = seed_engine();
    assert!(matches!(engine.register(SchemaDef::new()), Err(Error::Schema(_))));

    // The reset hook is a fresh engine.
    let fresh = Engine::new();
    assert!(fresh.register(SchemaDef::new()).is_ok());
}

#[test]
fn test_composable_scalar_rejected_at_register() {
    let engine = Engine::new();
    let result = engine.register(
        SchemaDef::new().with_traittype(TraittypeDef::new("weight", ValueKind::Num).composable()),
    );
    assert!(matches!(result, Err(Error::Schema(_))));
}

// ============================================================================
// Consistency: convergence validation
// ============================================================================

#[test]
fn test_convergence_validation() {
    let engine = seed_engine();
    let ground = engine.logos_state();
    let (world, s0) = world_state(&engine);

    // Unlocked component.
    assert!(matches!(
        engine.converge(world, ground, &[s0], 2),
        Err(Error::Consistency(_))
    ));
    engine.lock(s0).unwrap();

    let ta = engine.branch(s0, BranchSpec::new(ground, 2)).unwrap();
    engine.lock(ta).unwrap();

    // A component on another component's base chain.
    assert!(matches!(
        engine.converge(world, ground, &[s0, ta], 3),
        Err(Error::Consistency(_))
    ));

    // Components must agree on the ground.
    let elsewhere = engine.create_state(world, StateSpec::new(s0).at(1, 1)).unwrap();
    engine.lock(elsewhere).unwrap();
    assert!(matches!(
        engine.converge(world, ground, &[ta, elsewhere], 3),
        Err(Error::Consistency(_))
    ));

    // Empty component list.
    assert!(matches!(engine.converge(world, ground, &[], 3), Err(Error::Consistency(_))));
}

#[test]
fn test_resolution_validation() {
    let engine = seed_engine();
    let ground = engine.logos_state();
    let (world, s0) = world_state(&engine);
    engine.lock(s0).unwrap();

    let ta = engine.branch(s0, BranchSpec::new(ground, 2)).unwrap();
    engine.lock(ta).unwrap();
    let tb = engine.branch(s0, BranchSpec::new(ground, 2)).unwrap();
    engine.lock(tb).unwrap();

    let conv = engine.converge(world, ground, &[ta, tb], 3).unwrap();

    // Resolution must name a component.
    assert!(matches!(
        engine.register_resolution(conv, s0),
        Err(Error::Consistency(_))
    ));
    // A plain temporal state cannot be resolved.
    assert!(matches!(
        engine.register_resolution(ta, ta),
        Err(Error::Consistency(_))
    ));

    engine.register_resolution(conv, ta).unwrap();
    // Only once.
    assert!(matches!(
        engine.register_resolution(conv, tb),
        Err(Error::Consistency(_))
    ));
}

// ============================================================================
// NotFound / Identity
// ============================================================================

#[test]
fn test_not_found_and_identity() {
    let engine = seed_engine();
    let (_, state) = world_state(&engine);
    let hammer = engine
        .add_belief(state, BeliefSpec::new().with_label("hammer").with_base("Tool"))
        .unwrap();
    engine.lock(state).unwrap();

    assert!(matches!(engine.belief(noema_rs::BeliefId(99_999)), Err(Error::NotFound(_))));
    assert!(matches!(engine.mind(noema_rs::MindId(99_999)), Err(Error::NotFound(_))));
    assert!(matches!(
        engine.get_belief_by_label(state, "no_such_label"),
        Err(Error::NotFound(_))
    ));

    // The label exists, but not in this state.
    let other_mind = engine.create_mind(engine.logos(), Some("other")).unwrap();
    let empty = engine
        .create_state(other_mind, StateSpec::new(engine.logos_state()).at(1, 1))
        .unwrap();
    assert!(matches!(
        engine.get_belief_by_label(empty, "hammer"),
        Err(Error::Identity(_))
    ));
    let _ = hammer;
}
