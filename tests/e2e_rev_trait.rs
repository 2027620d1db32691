//! Reverse trait lookups: who references me, across base chains, tracks
//! overlays and convergence components.

use noema_rs::schema::{ArchetypeDef, SchemaDef, TraittypeDef, ValueKind};
use noema_rs::{BeliefSpec, Engine, MindScope, StateSpec, Value};
use pretty_assertions::assert_eq;

fn seed_engine() -> Engine {
    let engine = Engine::new();
    engine
        .register(
            SchemaDef::new()
                .with_traittype(TraittypeDef::new("description", ValueKind::Str))
                .with_traittype(
                    TraittypeDef::new("location", ValueKind::Subject).scope(MindScope::Own),
                )
                .with_traittype(
                    TraittypeDef::new("contents", ValueKind::Subject).container().composable(),
                )
                .with_archetype(ArchetypeDef::new("Location"))
                .with_archetype(ArchetypeDef::new("Person")),
        )
        .unwrap();
    engine
}

// ============================================================================
// Scalar Subject references
// ============================================================================

#[test]
fn test_rev_trait_scalar_subject() {
    let engine = seed_engine();
    let world = engine.create_mind(engine.logos(), Some("world")).unwrap();
    let state = engine.create_state(world, StateSpec::new(engine.logos_state()).at(1, 1)).unwrap();

    let village = engine
        .add_belief(state, BeliefSpec::new().with_label("village").with_base("Location"))
        .unwrap();
    let village_sid = engine.belief(village).unwrap().sid;
    let alice = engine
        .add_belief(
            state,
            BeliefSpec::new()
                .with_label("alice")
                .with_base("Person")
                .with_trait("location", Value::Subject(village_sid)),
        )
        .unwrap();
    let bob = engine
        .add_belief(
            state,
            BeliefSpec::new()
                .with_label("bob")
                .with_base("Person")
                .with_trait("location", Value::Subject(village_sid)),
        )
        .unwrap();
    engine.lock(state).unwrap();

    assert_eq!(engine.rev_trait(state, village, "location").unwrap(), vec![alice, bob]);
    assert_eq!(engine.rev_trait(state, alice, "location").unwrap(), Vec::<noema_rs::BeliefId>::new());
}

// ============================================================================
// Container membership counts as referencing
// ============================================================================

#[test]
fn test_rev_trait_in_container() {
    let engine = seed_engine();
    let world = engine.create_mind(engine.logos(), Some("world")).unwrap();
    let state = engine.create_state(world, StateSpec::new(engine.logos_state()).at(1, 1)).unwrap();

    let gem = engine
        .add_belief(state, BeliefSpec::new().with_label("gem"))
        .unwrap();
    let gem_sid = engine.belief(gem).unwrap().sid;
    let chest = engine
        .add_belief(
            state,
            BeliefSpec::new()
                .with_label("chest")
                .with_trait("contents", Value::List(vec![Value::Subject(gem_sid)])),
        )
        .unwrap();
    engine.lock(state).unwrap();

    assert_eq!(engine.rev_trait(state, gem, "contents").unwrap(), vec![chest]);
}

// ============================================================================
// Cyclic references resolve through subjects, not ownership
// ============================================================================

#[test]
fn test_rev_trait_cycle() {
    let engine = seed_engine();
    let world = engine.create_mind(engine.logos(), Some("world")).unwrap();
    let state = engine.create_state(world, StateSpec::new(engine.logos_state()).at(1, 1)).unwrap();

    let room1 = engine
        .add_belief(state, BeliefSpec::new().with_label("room1").with_base("Location"))
        .unwrap();
    let room1_sid = engine.belief(room1).unwrap().sid;
    let room2 = engine
        .add_belief(
            state,
            BeliefSpec::new()
                .with_label("room2")
                .with_base("Location")
                .with_trait("location", Value::Subject(room1_sid)),
        )
        .unwrap();
    let room2_sid = engine.belief(room2).unwrap().sid;
    // Close the cycle on a new version of room1.
    let room1b = engine
        .replace(state, room1, &[("location".to_string(), Value::Subject(room2_sid))])
        .unwrap();
    engine.lock(state).unwrap();

    assert_eq!(engine.rev_trait(state, room1b, "location").unwrap(), vec![room2]);
    assert_eq!(engine.rev_trait(state, room2, "location").unwrap(), vec![room1b]);
}

// ============================================================================
// The village seen through two knowledge systems at once
// ============================================================================

#[test]
fn test_rev_trait_across_convergence() {
    let engine = seed_engine();
    let ground_mind = engine.create_mind(engine.logos(), Some("world")).unwrap();
    let ground = engine
        .create_state(ground_mind, StateSpec::new(engine.logos_state()).at(1, 1))
        .unwrap();
    let village = engine
        .add_belief(ground, BeliefSpec::new().with_label("village").with_base("Location"))
        .unwrap();
    let village_sid = engine.belief(village).unwrap().sid;
    engine.lock(ground).unwrap();

    // Two observers, each with their own knowledge belief about the
    // same ground subject.
    let villager = engine.create_mind(ground_mind, Some("villager")).unwrap();
    let vs = engine.create_state(villager, StateSpec::new(ground)).unwrap();
    let vk = engine
        .add_belief(
            vs,
            BeliefSpec::new()
                .with_trait("@about", Value::Subject(village_sid))
                .with_trait("description", "where villagers live"),
        )
        .unwrap();
    engine.lock(vs).unwrap();

    let blacksmith = engine.create_mind(ground_mind, Some("blacksmith")).unwrap();
    let bs = engine.create_state(blacksmith, StateSpec::new(ground)).unwrap();
    let bk = engine
        .add_belief(
            bs,
            BeliefSpec::new()
                .with_trait("@about", Value::Subject(village_sid))
                .with_trait("description", "where the forge is"),
        )
        .unwrap();
    engine.lock(bs).unwrap();

    let composite = engine.create_mind(ground_mind, Some("composite")).unwrap();
    let conv = engine.converge(composite, ground, &[vs, bs], 2).unwrap();

    let mut found = engine.rev_trait(conv, village, "@about").unwrap();
    found.sort();
    let mut expected = vec![vk, bk];
    expected.sort();
    assert_eq!(found, expected);
}

// ============================================================================
// rev_trait sees through tracks overlays
// ============================================================================

#[test]
fn test_rev_trait_through_tracks() {
    let engine = seed_engine();
    let world = engine.create_mind(engine.logos(), Some("world")).unwrap();
    let core = engine.create_state(world, StateSpec::new(engine.logos_state()).at(1, 1)).unwrap();

    let village = engine
        .add_belief(core, BeliefSpec::new().with_label("village").with_base("Location"))
        .unwrap();
    let village_sid = engine.belief(village).unwrap().sid;
    let alice = engine
        .add_belief(
            core,
            BeliefSpec::new()
                .with_label("alice")
                .with_base("Person")
                .with_trait("location", Value::Subject(village_sid)),
        )
        .unwrap();
    engine.lock(core).unwrap();

    let overlay_mind = engine.create_mind(engine.logos(), Some("overlay")).unwrap();
    let overlay = engine
        .create_state(overlay_mind, StateSpec::new(engine.logos_state()).at(1, 1).with_tracks(core))
        .unwrap();
    engine.lock(overlay).unwrap();

    assert_eq!(engine.rev_trait(overlay, village, "location").unwrap(), vec![alice]);
}
