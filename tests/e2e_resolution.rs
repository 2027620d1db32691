//! Trait resolution end to end: archetype defaults, base-chain
//! inheritance, null blocks, promotions, enumeration order and purity.

use noema_rs::schema::{ArchetypeDef, SchemaDef, TraittypeDef, ValueKind};
use noema_rs::{BeliefSpec, Engine, Fuzzy, StateSpec, Value};
use pretty_assertions::assert_eq;

fn seed_engine() -> Engine {
    let engine = Engine::new();
    engine
        .register(
            SchemaDef::new()
                .with_traittype(TraittypeDef::new("color", ValueKind::Str))
                .with_traittype(TraittypeDef::new("weight", ValueKind::Num))
                .with_traittype(TraittypeDef::new("material", ValueKind::Str))
                .with_archetype(ArchetypeDef::new("Thing").with_trait("material", "wood"))
                .with_archetype(
                    ArchetypeDef::new("Tool")
                        .with_base("Thing")
                        .with_trait("color", "gray")
                        .with_slot("weight"),
                )
                .with_archetype(
                    ArchetypeDef::new("Weapon").with_base("Thing").with_trait("color", "black"),
                ),
        )
        .unwrap();
    engine
}

fn world_state(engine: &Engine) -> (noema_rs::MindId, noema_rs::StateId) {
    let world = engine.create_mind(engine.logos(), Some("world")).unwrap();
    let state = engine
        .create_state(world, StateSpec::new(engine.logos_state()).at(1, 1))
        .unwrap();
    (world, state)
}

// ============================================================================
// 1. Archetype defaults are inherited, own traits override
// ============================================================================

#[test]
fn test_archetype_default_and_override() {
    let engine = seed_engine();
    let (_, state) = world_state(&engine);

    let hammer = engine
        .add_belief(state, BeliefSpec::new().with_label("hammer").with_base("Tool"))
        .unwrap();
    let chisel = engine
        .add_belief(
            state,
            BeliefSpec::new().with_label("chisel").with_base("Tool").with_trait("color", "silver"),
        )
        .unwrap();
    engine.lock(state).unwrap();

    assert_eq!(engine.get_trait(state, hammer, "color").unwrap(), Some(Value::from("gray")));
    // Inherited through the archetype DAG, two levels up.
    assert_eq!(engine.get_trait(state, hammer, "material").unwrap(), Some(Value::from("wood")));
    assert_eq!(engine.get_trait(state, chisel, "color").unwrap(), Some(Value::from("silver")));
    // Declared slot with no default anywhere: undefined, not null.
    assert_eq!(engine.get_trait(state, hammer, "weight").unwrap(), None);
}

// ============================================================================
// 2. First defining base wins, breadth-first in declaration order
// ============================================================================

#[test]
fn test_first_wins_order() {
    let engine = seed_engine();
    let (_, state) = world_state(&engine);

    // Tool declares color=gray, Weapon declares color=black; Tool first.
    let hybrid = engine
        .add_belief(
            state,
            BeliefSpec::new().with_label("warhammer").with_base("Tool").with_base("Weapon"),
        )
        .unwrap();
    engine.lock(state).unwrap();

    assert_eq!(engine.get_trait(state, hybrid, "color").unwrap(), Some(Value::from("gray")));
    assert_eq!(
        engine.get_archetypes(hybrid).unwrap(),
        vec!["Tool".to_string(), "Weapon".to_string(), "Thing".to_string()]
    );
}

// ============================================================================
// 3. Explicit null blocks inheritance at the declaring belief
// ============================================================================

#[test]
fn test_null_blocks_inheritance() {
    let engine = seed_engine();
    let (_, state) = world_state(&engine);

    let blank = engine
        .add_belief(
            state,
            BeliefSpec::new().with_label("blank").with_base("Tool").with_trait("color", Value::Null),
        )
        .unwrap();
    engine.lock(state).unwrap();

    assert_eq!(engine.get_trait(state, blank, "color").unwrap(), Some(Value::Null));
}

// ============================================================================
// 4. Belief bases: prototype inheritance through other beliefs
// ============================================================================

#[test]
fn test_belief_base_chain() {
    let engine = seed_engine();
    let (_, state) = world_state(&engine);

    let prototype = engine
        .add_belief(
            state,
            BeliefSpec::new().with_label("proto").with_base("Tool").with_trait("color", "green"),
        )
        .unwrap();
    let instance = engine
        .add_belief(state, BeliefSpec::new().with_label("instance").with_base(prototype))
        .unwrap();
    engine.lock(state).unwrap();

    assert_eq!(engine.get_trait(state, instance, "color").unwrap(), Some(Value::from("green")));
    assert_eq!(engine.get_trait(state, instance, "material").unwrap(), Some(Value::from("wood")));
}

// ============================================================================
// 5. Promotions surface as Fuzzy when nothing closer settles the trait
// ============================================================================

#[test]
fn test_promotions_yield_fuzzy() {
    let engine = seed_engine();
    let (_, state) = world_state(&engine);

    let red = engine
        .add_belief(state, BeliefSpec::new().with_label("red_one").with_trait("color", "red"))
        .unwrap();
    let blue = engine
        .add_belief(state, BeliefSpec::new().with_label("blue_one").with_trait("color", "blue"))
        .unwrap();
    let uncertain = engine
        .add_belief(
            state,
            BeliefSpec::new()
                .with_label("uncertain")
                .with_promotion(0.7, red)
                .with_promotion(0.3, blue),
        )
        .unwrap();
    // A descendant that overrides sees no fuzz at all.
    let settled = engine
        .add_belief(
            state,
            BeliefSpec::new().with_label("settled").with_base(uncertain).with_trait("color", "green"),
        )
        .unwrap();
    engine.lock(state).unwrap();

    let resolved = engine.get_trait(state, uncertain, "color").unwrap().unwrap();
    let Value::Fuzzy(fuzzy) = resolved else {
        panic!("expected fuzzy, got {resolved:?}");
    };
    assert_eq!(fuzzy.alternatives.len(), 2);
    assert_eq!(fuzzy.alternatives[0].certainty, 0.7);
    assert_eq!(fuzzy.alternatives[0].value, Value::from("red"));
    assert_eq!(fuzzy.alternatives[1].certainty, 0.3);
    assert_eq!(fuzzy.alternatives[1].value, Value::from("blue"));

    assert_eq!(engine.get_trait(state, settled, "color").unwrap(), Some(Value::from("green")));
}

// ============================================================================
// 6. The stored unknown is the empty Fuzzy
// ============================================================================

#[test]
fn test_stored_unknown() {
    let engine = seed_engine();
    let (_, state) = world_state(&engine);

    let b = engine
        .add_belief(
            state,
            BeliefSpec::new().with_label("mystery").with_trait("color", Value::Fuzzy(Fuzzy::unknown())),
        )
        .unwrap();
    engine.lock(state).unwrap();

    assert_eq!(
        engine.get_trait(state, b, "color").unwrap(),
        Some(Value::Fuzzy(Fuzzy::unknown()))
    );
}

// ============================================================================
// 7. get_traits is dense, in registration order, consistent with get_trait
// ============================================================================

#[test]
fn test_get_traits_enumeration() {
    let engine = seed_engine();
    let (_, state) = world_state(&engine);

    let hammer = engine
        .add_belief(
            state,
            BeliefSpec::new().with_label("hammer").with_base("Tool").with_trait("weight", Value::Int(3)),
        )
        .unwrap();
    engine.lock(state).unwrap();

    let traits = engine.get_traits(state, hammer).unwrap();
    let names: Vec<&str> = traits.iter().map(|(n, _)| n.as_str()).collect();
    // Registration order: builtins first, then the user schema.
    assert_eq!(names, vec!["color", "weight", "material"]);

    for (name, value) in &traits {
        assert_eq!(engine.get_trait(state, hammer, name).unwrap().as_ref(), Some(value));
    }
}

// ============================================================================
// 8. Resolution on a locked state is pure and memoized
// ============================================================================

#[test]
fn test_resolution_is_pure() {
    let engine = seed_engine();
    let (_, state) = world_state(&engine);

    let hammer = engine
        .add_belief(state, BeliefSpec::new().with_label("hammer").with_base("Tool"))
        .unwrap();
    engine.lock(state).unwrap();

    let first = engine.get_trait(state, hammer, "color").unwrap();
    let second = engine.get_trait(state, hammer, "color").unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// 9. Mutation before lock invalidates earlier reads
// ============================================================================

#[test]
fn test_open_state_reads_track_mutation() {
    let engine = seed_engine();
    let (_, state) = world_state(&engine);

    let hammer = engine
        .add_belief(state, BeliefSpec::new().with_label("hammer").with_base("Tool"))
        .unwrap();
    assert_eq!(engine.get_trait(state, hammer, "color").unwrap(), Some(Value::from("gray")));

    let hammer2 = engine
        .replace(state, hammer, &[("color".to_string(), Value::from("red"))])
        .unwrap();
    engine.lock(state).unwrap();

    assert_eq!(engine.get_trait(state, hammer2, "color").unwrap(), Some(Value::from("red")));
    // Same subject, one visible version after replace.
    let sid = engine.belief(hammer2).unwrap().sid;
    assert_eq!(engine.belief(hammer).unwrap().sid, sid);
    assert_eq!(engine.get_beliefs_by_subject(state, sid).unwrap(), vec![hammer2]);
}
