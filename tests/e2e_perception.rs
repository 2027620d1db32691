//! Perception: recognition fast path, perceived-belief slow path, and
//! recursive learning with subject dereferencing.

use noema_rs::schema::{ArchetypeDef, SchemaDef, TraittypeDef, ValueKind};
use noema_rs::{BeliefSpec, Engine, Exposure, LearnSpec, MindScope, StateSpec, TemplateSpec, Value};
use pretty_assertions::assert_eq;

fn seed_engine() -> Engine {
    let engine = Engine::new();
    engine
        .register(
            SchemaDef::new()
                .with_traittype(TraittypeDef::new("color", ValueKind::Str).exposure(Exposure::Visual))
                .with_traittype(TraittypeDef::new("noise", ValueKind::Str).exposure(Exposure::Auditory))
                .with_traittype(TraittypeDef::new("secret", ValueKind::Str))
                .with_traittype(
                    TraittypeDef::new("location", ValueKind::Subject).scope(MindScope::Own),
                )
                .with_archetype(ArchetypeDef::new("Thing"))
                .with_archetype(ArchetypeDef::new("Location"))
                .with_archetype(ArchetypeDef::new("Person")),
        )
        .unwrap();
    engine
}

struct Ground {
    engine: Engine,
    world: noema_rs::MindId,
    ground: noema_rs::StateId,
    bell: noema_rs::BeliefId,
}

fn seed_ground() -> Ground {
    let engine = seed_engine();
    let world = engine.create_mind(engine.logos(), Some("world")).unwrap();
    let ground = engine.create_state(world, StateSpec::new(engine.logos_state()).at(1, 1)).unwrap();
    let bell = engine
        .add_belief(
            ground,
            BeliefSpec::new()
                .with_label("bell")
                .with_base("Thing")
                .with_trait("color", "bronze")
                .with_trait("noise", "ding")
                .with_trait("secret", "cracked inside"),
        )
        .unwrap();
    engine.lock(ground).unwrap();
    Ground { engine, world, ground, bell }
}

// ============================================================================
// learn_about copies requested traits onto a knowledge belief
// ============================================================================

#[test]
fn test_learn_about_copies_traits() {
    let g = seed_ground();
    let engine = &g.engine;

    let npc = engine.create_mind(g.world, Some("npc")).unwrap();
    let state = engine.create_state(npc, StateSpec::new(g.ground)).unwrap();

    let knowledge = engine
        .learn_about(state, g.bell, &LearnSpec::new().with_trait("color"))
        .unwrap();

    let bell_sid = engine.belief(g.bell).unwrap().sid;
    assert_eq!(
        engine.get_trait(state, knowledge, "@about").unwrap(),
        Some(Value::Subject(bell_sid))
    );
    assert_eq!(engine.get_trait(state, knowledge, "color").unwrap(), Some(Value::from("bronze")));
    // Not requested, not copied.
    assert_eq!(engine.get_trait(state, knowledge, "secret").unwrap(), None);

    // Learning again updates the same knowledge subject via replace.
    let knowledge2 = engine
        .learn_about(state, g.bell, &LearnSpec::new().with_trait("noise"))
        .unwrap();
    assert_eq!(engine.belief(knowledge2).unwrap().sid, engine.belief(knowledge).unwrap().sid);
    let sid = engine.belief(knowledge2).unwrap().sid;
    assert_eq!(engine.get_beliefs_by_subject(state, sid).unwrap(), vec![knowledge2]);
}

// ============================================================================
// Subject values are recursively dereferenced into local knowledge
// ============================================================================

#[test]
fn test_learn_about_dereferences_subjects() {
    let g = seed_ground();
    let engine = &g.engine;

    // Extend the world: alice stands at the village.
    let g2 = engine.branch(g.ground, noema_rs::BranchSpec::new(engine.logos_state(), 2)).unwrap();
    let village = engine
        .add_belief(g2, BeliefSpec::new().with_label("village").with_base("Location"))
        .unwrap();
    let village_sid = engine.belief(village).unwrap().sid;
    let alice = engine
        .add_belief(
            g2,
            BeliefSpec::new()
                .with_label("alice")
                .with_base("Person")
                .with_trait("location", Value::Subject(village_sid)),
        )
        .unwrap();
    engine.lock(g2).unwrap();

    let npc = engine.create_mind(g.world, Some("npc")).unwrap();
    let state = engine.create_state(npc, StateSpec::new(g2)).unwrap();

    let alice_knowledge = engine
        .learn_about(state, alice, &LearnSpec::new().with_trait("location"))
        .unwrap();

    // The copied location points at a local knowledge subject, not at
    // the ground village.
    let location = engine.get_trait(state, alice_knowledge, "location").unwrap().unwrap();
    let Value::Subject(local_sid) = location else {
        panic!("expected a subject value, got {location:?}");
    };
    assert_ne!(local_sid, village_sid);

    // That local subject is a knowledge belief about the ground village.
    let village_knowledge = engine.get_belief_by_subject(state, local_sid).unwrap();
    assert_eq!(
        engine.get_trait(state, village_knowledge, "@about").unwrap(),
        Some(Value::Subject(village_sid))
    );
}

// ============================================================================
// perceive: fast path references known entities, slow path records
// observable traits only
// ============================================================================

#[test]
fn test_perceive_fast_and_slow_paths() {
    let g = seed_ground();
    let engine = &g.engine;

    let npc = engine.create_mind(g.world, Some("npc")).unwrap();
    let state = engine.create_state(npc, StateSpec::new(g.ground)).unwrap();

    // Slow path first: the bell is unknown.
    let event = engine.perceive(state, &[g.bell], &[Exposure::Visual]).unwrap();
    let observed = engine.get_trait(state, event, "@observed").unwrap().unwrap();
    let Value::List(entries) = observed else {
        panic!("expected observed list");
    };
    assert_eq!(entries.len(), 1);
    let Value::Subject(perceived_sid) = entries[0].clone() else {
        panic!("expected subject entry");
    };

    let perceived = engine.get_belief_by_subject(state, perceived_sid).unwrap();
    // Observable through the requested modality.
    assert_eq!(engine.get_trait(state, perceived, "color").unwrap(), Some(Value::from("bronze")));
    // Wrong modality and internal traits stay unseen; identity unknown.
    assert_eq!(engine.get_trait(state, perceived, "noise").unwrap(), None);
    assert_eq!(engine.get_trait(state, perceived, "secret").unwrap(), None);
    assert_eq!(engine.get_trait(state, perceived, "@about").unwrap(), Some(Value::Null));

    // Now the npc learns the bell properly; perception recognizes it.
    let knowledge = engine.learn_about(state, g.bell, &LearnSpec::new()).unwrap();
    let event2 = engine.perceive(state, &[g.bell], &[Exposure::Visual]).unwrap();
    let observed2 = engine.get_trait(state, event2, "@observed").unwrap().unwrap();
    let Value::List(entries2) = observed2 else {
        panic!("expected observed list");
    };
    assert_eq!(entries2, vec![Value::Subject(engine.belief(knowledge).unwrap().sid)]);
}

// ============================================================================
// recognize is empty on misses, never an error
// ============================================================================

#[test]
fn test_recognize() {
    let g = seed_ground();
    let engine = &g.engine;

    let npc = engine.create_mind(g.world, Some("npc")).unwrap();
    let state = engine.create_state(npc, StateSpec::new(g.ground)).unwrap();

    assert_eq!(engine.recognize(state, g.bell).unwrap(), Vec::<noema_rs::BeliefId>::new());

    let knowledge = engine.learn_about(state, g.bell, &LearnSpec::new()).unwrap();
    assert_eq!(engine.recognize(state, g.bell).unwrap(), vec![knowledge]);
}

// ============================================================================
// Minds born from templates learn their world at birth
// ============================================================================

#[test]
fn test_create_mind_from_template() {
    let g = seed_ground();
    let engine = &g.engine;

    // The npc's body lives in the ground world.
    let g2 = engine.branch(g.ground, noema_rs::BranchSpec::new(engine.logos_state(), 2)).unwrap();
    let body = engine
        .add_belief(g2, BeliefSpec::new().with_label("npc_body").with_base("Person"))
        .unwrap();
    engine.lock(g2).unwrap();

    let npc = engine
        .create_mind_from_template(
            g2,
            body,
            TemplateSpec::new().with_label("npc").with_learn(g.bell).with_trait("color"),
        )
        .unwrap();

    let mind = engine.mind(npc).unwrap();
    assert_eq!(mind.self_subject, Some(engine.belief(body).unwrap().sid));
    let origin = mind.origin_state.unwrap();
    assert_eq!(engine.state(origin).unwrap().ground_state, Some(g2));

    let known = engine.recognize(origin, g.bell).unwrap();
    assert_eq!(known.len(), 1);
    assert_eq!(engine.get_trait(origin, known[0], "color").unwrap(), Some(Value::from("bronze")));
}
