//! Deterministic JSON codec: save a mind tree, load it back with ids
//! preserved.
//!
//! The wire format is id-referential — beliefs name their bases by
//! archetype label or belief id, states name `base`/`ground_state`/
//! `tracks`/`components` by id — so decoding is a two-pass affair:
//! allocate every shell first, then finalize traits and resolve every
//! reference. Entities that already exist in the engine (the bootstrap
//! world, shared Eidos prototypes) are merged by id and skipped.
//!
//! Output is deterministic: `serde_json::Map` keeps keys sorted and all
//! lists are emitted in ownership order.

use std::io::Write;

use serde_json::{json, Map, Value as Json};
use tracing::debug;

use crate::model::{
    Base, Belief, BeliefId, Fuzzy, FuzzyAlt, Mind, MindId, MindKind, Promotion, Sid, State,
    StateId, StateKind, Subject, Value,
};
use crate::store::Store;
use crate::{Error, Result};

// ============================================================================
// Save
// ============================================================================

pub fn save_mind(store: &Store, mind: MindId) -> Result<Json> {
    let m = store.mind(mind)?;

    let mut beliefs = Vec::with_capacity(m.beliefs.len());
    for bid in &m.beliefs {
        beliefs.push(belief_json(store, store.belief(*bid)?)?);
    }

    let mut states = Vec::with_capacity(m.states.len());
    for sid in &m.states {
        states.push(state_json(store.state(*sid)?));
    }

    let mut out = Map::new();
    out.insert("_type".into(), json!(m.kind.type_name()));
    out.insert("_id".into(), json!(m.id.0));
    out.insert("label".into(), json!(m.label));
    out.insert("belief".into(), Json::Array(beliefs));
    out.insert("state".into(), Json::Array(states));

    if !m.children.is_empty() {
        let mut nested = Vec::with_capacity(m.children.len());
        for child in &m.children {
            nested.push(save_mind(store, *child)?);
        }
        out.insert("nested_minds".into(), Json::Array(nested));
    }

    Ok(Json::Object(out))
}

/// Writer variant of [`save_mind`], pretty-printed.
pub fn save_mind_to_writer(store: &Store, mind: MindId, writer: &mut dyn Write) -> Result<()> {
    let json = save_mind(store, mind)?;
    serde_json::to_writer_pretty(&mut *writer, &json)
        .map_err(|e| Error::Codec(e.to_string()))?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Serialize one belief the way it appears inside a mind dump.
pub fn belief_to_json(store: &Store, id: BeliefId) -> Result<Json> {
    belief_json(store, store.belief(id)?)
}

/// Serialize one state the way it appears inside a mind dump.
pub fn state_to_json(store: &Store, id: StateId) -> Result<Json> {
    Ok(state_json(store.state(id)?))
}

fn belief_json(store: &Store, belief: &Belief) -> Result<Json> {
    let mut archetypes = Vec::new();
    let mut bases = Vec::new();
    for base in &belief.bases {
        match base {
            Base::Archetype(a) => {
                let label = store.schema.archetype(*a)?.label.clone();
                archetypes.push(json!(label.clone()));
                bases.push(json!(label));
            }
            Base::Belief(b) => bases.push(json!(b.0)),
        }
    }

    let mut traits = Map::new();
    for (tid, value) in &belief.traits {
        let label = store.schema.traittype(*tid)?.label.clone();
        traits.insert(label, value_json(store, value)?);
    }

    let mut out = Map::new();
    out.insert("_type".into(), json!("Belief"));
    out.insert("_id".into(), json!(belief.id.0));
    out.insert("sid".into(), json!(belief.sid.0));
    out.insert("label".into(), json!(belief.label));
    out.insert("archetypes".into(), Json::Array(archetypes));
    out.insert("bases".into(), Json::Array(bases));
    out.insert("traits".into(), Json::Object(traits));
    out.insert(
        "origin_state".into(),
        belief.origin_state.map(|s| json!(s.0)).unwrap_or(Json::Null),
    );
    if !belief.promotions.is_empty() {
        out.insert(
            "promotions".into(),
            Json::Array(
                belief
                    .promotions
                    .iter()
                    .map(|p| json!({"certainty": p.certainty, "belief": p.belief.0}))
                    .collect(),
            ),
        );
    }
    if let Some(resolution) = belief.resolution {
        out.insert("resolution".into(), json!(resolution.0));
    }
    Ok(Json::Object(out))
}

fn state_json(state: &State) -> Json {
    let mut out = Map::new();
    out.insert("_type".into(), json!(state.type_name()));
    out.insert("_id".into(), json!(state.id.0));
    out.insert("tt".into(), json!(state.tt));
    out.insert("vt".into(), json!(state.vt));
    out.insert("certainty".into(), json!(state.certainty));
    out.insert("base".into(), state.base.map(|s| json!(s.0)).unwrap_or(Json::Null));
    out.insert(
        "ground_state".into(),
        state.ground_state.map(|s| json!(s.0)).unwrap_or(Json::Null),
    );
    out.insert(
        "self".into(),
        state.self_subject.map(|s| json!(s.0)).unwrap_or(Json::Null),
    );
    out.insert(
        "insert".into(),
        Json::Array(state.insert.iter().map(|b| json!(b.0)).collect()),
    );
    out.insert(
        "remove".into(),
        Json::Array(state.remove.iter().map(|b| json!(b.0)).collect()),
    );
    match &state.kind {
        StateKind::Temporal { tracks } => {
            out.insert("tracks".into(), tracks.map(|s| json!(s.0)).unwrap_or(Json::Null));
        }
        StateKind::Timeless => {}
        StateKind::Convergence { components, resolution } => {
            out.insert(
                "components".into(),
                Json::Array(components.iter().map(|s| json!(s.0)).collect()),
            );
            out.insert(
                "resolution".into(),
                resolution.map(|s| json!(s.0)).unwrap_or(Json::Null),
            );
        }
    }
    Json::Object(out)
}

fn value_json(store: &Store, value: &Value) -> Result<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::Str(s) => json!(s),
        Value::Subject(s) => json!({"_type": "Subject", "_id": s.0}),
        Value::State(s) => json!({"_type": "State", "_id": s.0}),
        Value::Mind(m) => {
            let label = store.mind(*m)?.label.clone();
            json!({"_type": "Mind", "_id": m.0, "label": label})
        }
        Value::Archetype(a) => {
            json!({"_type": "Archetype", "label": store.schema.archetype(*a)?.label})
        }
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(value_json(store, item)?);
            }
            Json::Array(out)
        }
        Value::Fuzzy(fuzzy) => {
            let mut alts = Vec::with_capacity(fuzzy.alternatives.len());
            for alt in &fuzzy.alternatives {
                alts.push(json!({
                    "value": value_json(store, &alt.value)?,
                    "certainty": alt.certainty,
                }));
            }
            json!({"_type": "Fuzzy", "alternatives": alts})
        }
    })
}

// ============================================================================
// Load
// ============================================================================

/// Two-pass decode into the store. Requires the schema to be registered:
/// archetype and traittype labels in the dump must resolve.
///
/// Every loaded state (and its inserted beliefs) is locked — a loaded
/// mind is a snapshot; life continues by branching.
pub fn load(store: &mut Store, json: &Json) -> Result<MindId> {
    let mut loaded_states: Vec<StateId> = Vec::new();
    let mut loaded_beliefs: Vec<(BeliefId, Json)> = Vec::new();

    let root = alloc_mind(store, json, None, &mut loaded_states, &mut loaded_beliefs)?;

    // Pass 2: finalize belief payloads and verify every state reference.
    for (bid, payload) in &loaded_beliefs {
        finalize_belief(store, *bid, payload)?;
    }
    for sid in &loaded_states {
        finalize_state(store, *sid)?;
    }
    for sid in loaded_states {
        store.lock_state(sid)?;
    }
    debug!(mind = %root, beliefs = loaded_beliefs.len(), "mind loaded");
    Ok(root)
}

/// Parse a JSON string and load it.
pub fn load_str(store: &mut Store, input: &str) -> Result<MindId> {
    let json: Json = serde_json::from_str(input).map_err(|e| Error::Codec(e.to_string()))?;
    load(store, &json)
}

fn alloc_mind(
    store: &mut Store,
    json: &Json,
    parent: Option<MindId>,
    loaded_states: &mut Vec<StateId>,
    loaded_beliefs: &mut Vec<(BeliefId, Json)>,
) -> Result<MindId> {
    let obj = expect_object(json, "mind")?;
    let id = MindId(expect_u64(obj, "_id")?);
    let kind = match expect_str(obj, "_type")? {
        "Logos" => MindKind::Logos,
        "Eidos" => MindKind::Eidos,
        "Mind" | "Materia" => MindKind::Materia,
        other => return Err(Error::Codec(format!("unknown mind type '{other}'"))),
    };
    store.ids.advance_past(id.0);

    if let Ok(existing) = store.mind(id) {
        if existing.kind != kind {
            return Err(Error::Codec(format!(
                "mind {id} already exists with kind {:?}",
                existing.kind
            )));
        }
    } else {
        if kind != MindKind::Materia {
            return Err(Error::Codec(format!(
                "{} {id} does not match this engine's bootstrap world",
                kind.type_name()
            )));
        }
        // A loaded snapshot attaches under its serialized parent, or
        // Logos when it arrives as the top-level object.
        let parent = parent.unwrap_or(store.logos);
        let label = opt_str(obj, "label");
        let mut mind = Mind::new(id, kind, label, Some(parent));
        mind.origin_state = None;
        store.minds.insert(id, mind);
        store.mind_mut(parent)?.children.push(id);
    }

    for belief in expect_array(obj, "belief")? {
        alloc_belief(store, belief, id, loaded_beliefs)?;
    }
    for state in expect_array(obj, "state")? {
        alloc_state(store, state, id, loaded_states)?;
    }

    if let Some(nested) = obj.get("nested_minds") {
        for child in nested.as_array().into_iter().flatten() {
            alloc_mind(store, child, Some(id), loaded_states, loaded_beliefs)?;
        }
    }
    Ok(id)
}

fn alloc_belief(
    store: &mut Store,
    json: &Json,
    mind: MindId,
    loaded_beliefs: &mut Vec<(BeliefId, Json)>,
) -> Result<()> {
    let obj = expect_object(json, "belief")?;
    let id = BeliefId(expect_u64(obj, "_id")?);
    let sid = Sid(expect_u64(obj, "sid")?);
    store.ids.advance_past(id.0);
    store.ids.advance_past(sid.0);

    if store.belief(id).is_ok() {
        return Ok(());
    }

    let label = opt_str(obj, "label");
    if !store.subjects.contains_key(&sid) {
        store.subjects.insert(sid, Subject::new(sid, label.clone(), mind));
        if let Some(l) = &label {
            store.subjects_by_label.entry(l.clone()).or_insert(sid);
        }
    }

    let origin_state = opt_u64(obj, "origin_state").map(StateId);
    let belief = Belief {
        id,
        sid,
        label,
        in_mind: mind,
        origin_state,
        bases: smallvec::SmallVec::new(),
        traits: hashbrown::HashMap::new(),
        promotions: Vec::new(),
        resolution: None,
        locked: false,
    };
    store.beliefs.insert(id, belief);
    store.mind_mut(mind)?.beliefs.push(id);
    loaded_beliefs.push((id, json.clone()));
    Ok(())
}

fn alloc_state(
    store: &mut Store,
    json: &Json,
    mind: MindId,
    loaded_states: &mut Vec<StateId>,
) -> Result<()> {
    let obj = expect_object(json, "state")?;
    let id = StateId(expect_u64(obj, "_id")?);
    store.ids.advance_past(id.0);

    if store.state(id).is_ok() {
        return Ok(());
    }

    let kind = match expect_str(obj, "_type")? {
        "Temporal" => StateKind::Temporal { tracks: opt_u64(obj, "tracks").map(StateId) },
        "Timeless" => StateKind::Timeless,
        "Convergence" => StateKind::Convergence {
            components: expect_array(obj, "components")?
                .iter()
                .map(|c| Ok(StateId(as_u64(c, "component")?)))
                .collect::<Result<Vec<_>>>()?,
            resolution: opt_u64(obj, "resolution").map(StateId),
        },
        other => return Err(Error::Codec(format!("unknown state type '{other}'"))),
    };

    let mut insert = Vec::new();
    for b in expect_array(obj, "insert")? {
        insert.push(BeliefId(as_u64(b, "insert entry")?));
    }
    let mut remove = Vec::new();
    for b in expect_array(obj, "remove")? {
        remove.push(BeliefId(as_u64(b, "remove entry")?));
    }

    let ground_state = opt_u64(obj, "ground_state").map(StateId);
    let state = State {
        id,
        mind,
        kind,
        tt: opt_i64(obj, "tt"),
        vt: opt_i64(obj, "vt"),
        certainty: obj.get("certainty").and_then(Json::as_f64).unwrap_or(1.0),
        base: opt_u64(obj, "base").map(StateId),
        ground_state,
        self_subject: opt_u64(obj, "self").map(Sid),
        insert,
        remove,
        locked: false,
    };
    store.states.insert(id, state);

    let m = store.mind_mut(mind)?;
    m.states.push(id);
    m.states_by_ground.entry(ground_state).or_default().push(id);
    if m.origin_state.is_none() {
        m.origin_state = Some(id);
    }
    loaded_states.push(id);
    Ok(())
}

fn finalize_belief(store: &mut Store, id: BeliefId, json: &Json) -> Result<()> {
    let obj = expect_object(json, "belief")?;

    let mut bases = smallvec::SmallVec::new();
    for base in expect_array(obj, "bases")? {
        match base {
            Json::String(label) => {
                bases.push(Base::Archetype(store.schema.archetype_by_label(label)?.id));
            }
            Json::Number(_) => {
                let bid = BeliefId(as_u64(base, "base")?);
                store.belief(bid)?;
                bases.push(Base::Belief(bid));
            }
            other => {
                return Err(Error::Codec(format!("belief base must be label or id, got {other}")));
            }
        }
    }

    let mut traits = hashbrown::HashMap::new();
    if let Some(Json::Object(map)) = obj.get("traits") {
        for (label, raw) in map {
            let tt = store.schema.traittype_by_label(label)?.clone();
            let value = value_from_json(store, raw)?;
            tt.admits(&value)?;
            traits.insert(tt.id, value);
        }
    }

    let mut promotions = Vec::new();
    if let Some(Json::Array(raw)) = obj.get("promotions") {
        for p in raw {
            let pobj = expect_object(p, "promotion")?;
            promotions.push(Promotion {
                certainty: pobj
                    .get("certainty")
                    .and_then(Json::as_f64)
                    .ok_or_else(|| Error::Codec("promotion without certainty".into()))?,
                belief: BeliefId(expect_u64(pobj, "belief")?),
            });
        }
    }
    let resolution = opt_u64(obj, "resolution").map(BeliefId);

    // Forward references inside promotions/resolution must exist now
    // that every shell is allocated.
    for p in &promotions {
        store.belief(p.belief)?;
    }
    if let Some(r) = resolution {
        store.belief(r)?;
    }

    let belief = store.belief_mut(id)?;
    belief.bases = bases;
    belief.traits = traits;
    belief.promotions = promotions;
    belief.resolution = resolution;
    Ok(())
}

/// Verify every reference a loaded state carries.
fn finalize_state(store: &Store, id: StateId) -> Result<()> {
    let state = store.state(id)?;
    if let Some(base) = state.base {
        store.state(base)?;
    }
    if let Some(ground) = state.ground_state {
        store.state(ground)?;
    }
    if let Some(tracks) = state.tracks() {
        store.state(tracks)?;
    }
    for c in state.components() {
        store.state(*c)?;
    }
    if let Some(resolution) = state.resolution() {
        if !state.components().contains(&resolution) {
            return Err(Error::Codec(format!(
                "state {id}: resolution {resolution} is not a component"
            )));
        }
    }
    for b in state.insert.iter().chain(state.remove.iter()) {
        store.belief(*b)?;
    }
    Ok(())
}

fn value_from_json(store: &Store, json: &Json) -> Result<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().ok_or_else(|| Error::Codec(format!("bad number {n}")))?)
            }
        }
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(value_from_json(store, item)?);
            }
            Value::List(out)
        }
        Json::Object(obj) => match expect_str(obj, "_type")? {
            "Subject" => Value::Subject(Sid(expect_u64(obj, "_id")?)),
            "State" => Value::State(StateId(expect_u64(obj, "_id")?)),
            "Mind" => Value::Mind(MindId(expect_u64(obj, "_id")?)),
            "Archetype" => Value::Archetype(
                store.schema.archetype_by_label(expect_str(obj, "label")?)?.id,
            ),
            "Fuzzy" => {
                let mut alternatives = Vec::new();
                if let Some(Json::Array(alts)) = obj.get("alternatives") {
                    for alt in alts {
                        let aobj = expect_object(alt, "fuzzy alternative")?;
                        alternatives.push(FuzzyAlt {
                            certainty: aobj
                                .get("certainty")
                                .and_then(Json::as_f64)
                                .ok_or_else(|| Error::Codec("alternative without certainty".into()))?,
                            value: value_from_json(
                                store,
                                aobj.get("value")
                                    .ok_or_else(|| Error::Codec("alternative without value".into()))?,
                            )?,
                        });
                    }
                }
                Value::Fuzzy(Fuzzy { alternatives })
            }
            other => return Err(Error::Codec(format!("unknown value type '{other}'"))),
        },
    })
}

// ============================================================================
// JSON helpers
// ============================================================================

fn expect_object<'a>(json: &'a Json, what: &str) -> Result<&'a Map<String, Json>> {
    json.as_object().ok_or_else(|| Error::Codec(format!("expected {what} object")))
}

fn expect_array<'a>(obj: &'a Map<String, Json>, key: &str) -> Result<&'a Vec<Json>> {
    obj.get(key)
        .and_then(Json::as_array)
        .ok_or_else(|| Error::Codec(format!("missing array field '{key}'")))
}

fn expect_str<'a>(obj: &'a Map<String, Json>, key: &str) -> Result<&'a str> {
    obj.get(key)
        .and_then(Json::as_str)
        .ok_or_else(|| Error::Codec(format!("missing string field '{key}'")))
}

fn expect_u64(obj: &Map<String, Json>, key: &str) -> Result<u64> {
    obj.get(key)
        .and_then(Json::as_u64)
        .ok_or_else(|| Error::Codec(format!("missing integer field '{key}'")))
}

fn as_u64(json: &Json, what: &str) -> Result<u64> {
    json.as_u64().ok_or_else(|| Error::Codec(format!("{what} must be an integer")))
}

fn opt_u64(obj: &Map<String, Json>, key: &str) -> Option<u64> {
    obj.get(key).and_then(Json::as_u64)
}

fn opt_i64(obj: &Map<String, Json>, key: &str) -> Option<i64> {
    obj.get(key).and_then(Json::as_i64)
}

fn opt_str(obj: &Map<String, Json>, key: &str) -> Option<String> {
    obj.get(key).and_then(Json::as_str).map(str::to_owned)
}
