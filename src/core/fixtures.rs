// =============================================================================
// FIXTURES — Data models de test sur le backend mémoire
// =============================================================================
//
//   flights ──origin──▶ airports(faa)
//      │
//      └──carrier──▶ airlines(carrier)
//
//   weather   (aucune clé)
//
//   chain : a ◀── b ◀── c
//
// =============================================================================

use std::sync::Arc;

use crate::backend::memory::{Frame, MemHandle, MemoryBackend};
use crate::core::model::DataModel;
use crate::core::value::{BaseType, Value};

pub type MemModel = DataModel<MemoryBackend>;

pub fn frame(columns: &[(&str, BaseType)], rows: Vec<Vec<Value>>) -> Frame {
    Frame::from_rows(columns, rows).unwrap()
}

/// Le data model des vols, stocké dans un backend neuf.
pub fn flights() -> (Arc<MemoryBackend>, MemModel) {
    let backend = Arc::new(MemoryBackend::new());

    let airports = backend
        .create_table(
            "airports",
            frame(
                &[("faa", BaseType::String), ("name", BaseType::String)],
                vec![
                    vec!["JFK".into(), "John F Kennedy Intl".into()],
                    vec!["LGA".into(), "La Guardia".into()],
                    vec!["EWR".into(), "Newark Liberty Intl".into()],
                ],
            ),
        )
        .unwrap();
    let airlines = backend
        .create_table(
            "airlines",
            frame(
                &[("carrier", BaseType::String), ("name", BaseType::String)],
                vec![
                    vec!["UA".into(), "United Air Lines Inc.".into()],
                    vec!["AA".into(), "American Airlines Inc.".into()],
                    vec!["DL".into(), "Delta Air Lines Inc.".into()],
                ],
            ),
        )
        .unwrap();
    let flights = backend
        .create_table(
            "flights",
            frame(
                &[
                    ("id", BaseType::Integer),
                    ("month", BaseType::Integer),
                    ("carrier", BaseType::String),
                    ("origin", BaseType::String),
                ],
                vec![
                    vec![1.into(), 5.into(), "UA".into(), "JFK".into()],
                    vec![2.into(), 5.into(), "DL".into(), "JFK".into()],
                    vec![3.into(), 6.into(), "AA".into(), "JFK".into()],
                    vec![4.into(), 5.into(), "DL".into(), "LGA".into()],
                    vec![5.into(), 6.into(), "UA".into(), "EWR".into()],
                    vec![6.into(), 5.into(), "AA".into(), "LGA".into()],
                ],
            ),
        )
        .unwrap();
    let weather = backend
        .create_table(
            "weather",
            frame(
                &[("origin", BaseType::String), ("month", BaseType::Integer), ("temp", BaseType::Float)],
                vec![
                    vec!["JFK".into(), 5.into(), 61.5.into()],
                    vec!["LGA".into(), 5.into(), 62.0.into()],
                    vec!["EWR".into(), 6.into(), Value::Null],
                ],
            ),
        )
        .unwrap();

    let dm = DataModel::new(Arc::clone(&backend))
        .with_table("airports", airports)
        .and_then(|dm| dm.with_table("airlines", airlines))
        .and_then(|dm| dm.with_table("flights", flights))
        .and_then(|dm| dm.with_table("weather", weather))
        .and_then(|dm| dm.with_primary_key("airports", &["faa"]))
        .and_then(|dm| dm.with_primary_key("airlines", &["carrier"]))
        .and_then(|dm| dm.with_primary_key("flights", &["id"]))
        .and_then(|dm| dm.with_foreign_key("flights", &["origin"], "airports", &["faa"]))
        .and_then(|dm| dm.with_foreign_key("flights", &["carrier"], "airlines", &["carrier"]))
        .unwrap();
    (backend, dm)
}

/// Un model source sur le même backend, avec les tables données.
///
/// Chaque table reprend la clé primaire de `like` quand ses colonnes la
/// contiennent.
pub fn model_of(backend: &Arc<MemoryBackend>, like: &MemModel, tables: &[(&str, MemHandle)]) -> MemModel {
    let mut dm = DataModel::new(Arc::clone(backend));
    for (name, h) in tables {
        dm = dm.with_table(name, h.clone()).unwrap();
        let def = dm.graph().table(name).unwrap().clone();
        if let Some(target) = like.graph().table(name) {
            if target.has_primary_key() && target.primary_key.iter().all(|c| def.has_column(c)) {
                let pk: Vec<&str> = target.primary_key.iter().map(String::as_str).collect();
                dm = dm.with_primary_key(name, &pk).unwrap();
            }
        }
    }
    dm
}

/// Une nouvelle compagnie et un vol qui l'utilise.
pub fn new_carrier_source(backend: &Arc<MemoryBackend>, like: &MemModel) -> MemModel {
    let airlines = backend.literal(frame(
        &[("carrier", BaseType::String), ("name", BaseType::String)],
        vec![vec!["B6".into(), "JetBlue Airways".into()]],
    ));
    let flights = backend.literal(frame(
        &[
            ("id", BaseType::Integer),
            ("month", BaseType::Integer),
            ("carrier", BaseType::String),
            ("origin", BaseType::String),
        ],
        vec![vec![7.into(), 5.into(), "B6".into(), "JFK".into()]],
    ));
    model_of(backend, like, &[("flights", flights), ("airlines", airlines)])
}

/// a ◀ b ◀ c, avec une clé étrangère nulle dans c.
pub fn chain() -> (Arc<MemoryBackend>, MemModel) {
    let backend = Arc::new(MemoryBackend::new());
    let a = backend
        .create_table("a", frame(&[("id", BaseType::Integer)], vec![vec![1.into()], vec![2.into()], vec![3.into()]]))
        .unwrap();
    let b = backend
        .create_table(
            "b",
            frame(
                &[("id", BaseType::Integer), ("a_id", BaseType::Integer)],
                vec![
                    vec![10.into(), 1.into()],
                    vec![20.into(), 2.into()],
                    vec![30.into(), 3.into()],
                    vec![40.into(), 1.into()],
                ],
            ),
        )
        .unwrap();
    let c = backend
        .create_table(
            "c",
            frame(
                &[("id", BaseType::Integer), ("b_id", BaseType::Integer)],
                vec![
                    vec![100.into(), 10.into()],
                    vec![200.into(), 20.into()],
                    vec![300.into(), 40.into()],
                    vec![400.into(), 30.into()],
                    vec![500.into(), Value::Null],
                ],
            ),
        )
        .unwrap();

    let dm = DataModel::new(Arc::clone(&backend))
        .with_table("a", a)
        .and_then(|dm| dm.with_table("b", b))
        .and_then(|dm| dm.with_table("c", c))
        .and_then(|dm| dm.with_primary_key("a", &["id"]))
        .and_then(|dm| dm.with_primary_key("b", &["id"]))
        .and_then(|dm| dm.with_primary_key("c", &["id"]))
        .and_then(|dm| dm.with_foreign_key("b", &["a_id"], "a", &["id"]))
        .and_then(|dm| dm.with_foreign_key("c", &["b_id"], "b", &["id"]))
        .unwrap();
    (backend, dm)
}
