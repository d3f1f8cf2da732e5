// =============================================================================
// DMFLOW — Point d'entrée : démonstration sur les vols de New York
// =============================================================================
//
// Ce main.rs montre un exemple complet :
//   1. Construire un data model (4 tables, 2 clés étrangères)
//   2. Filtrer airports et voir l'effet sur flights
//   3. Combiner trois filtres
//   4. Vérifier les clés
//   5. Insérer des lignes (simulation, puis pour de vrai)
//
// Usage : dmflow [config.toml]        (RUST_LOG=debug pour voir les sauts)
//
// =============================================================================

use std::sync::Arc;

use dmflow::{
    BaseType, DataModel, DmConfig, DmResult, Frame, MemoryBackend, Predicate, RowOperation, RowsOptions, TabularBackend,
    Value,
};

fn main() {
    env_logger::init();

    println!("╔══════════════════════════════════════════════════╗");
    println!("║      DMFLOW — Data models à filtres différés     ║");
    println!("╚══════════════════════════════════════════════════╝\n");

    let config = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(text) => match DmConfig::from_toml_str(&text) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("✗ {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("✗ {} : {}", path, e);
                std::process::exit(1);
            }
        },
        None => DmConfig::default(),
    };

    if let Err(e) = run(config) {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}

fn frame(columns: &[(&str, BaseType)], rows: Vec<Vec<Value>>) -> DmResult<Frame> {
    Ok(Frame::from_rows(columns, rows)?)
}

fn run(config: DmConfig) -> DmResult<()> {
    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 1 : Le data model
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 1 : Data model ═══\n");

    let backend = Arc::new(MemoryBackend::new());
    let airports = backend.create_table(
        "airports",
        frame(
            &[("faa", BaseType::String), ("name", BaseType::String)],
            vec![
                vec!["JFK".into(), "John F Kennedy Intl".into()],
                vec!["LGA".into(), "La Guardia".into()],
                vec!["EWR".into(), "Newark Liberty Intl".into()],
            ],
        )?,
    )?;
    let airlines = backend.create_table(
        "airlines",
        frame(
            &[("carrier", BaseType::String), ("name", BaseType::String)],
            vec![
                vec!["UA".into(), "United Air Lines Inc.".into()],
                vec!["AA".into(), "American Airlines Inc.".into()],
                vec!["DL".into(), "Delta Air Lines Inc.".into()],
            ],
        )?,
    )?;
    let flights = backend.create_table(
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
        )?,
    )?;
    let weather = backend.create_table(
        "weather",
        frame(
            &[("origin", BaseType::String), ("month", BaseType::Integer), ("temp", BaseType::Float)],
            vec![
                vec!["JFK".into(), 5.into(), 61.5.into()],
                vec!["LGA".into(), 5.into(), 62.0.into()],
                vec!["EWR".into(), 6.into(), Value::Null],
            ],
        )?,
    )?;

    let dm = DataModel::new(Arc::clone(&backend))
        .with_config(config)
        .with_table("airports", airports)?
        .with_table("airlines", airlines)?
        .with_table("flights", flights)?
        .with_table("weather", weather)?
        .with_primary_key("airports", &["faa"])?
        .with_primary_key("airlines", &["carrier"])?
        .with_primary_key("flights", &["id"])?
        .with_unique_key("airlines", &["name"])?
        .with_foreign_key("flights", &["origin"], "airports", &["faa"])?
        .with_foreign_key("flights", &["carrier"], "airlines", &["carrier"])?;

    println!("{}", dm);

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 2 : Un filtre sur airports
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 2 : Filtre airports.faa = JFK ═══\n");

    let jfk = dm.filter("airports", Predicate::eq("faa", "JFK"))?;
    print!("{}", jfk.propagation_plan("flights")?);
    for (table, n) in jfk.row_counts()? {
        println!("  {:<10} {} ligne(s)", table, n);
    }
    println!();

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 3 : Trois filtres combinés
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 3 : Delta, hors JFK, en mai ═══\n");

    let combined = dm
        .filter("airlines", Predicate::eq("name", "Delta Air Lines Inc."))?
        .filter("airports", Predicate::ne("faa", "JFK"))?
        .filter("flights", Predicate::eq("month", 5))?;
    let rows = backend.collect(&combined.materialize("flights")?)?;
    for row in rows.rows() {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        println!("  ({})", cells.join(", "));
    }
    println!();

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 4 : Les clés
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 4 : Clés ═══\n");

    for c in dm.enum_pk_candidates("flights")? {
        println!("  {}", c);
    }
    for r in dm.examine_constraints()? {
        println!("  {}", r);
    }
    println!();

    // ═══════════════════════════════════════════════════════════
    // ÉTAPE 5 : Insérer des lignes
    // ═══════════════════════════════════════════════════════════
    println!("═══ ÉTAPE 5 : Insertion ═══\n");

    let new_airline = backend.literal(frame(
        &[("carrier", BaseType::String), ("name", BaseType::String)],
        vec![vec!["B6".into(), "JetBlue Airways".into()]],
    )?);
    let new_flight = backend.literal(frame(
        &[
            ("id", BaseType::Integer),
            ("month", BaseType::Integer),
            ("carrier", BaseType::String),
            ("origin", BaseType::String),
        ],
        vec![vec![7.into(), 5.into(), "B6".into(), "JFK".into()]],
    )?);
    let source = DataModel::new(Arc::clone(&backend))
        .with_table("flights", new_flight)?
        .with_table("airlines", new_airline)?
        .with_primary_key("flights", &["id"])?
        .with_primary_key("airlines", &["carrier"])?;

    let staged = dm.rows_insert(&source)?;
    if let Some(notice) = &staged.notice {
        println!("  ℹ {}", notice);
    }
    println!(
        "  simulation : tables changées [{}], flights = {} ligne(s), stockage = {}",
        staged.changed_tables.join(", "),
        staged.model().row_count("flights")?,
        dm.row_count("flights")?
    );

    let committed = dm.rows(RowOperation::Insert, &source, &RowsOptions::in_place())?;
    println!(
        "  écriture   : même data model = {}, stockage = {} ligne(s)",
        committed.model().same_model(&dm),
        backend.row_count(&backend.table("flights")?)?
    );

    Ok(())
}
