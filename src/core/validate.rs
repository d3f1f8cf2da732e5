// =============================================================================
// VALIDATE — Vérification des clés et des préconditions
// =============================================================================
//
// Trois familles de vérifications :
//   - enum_pk_candidates : quelles colonnes d'une table POURRAIENT servir de
//     clé primaire (aucune valeur manquante, aucun doublon) ?
//   - examine_constraints : les clés déclarées sont-elles respectées par les
//     données (PK/UK uniques et non nulles, FK sans orphelins) ?
//   - check_mutation : deux data models sont-ils compatibles pour une
//     opération de lignes ? Rien n'est écrit si l'une échoue.
//
// Les deux premières ne lisent les données qu'à travers le TabularBackend
// (projections, distinct, comptages) : elles marchent avec n'importe quel
// backend.
//
// =============================================================================

use std::fmt;

use indexmap::IndexMap;

use super::error::{DmError, DmResult};
use super::filter::Predicate;
use super::graph::KeyGraph;
use super::model::DataModel;
use super::scheduler::RowOperation;
use crate::backend::TabularBackend;

// ─── Candidats de clé primaire ───────────────────────────────────────────────

/// Une colonne peut-elle servir de clé primaire ?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkCandidate {
    pub column: String,
    pub candidate: bool,
    /// Pourquoi la colonne n'est pas candidate.
    pub reason: Option<String>,
}

impl fmt::Display for PkCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            None => write!(f, "{} : candidate", self.column),
            Some(r) => write!(f, "{} : {}", self.column, r),
        }
    }
}

/// Examine chaque colonne d'un handle.
pub fn enum_pk_candidates<B: TabularBackend>(backend: &B, handle: &B::Handle) -> DmResult<Vec<PkCandidate>> {
    let total = backend.row_count(handle)?;
    let mut out = Vec::new();

    for col in backend.columns(handle)? {
        let name = vec![col.name.clone()];
        let missing = backend.row_count(&backend.apply_predicate(handle, &Predicate::is_null(&col.name))?)?;
        let distinct = backend.row_count(&backend.distinct(&backend.project(handle, &name)?)?)?;
        let duplicated = total - distinct;

        let mut reasons = Vec::new();
        if missing > 0 {
            reasons.push(format!("{} valeur(s) manquante(s)", missing));
        }
        if duplicated > 0 {
            reasons.push(format!("{} doublon(s)", duplicated));
        }
        out.push(PkCandidate {
            column: col.name,
            candidate: reasons.is_empty(),
            reason: (!reasons.is_empty()).then(|| reasons.join(", ")),
        });
    }
    Ok(out)
}

// ─── Contraintes déclarées ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    UniqueKey,
    /// Clé étrangère vers `parent(parent_columns)`.
    ForeignKey { parent: String, parent_columns: Vec<String> },
}

/// Le verdict sur une contrainte déclarée.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintReport {
    pub table: String,
    pub columns: Vec<String>,
    pub kind: ConstraintKind,
    /// Lignes fautives : clé nulle ou dupliquée (PK/UK), orpheline (FK).
    pub violations: usize,
}

impl ConstraintReport {
    pub fn holds(&self) -> bool {
        self.violations == 0
    }
}

impl fmt::Display for ConstraintReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match &self.kind {
            ConstraintKind::PrimaryKey => "pk".to_string(),
            ConstraintKind::UniqueKey => "uk".to_string(),
            ConstraintKind::ForeignKey { parent, parent_columns } => {
                format!("fk -> {}({})", parent, parent_columns.join(", "))
            }
        };
        let verdict = if self.holds() { "✓".to_string() } else { format!("✗ {} ligne(s)", self.violations) };
        write!(f, "{}({}) {} {}", self.table, self.columns.join(", "), what, verdict)
    }
}

/// Vérifie toutes les clés du graphe contre les données.
pub fn examine_constraints<B: TabularBackend>(
    graph: &KeyGraph,
    backend: &B,
    handles: &IndexMap<String, B::Handle>,
) -> DmResult<Vec<ConstraintReport>> {
    let mut out = Vec::new();

    for table in graph.tables() {
        let h = handle(handles, &table.name)?;
        let keys = std::iter::once((ConstraintKind::PrimaryKey, &table.primary_key))
            .filter(|(_, k)| !k.is_empty())
            .chain(table.unique_keys.iter().map(|k| (ConstraintKind::UniqueKey, k)));
        for (kind, cols) in keys {
            out.push(ConstraintReport {
                table: table.name.clone(),
                columns: cols.clone(),
                kind,
                violations: key_violations(backend, h, cols)?,
            });
        }
    }

    for edge in graph.edges() {
        let child = handle(handles, &edge.child)?;
        let parent = handle(handles, &edge.parent)?;
        let complete = backend.apply_predicate(child, &no_nulls(&edge.child_columns))?;
        let matched = backend.semi_join_filter(&complete, &edge.child_columns, parent, &edge.parent_columns)?;
        out.push(ConstraintReport {
            table: edge.child.clone(),
            columns: edge.child_columns.clone(),
            kind: ConstraintKind::ForeignKey {
                parent: edge.parent.clone(),
                parent_columns: edge.parent_columns.clone(),
            },
            violations: backend.row_count(&complete)? - backend.row_count(&matched)?,
        });
    }
    Ok(out)
}

/// Lignes à clé incomplète + lignes en double.
fn key_violations<B: TabularBackend>(backend: &B, h: &B::Handle, cols: &[String]) -> DmResult<usize> {
    let total = backend.row_count(h)?;
    let complete = backend.apply_predicate(h, &no_nulls(cols))?;
    let n_complete = backend.row_count(&complete)?;
    let distinct = backend.row_count(&backend.distinct(&backend.project(&complete, cols)?)?)?;
    Ok((total - n_complete) + (n_complete - distinct))
}

/// `NOT (c1 IS NULL) AND NOT (c2 IS NULL) ...`
fn no_nulls(cols: &[String]) -> Predicate {
    Predicate::And(cols.iter().map(|c| Predicate::is_null(c).not()).collect())
}

fn handle<'h, H>(handles: &'h IndexMap<String, H>, table: &str) -> DmResult<&'h H> {
    handles.get(table).ok_or_else(|| DmError::UnknownTable(table.to_string()))
}

// ─── Préconditions des opérations de lignes ──────────────────────────────────

/// Vérifie que `source` peut être écrit dans `target` avec `op`.
///
/// Aucune de ces vérifications n'appelle le backend en écriture.
pub fn check_mutation<B: TabularBackend>(target: &DataModel<B>, source: &DataModel<B>, op: RowOperation) -> DmResult<()> {
    if target.backend().session() != source.backend().session() {
        return Err(DmError::SourceMismatch);
    }
    for dm in [target, source] {
        if let Some(table) = dm.zoomed_table() {
            return Err(DmError::Zoomed { operation: op.name(), table: table.to_string() });
        }
    }
    // Les écritures lisent les handles de base : un filtre en attente serait ignoré.
    if target.has_pending_filters() || source.has_pending_filters() {
        return Err(DmError::PendingFilters { operation: op.name() });
    }

    let missing: Vec<String> = source
        .table_names()
        .into_iter()
        .filter(|t| !target.graph().contains(t))
        .collect();
    if !missing.is_empty() {
        return Err(DmError::MissingTable { tables: missing });
    }

    for src in source.graph().tables() {
        let dst = target.graph().table_checked(&src.name)?;
        let names = src.column_names();
        let absent: Vec<String> = dst.missing_columns(&names).into_iter().cloned().collect();
        if !absent.is_empty() {
            return Err(DmError::MissingColumn { table: src.name.clone(), columns: absent });
        }

        if src.has_primary_key() && src.primary_key != dst.primary_key {
            return Err(DmError::KeyMismatch {
                table: src.name.clone(),
                reason: format!(
                    "clé primaire [{}] dans la source, [{}] dans la cible",
                    src.primary_key.join(", "),
                    dst.primary_key.join(", ")
                ),
            });
        }
        if target.config().keys.check_types {
            for col in &dst.primary_key {
                let (Some(s), Some(d)) = (src.column(col), dst.column(col)) else { continue };
                if s.ty != d.ty {
                    return Err(DmError::KeyMismatch {
                        table: src.name.clone(),
                        reason: format!("colonne de clé '{}' : {} dans la source, {} dans la cible", col, s.ty, d.ty),
                    });
                }
            }
        }

        if op.needs_key() && !dst.has_primary_key() {
            return Err(DmError::MissingPrimaryKey { operation: op.name(), table: src.name.clone() });
        }
        let keyed = op.needs_key() || (op == RowOperation::Insert && dst.has_primary_key());
        if keyed {
            let absent: Vec<&String> = dst.primary_key.iter().filter(|c| !src.has_column(c)).collect();
            if !absent.is_empty() {
                let absent: Vec<&str> = absent.iter().map(|c| c.as_str()).collect();
                return Err(DmError::KeyMismatch {
                    table: src.name.clone(),
                    reason: format!("colonnes de clé absentes de la source : [{}]", absent.join(", ")),
                });
            }
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TabularBackend;
    use crate::core::config::DmConfig;
    use crate::core::fixtures::{self, frame};
    use crate::core::model::DataModel;
    use crate::core::value::{BaseType, Value};
    use std::sync::Arc;

    #[test]
    fn test_pk_candidates() {
        let (backend, dm) = fixtures::flights();
        let cands = enum_pk_candidates(backend.as_ref(), dm.handle("flights").unwrap()).unwrap();
        let id = cands.iter().find(|c| c.column == "id").unwrap();
        assert!(id.candidate);
        let month = cands.iter().find(|c| c.column == "month").unwrap();
        assert!(!month.candidate);
        assert_eq!(month.reason.as_deref(), Some("4 doublon(s)"));
    }

    #[test]
    fn test_pk_candidates_missing_values() {
        let backend = Arc::new(crate::backend::memory::MemoryBackend::new());
        let h = backend.literal(frame(
            &[("code", BaseType::String)],
            vec![vec!["a".into()], vec![Value::Null], vec!["b".into()]],
        ));
        let cands = enum_pk_candidates(backend.as_ref(), &h).unwrap();
        assert_eq!(cands[0].reason.as_deref(), Some("1 valeur(s) manquante(s)"));
        assert_eq!(backend.row_count(&h).unwrap(), 3);
    }

    #[test]
    fn test_constraints_hold_on_fixture() {
        let (_, dm) = fixtures::flights();
        let reports = dm.examine_constraints().unwrap();
        // 3 pk + 2 fk
        assert_eq!(reports.len(), 5);
        assert!(reports.iter().all(ConstraintReport::holds), "{:?}", reports);
    }

    #[test]
    fn test_orphan_detected() {
        let (backend, dm) = fixtures::flights();
        let few = backend.literal(frame(
            &[("faa", BaseType::String), ("name", BaseType::String)],
            vec![vec!["JFK".into(), "John F Kennedy Intl".into()]],
        ));
        let dm = dm.with_handles(vec![("airports".to_string(), few)]);
        let reports = dm.examine_constraints().unwrap();
        let fk = reports
            .iter()
            .find(|r| matches!(&r.kind, ConstraintKind::ForeignKey { parent, .. } if parent == "airports"))
            .unwrap();
        assert_eq!(fk.violations, 3);
        assert_eq!(fk.to_string(), "flights(origin) fk -> airports(faa) ✗ 3 ligne(s)");
    }

    #[test]
    fn test_source_mismatch() {
        let (_, dm) = fixtures::flights();
        let (_, other) = fixtures::flights();
        let err = check_mutation(&dm, &other, RowOperation::Insert).unwrap_err();
        assert!(matches!(err, DmError::SourceMismatch));
    }

    #[test]
    fn test_missing_table_and_column() {
        let (backend, dm) = fixtures::flights();
        let planes = backend.literal(frame(&[("tailnum", BaseType::String)], vec![]));
        let src = DataModel::new(Arc::clone(&backend)).with_table("planes", planes).unwrap();
        assert!(matches!(
            check_mutation(&dm, &src, RowOperation::Insert),
            Err(DmError::MissingTable { tables }) if tables == vec!["planes"]
        ));

        let wide = backend.literal(frame(&[("faa", BaseType::String), ("tz", BaseType::Integer)], vec![]));
        let src = DataModel::new(Arc::clone(&backend)).with_table("airports", wide).unwrap();
        assert!(matches!(
            check_mutation(&dm, &src, RowOperation::Insert),
            Err(DmError::MissingColumn { columns, .. }) if columns == vec!["tz"]
        ));
    }

    #[test]
    fn test_key_mismatch() {
        let (backend, dm) = fixtures::flights();
        let h = backend.literal(frame(&[("faa", BaseType::String), ("name", BaseType::String)], vec![]));
        let src = DataModel::new(Arc::clone(&backend))
            .with_table("airports", h.clone())
            .unwrap()
            .with_primary_key("airports", &["name"])
            .unwrap();
        assert!(matches!(check_mutation(&dm, &src, RowOperation::Update), Err(DmError::KeyMismatch { .. })));

        // type de la clé différent
        let typed = backend.literal(frame(&[("faa", BaseType::Integer)], vec![]));
        let src = DataModel::new(Arc::clone(&backend)).with_table("airports", typed).unwrap();
        assert!(matches!(check_mutation(&dm, &src, RowOperation::Delete), Err(DmError::KeyMismatch { .. })));
        let lax = dm.with_config(DmConfig::from_toml_str("[keys]\ncheck_types = false").unwrap());
        assert!(check_mutation(&lax, &src, RowOperation::Delete).is_ok());

        // colonne de clé absente de la source
        let no_key = backend.literal(frame(&[("name", BaseType::String)], vec![]));
        let src = DataModel::new(Arc::clone(&backend)).with_table("airports", no_key).unwrap();
        assert!(matches!(check_mutation(&dm, &src, RowOperation::Update), Err(DmError::KeyMismatch { .. })));
        assert!(check_mutation(&dm, &src, RowOperation::Append).is_ok());
    }

    #[test]
    fn test_missing_primary_key() {
        let (backend, dm) = fixtures::flights();
        let w = backend.literal(frame(&[("origin", BaseType::String)], vec![]));
        let src = DataModel::new(Arc::clone(&backend)).with_table("weather", w).unwrap();
        assert!(matches!(
            check_mutation(&dm, &src, RowOperation::Update),
            Err(DmError::MissingPrimaryKey { operation: "rows_update", .. })
        ));
        assert!(check_mutation(&dm, &src, RowOperation::Insert).is_ok());
        assert!(check_mutation(&dm, &src, RowOperation::Truncate).is_ok());
    }

    #[test]
    fn test_pending_filters_rejected() {
        let (_, dm) = fixtures::flights();
        let none = dm.filter("airports", Predicate::eq("faa", "LAX")).unwrap();
        assert!(matches!(
            check_mutation(&dm, &none, RowOperation::Delete),
            Err(DmError::PendingFilters { operation: "rows_delete" })
        ));
        assert!(matches!(
            check_mutation(&none, &dm, RowOperation::Insert),
            Err(DmError::PendingFilters { operation: "rows_insert" })
        ));
        // une fois appliqués, le filtre fait partie du handle
        assert!(check_mutation(&dm, &none.apply_filters().unwrap(), RowOperation::Delete).is_ok());
    }

    #[test]
    fn test_zoomed_models_rejected() {
        let (_, dm) = fixtures::flights();
        let zoomed = dm.zoom_to("flights").unwrap();
        assert!(matches!(
            check_mutation(&dm, &zoomed, RowOperation::Insert),
            Err(DmError::Zoomed { operation: "rows_insert", .. })
        ));
    }
}
