// =============================================================================
// FILTER — Les prédicats et l'ensemble des filtres en attente
// =============================================================================
//
// Un Predicate est une expression booléenne liée à UNE table. Le cœur ne
// l'évalue jamais : il la stocke, la compose (ET logique) et la transmet au
// backend (`apply_predicate`). Seul le backend sait la traduire, en mémoire
// ou en SQL.
//
// Le FilterSet associe à chaque table une liste ordonnée de prédicats, chacun
// avec un drapeau `applied` :
//   - false : stocké, pas encore évalué (le cas normal après `filter`)
//   - true  : déjà intersecté dans le handle de la table (après `restrict`) ;
//             il ne s'applique plus à sa table, mais il compte toujours pour
//             la propagation vers les voisines
//
// L'ordre d'insertion est conservé pour l'affichage ; le résultat n'en
// dépend pas (le ET est commutatif).
//
// =============================================================================

use std::fmt;

use indexmap::IndexMap;

use super::error::{DmError, DmResult};
use super::graph::KeyGraph;
use super::value::Value;

/// Opérateur de comparaison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,  // =
    Neq, // !=
    Lt,  // <
    Gt,  // >
    Lte, // <=
    Gte, // >=
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompOp::Eq => write!(f, "="),
            CompOp::Neq => write!(f, "!="),
            CompOp::Lt => write!(f, "<"),
            CompOp::Gt => write!(f, ">"),
            CompOp::Lte => write!(f, "<="),
            CompOp::Gte => write!(f, ">="),
        }
    }
}

/// Une expression booléenne sur les colonnes d'une table.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `colonne op valeur`
    Compare { column: String, op: CompOp, value: Value },
    /// `colonne ∈ {valeurs}`
    In { column: String, values: Vec<Value> },
    /// `colonne IS NULL`
    IsNull(String),
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(column: &str, op: CompOp, value: impl Into<Value>) -> Self {
        Predicate::Compare { column: column.to_string(), op, value: value.into() }
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, CompOp::Eq, value)
    }

    pub fn ne(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, CompOp::Neq, value)
    }

    pub fn lt(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, CompOp::Lt, value)
    }

    pub fn gt(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, CompOp::Gt, value)
    }

    pub fn is_in<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(column: &str) -> Self {
        Predicate::IsNull(column.to_string())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { column, op, value } => write!(f, "{} {} {}", column, op, value),
            Predicate::In { column, values } => {
                let vs: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{} IN ({})", column, vs.join(", "))
            }
            Predicate::IsNull(column) => write!(f, "{} IS NULL", column),
            Predicate::Not(inner) => write!(f, "NOT ({})", inner),
            Predicate::And(parts) => join(f, parts, " AND "),
            Predicate::Or(parts) => join(f, parts, " OR "),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, parts: &[Predicate], sep: &str) -> fmt::Result {
    let ps: Vec<String> = parts.iter().map(|p| format!("({})", p)).collect();
    write!(f, "{}", ps.join(sep))
}

/// Un prédicat stocké dans le FilterSet.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPredicate {
    pub predicate: Predicate,
    pub applied: bool,
}

/// Les filtres d'un data model : table → prédicats, dans l'ordre d'ajout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    filters: IndexMap<String, Vec<StoredPredicate>>,
}

impl FilterSet {
    pub fn new() -> Self {
        FilterSet::default()
    }

    /// Ajoute un prédicat non appliqué sur une table existante.
    pub fn attach(&mut self, graph: &KeyGraph, table: &str, predicate: Predicate) -> DmResult<()> {
        self.push(graph, table, StoredPredicate { predicate, applied: false })
    }

    /// Enregistre un prédicat déjà intersecté dans le handle de la table.
    pub fn attach_applied(&mut self, graph: &KeyGraph, table: &str, predicate: Predicate) -> DmResult<()> {
        self.push(graph, table, StoredPredicate { predicate, applied: true })
    }

    fn push(&mut self, graph: &KeyGraph, table: &str, stored: StoredPredicate) -> DmResult<()> {
        if !graph.contains(table) {
            return Err(DmError::UnknownTable(table.to_string()));
        }
        self.filters.entry(table.to_string()).or_default().push(stored);
        Ok(())
    }

    /// Tous les prédicats d'une table (appliqués ou non).
    pub fn predicates_for(&self, table: &str) -> &[StoredPredicate] {
        self.filters.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Les prédicats d'une table qui restent à évaluer sur elle-même.
    pub fn unapplied_for(&self, table: &str) -> Vec<&Predicate> {
        self.predicates_for(table)
            .iter()
            .filter(|s| !s.applied)
            .map(|s| &s.predicate)
            .collect()
    }

    pub fn has_unapplied(&self) -> bool {
        self.filters.values().flatten().any(|s| !s.applied)
    }

    /// Tables portant au moins un prédicat, dans l'ordre d'ajout.
    pub fn filtered_tables(&self) -> Vec<&str> {
        self.filters
            .iter()
            .filter(|(_, preds)| !preds.is_empty())
            .map(|(t, _)| t.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.values().all(Vec::is_empty)
    }

    /// Oublie les prédicats d'une table (après application réussie).
    pub fn clear(&mut self, table: &str) {
        self.filters.shift_remove(table);
    }

    pub fn clear_all(&mut self) {
        self.filters.clear();
    }

    /// Ne garde que les filtres des tables nommées.
    pub fn retain_tables<S: AsRef<str>>(&mut self, keep: &[S]) {
        self.filters
            .retain(|t, _| keep.iter().any(|k| k.as_ref() == t.as_str()));
    }

    pub fn rename_table(&mut self, old: &str, new: &str) {
        if let Some(idx) = self.filters.get_index_of(old) {
            if let Some((_, preds)) = self.filters.shift_remove_index(idx) {
                self.filters.shift_insert(idx, new.to_string(), preds);
            }
        }
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (table, preds) in &self.filters {
            for p in preds {
                let state = if p.applied { "appliqué" } else { "en attente" };
                writeln!(f, "{}: {} [{}]", table, p.predicate, state)?;
            }
        }
        Ok(())
    }
}
