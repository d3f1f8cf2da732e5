// =============================================================================
// EVAL — Évaluation en mémoire des opérations du MemoryBackend
// =============================================================================
//
// Fonctions pures Frame → Frame : filtrage par prédicat, projection,
// semi-jointure, dédoublonnage, et les écritures de lignes.
//
// LOGIQUE À TROIS VALEURS (comme SQL) :
//   - comparer avec NULL donne "inconnu" (None)
//   - NOT inconnu = inconnu ; faux AND inconnu = faux ; vrai OR inconnu = vrai
//   - un filtre ne garde que les lignes VRAIES
//
// CLÉS :
//   - une clé contenant un NULL ne correspond à rien (ni dans une
//     semi-jointure, ni pour apparier une mise à jour)
//   - INSERT et UPSERT refusent une ligne source à clé nulle : elle
//     casserait la clé primaire de la cible
//
// =============================================================================

use std::collections::{HashMap, HashSet};
use std::cmp::Ordering;

use crate::backend::{BackendError, WriteOptions};
use crate::core::config::{Conflict, Unmatched};
use crate::core::filter::{CompOp, Predicate};
use crate::core::scheduler::RowOperation;
use crate::core::value::Value;

use super::Frame;

type Row = Vec<Value>;

// ─── Prédicats ───────────────────────────────────────────────────────────────

/// Colonnes lues par un prédicat (avec répétitions éventuelles).
pub fn predicate_columns(predicate: &Predicate) -> Vec<&str> {
    match predicate {
        Predicate::Compare { column, .. } | Predicate::In { column, .. } => vec![column.as_str()],
        Predicate::IsNull(column) => vec![column.as_str()],
        Predicate::Not(inner) => predicate_columns(inner),
        Predicate::And(parts) | Predicate::Or(parts) => parts.iter().flat_map(predicate_columns).collect(),
    }
}

/// Évalue un prédicat sur une ligne ; `None` = inconnu.
fn eval_predicate(frame: &Frame, row: &Row, predicate: &Predicate) -> Result<Option<bool>, BackendError> {
    match predicate {
        Predicate::Compare { column, op, value } => {
            let cell = cell(frame, row, column)?;
            if cell.is_null() || value.is_null() {
                return Ok(None);
            }
            let ord = cell.partial_cmp_value(value).ok_or_else(|| BackendError::Incomparable {
                column: column.clone(),
                left: cell.to_string(),
                right: value.to_string(),
            })?;
            Ok(Some(compare(ord, *op)))
        }
        Predicate::In { column, values } => {
            let cell = cell(frame, row, column)?;
            if cell.is_null() {
                return Ok(None);
            }
            if values.iter().any(|v| cell.partial_cmp_value(v) == Some(Ordering::Equal)) {
                Ok(Some(true))
            } else if values.iter().any(Value::is_null) {
                Ok(None)
            } else {
                Ok(Some(false))
            }
        }
        Predicate::IsNull(column) => Ok(Some(cell(frame, row, column)?.is_null())),
        Predicate::Not(inner) => Ok(eval_predicate(frame, row, inner)?.map(|b| !b)),
        Predicate::And(parts) => {
            let mut unknown = false;
            for p in parts {
                match eval_predicate(frame, row, p)? {
                    Some(false) => return Ok(Some(false)),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            Ok(if unknown { None } else { Some(true) })
        }
        Predicate::Or(parts) => {
            let mut unknown = false;
            for p in parts {
                match eval_predicate(frame, row, p)? {
                    Some(true) => return Ok(Some(true)),
                    None => unknown = true,
                    Some(false) => {}
                }
            }
            Ok(if unknown { None } else { Some(false) })
        }
    }
}

fn compare(ord: Ordering, op: CompOp) -> bool {
    match op {
        CompOp::Eq => ord == Ordering::Equal,
        CompOp::Neq => ord != Ordering::Equal,
        CompOp::Lt => ord == Ordering::Less,
        CompOp::Gt => ord == Ordering::Greater,
        CompOp::Lte => ord != Ordering::Greater,
        CompOp::Gte => ord != Ordering::Less,
    }
}

fn cell<'a>(frame: &Frame, row: &'a Row, column: &str) -> Result<&'a Value, BackendError> {
    let idx = frame.index_of(column).ok_or_else(|| BackendError::UnknownColumn {
        column: column.to_string(),
        context: "prédicat".to_string(),
    })?;
    Ok(&row[idx])
}

// ─── Opérations de lecture ───────────────────────────────────────────────────

pub fn filter(frame: &Frame, predicate: &Predicate) -> Result<Frame, BackendError> {
    let mut rows = Vec::new();
    for row in &frame.rows {
        if eval_predicate(frame, row, predicate)? == Some(true) {
            rows.push(row.clone());
        }
    }
    Ok(Frame { columns: frame.columns.clone(), rows })
}

pub fn project(frame: &Frame, columns: &[String]) -> Result<Frame, BackendError> {
    let idx = frame.key_indices(columns, "projection")?;
    Ok(Frame {
        columns: idx.iter().map(|&i| frame.columns[i].clone()).collect(),
        rows: frame.rows.iter().map(|r| idx.iter().map(|&i| r[i].clone()).collect()).collect(),
    })
}

pub fn semi_join(left: &Frame, left_keys: &[String], right: &Frame, right_keys: &[String]) -> Result<Frame, BackendError> {
    if left_keys.len() != right_keys.len() {
        return Err(BackendError::KeyArity { left: left_keys.len(), right: right_keys.len() });
    }
    let li = left.key_indices(left_keys, "semi-jointure")?;
    let ri = right.key_indices(right_keys, "semi-jointure")?;

    let keys: HashSet<Row> = right.rows.iter().filter_map(|r| key_of(r, &ri)).collect();
    let rows = left
        .rows
        .iter()
        .filter(|r| key_of(r, &li).is_some_and(|k| keys.contains(&k)))
        .cloned()
        .collect();
    Ok(Frame { columns: left.columns.clone(), rows })
}

pub fn distinct(frame: &Frame) -> Frame {
    let mut seen: HashSet<&Row> = HashSet::new();
    let rows = frame.rows.iter().filter(|r| seen.insert(*r)).cloned().collect();
    Frame { columns: frame.columns.clone(), rows }
}

/// Valeurs de clé d'une ligne ; `None` si l'une d'elles est NULL.
fn key_of(row: &Row, idx: &[usize]) -> Option<Row> {
    let key: Row = idx.iter().map(|&i| row[i].clone()).collect();
    (!key.iter().any(Value::is_null)).then_some(key)
}

fn show_key(key: &[Value]) -> String {
    let parts: Vec<String> = key.iter().map(|v| v.to_string()).collect();
    format!("({})", parts.join(", "))
}

// ─── Écritures ───────────────────────────────────────────────────────────────

/// Calcule le résultat d'une écriture de lignes.
///
/// Renvoie `None` si aucune ligne de la cible n'a changé.
pub fn write(
    op: RowOperation,
    table: &str,
    target: &Frame,
    source: &Frame,
    key: &[String],
    options: &WriteOptions,
) -> Result<Option<Frame>, BackendError> {
    // Position de chaque colonne de la cible dans la source (si fournie)
    let mut mapping: Vec<Option<usize>> = Vec::with_capacity(target.columns.len());
    for c in &target.columns {
        mapping.push(source.index_of(&c.name));
    }
    for c in &source.columns {
        if target.index_of(&c.name).is_none() {
            return Err(BackendError::UnknownColumn {
                column: c.name.clone(),
                context: format!("cible '{}'", table),
            });
        }
    }

    let mut w = Writer {
        table,
        rows: target.rows.clone(),
        target_key: target.key_indices(key, "clé de la cible")?,
        source_key: match op {
            RowOperation::Append | RowOperation::Truncate => Vec::new(),
            _ => source.key_indices(key, "clé de la source")?,
        },
        mapping,
        options,
        changed: false,
    };

    match op {
        RowOperation::Append => {
            for r in &source.rows {
                w.push(r);
            }
        }
        RowOperation::Insert => w.insert(&source.rows)?,
        RowOperation::Update => w.update(&source.rows, false, false)?,
        RowOperation::Patch => w.update(&source.rows, true, false)?,
        RowOperation::Upsert => w.update(&source.rows, false, true)?,
        RowOperation::Delete => w.delete(&source.rows)?,
        RowOperation::Truncate => {
            w.changed = !w.rows.is_empty();
            w.rows.clear();
        }
    }

    Ok(w.changed.then(|| Frame { columns: target.columns.clone(), rows: w.rows }))
}

struct Writer<'a> {
    table: &'a str,
    rows: Vec<Row>,
    target_key: Vec<usize>,
    source_key: Vec<usize>,
    /// colonne de la cible → colonne de la source
    mapping: Vec<Option<usize>>,
    options: &'a WriteOptions,
    changed: bool,
}

impl Writer<'_> {
    /// Ajoute une ligne de la source, alignée sur les colonnes de la cible.
    fn push(&mut self, src: &Row) {
        let row = self
            .mapping
            .iter()
            .map(|m| m.map(|i| src[i].clone()).unwrap_or(Value::Null))
            .collect();
        self.rows.push(row);
        self.changed = true;
    }

    fn null_key(&self, src: &Row) -> BackendError {
        let k: Row = self.source_key.iter().map(|&i| src[i].clone()).collect();
        BackendError::NullKey { table: self.table.to_string(), key: show_key(&k) }
    }

    fn index(&self) -> HashMap<Row, Vec<usize>> {
        let mut index: HashMap<Row, Vec<usize>> = HashMap::new();
        for (pos, r) in self.rows.iter().enumerate() {
            if let Some(k) = key_of(r, &self.target_key) {
                index.entry(k).or_default().push(pos);
            }
        }
        index
    }

    fn insert(&mut self, source: &[Row]) -> Result<(), BackendError> {
        if self.target_key.is_empty() {
            for r in source {
                self.push(r);
            }
            return Ok(());
        }
        let mut present: HashSet<Row> = self.index().into_keys().collect();
        for r in source {
            match key_of(r, &self.source_key) {
                Some(k) if present.contains(&k) => {
                    if self.options.conflict == Conflict::Error {
                        return Err(BackendError::DuplicateKey { table: self.table.to_string(), key: show_key(&k) });
                    }
                }
                Some(k) => {
                    present.insert(k);
                    self.push(r);
                }
                None => return Err(self.null_key(r)),
            }
        }
        Ok(())
    }

    /// UPDATE (`patch = false`), PATCH (`patch = true`, ne remplit que les
    /// NULL) et UPSERT (`upsert = true`, insère les clés absentes).
    fn update(&mut self, source: &[Row], patch: bool, upsert: bool) -> Result<(), BackendError> {
        let mut index = self.index();
        for r in source {
            let matches = key_of(r, &self.source_key).and_then(|k| index.get(&k).cloned().map(|m| (k, m)));
            let Some((_, positions)) = matches else {
                if upsert {
                    let Some(k) = key_of(r, &self.source_key) else {
                        return Err(self.null_key(r));
                    };
                    index.entry(k).or_default().push(self.rows.len());
                    self.push(r);
                    continue;
                }
                if self.options.unmatched == Unmatched::Error {
                    let k: Row = self.source_key.iter().map(|&i| r[i].clone()).collect();
                    return Err(BackendError::UnmatchedKey { table: self.table.to_string(), key: show_key(&k) });
                }
                continue;
            };
            for pos in positions {
                for (col, src) in self.mapping.iter().enumerate() {
                    let Some(src) = src else { continue };
                    let new = &r[*src];
                    let old = &self.rows[pos][col];
                    let write = if patch { old.is_null() && !new.is_null() } else { old != new };
                    if write {
                        self.rows[pos][col] = new.clone();
                        self.changed = true;
                    }
                }
            }
        }
        Ok(())
    }

    fn delete(&mut self, source: &[Row]) -> Result<(), BackendError> {
        let index = self.index();
        let mut doomed: HashSet<usize> = HashSet::new();
        for r in source {
            match key_of(r, &self.source_key).and_then(|k| index.get(&k)) {
                Some(positions) => doomed.extend(positions.iter().copied()),
                None if self.options.unmatched == Unmatched::Error => {
                    let k: Row = self.source_key.iter().map(|&i| r[i].clone()).collect();
                    return Err(BackendError::UnmatchedKey { table: self.table.to_string(), key: show_key(&k) });
                }
                None => {}
            }
        }
        if !doomed.is_empty() {
            let mut pos = 0;
            self.rows.retain(|_| {
                let keep = !doomed.contains(&pos);
                pos += 1;
                keep
            });
            self.changed = true;
        }
        Ok(())
    }
}
