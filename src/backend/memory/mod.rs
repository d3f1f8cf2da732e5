// =============================================================================
// MEMORY — Backend en mémoire, paresseux
// =============================================================================
//
// Implémentation de référence de TabularBackend :
//   - les tables stockées sont des Frames (colonnes + lignes) rangées dans un
//     IndexMap nom → Arc<Frame>, derrière un RwLock
//   - un MemHandle est un PLAN (Arc<Plan>) : rien n'est calculé tant que
//     personne ne demande `collect` ou `row_count`
//
// PLAN :
//
//   Stored("flights")              ← lit la table stockée au moment du collect
//   Literal(frame)                 ← résultat déjà matérialisé
//   Filter(input, prédicat)
//   Project(input, colonnes)
//   SemiJoin(left, clés, right, clés)
//   Distinct(input)
//
// IDENTITÉ : deux handles sont "le même" s'ils pointent sur le même Arc. Une
// écriture qui ne change rien renvoie un clone du handle cible.
//
// =============================================================================

mod eval;

use std::fmt;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use super::{BackendError, SequentialNames, SessionId, TabularBackend, TempNames, WriteOptions};
use crate::core::filter::Predicate;
use crate::core::scheduler::RowOperation;
use crate::core::schema::ColumnDef;
use crate::core::value::{BaseType, Value};

/// Un tableau matérialisé : colonnes + lignes.
///
/// Toutes les lignes ont la largeur de `columns` ; les champs restent privés
/// pour que seul `Frame::new` (et l'évaluateur) en construise.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    /// Vérifie que chaque ligne a autant de valeurs que de colonnes.
    pub fn new(columns: Vec<ColumnDef>, rows: Vec<Vec<Value>>) -> Result<Self, BackendError> {
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(BackendError::RowWidth { expected: columns.len(), found: bad.len() });
        }
        Ok(Frame { columns, rows })
    }

    pub fn from_rows(columns: &[(&str, BaseType)], rows: Vec<Vec<Value>>) -> Result<Self, BackendError> {
        Frame::new(columns.iter().map(|(n, t)| ColumnDef::new(n, *t)).collect(), rows)
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == column)
    }

    /// Positions d'une liste de colonnes ; erreur si l'une manque.
    pub fn key_indices(&self, columns: &[String], context: &str) -> Result<Vec<usize>, BackendError> {
        columns
            .iter()
            .map(|c| {
                self.index_of(c).ok_or_else(|| BackendError::UnknownColumn {
                    column: c.clone(),
                    context: context.to_string(),
                })
            })
            .collect()
    }

    /// Les valeurs d'une colonne, dans l'ordre des lignes.
    pub fn column_values(&self, column: &str) -> Option<Vec<&Value>> {
        let idx = self.index_of(column)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }
}

#[derive(Debug)]
enum Plan {
    Stored(String),
    Literal(Arc<Frame>),
    Project { input: MemHandle, columns: Vec<String> },
    Filter { input: MemHandle, predicate: Predicate },
    SemiJoin { left: MemHandle, left_keys: Vec<String>, right: MemHandle, right_keys: Vec<String> },
    Distinct(MemHandle),
}

/// Handle du backend mémoire : un plan partagé.
#[derive(Debug, Clone)]
pub struct MemHandle(Arc<Plan>);

impl MemHandle {
    fn new(plan: Plan) -> Self {
        MemHandle(Arc::new(plan))
    }

    /// Nom de la table stockée, si le handle en désigne une directement.
    pub fn stored_name(&self) -> Option<&str> {
        match self.0.as_ref() {
            Plan::Stored(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for MemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_ref() {
            Plan::Stored(name) => write!(f, "{}", name),
            Plan::Literal(frame) => write!(f, "<{} ligne(s)>", frame.len()),
            Plan::Project { input, columns } => write!(f, "project({}, [{}])", input, columns.join(", ")),
            Plan::Filter { input, predicate } => write!(f, "filter({}, {})", input, predicate),
            Plan::SemiJoin { left, right, .. } => write!(f, "semi_join({}, {})", left, right),
            Plan::Distinct(input) => write!(f, "distinct({})", input),
        }
    }
}

/// Le backend mémoire : une session, un stockage, un générateur de noms.
#[derive(Debug)]
pub struct MemoryBackend {
    session: SessionId,
    tables: RwLock<IndexMap<String, Arc<Frame>>>,
    names: Box<dyn TempNames>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        MemoryBackend::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::with_names(Box::new(SequentialNames::new()))
    }

    pub fn with_names(names: Box<dyn TempNames>) -> Self {
        MemoryBackend {
            session: SessionId::next(),
            tables: RwLock::new(IndexMap::new()),
            names,
        }
    }

    /// Crée une table stockée et renvoie son handle.
    pub fn create_table(&self, name: &str, frame: Frame) -> Result<MemHandle, BackendError> {
        let mut tables = self.tables.write().map_err(|_| BackendError::Poisoned)?;
        if tables.contains_key(name) {
            return Err(BackendError::TableExists(name.to_string()));
        }
        tables.insert(name.to_string(), Arc::new(frame));
        log::debug!("{}: table '{}' créée", self.session, name);
        Ok(MemHandle::new(Plan::Stored(name.to_string())))
    }

    /// Crée une table stockée dont le nom vient du générateur injecté.
    pub fn create_temporary(&self, prefix: &str, frame: Frame) -> Result<(String, MemHandle), BackendError> {
        let name = self.names.next_name(prefix);
        let handle = self.create_table(&name, frame)?;
        Ok((name, handle))
    }

    pub fn drop_table(&self, name: &str) -> Result<(), BackendError> {
        let mut tables = self.tables.write().map_err(|_| BackendError::Poisoned)?;
        tables
            .shift_remove(name)
            .map(|_| ())
            .ok_or_else(|| BackendError::UnknownTable(name.to_string()))
    }

    /// Handle d'une table stockée existante.
    pub fn table(&self, name: &str) -> Result<MemHandle, BackendError> {
        self.stored(name)?;
        Ok(MemHandle::new(Plan::Stored(name.to_string())))
    }

    pub fn table_names(&self) -> Result<Vec<String>, BackendError> {
        let tables = self.tables.read().map_err(|_| BackendError::Poisoned)?;
        Ok(tables.keys().cloned().collect())
    }

    /// Handle sur des lignes déjà en mémoire (jamais stockées).
    pub fn literal(&self, frame: Frame) -> MemHandle {
        MemHandle::new(Plan::Literal(Arc::new(frame)))
    }

    /// Évalue un plan.
    pub fn collect(&self, handle: &MemHandle) -> Result<Arc<Frame>, BackendError> {
        match handle.0.as_ref() {
            Plan::Stored(name) => self.stored(name),
            Plan::Literal(frame) => Ok(Arc::clone(frame)),
            Plan::Project { input, columns } => Ok(Arc::new(eval::project(&*self.collect(input)?, columns)?)),
            Plan::Filter { input, predicate } => Ok(Arc::new(eval::filter(&*self.collect(input)?, predicate)?)),
            Plan::SemiJoin { left, left_keys, right, right_keys } => {
                let l = self.collect(left)?;
                let r = self.collect(right)?;
                Ok(Arc::new(eval::semi_join(&l, left_keys, &r, right_keys)?))
            }
            Plan::Distinct(input) => Ok(Arc::new(eval::distinct(&*self.collect(input)?))),
        }
    }

    fn stored(&self, name: &str) -> Result<Arc<Frame>, BackendError> {
        let tables = self.tables.read().map_err(|_| BackendError::Poisoned)?;
        tables
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::UnknownTable(name.to_string()))
    }

    fn require_columns(&self, handle: &MemHandle, columns: &[String], context: &str) -> Result<Vec<ColumnDef>, BackendError> {
        let have = self.columns(handle)?;
        if let Some(missing) = columns.iter().find(|c| !have.iter().any(|h| &h.name == *c)) {
            return Err(BackendError::UnknownColumn { column: missing.clone(), context: context.to_string() });
        }
        Ok(have)
    }
}

impl TabularBackend for MemoryBackend {
    type Handle = MemHandle;

    fn session(&self) -> SessionId {
        self.session
    }

    /// Calculé sur le plan, sans évaluer les lignes.
    fn columns(&self, handle: &MemHandle) -> Result<Vec<ColumnDef>, BackendError> {
        match handle.0.as_ref() {
            Plan::Stored(name) => Ok(self.stored(name)?.columns.clone()),
            Plan::Literal(frame) => Ok(frame.columns.clone()),
            Plan::Project { input, columns } => {
                let have = self.columns(input)?;
                columns
                    .iter()
                    .map(|c| {
                        have.iter().find(|h| &h.name == c).cloned().ok_or_else(|| BackendError::UnknownColumn {
                            column: c.clone(),
                            context: "projection".to_string(),
                        })
                    })
                    .collect()
            }
            Plan::Filter { input, .. } | Plan::Distinct(input) => self.columns(input),
            Plan::SemiJoin { left, .. } => self.columns(left),
        }
    }

    fn project(&self, handle: &MemHandle, columns: &[String]) -> Result<MemHandle, BackendError> {
        self.require_columns(handle, columns, "projection")?;
        Ok(MemHandle::new(Plan::Project { input: handle.clone(), columns: columns.to_vec() }))
    }

    fn semi_join_filter(
        &self,
        left: &MemHandle,
        left_keys: &[String],
        right: &MemHandle,
        right_keys: &[String],
    ) -> Result<MemHandle, BackendError> {
        if left_keys.len() != right_keys.len() {
            return Err(BackendError::KeyArity { left: left_keys.len(), right: right_keys.len() });
        }
        self.require_columns(left, left_keys, "semi-jointure")?;
        self.require_columns(right, right_keys, "semi-jointure")?;
        Ok(MemHandle::new(Plan::SemiJoin {
            left: left.clone(),
            left_keys: left_keys.to_vec(),
            right: right.clone(),
            right_keys: right_keys.to_vec(),
        }))
    }

    fn apply_predicate(&self, handle: &MemHandle, predicate: &Predicate) -> Result<MemHandle, BackendError> {
        let cols: Vec<String> = eval::predicate_columns(predicate).into_iter().map(str::to_string).collect();
        self.require_columns(handle, &cols, "prédicat")?;
        Ok(MemHandle::new(Plan::Filter { input: handle.clone(), predicate: predicate.clone() }))
    }

    fn distinct(&self, handle: &MemHandle) -> Result<MemHandle, BackendError> {
        Ok(MemHandle::new(Plan::Distinct(handle.clone())))
    }

    fn row_count(&self, handle: &MemHandle) -> Result<usize, BackendError> {
        Ok(self.collect(handle)?.len())
    }

    /// En place : seul un handle `Stored` désigne quelque chose à modifier.
    fn check_writable(&self, target: &MemHandle, options: &WriteOptions) -> Result<(), BackendError> {
        match target.stored_name() {
            Some(name) => self.stored(name).map(|_| ()),
            None if options.in_place => Err(BackendError::NotStored),
            None => Ok(()),
        }
    }

    fn write_rows(
        &self,
        op: RowOperation,
        target: &MemHandle,
        source: &MemHandle,
        key: &[String],
        options: &WriteOptions,
    ) -> Result<MemHandle, BackendError> {
        self.check_writable(target, options)?;
        let stored = target.stored_name();
        let label = stored.unwrap_or("<résultat>");

        let target_frame = self.collect(target)?;
        let source_frame = self.collect(source)?;
        let Some(frame) = eval::write(op, label, &target_frame, &source_frame, key, options)? else {
            return Ok(target.clone());
        };

        match stored {
            Some(name) if options.in_place => {
                let mut tables = self.tables.write().map_err(|_| BackendError::Poisoned)?;
                log::debug!("{}: {} écrit dans '{}' ({} ligne(s))", self.session, op, name, frame.len());
                tables.insert(name.to_string(), Arc::new(frame));
                Ok(MemHandle::new(Plan::Stored(name.to_string())))
            }
            _ => Ok(self.literal(frame)),
        }
    }

    fn same_handle(&self, a: &MemHandle, b: &MemHandle) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}
