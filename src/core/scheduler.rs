// =============================================================================
// SCHEDULER — Écritures de lignes ordonnées sur plusieurs tables
// =============================================================================
//
// Une opération de lignes (insert, update, delete...) copie les lignes d'un
// data model SOURCE vers un data model CIBLE, table par table, dans un ordre
// compatible avec les clés étrangères :
//
//   INSERT/APPEND/UPDATE/PATCH/UPSERT : parents d'abord
//       airlines, airports  →  flights
//   DELETE/TRUNCATE : enfants d'abord (ordre exactement inverse)
//       flights  →  airports, airlines
//
// Déroulement de `run` :
//   1. préconditions (validate.rs), AVANT tout appel au backend
//   2. ordre topologique sur les tables de la source
//   3. check_writable sur toutes les cibles, avant la première écriture
//   4. write_rows par table ; un handle identique = table inchangée
//   5. résultat :
//        in_place = None        → notice + simulation
//        in_place = Some(false) → nouveau model, backend intact
//        in_place = Some(true)  → backend modifié, model d'origine renvoyé
//
// Il n'y a pas de transaction : si une table échoue en mode réel (conflit de
// clé...), les tables précédentes restent écrites (un avertissement le signale).
//
// =============================================================================

use std::fmt;

use super::config::RowsOptions;
use super::error::DmResult;
use super::graph::Direction;
use super::model::DataModel;
use super::validate;
use crate::backend::{TabularBackend, WriteOptions};

/// Les opérations de lignes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowOperation {
    /// Ajoute les lignes de la source ; conflit de clé selon `Conflict`.
    Insert,
    /// Ajoute toutes les lignes, sans regarder les clés.
    Append,
    /// Remplace les valeurs des lignes appariées.
    Update,
    /// Ne remplit que les cellules NULL des lignes appariées.
    Patch,
    /// Update des lignes appariées, insert des autres.
    Upsert,
    Delete,
    /// Vide les tables de la cible qui figurent dans la source.
    Truncate,
}

impl RowOperation {
    pub const ALL: [RowOperation; 7] = [
        RowOperation::Insert,
        RowOperation::Append,
        RowOperation::Update,
        RowOperation::Patch,
        RowOperation::Upsert,
        RowOperation::Delete,
        RowOperation::Truncate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RowOperation::Insert => "rows_insert",
            RowOperation::Append => "rows_append",
            RowOperation::Update => "rows_update",
            RowOperation::Patch => "rows_patch",
            RowOperation::Upsert => "rows_upsert",
            RowOperation::Delete => "rows_delete",
            RowOperation::Truncate => "rows_truncate",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            RowOperation::Delete | RowOperation::Truncate => Direction::ChildFirst,
            _ => Direction::ParentFirst,
        }
    }

    /// L'opération apparie-t-elle les lignes par clé primaire ?
    ///
    /// Un INSERT sans clé primaire se comporte comme un APPEND.
    pub fn needs_key(&self) -> bool {
        matches!(
            self,
            RowOperation::Update | RowOperation::Patch | RowOperation::Upsert | RowOperation::Delete
        )
    }
}

impl fmt::Display for RowOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ce que renvoie une opération de lignes.
#[derive(Debug)]
pub enum MutationOutcome<B: TabularBackend> {
    /// Nouveau model (seules les tables changées ont un nouveau handle) ;
    /// le backend n'a pas été touché.
    Staged(DataModel<B>),
    /// Le backend a été modifié ; c'est le model d'origine.
    Committed(DataModel<B>),
}

impl<B: TabularBackend> MutationOutcome<B> {
    pub fn model(&self) -> &DataModel<B> {
        match self {
            MutationOutcome::Staged(m) | MutationOutcome::Committed(m) => m,
        }
    }

    pub fn into_model(self) -> DataModel<B> {
        match self {
            MutationOutcome::Staged(m) | MutationOutcome::Committed(m) => m,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, MutationOutcome::Committed(_))
    }
}

/// Résultat détaillé d'une opération de lignes.
#[derive(Debug)]
pub struct MutationReport<B: TabularBackend> {
    pub outcome: MutationOutcome<B>,
    /// Tables dont les lignes ont changé, dans l'ordre d'exécution.
    pub changed_tables: Vec<String>,
    /// Présente quand `in_place` n'était pas précisé.
    pub notice: Option<String>,
}

impl<B: TabularBackend> MutationReport<B> {
    pub fn model(&self) -> &DataModel<B> {
        self.outcome.model()
    }

    pub fn into_model(self) -> DataModel<B> {
        self.outcome.into_model()
    }
}

/// Ordonne et exécute une opération de lignes entre deux data models.
pub struct MutationScheduler<'a, B: TabularBackend> {
    target: &'a DataModel<B>,
    source: &'a DataModel<B>,
}

impl<'a, B: TabularBackend> MutationScheduler<'a, B> {
    pub fn new(target: &'a DataModel<B>, source: &'a DataModel<B>) -> Self {
        MutationScheduler { target, source }
    }

    /// Vérifie les préconditions et renvoie l'ordre des tables.
    pub fn plan(&self, op: RowOperation) -> DmResult<Vec<String>> {
        validate::check_mutation(self.target, self.source, op)?;
        let scope = self.source.table_names();
        self.target.graph().topo_order(&scope, op.direction())
    }

    pub fn run(&self, op: RowOperation, options: &RowsOptions) -> DmResult<MutationReport<B>> {
        let order = self.plan(op)?;

        let notice = options.in_place.is_none().then(|| {
            format!(
                "{} : résultat calculé sans écriture, passez in_place = true pour modifier le backend",
                op
            )
        });
        if let Some(n) = &notice {
            log::info!("{}", n);
        }

        let write = WriteOptions {
            conflict: options.conflict,
            unmatched: options.unmatched,
            in_place: options.in_place.unwrap_or(false),
        };
        let backend = self.target.backend();
        for table in &order {
            backend.check_writable(self.target.handle(table)?, &write)?;
        }
        let mut changed: Vec<(String, B::Handle)> = Vec::new();

        for table in &order {
            let target = self.target.handle(table)?;
            let source = self.source.handle(table)?;
            let key = self.target.graph().table_checked(table)?.primary_key.clone();
            log::debug!("{} : table '{}' (clé [{}])", op, table, key.join(", "));

            let out = match backend.write_rows(op, target, source, &key, &write) {
                Ok(h) => h,
                Err(e) => {
                    if write.in_place && !changed.is_empty() {
                        let done: Vec<&str> = changed.iter().map(|(t, _)| t.as_str()).collect();
                        log::warn!(
                            "{} : échec sur '{}', tables déjà écrites : [{}]",
                            op,
                            table,
                            done.join(", ")
                        );
                    }
                    return Err(e.into());
                }
            };
            if !backend.same_handle(target, &out) {
                changed.push((table.clone(), out));
            }
        }

        let changed_tables: Vec<String> = changed.iter().map(|(t, _)| t.clone()).collect();
        let outcome = if write.in_place {
            log::info!("{} : {} table(s) écrite(s) : [{}]", op, changed_tables.len(), changed_tables.join(", "));
            MutationOutcome::Committed(self.target.clone())
        } else {
            MutationOutcome::Staged(self.target.with_handles(changed))
        };

        Ok(MutationReport { outcome, changed_tables, notice })
    }
}
