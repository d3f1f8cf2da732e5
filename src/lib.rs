// =============================================================================
// DMFLOW — Data models relationnels à filtres différés
// =============================================================================
//
// dmflow décrit un ensemble de tables reliées par des clés primaires et
// étrangères, et permet :
//   - de poser des filtres sur n'importe quelle table, dont l'effet se
//     propage par semi-jointures à toutes les tables atteignables avant
//     toute matérialisation
//   - d'appliquer une opération de lignes (insert, update, delete...) à
//     plusieurs tables, dans un ordre compatible avec les clés
//
// Architecture :
//   core/     → graphe de clés, filtres, ordonnancement (aucune ligne lue)
//   backend/  → le contrat TabularBackend et un backend en mémoire
//
// =============================================================================

pub mod backend;
pub mod core;

pub use crate::backend::memory::{Frame, MemHandle, MemoryBackend};
pub use crate::backend::{BackendError, SequentialNames, SessionId, TabularBackend, TempNames, WriteOptions};
pub use crate::core::config::{Conflict, DmConfig, RowsOptions, Unmatched};
pub use crate::core::error::{DmError, DmResult};
pub use crate::core::filter::{CompOp, FilterSet, Predicate};
pub use crate::core::graph::{Direction, KeyGraph};
pub use crate::core::model::{DataModel, Zoom};
pub use crate::core::scheduler::{MutationOutcome, MutationReport, RowOperation};
pub use crate::core::schema::{ColumnDef, KeyEdge, TableDef};
pub use crate::core::value::{BaseType, Value};
