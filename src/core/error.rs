// =============================================================================
// ERROR — La taxonomie des erreurs du cœur
// =============================================================================
//
// Une seule énumération pour tout le cœur. Chaque variante correspond à une
// famille d'échec :
//
//   Schema / UnknownTable       → déclaration de clés mal formée (fatal)
//   CyclicGraph                 → cycle là où l'acyclicité est requise
//                                 (fatal pour l'opération seulement)
//   PendingFilters              → métadonnées demandées alors que des filtres
//                                 ne sont pas encore appliqués (récupérable)
//   SourceMismatch, MissingTable, MissingColumn, Zoomed, KeyMismatch,
//   MissingPrimaryKey           → préconditions d'une mutation par lots
//   Backend                     → erreur du backend, transmise telle quelle
//
// Le cœur ne réessaie jamais rien.
//
// =============================================================================

use thiserror::Error;

use crate::backend::BackendError;

/// Alias de résultat pour tout le crate.
pub type DmResult<T> = std::result::Result<T, DmError>;

#[derive(Debug, Error)]
pub enum DmError {
    /// Déclaration de table ou de clé invalide.
    #[error("SchemaError: {0}")]
    Schema(String),

    #[error("UnknownTable: la table '{0}' n'existe pas dans le data model")]
    UnknownTable(String),

    /// Le périmètre demandé contient un cycle de clés étrangères.
    #[error("CyclicGraphError: cycle entre les tables [{}]", .tables.join(", "))]
    CyclicGraph { tables: Vec<String> },

    #[error(
        "PendingFiltersError: '{operation}' exige un data model sans filtres en attente ; \
         appelez apply_filters() d'abord"
    )]
    PendingFilters { operation: &'static str },

    #[error("SourceMismatchError: les deux data models n'utilisent pas la même session de backend")]
    SourceMismatch,

    #[error("MissingTableError: tables absentes de la cible : [{}]", .tables.join(", "))]
    MissingTable { tables: Vec<String> },

    #[error("MissingColumnError: table '{table}', colonnes absentes de la cible : [{}]", .columns.join(", "))]
    MissingColumn { table: String, columns: Vec<String> },

    #[error("ZoomedStateError: '{operation}' impossible, le data model est zoomé sur '{table}'")]
    Zoomed { operation: &'static str, table: String },

    #[error("KeyMismatchError: table '{table}' : {reason}")]
    KeyMismatch { table: String, reason: String },

    #[error("MissingPrimaryKeyError: '{operation}' exige une clé primaire sur '{table}'")]
    MissingPrimaryKey { operation: &'static str, table: String },

    #[error("ConfigError: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl DmError {
    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        DmError::Schema(msg.into())
    }
}
