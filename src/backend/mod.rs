// =============================================================================
// BACKEND — Couche d'abstraction pour le stockage tabulaire
// =============================================================================
//
// Le cœur (module core) ne lit et n'écrit JAMAIS de lignes lui-même. Il
// orchestre des appels à un TabularBackend, qui sait :
//   - projeter des colonnes                        (project)
//   - garder les lignes dont la clé apparaît
//     dans un autre ensemble (semi-jointure)       (semi_join_filter)
//   - évaluer un prédicat                          (apply_predicate)
//   - dédoublonner, compter                        (distinct, row_count)
//   - écrire des lignes (insert, update, ...)      (write_rows)
//
// Un Handle représente une table ou un résultat intermédiaire. C'est le
// backend qui décide s'il est paresseux (plan évalué plus tard, requête SQL)
// ou matérialisé. Le cœur se contente de les enchaîner et de comparer leur
// IDENTITÉ (`same_handle`) pour savoir si une écriture a changé quelque chose.
//
// Plusieurs data models peuvent partager une même session de backend ; le
// cœur ne la verrouille pas et ne la partage pas entre threads.
//
// =============================================================================

pub mod memory;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::core::config::{Conflict, Unmatched};
use crate::core::filter::Predicate;
use crate::core::scheduler::RowOperation;
use crate::core::schema::ColumnDef;

/// Identifiant d'une session (connexion) de backend.
///
/// Deux data models ne peuvent échanger des lignes que s'ils partagent la
/// même session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Nouvel identifiant, unique dans le processus.
    pub fn next() -> Self {
        static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);
        SessionId(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Options transmises au backend pour une écriture de lignes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub conflict: Conflict,
    pub unmatched: Unmatched,
    /// `false` : calculer le résultat sans toucher au stockage.
    /// `true`  : modifier le stockage pour de vrai.
    pub in_place: bool,
}

/// Erreur d'un backend. Le cœur la transmet sans l'interpréter.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("BackendError: table '{0}' inconnue")]
    UnknownTable(String),

    #[error("BackendError: colonne '{column}' inconnue ({context})")]
    UnknownColumn { column: String, context: String },

    #[error("BackendError: impossible de comparer {left} et {right} (colonne '{column}')")]
    Incomparable { column: String, left: String, right: String },

    #[error("BackendError: arités de clé différentes ({left} contre {right})")]
    KeyArity { left: usize, right: usize },

    #[error("BackendError: ligne de {found} valeur(s) pour {expected} colonne(s)")]
    RowWidth { expected: usize, found: usize },

    #[error("BackendError: clé déjà présente dans '{table}' : {key}")]
    DuplicateKey { table: String, key: String },

    #[error("BackendError: clé absente de '{table}' : {key}")]
    UnmatchedKey { table: String, key: String },

    #[error("BackendError: clé primaire nulle dans une ligne à écrire dans '{table}' : {key}")]
    NullKey { table: String, key: String },

    #[error("BackendError: écriture en place impossible, le handle ne désigne pas une table stockée")]
    NotStored,

    #[error("BackendError: la table '{0}' existe déjà")]
    TableExists(String),

    #[error("BackendError: verrou du stockage empoisonné")]
    Poisoned,
}

/// Le contrat d'un backend tabulaire.
pub trait TabularBackend: fmt::Debug {
    /// Une table ou un résultat intermédiaire.
    type Handle: Clone + fmt::Debug;

    /// La session (connexion) que ce backend représente.
    fn session(&self) -> SessionId;

    /// Colonnes d'un handle, dans l'ordre.
    fn columns(&self, handle: &Self::Handle) -> Result<Vec<ColumnDef>, BackendError>;

    fn project(&self, handle: &Self::Handle, columns: &[String]) -> Result<Self::Handle, BackendError>;

    /// Lignes de `left` dont les valeurs `left_keys` apparaissent parmi les
    /// valeurs `right_keys` de `right`. Une clé contenant NULL ne correspond
    /// jamais.
    fn semi_join_filter(
        &self,
        left: &Self::Handle,
        left_keys: &[String],
        right: &Self::Handle,
        right_keys: &[String],
    ) -> Result<Self::Handle, BackendError>;

    /// Lignes pour lesquelles le prédicat est vrai (inconnu = rejeté).
    fn apply_predicate(&self, handle: &Self::Handle, predicate: &Predicate) -> Result<Self::Handle, BackendError>;

    fn distinct(&self, handle: &Self::Handle) -> Result<Self::Handle, BackendError>;

    fn row_count(&self, handle: &Self::Handle) -> Result<usize, BackendError>;

    /// `write_rows` pourra-t-il écrire dans `target` avec ces options ?
    ///
    /// Appelé sur toutes les tables AVANT la première écriture, pour qu'une
    /// cible inutilisable n'arrive pas après des tables déjà écrites.
    fn check_writable(&self, target: &Self::Handle, options: &WriteOptions) -> Result<(), BackendError>;

    /// Applique une opération de lignes de `source` vers `target`, en appariant
    /// les lignes sur `key` (colonnes de la clé primaire de la cible).
    ///
    /// Doit renvoyer un handle IDENTIQUE à `target` (au sens de `same_handle`)
    /// quand aucune ligne n'a changé.
    fn write_rows(
        &self,
        op: RowOperation,
        target: &Self::Handle,
        source: &Self::Handle,
        key: &[String],
        options: &WriteOptions,
    ) -> Result<Self::Handle, BackendError>;

    /// Les deux handles sont-ils le même objet ?
    fn same_handle(&self, a: &Self::Handle, b: &Self::Handle) -> bool;
}

/// Générateur de noms de tables temporaires.
///
/// Injecté dans le backend qui en a besoin : le cœur n'en crée jamais.
pub trait TempNames: fmt::Debug + Send + Sync {
    fn next_name(&self, prefix: &str) -> String;
}

/// `prefix_1`, `prefix_2`, ... avec un compteur atomique par générateur.
#[derive(Debug, Default)]
pub struct SequentialNames {
    counter: AtomicU64,
}

impl SequentialNames {
    pub fn new() -> Self {
        SequentialNames::default()
    }
}

impl TempNames for SequentialNames {
    fn next_name(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}_{}", prefix, n)
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_sequential_names() {
        let names = SequentialNames::new();
        assert_eq!(names.next_name("flights"), "flights_1");
        assert_eq!(names.next_name("airports"), "airports_2");
    }
}
