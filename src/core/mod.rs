// =============================================================================
// CORE — Graphe de clés, filtres différés, écritures ordonnées
// =============================================================================
//
// Ce module ne lit ni n'écrit aucune ligne : il orchestre un TabularBackend.
//
// Architecture :
//   value     → les types de colonnes et les valeurs des cellules
//   schema    → tables, colonnes, clés étrangères
//   graph     → le KeyGraph : ordre topologique, chemins, cycles
//   filter    → les prédicats et le FilterSet
//   propagate → la propagation des filtres par semi-jointures
//   scheduler → les opérations de lignes, table par table
//   validate  → candidats de clé, contraintes, préconditions
//   model     → le DataModel qui réunit le tout
//   config    → réglages par défaut (TOML)
//   error     → DmError
//
// =============================================================================

pub mod config;
pub mod error;
pub mod filter;
pub mod graph;
pub mod model;
pub mod propagate;
pub mod scheduler;
pub mod schema;
pub mod validate;
pub mod value;

#[cfg(test)]
pub(crate) mod fixtures;
