// =============================================================================
// CONFIG — Réglages par défaut des mutations et des vérifications de clés
// =============================================================================
//
// Un DmConfig est attaché à chaque DataModel. Il se charge depuis du TOML :
//
// ```toml
// [rows]
// in_place = false       # absent = "non précisé" (avertissement + simulation)
// conflict = "ignore"    # insert : "error" | "ignore"
// unmatched = "error"    # update/patch/delete : "error" | "ignore"
//
// [keys]
// check_types = true
// ```
//
// =============================================================================

use serde::{Deserialize, Serialize};

use super::error::DmResult;

/// Que faire quand un INSERT rencontre une clé déjà présente ?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Conflict {
    #[default]
    Error,
    Ignore,
}

/// Que faire quand UPDATE/PATCH/DELETE vise une clé absente de la cible ?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unmatched {
    #[default]
    Error,
    Ignore,
}

/// Options d'une opération sur les lignes.
///
/// `in_place` est un drapeau à trois états : `None` signifie "non précisé",
/// ce qui se comporte comme `Some(false)` mais émet une notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RowsOptions {
    pub in_place: Option<bool>,
    pub conflict: Conflict,
    pub unmatched: Unmatched,
}

impl RowsOptions {
    /// Options "simulation" explicites : aucune écriture, aucune notice.
    pub fn staged() -> Self {
        RowsOptions { in_place: Some(false), ..Default::default() }
    }

    /// Options "écriture réelle" : le backend est modifié.
    pub fn in_place() -> Self {
        RowsOptions { in_place: Some(true), ..Default::default() }
    }

    pub fn with_conflict(mut self, conflict: Conflict) -> Self {
        self.conflict = conflict;
        self
    }

    pub fn with_unmatched(mut self, unmatched: Unmatched) -> Self {
        self.unmatched = unmatched;
        self
    }
}

/// Réglages de la vérification de compatibilité des clés entre deux models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Comparer aussi les types des colonnes de clé primaire (pas seulement les noms).
    pub check_types: bool,
}

impl Default for KeysConfig {
    fn default() -> Self {
        KeysConfig { check_types: true }
    }
}

/// Configuration globale d'un DataModel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DmConfig {
    /// Options par défaut des opérations sur les lignes.
    pub rows: RowsOptions,
    pub keys: KeysConfig,
}

impl DmConfig {
    /// Lit une configuration TOML ; les sections absentes prennent leurs défauts.
    pub fn from_toml_str(text: &str) -> DmResult<Self> {
        Ok(toml::from_str(text)?)
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::DmError;

    #[test]
    fn test_defaults() {
        let cfg = DmConfig::default();
        assert_eq!(cfg.rows.in_place, None);
        assert_eq!(cfg.rows.conflict, Conflict::Error);
        assert!(cfg.keys.check_types);
    }

    #[test]
    fn test_from_toml() {
        let cfg = DmConfig::from_toml_str(
            r#"
            [rows]
            in_place = false
            conflict = "ignore"

            [keys]
            check_types = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.rows.in_place, Some(false));
        assert_eq!(cfg.rows.conflict, Conflict::Ignore);
        assert_eq!(cfg.rows.unmatched, Unmatched::Error);
        assert!(!cfg.keys.check_types);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(DmConfig::from_toml_str("").unwrap(), DmConfig::default());
    }

    #[test]
    fn test_bad_toml() {
        let err = DmConfig::from_toml_str("[rows]\nconflict = \"maybe\"").unwrap_err();
        assert!(matches!(err, DmError::Config(_)));
    }
}
