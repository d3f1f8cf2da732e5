// =============================================================================
// SCHEMA — Les déclarations de tables et de clés
// =============================================================================
//
// Un data model relationnel est décrit par :
//   - des TABLES : un nom, des colonnes typées, une clé primaire (peut-être
//     vide) et d'éventuelles clés candidates uniques
//   - des CLÉS ÉTRANGÈRES : (table enfant, colonnes enfant) → (table parent,
//     colonnes parent)
//
// EXEMPLE VISUEL :
//
//   flights ──origin──▶ airports(faa)
//      │
//      └──carrier──▶ airlines(carrier)
//
//   weather   (aucune clé, isolée)
//
// Une KeyEdge est orientée de l'enfant vers le parent : c'est le sens de la
// référence. Le sens dans lequel un FILTRE se propage est une autre affaire,
// voir graph.rs et propagate.rs.
//
// =============================================================================

use std::fmt;

use super::value::BaseType;

/// Une colonne déclarée : nom + type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnDef {
    pub name: String,
    pub ty: BaseType,
}

impl ColumnDef {
    pub fn new(name: &str, ty: BaseType) -> Self {
        ColumnDef { name: name.to_string(), ty }
    }
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

/// Une table du data model (nœud du graphe de clés).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Clé primaire, éventuellement vide.
    pub primary_key: Vec<String>,
    /// Clés candidates uniques déclarées en plus de la clé primaire.
    pub unique_keys: Vec<Vec<String>>,
}

impl TableDef {
    pub fn new(name: &str, columns: Vec<ColumnDef>) -> Self {
        TableDef {
            name: name.to_string(),
            columns,
            primary_key: Vec::new(),
            unique_keys: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Colonnes de `cols` qui n'existent pas dans cette table.
    pub fn missing_columns<'a>(&self, cols: &'a [String]) -> Vec<&'a String> {
        cols.iter().filter(|c| !self.has_column(c)).collect()
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// `cols` est-elle la clé primaire ou une clé unique déclarée ?
    /// L'ordre des colonnes compte : c'est l'appariement avec la FK.
    pub fn is_candidate_key(&self, cols: &[String]) -> bool {
        if cols.is_empty() {
            return false;
        }
        self.primary_key.as_slice() == cols || self.unique_keys.iter().any(|k| k.as_slice() == cols)
    }
}

impl fmt::Display for TableDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols: Vec<String> = self.columns.iter().map(|c| c.to_string()).collect();
        write!(f, "{}({})", self.name, cols.join(", "))?;
        if self.has_primary_key() {
            write!(f, " pk[{}]", self.primary_key.join(", "))?;
        }
        for uk in &self.unique_keys {
            write!(f, " uk[{}]", uk.join(", "))?;
        }
        Ok(())
    }
}

/// Une clé étrangère : `child(child_columns) → parent(parent_columns)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyEdge {
    pub child: String,
    pub child_columns: Vec<String>,
    pub parent: String,
    pub parent_columns: Vec<String>,
}

impl KeyEdge {
    pub fn new(child: &str, child_columns: &[&str], parent: &str, parent_columns: &[&str]) -> Self {
        KeyEdge {
            child: child.to_string(),
            child_columns: child_columns.iter().map(|c| c.to_string()).collect(),
            parent: parent.to_string(),
            parent_columns: parent_columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl fmt::Display for KeyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) -> {}({})",
            self.child,
            self.child_columns.join(", "),
            self.parent,
            self.parent_columns.join(", ")
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn airports() -> TableDef {
        let mut t = TableDef::new(
            "airports",
            vec![
                ColumnDef::new("faa", BaseType::String),
                ColumnDef::new("name", BaseType::String),
            ],
        );
        t.primary_key = vec!["faa".into()];
        t
    }

    #[test]
    fn test_candidate_key() {
        let mut t = airports();
        assert!(t.is_candidate_key(&["faa".into()]));
        assert!(!t.is_candidate_key(&["name".into()]));
        assert!(!t.is_candidate_key(&[]));
        t.unique_keys.push(vec!["name".into()]);
        assert!(t.is_candidate_key(&["name".into()]));
    }

    #[test]
    fn test_missing_columns() {
        let t = airports();
        let cols = vec!["faa".to_string(), "tz".to_string()];
        assert_eq!(t.missing_columns(&cols), vec![&"tz".to_string()]);
    }

    #[test]
    fn test_display() {
        let t = airports();
        assert_eq!(t.to_string(), "airports(faa: String, name: String) pk[faa]");
        let e = KeyEdge::new("flights", &["origin"], "airports", &["faa"]);
        assert_eq!(e.to_string(), "flights(origin) -> airports(faa)");
    }
}
