// =============================================================================
// VALUE — Les types primitifs et les valeurs des cellules
// =============================================================================
//
// Chaque colonne d'une table a un BaseType, chaque cellule contient une Value.
// Les valeurs servent surtout de CLÉS : un semi-join compare des tuples de
// valeurs, donc Value doit être hachable et comparable par égalité, y compris
// pour les flottants (comparés bit à bit).
//
// SÉMANTIQUE NULL (comme en SQL) :
//   - NULL n'est égal à rien, pas même à NULL, lors d'une jointure
//   - une comparaison avec NULL est "inconnue" et la ligne est rejetée
// L'égalité structurelle (Eq) ci-dessous considère NULL == NULL : c'est
// l'égalité des données, pas celle des jointures. Les backends excluent les
// clés NULL avant de construire leurs ensembles de clés.
//
// =============================================================================

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Un type de colonne.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    /// Chaîne de caractères (→ VARCHAR en SQL)
    String,
    /// Entier (→ INTEGER en SQL)
    Integer,
    /// Nombre à virgule flottante (→ DOUBLE en SQL)
    Float,
    /// Booléen (→ BOOLEAN en SQL)
    Boolean,
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseType::String => write!(f, "String"),
            BaseType::Integer => write!(f, "Int"),
            BaseType::Float => write!(f, "Float"),
            BaseType::Boolean => write!(f, "Bool"),
        }
    }
}

/// Une valeur concrète dans une cellule.
#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl Value {
    /// Le type de la valeur ; `None` pour NULL, qui appartient à tous les types.
    pub fn base_type(&self) -> Option<BaseType> {
        match self {
            Value::String(_) => Some(BaseType::String),
            Value::Integer(_) => Some(BaseType::Integer),
            Value::Float(_) => Some(BaseType::Float),
            Value::Boolean(_) => Some(BaseType::Boolean),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Ordre partiel entre deux valeurs non nulles.
    ///
    /// Int et Float se comparent numériquement entre eux. Deux types
    /// différents (ou un NULL) renvoient `None` : la comparaison est inconnue.
    pub fn partial_cmp_value(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_value_types() {
        assert_eq!(Value::from("JFK").base_type(), Some(BaseType::String));
        assert_eq!(Value::from(5).base_type(), Some(BaseType::Integer));
        assert_eq!(Value::Null.base_type(), None);
    }

    #[test]
    fn test_numeric_cross_compare() {
        let a = Value::Integer(3);
        let b = Value::Float(3.5);
        assert_eq!(a.partial_cmp_value(&b), Some(Ordering::Less));
        assert_eq!(Value::from("a").partial_cmp_value(&a), None);
        assert_eq!(Value::Null.partial_cmp_value(&Value::Null), None);
    }

    #[test]
    fn test_values_as_hash_keys() {
        let keys: HashSet<Vec<Value>> = [
            vec![Value::from("UA"), Value::Float(1.5)],
            vec![Value::from("UA"), Value::Float(1.5)],
            vec![Value::from("DL"), Value::Float(1.5)],
        ]
        .into_iter()
        .collect();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_option_into_value() {
        let none: Option<i64> = None;
        assert!(Value::from(none).is_null());
        assert_eq!(Value::from(Some("x")), Value::from("x"));
    }
}
