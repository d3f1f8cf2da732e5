// =============================================================================
// GRAPH — Le graphe des clés (tables + clés étrangères)
// =============================================================================
//
// Le KeyGraph est un graphe orienté :
//   - NŒUDS  : les tables, dans leur ordre d'insertion
//   - ARÊTES : les KeyEdge, orientées enfant → parent
//
// Il répond à trois questions :
//
//   1. topo_order(scope, direction)
//      Dans quel ordre traiter un ensemble de tables pour que les parents
//      passent avant les enfants (ParentFirst : INSERT, UPDATE...) ou après
//      (ChildFirst : DELETE, TRUNCATE) ? Algorithme de Kahn, les égalités
//      sont départagées par l'ordre d'insertion des tables, donc le résultat
//      est déterministe. ChildFirst est exactement l'inverse de ParentFirst.
//
//   2. reachable_paths(from, to)
//      Par quelles arêtes un filtre posé sur `from` atteint-il `to` ?
//      Un chemin est MONOTONE : soit il ne fait que monter (enfant → parent,
//      `from` est un descendant de `to`), soit il ne fait que descendre
//      (parent → enfant, `from` est un ancêtre de `to`).
//
//        airports ◀── flights ──▶ airlines
//
//      airports → flights : descente, le filtre passe.
//      airports → airlines : descente PUIS montée, pas de chemin.
//
//   3. Les cycles
//      Le graphe PEUT contenir des cycles (auto-références, références
//      croisées). On ne les refuse qu'au moment où un ordre est exigé, et
//      seulement sur le périmètre demandé.
//
// =============================================================================

use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;

use super::error::{DmError, DmResult};
use super::schema::{ColumnDef, KeyEdge, TableDef};

/// Sens d'un ordre topologique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Les parents avant les enfants (les dépendances existent d'abord).
    ParentFirst,
    /// Les enfants avant les parents (les dépendants disparaissent d'abord).
    ChildFirst,
}

/// Sens dans lequel un filtre traverse une arête.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    /// De l'enfant vers le parent : on garde les parents encore référencés.
    TowardParents,
    /// Du parent vers l'enfant : on garde les enfants dont le parent a survécu.
    TowardChildren,
}

/// Une arête orientée dans le sens de la propagation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hop {
    pub edge: KeyEdge,
    pub flow: Flow,
}

impl Hop {
    /// Table déjà restreinte, qui restreint sa voisine.
    pub fn from(&self) -> &str {
        match self.flow {
            Flow::TowardParents => &self.edge.child,
            Flow::TowardChildren => &self.edge.parent,
        }
    }

    /// Table restreinte par ce saut.
    pub fn to(&self) -> &str {
        match self.flow {
            Flow::TowardParents => &self.edge.parent,
            Flow::TowardChildren => &self.edge.child,
        }
    }

    pub fn from_columns(&self) -> &[String] {
        match self.flow {
            Flow::TowardParents => &self.edge.child_columns,
            Flow::TowardChildren => &self.edge.parent_columns,
        }
    }

    pub fn to_columns(&self) -> &[String] {
        match self.flow {
            Flow::TowardParents => &self.edge.parent_columns,
            Flow::TowardChildren => &self.edge.child_columns,
        }
    }
}

impl std::fmt::Display for Hop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({}) ⟶ {}({})",
            self.from(),
            self.from_columns().join(", "),
            self.to(),
            self.to_columns().join(", ")
        )
    }
}

/// Le graphe des clés d'un data model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyGraph {
    tables: IndexMap<String, TableDef>,
    edges: Vec<KeyEdge>,
}

impl KeyGraph {
    pub fn new() -> Self {
        KeyGraph::default()
    }

    // ─── Construction ────────────────────────────────────────────────────────

    /// Ajoute une table ; son nom doit être unique.
    pub fn add_table(&mut self, name: &str, columns: Vec<ColumnDef>) -> DmResult<&mut Self> {
        if self.tables.contains_key(name) {
            return Err(DmError::schema(format!("la table '{}' existe déjà", name)));
        }
        self.tables.insert(name.to_string(), TableDef::new(name, columns));
        Ok(self)
    }

    /// Déclare (ou remplace) la clé primaire d'une table.
    ///
    /// Remplacer une clé primaire encore référencée par une FK est refusé,
    /// sauf si l'ancienne clé reste déclarée comme clé unique.
    pub fn set_primary_key(&mut self, table: &str, columns: &[&str]) -> DmResult<&mut Self> {
        let cols = owned(columns);
        let def = self.table_checked(table)?;
        check_key_columns(def, &cols)?;

        let old = def.primary_key.clone();
        if !old.is_empty() && old != cols && !def.unique_keys.contains(&old) {
            if let Some(edge) = self.edges.iter().find(|e| e.parent == table && e.parent_columns == old) {
                return Err(DmError::schema(format!(
                    "la clé primaire de '{}' est référencée par {}",
                    table, edge
                )));
            }
        }
        self.table_mut(table)?.primary_key = cols;
        Ok(self)
    }

    /// Déclare une clé candidate unique (cible possible d'une FK).
    pub fn add_unique_key(&mut self, table: &str, columns: &[&str]) -> DmResult<&mut Self> {
        let cols = owned(columns);
        let def = self.table_checked(table)?;
        check_key_columns(def, &cols)?;
        if !def.unique_keys.contains(&cols) {
            self.table_mut(table)?.unique_keys.push(cols);
        }
        Ok(self)
    }

    /// Déclare une clé étrangère `child(child_cols) → parent(parent_cols)`.
    ///
    /// Échoue avec `SchemaError` si les arités diffèrent, si une colonne
    /// n'existe pas, si les types appariés diffèrent, ou si `parent_cols`
    /// n'est ni la clé primaire ni une clé unique du parent.
    pub fn add_edge(
        &mut self,
        child: &str,
        child_cols: &[&str],
        parent: &str,
        parent_cols: &[&str],
    ) -> DmResult<&mut Self> {
        let edge = KeyEdge::new(child, child_cols, parent, parent_cols);
        let child_def = self.table_checked(child)?;
        let parent_def = self.table_checked(parent)?;

        if edge.child_columns.is_empty() || edge.child_columns.len() != edge.parent_columns.len() {
            return Err(DmError::schema(format!(
                "{} : arités différentes ({} colonne(s) enfant, {} colonne(s) parent)",
                edge,
                edge.child_columns.len(),
                edge.parent_columns.len()
            )));
        }
        for (def, cols) in [(child_def, &edge.child_columns), (parent_def, &edge.parent_columns)] {
            let missing = def.missing_columns(cols);
            if !missing.is_empty() {
                let names: Vec<&str> = missing.iter().map(|c| c.as_str()).collect();
                return Err(DmError::schema(format!(
                    "{} : colonnes inconnues dans '{}' : {}",
                    edge,
                    def.name,
                    names.join(", ")
                )));
            }
        }
        for (c, p) in edge.child_columns.iter().zip(&edge.parent_columns) {
            let (ct, pt) = (child_def.column(c), parent_def.column(p));
            if let (Some(ct), Some(pt)) = (ct, pt) {
                if ct.ty != pt.ty {
                    return Err(DmError::schema(format!(
                        "{} : types incompatibles {}.{} ({}) et {}.{} ({})",
                        edge, child, c, ct.ty, parent, p, pt.ty
                    )));
                }
            }
        }
        if !parent_def.is_candidate_key(&edge.parent_columns) {
            return Err(DmError::schema(format!(
                "{} : ({}) n'est pas une clé déclarée de '{}'",
                edge,
                edge.parent_columns.join(", "),
                parent
            )));
        }
        if self.edges.contains(&edge) {
            return Err(DmError::schema(format!("{} est déjà déclarée", edge)));
        }

        self.edges.push(edge);
        Ok(self)
    }

    // ─── Lecture ─────────────────────────────────────────────────────────────

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    /// Comme `table`, mais une table absente est une erreur.
    pub fn table_checked(&self, name: &str) -> DmResult<&TableDef> {
        self.tables
            .get(name)
            .ok_or_else(|| DmError::UnknownTable(name.to_string()))
    }

    /// Les tables, dans l'ordre d'insertion.
    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.values()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn edges(&self) -> &[KeyEdge] {
        &self.edges
    }

    /// FK déclarées par une table enfant.
    pub fn edges_from(&self, child: &str) -> Vec<&KeyEdge> {
        self.edges.iter().filter(|e| e.child == child).collect()
    }

    /// FK qui pointent vers une table parent.
    pub fn edges_into(&self, parent: &str) -> Vec<&KeyEdge> {
        self.edges.iter().filter(|e| e.parent == parent).collect()
    }

    /// Parents directs, sans doublon, dans l'ordre des arêtes.
    pub fn parents_of(&self, table: &str) -> Vec<&str> {
        dedup(self.edges_from(table).into_iter().map(|e| e.parent.as_str()))
    }

    /// Enfants directs, sans doublon, dans l'ordre des arêtes.
    pub fn children_of(&self, table: &str) -> Vec<&str> {
        dedup(self.edges_into(table).into_iter().map(|e| e.child.as_str()))
    }

    // ─── Ordre topologique ───────────────────────────────────────────────────

    /// Ordonne exactement les tables de `scope`.
    ///
    /// Seules les arêtes dont les deux extrémités sont dans `scope` contraignent
    /// l'ordre. Échoue avec `CyclicGraph` si et seulement si ce sous-graphe
    /// induit contient un cycle ; l'erreur ne nomme que les tables du cycle.
    pub fn topo_order<S: AsRef<str>>(&self, scope: &[S], direction: Direction) -> DmResult<Vec<String>> {
        // Indices d'insertion des tables du périmètre (sans doublon)
        let mut in_scope: BTreeSet<usize> = BTreeSet::new();
        for name in scope {
            let idx = self
                .tables
                .get_index_of(name.as_ref())
                .ok_or_else(|| DmError::UnknownTable(name.as_ref().to_string()))?;
            in_scope.insert(idx);
        }

        // Arêtes internes au périmètre, en indices (enfant, parent)
        let inner: Vec<(usize, usize)> = self
            .edges
            .iter()
            .filter_map(|e| {
                let c = self.tables.get_index_of(&e.child)?;
                let p = self.tables.get_index_of(&e.parent)?;
                (in_scope.contains(&c) && in_scope.contains(&p)).then_some((c, p))
            })
            .collect();

        // Kahn : degré entrant = nombre d'arêtes vers un parent du périmètre
        let mut in_degree: HashMap<usize, usize> = in_scope.iter().map(|&i| (i, 0)).collect();
        for &(c, _) in &inner {
            *in_degree.entry(c).or_default() += 1;
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(&i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(in_scope.len());

        while let Some(idx) = ready.pop_first() {
            order.push(idx);
            for &(c, p) in &inner {
                if p == idx {
                    if let Some(d) = in_degree.get_mut(&c) {
                        *d -= 1;
                        if *d == 0 {
                            ready.insert(c);
                        }
                    }
                }
            }
        }

        if order.len() != in_scope.len() {
            let placed: BTreeSet<usize> = order.iter().copied().collect();
            let remaining: BTreeSet<usize> = in_scope.difference(&placed).copied().collect();
            return Err(DmError::CyclicGraph {
                tables: self.names(&cycle_core(remaining, &inner)),
            });
        }

        let mut names = self.names(&order);
        if direction == Direction::ChildFirst {
            names.reverse();
        }
        Ok(names)
    }

    /// Le périmètre contient-il un cycle ?
    pub fn has_cycle<S: AsRef<str>>(&self, scope: &[S]) -> DmResult<bool> {
        match self.topo_order(scope, Direction::ParentFirst) {
            Ok(_) => Ok(false),
            Err(DmError::CyclicGraph { .. }) => Ok(true),
            Err(e) => Err(e),
        }
    }

    // ─── Accessibilité ───────────────────────────────────────────────────────

    /// Arêtes situées sur un chemin montant (enfant → parent) de `from` à `to`.
    pub fn ancestors_between(&self, from: &str, to: &str) -> DmResult<Vec<&KeyEdge>> {
        self.table_checked(from)?;
        self.table_checked(to)?;
        Ok(self.monotone_edges(from, to, Flow::TowardParents))
    }

    /// Sauts par lesquels un filtre posé sur `from` atteint `to`.
    ///
    /// Vide si aucun chemin monotone n'existe : la table `to` n'est alors pas
    /// affectée par les filtres de `from`. Ce n'est pas une erreur.
    pub fn reachable_paths(&self, from: &str, to: &str) -> DmResult<Vec<Hop>> {
        self.table_checked(from)?;
        self.table_checked(to)?;

        let mut hops = Vec::new();
        for flow in [Flow::TowardParents, Flow::TowardChildren] {
            hops.extend(
                self.monotone_edges(from, to, flow)
                    .into_iter()
                    .map(|edge| Hop { edge: edge.clone(), flow }),
            );
        }
        Ok(hops)
    }

    /// Arêtes sur un chemin de `from` à `to` qui suit toujours le même sens.
    ///
    /// Une arête (u ⟶ v) est sur un tel chemin ssi `from` atteint u et v atteint
    /// `to`. Sur un graphe acyclique, les deux sens ne peuvent pas être
    /// non vides en même temps.
    fn monotone_edges(&self, from: &str, to: &str, flow: Flow) -> Vec<&KeyEdge> {
        if from == to {
            return Vec::new();
        }
        let forward = self.reach(from, flow);
        if !forward.contains(to) {
            return Vec::new();
        }
        let backward = self.reach(to, opposite(flow));

        self.edges
            .iter()
            .filter(|e| {
                let (u, v) = match flow {
                    Flow::TowardParents => (e.child.as_str(), e.parent.as_str()),
                    Flow::TowardChildren => (e.parent.as_str(), e.child.as_str()),
                };
                forward.contains(u) && backward.contains(v)
            })
            .collect()
    }

    /// Tables atteignables depuis `start` (incluse) en suivant un seul sens.
    fn reach<'a>(&'a self, start: &'a str, flow: Flow) -> HashSet<&'a str> {
        let mut seen: HashSet<&str> = HashSet::from([start]);
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for e in &self.edges {
                let next = match flow {
                    Flow::TowardParents if e.child == node => e.parent.as_str(),
                    Flow::TowardChildren if e.parent == node => e.child.as_str(),
                    _ => continue,
                };
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }

    // ─── Projections du graphe ───────────────────────────────────────────────

    /// Ne garde que les tables nommées ; les arêtes qui touchent une table
    /// retirée disparaissent.
    pub fn retain_tables<S: AsRef<str>>(&mut self, keep: &[S]) -> DmResult<()> {
        for name in keep {
            self.table_checked(name.as_ref())?;
        }
        let keep: HashSet<&str> = keep.iter().map(|s| s.as_ref()).collect();
        self.tables.retain(|name, _| keep.contains(name.as_str()));
        self.edges
            .retain(|e| keep.contains(e.child.as_str()) && keep.contains(e.parent.as_str()));
        Ok(())
    }

    /// Renomme une table ; les arêtes suivent. La position est conservée.
    pub fn rename_table(&mut self, old: &str, new: &str) -> DmResult<()> {
        if old == new {
            return self.table_checked(old).map(|_| ());
        }
        if self.tables.contains_key(new) {
            return Err(DmError::schema(format!("la table '{}' existe déjà", new)));
        }
        let idx = self
            .tables
            .get_index_of(old)
            .ok_or_else(|| DmError::UnknownTable(old.to_string()))?;
        let (_, mut def) = self
            .tables
            .shift_remove_index(idx)
            .ok_or_else(|| DmError::UnknownTable(old.to_string()))?;
        def.name = new.to_string();
        self.tables.shift_insert(idx, new.to_string(), def);

        for e in &mut self.edges {
            if e.child == old {
                e.child = new.to_string();
            }
            if e.parent == old {
                e.parent = new.to_string();
            }
        }
        Ok(())
    }

    // ─── Interne ─────────────────────────────────────────────────────────────

    fn table_mut(&mut self, name: &str) -> DmResult<&mut TableDef> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DmError::UnknownTable(name.to_string()))
    }

    fn names(&self, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .filter_map(|&i| self.tables.get_index(i).map(|(k, _)| k.clone()))
            .collect()
    }
}

impl std::fmt::Display for KeyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "tables")?;
        for t in self.tables.values() {
            writeln!(f, "  {}", t)?;
        }
        if !self.edges.is_empty() {
            writeln!(f, "foreign_keys")?;
            for e in &self.edges {
                writeln!(f, "  {}", e)?;
            }
        }
        Ok(())
    }
}

fn owned(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

fn opposite(flow: Flow) -> Flow {
    match flow {
        Flow::TowardParents => Flow::TowardChildren,
        Flow::TowardChildren => Flow::TowardParents,
    }
}

fn dedup<'a>(names: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    names.filter(|n| seen.insert(*n)).collect()
}

fn check_key_columns(def: &TableDef, cols: &[String]) -> DmResult<()> {
    if cols.is_empty() {
        return Err(DmError::schema(format!("clé vide pour '{}'", def.name)));
    }
    let missing = def.missing_columns(cols);
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|c| c.as_str()).collect();
        return Err(DmError::schema(format!(
            "colonnes inconnues dans '{}' : {}",
            def.name,
            names.join(", ")
        )));
    }
    Ok(())
}

/// Réduit les tables restantes après Kahn à celles qui sont SUR un cycle :
/// on retire tant qu'il en existe les tables sans enfant restant (elles
/// sont seulement en aval d'un cycle).
fn cycle_core(mut remaining: BTreeSet<usize>, inner: &[(usize, usize)]) -> Vec<usize> {
    loop {
        let sinks: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&n| !inner.iter().any(|&(c, p)| p == n && remaining.contains(&c)))
            .collect();
        if sinks.is_empty() {
            return remaining.into_iter().collect();
        }
        for s in sinks {
            remaining.remove(&s);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::BaseType;
    use proptest::prelude::*;

    fn col(name: &str) -> ColumnDef {
        ColumnDef::new(name, BaseType::String)
    }

    /// airports ◀── flights ──▶ airlines, weather isolée
    fn flights_graph() -> KeyGraph {
        let mut g = KeyGraph::new();
        g.add_table("airports", vec![col("faa"), col("name")]).unwrap();
        g.add_table("flights", vec![col("origin"), col("carrier"), col("month")]).unwrap();
        g.add_table("airlines", vec![col("carrier"), col("name")]).unwrap();
        g.add_table("weather", vec![col("origin"), col("temp")]).unwrap();
        g.set_primary_key("airports", &["faa"]).unwrap();
        g.set_primary_key("airlines", &["carrier"]).unwrap();
        g.add_edge("flights", &["origin"], "airports", &["faa"]).unwrap();
        g.add_edge("flights", &["carrier"], "airlines", &["carrier"]).unwrap();
        g
    }

    /// a ◀── b ◀── c (c enfant de b, b enfant de a)
    fn chain() -> KeyGraph {
        let mut g = KeyGraph::new();
        for t in ["a", "b", "c"] {
            g.add_table(t, vec![col("id"), col("up")]).unwrap();
            g.set_primary_key(t, &["id"]).unwrap();
        }
        g.add_edge("b", &["up"], "a", &["id"]).unwrap();
        g.add_edge("c", &["up"], "b", &["id"]).unwrap();
        g
    }

    #[test]
    fn test_add_edge_errors() {
        let mut g = flights_graph();
        // arité
        let err = g.add_edge("flights", &["origin", "month"], "airports", &["faa"]).unwrap_err();
        assert!(matches!(err, DmError::Schema(_)));
        // pas une clé du parent
        let err = g.add_edge("flights", &["origin"], "airports", &["name"]).unwrap_err();
        assert!(matches!(err, DmError::Schema(_)));
        // table inconnue
        let err = g.add_edge("planes", &["tailnum"], "airports", &["faa"]).unwrap_err();
        assert!(matches!(err, DmError::UnknownTable(t) if t == "planes"));
        // colonne inconnue
        let err = g.add_edge("flights", &["dest"], "airports", &["faa"]).unwrap_err();
        assert!(matches!(err, DmError::Schema(_)));
        // doublon
        let err = g.add_edge("flights", &["origin"], "airports", &["faa"]).unwrap_err();
        assert!(matches!(err, DmError::Schema(_)));
    }

    #[test]
    fn test_edge_to_unique_key() {
        let mut g = flights_graph();
        g.add_unique_key("airports", &["name"]).unwrap();
        g.add_table("trips", vec![col("airport_name")]).unwrap();
        assert!(g.add_edge("trips", &["airport_name"], "airports", &["name"]).is_ok());
    }

    #[test]
    fn test_type_mismatch() {
        let mut g = flights_graph();
        g.add_table("gates", vec![ColumnDef::new("airport", BaseType::Integer)]).unwrap();
        let err = g.add_edge("gates", &["airport"], "airports", &["faa"]).unwrap_err();
        assert!(matches!(err, DmError::Schema(m) if m.contains("types incompatibles")));
    }

    #[test]
    fn test_referenced_pk_cannot_change() {
        let mut g = flights_graph();
        assert!(g.set_primary_key("airports", &["name"]).is_err());
        g.add_unique_key("airports", &["faa"]).unwrap();
        assert!(g.set_primary_key("airports", &["name"]).is_ok());
    }

    #[test]
    fn test_topo_order_directions() {
        let g = chain();
        let scope = ["c", "a", "b"];
        assert_eq!(g.topo_order(&scope, Direction::ParentFirst).unwrap(), vec!["a", "b", "c"]);
        assert_eq!(g.topo_order(&scope, Direction::ChildFirst).unwrap(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_topo_order_exact_scope() {
        let g = chain();
        let order = g.topo_order(&["a", "b"], Direction::ParentFirst).unwrap();
        assert_eq!(order, vec!["a", "b"]);
        assert!(!order.contains(&"c".to_string()));
    }

    #[test]
    fn test_topo_order_tie_break_by_insertion() {
        let g = flights_graph();
        let order = g
            .topo_order(&["weather", "flights", "airlines", "airports"], Direction::ParentFirst)
            .unwrap();
        assert_eq!(order, vec!["airports", "airlines", "flights", "weather"]);
    }

    #[test]
    fn test_unknown_table_in_scope() {
        let g = chain();
        assert!(matches!(
            g.topo_order(&["a", "zzz"], Direction::ParentFirst),
            Err(DmError::UnknownTable(_))
        ));
    }

    /// Un graphe cyclique dont le périmètre demandé est acyclique doit passer.
    #[test]
    fn test_cycle_only_in_scope_matters() {
        let mut g = chain();
        g.add_table("x", vec![col("id"), col("y")]).unwrap();
        g.add_table("y", vec![col("id"), col("x")]).unwrap();
        g.set_primary_key("x", &["id"]).unwrap();
        g.set_primary_key("y", &["id"]).unwrap();
        g.add_edge("x", &["y"], "y", &["id"]).unwrap();
        g.add_edge("y", &["x"], "x", &["id"]).unwrap();
        g.add_edge("c", &["id"], "x", &["id"]).unwrap();

        assert!(g.topo_order(&["a", "b", "c"], Direction::ParentFirst).is_ok());
        assert!(!g.has_cycle(&["a", "b", "c"]).unwrap());

        let err = g.topo_order(&["a", "b", "c", "x", "y"], Direction::ParentFirst).unwrap_err();
        match err {
            // c est en aval du cycle mais n'en fait pas partie
            DmError::CyclicGraph { tables } => assert_eq!(tables, vec!["x", "y"]),
            other => panic!("erreur inattendue : {other}"),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut g = KeyGraph::new();
        g.add_table("employees", vec![col("id"), col("manager")]).unwrap();
        g.set_primary_key("employees", &["id"]).unwrap();
        g.add_edge("employees", &["manager"], "employees", &["id"]).unwrap();
        assert!(g.has_cycle(&["employees"]).unwrap());
    }

    #[test]
    fn test_reachable_paths_follow_one_direction() {
        let g = flights_graph();

        let down = g.reachable_paths("airports", "flights").unwrap();
        assert_eq!(down.len(), 1);
        assert_eq!(down[0].flow, Flow::TowardChildren);
        assert_eq!((down[0].from(), down[0].to()), ("airports", "flights"));
        assert_eq!(down[0].to_columns().to_vec(), vec!["origin"]);

        let up = g.reachable_paths("flights", "airlines").unwrap();
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].flow, Flow::TowardParents);

        assert!(g.reachable_paths("airports", "airlines").unwrap().is_empty());
        assert!(g.reachable_paths("airports", "weather").unwrap().is_empty());
        assert!(g.reachable_paths("airports", "airports").unwrap().is_empty());
    }

    #[test]
    fn test_ancestors_between_multi_hop() {
        let g = chain();
        let edges = g.ancestors_between("c", "a").unwrap();
        assert_eq!(edges.len(), 2);
        assert!(g.ancestors_between("a", "c").unwrap().is_empty());
        assert_eq!(g.reachable_paths("a", "c").unwrap().len(), 2);
    }

    #[test]
    fn test_parents_children() {
        let g = flights_graph();
        assert_eq!(g.parents_of("flights"), vec!["airports", "airlines"]);
        assert_eq!(g.children_of("airports"), vec!["flights"]);
        assert!(g.children_of("weather").is_empty());
    }

    #[test]
    fn test_retain_and_rename() {
        let mut g = flights_graph();
        g.rename_table("airports", "ports").unwrap();
        assert_eq!(g.table_names(), vec!["ports", "flights", "airlines", "weather"]);
        assert_eq!(g.edges_from("flights")[0].parent, "ports");
        assert!(g.rename_table("ports", "flights").is_err());

        g.retain_tables(&["flights", "airlines"]).unwrap();
        assert_eq!(g.edges().len(), 1);
        assert!(!g.contains("ports"));
    }

    // ─── Propriétés ──────────────────────────────────────────────────────────

    /// DAG aléatoire : la table i ne référence que des tables d'indice < i.
    fn random_dag(n: usize, links: &[(usize, usize)]) -> KeyGraph {
        let mut g = KeyGraph::new();
        for i in 0..n {
            let mut cols = vec![col("id")];
            cols.extend((0..n).map(|j| col(&format!("ref_{j}"))));
            g.add_table(&format!("t{i}"), cols).unwrap();
            g.set_primary_key(&format!("t{i}"), &["id"]).unwrap();
        }
        for &(a, b) in links {
            let (child, parent) = (a.max(b), a.min(b));
            if child == parent || child >= n {
                continue;
            }
            let reference = format!("ref_{parent}");
            let _ = g.add_edge(
                &format!("t{child}"),
                &[reference.as_str()],
                &format!("t{parent}"),
                &["id"],
            );
        }
        g
    }

    proptest! {
        #[test]
        fn prop_parent_first_respects_edges(
            n in 1usize..8,
            links in proptest::collection::vec((0usize..8, 0usize..8), 0..16),
        ) {
            let g = random_dag(n, &links);
            let scope = g.table_names();
            let order = g.topo_order(&scope, Direction::ParentFirst).unwrap();
            prop_assert_eq!(order.len(), scope.len());
            let pos = |t: &str| order.iter().position(|x| x == t).unwrap();
            for e in g.edges() {
                prop_assert!(pos(&e.parent) < pos(&e.child));
            }

            let mut reversed = g.topo_order(&scope, Direction::ChildFirst).unwrap();
            reversed.reverse();
            prop_assert_eq!(reversed, order);
        }

        #[test]
        fn prop_sub_scope_is_exact(
            n in 2usize..8,
            links in proptest::collection::vec((0usize..8, 0usize..8), 0..16),
            mask in proptest::collection::vec(any::<bool>(), 8),
        ) {
            let g = random_dag(n, &links);
            let scope: Vec<String> = g
                .table_names()
                .into_iter()
                .enumerate()
                .filter(|(i, _)| mask[*i])
                .map(|(_, t)| t)
                .collect();
            let order = g.topo_order(&scope, Direction::ParentFirst).unwrap();
            let mut sorted_order = order.clone();
            sorted_order.sort();
            let mut sorted_scope = scope.clone();
            sorted_scope.sort();
            prop_assert_eq!(sorted_order, sorted_scope);
        }
    }
}
