// =============================================================================
// PROPAGATE — Propagation des filtres par semi-jointures
// =============================================================================
//
// Matérialiser une table T, c'est lui appliquer :
//   1. l'effet de CHAQUE table filtrée S (S ≠ T) qui l'atteint par un chemin
//      monotone du KeyGraph
//   2. puis ses propres prédicats non encore appliqués
//
// Pour une source S, on construit une CHAÎNE : les sauts de
// `reachable_paths(S, T)` rangés dans l'ordre du flux (ordre topologique sur
// les tables de la chaîne). Chaque table de la chaîne est réduite une fois :
//
//   réduite(X) = handle(X)
//                ∧ prédicats non appliqués de X
//                ∧ ⋀ semi-jointures(X, réduite(Y)) pour chaque saut Y ⟶ X
//
// EXEMPLE (filtre sur airports) :
//
//   airports[faa = JFK] ──(faa ⟶ origin)──▶ flights
//
//   flights réduit = flights ⋉ π_faa(airports[faa = JFK])
//
// Les chaînes de plusieurs sources s'accumulent sur T (ET logique) : le
// résultat ne dépend pas de l'ordre d'ajout des filtres.
//
// Une chaîne dont les tables forment un cycle échoue avec CyclicGraph.
//
// =============================================================================

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use super::error::{DmError, DmResult};
use super::filter::FilterSet;
use super::graph::{Direction, Flow, Hop, KeyGraph};
use crate::backend::TabularBackend;

/// La contribution d'une table filtrée à la table cible.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceChain {
    pub source: String,
    /// Les tables de la chaîne, dans l'ordre du flux (la source d'abord).
    pub tables: Vec<String>,
    /// Les sauts, rangés selon `tables`.
    pub hops: Vec<Hop>,
}

impl SourceChain {
    /// Sauts qui restreignent `table`.
    fn hops_into<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Hop> + 'a {
        self.hops.iter().filter(move |h| h.to() == table)
    }
}

/// Le plan de matérialisation d'une table.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationPlan {
    pub target: String,
    pub chains: Vec<SourceChain>,
}

impl PropagationPlan {
    /// Aucune autre table n'agit sur la cible.
    pub fn is_passthrough(&self) -> bool {
        self.chains.is_empty()
    }
}

impl fmt::Display for PropagationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} :", self.target)?;
        if self.chains.is_empty() {
            return writeln!(f, "  (aucune propagation)");
        }
        for chain in &self.chains {
            writeln!(f, "  depuis {}", chain.source)?;
            for hop in &chain.hops {
                writeln!(f, "    {}", hop)?;
            }
        }
        Ok(())
    }
}

/// Calcule et exécute les réductions d'un FilterSet sur un KeyGraph.
pub struct FilterPropagator<'a> {
    graph: &'a KeyGraph,
    filters: &'a FilterSet,
}

impl<'a> FilterPropagator<'a> {
    pub fn new(graph: &'a KeyGraph, filters: &'a FilterSet) -> Self {
        FilterPropagator { graph, filters }
    }

    /// Les chaînes de réduction qui atteignent `target`.
    pub fn plan(&self, target: &str) -> DmResult<PropagationPlan> {
        self.graph.table_checked(target)?;

        let mut chains = Vec::new();
        for source in self.filters.filtered_tables() {
            if source == target {
                continue;
            }
            let hops = self.graph.reachable_paths(source, target)?;
            if hops.is_empty() {
                continue;
            }
            chains.push(self.chain(source, hops)?);
        }
        Ok(PropagationPlan { target: target.to_string(), chains })
    }

    /// Range les sauts d'une source dans l'ordre du flux.
    fn chain(&self, source: &str, hops: Vec<Hop>) -> DmResult<SourceChain> {
        let mut scope: Vec<&str> = vec![source];
        for hop in &hops {
            for t in [hop.from(), hop.to()] {
                if !scope.contains(&t) {
                    scope.push(t);
                }
            }
        }

        // Vers les parents : la source est la plus "enfant" de la chaîne
        let direction = match hops[0].flow {
            Flow::TowardParents => Direction::ChildFirst,
            Flow::TowardChildren => Direction::ParentFirst,
        };
        let tables = self.graph.topo_order(&scope, direction)?;
        if tables.first().map(String::as_str) != Some(source) {
            // deux sens de flux mêlés : uniquement possible avec un cycle
            return Err(DmError::CyclicGraph { tables });
        }

        let position: HashMap<&str, usize> = tables.iter().enumerate().map(|(i, t)| (t.as_str(), i)).collect();
        let mut hops = hops;
        hops.sort_by_key(|h| (position.get(h.from()).copied(), position.get(h.to()).copied()));

        Ok(SourceChain { source: source.to_string(), tables, hops })
    }

    /// Exécute un plan sur les handles de base des tables.
    pub fn execute<B: TabularBackend>(
        &self,
        backend: &B,
        handles: &IndexMap<String, B::Handle>,
        plan: &PropagationPlan,
    ) -> DmResult<B::Handle> {
        let target = plan.target.as_str();
        let mut result = base(handles, target)?.clone();

        for chain in &plan.chains {
            let mut reduced: HashMap<&str, B::Handle> = HashMap::new();
            for table in &chain.tables {
                let mut h = if table == target {
                    result.clone()
                } else {
                    let mut h = base(handles, table)?.clone();
                    for p in self.filters.unapplied_for(table) {
                        h = backend.apply_predicate(&h, p)?;
                    }
                    h
                };
                for hop in chain.hops_into(table) {
                    let from = reduced
                        .get(hop.from())
                        .ok_or_else(|| DmError::UnknownTable(hop.from().to_string()))?;
                    let keys = backend.distinct(&backend.project(from, hop.from_columns())?)?;
                    h = backend.semi_join_filter(&h, hop.to_columns(), &keys, hop.from_columns())?;
                    log::debug!("propagation {} : {}", chain.source, hop);
                }
                reduced.insert(table.as_str(), h);
            }
            if let Some(h) = reduced.remove(target) {
                result = h;
            }
        }

        for p in self.filters.unapplied_for(target) {
            result = backend.apply_predicate(&result, p)?;
        }
        Ok(result)
    }

    /// Plan + exécution pour une table.
    pub fn materialize<B: TabularBackend>(
        &self,
        backend: &B,
        handles: &IndexMap<String, B::Handle>,
        target: &str,
    ) -> DmResult<B::Handle> {
        let plan = self.plan(target)?;
        self.execute(backend, handles, &plan)
    }

    /// Toutes les tables du graphe, dans leur ordre.
    pub fn materialize_all<B: TabularBackend>(
        &self,
        backend: &B,
        handles: &IndexMap<String, B::Handle>,
    ) -> DmResult<IndexMap<String, B::Handle>> {
        let mut out = IndexMap::with_capacity(handles.len());
        for table in self.graph.table_names() {
            let h = self.materialize(backend, handles, &table)?;
            out.insert(table, h);
        }
        Ok(out)
    }
}

fn base<'h, H>(handles: &'h IndexMap<String, H>, table: &str) -> DmResult<&'h H> {
    handles.get(table).ok_or_else(|| DmError::UnknownTable(table.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::Predicate;
    use crate::core::fixtures;
    use crate::core::schema::ColumnDef;
    use crate::core::value::BaseType;

    #[test]
    fn test_plan_follows_monotone_paths() {
        let (_, dm) = fixtures::flights();
        let dm = dm.filter("airports", Predicate::eq("faa", "JFK")).unwrap();
        let p = FilterPropagator::new(dm.graph(), dm.filters());

        let flights = p.plan("flights").unwrap();
        assert_eq!(flights.chains.len(), 1);
        assert_eq!(flights.chains[0].tables, vec!["airports", "flights"]);
        assert_eq!(flights.chains[0].hops[0].to_columns().to_vec(), vec!["origin"]);

        assert!(p.plan("airlines").unwrap().is_passthrough());
        assert!(p.plan("weather").unwrap().is_passthrough());
        assert!(p.plan("airports").unwrap().is_passthrough());
    }

    #[test]
    fn test_upward_chain_order() {
        // a ◀ b ◀ c : un filtre sur c remonte jusqu'à a en passant par b
        let mut g = KeyGraph::new();
        for t in ["a", "b", "c"] {
            g.add_table(t, vec![ColumnDef::new("id", BaseType::Integer), ColumnDef::new("up", BaseType::Integer)])
                .unwrap();
            g.set_primary_key(t, &["id"]).unwrap();
        }
        g.add_edge("b", &["up"], "a", &["id"]).unwrap();
        g.add_edge("c", &["up"], "b", &["id"]).unwrap();

        let mut fs = FilterSet::new();
        fs.attach(&g, "c", Predicate::eq("id", 1)).unwrap();
        let plan = FilterPropagator::new(&g, &fs).plan("a").unwrap();
        assert_eq!(plan.chains[0].tables, vec!["c", "b", "a"]);
        let froms: Vec<&str> = plan.chains[0].hops.iter().map(Hop::from).collect();
        assert_eq!(froms, vec!["c", "b"]);
        assert_eq!(plan.to_string(), "a :\n  depuis c\n    c(up) ⟶ b(id)\n    b(up) ⟶ a(id)\n");
    }

    #[test]
    fn test_cyclic_chain_rejected() {
        let mut g = KeyGraph::new();
        for t in ["x", "y"] {
            g.add_table(t, vec![ColumnDef::new("id", BaseType::Integer), ColumnDef::new("other", BaseType::Integer)])
                .unwrap();
            g.set_primary_key(t, &["id"]).unwrap();
        }
        g.add_edge("x", &["other"], "y", &["id"]).unwrap();
        g.add_edge("y", &["other"], "x", &["id"]).unwrap();

        let mut fs = FilterSet::new();
        fs.attach(&g, "x", Predicate::eq("id", 1)).unwrap();
        let err = FilterPropagator::new(&g, &fs).plan("y").unwrap_err();
        assert!(matches!(err, DmError::CyclicGraph { .. }));
    }

    #[test]
    fn test_unknown_target() {
        let (_, dm) = fixtures::flights();
        let p = FilterPropagator::new(dm.graph(), dm.filters());
        assert!(matches!(p.plan("planes"), Err(DmError::UnknownTable(_))));
    }
}
