// =============================================================================
// MODEL — Le DataModel : tables, clés, filtres
// =============================================================================
//
// Un DataModel rassemble :
//   - le KeyGraph (tables + clés)
//   - un handle de backend par table
//   - le FilterSet (les filtres en attente ou déjà appliqués)
//   - l'état de zoom (Normal ou ZoomedOn(table))
//   - la configuration (DmConfig)
//
// C'est une VALEUR : toute opération "modifiante" renvoie un nouveau
// DataModel et laisse l'ancien intact. L'état est partagé par Arc et copié
// à l'écriture, donc cloner un DataModel ne coûte qu'un compteur.
//
//   let dm2 = dm.filter("airports", Predicate::eq("faa", "JFK"))?;
//   //  dm  : aucun filtre
//   //  dm2 : un filtre en attente sur airports
//
// Le seul effet de bord possible est une opération de lignes avec
// `in_place = Some(true)` (voir scheduler.rs).
//
// =============================================================================

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::config::{DmConfig, RowsOptions};
use super::error::{DmError, DmResult};
use super::filter::{FilterSet, Predicate, StoredPredicate};
use super::graph::KeyGraph;
use super::propagate::{FilterPropagator, PropagationPlan};
use super::scheduler::{MutationReport, MutationScheduler, RowOperation};
use super::validate::{self, ConstraintReport, PkCandidate};
use crate::backend::TabularBackend;

/// État de zoom d'un data model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Zoom {
    #[default]
    Normal,
    ZoomedOn(String),
}

#[derive(Debug)]
struct ModelState<B: TabularBackend> {
    backend: Arc<B>,
    graph: KeyGraph,
    handles: IndexMap<String, B::Handle>,
    filters: FilterSet,
    zoom: Zoom,
    config: DmConfig,
}

// Pas de derive : B lui-même n'a pas à être Clone.
impl<B: TabularBackend> Clone for ModelState<B> {
    fn clone(&self) -> Self {
        ModelState {
            backend: Arc::clone(&self.backend),
            graph: self.graph.clone(),
            handles: self.handles.clone(),
            filters: self.filters.clone(),
            zoom: self.zoom.clone(),
            config: self.config,
        }
    }
}

/// Un ensemble de tables reliées par des clés, au-dessus d'un backend.
#[derive(Debug)]
pub struct DataModel<B: TabularBackend> {
    inner: Arc<ModelState<B>>,
}

impl<B: TabularBackend> Clone for DataModel<B> {
    fn clone(&self) -> Self {
        DataModel { inner: Arc::clone(&self.inner) }
    }
}

impl<B: TabularBackend> DataModel<B> {
    // ─── Construction ────────────────────────────────────────────────────────

    /// Un data model vide sur un backend.
    pub fn new(backend: Arc<B>) -> Self {
        DataModel {
            inner: Arc::new(ModelState {
                backend,
                graph: KeyGraph::new(),
                handles: IndexMap::new(),
                filters: FilterSet::new(),
                zoom: Zoom::Normal,
                config: DmConfig::default(),
            }),
        }
    }

    pub fn with_config(&self, config: DmConfig) -> Self {
        self.replaced(|s| s.config = config)
    }

    /// Ajoute une table ; ses colonnes sont lues sur le handle.
    pub fn with_table(self, name: &str, handle: B::Handle) -> DmResult<Self> {
        let columns = self.inner.backend.columns(&handle)?;
        self.owned(|s| {
            s.graph.add_table(name, columns)?;
            s.handles.insert(name.to_string(), handle);
            Ok(())
        })
    }

    pub fn with_primary_key(self, table: &str, columns: &[&str]) -> DmResult<Self> {
        self.owned(|s| s.graph.set_primary_key(table, columns).map(|_| ()))
    }

    pub fn with_unique_key(self, table: &str, columns: &[&str]) -> DmResult<Self> {
        self.owned(|s| s.graph.add_unique_key(table, columns).map(|_| ()))
    }

    pub fn with_foreign_key(self, child: &str, child_columns: &[&str], parent: &str, parent_columns: &[&str]) -> DmResult<Self> {
        self.owned(|s| s.graph.add_edge(child, child_columns, parent, parent_columns).map(|_| ()))
    }

    /// Remplace les handles de quelques tables ; les autres restent partagés.
    pub(crate) fn with_handles(&self, changed: Vec<(String, B::Handle)>) -> Self {
        if changed.is_empty() {
            return self.clone();
        }
        self.replaced(|s| s.handles.extend(changed))
    }

    // ─── Accès ───────────────────────────────────────────────────────────────

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub fn graph(&self) -> &KeyGraph {
        &self.inner.graph
    }

    pub fn filters(&self) -> &FilterSet {
        &self.inner.filters
    }

    pub fn config(&self) -> &DmConfig {
        &self.inner.config
    }

    pub fn zoom(&self) -> &Zoom {
        &self.inner.zoom
    }

    pub fn zoomed_table(&self) -> Option<&str> {
        match &self.inner.zoom {
            Zoom::Normal => None,
            Zoom::ZoomedOn(t) => Some(t),
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        self.inner.graph.table_names()
    }

    /// Le handle de base d'une table (sans les filtres en attente).
    pub fn handle(&self, table: &str) -> DmResult<&B::Handle> {
        self.inner
            .handles
            .get(table)
            .ok_or_else(|| DmError::UnknownTable(table.to_string()))
    }

    /// Les deux valeurs sont-elles le même data model (même état partagé) ?
    pub fn same_model(&self, other: &DataModel<B>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// La table a-t-elle le même handle dans les deux models ?
    pub fn same_handle_as(&self, other: &DataModel<B>, table: &str) -> DmResult<bool> {
        Ok(self.backend().same_handle(self.handle(table)?, other.handle(table)?))
    }

    // ─── Filtres ─────────────────────────────────────────────────────────────

    /// Ajoute un filtre en attente ; aucun appel au backend.
    pub fn filter(&self, table: &str, predicate: Predicate) -> DmResult<Self> {
        self.ensure_unzoomed("filter")?;
        self.modified(|s| s.filters.attach(&s.graph, table, predicate))
    }

    /// Applique un prédicat tout de suite au handle de la table. Il reste
    /// enregistré pour se propager aux voisines.
    pub fn restrict(&self, table: &str, predicate: Predicate) -> DmResult<Self> {
        self.ensure_unzoomed("restrict")?;
        let restricted = self.backend().apply_predicate(self.handle(table)?, &predicate)?;
        self.modified(|s| {
            s.filters.attach_applied(&s.graph, table, predicate)?;
            s.handles.insert(table.to_string(), restricted);
            Ok(())
        })
    }

    pub fn has_pending_filters(&self) -> bool {
        self.inner.filters.has_unapplied()
    }

    fn propagator(&self) -> FilterPropagator<'_> {
        FilterPropagator::new(&self.inner.graph, &self.inner.filters)
    }

    /// Les réductions qui seraient appliquées pour matérialiser `table`.
    pub fn propagation_plan(&self, table: &str) -> DmResult<PropagationPlan> {
        self.propagator().plan(table)
    }

    /// Le handle filtré d'une table : effets propagés + ses propres filtres.
    pub fn materialize(&self, table: &str) -> DmResult<B::Handle> {
        self.propagator()
            .materialize(self.backend(), &self.inner.handles, table)
    }

    /// Toutes les tables, filtrées de façon cohérente.
    pub fn materialize_all(&self) -> DmResult<IndexMap<String, B::Handle>> {
        self.propagator().materialize_all(self.backend(), &self.inner.handles)
    }

    /// Nouveau model dont les handles sont les tables filtrées et dont le
    /// FilterSet est vide.
    pub fn apply_filters(&self) -> DmResult<Self> {
        self.ensure_unzoomed("apply_filters")?;
        let handles = self.materialize_all()?;
        self.modified(|s| {
            s.handles = handles;
            s.filters.clear_all();
            Ok(())
        })
    }

    /// Nombre de lignes du handle de base (sans filtres en attente).
    pub fn row_count(&self, table: &str) -> DmResult<usize> {
        Ok(self.backend().row_count(self.handle(table)?)?)
    }

    /// Nombre de lignes de la table matérialisée.
    pub fn materialized_count(&self, table: &str) -> DmResult<usize> {
        Ok(self.backend().row_count(&self.materialize(table)?)?)
    }

    /// Nombre de lignes de chaque table matérialisée.
    pub fn row_counts(&self) -> DmResult<IndexMap<String, usize>> {
        let mut out = IndexMap::new();
        for (table, h) in self.materialize_all()? {
            let n = self.backend().row_count(&h)?;
            out.insert(table, n);
        }
        Ok(out)
    }

    // ─── Zoom ────────────────────────────────────────────────────────────────

    pub fn zoom_to(&self, table: &str) -> DmResult<Self> {
        self.ensure_unzoomed("zoom_to")?;
        self.inner.graph.table_checked(table)?;
        self.modified(|s| {
            s.zoom = Zoom::ZoomedOn(table.to_string());
            Ok(())
        })
    }

    /// Les prédicats de la table zoomée (vide si aucun zoom).
    pub fn zoomed_filters(&self) -> &[StoredPredicate] {
        match self.zoomed_table() {
            Some(t) => self.inner.filters.predicates_for(t),
            None => &[],
        }
    }

    pub fn unzoom(&self) -> Self {
        if self.zoomed_table().is_none() {
            return self.clone();
        }
        self.replaced(|s| s.zoom = Zoom::Normal)
    }

    // ─── Métadonnées (exigent des filtres appliqués) ─────────────────────────

    pub fn enum_pk_candidates(&self, table: &str) -> DmResult<Vec<PkCandidate>> {
        self.ensure_no_pending("enum_pk_candidates")?;
        validate::enum_pk_candidates(self.backend(), self.handle(table)?)
    }

    pub fn examine_constraints(&self) -> DmResult<Vec<ConstraintReport>> {
        self.ensure_no_pending("examine_constraints")?;
        validate::examine_constraints(&self.inner.graph, self.backend(), &self.inner.handles)
    }

    /// Ne garde que les tables nommées (et les clés entre elles).
    pub fn select_tables(&self, tables: &[&str]) -> DmResult<Self> {
        self.ensure_no_pending("select_tables")?;
        self.ensure_unzoomed("select_tables")?;
        self.modified(|s| {
            s.graph.retain_tables(tables)?;
            s.handles.retain(|t, _| tables.contains(&t.as_str()));
            s.filters.retain_tables(tables);
            Ok(())
        })
    }

    pub fn rename_table(&self, old: &str, new: &str) -> DmResult<Self> {
        self.ensure_no_pending("rename_table")?;
        self.ensure_unzoomed("rename_table")?;
        self.modified(|s| {
            s.graph.rename_table(old, new)?;
            if let Some(idx) = s.handles.get_index_of(old) {
                if let Some((_, h)) = s.handles.shift_remove_index(idx) {
                    s.handles.shift_insert(idx, new.to_string(), h);
                }
            }
            s.filters.rename_table(old, new);
            Ok(())
        })
    }

    // ─── Opérations de lignes ────────────────────────────────────────────────

    /// Écrit les lignes de `source` dans ce model.
    pub fn rows(&self, op: RowOperation, source: &DataModel<B>, options: &RowsOptions) -> DmResult<MutationReport<B>> {
        MutationScheduler::new(self, source).run(op, options)
    }

    /// `rows` avec les options par défaut de la configuration.
    fn rows_default(&self, op: RowOperation, source: &DataModel<B>) -> DmResult<MutationReport<B>> {
        let options = self.inner.config.rows;
        self.rows(op, source, &options)
    }

    pub fn rows_insert(&self, source: &DataModel<B>) -> DmResult<MutationReport<B>> {
        self.rows_default(RowOperation::Insert, source)
    }

    pub fn rows_append(&self, source: &DataModel<B>) -> DmResult<MutationReport<B>> {
        self.rows_default(RowOperation::Append, source)
    }

    pub fn rows_update(&self, source: &DataModel<B>) -> DmResult<MutationReport<B>> {
        self.rows_default(RowOperation::Update, source)
    }

    pub fn rows_patch(&self, source: &DataModel<B>) -> DmResult<MutationReport<B>> {
        self.rows_default(RowOperation::Patch, source)
    }

    pub fn rows_upsert(&self, source: &DataModel<B>) -> DmResult<MutationReport<B>> {
        self.rows_default(RowOperation::Upsert, source)
    }

    pub fn rows_delete(&self, source: &DataModel<B>) -> DmResult<MutationReport<B>> {
        self.rows_default(RowOperation::Delete, source)
    }

    pub fn rows_truncate(&self, source: &DataModel<B>) -> DmResult<MutationReport<B>> {
        self.rows_default(RowOperation::Truncate, source)
    }

    // ─── Interne ─────────────────────────────────────────────────────────────

    fn ensure_unzoomed(&self, operation: &'static str) -> DmResult<()> {
        match self.zoomed_table() {
            Some(t) => Err(DmError::Zoomed { operation, table: t.to_string() }),
            None => Ok(()),
        }
    }

    fn ensure_no_pending(&self, operation: &'static str) -> DmResult<()> {
        if self.has_pending_filters() {
            return Err(DmError::PendingFilters { operation });
        }
        Ok(())
    }

    fn replaced(&self, f: impl FnOnce(&mut ModelState<B>)) -> Self {
        let mut state = (*self.inner).clone();
        f(&mut state);
        DataModel { inner: Arc::new(state) }
    }

    /// Copie l'état, le modifie, et renvoie un nouveau model.
    fn modified(&self, f: impl FnOnce(&mut ModelState<B>) -> DmResult<()>) -> DmResult<Self> {
        let mut state = (*self.inner).clone();
        f(&mut state)?;
        Ok(DataModel { inner: Arc::new(state) })
    }

    /// Comme `modified`, sans copie quand l'état n'est pas partagé.
    fn owned(mut self, f: impl FnOnce(&mut ModelState<B>) -> DmResult<()>) -> DmResult<Self> {
        f(Arc::make_mut(&mut self.inner))?;
        Ok(self)
    }
}

impl<B: TabularBackend> fmt::Display for DataModel<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.graph)?;
        if !self.inner.filters.is_empty() {
            writeln!(f, "filters")?;
            for line in self.inner.filters.to_string().lines() {
                writeln!(f, "  {}", line)?;
            }
        }
        if let Zoom::ZoomedOn(t) = &self.inner.zoom {
            writeln!(f, "zoomed on {}", t)?;
        }
        Ok(())
    }
}
