//! The query facade
//!
//! `GrammarIndex` owns one cache slot per document plus the import graph.
//! Every query pushes the caller's text first, so a query always answers for
//! the text it was given.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use rayon::prelude::*;
use tracing::instrument;

use crate::{
    DocumentId, Error,
    analysis::{AnalysisContext, AnalysisResult, Snapshot, SymbolFilter, SymbolInfo},
    cache::{CacheState, DocumentSlot, Wait},
    config::IndexOptions,
    convert::{EditorPosition, position_to_offset},
    diagnostics::Diagnostic,
    graph::ImportGraph,
    notify::{Notifier, SubscriptionId},
    resolve::{ImportedSymbols, Occurrence},
    symbols::SymbolTable,
};

/// Incremental symbol index over a set of grammar documents.
///
/// All methods take `&self`; the index is meant to be shared between editor
/// features (`Arc<GrammarIndex>`) and queried from many threads at once.
pub struct GrammarIndex {
    documents: DashMap<DocumentId, Arc<DocumentSlot>>,
    graph: ImportGraph,
    notifier: Notifier,
    options: IndexOptions,
    /// Consulted for grammars no registered document declares.
    host_imports: Option<Arc<dyn ImportedSymbols>>,
    parses: AtomicU64,
}

impl std::fmt::Debug for GrammarIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammarIndex")
            .field("documents", &self.documents.len())
            .field("options", &self.options)
            .field("analysis_count", &self.analysis_count())
            .finish_non_exhaustive()
    }
}

impl Default for GrammarIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(IndexOptions::default())
    }

    #[must_use]
    pub fn with_options(options: IndexOptions) -> Self {
        Self {
            documents: DashMap::new(),
            graph: ImportGraph::default(),
            notifier: Notifier::default(),
            options,
            host_imports: None,
            parses: AtomicU64::new(0),
        }
    }

    /// Fall back to `imports` for grammars that are not registered with the
    /// index, e.g. grammars on disk the editor has not opened.
    #[must_use]
    pub fn with_host_imports(mut self, imports: Arc<dyn ImportedSymbols>) -> Self {
        self.host_imports = Some(imports);
        self
    }

    #[must_use]
    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    // ------------------------------------------------------------------
    // fast queries
    // ------------------------------------------------------------------

    /// Symbols of `text` in definition order, followed by names that are
    /// referenced but defined nowhere. `exhaustive` attaches every
    /// reference location. Imported grammar names are not symbols here; ask
    /// `list_symbols` for `SymbolKind::Import` to get them.
    #[must_use]
    #[instrument(skip(self, text))]
    pub fn list_symbols_fast(&self, id: &DocumentId, text: &str, exhaustive: bool) -> Vec<SymbolInfo> {
        let filter = SymbolFilter::all().without_imports();
        let filter = if exhaustive {
            filter.with_references()
        } else {
            filter
        };
        self.list_symbols(id, text, &filter)
    }

    #[must_use]
    pub fn list_symbols(&self, id: &DocumentId, text: &str, filter: &SymbolFilter) -> Vec<SymbolInfo> {
        self.analyze_text(id, text).list_symbols(filter)
    }

    /// Number of references to `name` in `text`; 0 for unknown names.
    #[must_use]
    #[instrument(skip(self, text))]
    pub fn count_references_fast(&self, id: &DocumentId, text: &str, name: &str) -> usize {
        self.analyze_text(id, text).reference_count(name)
    }

    // ------------------------------------------------------------------
    // lookups on the latest pushed text
    // ------------------------------------------------------------------

    /// Current analysis of a registered document.
    ///
    /// # Errors
    ///
    /// `Error::UnknownDocument` if `id` was never registered or was closed.
    pub fn analysis(&self, id: &DocumentId) -> Result<Arc<AnalysisResult>, Error> {
        let slot = self.registered(id)?;
        Ok(self.refresh_slot(&slot, Wait::Bounded, None))
    }

    /// The symbol called `name`, with its reference locations.
    ///
    /// # Errors
    ///
    /// `Error::UnknownDocument` if `id` was never registered or was closed.
    pub fn symbol(&self, id: &DocumentId, name: &str) -> Result<Option<SymbolInfo>, Error> {
        let analysis = self.analysis(id)?;
        Ok(analysis
            .symbol(name)
            .map(|symbol| analysis.describe(symbol, true)))
    }

    /// Reference occurrences of `name`.
    ///
    /// # Errors
    ///
    /// `Error::UnknownDocument` if `id` was never registered or was closed.
    pub fn references(&self, id: &DocumentId, name: &str) -> Result<Vec<Occurrence>, Error> {
        Ok(self.analysis(id)?.references(name).cloned().collect())
    }

    /// The definition or reference under an editor position.
    ///
    /// # Errors
    ///
    /// `Error::UnknownDocument` if `id` was never registered or was closed.
    pub fn occurrence_at(
        &self,
        id: &DocumentId,
        position: EditorPosition,
    ) -> Result<Option<Occurrence>, Error> {
        let analysis = self.analysis(id)?;
        let Some(offset) = position_to_offset(&analysis.snapshot().text, position) else {
            return Ok(None);
        };
        Ok(analysis
            .occurrences()
            .iter()
            .find(|occurrence| occurrence.location.contains(offset))
            .cloned())
    }

    /// Syntax errors and semantic diagnostics.
    ///
    /// # Errors
    ///
    /// `Error::UnknownDocument` if `id` was never registered or was closed.
    pub fn diagnostics(&self, id: &DocumentId) -> Result<Vec<Diagnostic>, Error> {
        Ok(self.analysis(id)?.diagnostics().to_vec())
    }

    /// Bring several documents up to date in parallel.
    #[must_use]
    pub fn refresh(&self, ids: &[DocumentId]) -> Vec<Result<Arc<AnalysisResult>, Error>> {
        ids.par_iter().map(|id| self.analysis(id)).collect()
    }

    // ------------------------------------------------------------------
    // document lifecycle
    // ------------------------------------------------------------------

    /// Record the current text of a document, registering it if needed.
    /// Nothing is analyzed until a query asks. Returns whether the text
    /// differs from what the index had.
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub fn update(&self, id: &DocumentId, text: &str) -> bool {
        let changed = match self.documents.entry(id.clone()) {
            Entry::Occupied(entry) => entry.get().update(text),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(DocumentSlot::new(id.clone(), text)));
                true
            }
        };
        if changed {
            self.after_text_change(id, text);
        }
        changed
    }

    /// Drop a document and everything known about it.
    ///
    /// # Errors
    ///
    /// `Error::UnknownDocument` if `id` is not registered.
    pub fn close(&self, id: &DocumentId) -> Result<(), Error> {
        let (_, slot) = self
            .documents
            .remove(id)
            .ok_or_else(|| Error::UnknownDocument(id.clone()))?;
        slot.close();
        tracing::debug!(document = %id, "closed document");

        if let Some(name) = self.graph.remove(id)
            && self.invalidate_dependents(id, &[name], None)
        {
            self.notifier.notify();
        }
        Ok(())
    }

    /// Forget every document, e.g. on workspace reload.
    pub fn reset(&self) {
        let ids: Vec<DocumentId> = self.document_ids();
        for id in &ids {
            if let Some((_, slot)) = self.documents.remove(id) {
                slot.close();
            }
            self.graph.remove(id);
        }
        tracing::debug!(documents = ids.len(), "reset index");
        self.notifier.notify();
    }

    #[must_use]
    pub fn cache_state(&self, id: &DocumentId) -> Option<CacheState> {
        self.slot(id).map(|slot| slot.cache_state())
    }

    /// Registered documents, sorted.
    #[must_use]
    pub fn document_ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<_> = self.documents.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// How many times the front end ran, over the lifetime of the index.
    #[must_use]
    pub fn analysis_count(&self) -> u64 {
        self.parses.load(Ordering::Relaxed)
    }

    // ------------------------------------------------------------------
    // change notification
    // ------------------------------------------------------------------

    /// Call `callback` whenever a re-query may give a different answer.
    #[must_use]
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        self.notifier.subscribe(callback)
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    fn slot(&self, id: &DocumentId) -> Option<Arc<DocumentSlot>> {
        self.documents.get(id).map(|entry| Arc::clone(entry.value()))
    }

    fn registered(&self, id: &DocumentId) -> Result<Arc<DocumentSlot>, Error> {
        self.slot(id).ok_or_else(|| Error::UnknownDocument(id.clone()))
    }

    fn analyze_text(&self, id: &DocumentId, text: &str) -> Arc<AnalysisResult> {
        self.update(id, text);
        match self.slot(id) {
            Some(slot) => self.refresh_slot(&slot, Wait::Bounded, None),
            // closed between the update and the lookup
            None => Arc::new(AnalysisResult::empty(Snapshot::new(text, 0), 0)),
        }
    }

    /// Make `slot` fresh and do the bookkeeping for a new publication.
    /// `requester` is the document whose analysis asked for this one as an
    /// import; it already sees the new result and is not invalidated.
    fn refresh_slot(
        &self,
        slot: &DocumentSlot,
        wait: Wait,
        requester: Option<&DocumentId>,
    ) -> Arc<AnalysisResult> {
        let imports = IndexImports {
            index: self,
            requester: slot.id(),
        };
        // Edges must be in the graph before resolve looks up any import.
        let register_imports = |table: &SymbolTable| {
            self.graph.set_imports(
                slot.id(),
                table
                    .imports()
                    .iter()
                    .map(|import| import.grammar.clone())
                    .collect(),
            );
        };
        let ctx = AnalysisContext {
            imports: &imports,
            options: &self.options,
            parses: &self.parses,
            on_extracted: Some(&register_imports),
        };
        let refreshed = slot.ensure_fresh(&ctx, wait);

        if refreshed.changed {
            if let Some(name) = self.graph.name_of(slot.id()) {
                self.invalidate_dependents(slot.id(), &[name], requester);
            }
            self.notifier.notify();
        }

        refreshed.result
    }

    fn after_text_change(&self, id: &DocumentId, text: &str) {
        let mut affected = self.graph.set_name(id, g4_parser::sniff_grammar_name(text));
        if affected.is_empty()
            && let Some(name) = self.graph.name_of(id)
        {
            affected.push(name);
        }
        if self.invalidate_dependents(id, &affected, None) {
            self.notifier.notify();
        }
    }

    /// Bump the dependency epoch of every document importing one of
    /// `names`. Returns whether any document was invalidated.
    fn invalidate_dependents(
        &self,
        origin: &DocumentId,
        names: &[String],
        skip: Option<&DocumentId>,
    ) -> bool {
        let mut invalidated = false;
        for dependent in self.graph.dependents(origin, names) {
            if skip == Some(&dependent) {
                continue;
            }
            if let Some(slot) = self.slot(&dependent) {
                slot.invalidate_dependencies();
                invalidated = true;
            }
        }
        if invalidated {
            tracing::debug!(document = %origin, ?names, "invalidated dependents");
        }
        invalidated
    }
}

/// Import resolution over the documents registered with an index.
///
/// Imported documents are analyzed on demand but never waited for: if one is
/// being analyzed by another thread (or is part of the import cycle that
/// triggered this analysis), its last published table is used.
struct IndexImports<'a> {
    index: &'a GrammarIndex,
    /// Document whose analysis is resolving imports.
    requester: &'a DocumentId,
}

impl ImportedSymbols for IndexImports<'_> {
    fn symbol_table(&self, grammar: &str) -> Option<Arc<SymbolTable>> {
        let registered = self
            .index
            .graph
            .document_for(grammar)
            .filter(|id| id != self.requester)
            .and_then(|id| self.index.slot(&id));

        if let Some(slot) = registered {
            self.index
                .refresh_slot(&slot, Wait::Never, Some(self.requester));
            return slot
                .published()
                .map(|result| Arc::clone(result.symbol_table()));
        }

        self.index
            .host_imports
            .as_ref()
            .and_then(|host| host.symbol_table(grammar))
    }
}
