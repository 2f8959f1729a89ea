//! Cross-document import graph
//!
//! Tracks which grammar name each document declares and which grammars it
//! imports, so that a change to one grammar can mark every document that
//! (transitively) imports it as stale.

use std::collections::{BTreeSet, VecDeque};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::DocumentId;

#[derive(Debug, Default)]
struct GraphState {
    /// Declared grammar name per document.
    names: FxHashMap<DocumentId, String>,
    /// Documents declaring each grammar name. Ordered so that the choice
    /// between two files declaring the same grammar is stable.
    documents: FxHashMap<String, BTreeSet<DocumentId>>,
    /// Grammar names each document imports, `tokenVocab` included.
    imports: FxHashMap<DocumentId, Vec<String>>,
}

impl GraphState {
    fn unregister_name(&mut self, id: &DocumentId) -> Option<String> {
        let old = self.names.remove(id)?;
        if let Some(documents) = self.documents.get_mut(&old) {
            documents.remove(id);
            if documents.is_empty() {
                self.documents.remove(&old);
            }
        }
        Some(old)
    }
}

#[derive(Debug, Default)]
pub(crate) struct ImportGraph {
    state: RwLock<GraphState>,
}

impl ImportGraph {
    /// Record the grammar name `id` declares. Returns the names whose
    /// dependents must be invalidated (old and new), empty if unchanged.
    pub(crate) fn set_name(&self, id: &DocumentId, name: Option<String>) -> Vec<String> {
        let mut state = self.state.write();
        if state.names.get(id) == name.as_ref() {
            return Vec::new();
        }

        let mut affected: Vec<String> = state.unregister_name(id).into_iter().collect();
        if let Some(name) = name {
            state
                .documents
                .entry(name.clone())
                .or_default()
                .insert(id.clone());
            state.names.insert(id.clone(), name.clone());
            affected.push(name);
        }
        affected
    }

    pub(crate) fn name_of(&self, id: &DocumentId) -> Option<String> {
        self.state.read().names.get(id).cloned()
    }

    pub(crate) fn set_imports(&self, id: &DocumentId, imports: Vec<String>) {
        let mut state = self.state.write();
        if imports.is_empty() {
            state.imports.remove(id);
        } else {
            state.imports.insert(id.clone(), imports);
        }
    }

    /// Forget `id`. Returns its grammar name if it had one.
    pub(crate) fn remove(&self, id: &DocumentId) -> Option<String> {
        let mut state = self.state.write();
        state.imports.remove(id);
        state.unregister_name(id)
    }

    /// Document providing grammar `name`.
    pub(crate) fn document_for(&self, name: &str) -> Option<DocumentId> {
        self.state
            .read()
            .documents
            .get(name)
            .and_then(|documents| documents.first().cloned())
    }

    /// Every document that imports one of `names`, directly or through other
    /// documents. `origin` itself is never included.
    pub(crate) fn dependents(&self, origin: &DocumentId, names: &[String]) -> Vec<DocumentId> {
        let state = self.state.read();
        let mut queue: VecDeque<&str> = names.iter().map(String::as_str).collect();
        let mut seen_names: FxHashSet<&str> = FxHashSet::default();
        let mut found: BTreeSet<DocumentId> = BTreeSet::new();

        while let Some(name) = queue.pop_front() {
            if !seen_names.insert(name) {
                continue;
            }
            for (document, imports) in &state.imports {
                if document == origin || found.contains(document) {
                    continue;
                }
                if imports.iter().any(|import| import == name) {
                    found.insert(document.clone());
                    if let Some(dependent_name) = state.names.get(document) {
                        queue.push_back(dependent_name);
                    }
                }
            }
        }

        found.into_iter().collect()
    }
}
