//! Analysis results and the parse, extract, resolve pipeline producing them.

use std::{
    hash::{Hash, Hasher},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use g4_parser::{Location, NodeKind, SyntaxError, SyntaxNode};
use rustc_hash::FxHasher;
use serde::Serialize;
use tracing::instrument;

use crate::{
    config::IndexOptions,
    diagnostics::Diagnostic,
    resolve::{ImportedSymbols, NoImports, Occurrence, resolve},
    symbols::{Symbol, SymbolKind, SymbolTable, extract},
};

/// Content fingerprint used to detect unchanged text.
#[must_use]
pub fn fingerprint(text: &str) -> u64 {
    let mut hasher = FxHasher::default();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Immutable text of a document as it was at some point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub text: Arc<str>,
    pub fingerprint: u64,
    /// Assigned by the cache, increasing per document.
    pub version: u64,
}

impl Snapshot {
    #[must_use]
    pub fn new(text: &str, version: u64) -> Self {
        Self {
            text: Arc::from(text),
            fingerprint: fingerprint(text),
            version,
        }
    }

    /// Whether `text` is the text of this snapshot.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.fingerprint == fingerprint(text) && &*self.text == text
    }
}

/// Everything known about one snapshot of a document.
///
/// Published results are shared behind an `Arc` and never mutated; a newer
/// analysis replaces the whole result.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    snapshot: Snapshot,
    tree: SyntaxNode,
    syntax_errors: Vec<SyntaxError>,
    symbols: Arc<SymbolTable>,
    unresolved: Vec<Symbol>,
    occurrences: Vec<Occurrence>,
    diagnostics: Vec<Diagnostic>,
    dependency_epoch: u64,
}

impl AnalysisResult {
    /// A result with no symbols, served when no analysis is available yet.
    #[must_use]
    pub fn empty(snapshot: Snapshot, dependency_epoch: u64) -> Self {
        Self {
            snapshot,
            tree: SyntaxNode::leaf(NodeKind::Grammar, Location::default()),
            syntax_errors: Vec::new(),
            symbols: Arc::default(),
            unresolved: Vec::new(),
            occurrences: Vec::new(),
            diagnostics: Vec::new(),
            dependency_epoch,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.snapshot.version
    }

    #[must_use]
    pub fn dependency_epoch(&self) -> u64 {
        self.dependency_epoch
    }

    #[must_use]
    pub fn tree(&self) -> &SyntaxNode {
        &self.tree
    }

    #[must_use]
    pub fn syntax_errors(&self) -> &[SyntaxError] {
        &self.syntax_errors
    }

    #[must_use]
    pub fn symbol_table(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    /// Names referenced but defined nowhere, in first-reference order.
    #[must_use]
    pub fn unresolved(&self) -> &[Symbol] {
        &self.unresolved
    }

    #[must_use]
    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    /// Syntax errors followed by semantic diagnostics.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Reference occurrences of `name`, matched exactly.
    pub fn references<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Occurrence> {
        self.occurrences
            .iter()
            .filter(move |occurrence| occurrence.is_reference() && occurrence.name == name)
    }

    #[must_use]
    pub fn reference_count(&self, name: &str) -> usize {
        self.references(name).count()
    }

    /// Local symbol or reference-only symbol named `name`. Local definitions
    /// win when a name exists in several namespaces.
    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols
            .symbols()
            .iter()
            .chain(&self.unresolved)
            .find(|symbol| symbol.name == name)
    }

    /// Symbols in definition order followed by reference-only symbols.
    #[must_use]
    pub fn list_symbols(&self, filter: &SymbolFilter) -> Vec<SymbolInfo> {
        let reference_only: &[Symbol] = if filter.defined_only {
            &[]
        } else {
            &self.unresolved
        };

        self.symbols
            .symbols()
            .iter()
            .chain(reference_only)
            .filter(|symbol| filter.accepts(symbol.kind))
            .map(|symbol| self.describe(symbol, filter.with_references))
            .collect()
    }

    /// `symbol` with its namespace-exact reference count, and the reference
    /// locations when `with_references` is set.
    #[must_use]
    pub fn describe(&self, symbol: &Symbol, with_references: bool) -> SymbolInfo {
        let references: Vec<_> = match symbol.kind.namespace() {
            Some(namespace) => self
                .occurrences
                .iter()
                .filter(|o| o.is_reference() && o.namespace == namespace && o.name == symbol.name)
                .map(|o| o.location.clone())
                .collect(),
            None => Vec::new(),
        };
        SymbolInfo {
            symbol: symbol.clone(),
            reference_count: references.len(),
            references: if with_references {
                references
            } else {
                Vec::new()
            },
        }
    }

    /// Whether two results expose the same symbols and occurrences.
    pub(crate) fn same_view(&self, other: &Self) -> bool {
        self.symbols.symbols() == other.symbols.symbols()
            && self.unresolved == other.unresolved
            && self.occurrences == other.occurrences
    }
}

/// Selects what `list_symbols` returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolFilter {
    /// Only these kinds; `None` for all.
    pub kinds: Option<Vec<SymbolKind>>,
    /// Leave out reference-only symbols.
    pub defined_only: bool,
    /// Leave out `import` and `tokenVocab` entries, which declare no
    /// referable name.
    pub without_imports: bool,
    /// Attach reference locations to every entry.
    pub with_references: bool,
}

impl SymbolFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn defined() -> Self {
        Self {
            defined_only: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = SymbolKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_references(mut self) -> Self {
        self.with_references = true;
        self
    }

    #[must_use]
    pub fn without_imports(mut self) -> Self {
        self.without_imports = true;
        self
    }

    fn accepts(&self, kind: SymbolKind) -> bool {
        if self.without_imports && kind.namespace().is_none() {
            return false;
        }
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }
}

/// A symbol as returned by the list queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolInfo {
    #[serde(flatten)]
    pub symbol: Symbol,
    pub reference_count: usize,
    /// Reference locations; only filled in for exhaustive listings.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Location>,
}

/// Shared inputs of one analysis run.
pub(crate) struct AnalysisContext<'a> {
    pub(crate) imports: &'a dyn ImportedSymbols,
    pub(crate) options: &'a IndexOptions,
    /// Front-end invocations, across all documents.
    pub(crate) parses: &'a AtomicU64,
    /// Told about the extracted table before imports are resolved.
    pub(crate) on_extracted: Option<&'a dyn Fn(&SymbolTable)>,
}

/// Run the pipeline for `snapshot`.
///
/// `cancelled` is checked between stages; once it returns `true` the work is
/// abandoned and `None` comes back.
#[instrument(level = "debug", skip_all, fields(version = snapshot.version))]
pub(crate) fn analyze(
    snapshot: &Snapshot,
    dependency_epoch: u64,
    ctx: &AnalysisContext<'_>,
    cancelled: impl Fn() -> bool,
) -> Option<AnalysisResult> {
    ctx.parses.fetch_add(1, Ordering::Relaxed);
    let parsed = g4_parser::parse(&snapshot.text);
    if cancelled() {
        tracing::debug!("analysis superseded after parse");
        return None;
    }

    let table = extract(&parsed.tree);
    if cancelled() {
        tracing::debug!("analysis superseded after extract");
        return None;
    }
    if let Some(on_extracted) = ctx.on_extracted {
        on_extracted(&table);
    }

    let imports: &dyn ImportedSymbols = if ctx.options.resolve_imports {
        ctx.imports
    } else {
        &NoImports
    };
    let resolution = resolve(&parsed.tree, &table, imports, ctx.options.warn_unresolved);
    if cancelled() {
        tracing::debug!("analysis superseded after resolve");
        return None;
    }

    let diagnostics = parsed
        .errors
        .iter()
        .map(Diagnostic::from_syntax_error)
        .chain(table.diagnostics().iter().cloned())
        .chain(resolution.diagnostics)
        .collect();

    Some(AnalysisResult {
        snapshot: snapshot.clone(),
        tree: parsed.tree,
        syntax_errors: parsed.errors,
        symbols: Arc::new(table),
        unresolved: resolution.unresolved,
        occurrences: resolution.occurrences,
        diagnostics,
        dependency_epoch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn analyze_text(text: &str) -> AnalysisResult {
        let options = IndexOptions::default();
        let parses = AtomicU64::new(0);
        let ctx = AnalysisContext {
            imports: &NoImports,
            options: &options,
            parses: &parses,
            on_extracted: None,
        };
        analyze(&Snapshot::new(text, 1), 0, &ctx, || false)
            .unwrap_or_else(|| AnalysisResult::empty(Snapshot::new(text, 1), 0))
    }

    #[test]
    fn test_list_symbols_defined_then_unresolved() {
        let result = analyze_text("grammar T;\na: b c;\nb: 'x';\n");
        let listed: Vec<_> = result
            .list_symbols(&SymbolFilter::all())
            .into_iter()
            .map(|info| (info.symbol.name.clone(), info.symbol.is_defined(), info.reference_count))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("a".to_string(), true, 0),
                ("b".to_string(), true, 1),
                ("c".to_string(), false, 1),
            ]
        );

        let defined = result.list_symbols(&SymbolFilter::defined());
        assert!(defined.iter().all(|info| info.symbol.definition.is_some()));
        assert_eq!(defined.len(), 2);
    }

    #[test]
    fn test_exhaustive_listing_carries_locations() {
        let text = "grammar T;\na: b b;\nb: 'x';\n";
        let result = analyze_text(text);
        let infos = result.list_symbols(&SymbolFilter::all().with_references());
        let b = infos.iter().find(|info| info.symbol.name == "b");
        let slices: Vec<_> = b
            .map(|info| {
                info.references
                    .iter()
                    .filter_map(|location| location.slice(text))
                    .collect()
            })
            .unwrap_or_default();
        assert_eq!(slices, vec!["b", "b"]);
    }

    #[test]
    fn test_kind_filter() {
        let result = analyze_text("grammar T;\na: A;\nA: 'a';\nfragment F: 'f';\n");
        let tokens: Vec<_> = result
            .list_symbols(&SymbolFilter::all().with_kinds([SymbolKind::LexerToken]))
            .into_iter()
            .map(|info| info.symbol.name)
            .collect();
        assert_eq!(tokens, vec!["A".to_string()]);
    }

    #[test]
    fn test_reference_count_is_case_sensitive() {
        let result = analyze_text("grammar T;\na: A A;\nA: 'a';\n");
        assert_eq!(result.reference_count("A"), 2);
        assert_eq!(result.reference_count("a"), 0);
        assert_eq!(result.reference_count("missing"), 0);
    }

    #[test]
    fn test_diagnostics_combine_all_stages() {
        let result = analyze_text("grammar T;\na: b\nc: 'x';\nc: 'y';\n");
        let codes: Vec<_> = result.diagnostics().iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            vec![
                crate::DiagnosticCode::Syntax,
                crate::DiagnosticCode::DuplicateDefinition,
                crate::DiagnosticCode::UnresolvedReference,
            ]
        );
    }

    #[test]
    fn test_cancelled_analysis_returns_nothing() {
        let options = IndexOptions::default();
        let parses = AtomicU64::new(0);
        let ctx = AnalysisContext {
            imports: &NoImports,
            options: &options,
            parses: &parses,
            on_extracted: None,
        };
        let snapshot = Snapshot::new("grammar T;\na: 'x';\n", 1);
        assert!(analyze(&snapshot, 0, &ctx, || true).is_none());
        assert_eq!(parses.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_symbol_info_serializes_flat() {
        let result = analyze_text("grammar T;\na: 'x';\n");
        let infos = result.list_symbols(&SymbolFilter::all());
        let json = serde_json::to_value(&infos).unwrap_or_default();
        assert_eq!(json[0]["name"], "a");
        assert_eq!(json[0]["kind"], "ParserRule");
        assert_eq!(json[0]["reference_count"], 0);
        assert!(json[0].get("references").is_none());
    }
}
