//! Reference resolution: classify every identifier of a grammar as a
//! definition or a reference, and link references to the namespace their
//! lexical position implies.

use std::{collections::VecDeque, sync::Arc};

use g4_parser::{Location, NodeKind, SyntaxNode};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::instrument;

use crate::{
    diagnostics::Diagnostic,
    symbols::{ImportKind, Namespace, Origin, Symbol, SymbolKind, SymbolTable, built_in},
};

/// Source of symbol tables for imported grammars.
///
/// Returning `None` means the grammar is unknown or currently unavailable;
/// names it would have defined then resolve as unresolved.
pub trait ImportedSymbols: Send + Sync {
    fn symbol_table(&self, grammar: &str) -> Option<Arc<SymbolTable>>;
}

/// An `ImportedSymbols` that knows no grammars.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImports;

impl ImportedSymbols for NoImports {
    fn symbol_table(&self, _grammar: &str) -> Option<Arc<SymbolTable>> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OccurrenceKind {
    Definition,
    Reference,
}

/// One textual appearance of a symbol name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Occurrence {
    pub name: String,
    pub location: Location,
    pub kind: OccurrenceKind,
    pub namespace: Namespace,
    pub resolution: Origin,
}

impl Occurrence {
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.kind == OccurrenceKind::Reference
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Occurrences in source order.
    pub occurrences: Vec<Occurrence>,
    /// Referenced names with no definition anywhere, in first-reference
    /// order.
    pub unresolved: Vec<Symbol>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve all identifiers of `tree` against its own `table`, the built-in
/// symbols and whatever `imports` provides.
#[must_use]
#[instrument(level = "debug", skip_all, fields(grammar = table.grammar_name()))]
pub fn resolve(
    tree: &SyntaxNode,
    table: &SymbolTable,
    imports: &dyn ImportedSymbols,
    warn_unresolved: bool,
) -> Resolution {
    let mut resolver = Resolver::new(table, imports);
    resolver.check_imports();

    let mut resolution = Resolution {
        diagnostics: std::mem::take(&mut resolver.diagnostics),
        ..Resolution::default()
    };
    let mut unresolved_seen = FxHashSet::default();

    tree.walk(&mut |node, parent| {
        let (Some(name), Some(parent)) = (node.identifier(), parent) else {
            return;
        };
        let Some((kind, namespace)) = classify(node, parent) else {
            return;
        };

        let resolution_origin = match kind {
            OccurrenceKind::Definition => Origin::Local,
            OccurrenceKind::Reference => resolver.lookup(namespace, name),
        };

        if resolution_origin == Origin::Unresolved {
            if warn_unresolved {
                resolution.diagnostics.push(Diagnostic::unresolved_reference(
                    name,
                    namespace,
                    &node.location,
                ));
            }
            if unresolved_seen.insert((namespace, name.to_string())) {
                resolution.unresolved.push(Symbol {
                    name: name.to_string(),
                    kind: SymbolKind::for_undefined(namespace),
                    definition: None,
                    containing_mode: None,
                    origin: Origin::Unresolved,
                });
            }
        }

        resolution.occurrences.push(Occurrence {
            name: name.to_string(),
            location: node.location.clone(),
            kind,
            namespace,
            resolution: resolution_origin,
        });
    });

    tracing::debug!(
        occurrences = resolution.occurrences.len(),
        unresolved = resolution.unresolved.len(),
        "resolved references"
    );
    resolution
}

/// Decide from the parent node what an identifier is.
fn classify(node: &SyntaxNode, parent: &SyntaxNode) -> Option<(OccurrenceKind, Namespace)> {
    let definition = |namespace| Some((OccurrenceKind::Definition, namespace));
    let is_name = || parent.name_node().is_some_and(|name| std::ptr::eq(name, node));

    match &parent.kind {
        NodeKind::ParserRule if is_name() => definition(Namespace::Rule),
        NodeKind::LexerRule { .. } if is_name() => definition(Namespace::Token),
        NodeKind::ModeSpec if is_name() => definition(Namespace::Mode),
        NodeKind::TokensSpec => definition(Namespace::Token),
        NodeKind::ChannelsSpec => definition(Namespace::Channel),
        NodeKind::Alternative { .. }
        | NodeKind::Labeled { .. }
        | NodeKind::Suffixed { .. }
        | NodeKind::NotSet => {
            let name = node.identifier()?;
            Some((OccurrenceKind::Reference, Namespace::of_element(name)))
        }
        NodeKind::LexerCommand { name } => {
            let namespace = match name.as_str() {
                "pushMode" | "mode" => Namespace::Mode,
                "type" => Namespace::Token,
                "channel" => Namespace::Channel,
                _ => return None,
            };
            Some((OccurrenceKind::Reference, namespace))
        }
        NodeKind::ParserRule
        | NodeKind::LexerRule { .. }
        | NodeKind::ModeSpec
        | NodeKind::Grammar
        | NodeKind::GrammarDecl { .. }
        | NodeKind::OptionsSpec
        | NodeKind::OptionEntry { .. }
        | NodeKind::DelegateGrammars
        | NodeKind::DelegateGrammar { .. }
        | NodeKind::NamedAction { .. }
        | NodeKind::Alternatives
        | NodeKind::Block
        | NodeKind::CharacterRange
        | NodeKind::Identifier { .. }
        | NodeKind::Literal { .. }
        | NodeKind::CharSet { .. }
        | NodeKind::Wildcard
        | NodeKind::Action
        | NodeKind::Predicate
        | NodeKind::ElementOptions
        | NodeKind::LexerCommands
        | NodeKind::ExceptionHandler
        | NodeKind::Error => None,
    }
}

struct Resolver<'a> {
    table: &'a SymbolTable,
    imports: &'a dyn ImportedSymbols,
    /// Each imported grammar is fetched at most once per resolution.
    fetched: FxHashMap<String, Option<Arc<SymbolTable>>>,
    /// Memoized imported lookups.
    found: FxHashMap<(Namespace, String), Option<String>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Resolver<'a> {
    fn new(table: &'a SymbolTable, imports: &'a dyn ImportedSymbols) -> Self {
        Self {
            table,
            imports,
            fetched: FxHashMap::default(),
            found: FxHashMap::default(),
            diagnostics: Vec::new(),
        }
    }

    fn fetch(&mut self, grammar: &str) -> Option<Arc<SymbolTable>> {
        if let Some(table) = self.fetched.get(grammar) {
            return table.clone();
        }
        let table = self.imports.symbol_table(grammar);
        if table.is_none() {
            tracing::debug!(grammar, "imported grammar not available");
        }
        self.fetched.insert(grammar.to_string(), table.clone());
        table
    }

    fn check_imports(&mut self) {
        for import in self.table.imports() {
            if self.fetch(&import.grammar).is_none() {
                self.diagnostics
                    .push(Diagnostic::unknown_import(&import.grammar, &import.location));
            }
        }
    }

    fn lookup(&mut self, namespace: Namespace, name: &str) -> Origin {
        if self.table.lookup(namespace, name).is_some() {
            return Origin::Local;
        }
        if built_in(namespace, name).is_some() {
            return Origin::BuiltIn;
        }
        let key = (namespace, name.to_string());
        let grammar = if let Some(found) = self.found.get(&key) {
            found.clone()
        } else {
            let found = self.find_imported(namespace, name);
            self.found.insert(key, found.clone());
            found
        };
        grammar.map_or(Origin::Unresolved, Origin::Imported)
    }

    /// Breadth-first over the import closure. `tokenVocab` edges only
    /// contribute tokens, and so does everything reached through them.
    fn find_imported(&mut self, namespace: Namespace, name: &str) -> Option<String> {
        let mut queue: VecDeque<(String, bool)> = self
            .table
            .imports()
            .iter()
            .map(|import| (import.grammar.clone(), import.kind == ImportKind::TokenVocab))
            .collect();
        let mut visited = FxHashSet::default();
        if let Some(own) = self.table.grammar_name() {
            visited.insert((own.to_string(), false));
            visited.insert((own.to_string(), true));
        }

        while let Some((grammar, tokens_only)) = queue.pop_front() {
            if !visited.insert((grammar.clone(), tokens_only)) {
                continue;
            }
            if tokens_only && namespace != Namespace::Token {
                continue;
            }
            let Some(imported) = self.fetch(&grammar) else {
                continue;
            };
            if imported.lookup(namespace, name).is_some() {
                return Some(grammar);
            }
            queue.extend(imported.imports().iter().map(|nested| {
                (
                    nested.grammar.clone(),
                    tokens_only || nested.kind == ImportKind::TokenVocab,
                )
            }));
        }
        None
    }
}
