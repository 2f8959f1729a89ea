//! Symbol extraction: one table entry per declared rule, token, mode,
//! channel and import of a grammar.

use std::fmt;

use g4_parser::{GrammarType, Location, NodeKind, SyntaxNode};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::instrument;

use crate::diagnostics::Diagnostic;

/// Name of the mode lexer rules belong to outside any `mode` block.
pub const DEFAULT_MODE: &str = "DEFAULT_MODE";

const BUILT_INS: [(Namespace, &str, SymbolKind); 4] = [
    (Namespace::Token, "EOF", SymbolKind::BuiltInLexerToken),
    (Namespace::Mode, DEFAULT_MODE, SymbolKind::BuiltInMode),
    (
        Namespace::Channel,
        "DEFAULT_TOKEN_CHANNEL",
        SymbolKind::BuiltInChannel,
    ),
    (Namespace::Channel, "HIDDEN", SymbolKind::BuiltInChannel),
];

/// Separate name spaces: a rule `a` and a token `A` never alias, and
/// neither does a mode and a token of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Namespace {
    Rule,
    Token,
    Mode,
    Channel,
}

impl Namespace {
    /// Namespace of a rule element reference: uppercase-leading names are
    /// tokens, everything else is a parser rule.
    #[must_use]
    pub fn of_element(name: &str) -> Self {
        if name.chars().next().is_some_and(char::is_uppercase) {
            Self::Token
        } else {
            Self::Rule
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rule => write!(f, "rule"),
            Self::Token => write!(f, "token"),
            Self::Mode => write!(f, "mode"),
            Self::Channel => write!(f, "channel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SymbolKind {
    ParserRule,
    LexerToken,
    FragmentLexerToken,
    LexerMode,
    /// Declared in `tokens { ... }`.
    VirtualLexerToken,
    /// Declared in `channels { ... }`.
    TokenChannel,
    BuiltInLexerToken,
    BuiltInMode,
    BuiltInChannel,
    /// A grammar named in `import`.
    Import,
    /// The grammar named by the `tokenVocab` option.
    TokenVocab,
}

impl SymbolKind {
    /// Namespace the symbol is defined in. Imports are not referable.
    #[must_use]
    pub fn namespace(self) -> Option<Namespace> {
        match self {
            Self::ParserRule => Some(Namespace::Rule),
            Self::LexerToken
            | Self::FragmentLexerToken
            | Self::VirtualLexerToken
            | Self::BuiltInLexerToken => Some(Namespace::Token),
            Self::LexerMode | Self::BuiltInMode => Some(Namespace::Mode),
            Self::TokenChannel | Self::BuiltInChannel => Some(Namespace::Channel),
            Self::Import | Self::TokenVocab => None,
        }
    }

    /// Whether an editor should annotate symbols of this kind with their
    /// reference count.
    #[must_use]
    pub fn shows_reference_count(self) -> bool {
        match self {
            Self::ParserRule | Self::LexerToken | Self::FragmentLexerToken | Self::LexerMode => {
                true
            }
            Self::VirtualLexerToken
            | Self::TokenChannel
            | Self::BuiltInLexerToken
            | Self::BuiltInMode
            | Self::BuiltInChannel
            | Self::Import
            | Self::TokenVocab => false,
        }
    }

    /// Kind reported for a name that is referenced but defined nowhere.
    #[must_use]
    pub fn for_undefined(namespace: Namespace) -> Self {
        match namespace {
            Namespace::Rule => Self::ParserRule,
            Namespace::Token => Self::LexerToken,
            Namespace::Mode => Self::LexerMode,
            Namespace::Channel => Self::TokenChannel,
        }
    }
}

/// Where a symbol, or the target of a reference, comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Origin {
    Local,
    BuiltIn,
    /// Defined by the named imported grammar.
    Imported(String),
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Location of the declaring name; `None` for reference-only symbols.
    pub definition: Option<Location>,
    /// Mode a lexer token or fragment is declared under.
    pub containing_mode: Option<String>,
    pub origin: Origin,
}

impl Symbol {
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.definition.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ImportKind {
    /// `import X;`
    Delegate,
    /// `options { tokenVocab = X; }`
    TokenVocab,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Import {
    /// Grammar name being imported.
    pub grammar: String,
    /// `B` in `import B = C;`
    pub alias: Option<String>,
    pub location: Location,
    pub kind: ImportKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct NamespaceIndex {
    rules: FxHashMap<String, usize>,
    tokens: FxHashMap<String, usize>,
    modes: FxHashMap<String, usize>,
    channels: FxHashMap<String, usize>,
}

impl NamespaceIndex {
    fn get(&self, namespace: Namespace) -> &FxHashMap<String, usize> {
        match namespace {
            Namespace::Rule => &self.rules,
            Namespace::Token => &self.tokens,
            Namespace::Mode => &self.modes,
            Namespace::Channel => &self.channels,
        }
    }

    fn get_mut(&mut self, namespace: Namespace) -> &mut FxHashMap<String, usize> {
        match namespace {
            Namespace::Rule => &mut self.rules,
            Namespace::Token => &mut self.tokens,
            Namespace::Mode => &mut self.modes,
            Namespace::Channel => &mut self.channels,
        }
    }
}

/// Declared symbols of one grammar, in source order.
///
/// Names are unique per namespace: the first declaration wins and every
/// later one is reported as a duplicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    grammar_name: Option<String>,
    grammar_type: GrammarType,
    symbols: Vec<Symbol>,
    index: NamespaceIndex,
    imports: Vec<Import>,
    diagnostics: Vec<Diagnostic>,
}

impl SymbolTable {
    #[must_use]
    pub fn grammar_name(&self) -> Option<&str> {
        self.grammar_name.as_deref()
    }

    #[must_use]
    pub fn grammar_type(&self) -> GrammarType {
        self.grammar_type
    }

    /// Local symbols in definition order, imports included.
    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// The canonical local definition of `name` in `namespace`.
    #[must_use]
    pub fn lookup(&self, namespace: Namespace, name: &str) -> Option<&Symbol> {
        self.index
            .get(namespace)
            .get(name)
            .and_then(|&position| self.symbols.get(position))
    }

    /// Grammars named by `import` and `tokenVocab`, in source order.
    #[must_use]
    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    #[must_use]
    pub fn token_vocab(&self) -> Option<&Import> {
        self.imports
            .iter()
            .find(|import| import.kind == ImportKind::TokenVocab)
    }

    /// Duplicate-definition diagnostics found while extracting.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn define(&mut self, kind: SymbolKind, name_node: &SyntaxNode, containing_mode: Option<&str>) {
        let Some(name) = name_node.identifier() else {
            return;
        };

        if let Some(namespace) = kind.namespace() {
            if self.index.get(namespace).contains_key(name) {
                tracing::debug!(name, %namespace, "duplicate definition");
                self.diagnostics.push(Diagnostic::duplicate_definition(
                    name,
                    namespace,
                    &name_node.location,
                ));
                return;
            }
            self.index
                .get_mut(namespace)
                .insert(name.to_string(), self.symbols.len());
        }

        self.symbols.push(Symbol {
            name: name.to_string(),
            kind,
            definition: Some(name_node.location.clone()),
            containing_mode: containing_mode.map(ToString::to_string),
            origin: Origin::Local,
        });
    }

    fn add_import(&mut self, import: Import) {
        let kind = match import.kind {
            ImportKind::Delegate => SymbolKind::Import,
            ImportKind::TokenVocab => SymbolKind::TokenVocab,
        };
        self.symbols.push(Symbol {
            name: import.grammar.clone(),
            kind,
            definition: Some(import.location.clone()),
            containing_mode: None,
            origin: Origin::Local,
        });
        self.imports.push(import);
    }
}

/// Kind of the built-in symbol `name` in `namespace`, if there is one.
#[must_use]
pub fn built_in(namespace: Namespace, name: &str) -> Option<SymbolKind> {
    BUILT_INS
        .iter()
        .find(|(ns, built_in, _)| *ns == namespace && *built_in == name)
        .map(|(_, _, kind)| *kind)
}

/// Build the symbol table of a parsed grammar.
#[must_use]
#[instrument(level = "debug", skip_all)]
pub fn extract(tree: &SyntaxNode) -> SymbolTable {
    let mut table = SymbolTable {
        grammar_name: tree.grammar_name().map(ToString::to_string),
        grammar_type: tree.grammar_type(),
        ..SymbolTable::default()
    };
    for node in &tree.children {
        visit_declaration(&mut table, node, None);
    }
    tracing::debug!(
        symbols = table.symbols.len(),
        duplicates = table.diagnostics.len(),
        "extracted symbols"
    );
    table
}

fn visit_declaration(table: &mut SymbolTable, node: &SyntaxNode, mode: Option<&str>) {
    match &node.kind {
        NodeKind::ParserRule => {
            if let Some(name) = node.name_node() {
                table.define(SymbolKind::ParserRule, name, None);
            }
        }
        NodeKind::LexerRule { fragment } => {
            let kind = if *fragment {
                SymbolKind::FragmentLexerToken
            } else {
                SymbolKind::LexerToken
            };
            if let Some(name) = node.name_node() {
                table.define(kind, name, Some(mode.unwrap_or(DEFAULT_MODE)));
            }
        }
        NodeKind::ModeSpec => {
            let Some(name) = node.name_node() else {
                return;
            };
            table.define(SymbolKind::LexerMode, name, None);
            let mode = name.identifier();
            for rule in node.children.iter().skip(1) {
                visit_declaration(table, rule, mode);
            }
        }
        NodeKind::TokensSpec => {
            for name in &node.children {
                table.define(SymbolKind::VirtualLexerToken, name, None);
            }
        }
        NodeKind::ChannelsSpec => {
            for name in &node.children {
                table.define(SymbolKind::TokenChannel, name, None);
            }
        }
        NodeKind::DelegateGrammars => {
            for delegate in &node.children {
                if let NodeKind::DelegateGrammar { name, alias } = &delegate.kind {
                    table.add_import(Import {
                        grammar: name.clone(),
                        alias: alias.clone(),
                        location: delegate.location.clone(),
                        kind: ImportKind::Delegate,
                    });
                }
            }
        }
        NodeKind::OptionsSpec => {
            for entry in &node.children {
                if let Some(import) = token_vocab(entry) {
                    table.add_import(import);
                }
            }
        }
        NodeKind::Grammar
        | NodeKind::GrammarDecl { .. }
        | NodeKind::OptionEntry { .. }
        | NodeKind::DelegateGrammar { .. }
        | NodeKind::NamedAction { .. }
        | NodeKind::Alternatives
        | NodeKind::Block
        | NodeKind::Alternative { .. }
        | NodeKind::Labeled { .. }
        | NodeKind::Suffixed { .. }
        | NodeKind::NotSet
        | NodeKind::CharacterRange
        | NodeKind::Identifier { .. }
        | NodeKind::Literal { .. }
        | NodeKind::CharSet { .. }
        | NodeKind::Wildcard
        | NodeKind::Action
        | NodeKind::Predicate
        | NodeKind::ElementOptions
        | NodeKind::LexerCommands
        | NodeKind::LexerCommand { .. }
        | NodeKind::ExceptionHandler
        | NodeKind::Error => {}
    }
}

/// `tokenVocab = Name;` or `tokenVocab = 'Name';`
fn token_vocab(entry: &SyntaxNode) -> Option<Import> {
    let NodeKind::OptionEntry { key } = &entry.kind else {
        return None;
    };
    if key != "tokenVocab" {
        return None;
    }
    let value = entry.children.first()?;
    let grammar = if let Some(name) = value.identifier() {
        name.to_string()
    } else if let NodeKind::Literal { text } = &value.kind {
        text.trim_matches('\'').to_string()
    } else {
        return None;
    };
    Some(Import {
        grammar,
        alias: None,
        location: value.location.clone(),
        kind: ImportKind::TokenVocab,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(input: &str) -> SymbolTable {
        extract(&g4_parser::parse(input).tree)
    }

    fn names(table: &SymbolTable) -> Vec<(&str, SymbolKind)> {
        table
            .symbols()
            .iter()
            .map(|symbol| (symbol.name.as_str(), symbol.kind))
            .collect()
    }

    #[test]
    fn test_definitions_in_source_order() {
        let table = table(
            "grammar Expr;\n\
             expr: term ('+' term)*;\n\
             term: INT;\n\
             INT: DIGIT+;\n\
             fragment DIGIT: [0-9];\n",
        );
        assert_eq!(table.grammar_name(), Some("Expr"));
        assert_eq!(
            names(&table),
            vec![
                ("expr", SymbolKind::ParserRule),
                ("term", SymbolKind::ParserRule),
                ("INT", SymbolKind::LexerToken),
                ("DIGIT", SymbolKind::FragmentLexerToken),
            ]
        );
    }

    #[test]
    fn test_modes_track_containing_mode() {
        let table = table(
            "lexer grammar L;\n\
             OPEN: '<' -> pushMode(TAG);\n\
             mode TAG;\n\
             CLOSE: '>' -> popMode;\n",
        );
        let modes: Vec<_> = table
            .symbols()
            .iter()
            .map(|s| (s.name.as_str(), s.containing_mode.as_deref()))
            .collect();
        assert_eq!(
            modes,
            vec![
                ("OPEN", Some(DEFAULT_MODE)),
                ("TAG", None),
                ("CLOSE", Some("TAG")),
            ]
        );
        assert_eq!(
            table.lookup(Namespace::Mode, "TAG").map(|s| s.kind),
            Some(SymbolKind::LexerMode)
        );
    }

    #[test]
    fn test_duplicates_keep_first_definition() {
        let table = table("grammar T;\na: 'x';\na: 'y';\n");
        assert_eq!(table.len(), 1);
        assert_eq!(table.diagnostics().len(), 1);
        let first = table.lookup(Namespace::Rule, "a").and_then(|s| s.definition.clone());
        assert_eq!(first.map(|location| location.start.line), Some(2));
    }

    #[test]
    fn test_same_name_in_different_namespaces() {
        let table = table("grammar T;\na: A;\nA: 'a';\n");
        assert!(table.diagnostics().is_empty());
        assert!(table.lookup(Namespace::Rule, "a").is_some());
        assert!(table.lookup(Namespace::Token, "A").is_some());
        assert!(table.lookup(Namespace::Rule, "A").is_none());
    }

    #[test]
    fn test_prequel_symbols() {
        let table = table(
            "parser grammar P;\n\
             options { tokenVocab = PLexer; }\n\
             import Common, X = Other;\n\
             tokens { VIRTUAL }\n\
             r: VIRTUAL;\n",
        );
        assert_eq!(
            names(&table),
            vec![
                ("PLexer", SymbolKind::TokenVocab),
                ("Common", SymbolKind::Import),
                ("Other", SymbolKind::Import),
                ("VIRTUAL", SymbolKind::VirtualLexerToken),
                ("r", SymbolKind::ParserRule),
            ]
        );
        assert_eq!(table.token_vocab().map(|i| i.grammar.as_str()), Some("PLexer"));
        assert_eq!(
            table.imports().get(2).and_then(|i| i.alias.as_deref()),
            Some("X")
        );
    }

    #[test]
    fn test_channels() {
        let table = table("lexer grammar L;\nchannels { COMMENTS }\nC: '#' -> channel(COMMENTS);\n");
        assert_eq!(
            table.lookup(Namespace::Channel, "COMMENTS").map(|s| s.kind),
            Some(SymbolKind::TokenChannel)
        );
    }

    #[test]
    fn test_empty_grammar_has_no_symbols() {
        assert!(table("grammar Empty;\n").is_empty());
        assert!(table("").is_empty());
    }

    #[rstest::rstest]
    #[case(Namespace::Token, "EOF", Some(SymbolKind::BuiltInLexerToken))]
    #[case(Namespace::Mode, "DEFAULT_MODE", Some(SymbolKind::BuiltInMode))]
    #[case(Namespace::Channel, "HIDDEN", Some(SymbolKind::BuiltInChannel))]
    #[case(Namespace::Rule, "EOF", None)]
    #[case(Namespace::Token, "HIDDEN", None)]
    fn test_built_ins(
        #[case] namespace: Namespace,
        #[case] name: &str,
        #[case] expected: Option<SymbolKind>,
    ) {
        assert_eq!(built_in(namespace, name), expected);
    }

    #[rstest::rstest]
    #[case(SymbolKind::ParserRule, true)]
    #[case(SymbolKind::LexerToken, true)]
    #[case(SymbolKind::FragmentLexerToken, true)]
    #[case(SymbolKind::LexerMode, true)]
    #[case(SymbolKind::VirtualLexerToken, false)]
    #[case(SymbolKind::TokenChannel, false)]
    #[case(SymbolKind::BuiltInLexerToken, false)]
    #[case(SymbolKind::BuiltInMode, false)]
    #[case(SymbolKind::BuiltInChannel, false)]
    #[case(SymbolKind::Import, false)]
    #[case(SymbolKind::TokenVocab, false)]
    fn test_reference_count_eligibility(#[case] kind: SymbolKind, #[case] expected: bool) {
        assert_eq!(kind.shows_reference_count(), expected);
    }
}
