use serde::Serialize;

use crate::Location;

/// The flavour declared in the grammar header.
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, Serialize)]
pub enum GrammarType {
    /// `grammar X;`: lexer and parser rules in one file.
    #[default]
    Combined,
    /// `lexer grammar X;`
    Lexer,
    /// `parser grammar X;`
    Parser,
}

impl std::fmt::Display for GrammarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Combined => write!(f, "grammar"),
            Self::Lexer => write!(f, "lexer grammar"),
            Self::Parser => write!(f, "parser grammar"),
        }
    }
}

/// EBNF repetition operator attached to an element.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
pub enum EbnfSuffix {
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

/// Node kinds of the grammar syntax tree.
///
/// Names that may denote symbols are always `Identifier` children so that
/// consumers can find every identifier-shaped node with one walk. Names that
/// never denote symbols (labels, option keys, command names) are stored on
/// the node kind itself.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    /// Root of every tree.
    Grammar,
    /// `grammar X;`; child: the grammar name identifier.
    GrammarDecl { grammar_type: GrammarType },
    /// `options { ... }`; children: `OptionEntry`.
    OptionsSpec,
    /// `key = value;`; child: the value node.
    OptionEntry { key: String },
    /// `import A, B = C;`; children: `DelegateGrammar`.
    DelegateGrammars,
    DelegateGrammar { name: String, alias: Option<String> },
    /// `tokens { A, B }`; children: identifiers.
    TokensSpec,
    /// `channels { C }`; children: identifiers.
    ChannelsSpec,
    /// `@header { ... }`, `@lexer::members { ... }`
    NamedAction { name: String },
    /// `mode M;`; children: the mode name identifier then lexer rules.
    ModeSpec,
    /// Children: name identifier, optional prequel nodes, `Alternatives`.
    ParserRule,
    /// Children: name identifier, optional `OptionsSpec`, `Alternatives`.
    LexerRule { fragment: bool },
    /// Rule body; children: `Alternative`.
    Alternatives,
    /// Parenthesized sub-rule; children: `Alternative`.
    Block,
    /// `label` is the `# Label` alternative label, if any.
    Alternative { label: Option<String> },
    /// `x=atom` or `x+=atom`
    Labeled { label: String, additive: bool },
    Suffixed { suffix: EbnfSuffix, greedy: bool },
    /// `~x`
    NotSet,
    /// `'a'..'z'`
    CharacterRange,
    Identifier { name: String },
    Literal { text: String },
    CharSet { text: String },
    Wildcard,
    Action,
    Predicate,
    ElementOptions,
    /// `-> skip, pushMode(M)`; children: `LexerCommand`.
    LexerCommands,
    /// Child: the argument identifier or literal, if any.
    LexerCommand { name: String },
    /// `catch [...] {...}` or `finally {...}`
    ExceptionHandler,
    /// Tokens skipped during error recovery.
    Error,
}

/// A node of the syntax tree.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub location: Location,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    #[must_use]
    pub fn new(kind: NodeKind, location: Location, children: Vec<SyntaxNode>) -> Self {
        Self {
            kind,
            location,
            children,
        }
    }

    #[must_use]
    pub fn leaf(kind: NodeKind, location: Location) -> Self {
        Self::new(kind, location, Vec::new())
    }

    /// The name if this node is an identifier.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        if let NodeKind::Identifier { name } = &self.kind {
            Some(name)
        } else {
            None
        }
    }

    /// First identifier child, which is the declared name for rules, modes
    /// and the grammar declaration.
    #[must_use]
    pub fn name_node(&self) -> Option<&SyntaxNode> {
        self.children.iter().find(|child| child.identifier().is_some())
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name_node().and_then(SyntaxNode::identifier)
    }

    /// The grammar declaration if this is a root node.
    #[must_use]
    pub fn grammar_decl(&self) -> Option<&SyntaxNode> {
        self.children
            .iter()
            .find(|child| matches!(child.kind, NodeKind::GrammarDecl { .. }))
    }

    /// Declared grammar name, when this is a root with a declaration.
    #[must_use]
    pub fn grammar_name(&self) -> Option<&str> {
        self.grammar_decl().and_then(SyntaxNode::name)
    }

    #[must_use]
    pub fn grammar_type(&self) -> GrammarType {
        if let Some(NodeKind::GrammarDecl { grammar_type }) =
            self.grammar_decl().map(|decl| &decl.kind)
        {
            *grammar_type
        } else {
            GrammarType::default()
        }
    }

    /// Pre-order walk; the callback receives each node with its parent.
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a SyntaxNode, Option<&'a SyntaxNode>),
    {
        self.walk_with_parent(None, visit);
    }

    fn walk_with_parent<'a, F>(&'a self, parent: Option<&'a SyntaxNode>, visit: &mut F)
    where
        F: FnMut(&'a SyntaxNode, Option<&'a SyntaxNode>),
    {
        visit(self, parent);
        for child in &self.children {
            child.walk_with_parent(Some(self), visit);
        }
    }

    /// Number of nodes in this subtree, including itself.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(SyntaxNode::node_count)
            .sum::<usize>()
    }
}
