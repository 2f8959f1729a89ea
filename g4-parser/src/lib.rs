//! Error-recovering parser for ANTLR4 grammar sources.
//!
//! `parse` never fails: it always returns a syntax tree, and the syntax errors
//! it recovered from travel next to the tree. Identifier-shaped nodes carry
//! their exact source location, which is what the symbol index builds on.
//!
//! ```
//! let result = g4_parser::parse("grammar T;\nr: 'x';\n");
//! assert!(result.errors.is_empty());
//! assert_eq!(result.tree.grammar_name(), Some("T"));
//! ```

use serde::Serialize;
use tracing::instrument;

mod error;
mod lexer;
mod line_map;
mod location;
mod parser;
mod tree;

#[cfg(test)]
mod proptests;

pub use error::{ErrorKind, SyntaxError};
pub use location::{Location, Position};
pub use tree::{EbnfSuffix, GrammarType, NodeKind, SyntaxNode};

/// Outcome of parsing one grammar text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseResult {
    pub tree: SyntaxNode,
    pub errors: Vec<SyntaxError>,
}

impl ParseResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Parse a grammar, recovering from syntax errors.
#[must_use]
#[instrument(level = "debug", skip(input), fields(len = input.len()))]
pub fn parse(input: &str) -> ParseResult {
    let (tree, errors) = parser::Parser::new(input).parse();
    tracing::trace!(
        nodes = tree.node_count(),
        errors = errors.len(),
        "parsed grammar"
    );
    ParseResult { tree, errors }
}

/// Read just the grammar name from the `grammar X;` header.
///
/// Only the first few tokens are looked at, so this is cheap enough to call
/// on every edit.
#[must_use]
pub fn sniff_grammar_name(input: &str) -> Option<String> {
    parser::sniff_grammar_name(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    #[tracing_test::traced_test]
    fn test_parse_logs_summary() {
        let result = parse("grammar T;\nr: 'x'\ns: r;\n");
        assert!(result.has_errors());
        assert!(logs_contain("parsed grammar"));
        assert!(logs_contain(&format!("errors={}", result.errors.len())));
    }

    #[test]
    fn test_sniff_matches_full_parse() {
        let input = "lexer grammar CommonLexer;\nID: [a-z]+;\n";
        assert_eq!(
            sniff_grammar_name(input).as_deref(),
            parse(input).tree.grammar_name()
        );
    }
}
