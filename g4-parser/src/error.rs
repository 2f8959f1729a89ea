use serde::Serialize;

use crate::Location;

/// What went wrong while lexing or parsing a grammar.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unterminated comment")]
    UnterminatedComment,

    #[error("unterminated action block")]
    UnterminatedAction,

    #[error("unterminated bracket block")]
    UnterminatedBracket,

    #[error("unterminated element options")]
    UnterminatedAngle,

    #[error("invalid character '{0}'")]
    InvalidCharacter(char),

    #[error("missing grammar declaration")]
    MissingGrammarDeclaration,

    #[error("unexpected {found}, expected {expected}")]
    Unexpected { found: String, expected: String },

    #[error("unexpected end of input, expected {0}")]
    UnexpectedEof(String),

    #[error("lexer rule '{0}' is not allowed in a parser grammar")]
    LexerRuleInParserGrammar(String),

    #[error("parser rule '{0}' is not allowed in a lexer grammar")]
    ParserRuleInLexerGrammar(String),

    #[error("mode '{0}' is only allowed in a lexer grammar")]
    ModeOutsideLexerGrammar(String),

    #[error("blocks nested deeper than {0} levels")]
    NestingTooDeep(usize),
}

/// A syntax error with the location it was detected at.
///
/// Syntax errors are data: `parse` collects them next to the recovered tree
/// and never fails.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind}, position: {}", .location.start)]
pub struct SyntaxError {
    pub kind: ErrorKind,
    pub location: Location,
}

impl SyntaxError {
    #[must_use]
    pub(crate) fn new(kind: ErrorKind, location: Location) -> Self {
        Self { kind, location }
    }

    /// Get advice for this error if available.
    #[must_use]
    pub fn advice(&self) -> Option<&'static str> {
        match self.kind {
            ErrorKind::UnterminatedString => {
                Some("String literals use single quotes and must close on the same line")
            }
            ErrorKind::UnterminatedAction => {
                Some("Braces inside actions must be balanced, e.g. '{ foo(); }'")
            }
            ErrorKind::UnterminatedAngle => {
                Some("Element options look like '<assoc=right>' and must close before the rule ends")
            }
            ErrorKind::MissingGrammarDeclaration => Some(
                "A grammar starts with 'grammar Name;', 'lexer grammar Name;' or 'parser grammar Name;'",
            ),
            ErrorKind::LexerRuleInParserGrammar(..) => {
                Some("Rules starting with an uppercase letter are lexer rules")
            }
            ErrorKind::ParserRuleInLexerGrammar(..) => {
                Some("Lexer rule names must start with an uppercase letter")
            }
            ErrorKind::UnterminatedComment
            | ErrorKind::UnterminatedBracket
            | ErrorKind::InvalidCharacter(..)
            | ErrorKind::Unexpected { .. }
            | ErrorKind::UnexpectedEof(..)
            | ErrorKind::ModeOutsideLexerGrammar(..)
            | ErrorKind::NestingTooDeep(..) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;

    #[test]
    fn test_syntax_error_display() {
        let error = SyntaxError::new(
            ErrorKind::Unexpected {
                found: "';'".to_string(),
                expected: "':'".to_string(),
            },
            Location {
                absolute_start: 12,
                absolute_end: 13,
                start: Position { line: 2, column: 4 },
                end: Position { line: 2, column: 5 },
            },
        );
        assert_eq!(
            format!("{error}"),
            "unexpected ';', expected ':', position: line: 2, column: 4"
        );
    }

    #[test]
    fn test_advice_for_missing_grammar() {
        let error = SyntaxError::new(ErrorKind::MissingGrammarDeclaration, Location::default());
        assert!(error.advice().is_some());
        let error = SyntaxError::new(ErrorKind::InvalidCharacter('$'), Location::default());
        assert!(error.advice().is_none());
    }
}
