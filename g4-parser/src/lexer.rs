//! Tokenizer for ANTLR4 grammar sources
//!
//! Keywords are not separate token kinds: they lex as identifiers and the
//! parser decides from context, the same way the grammar language treats
//! `mode` or `options` as names in some positions.

use crate::{
    error::{ErrorKind, SyntaxError},
    line_map::LineMap,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// Identifier starting with an uppercase letter.
    TokenRef,
    /// Identifier starting with anything else (lowercase, `_`, ...).
    RuleRef,
    Int,
    StringLiteral,
    /// `[...]`: a lexer char set or a rule argument block.
    Bracket,
    /// `{...}`: an embedded action.
    Action,
    /// `<...>`: element options.
    Angle,
    /// `{` opening an `options`, `tokens` or `channels` block.
    LBrace,
    RBrace,
    Colon,
    ColonColon,
    Semi,
    Comma,
    LParen,
    RParen,
    Or,
    Assign,
    PlusAssign,
    Question,
    Star,
    Plus,
    Tilde,
    Dot,
    Range,
    Arrow,
    Pound,
    At,
    Eof,
}

impl TokenKind {
    pub(crate) fn is_identifier(self) -> bool {
        matches!(self, Self::TokenRef | Self::RuleRef)
    }

    pub(crate) fn describe(self) -> &'static str {
        match self {
            Self::TokenRef | Self::RuleRef => "identifier",
            Self::Int => "integer",
            Self::StringLiteral => "string literal",
            Self::Bracket => "'[...]'",
            Self::Action => "action block",
            Self::Angle => "element options",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::Colon => "':'",
            Self::ColonColon => "'::'",
            Self::Semi => "';'",
            Self::Comma => "','",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::Or => "'|'",
            Self::Assign => "'='",
            Self::PlusAssign => "'+='",
            Self::Question => "'?'",
            Self::Star => "'*'",
            Self::Plus => "'+'",
            Self::Tilde => "'~'",
            Self::Dot => "'.'",
            Self::Range => "'..'",
            Self::Arrow => "'->'",
            Self::Pound => "'#'",
            Self::At => "'@'",
            Self::Eof => "end of input",
        }
    }
}

/// A token is a kind plus the byte span it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Token {
    pub(crate) fn text<'a>(&self, input: &'a str) -> &'a str {
        input.get(self.start..self.end).unwrap_or_default()
    }
}

pub(crate) struct Lexer<'a> {
    input: &'a str,
    line_map: &'a LineMap,
    offset: usize,
    /// Set after `options`, `tokens` or `channels` so the next `{` opens a
    /// declaration block instead of an action.
    block_keyword_pending: bool,
    in_declaration_block: bool,
    errors: Vec<SyntaxError>,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str, line_map: &'a LineMap) -> Self {
        Self {
            input,
            line_map,
            offset: 0,
            block_keyword_pending: false,
            in_declaration_block: false,
            errors: Vec::new(),
        }
    }

    pub(crate) fn into_errors(self) -> Vec<SyntaxError> {
        self.errors
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.offset..)?.chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input.get(self.offset..)?.chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.offset += c.len_utf8();
        Some(c)
    }

    fn error(&mut self, kind: ErrorKind, start: usize) {
        let location = self.line_map.location(start, self.offset, self.input);
        self.errors.push(SyntaxError::new(kind, location));
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            start,
            end: self.offset,
        }
    }

    /// Skip whitespace and comments. Returns once the next char is
    /// significant or the input is exhausted.
    fn skip_trivia(&mut self) {
        loop {
            match (self.peek_char(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.offset;
                    self.bump();
                    self.bump();
                    if !self.skip_block_comment_body() {
                        self.error(ErrorKind::UnterminatedComment, start);
                    }
                }
                _ => return,
            }
        }
    }

    /// Consume up to and including `*/`. Returns false at end of input.
    fn skip_block_comment_body(&mut self) -> bool {
        while let Some(c) = self.bump() {
            if c == '*' && self.peek_char() == Some('/') {
                self.bump();
                return true;
            }
        }
        false
    }

    pub(crate) fn next_token(&mut self) -> Token {
        loop {
            self.skip_trivia();
            let start = self.offset;
            let Some(c) = self.bump() else {
                return self.token(TokenKind::Eof, start);
            };
            if let Some(kind) = self.lex_token(c, start) {
                return self.token(kind, start);
            }
        }
    }

    /// Lex the token starting with `c`, which has already been consumed.
    /// `None` means a run of invalid characters was skipped and reported.
    fn lex_token(&mut self, c: char, start: usize) -> Option<TokenKind> {
        let kind = match c {
            c if c.is_alphabetic() || c == '_' => {
                while self
                    .peek_char()
                    .is_some_and(|c| c.is_alphanumeric() || c == '_')
                {
                    self.bump();
                }
                let text = self.input.get(start..self.offset).unwrap_or_default();
                self.block_keyword_pending = matches!(text, "options" | "tokens" | "channels");
                return Some(if c.is_uppercase() {
                    TokenKind::TokenRef
                } else {
                    TokenKind::RuleRef
                });
            }
            c if c.is_ascii_digit() => {
                while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
                TokenKind::Int
            }
            '\'' => {
                self.lex_string(start);
                TokenKind::StringLiteral
            }
            '[' => {
                self.lex_bracket(start);
                TokenKind::Bracket
            }
            '{' if self.block_keyword_pending => {
                self.in_declaration_block = true;
                TokenKind::LBrace
            }
            '{' => {
                self.lex_action(start);
                TokenKind::Action
            }
            '}' if self.in_declaration_block => {
                self.in_declaration_block = false;
                TokenKind::RBrace
            }
            '<' => {
                self.lex_angle(start);
                TokenKind::Angle
            }
            ':' if self.peek_char() == Some(':') => {
                self.bump();
                TokenKind::ColonColon
            }
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '|' => TokenKind::Or,
            '=' => TokenKind::Assign,
            '+' if self.peek_char() == Some('=') => {
                self.bump();
                TokenKind::PlusAssign
            }
            '+' => TokenKind::Plus,
            '?' => TokenKind::Question,
            '*' => TokenKind::Star,
            '~' => TokenKind::Tilde,
            '.' if self.peek_char() == Some('.') => {
                self.bump();
                TokenKind::Range
            }
            '.' => TokenKind::Dot,
            '-' if self.peek_char() == Some('>') => {
                self.bump();
                TokenKind::Arrow
            }
            '#' => TokenKind::Pound,
            '@' => TokenKind::At,
            other => {
                while self.peek_char().is_some_and(is_stray) {
                    self.bump();
                }
                self.error(ErrorKind::InvalidCharacter(other), start);
                self.block_keyword_pending = false;
                return None;
            }
        };
        self.block_keyword_pending = false;
        Some(kind)
    }

    /// Element options body after `<`. Stops before the end of the rule
    /// element when `>` is missing.
    fn lex_angle(&mut self, start: usize) {
        while let Some(c) = self.peek_char() {
            match c {
                '>' => {
                    self.bump();
                    return;
                }
                ';' | ':' | '|' | '\n' => break,
                _ => {
                    self.bump();
                }
            }
        }
        self.error(ErrorKind::UnterminatedAngle, start);
    }

    /// String literal body after the opening quote. Escapes skip the next
    /// char; a newline before the closing quote ends the literal with an
    /// error.
    fn lex_string(&mut self, start: usize) {
        while let Some(c) = self.peek_char() {
            match c {
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '\'' => {
                    self.bump();
                    return;
                }
                '\n' => break,
                _ => {
                    self.bump();
                }
            }
        }
        self.error(ErrorKind::UnterminatedString, start);
    }

    fn lex_bracket(&mut self, start: usize) {
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    self.bump();
                }
                ']' => return,
                _ => {}
            }
        }
        self.error(ErrorKind::UnterminatedBracket, start);
    }

    /// Action body after the opening brace. Braces nest; braces inside
    /// string/char literals and comments do not count.
    fn lex_action(&mut self, start: usize) {
        let mut depth = 1usize;
        while let Some(c) = self.bump() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                '"' | '\'' => self.skip_quoted(c),
                '/' if self.peek_char() == Some('/') => {
                    while self.peek_char().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                '/' if self.peek_char() == Some('*') => {
                    self.bump();
                    self.skip_block_comment_body();
                }
                '\\' => {
                    self.bump();
                }
                _ => {}
            }
        }
        self.error(ErrorKind::UnterminatedAction, start);
    }

    fn skip_quoted(&mut self, quote: char) {
        while let Some(c) = self.peek_char() {
            match c {
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '\n' => return,
                c if c == quote => {
                    self.bump();
                    return;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }
}

/// Chars that can never begin a token. Runs of them are skipped as one error.
fn is_stray(c: char) -> bool {
    !(c.is_whitespace()
        || c.is_alphanumeric()
        || c == '_'
        || "'[]{}<>:;,()|=+?*~.-#@/".contains(c))
}

/// Tokenize the whole input. The returned list always ends with `Eof`.
pub(crate) fn tokenize(input: &str, line_map: &LineMap) -> (Vec<Token>, Vec<SyntaxError>) {
    let mut lexer = Lexer::new(input, line_map);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        tokens.push(token);
        if token.kind == TokenKind::Eof {
            break;
        }
    }
    (tokens, lexer.into_errors())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let map = LineMap::new(input);
        tokenize(input, &map).0.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_rule_tokens() {
        use TokenKind::{Colon, Eof, Or, RuleRef, Semi, StringLiteral, TokenRef};
        assert_eq!(
            kinds("expr : ID | 'x' ;"),
            vec![RuleRef, Colon, TokenRef, Or, StringLiteral, Semi, Eof]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        use TokenKind::{Eof, RuleRef, Semi};
        assert_eq!(
            kinds("// line\n/* block */ /** doc */ a ;"),
            vec![RuleRef, Semi, Eof]
        );
    }

    #[test]
    fn test_options_brace_is_not_an_action() {
        use TokenKind::{Assign, Eof, LBrace, RBrace, RuleRef, Semi, TokenRef};
        assert_eq!(
            kinds("options { tokenVocab = L; }"),
            vec![RuleRef, LBrace, RuleRef, Assign, TokenRef, Semi, RBrace, Eof]
        );
    }

    #[test]
    fn test_action_with_nested_braces_and_strings() {
        let input = "{ if (x) { s = \"}\"; } }";
        let map = LineMap::new(input);
        let (tokens, errors) = tokenize(input, &map);
        assert!(errors.is_empty());
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens.first().map(|t| t.text(input)), Some(input));
    }

    #[test]
    fn test_multi_char_operators() {
        use TokenKind::{Arrow, ColonColon, Eof, PlusAssign, Range};
        assert_eq!(kinds("-> :: += .."), vec![Arrow, ColonColon, PlusAssign, Range, Eof]);
    }

    #[test]
    fn test_string_escape() {
        let input = r"'\''";
        let map = LineMap::new(input);
        let (tokens, errors) = tokenize(input, &map);
        assert!(errors.is_empty());
        assert_eq!(tokens.first().map(|t| t.kind), Some(TokenKind::StringLiteral));
    }

    #[test]
    fn test_unterminated_string_reports_error() {
        let input = "A : 'abc\n;";
        let map = LineMap::new(input);
        let (_, errors) = tokenize(input, &map);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.first().map(|e| e.kind.clone()),
            Some(ErrorKind::UnterminatedString)
        );
    }

    #[test]
    fn test_invalid_character_is_skipped() {
        let input = "a $ b";
        let map = LineMap::new(input);
        let (tokens, errors) = tokenize(input, &map);
        assert_eq!(tokens.len(), 3);
        assert_eq!(
            errors.first().map(|e| e.kind.clone()),
            Some(ErrorKind::InvalidCharacter('$'))
        );
    }

    #[test]
    fn test_invalid_run_is_one_error() {
        let input = format!("a {} b", "$".repeat(200_000));
        let map = LineMap::new(&input);
        let (tokens, errors) = tokenize(&input, &map);
        assert_eq!(tokens.len(), 3);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.first().map(|e| e.location.absolute_end - e.location.absolute_start),
            Some(200_000)
        );
    }

    #[test]
    fn test_unterminated_angle_stops_at_rule_end() {
        use TokenKind::{Angle, Eof, RuleRef, Semi};
        let input = "b < c;
d";
        let map = LineMap::new(input);
        let (tokens, errors) = tokenize(input, &map);
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![RuleRef, Angle, Semi, RuleRef, Eof]
        );
        assert_eq!(
            errors.first().map(|e| e.kind.clone()),
            Some(ErrorKind::UnterminatedAngle)
        );
    }
}
