//! Recursive-descent parser with panic-mode recovery
//!
//! Every syntax error is recorded and the parser resynchronizes at the next
//! `;` or at the next token that starts a rule on a fresh line, so that the
//! rules after a broken one still end up in the tree.

use crate::{
    Location,
    error::{ErrorKind, SyntaxError},
    lexer::{Lexer, Token, TokenKind, tokenize},
    line_map::LineMap,
    tree::{EbnfSuffix, GrammarType, NodeKind, SyntaxNode},
};

/// Blocks (and `~` chains) nested deeper than this are skipped.
pub(crate) const MAX_NESTING: usize = 128;

const RULE_MODIFIERS: [&str; 4] = ["public", "private", "protected", "fragment"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleContext {
    Parser,
    Lexer,
}

pub(crate) struct Parser<'a> {
    input: &'a str,
    line_map: LineMap,
    tokens: Vec<Token>,
    pos: usize,
    /// End offset of the last consumed token.
    last_end: usize,
    depth: usize,
    grammar_type: GrammarType,
    errors: Vec<SyntaxError>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        let line_map = LineMap::new(input);
        let (tokens, errors) = tokenize(input, &line_map);
        Self {
            input,
            line_map,
            tokens,
            pos: 0,
            last_end: 0,
            depth: 0,
            grammar_type: GrammarType::default(),
            errors,
        }
    }

    pub(crate) fn parse(mut self) -> (SyntaxNode, Vec<SyntaxError>) {
        let mut children = Vec::new();

        if let Some(decl) = self.grammar_decl() {
            children.push(decl);
        } else {
            let location = self.token_location(self.peek());
            self.errors.push(SyntaxError::new(
                ErrorKind::MissingGrammarDeclaration,
                location,
            ));
        }

        while !self.at(TokenKind::Eof) {
            if let Some(prequel) = self.prequel_construct() {
                children.push(prequel);
            } else if self.at_mode_start() {
                children.push(self.mode_spec());
            } else {
                children.push(self.rule_spec());
            }
        }

        let root = SyntaxNode::new(
            NodeKind::Grammar,
            self.line_map.location(0, self.input.len(), self.input),
            children,
        );
        let mut errors = self.errors;
        // lexer errors were collected up front; interleave them by position
        errors.sort_by_key(|error| error.location.absolute_start);
        (root, errors)
    }

    // ------------------------------------------------------------------
    // token cursor
    // ------------------------------------------------------------------

    fn nth(&self, n: usize) -> Token {
        self.tokens
            .get(self.pos + n)
            .or_else(|| self.tokens.last())
            .copied()
            .unwrap_or(Token {
                kind: TokenKind::Eof,
                start: self.input.len(),
                end: self.input.len(),
            })
    }

    fn peek(&self) -> Token {
        self.nth(0)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn nth_is_keyword(&self, n: usize, keyword: &str) -> bool {
        let token = self.nth(n);
        token.kind == TokenKind::RuleRef && token.text(self.input) == keyword
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.nth_is_keyword(0, keyword)
    }

    fn bump(&mut self) -> Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
            self.last_end = token.end;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) {
            Some(self.bump())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        let token = self.eat(kind);
        if token.is_none() {
            self.error_unexpected(kind.describe());
        }
        token
    }

    fn skip_while(&mut self, mut keep_going: impl FnMut(&Self) -> bool) {
        while !self.at(TokenKind::Eof) && keep_going(self) {
            self.bump();
        }
    }

    // ------------------------------------------------------------------
    // nodes and errors
    // ------------------------------------------------------------------

    fn token_location(&self, token: Token) -> Location {
        self.line_map.location(token.start, token.end, self.input)
    }

    fn node(&self, kind: NodeKind, start: usize, children: Vec<SyntaxNode>) -> SyntaxNode {
        let end = self.last_end.max(start);
        SyntaxNode::new(
            kind,
            self.line_map.location(start, end, self.input),
            children,
        )
    }

    fn identifier_node(&self, token: Token) -> SyntaxNode {
        SyntaxNode::leaf(
            NodeKind::Identifier {
                name: token.text(self.input).to_string(),
            },
            self.token_location(token),
        )
    }

    fn literal_node(&self, token: Token) -> SyntaxNode {
        SyntaxNode::leaf(
            NodeKind::Literal {
                text: token.text(self.input).to_string(),
            },
            self.token_location(token),
        )
    }

    fn error_at(&mut self, kind: ErrorKind, token: Token) {
        let location = self.token_location(token);
        self.errors.push(SyntaxError::new(kind, location));
    }

    fn error_unexpected(&mut self, expected: &str) {
        let token = self.peek();
        let kind = if token.kind == TokenKind::Eof {
            ErrorKind::UnexpectedEof(expected.to_string())
        } else {
            ErrorKind::Unexpected {
                found: format!("'{}'", token.text(self.input)),
                expected: expected.to_string(),
            }
        };
        self.error_at(kind, token);
    }

    // ------------------------------------------------------------------
    // lookahead predicates
    // ------------------------------------------------------------------

    /// Whether the current token begins a new rule or mode: `name :`,
    /// `fragment NAME :` or `mode NAME ;`. Used to stop at a missing `;`.
    fn at_rule_start(&self) -> bool {
        if self.at_mode_start() && self.nth(2).kind == TokenKind::Semi {
            return true;
        }
        let mut n = 0;
        while RULE_MODIFIERS.iter().any(|m| self.nth_is_keyword(n, m))
            && self.nth(n + 1).kind.is_identifier()
        {
            n += 1;
        }
        self.nth(n).kind.is_identifier() && self.nth(n + 1).kind == TokenKind::Colon
    }

    fn at_mode_start(&self) -> bool {
        self.at_keyword("mode") && self.nth(1).kind.is_identifier()
    }

    /// Whether a newline separates the previous token from the current one.
    fn at_line_start(&self) -> bool {
        let Some(previous) = self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) else {
            return true;
        };
        self.input
            .get(previous.end..self.peek().start)
            .is_some_and(|gap| gap.contains('\n'))
    }

    fn at_atom_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::TokenRef
                | TokenKind::RuleRef
                | TokenKind::StringLiteral
                | TokenKind::Bracket
                | TokenKind::Dot
                | TokenKind::Tilde
        )
    }

    fn at_element_start(&self) -> bool {
        self.at_atom_start() || matches!(self.peek().kind, TokenKind::LParen | TokenKind::Action)
    }

    fn at_alternative_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Or
                | TokenKind::RParen
                | TokenKind::Semi
                | TokenKind::Pound
                | TokenKind::Arrow
                | TokenKind::Eof
        ) || self.at_rule_start()
    }

    // ------------------------------------------------------------------
    // recovery
    // ------------------------------------------------------------------

    /// Skip to just past the next `;`, or to the next rule that starts on
    /// its own line. Always consumes at least one token unless at the end.
    fn recover_to_rule_end(&mut self) {
        let first = self.pos;
        while !self.at(TokenKind::Eof) {
            if self.eat(TokenKind::Semi).is_some() {
                return;
            }
            if self.pos != first && self.at_line_start() && self.at_rule_start() {
                return;
            }
            self.bump();
        }
    }

    fn finish_rule(&mut self) {
        if self.eat(TokenKind::Semi).is_some() {
            return;
        }
        self.error_unexpected("';'");
        if !self.at_rule_start() {
            self.recover_to_rule_end();
        }
    }

    /// Collapse a run of tokens that cannot appear in an alternative into one
    /// error node.
    fn skip_garbage(&mut self) -> SyntaxNode {
        let start = self.peek().start;
        self.error_unexpected("grammar element");
        self.bump();
        self.skip_while(|p| !p.at_element_start() && !p.at_alternative_end());
        self.node(NodeKind::Error, start, Vec::new())
    }

    /// Skip a block that is nested too deeply, including its closing paren.
    fn skip_balanced_parens(&mut self) {
        let mut open = 1usize;
        while !self.at(TokenKind::Eof) {
            let kind = self.bump().kind;
            if kind == TokenKind::LParen {
                open += 1;
            } else if kind == TokenKind::RParen {
                open -= 1;
                if open == 0 {
                    return;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // grammar header and prequel
    // ------------------------------------------------------------------

    fn grammar_decl(&mut self) -> Option<SyntaxNode> {
        let start = self.peek().start;
        let grammar_type = if self.at_keyword("lexer") && self.nth_is_keyword(1, "grammar") {
            GrammarType::Lexer
        } else if self.at_keyword("parser") && self.nth_is_keyword(1, "grammar") {
            GrammarType::Parser
        } else if self.at_keyword("grammar") {
            GrammarType::Combined
        } else {
            return None;
        };

        if grammar_type != GrammarType::Combined {
            self.bump();
        }
        self.bump();
        self.grammar_type = grammar_type;

        let mut children = Vec::new();
        if self.peek().kind.is_identifier() {
            let name = self.bump();
            children.push(self.identifier_node(name));
        } else {
            self.error_unexpected("grammar name");
        }
        self.expect(TokenKind::Semi);

        Some(self.node(NodeKind::GrammarDecl { grammar_type }, start, children))
    }

    fn prequel_construct(&mut self) -> Option<SyntaxNode> {
        let opens_block = self.nth(1).kind == TokenKind::LBrace;
        if self.at_keyword("options") && opens_block {
            Some(self.options_spec())
        } else if self.at_keyword("tokens") && opens_block {
            Some(self.id_list_spec(NodeKind::TokensSpec))
        } else if self.at_keyword("channels") && opens_block {
            Some(self.id_list_spec(NodeKind::ChannelsSpec))
        } else if self.at_keyword("import") && self.nth(1).kind.is_identifier() {
            Some(self.delegate_grammars())
        } else if self.at(TokenKind::At) {
            Some(self.named_action())
        } else {
            None
        }
    }

    fn options_spec(&mut self) -> SyntaxNode {
        let start = self.bump().start;
        self.bump();

        let mut children = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            if let Some(option) = self.option_entry() {
                children.push(option);
            } else {
                self.skip_while(|p| !p.at(TokenKind::Semi) && !p.at(TokenKind::RBrace));
                self.eat(TokenKind::Semi);
            }
        }
        self.expect(TokenKind::RBrace);

        self.node(NodeKind::OptionsSpec, start, children)
    }

    fn option_entry(&mut self) -> Option<SyntaxNode> {
        let key = self.peek();
        if !key.kind.is_identifier() {
            self.error_unexpected("option name");
            return None;
        }
        self.bump();
        self.expect(TokenKind::Assign)?;
        let value = self.option_value()?;
        self.expect(TokenKind::Semi);

        Some(self.node(
            NodeKind::OptionEntry {
                key: key.text(self.input).to_string(),
            },
            key.start,
            vec![value],
        ))
    }

    fn option_value(&mut self) -> Option<SyntaxNode> {
        let token = self.peek();
        if token.kind.is_identifier() {
            self.bump();
            // dotted names like `superClass = a.b.C`
            while self.at(TokenKind::Dot) && self.nth(1).kind.is_identifier() {
                self.bump();
                self.bump();
            }
            let name = self
                .input
                .get(token.start..self.last_end)
                .unwrap_or_default()
                .to_string();
            Some(self.node(NodeKind::Identifier { name }, token.start, Vec::new()))
        } else if matches!(token.kind, TokenKind::StringLiteral | TokenKind::Int) {
            self.bump();
            Some(self.literal_node(token))
        } else if token.kind == TokenKind::Action {
            self.bump();
            Some(self.node(NodeKind::Action, token.start, Vec::new()))
        } else {
            self.error_unexpected("option value");
            None
        }
    }

    fn delegate_grammars(&mut self) -> SyntaxNode {
        let start = self.bump().start;

        let mut children = Vec::new();
        loop {
            let first = self.peek();
            if !first.kind.is_identifier() {
                self.error_unexpected("grammar name");
                break;
            }
            self.bump();
            let first_text = first.text(self.input).to_string();

            let kind = if self.eat(TokenKind::Assign).is_some() {
                let second = self.peek();
                if second.kind.is_identifier() {
                    self.bump();
                    NodeKind::DelegateGrammar {
                        name: second.text(self.input).to_string(),
                        alias: Some(first_text),
                    }
                } else {
                    self.error_unexpected("grammar name");
                    NodeKind::DelegateGrammar {
                        name: first_text,
                        alias: None,
                    }
                }
            } else {
                NodeKind::DelegateGrammar {
                    name: first_text,
                    alias: None,
                }
            };
            children.push(self.node(kind, first.start, Vec::new()));

            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::Semi);

        self.node(NodeKind::DelegateGrammars, start, children)
    }

    fn id_list_spec(&mut self, kind: NodeKind) -> SyntaxNode {
        let start = self.bump().start;
        self.bump();

        let mut children = Vec::new();
        while self.peek().kind.is_identifier() {
            let name = self.bump();
            children.push(self.identifier_node(name));
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RBrace);

        self.node(kind, start, children)
    }

    fn named_action(&mut self) -> SyntaxNode {
        let start = self.bump().start;

        let mut name = String::new();
        if self.peek().kind.is_identifier() {
            name.push_str(self.bump().text(self.input));
        } else {
            self.error_unexpected("action name");
        }
        if self.eat(TokenKind::ColonColon).is_some() {
            if self.peek().kind.is_identifier() {
                name.push_str("::");
                name.push_str(self.bump().text(self.input));
            } else {
                self.error_unexpected("action name");
            }
        }
        self.expect(TokenKind::Action);

        self.node(NodeKind::NamedAction { name }, start, Vec::new())
    }

    // ------------------------------------------------------------------
    // rules and modes
    // ------------------------------------------------------------------

    fn mode_spec(&mut self) -> SyntaxNode {
        let start = self.bump().start;
        let name = self.bump();
        if self.grammar_type != GrammarType::Lexer {
            let mode = name.text(self.input).to_string();
            self.error_at(ErrorKind::ModeOutsideLexerGrammar(mode), name);
        }
        let mut children = vec![self.identifier_node(name)];
        self.expect(TokenKind::Semi);

        while !self.at(TokenKind::Eof) && !self.at_mode_start() {
            children.push(self.rule_spec());
        }

        self.node(NodeKind::ModeSpec, start, children)
    }

    fn rule_spec(&mut self) -> SyntaxNode {
        let start = self.peek().start;

        let mut fragment = false;
        while RULE_MODIFIERS.iter().any(|m| self.at_keyword(m))
            && self.nth(1).kind.is_identifier()
        {
            fragment |= self.at_keyword("fragment");
            self.bump();
        }

        let name = self.peek();
        if name.kind == TokenKind::TokenRef {
            self.lexer_rule(start, fragment, name)
        } else if name.kind == TokenKind::RuleRef {
            self.parser_rule(start, name)
        } else {
            self.error_unexpected("rule name");
            self.recover_to_rule_end();
            self.node(NodeKind::Error, start, Vec::new())
        }
    }

    fn lexer_rule(&mut self, start: usize, fragment: bool, name: Token) -> SyntaxNode {
        self.bump();
        if self.grammar_type == GrammarType::Parser {
            let rule = name.text(self.input).to_string();
            self.error_at(ErrorKind::LexerRuleInParserGrammar(rule), name);
        }

        let mut children = vec![self.identifier_node(name)];
        if self.at_keyword("options") && self.nth(1).kind == TokenKind::LBrace {
            children.push(self.options_spec());
        }
        if self.expect(TokenKind::Colon).is_none() {
            self.recover_to_rule_end();
            return self.node(NodeKind::LexerRule { fragment }, start, children);
        }
        children.push(self.alternatives(RuleContext::Lexer));
        self.finish_rule();

        self.node(NodeKind::LexerRule { fragment }, start, children)
    }

    fn parser_rule(&mut self, start: usize, name: Token) -> SyntaxNode {
        self.bump();
        if self.grammar_type == GrammarType::Lexer {
            let rule = name.text(self.input).to_string();
            self.error_at(ErrorKind::ParserRuleInLexerGrammar(rule), name);
        }

        let mut children = vec![self.identifier_node(name)];

        // argument, returns, throws and locals clauses
        if let Some(args) = self.eat(TokenKind::Bracket) {
            children.push(self.node(NodeKind::Action, args.start, Vec::new()));
        }
        if self.at_keyword("returns") && self.nth(1).kind == TokenKind::Bracket {
            self.bump();
            let returns = self.bump();
            children.push(self.node(NodeKind::Action, returns.start, Vec::new()));
        }
        if self.at_keyword("throws") {
            self.bump();
            while self.peek().kind.is_identifier() && !self.at_keyword("locals") {
                self.bump();
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        if self.at_keyword("locals") && self.nth(1).kind == TokenKind::Bracket {
            self.bump();
            let locals = self.bump();
            children.push(self.node(NodeKind::Action, locals.start, Vec::new()));
        }
        loop {
            if self.at_keyword("options") && self.nth(1).kind == TokenKind::LBrace {
                children.push(self.options_spec());
            } else if self.at(TokenKind::At) {
                children.push(self.named_action());
            } else {
                break;
            }
        }

        if self.expect(TokenKind::Colon).is_none() {
            self.recover_to_rule_end();
            return self.node(NodeKind::ParserRule, start, children);
        }
        children.push(self.alternatives(RuleContext::Parser));
        self.finish_rule();

        while (self.at_keyword("catch") && self.nth(1).kind == TokenKind::Bracket)
            || (self.at_keyword("finally") && self.nth(1).kind == TokenKind::Action)
        {
            children.push(self.exception_handler());
        }

        self.node(NodeKind::ParserRule, start, children)
    }

    fn exception_handler(&mut self) -> SyntaxNode {
        let keyword = self.bump();
        if keyword.text(self.input) == "catch" {
            self.expect(TokenKind::Bracket);
        }
        self.expect(TokenKind::Action);
        self.node(NodeKind::ExceptionHandler, keyword.start, Vec::new())
    }

    // ------------------------------------------------------------------
    // rule bodies
    // ------------------------------------------------------------------

    fn alternatives(&mut self, ctx: RuleContext) -> SyntaxNode {
        let start = self.peek().start;
        let mut children = vec![self.alternative(ctx)];
        while self.eat(TokenKind::Or).is_some() {
            children.push(self.alternative(ctx));
        }
        self.node(NodeKind::Alternatives, start, children)
    }

    fn alternative(&mut self, ctx: RuleContext) -> SyntaxNode {
        let start = self.peek().start;
        let mut children = Vec::new();

        if let Some(options) = self.eat(TokenKind::Angle) {
            children.push(self.node(NodeKind::ElementOptions, options.start, Vec::new()));
        }
        loop {
            if self.at_alternative_end() {
                break;
            } else if self.at_element_start() {
                children.push(self.element(ctx));
            } else {
                children.push(self.skip_garbage());
            }
        }

        let mut label = None;
        if self.eat(TokenKind::Pound).is_some() {
            if self.peek().kind.is_identifier() {
                label = Some(self.bump().text(self.input).to_string());
            } else {
                self.error_unexpected("alternative label");
            }
        }
        if self.at(TokenKind::Arrow) {
            children.push(self.lexer_commands());
        }

        self.node(NodeKind::Alternative { label }, start, children)
    }

    fn element(&mut self, ctx: RuleContext) -> SyntaxNode {
        let token = self.peek();
        let start = token.start;

        let element = if token.kind.is_identifier()
            && matches!(self.nth(1).kind, TokenKind::Assign | TokenKind::PlusAssign)
        {
            self.bump();
            let additive = self.bump().kind == TokenKind::PlusAssign;
            let label = token.text(self.input).to_string();
            let target = if self.at(TokenKind::LParen) {
                self.block(ctx)
            } else if self.at_atom_start() {
                self.atom(ctx)
            } else {
                self.error_unexpected("labeled element");
                self.node(NodeKind::Error, self.peek().start, Vec::new())
            };
            self.node(NodeKind::Labeled { label, additive }, start, vec![target])
        } else if self.at(TokenKind::LParen) {
            self.block(ctx)
        } else if self.eat(TokenKind::Action).is_some() {
            if self.eat(TokenKind::Question).is_some() {
                self.eat(TokenKind::Angle);
                return self.node(NodeKind::Predicate, start, Vec::new());
            }
            return self.node(NodeKind::Action, start, Vec::new());
        } else {
            self.atom(ctx)
        };

        self.suffixed(start, element)
    }

    fn suffixed(&mut self, start: usize, element: SyntaxNode) -> SyntaxNode {
        let suffix = if self.at(TokenKind::Question) {
            EbnfSuffix::Optional
        } else if self.at(TokenKind::Star) {
            EbnfSuffix::ZeroOrMore
        } else if self.at(TokenKind::Plus) {
            EbnfSuffix::OneOrMore
        } else {
            return element;
        };
        self.bump();
        let greedy = self.eat(TokenKind::Question).is_none();
        self.node(NodeKind::Suffixed { suffix, greedy }, start, vec![element])
    }

    fn atom(&mut self, ctx: RuleContext) -> SyntaxNode {
        let token = self.peek();
        let start = token.start;

        if token.kind.is_identifier() {
            self.bump();
            let node = self.identifier_node(token);
            if token.kind == TokenKind::RuleRef {
                // rule arguments `expr[0]`
                self.eat(TokenKind::Bracket);
            }
            self.eat(TokenKind::Angle);
            node
        } else if token.kind == TokenKind::StringLiteral {
            self.bump();
            if self.eat(TokenKind::Range).is_some() {
                let mut children = vec![self.literal_node(token)];
                if let Some(end) = self.eat(TokenKind::StringLiteral) {
                    children.push(self.literal_node(end));
                } else {
                    self.error_unexpected("string literal");
                }
                return self.node(NodeKind::CharacterRange, start, children);
            }
            self.eat(TokenKind::Angle);
            self.literal_node(token)
        } else if token.kind == TokenKind::Bracket {
            self.bump();
            SyntaxNode::leaf(
                NodeKind::CharSet {
                    text: token.text(self.input).to_string(),
                },
                self.token_location(token),
            )
        } else if token.kind == TokenKind::Dot {
            self.bump();
            self.eat(TokenKind::Angle);
            self.node(NodeKind::Wildcard, start, Vec::new())
        } else if token.kind == TokenKind::Tilde {
            self.bump();
            let target = if self.depth >= MAX_NESTING {
                self.errors.push(SyntaxError::new(
                    ErrorKind::NestingTooDeep(MAX_NESTING),
                    self.token_location(token),
                ));
                self.skip_while(|p| p.at(TokenKind::Tilde));
                self.node(NodeKind::Error, start, Vec::new())
            } else if self.at(TokenKind::LParen) {
                self.block(ctx)
            } else if self.at_atom_start() {
                self.depth += 1;
                let atom = self.atom(ctx);
                self.depth -= 1;
                atom
            } else {
                self.error_unexpected("set element");
                self.node(NodeKind::Error, self.peek().start, Vec::new())
            };
            self.node(NodeKind::NotSet, start, vec![target])
        } else {
            self.error_unexpected("grammar element");
            self.node(NodeKind::Error, start, Vec::new())
        }
    }

    fn block(&mut self, ctx: RuleContext) -> SyntaxNode {
        let open = self.bump();
        if self.depth >= MAX_NESTING {
            self.error_at(ErrorKind::NestingTooDeep(MAX_NESTING), open);
            self.skip_balanced_parens();
            return self.node(NodeKind::Error, open.start, Vec::new());
        }
        self.depth += 1;

        if self.at_keyword("options") && self.nth(1).kind == TokenKind::LBrace {
            self.options_spec();
            self.expect(TokenKind::Colon);
        }
        let mut children = vec![self.alternative(ctx)];
        while self.eat(TokenKind::Or).is_some() {
            children.push(self.alternative(ctx));
        }

        self.depth -= 1;
        self.expect(TokenKind::RParen);
        self.node(NodeKind::Block, open.start, children)
    }

    fn lexer_commands(&mut self) -> SyntaxNode {
        let start = self.bump().start;

        let mut children = Vec::new();
        loop {
            let name = self.peek();
            if !name.kind.is_identifier() {
                self.error_unexpected("lexer command");
                break;
            }
            self.bump();

            let mut arguments = Vec::new();
            if self.eat(TokenKind::LParen).is_some() {
                let argument = self.peek();
                if argument.kind.is_identifier() {
                    self.bump();
                    arguments.push(self.identifier_node(argument));
                } else if argument.kind == TokenKind::Int {
                    self.bump();
                    arguments.push(self.literal_node(argument));
                } else {
                    self.error_unexpected("lexer command argument");
                }
                self.expect(TokenKind::RParen);
            }
            children.push(self.node(
                NodeKind::LexerCommand {
                    name: name.text(self.input).to_string(),
                },
                name.start,
                arguments,
            ));

            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        self.node(NodeKind::LexerCommands, start, children)
    }
}

/// Read the grammar name from the header without parsing the rest.
pub(crate) fn sniff_grammar_name(input: &str) -> Option<String> {
    let line_map = LineMap::new(input);
    let mut lexer = Lexer::new(input, &line_map);
    let is_keyword = |token: Token, keyword: &str| {
        token.kind == TokenKind::RuleRef && token.text(input) == keyword
    };

    let mut token = lexer.next_token();
    if is_keyword(token, "lexer") || is_keyword(token, "parser") {
        token = lexer.next_token();
    }
    if !is_keyword(token, "grammar") {
        return None;
    }
    let name = lexer.next_token();
    name.kind
        .is_identifier()
        .then(|| name.text(input).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use pretty_assertions::assert_eq;

    fn rule_names(tree: &SyntaxNode) -> Vec<String> {
        let mut names = Vec::new();
        tree.walk(&mut |node, _| {
            if matches!(node.kind, NodeKind::ParserRule | NodeKind::LexerRule { .. })
                && let Some(name) = node.name()
            {
                names.push(name.to_string());
            }
        });
        names
    }

    fn find<'a>(tree: &'a SyntaxNode, pred: impl Fn(&NodeKind) -> bool) -> Vec<&'a SyntaxNode> {
        let mut found = Vec::new();
        tree.walk(&mut |node, _| {
            if pred(&node.kind) {
                found.push(node);
            }
        });
        found
    }

    #[test]
    fn test_combined_grammar_parses_cleanly() {
        let input = "grammar Expr;\n\
                     expr: expr '+' term | term;\n\
                     term: INT;\n\
                     INT: [0-9]+;\n\
                     WS: [ \\t\\r\\n]+ -> skip;\n";
        let result = parse(input);
        assert_eq!(result.errors, vec![]);
        assert_eq!(result.tree.grammar_name(), Some("Expr"));
        assert_eq!(result.tree.grammar_type(), GrammarType::Combined);
        assert_eq!(rule_names(&result.tree), vec!["expr", "term", "INT", "WS"]);
    }

    #[test]
    fn test_missing_semicolon_keeps_next_rule() {
        let result = parse("grammar T;\na: b\nb: 'x';\n");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors.first().map(|e| e.kind.clone()),
            Some(ErrorKind::Unexpected {
                found: "'b'".to_string(),
                expected: "';'".to_string(),
            })
        );
        assert_eq!(rule_names(&result.tree), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_grammar_declaration() {
        let result = parse("a: 'x';\n");
        assert_eq!(
            result.errors.first().map(|e| e.kind.clone()),
            Some(ErrorKind::MissingGrammarDeclaration)
        );
        assert_eq!(result.tree.grammar_name(), None);
        assert_eq!(rule_names(&result.tree), vec!["a"]);
    }

    #[test]
    fn test_lexer_modes_and_commands() {
        let input = "lexer grammar L;\n\
                     A: 'a' -> pushMode(M);\n\
                     mode M;\n\
                     B: 'b' -> popMode, channel(HIDDEN);\n";
        let result = parse(input);
        assert_eq!(result.errors, vec![]);
        assert_eq!(result.tree.grammar_type(), GrammarType::Lexer);

        let modes = find(&result.tree, |kind| matches!(kind, NodeKind::ModeSpec));
        assert_eq!(modes.len(), 1);
        assert_eq!(modes.first().and_then(|m| m.name()), Some("M"));
        assert_eq!(rule_names(&result.tree), vec!["A", "B"]);

        let commands: Vec<_> = find(&result.tree, |kind| {
            matches!(kind, NodeKind::LexerCommand { .. })
        })
        .into_iter()
        .map(|command| (command.kind.clone(), command.name().map(str::to_string)))
        .collect();
        assert_eq!(
            commands,
            vec![
                (
                    NodeKind::LexerCommand {
                        name: "pushMode".to_string()
                    },
                    Some("M".to_string())
                ),
                (
                    NodeKind::LexerCommand {
                        name: "popMode".to_string()
                    },
                    None
                ),
                (
                    NodeKind::LexerCommand {
                        name: "channel".to_string()
                    },
                    Some("HIDDEN".to_string())
                ),
            ]
        );
    }

    #[test]
    fn test_rule_kind_must_match_grammar_type() {
        let result = parse("lexer grammar L;\nfoo: 'a';\n");
        assert_eq!(
            result.errors.first().map(|e| e.kind.clone()),
            Some(ErrorKind::ParserRuleInLexerGrammar("foo".to_string()))
        );

        let result = parse("parser grammar P;\nFOO: 'a';\n");
        assert_eq!(
            result.errors.first().map(|e| e.kind.clone()),
            Some(ErrorKind::LexerRuleInParserGrammar("FOO".to_string()))
        );

        let result = parse("grammar C;\nmode M;\nA: 'a';\n");
        assert_eq!(
            result.errors.first().map(|e| e.kind.clone()),
            Some(ErrorKind::ModeOutsideLexerGrammar("M".to_string()))
        );
    }

    #[test]
    fn test_labels_are_not_identifiers() {
        let input = "grammar T;\ne: x=ID # Single\n | ids+=ID* # Many\n ;\n";
        let result = parse(input);
        assert_eq!(result.errors, vec![]);

        let labels: Vec<_> = find(&result.tree, |kind| {
            matches!(kind, NodeKind::Alternative { label: Some(_) })
        })
        .into_iter()
        .map(|alt| alt.kind.clone())
        .collect();
        assert_eq!(labels.len(), 2);

        let identifiers: Vec<_> = find(&result.tree, |kind| {
            matches!(kind, NodeKind::Identifier { .. })
        })
        .into_iter()
        .filter_map(SyntaxNode::identifier)
        .collect();
        assert_eq!(identifiers, vec!["T", "e", "ID", "ID"]);
    }

    #[test]
    fn test_prequel_constructs() {
        let input = "grammar T;\n\
                     options { tokenVocab = Lex; superClass = a.b.Base; }\n\
                     import A, B = C;\n\
                     tokens { X, Y }\n\
                     @lexer::members { int depth = 0; }\n\
                     r: X Y;\n";
        let result = parse(input);
        assert_eq!(result.errors, vec![]);

        let options = find(&result.tree, |kind| matches!(kind, NodeKind::OptionEntry { .. }));
        assert_eq!(options.len(), 2);
        assert_eq!(
            options.get(1).and_then(|o| o.name()),
            Some("a.b.Base")
        );

        let delegates: Vec<_> = find(&result.tree, |kind| {
            matches!(kind, NodeKind::DelegateGrammar { .. })
        })
        .into_iter()
        .map(|d| d.kind.clone())
        .collect();
        assert_eq!(
            delegates,
            vec![
                NodeKind::DelegateGrammar {
                    name: "A".to_string(),
                    alias: None
                },
                NodeKind::DelegateGrammar {
                    name: "C".to_string(),
                    alias: Some("B".to_string())
                },
            ]
        );

        let actions = find(&result.tree, |kind| matches!(kind, NodeKind::NamedAction { .. }));
        assert_eq!(
            actions.first().map(|a| a.kind.clone()),
            Some(NodeKind::NamedAction {
                name: "lexer::members".to_string()
            })
        );
    }

    #[test]
    fn test_unexpected_tokens_collapse_into_one_error() {
        let result = parse("grammar T;\na: 'x' , , 'y';\nb: 'z';\n");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(rule_names(&result.tree), vec!["a", "b"]);
        assert_eq!(
            find(&result.tree, |kind| matches!(kind, NodeKind::Error)).len(),
            1
        );
    }

    #[test]
    fn test_truncated_rule_reports_eof() {
        let result = parse("grammar T;\na: 'x'");
        assert_eq!(
            result.errors.first().map(|e| e.kind.clone()),
            Some(ErrorKind::UnexpectedEof("';'".to_string()))
        );
        assert_eq!(rule_names(&result.tree), vec!["a"]);
    }

    #[test]
    fn test_deep_nesting_is_cut_off() {
        let depth = MAX_NESTING + 20;
        let input = format!(
            "grammar T;\na: {}'x'{};\nb: 'y';\n",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        let result = parse(&input);
        assert_eq!(
            result.errors.iter().map(|e| e.kind.clone()).collect::<Vec<_>>(),
            vec![ErrorKind::NestingTooDeep(MAX_NESTING)]
        );
        assert_eq!(rule_names(&result.tree), vec!["a", "b"]);
    }

    #[test]
    fn test_suffixes_and_sets() {
        let result = parse("grammar T;\na: ~('x' | 'y')+? .* [a-z]? 'a'..'z';\n");
        assert_eq!(result.errors, vec![]);
        let suffixed: Vec<_> = find(&result.tree, |kind| matches!(kind, NodeKind::Suffixed { .. }))
            .into_iter()
            .map(|node| node.kind.clone())
            .collect();
        assert_eq!(
            suffixed,
            vec![
                NodeKind::Suffixed {
                    suffix: EbnfSuffix::OneOrMore,
                    greedy: false
                },
                NodeKind::Suffixed {
                    suffix: EbnfSuffix::ZeroOrMore,
                    greedy: true
                },
                NodeKind::Suffixed {
                    suffix: EbnfSuffix::Optional,
                    greedy: true
                },
            ]
        );
        assert_eq!(
            find(&result.tree, |kind| matches!(kind, NodeKind::CharacterRange)).len(),
            1
        );
    }

    #[rstest::rstest]
    #[case("grammar Foo;", Some("Foo"))]
    #[case("// header\nlexer grammar FooLexer;\nA: 'a';", Some("FooLexer"))]
    #[case("/* c */ parser grammar P ;", Some("P"))]
    #[case("a: b;", None)]
    #[case("", None)]
    fn test_sniff_grammar_name(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(sniff_grammar_name(input).as_deref(), expected);
    }

    #[test]
    fn test_rule_locations_cover_text() {
        let input = "grammar T;\nrule: 'x';\n";
        let result = parse(input);
        let rules = find(&result.tree, |kind| matches!(kind, NodeKind::ParserRule));
        let rule = rules.first().map(|r| r.location.clone()).unwrap_or_default();
        assert_eq!(rule.slice(input), Some("rule: 'x';"));
        assert_eq!(rule.start.line, 2);
        assert_eq!(rule.start.column, 0);
    }

    #[test]
    fn test_unclosed_element_options_keep_later_rules() {
        let result = parse("grammar T;\na: b < c;\nd: 'x';\ne: f;\n");
        assert_eq!(rule_names(&result.tree), vec!["a", "d", "e"]);
        assert_eq!(
            result
                .errors
                .iter()
                .map(|e| (e.kind.clone(), e.location.start.line))
                .collect::<Vec<_>>(),
            vec![(ErrorKind::UnterminatedAngle, 2)]
        );
    }

    #[test]
    fn test_long_run_of_invalid_characters() {
        let input = format!("grammar T;\n{}\na: 'x';\n", "$".repeat(200_000));
        let result = parse(&input);
        assert_eq!(rule_names(&result.tree), vec!["a"]);
        assert_eq!(
            result.errors.first().map(|e| e.kind.clone()),
            Some(ErrorKind::InvalidCharacter('$'))
        );
    }
}
