/*
 * expression/parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Recursive-descent parser for expressions and tag statements.
//!
//! Precedence, lowest first:
//!
//! ```text
//! pipeline  := logical ('|' filter)*
//! logical   := and ('or' and)*
//! and       := not ('and' not)*
//! not       := 'not' not | compare
//! compare   := additive (('==' | '!=' | '<' | '<=' | '>' | '>=' | 'contains') additive)?
//! additive  := term (('+' | '-') term)*
//! term      := postfix (('*' | '/' | '%') postfix)*
//! postfix   := primary ('.' name | '[' logical ']')*
//! primary   := literal | name | '(' logical ['..' logical] ')'
//! ```

use super::ast::{BinaryOp, Expr, FilterCall, LoopModifiers, Statement};
use super::lexer::{Token, TokenKind, tokenize};
use crate::error::SyntaxError;
use crate::source::Span;
use crate::value::Value;

/// The statement form a tag expects its arguments to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Production {
    Expression,
    Assignment,
    Loop,
    Cycle,
    When,
    Include,
}

/// Parse a full expression, including a trailing filter chain.
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxError> {
    let mut parser = Parser::new(source)?;
    let expr = parser.pipeline()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse tag arguments according to `production`.
pub fn parse_statement(production: Production, source: &str) -> Result<Statement, SyntaxError> {
    let mut parser = Parser::new(source)?;
    let statement = match production {
        Production::Expression => Statement::Expression(parser.pipeline()?),
        Production::Assignment => parser.assignment()?,
        Production::Loop => parser.loop_statement()?,
        Production::Cycle => parser.cycle()?,
        Production::When => parser.when()?,
        Production::Include => parser.include()?,
    };
    parser.expect_end()?;
    Ok(statement)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(source: &str) -> Result<Self, SyntaxError> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        // tokenize always terminates the list with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_second(&self) -> &TokenKind {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Ident(name) if name == keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.peek().span)
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        self.error(format!(
            "expected {}, found {}",
            expected,
            self.peek_kind().describe()
        ))
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, SyntaxError> {
        if *self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_end(&self) -> Result<(), SyntaxError> {
        match self.peek_kind() {
            TokenKind::Eof => Ok(()),
            other => Err(self.error(format!("unexpected {}", other.describe()))),
        }
    }

    fn identifier(&mut self, expected: &str) -> Result<String, SyntaxError> {
        match self.peek_kind() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn pipeline(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.logical()?;
        let mut filters = Vec::new();
        while self.eat(&TokenKind::Pipe) {
            filters.push(self.filter()?);
        }
        if filters.is_empty() {
            Ok(base)
        } else {
            Ok(Expr::Filtered(Box::new(base), filters))
        }
    }

    fn filter(&mut self) -> Result<FilterCall, SyntaxError> {
        let start = self.peek().span.start;
        let name = self.identifier("filter name")?;
        let mut args = Vec::new();
        let mut named = Vec::new();
        if self.eat(&TokenKind::Colon) {
            loop {
                let is_named = matches!(self.peek_kind(), TokenKind::Ident(_))
                    && *self.peek_second() == TokenKind::Colon;
                if is_named {
                    let key = self.identifier("argument name")?;
                    self.advance();
                    named.push((key, self.logical()?));
                } else if named.is_empty() {
                    args.push(self.logical()?);
                } else {
                    return Err(self.error("positional argument after named argument"));
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let end = self.tokens[self.pos.saturating_sub(1)].span.end.max(start);
        Ok(FilterCall {
            name,
            args,
            named,
            span: Span::new(start, end),
        })
    }

    fn logical(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.and()?;
        while self.eat_keyword("or") {
            let right = self.and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.not()?;
        while self.eat_keyword("and") {
            let right = self.not()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, SyntaxError> {
        if self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.additive()?;
        let op = match self.peek_kind() {
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::Ne => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::Ident(name) if name == "contains" => BinaryOp::Contains,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.additive()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.postfix()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.postfix()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                match self.advance().kind {
                    TokenKind::Ident(name) => expr = Expr::Property(Box::new(expr), name),
                    TokenKind::Int(i) => {
                        expr = Expr::Index(Box::new(expr), Box::new(Expr::literal(i)));
                    }
                    _ => {
                        self.pos -= 1;
                        return Err(self.unexpected("property name after '.'"));
                    }
                }
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.logical()?;
                self.expect(TokenKind::RBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.peek().clone();
        let expr = match token.kind {
            TokenKind::Int(i) => Expr::literal(i),
            TokenKind::Float(x) => Expr::literal(x),
            TokenKind::Str(s) => Expr::literal(s),
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Expr::literal(true),
                "false" => Expr::literal(false),
                "nil" | "null" => Expr::Literal(Value::Nil),
                "empty" | "blank" => Expr::Empty,
                _ => Expr::Variable(name),
            },
            TokenKind::LParen => {
                self.advance();
                let start = self.logical()?;
                let expr = if self.eat(&TokenKind::DotDot) {
                    let end = self.logical()?;
                    Expr::Range(Box::new(start), Box::new(end))
                } else {
                    start
                };
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(expr);
            }
            _ => return Err(self.unexpected("a value")),
        };
        self.advance();
        Ok(expr)
    }

    fn assignment(&mut self) -> Result<Statement, SyntaxError> {
        let variable = self.identifier("variable name")?;
        self.expect(TokenKind::Assign, "'='")?;
        let value = self.pipeline()?;
        Ok(Statement::Assignment { variable, value })
    }

    fn loop_statement(&mut self) -> Result<Statement, SyntaxError> {
        let variable = self.identifier("loop variable")?;
        if !self.eat_keyword("in") {
            return Err(self.unexpected("'in'"));
        }
        let source = self.postfix()?;
        let mut modifiers = LoopModifiers::default();
        loop {
            if self.eat_keyword("reversed") {
                modifiers.reversed = true;
            } else if self.eat_keyword("limit") {
                self.expect(TokenKind::Colon, "':' after limit")?;
                modifiers.limit = Some(self.postfix()?);
            } else if self.eat_keyword("offset") {
                self.expect(TokenKind::Colon, "':' after offset")?;
                modifiers.offset = Some(self.postfix()?);
            } else {
                break;
            }
            self.eat(&TokenKind::Comma);
        }
        Ok(Statement::Loop {
            variable,
            source,
            modifiers,
        })
    }

    fn cycle(&mut self) -> Result<Statement, SyntaxError> {
        let first = self.logical()?;
        let (group, first) = if self.eat(&TokenKind::Colon) {
            (Some(first), self.logical()?)
        } else {
            (None, first)
        };
        let mut values = vec![first];
        while self.eat(&TokenKind::Comma) {
            values.push(self.logical()?);
        }
        Ok(Statement::Cycle { group, values })
    }

    fn when(&mut self) -> Result<Statement, SyntaxError> {
        let mut values = vec![self.additive()?];
        while self.eat(&TokenKind::Comma) || self.eat_keyword("or") {
            values.push(self.additive()?);
        }
        Ok(Statement::When { values })
    }

    fn include(&mut self) -> Result<Statement, SyntaxError> {
        let name = self.postfix()?;
        let mut with = None;
        if self.eat_keyword("with") {
            let value = self.postfix()?;
            let alias = if self.eat_keyword("as") {
                Some(self.identifier("alias name")?)
            } else {
                None
            };
            with = Some((value, alias));
        }
        let mut bindings = Vec::new();
        loop {
            self.eat(&TokenKind::Comma);
            if *self.peek_kind() == TokenKind::Eof {
                break;
            }
            let key = self.identifier("parameter name")?;
            self.expect(TokenKind::Colon, "':' after parameter name")?;
            bindings.push((key, self.logical()?));
        }
        Ok(Statement::Include {
            name,
            with,
            bindings,
        })
    }
}
