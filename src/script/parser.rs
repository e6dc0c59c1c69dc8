//! Recursive-descent statement parser with a Pratt expression core.
//!
//! Binding powers are `(left, right)` pairs: left-associative operators have
//! `left < right`, right-associative ones (assignment, `?:`) the reverse.

use std::rc::Rc;

use super::ast::*;
use super::lexer::{lex, Token, TokenKind};
use crate::error::ScriptError;

type PResult<T> = Result<T, ScriptError>;

#[derive(Debug, Clone, Copy)]
struct BindingPower {
    left: u8,
    right: u8,
}

impl BindingPower {
    const fn left(power: u8) -> Self {
        Self { left: power, right: power + 1 }
    }

    const fn right(power: u8) -> Self {
        Self { left: power + 1, right: power }
    }
}

mod prec {
    use super::BindingPower;

    pub const ASSIGN: BindingPower = BindingPower::right(2);
    pub const CONDITIONAL: BindingPower = BindingPower::right(4);
    pub const NULLISH: BindingPower = BindingPower::left(6);
    pub const OR: BindingPower = BindingPower::left(6);
    pub const AND: BindingPower = BindingPower::left(8);
    pub const EQUALITY: BindingPower = BindingPower::left(10);
    pub const RELATIONAL: BindingPower = BindingPower::left(12);
    pub const ADDITIVE: BindingPower = BindingPower::left(14);
    pub const MULTIPLICATIVE: BindingPower = BindingPower::left(16);
    pub const UNARY: u8 = 18;
}

enum Infix {
    Assign(AssignOp),
    Conditional,
    Logical(LogicalOp),
    Binary(BinaryOp),
}

fn infix_of(token: &Token) -> Option<(BindingPower, Infix)> {
    let TokenKind::Punct(p) = token.kind else {
        return None;
    };
    let entry = match p {
        "=" => (prec::ASSIGN, Infix::Assign(AssignOp::Assign)),
        "+=" => (prec::ASSIGN, Infix::Assign(AssignOp::Compound(BinaryOp::Add))),
        "-=" => (prec::ASSIGN, Infix::Assign(AssignOp::Compound(BinaryOp::Sub))),
        "*=" => (prec::ASSIGN, Infix::Assign(AssignOp::Compound(BinaryOp::Mul))),
        "/=" => (prec::ASSIGN, Infix::Assign(AssignOp::Compound(BinaryOp::Div))),
        "%=" => (prec::ASSIGN, Infix::Assign(AssignOp::Compound(BinaryOp::Rem))),
        "?" => (prec::CONDITIONAL, Infix::Conditional),
        "??" => (prec::NULLISH, Infix::Logical(LogicalOp::Nullish)),
        "||" => (prec::OR, Infix::Logical(LogicalOp::Or)),
        "&&" => (prec::AND, Infix::Logical(LogicalOp::And)),
        "==" => (prec::EQUALITY, Infix::Binary(BinaryOp::Eq)),
        "!=" => (prec::EQUALITY, Infix::Binary(BinaryOp::NotEq)),
        "===" => (prec::EQUALITY, Infix::Binary(BinaryOp::StrictEq)),
        "!==" => (prec::EQUALITY, Infix::Binary(BinaryOp::StrictNotEq)),
        "<" => (prec::RELATIONAL, Infix::Binary(BinaryOp::Lt)),
        "<=" => (prec::RELATIONAL, Infix::Binary(BinaryOp::LtEq)),
        ">" => (prec::RELATIONAL, Infix::Binary(BinaryOp::Gt)),
        ">=" => (prec::RELATIONAL, Infix::Binary(BinaryOp::GtEq)),
        "+" => (prec::ADDITIVE, Infix::Binary(BinaryOp::Add)),
        "-" => (prec::ADDITIVE, Infix::Binary(BinaryOp::Sub)),
        "*" => (prec::MULTIPLICATIVE, Infix::Binary(BinaryOp::Mul)),
        "/" => (prec::MULTIPLICATIVE, Infix::Binary(BinaryOp::Div)),
        "%" => (prec::MULTIPLICATIVE, Infix::Binary(BinaryOp::Rem)),
        _ => return None,
    };
    Some(entry)
}

/// Parses a routine body, binding `params` as its formal parameters.
pub fn parse_program(params: Vec<String>, source: &str) -> PResult<Program> {
    let mut parser = Parser { tokens: lex(source)?, pos: 0 };
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.statement()?);
    }
    Ok(Program { params, body })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.peek().is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> PResult<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{p}'")))
        }
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> ScriptError {
        let token = self.peek();
        ScriptError::Syntax {
            line: token.line,
            message: format!("expected {expected} but found {}", token.describe()),
        }
    }

    fn eat_semicolon(&mut self) {
        self.eat_punct(";");
    }

    fn decl_kind(token: &Token) -> Option<DeclKind> {
        match &token.kind {
            TokenKind::Ident(name) => match name.as_str() {
                "let" => Some(DeclKind::Let),
                "const" => Some(DeclKind::Const),
                "var" => Some(DeclKind::Var),
                _ => None,
            },
            _ => None,
        }
    }

    /// Index of the token closing the bracket at `offset`, if balanced.
    fn matching_close(&self, offset: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut i = offset;
        loop {
            let token = self.peek_at(i);
            match token.kind {
                TokenKind::Eof => return None,
                TokenKind::Punct("(") | TokenKind::Punct("[") | TokenKind::Punct("{") => {
                    depth += 1
                }
                TokenKind::Punct(")") | TokenKind::Punct("]") | TokenKind::Punct("}") => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }

    /// `with (x) {` / `strict (x) {` scope statements.
    fn is_scope_statement(&self) -> bool {
        let keyword = self.peek();
        if !(keyword.is_ident("with") || keyword.is_ident("strict")) {
            return false;
        }
        if !self.peek_at(1).is_punct("(") {
            return false;
        }
        self.matching_close(1).is_some_and(|close| self.peek_at(close + 1).is_punct("{"))
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn statement(&mut self) -> PResult<Stmt> {
        let token = self.peek().clone();

        if token.is_punct("{") {
            return Ok(Stmt::Block(self.block()?));
        }
        if token.is_punct(";") {
            self.advance();
            return Ok(Stmt::Empty);
        }
        if let Some(kind) = Self::decl_kind(&token) {
            self.advance();
            let stmt = self.declaration(kind)?;
            self.eat_semicolon();
            return Ok(stmt);
        }
        if self.is_scope_statement() {
            let strict = token.is_ident("strict");
            self.advance();
            self.expect_punct("(")?;
            let object = self.expression()?;
            self.expect_punct(")")?;
            let body = self.block()?;
            return Ok(Stmt::With { object, strict, body });
        }

        if let TokenKind::Ident(keyword) = &token.kind {
            match keyword.as_str() {
                "if" => return self.if_statement(),
                "for" => return self.for_statement(),
                "while" => {
                    self.advance();
                    self.expect_punct("(")?;
                    let test = self.expression()?;
                    self.expect_punct(")")?;
                    let body = Box::new(self.statement()?);
                    return Ok(Stmt::While { test, body });
                }
                "break" => {
                    self.advance();
                    self.eat_semicolon();
                    return Ok(Stmt::Break);
                }
                "continue" => {
                    self.advance();
                    self.eat_semicolon();
                    return Ok(Stmt::Continue);
                }
                "return" => {
                    self.advance();
                    let next = self.peek();
                    let value = if next.is_punct(";")
                        || next.is_punct("}")
                        || next.kind == TokenKind::Eof
                        || next.line != token.line
                    {
                        None
                    } else {
                        Some(self.expression()?)
                    };
                    self.eat_semicolon();
                    return Ok(Stmt::Return(value));
                }
                "throw" => {
                    self.advance();
                    let value = self.expression()?;
                    self.eat_semicolon();
                    return Ok(Stmt::Throw(value));
                }
                "else" => return Err(self.unexpected("statement")),
                _ => {}
            }
        }

        let expr = self.expression()?;
        self.eat_semicolon();
        Ok(Stmt::Expr(expr))
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.peek().is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn declaration(&mut self, kind: DeclKind) -> PResult<Stmt> {
        let mut bindings = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let init = if self.eat_punct("=") {
                Some(self.expression_bp(prec::ASSIGN.right)?)
            } else {
                None
            };
            if kind == DeclKind::Const && init.is_none() {
                return Err(ScriptError::Syntax {
                    line: self.peek().line,
                    message: format!("missing initializer in const declaration '{name}'"),
                });
            }
            bindings.push((name, init));
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(Stmt::Decl { kind, bindings })
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        self.advance();
        self.expect_punct("(")?;
        let test = self.expression()?;
        self.expect_punct(")")?;
        let consequent = Box::new(self.statement()?);
        let alternate = if self.peek().is_ident("else") {
            self.advance();
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If { test, consequent, alternate })
    }

    fn for_statement(&mut self) -> PResult<Stmt> {
        self.advance();
        self.expect_punct("(")?;

        let decl = Self::decl_kind(self.peek());
        let binding_offset = if decl.is_some() { 1 } else { 0 };
        let head_token = self.peek_at(binding_offset + 1);
        let head = if head_token.is_ident("of") {
            Some(ForHead::Of)
        } else if head_token.is_ident("in") {
            Some(ForHead::In)
        } else {
            None
        };

        let has_binding = matches!(self.peek_at(binding_offset).kind, TokenKind::Ident(_));

        if let (Some(head), true) = (head, has_binding) {
            if decl.is_some() {
                self.advance();
            }
            let binding = self.expect_ident()?;
            self.advance();
            let iterable = self.expression()?;
            self.expect_punct(")")?;
            let body = Box::new(self.statement()?);
            return Ok(Stmt::ForEach { head, decl, binding, iterable, body });
        }

        let init = if self.peek().is_punct(";") {
            None
        } else if let Some(kind) = decl {
            self.advance();
            Some(Box::new(self.declaration(kind)?))
        } else {
            Some(Box::new(Stmt::Expr(self.expression()?)))
        };
        self.expect_punct(";")?;
        let test = if self.peek().is_punct(";") { None } else { Some(self.expression()?) };
        self.expect_punct(";")?;
        let update = if self.peek().is_punct(")") { None } else { Some(self.expression()?) };
        self.expect_punct(")")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::For { init, test, update, body })
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    fn expression(&mut self) -> PResult<Expr> {
        self.expression_bp(0)
    }

    fn expression_bp(&mut self, min_bp: u8) -> PResult<Expr> {
        let mut lhs = self.prefix()?;

        loop {
            let Some((bp, infix)) = infix_of(self.peek()) else {
                break;
            };
            if bp.left < min_bp {
                break;
            }
            self.advance();

            lhs = match infix {
                Infix::Assign(op) => {
                    if !matches!(lhs, Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }) {
                        return Err(ScriptError::Syntax {
                            line: self.peek().line,
                            message: "invalid assignment target".to_string(),
                        });
                    }
                    let value = self.expression_bp(bp.right)?;
                    Expr::Assign { op, target: Box::new(lhs), value: Box::new(value) }
                }
                Infix::Conditional => {
                    let consequent = self.expression_bp(prec::ASSIGN.right)?;
                    self.expect_punct(":")?;
                    let alternate = self.expression_bp(bp.right)?;
                    Expr::Conditional {
                        test: Box::new(lhs),
                        consequent: Box::new(consequent),
                        alternate: Box::new(alternate),
                    }
                }
                Infix::Logical(op) => {
                    let right = self.expression_bp(bp.right)?;
                    Expr::Logical { op, left: Box::new(lhs), right: Box::new(right) }
                }
                Infix::Binary(op) => {
                    let right = self.expression_bp(bp.right)?;
                    Expr::Binary { op, left: Box::new(lhs), right: Box::new(right) }
                }
            };
        }

        Ok(lhs)
    }

    fn prefix(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        let unary = match &token.kind {
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Ident(name) if name == "typeof" => Some(UnaryOp::Typeof),
            _ => None,
        };
        if let Some(op) = unary {
            self.advance();
            let operand = self.expression_bp(prec::UNARY)?;
            return Ok(Expr::Unary { op, operand: Box::new(operand) });
        }
        if token.is_punct("++") || token.is_punct("--") {
            self.advance();
            let target = self.expression_bp(prec::UNARY)?;
            return Ok(Expr::Update {
                increment: token.is_punct("++"),
                prefix: true,
                target: Box::new(target),
            });
        }

        let primary = self.primary()?;
        self.postfix(primary)
    }

    fn postfix(&mut self, mut expr: Expr) -> PResult<Expr> {
        loop {
            let token = self.peek().clone();
            if token.is_punct(".") {
                self.advance();
                let property = self.expect_ident()?;
                expr = Expr::Member { object: Box::new(expr), property, optional: false };
            } else if token.is_punct("?.") {
                self.advance();
                if self.eat_punct("(") {
                    let args = self.arguments()?;
                    expr = Expr::Call { callee: Box::new(expr), args, optional: true };
                } else if self.eat_punct("[") {
                    let index = self.expression()?;
                    self.expect_punct("]")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: true,
                    };
                } else {
                    let property = self.expect_ident()?;
                    expr = Expr::Member { object: Box::new(expr), property, optional: true };
                }
            } else if token.is_punct("[") {
                self.advance();
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    optional: false,
                };
            } else if token.is_punct("(") {
                self.advance();
                let args = self.arguments()?;
                expr = Expr::Call { callee: Box::new(expr), args, optional: false };
            } else if token.is_punct("++") || token.is_punct("--") {
                if !matches!(expr, Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }) {
                    break;
                }
                self.advance();
                expr = Expr::Update {
                    increment: token.is_punct("++"),
                    prefix: false,
                    target: Box::new(expr),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Parses call arguments after the opening parenthesis.
    fn arguments(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.peek().is_punct(")") {
            args.push(self.expression_bp(prec::ASSIGN.right)?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(args)
    }

    fn primary(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::Ident(name) => {
                if self.peek_at(1).is_punct("=>") {
                    self.advance();
                    self.advance();
                    return self.arrow_body(vec![name]);
                }
                self.advance();
                Ok(match name.as_str() {
                    "true" => Expr::Bool(true),
                    "false" => Expr::Bool(false),
                    "null" => Expr::Null,
                    "undefined" => Expr::Undefined,
                    _ => Expr::Ident(name),
                })
            }
            TokenKind::Punct("(") => {
                let is_arrow = self
                    .matching_close(0)
                    .is_some_and(|close| self.peek_at(close + 1).is_punct("=>"));
                self.advance();
                if is_arrow {
                    let mut params = Vec::new();
                    while !self.peek().is_punct(")") {
                        params.push(self.expect_ident()?);
                        if !self.eat_punct(",") {
                            break;
                        }
                    }
                    self.expect_punct(")")?;
                    self.expect_punct("=>")?;
                    return self.arrow_body(params);
                }
                let inner = self.expression()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            TokenKind::Punct("[") => {
                self.advance();
                let mut items = Vec::new();
                while !self.peek().is_punct("]") {
                    items.push(self.expression_bp(prec::ASSIGN.right)?);
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct("]")?;
                Ok(Expr::Array(items))
            }
            TokenKind::Punct("{") => self.object_literal(),
            _ => Err(self.unexpected("expression")),
        }
    }

    fn object_literal(&mut self) -> PResult<Expr> {
        self.expect_punct("{")?;
        let mut entries = Vec::new();
        while !self.peek().is_punct("}") {
            let key_token = self.advance();
            let key = match key_token.kind {
                TokenKind::Ident(name) => name,
                TokenKind::Str(s) => s,
                TokenKind::Number(n) => super::value::format_number(n),
                _ => {
                    return Err(ScriptError::Syntax {
                        line: key_token.line,
                        message: format!("unexpected {} in object literal", key_token.describe()),
                    })
                }
            };
            let value = if self.eat_punct(":") {
                self.expression_bp(prec::ASSIGN.right)?
            } else {
                Expr::Ident(key.clone())
            };
            entries.push((key, value));
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(Expr::Object(entries))
    }

    fn arrow_body(&mut self, params: Vec<String>) -> PResult<Expr> {
        let body = if self.peek().is_punct("{") {
            FunctionBody::Block(self.block()?)
        } else {
            FunctionBody::Expr(self.expression_bp(prec::ASSIGN.right)?)
        };
        Ok(Expr::Arrow(Rc::new(FunctionDef { params, body })))
    }
}
