/// Recursive-descent parser for the visualization query language.
///
/// Clauses are read in a fixed order (`SELECT`, `WHERE`, `GROUP BY`,
/// `PIVOT`, `ORDER BY`, `LIMIT`, `OFFSET`, `LABEL`, `FORMAT`, `OPTIONS`),
/// each optional. Expression precedence, tightest first:
///
/// ```text
/// value  →  comparison  →  not  →  and/or  →  * /  →  + -
/// ```
///
/// Logic binds tighter than multiplication here; queries written against
/// existing data sources depend on it.
use super::token::{Token, TokenKind, Tokenizer};
use super::types::*;
use super::validate::check_query;
use crate::error::{GqlError, Result};

/// Parse and validate a query. Arity checking is skipped when
/// `extended_functions` is set.
pub fn parse_query(input: &str, extended_functions: bool) -> Result<Query> {
    let mut parser = Parser::new(input);
    let mut query = parser.parse()?;
    query.extended_functions = extended_functions;
    if !extended_functions {
        check_query(&query)?;
    }
    Ok(query)
}

#[derive(Clone, Copy)]
enum Annotation {
    Label,
    Format,
}

impl Annotation {
    fn name(&self) -> &'static str {
        match self {
            Annotation::Label => "label",
            Annotation::Format => "format",
        }
    }
}

pub struct Parser {
    tokens: Tokenizer,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        Self {
            tokens: Tokenizer::new(input),
        }
    }

    /// Parse a full statement without semantic validation.
    pub fn parse(&mut self) -> Result<Query> {
        self.advance();
        let mut query = Query::default();

        if self.accept(TokenKind::Select) {
            self.parse_select(&mut query)?;
        }
        if self.accept(TokenKind::Where) {
            query.filter = Some(self.require_expr()?);
        }
        if self.accept(TokenKind::Group) {
            self.expect(TokenKind::By)?;
            query.group_by = self.parse_identifiers()?;
        }
        if self.accept(TokenKind::Pivot) {
            query.pivot = self.parse_identifiers()?;
        }
        if self.accept(TokenKind::Order) {
            self.expect(TokenKind::By)?;
            self.parse_order_by(&mut query)?;
        }
        if self.accept(TokenKind::Limit) {
            query.limit = self.parse_count()?;
        }
        if self.accept(TokenKind::Offset) {
            query.offset = self.parse_count()?;
        }
        if self.accept(TokenKind::Label) {
            self.parse_annotations(&mut query, Annotation::Label)?;
        }
        if self.accept(TokenKind::Format) {
            self.parse_annotations(&mut query, Annotation::Format)?;
        }
        if self.accept(TokenKind::Options) {
            self.parse_options(&mut query)?;
        }
        self.expect(TokenKind::Eol)?;

        Ok(query)
    }

    // -----------------------------------------------------------------------
    // Token helpers
    // -----------------------------------------------------------------------

    fn peek(&self) -> &Token {
        self.tokens.current()
    }

    fn advance(&mut self) {
        self.tokens.next_token();
    }

    /// Return the current token and move past it.
    fn take(&mut self) -> Token {
        let tok = self.peek().clone();
        self.advance();
        tok
    }

    fn accept(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.peek().kind == kind {
            Ok(self.take())
        } else {
            Err(self.expected(&kind.to_string()))
        }
    }

    fn expected(&self, what: &str) -> GqlError {
        let tok = self.peek();
        GqlError::syntax(
            tok.pos,
            format!("expected {} but got '{}' instead", what, tok.text),
        )
    }

    fn unexpected(&self) -> GqlError {
        let tok = self.peek();
        GqlError::syntax(tok.pos, format!("unexpected token '{}'", tok.text))
    }

    // -----------------------------------------------------------------------
    // Clauses
    // -----------------------------------------------------------------------

    fn parse_select(&mut self, query: &mut Query) -> Result<()> {
        if self.accept(TokenKind::Times) {
            return Ok(());
        }
        query.select_star = false;
        loop {
            let expr = self.require_expr()?;
            query.select.push(SelectExpr::new(expr));
            if !self.accept(TokenKind::Comma) {
                return Ok(());
            }
        }
    }

    fn parse_identifiers(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        loop {
            names.push(self.expect(TokenKind::Identifier)?.text);
            if !self.accept(TokenKind::Comma) {
                return Ok(names);
            }
        }
    }

    fn parse_order_by(&mut self, query: &mut Query) -> Result<()> {
        loop {
            let expr = self.require_expr()?;
            let desc = if self.accept(TokenKind::Desc) {
                true
            } else {
                self.accept(TokenKind::Asc);
                false
            };
            query.order_by.push(OrderExpr { expr, desc });
            if !self.accept(TokenKind::Comma) {
                return Ok(());
            }
        }
    }

    fn parse_count(&mut self) -> Result<u64> {
        let tok = self.expect(TokenKind::Number)?;
        tok.text.parse::<u64>().map_err(|_| {
            GqlError::syntax(
                tok.pos,
                format!("expected an integer but got '{}' instead", tok.text),
            )
        })
    }

    /// `LABEL`/`FORMAT` entries: `<expr> <string>` pairs bound to select
    /// expressions by structural equality.
    fn parse_annotations(&mut self, query: &mut Query, kind: Annotation) -> Result<()> {
        loop {
            let pos = self.peek().pos;
            let expr = self.require_expr()?;
            let text = self.expect(TokenKind::String)?.text;

            let existing = match (kind, query.select_star) {
                (Annotation::Label, true) => None,
                _ => query.select.iter().position(|s| s.expr == expr),
            };
            match existing {
                Some(idx) => set_annotation(&mut query.select[idx], kind, text),
                None if query.select_star => {
                    let mut sel = SelectExpr::new(expr);
                    set_annotation(&mut sel, kind, text);
                    query.select.push(sel);
                }
                None => {
                    return Err(GqlError::syntax(
                        pos,
                        format!("{} expression {} not found", kind.name(), expr),
                    ));
                }
            }

            if !self.accept(TokenKind::Comma) {
                return Ok(());
            }
        }
    }

    fn parse_options(&mut self, query: &mut Query) -> Result<()> {
        loop {
            let tok = self.peek().clone();
            if tok.is_word("no_format") {
                query.no_format = true;
            } else if tok.is_word("no_values") {
                query.no_values = true;
            } else {
                return Err(self.expected("'no_format' or 'no_values'"));
            }
            self.advance();
            if !self.accept(TokenKind::Comma) {
                return Ok(());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn require_expr(&mut self) -> Result<Expr> {
        self.parse_expr()?.ok_or_else(|| self.unexpected())
    }

    pub fn parse_expr(&mut self) -> Result<Option<Expr>> {
        self.parse_add()
    }

    fn parse_add(&mut self) -> Result<Option<Expr>> {
        let Some(mut left) = self.parse_mult()? else {
            return Ok(None);
        };
        while matches!(self.peek().kind, TokenKind::Plus | TokenKind::Minus) {
            let op = self.take();
            let right = self.parse_mult()?.ok_or_else(|| self.unexpected())?;
            let kind = if op.kind == TokenKind::Plus {
                Operator::Plus
            } else {
                Operator::Minus
            };
            left = Expr::binary(kind, op.text, left, right);
        }
        Ok(Some(left))
    }

    fn parse_mult(&mut self) -> Result<Option<Expr>> {
        let Some(mut left) = self.parse_bool()? else {
            return Ok(None);
        };
        while matches!(self.peek().kind, TokenKind::Times | TokenKind::Div) {
            let op = self.take();
            let right = self.parse_bool()?.ok_or_else(|| self.unexpected())?;
            let kind = if op.kind == TokenKind::Times {
                Operator::Times
            } else {
                Operator::Div
            };
            left = Expr::binary(kind, op.text, left, right);
        }
        Ok(Some(left))
    }

    fn parse_bool(&mut self) -> Result<Option<Expr>> {
        let Some(mut left) = self.parse_not()? else {
            return Ok(None);
        };
        while matches!(self.peek().kind, TokenKind::And | TokenKind::Or) {
            let op = self.take();
            let right = self.parse_not()?.ok_or_else(|| self.unexpected())?;
            let kind = if op.kind == TokenKind::And {
                Operator::And
            } else {
                Operator::Or
            };
            left = Expr::binary(kind, op.text, left, right);
        }
        Ok(Some(left))
    }

    fn parse_not(&mut self) -> Result<Option<Expr>> {
        let mut seen = false;
        let mut negate = false;
        while self.accept(TokenKind::Not) {
            seen = true;
            negate = !negate;
        }
        match self.parse_comparison()? {
            Some(expr) if negate => Ok(Some(Expr::unary(Operator::Not, "not", expr))),
            Some(expr) => Ok(Some(expr)),
            None if seen => Err(self.unexpected()),
            None => Ok(None),
        }
    }

    fn parse_comparison(&mut self) -> Result<Option<Expr>> {
        let Some(mut left) = self.parse_value()? else {
            return Ok(None);
        };

        let tok = self.peek().clone();
        if tok.kind.is_comparison() {
            while self.peek().kind.is_comparison() {
                let op = self.take();
                let right = self.parse_value()?.ok_or_else(|| self.unexpected())?;
                left = Expr::binary(comparison_operator(op.kind), op.text, left, right);
            }
        } else if tok.is_word("is") {
            self.advance();
            if self.peek().is_word("null") {
                self.advance();
                left = Expr::unary(Operator::IsNull, "is null", left);
            } else if self.accept(TokenKind::Not) {
                if !self.peek().is_word("null") {
                    return Err(self.expected("'null'"));
                }
                self.advance();
                left = Expr::unary(Operator::IsNotNull, "is not null", left);
            } else {
                return Err(self.expected("'null' or 'not'"));
            }
        } else if let Some(op) = word_operator(&tok) {
            self.advance();
            if matches!(op, Operator::StartsWith | Operator::EndsWith) {
                if !self.peek().is_word("with") {
                    return Err(self.expected("'with'"));
                }
                self.advance();
            }
            let right = self.parse_comparison()?.ok_or_else(|| self.unexpected())?;
            left = Expr::binary(op, tok.text.to_ascii_lowercase(), left, right);
        }

        Ok(Some(left))
    }

    /// Returns `None` when the current token cannot start a value.
    fn parse_value(&mut self) -> Result<Option<Expr>> {
        let tok = self.peek().clone();
        let expr = match tok.kind {
            TokenKind::Plus | TokenKind::Minus => {
                self.advance();
                let operand = self.parse_value()?.ok_or_else(|| self.unexpected())?;
                let op = if tok.kind == TokenKind::Plus {
                    Operator::Pos
                } else {
                    Operator::Neg
                };
                Expr::unary(op, tok.text, operand)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.require_expr()?;
                self.expect(TokenKind::RParen)?;
                inner
            }
            TokenKind::True => {
                self.advance();
                Expr::boolean(true)
            }
            TokenKind::False => {
                self.advance();
                Expr::boolean(false)
            }
            TokenKind::String => {
                self.advance();
                Expr::string(tok.text)
            }
            TokenKind::Number => {
                self.advance();
                Expr::number(tok.text)
            }
            TokenKind::Date | TokenKind::TimeOfDay | TokenKind::DateTime => {
                self.advance();
                let value = self.expect(TokenKind::String)?;
                let kind = match tok.kind {
                    TokenKind::Date => TypedLiteral::Date,
                    TokenKind::TimeOfDay => TypedLiteral::TimeOfDay,
                    _ => TypedLiteral::DateTime,
                };
                Expr::typed(kind, tok.text, value.text)
            }
            TokenKind::Identifier => {
                self.advance();
                if self.accept(TokenKind::LParen) {
                    self.parse_call(tok.text)?
                } else {
                    Expr::identifier(tok.text)
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(expr))
    }

    /// Arguments of a call whose opening parenthesis was consumed. An
    /// aggregate takes exactly one bare column name.
    fn parse_call(&mut self, name: String) -> Result<Expr> {
        let mut args = Vec::new();
        if is_aggregate_function(&name) {
            let column = self.expect(TokenKind::Identifier)?;
            args.push(Expr::identifier(column.text));
        } else if self.peek().kind != TokenKind::RParen {
            loop {
                args.push(self.require_expr()?);
                if !self.accept(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(Expr::call(name, args))
    }
}

fn set_annotation(sel: &mut SelectExpr, kind: Annotation, text: String) {
    match kind {
        Annotation::Label => sel.label = Some(text),
        Annotation::Format => sel.format = Some(text),
    }
}

fn comparison_operator(kind: TokenKind) -> Operator {
    match kind {
        TokenKind::Eq => Operator::Eq,
        TokenKind::Ne => Operator::Ne,
        TokenKind::Lt => Operator::Lt,
        TokenKind::Le => Operator::Le,
        TokenKind::Gt => Operator::Gt,
        _ => Operator::Ge,
    }
}

fn word_operator(tok: &Token) -> Option<Operator> {
    if tok.kind != TokenKind::Identifier {
        return None;
    }
    match tok.text.to_ascii_lowercase().as_str() {
        "contains" => Some(Operator::Contains),
        "matches" => Some(Operator::Matches),
        "like" => Some(Operator::Like),
        "starts" => Some(Operator::StartsWith),
        "ends" => Some(Operator::EndsWith),
        _ => None,
    }
}
