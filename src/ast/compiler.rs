/// Query AST → SQL compiler.
///
/// One entry point, [`compile`], targets a closed set of dialects. The
/// `Gql` dialect prints the query back in its own language; the SQL dialects
/// share one walker and differ only in quoting, function mapping and the
/// `LIMIT`/`OFFSET` form.
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::types::*;
use crate::error::{GqlError, Result};

/// Largest unsigned 64-bit value; MySQL has no `OFFSET` without `LIMIT`.
const MYSQL_MAX_LIMIT: &str = "18446744073709551615";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Gql,
    MySql,
    PostgreSql,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Gql => "gql",
            Dialect::MySql => "mysql",
            Dialect::PostgreSql => "postgresql",
        }
    }

    fn quote_char(&self) -> char {
        match self {
            Dialect::MySql | Dialect::Gql => '`',
            Dialect::PostgreSql => '"',
        }
    }

    pub fn quote_ident(&self, name: &str) -> String {
        let q = self.quote_char();
        let doubled: String = [q, q].iter().collect();
        format!("{q}{}{q}", name.replace(q, &doubled))
    }

    /// Quote a possibly schema-qualified table name part by part.
    pub fn quote_table(&self, name: &str) -> String {
        name.split('.')
            .map(|part| self.quote_ident(part))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = GqlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gql" | "identity" => Ok(Dialect::Gql),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgresql" | "postgres" | "pgsql" => Ok(Dialect::PostgreSql),
            other => Err(GqlError::new(
                crate::error::Reason::NotSupported,
                format!("unknown dialect '{}'", other),
            )),
        }
    }
}

/// Which tables a compiled query may read.
#[derive(Debug, Clone, Copy)]
pub struct TableAccess<'a> {
    /// Table used for unqualified column names.
    pub default_table: &'a str,
    /// Additional tables reachable through `table.column` names.
    pub allowed: &'a [String],
}

/// Compile a validated query for `dialect`.
pub fn compile(query: &Query, dialect: Dialect, access: &TableAccess<'_>) -> Result<String> {
    match dialect {
        Dialect::Gql => Ok(query.to_string()),
        Dialect::MySql | Dialect::PostgreSql => SqlWriter::new(dialect).compile_select(query, access),
    }
}

/// Render a string literal for SQL: single quotes, embedded quotes doubled.
pub fn sql_string(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

struct SqlWriter {
    dialect: Dialect,
    /// Tables referenced so far; "" stands for the default table.
    tables: BTreeSet<String>,
}

impl SqlWriter {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: BTreeSet::new(),
        }
    }

    fn compile_select(mut self, query: &Query, access: &TableAccess<'_>) -> Result<String> {
        let mut parts = Vec::new();

        if query.select_star {
            parts.push("SELECT *".to_string());
        } else {
            let mut items = Vec::new();
            if query.has_pivot() {
                for name in query.pivot.iter().chain(&query.group_by) {
                    items.push(self.ident(name));
                }
            }
            for sel in &query.select {
                items.push(self.expr(&sel.expr)?);
            }
            parts.push(format!("SELECT {}", items.join(", ")));
        }

        let filter = match &query.filter {
            Some(expr) => Some(self.expr(expr)?),
            None => None,
        };

        let groups: Vec<String> = query
            .pivot
            .iter()
            .chain(&query.group_by)
            .map(|name| self.ident(name))
            .collect();

        let mut orders = Vec::new();
        for order in &query.order_by {
            let expr = self.expr(&order.expr)?;
            orders.push(if order.desc {
                format!("{} DESC", expr)
            } else {
                expr
            });
        }

        parts.push(format!("FROM {}", self.from_clause(access)?));
        if let Some(filter) = filter {
            parts.push(format!("WHERE {}", filter));
        }
        if !groups.is_empty() {
            parts.push(format!("GROUP BY {}", groups.join(", ")));
        }
        if !orders.is_empty() {
            parts.push(format!("ORDER BY {}", orders.join(", ")));
        }
        if let Some(limit) = self.limit_clause(query.limit, query.offset) {
            parts.push(limit);
        }

        Ok(parts.join(" "))
    }

    fn from_clause(&self, access: &TableAccess<'_>) -> Result<String> {
        let default = access.default_table;
        let mut from = Vec::new();

        let uses_default =
            self.tables.is_empty() || self.tables.contains("") || self.tables.contains(default);
        if uses_default {
            if default.is_empty() {
                return Err(GqlError::access_denied("no default table is configured"));
            }
            from.push(self.dialect.quote_table(default));
        }

        for table in &self.tables {
            if table.is_empty() || table == default {
                continue;
            }
            if !access.allowed.iter().any(|t| t == table) {
                return Err(GqlError::access_denied(format!(
                    "table {} does not exist or is not accessible",
                    self.dialect.quote_ident(table)
                )));
            }
            from.push(self.dialect.quote_ident(table));
        }

        Ok(from.join(", "))
    }

    fn limit_clause(&self, limit: u64, offset: u64) -> Option<String> {
        match self.dialect {
            Dialect::MySql => match (limit, offset) {
                (0, 0) => None,
                (limit, 0) => Some(format!("LIMIT {}", limit)),
                (0, offset) => Some(format!("LIMIT {}, {}", offset, MYSQL_MAX_LIMIT)),
                (limit, offset) => Some(format!("LIMIT {}, {}", offset, limit)),
            },
            _ => {
                let mut out = Vec::new();
                if limit != 0 {
                    out.push(format!("LIMIT {}", limit));
                }
                if offset != 0 {
                    out.push(format!("OFFSET {}", offset));
                }
                (!out.is_empty()).then(|| out.join(" "))
            }
        }
    }

    /// `table.column` splits on its single dot and records the table;
    /// anything else reads from the default table.
    fn ident(&mut self, name: &str) -> String {
        let mut parts = name.split('.');
        if let (Some(table), Some(column), None) = (parts.next(), parts.next(), parts.next()) {
            self.tables.insert(table.to_string());
            return format!(
                "{}.{}",
                self.dialect.quote_ident(table),
                self.dialect.quote_ident(column)
            );
        }
        self.tables.insert(String::new());
        self.dialect.quote_ident(name)
    }

    fn expr(&mut self, expr: &Expr) -> Result<String> {
        match expr.kind {
            ExprKind::Literal(Literal::Number) => Ok(expr.data.clone()),
            ExprKind::Literal(Literal::String) => Ok(sql_string(&expr.data)),
            ExprKind::Literal(Literal::Bool) => Ok(expr.data.to_ascii_uppercase()),
            ExprKind::Typed(kind) => {
                let value = match expr.args.first() {
                    Some(arg) if arg.kind == ExprKind::Literal(Literal::String) => &arg.data,
                    _ => {
                        return Err(GqlError::internal(format!(
                            "{} literal without a string value",
                            expr.data
                        )))
                    }
                };
                Ok(self.typed_literal(kind, value))
            }
            ExprKind::Identifier if expr.is_bare_identifier() => Ok(self.ident(&expr.data)),
            ExprKind::Identifier => {
                let args = self.args(expr)?;
                self.function(&expr.data, &args)
            }
            ExprKind::Operator(op) => {
                let args = self.args(expr)?;
                self.operator(op, &expr.data, &args)
            }
        }
    }

    fn args(&mut self, expr: &Expr) -> Result<Vec<String>> {
        expr.args.iter().map(|a| self.expr(a)).collect()
    }

    fn typed_literal(&self, kind: TypedLiteral, value: &str) -> String {
        let value = sql_string(value);
        match (self.dialect, kind) {
            (_, TypedLiteral::Date) => format!("DATE {}", value),
            (_, TypedLiteral::TimeOfDay) => format!("TIME {}", value),
            (Dialect::MySql, TypedLiteral::DateTime) => format!("CONVERT({}, DATETIME(3))", value),
            (_, TypedLiteral::DateTime) => format!("TIMESTAMP {}", value),
        }
    }

    fn operator(&self, op: Operator, symbol: &str, args: &[String]) -> Result<String> {
        let out = match op {
            Operator::Pos => arity(symbol, args, 1)?[0].clone(),
            Operator::Neg => format!("(-{})", arity(symbol, args, 1)?[0]),
            Operator::Not => format!("(NOT {})", arity(symbol, args, 1)?[0]),
            Operator::IsNull => format!("({} IS NULL)", arity(symbol, args, 1)?[0]),
            Operator::IsNotNull => format!("({} IS NOT NULL)", arity(symbol, args, 1)?[0]),
            Operator::And | Operator::Or => {
                let a = arity(symbol, args, 2)?;
                format!("({} {} {})", a[0], symbol.to_ascii_uppercase(), a[1])
            }
            Operator::Contains
            | Operator::Matches
            | Operator::Like
            | Operator::StartsWith
            | Operator::EndsWith => return self.function(symbol, args),
            _ => {
                let a = arity(symbol, args, 2)?;
                format!("({}{}{})", a[0], symbol, a[1])
            }
        };
        Ok(out)
    }

    fn function(&self, name: &str, args: &[String]) -> Result<String> {
        let lower = name.to_ascii_lowercase();
        let out = match (self.dialect, lower.as_str()) {
            (_, "like") => {
                let a = arity(name, args, 2)?;
                format!("({} LIKE {})", a[0], a[1])
            }
            (_, "ends") => {
                let a = arity(name, args, 2)?;
                format!("(RIGHT({},LENGTH({}))={})", a[0], a[1], a[1])
            }
            (Dialect::MySql, "starts") => {
                let a = arity(name, args, 2)?;
                format!("(INSTR({}, {})=1)", a[0], a[1])
            }
            (Dialect::MySql, "contains") => {
                let a = arity(name, args, 2)?;
                format!("(INSTR({}, {})>0)", a[0], a[1])
            }
            (Dialect::MySql, "matches") => {
                let a = arity(name, args, 2)?;
                format!("({} REGEXP CONCAT('^',{},'$'))", a[0], a[1])
            }
            (Dialect::MySql, "millisecond") => {
                format!("(MICROSECOND({})/1000)", arity(name, args, 1)?[0])
            }
            (Dialect::MySql, "datediff") => {
                let a = arity(name, args, 2)?;
                format!("DATEDIFF({}, {})", a[0], a[1])
            }
            (Dialect::MySql, part @ ("year" | "month" | "day" | "hour" | "minute" | "second" | "quarter" | "dayofweek")) => {
                format!("{}({})", part.to_ascii_uppercase(), arity(name, args, 1)?[0])
            }
            (_, "starts") => {
                let a = arity(name, args, 2)?;
                format!("(LEFT({},LENGTH({}))={})", a[0], a[1], a[1])
            }
            (_, "contains") => {
                let a = arity(name, args, 2)?;
                format!("(POSITION({} IN {})>0)", a[1], a[0])
            }
            (_, "matches") => {
                let a = arity(name, args, 2)?;
                format!("({} ~ CONCAT('^',{},'$'))", a[0], a[1])
            }
            (_, part @ ("year" | "month" | "day" | "hour" | "minute" | "quarter")) => {
                format!(
                    "(EXTRACT({} FROM {}))",
                    part.to_ascii_uppercase(),
                    arity(name, args, 1)?[0]
                )
            }
            (_, "dayofweek") => format!("(EXTRACT(DOW FROM {})+1)", arity(name, args, 1)?[0]),
            (_, "second") => format!("FLOOR(EXTRACT(SECOND FROM {}))", arity(name, args, 1)?[0]),
            (_, "millisecond") => format!(
                "(EXTRACT(MILLISECONDS FROM {})::int % 1000)",
                arity(name, args, 1)?[0]
            ),
            (_, "datediff") => {
                let a = arity(name, args, 2)?;
                format!("(DATE({}) - DATE({}))", a[0], a[1])
            }
            (_, "todate") => format!("DATE({})", arity(name, args, 1)?[0]),
            (_, "upper" | "lower") => {
                format!("{}({})", lower.to_ascii_uppercase(), arity(name, args, 1)?[0])
            }
            (_, "now") => {
                arity(name, args, 0)?;
                "NOW()".to_string()
            }
            _ => format!("{}({})", name, args.join(", ")),
        };
        Ok(out)
    }
}

/// Check the argument count of a mapped function. Only reachable with a
/// wrong count when arity checking was disabled.
fn arity<'a>(name: &str, args: &'a [String], expected: usize) -> Result<&'a [String]> {
    if args.len() == expected {
        Ok(args)
    } else {
        Err(GqlError::invalid_query(format!(
            "function '{}' takes {} argument(s), but got {}",
            name,
            expected,
            args.len()
        )))
    }
}
