//! Query AST types.
//!
//! An [`Expr`] is an owned tree. Equality is structural: two trees parsed
//! from the same text compare equal, which is how `LABEL` and `FORMAT`
//! entries find the select expression they describe.

/// Literal value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    Number,
    String,
    Bool,
}

/// `DATE '...'`, `TIMEOFDAY '...'` and `DATETIME '...'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedLiteral {
    Date,
    TimeOfDay,
    DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    // Unary sign
    Pos,
    Neg,
    // Arithmetic
    Plus,
    Minus,
    Times,
    Div,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logic
    And,
    Or,
    Not,
    // Postfix null tests
    IsNull,
    IsNotNull,
    // Word operators
    Contains,
    Matches,
    Like,
    StartsWith,
    EndsWith,
}

impl Operator {
    /// Binary operators printed as `(l<op>r)` with no surrounding spaces.
    pub fn is_compact_infix(&self) -> bool {
        matches!(
            self,
            Operator::Plus
                | Operator::Minus
                | Operator::Times
                | Operator::Div
                | Operator::Eq
                | Operator::Ne
                | Operator::Lt
                | Operator::Le
                | Operator::Gt
                | Operator::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprKind {
    Literal(Literal),
    /// Data is the keyword; the single child is the string literal.
    Typed(TypedLiteral),
    /// Bare identifier, or a function call when it has arguments or `no_arg`.
    Identifier,
    Operator(Operator),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// Operator symbol, function or identifier name, or literal text.
    pub data: String,
    pub args: Vec<Expr>,
    /// Set for a call written with empty parentheses, e.g. `now()`.
    pub no_arg: bool,
}

impl Expr {
    fn leaf(kind: ExprKind, data: impl Into<String>) -> Self {
        Self {
            kind,
            data: data.into(),
            args: Vec::new(),
            no_arg: false,
        }
    }

    pub fn number(text: impl Into<String>) -> Self {
        Self::leaf(ExprKind::Literal(Literal::Number), text)
    }

    pub fn string(text: impl Into<String>) -> Self {
        Self::leaf(ExprKind::Literal(Literal::String), text)
    }

    pub fn boolean(value: bool) -> Self {
        Self::leaf(
            ExprKind::Literal(Literal::Bool),
            if value { "true" } else { "false" },
        )
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Self::leaf(ExprKind::Identifier, name)
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        let no_arg = args.is_empty();
        Self {
            kind: ExprKind::Identifier,
            data: name.into(),
            args,
            no_arg,
        }
    }

    pub fn typed(kind: TypedLiteral, keyword: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: ExprKind::Typed(kind),
            data: keyword.into(),
            args: vec![Expr::string(value)],
            no_arg: false,
        }
    }

    pub fn unary(op: Operator, symbol: impl Into<String>, operand: Expr) -> Self {
        Self {
            kind: ExprKind::Operator(op),
            data: symbol.into(),
            args: vec![operand],
            no_arg: false,
        }
    }

    pub fn binary(op: Operator, symbol: impl Into<String>, left: Expr, right: Expr) -> Self {
        Self {
            kind: ExprKind::Operator(op),
            data: symbol.into(),
            args: vec![left, right],
            no_arg: false,
        }
    }

    pub fn is_bare_identifier(&self) -> bool {
        self.kind == ExprKind::Identifier && self.args.is_empty() && !self.no_arg
    }

    pub fn is_call(&self) -> bool {
        self.kind == ExprKind::Identifier && (!self.args.is_empty() || self.no_arg)
    }

    /// True when the node is a call to one of the aggregate functions.
    pub fn is_aggregate(&self) -> bool {
        self.is_call() && is_aggregate_function(&self.data)
    }
}

pub fn is_aggregate_function(name: &str) -> bool {
    ["avg", "count", "max", "min", "sum"]
        .iter()
        .any(|f| name.eq_ignore_ascii_case(f))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpr {
    pub expr: Expr,
    pub label: Option<String>,
    pub format: Option<String>,
    pub aggregate: bool,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        let aggregate = expr.is_aggregate();
        Self {
            expr,
            label: None,
            format: None,
            aggregate,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderExpr {
    pub expr: Expr,
    pub desc: bool,
}

/// A parsed query. `limit` and `offset` use 0 for "not given".
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub select_star: bool,
    pub select: Vec<SelectExpr>,
    pub filter: Option<Expr>,
    pub group_by: Vec<String>,
    pub pivot: Vec<String>,
    pub order_by: Vec<OrderExpr>,
    pub limit: u64,
    pub offset: u64,
    pub no_format: bool,
    pub no_values: bool,
    pub extended_functions: bool,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            select_star: true,
            select: Vec::new(),
            filter: None,
            group_by: Vec::new(),
            pivot: Vec::new(),
            order_by: Vec::new(),
            limit: 0,
            offset: 0,
            no_format: false,
            no_values: false,
            extended_functions: false,
        }
    }
}

impl Query {
    pub fn has_pivot(&self) -> bool {
        !self.pivot.is_empty()
    }

    /// Number of leading result columns injected ahead of the select list.
    pub fn injected_columns(&self) -> usize {
        if self.has_pivot() {
            self.pivot.len() + self.group_by.len()
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = Expr::binary(
            Operator::Plus,
            "+",
            Expr::identifier("A"),
            Expr::identifier("B"),
        );
        let b = Expr::binary(
            Operator::Plus,
            "+",
            Expr::identifier("A"),
            Expr::identifier("B"),
        );
        assert_eq!(a, b);
        let c = Expr::binary(
            Operator::Plus,
            "+",
            Expr::identifier("A"),
            Expr::identifier("C"),
        );
        assert_ne!(a, c);
    }

    #[test]
    fn test_bare_identifier_vs_zero_arg_call() {
        let bare = Expr::identifier("now");
        let call = Expr::call("now", vec![]);
        assert!(bare.is_bare_identifier());
        assert!(call.is_call());
        assert!(call.no_arg);
        assert_ne!(bare, call);
    }

    #[test]
    fn test_aggregate_flag() {
        let sel = SelectExpr::new(Expr::call("max", vec![Expr::identifier("salary")]));
        assert!(sel.aggregate);
        let sel = SelectExpr::new(Expr::call("year", vec![Expr::identifier("hired")]));
        assert!(!sel.aggregate);
        assert!(!SelectExpr::new(Expr::identifier("max")).aggregate);
    }

    #[test]
    fn test_query_defaults() {
        let q = Query::default();
        assert!(q.select_star);
        assert_eq!(q.limit, 0);
        assert_eq!(q.injected_columns(), 0);
    }
}
