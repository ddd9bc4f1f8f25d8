/// Query-language printer.
///
/// Turns a parsed [`Query`] back into canonical query-language text: upper
/// case clause keywords, every compound expression parenthesized, identifiers
/// back-quoted only when they would not re-tokenize as themselves. Printing,
/// re-parsing and printing again yields the same text.
use std::fmt;

use super::token::{is_id_char, keyword};
use super::types::*;

/// Back-quote an identifier when it is empty, a keyword, starts with a digit
/// or contains characters outside `[A-Za-z0-9_]`.
pub fn quote_ident(name: &str) -> String {
    let plain = !name.is_empty()
        && keyword(&name.to_ascii_lowercase()).is_none()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(is_id_char);
    if plain {
        name.to_string()
    } else {
        format!("`{}`", name)
    }
}

/// Single quotes unless the text itself contains one.
pub fn quote_string(text: &str) -> String {
    if text.contains('\'') {
        format!("\"{}\"", text)
    } else {
        format!("'{}'", text)
    }
}

fn wrap(parens: bool, inner: String) -> String {
    if parens {
        format!("({})", inner)
    } else {
        inner
    }
}

impl Expr {
    /// Print the expression. `parens` controls whether the outermost
    /// operator is wrapped; nested operators always are.
    pub fn to_gql(&self, parens: bool) -> String {
        match self.kind {
            ExprKind::Literal(Literal::String) => quote_string(&self.data),
            ExprKind::Literal(_) => self.data.clone(),
            ExprKind::Typed(_) => {
                let value = self.args.first().map(|a| a.to_gql(true)).unwrap_or_default();
                format!("{} {}", self.data, value)
            }
            ExprKind::Identifier => {
                let mut out = quote_ident(&self.data);
                if self.is_call() {
                    let args: Vec<String> = self.args.iter().map(|a| a.to_gql(false)).collect();
                    out.push('(');
                    out.push_str(&args.join(", "));
                    out.push(')');
                }
                out
            }
            ExprKind::Operator(op) => self.operator_to_gql(op, parens),
        }
    }

    fn operator_to_gql(&self, op: Operator, parens: bool) -> String {
        let arg = |i: usize| {
            self.args
                .get(i)
                .map(|a| a.to_gql(true))
                .unwrap_or_default()
        };
        match op {
            Operator::Pos => self.args.first().map(|a| a.to_gql(parens)).unwrap_or_default(),
            Operator::Neg => wrap(parens, format!("-{}", arg(0))),
            Operator::Not => wrap(parens, format!("not {}", arg(0))),
            Operator::IsNull => wrap(parens, format!("{} is null", arg(0))),
            Operator::IsNotNull => wrap(parens, format!("{} is not null", arg(0))),
            Operator::And | Operator::Or => {
                wrap(parens, format!("{} {} {}", arg(0), self.data, arg(1)))
            }
            Operator::StartsWith | Operator::EndsWith => {
                wrap(parens, format!("{} {} with {}", arg(0), self.data, arg(1)))
            }
            Operator::Contains | Operator::Matches | Operator::Like => {
                wrap(parens, format!("{} {} {}", arg(0), self.data, arg(1)))
            }
            _ => wrap(parens, format!("{}{}{}", arg(0), self.data, arg(1))),
        }
    }

    /// Result column id for this expression: the bare name of an identifier,
    /// otherwise its printed text.
    pub fn column_id(&self) -> String {
        if self.is_bare_identifier() {
            self.data.clone()
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_gql(true))
    }
}

fn join_idents(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.select_star {
            f.write_str("SELECT *")?;
        } else {
            let items: Vec<String> = self.select.iter().map(|s| s.expr.to_string()).collect();
            write!(f, "SELECT {}", items.join(", "))?;
        }

        if let Some(filter) = &self.filter {
            write!(f, " WHERE {}", filter)?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY {}", join_idents(&self.group_by))?;
        }
        if !self.pivot.is_empty() {
            write!(f, " PIVOT {}", join_idents(&self.pivot))?;
        }
        if !self.order_by.is_empty() {
            let items: Vec<String> = self
                .order_by
                .iter()
                .map(|o| {
                    if o.desc {
                        format!("{} DESC", o.expr)
                    } else {
                        o.expr.to_string()
                    }
                })
                .collect();
            write!(f, " ORDER BY {}", items.join(", "))?;
        }
        if self.limit != 0 {
            write!(f, " LIMIT {}", self.limit)?;
        }
        if self.offset != 0 {
            write!(f, " OFFSET {}", self.offset)?;
        }

        let labels: Vec<String> = self
            .select
            .iter()
            .filter_map(|s| {
                s.label
                    .as_ref()
                    .map(|l| format!("{} {}", s.expr, quote_string(l)))
            })
            .collect();
        if !labels.is_empty() {
            write!(f, " LABEL {}", labels.join(", "))?;
        }

        let formats: Vec<String> = self
            .select
            .iter()
            .filter_map(|s| {
                s.format
                    .as_ref()
                    .map(|p| format!("{} {}", s.expr, quote_string(p)))
            })
            .collect();
        if !formats.is_empty() {
            write!(f, " FORMAT {}", formats.join(", "))?;
        }

        let mut options = Vec::new();
        if self.no_format {
            options.push("no_format");
        }
        if self.no_values {
            options.push("no_values");
        }
        if !options.is_empty() {
            write!(f, " OPTIONS {}", options.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_query;

    fn print(input: &str) -> String {
        parse_query(input, false)
            .unwrap_or_else(|e| panic!("{:?}: {}", input, e))
            .to_string()
    }

    fn assert_round_trip(input: &str, expected: &str) {
        let printed = print(input);
        assert_eq!(printed, expected);
        assert_eq!(print(&printed), expected, "reprinting {:?}", printed);
    }

    #[test]
    fn test_print_arithmetic() {
        assert_round_trip(
            "select 2 * (max(empSalary) / max(empTax)) where id<20",
            "SELECT (2*(max(empSalary)/max(empTax))) WHERE (id<20)",
        );
    }

    #[test]
    fn test_print_functions() {
        assert_round_trip(
            "select upper(name), year(startDate)",
            "SELECT upper(name), year(startDate)",
        );
        assert_round_trip(
            "select * Where year(asd)>2000",
            "SELECT * WHERE (year(asd)>2000)",
        );
        assert_round_trip(
            "select year(a),month(a),day(a),(hour(a)*60+minute(a))*60+second(a),millisecond(a),quarter(a),dayOfWeek(a)",
            "SELECT year(a), month(a), day(a), ((((hour(a)*60)+minute(a))*60)+second(a)), millisecond(a), quarter(a), dayOfWeek(a)",
        );
    }

    #[test]
    fn test_print_labels() {
        assert_round_trip(
            "select A,B+C LABEL A 'hello',B+C 'there'",
            "SELECT A, (B+C) LABEL A 'hello', (B+C) 'there'",
        );
        assert_round_trip(
            "LABEL A 'hello',B 'there'",
            "SELECT * LABEL A 'hello', B 'there'",
        );
    }

    #[test]
    fn test_print_every_clause() {
        assert_round_trip(
            "select * where name <= 'm' and `A B` > 12 and not d < date \"1980-01-01\" \
             group by `9i`, ``, `a.o` pivot abc, def order by max(A), B/a+4*CCD limit 6 offset 9 \
             label A 'hello', B 'there' format A+B '###000', `c c` 'yy-dd' options no_values",
            "SELECT * WHERE (((name<='m') and (`A B`>12)) and (not (d<date '1980-01-01'))) \
             GROUP BY `9i`, ``, `a.o` PIVOT abc, def ORDER BY max(A), ((B/a)+(4*CCD)) \
             LIMIT 6 OFFSET 9 LABEL A 'hello', B 'there' FORMAT (A+B) '###000', `c c` 'yy-dd' \
             OPTIONS no_values",
        );
    }

    #[test]
    fn test_print_group_and_pivot() {
        assert_round_trip(
            "SELECT last,max(xx) GROUP by last PIVOT dept",
            "SELECT last, max(xx) GROUP BY last PIVOT dept",
        );
    }

    #[test]
    fn test_print_word_operators() {
        assert_round_trip(
            "select * where name starts with 'J' and x is not null or y contains \"it's\"",
            "SELECT * WHERE (((name starts with 'J') and (x is not null)) or (y contains \"it's\"))",
        );
        assert_round_trip(
            "select x = -a, y = +b, true where c = false",
            "SELECT (x=(-a)), (y=b), true WHERE (c=false)",
        );
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("name"), "name");
        assert_eq!(quote_ident(""), "``");
        assert_eq!(quote_ident("9i"), "`9i`");
        assert_eq!(quote_ident("a.o"), "`a.o`");
        assert_eq!(quote_ident("Date"), "`Date`");
        assert_eq!(quote_ident("select"), "`select`");
    }

    #[test]
    fn test_column_id() {
        let q = parse_query("select dept, sum(salary)", false).unwrap();
        assert_eq!(q.select[0].expr.column_id(), "dept");
        assert_eq!(q.select[1].expr.column_id(), "sum(salary)");
    }
}
