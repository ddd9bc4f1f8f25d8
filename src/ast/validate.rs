/// Function arity checks applied after parsing.
///
/// Only the top-level expression of each `SELECT`, `WHERE` and `ORDER BY`
/// entry is checked. Nested calls pass through to the backend, which is what
/// lets `a and not b` appear inside a filter while `not(12)` on its own is
/// rejected.
use super::types::{Expr, Query};
use crate::error::{GqlError, Result};

/// Expected argument count for a known function or operator name. Names
/// are matched exactly, so `dayOfWeek` is known and `DAYOFWEEK` is not.
pub fn function_arity(name: &str) -> Option<usize> {
    let arity = match name {
        "year" | "month" | "day" | "hour" | "minute" | "second" | "millisecond" | "quarter"
        | "dayOfWeek" => 1,
        "dateDiff" => 2,
        "toDate" | "upper" | "lower" => 1,
        "now" => 0,
        "like" | "matches" | "contains" | "ends" | "starts" => 2,
        "and" | "or" => 2,
        "+" | "-" | "/" | "*" => 2,
        "=" | "!=" | "<>" | "<" | ">" | "<=" | ">=" => 2,
        "avg" | "count" | "max" | "min" | "sum" => 1,
        "is null" | "is not null" => 1,
        _ => return None,
    };
    Some(arity)
}

pub fn check_query(query: &Query) -> Result<()> {
    for sel in &query.select {
        check_expr(&sel.expr)?;
    }
    if let Some(filter) = &query.filter {
        check_expr(filter)?;
    }
    for order in &query.order_by {
        check_expr(&order.expr)?;
    }
    Ok(())
}

pub fn check_expr(expr: &Expr) -> Result<()> {
    if expr.args.is_empty() && !expr.no_arg {
        return Ok(());
    }

    let expected = function_arity(&expr.data).ok_or_else(|| {
        GqlError::invalid_query(format!("function '{}' is not known", expr.data))
    })?;
    if expected != expr.args.len() {
        return Err(GqlError::invalid_query(format!(
            "function '{}' takes {} argument(s), but got {}",
            expr.data,
            expected,
            expr.args.len()
        )));
    }
    Ok(())
}
