/// Binding of `LABEL`/`FORMAT` clauses onto result columns.
///
/// Each declared pattern is classified into a bit mask (boolean, number,
/// date, time) and the mask together with the column's native type picks
/// the display type from a fixed decision table. Afterwards a column's
/// `column_type` is the display type and `format` keeps the native type.
use super::pattern::{has_date_fields, has_time_fields, DatePattern, NumberPattern};
use super::table::{ColumnType, ResultTable};
use crate::ast::{Query, SelectExpr};
use crate::error::{GqlError, Result};

/// Pattern meaning "no explicit pattern".
pub const GENERAL: &str = "General";

pub const BOOLEAN_PATTERN: usize = 1;
pub const NUMBER_PATTERN: usize = 2;
pub const DATE_PATTERN: usize = 4;
pub const TIME_PATTERN: usize = 8;

use ColumnType::{Boolean as B, Date as D, DateTime as DT, Number as N, String as S, TimeOfDay as T};

/// Display type by pattern mask (row) and native type (column, in
/// `ColumnType::index` order: string, boolean, number, date, timeofday,
/// datetime). Row 0 is never consulted.
const DECISION_TABLE: [[ColumnType; 6]; 16] = [
    [S, S, S, S, S, S],
    [B, B, B, B, B, B],
    [N, N, N, N, N, N],
    [B, B, B, B, B, B],
    [D, B, D, D, D, D],
    [B, B, B, B, B, B],
    [D, N, N, D, T, DT],
    [D, B, N, D, T, DT],
    [T, T, T, D, T, DT],
    [B, B, B, B, B, B],
    [T, N, N, T, T, T],
    [T, B, N, T, T, T],
    [DT, DT, DT, DT, DT, DT],
    [DT, B, DT, DT, DT, DT],
    [DT, N, N, DT, DT, DT],
    [DT, B, B, DT, DT, DT],
];

/// A boolean pattern has exactly one `:` separating the true and false text.
pub fn is_boolean_pattern(pattern: &str) -> bool {
    pattern.matches(':').count() == 1
}

/// Classify a pattern into its mask. A pattern that is none of boolean,
/// number or date/time is rejected.
pub fn classify_pattern(pattern: &str) -> Result<usize> {
    let mut mask = 0;
    if is_boolean_pattern(pattern) {
        mask |= BOOLEAN_PATTERN;
    }
    if NumberPattern::parse(pattern).is_some() {
        mask |= NUMBER_PATTERN;
    }
    if DatePattern::parse(pattern).is_some() {
        if has_date_fields(pattern) {
            mask |= DATE_PATTERN;
        }
        if has_time_fields(pattern) {
            mask |= TIME_PATTERN;
        }
    }
    if mask == 0 {
        return Err(GqlError::formatting(format!(
            "'{}' is not a valid boolean, number or date pattern",
            pattern
        )));
    }
    Ok(mask)
}

pub fn resolve_type(mask: usize, native: ColumnType) -> ColumnType {
    DECISION_TABLE[mask & 0xf][native.index()]
}

fn annotate(table: &mut ResultTable, idx: usize, sel: &SelectExpr) {
    let col = &mut table.cols[idx];
    if let Some(label) = &sel.label {
        col.label = label.clone();
    }
    if let Some(format) = &sel.format {
        col.pattern = format.clone();
    }
}

/// Attach labels and patterns from `query` to the columns of `table`, then
/// resolve every column's display type.
pub fn assign_labels_and_formats(table: &mut ResultTable, query: &Query) -> Result<()> {
    if query.select_star {
        for sel in &query.select {
            let id = sel.expr.column_id();
            let matching: Vec<usize> = table
                .cols
                .iter()
                .enumerate()
                .filter(|(_, c)| c.id == id)
                .map(|(i, _)| i)
                .collect();
            for idx in matching {
                annotate(table, idx, sel);
            }
        }
    } else {
        let offset = query.injected_columns();
        if table.cols.len() < offset + query.select.len() {
            return Err(GqlError::internal(format!(
                "result has {} columns but the query selects {}",
                table.cols.len(),
                offset + query.select.len()
            )));
        }
        for (i, sel) in query.select.iter().enumerate() {
            table.cols[offset + i].id = sel.expr.column_id();
            annotate(table, offset + i, sel);
        }
    }

    for col in &mut table.cols {
        if col.pattern.is_empty() || col.pattern == GENERAL {
            col.pattern = GENERAL.to_string();
            col.format = None;
            continue;
        }
        let mask = classify_pattern(&col.pattern)?;
        let resolved = resolve_type(mask, col.column_type);
        col.format = Some(col.column_type);
        col.column_type = resolved;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_query;
    use crate::db::table::Column;
    use crate::error::Reason;

    #[test]
    fn test_classify_patterns() {
        assert_eq!(classify_pattern("#,##0.00").unwrap(), NUMBER_PATTERN);
        assert_eq!(classify_pattern("dd-MMM-yyyy").unwrap(), DATE_PATTERN);
        assert_eq!(classify_pattern("H:mm:ss").unwrap(), TIME_PATTERN);
        assert_eq!(
            classify_pattern("yyyy-MM-dd HH:mm:ss").unwrap(),
            DATE_PATTERN | TIME_PATTERN
        );
        assert_eq!(classify_pattern("Yes!:Not yet").unwrap(), BOOLEAN_PATTERN);
        assert_eq!(
            classify_pattern("HH:mm").unwrap(),
            BOOLEAN_PATTERN | TIME_PATTERN
        );
        let err = classify_pattern("nonsense").unwrap_err();
        assert_eq!(err.reason, Reason::IllegalFormattingPatterns);
    }

    #[test]
    fn test_decision_table() {
        assert_eq!(resolve_type(NUMBER_PATTERN, ColumnType::String), ColumnType::Number);
        assert_eq!(resolve_type(DATE_PATTERN, ColumnType::Boolean), ColumnType::Boolean);
        assert_eq!(resolve_type(DATE_PATTERN, ColumnType::Number), ColumnType::Date);
        assert_eq!(
            resolve_type(DATE_PATTERN | NUMBER_PATTERN, ColumnType::DateTime),
            ColumnType::DateTime
        );
        assert_eq!(resolve_type(TIME_PATTERN, ColumnType::Date), ColumnType::Date);
        assert_eq!(
            resolve_type(DATE_PATTERN | TIME_PATTERN, ColumnType::String),
            ColumnType::DateTime
        );
        assert_eq!(
            resolve_type(BOOLEAN_PATTERN | TIME_PATTERN, ColumnType::TimeOfDay),
            ColumnType::Boolean
        );
    }

    fn raw_table() -> ResultTable {
        ResultTable::new(vec![
            Column::new("dept", ColumnType::String),
            Column::new("salary", ColumnType::Number),
            Column::new("hired", ColumnType::Date),
        ])
    }

    #[test]
    fn test_explicit_select_assignment() {
        let q = parse_query(
            "select dept, salary*2, hired label dept 'Department' format salary*2 '#,##0', hired 'MMM yyyy'",
            false,
        )
        .unwrap();
        let mut table = raw_table();
        assign_labels_and_formats(&mut table, &q).unwrap();

        assert_eq!(table.cols[0].label, "Department");
        assert_eq!(table.cols[0].pattern, GENERAL);
        assert_eq!(table.cols[0].format, None);

        assert_eq!(table.cols[1].id, "(salary*2)");
        assert_eq!(table.cols[1].column_type, ColumnType::Number);
        assert_eq!(table.cols[1].format, Some(ColumnType::Number));

        assert_eq!(table.cols[2].column_type, ColumnType::Date);
        assert_eq!(table.cols[2].pattern, "MMM yyyy");
        assert_eq!(table.cols[2].format, Some(ColumnType::Date));
    }

    #[test]
    fn test_select_star_assignment_by_id() {
        let q = parse_query("select * label hired 'Hired' format dept '0.0'", false).unwrap();
        let mut table = raw_table();
        assign_labels_and_formats(&mut table, &q).unwrap();
        assert_eq!(table.cols[2].label, "Hired");
        assert_eq!(table.cols[0].column_type, ColumnType::Number);
        assert_eq!(table.cols[0].format, Some(ColumnType::String));
        assert_eq!(table.cols[1].pattern, GENERAL);
    }

    #[test]
    fn test_pivot_offsets_assignment() {
        let q = parse_query(
            "select sum(salary) group by dept pivot hired label sum(salary) 'Total'",
            false,
        )
        .unwrap();
        let mut table = ResultTable::new(vec![
            Column::new("hired", ColumnType::Date),
            Column::new("dept", ColumnType::String),
            Column::new("sum", ColumnType::Number),
        ]);
        assign_labels_and_formats(&mut table, &q).unwrap();
        assert_eq!(table.cols[0].id, "hired");
        assert_eq!(table.cols[2].id, "sum(salary)");
        assert_eq!(table.cols[2].label, "Total");
    }

    #[test]
    fn test_short_result_is_internal_error() {
        let q = parse_query("select a, b, c, d", false).unwrap();
        let mut table = raw_table();
        let err = assign_labels_and_formats(&mut table, &q).unwrap_err();
        assert_eq!(err.reason, Reason::InternalError);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let q = parse_query("select dept format dept 'bogus'", false).unwrap();
        let mut table = raw_table();
        let err = assign_labels_and_formats(&mut table, &q).unwrap_err();
        assert_eq!(err.reason, Reason::IllegalFormattingPatterns);
    }
}
