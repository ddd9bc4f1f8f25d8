//! Pivot engine.
//!
//! The compiler puts the `PIVOT` columns first and the `GROUP BY` columns
//! next in every row. Pivoting turns each distinct pivot key into its own
//! copy of every remaining non-group column and folds the rows of a group
//! into one output row.

use std::collections::{HashMap, HashSet};

use super::table::{Cell, Column, ResultTable, Row};
use crate::ast::Query;
use crate::error::{GqlError, Result};

/// Comma-joined text of the leading `n` cells.
fn pivot_key(row: &Row, n: usize) -> String {
    row.c[..n]
        .iter()
        .map(Cell::text)
        .collect::<Vec<_>>()
        .join(",")
}

/// Reshape `table` in place according to the query's `PIVOT` clause.
pub fn pivot_table(table: &mut ResultTable, query: &Query) -> Result<()> {
    let n_pivot = query.pivot.len();
    let group_end = n_pivot + query.group_by.len();
    if table.cols.len() < group_end {
        return Err(GqlError::internal(format!(
            "pivot needs {} leading columns but the result has {}",
            group_end,
            table.cols.len()
        )));
    }
    table.check_shape()?;

    // Distinct pivot keys by first appearance.
    let mut keys: Vec<String> = Vec::new();
    let mut stride: HashMap<String, usize> = HashMap::new();
    for row in &table.rows {
        let key = pivot_key(row, n_pivot);
        if !stride.contains_key(&key) {
            stride.insert(key.clone(), keys.len());
            keys.push(key);
        }
    }
    let width = keys.len();

    let group_ids: HashSet<&str> = query.group_by.iter().map(String::as_str).collect();
    let source = &table.cols[group_end..];
    let is_group: Vec<bool> = source
        .iter()
        .map(|c| group_ids.contains(c.id.as_str()))
        .collect();

    let mut cols: Vec<Column> = Vec::new();
    for (col, &group) in source.iter().zip(&is_group) {
        if group {
            cols.push(col.clone());
            continue;
        }
        for key in &keys {
            let mut pivoted = col.clone();
            pivoted.id = format!("{} {}", key, col.id);
            pivoted.label = format!("{} {}", key, col.title());
            cols.push(pivoted);
        }
    }

    let mut row_of_group: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<Row> = Vec::new();
    for row in &table.rows {
        let group_key: String = row.c[n_pivot..group_end]
            .iter()
            .map(|c| format!("\t{}", c.text()))
            .collect();

        let out = match row_of_group.get(&group_key) {
            Some(&i) => i,
            None => {
                let mut cells = Vec::with_capacity(cols.len());
                for (cell, &group) in row.c[group_end..].iter().zip(&is_group) {
                    if group {
                        cells.push(cell.clone());
                    } else {
                        cells.extend(std::iter::repeat(Cell::null()).take(width));
                    }
                }
                rows.push(Row::new(cells));
                row_of_group.insert(group_key, rows.len() - 1);
                rows.len() - 1
            }
        };

        let offset = stride
            .get(&pivot_key(row, n_pivot))
            .copied()
            .unwrap_or_default();
        let mut index = 0;
        for (cell, &group) in row.c[group_end..].iter().zip(&is_group) {
            if group {
                index += 1;
            } else {
                rows[out].c[index + offset] = cell.clone();
                index += width;
            }
        }
    }

    table.cols = cols;
    table.rows = rows;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_query;
    use crate::db::table::{ColumnType, Value};

    /// Rows as the compiler lays them out for
    /// `select dept, sum(salary), min(age) group by dept pivot lunchTime`.
    fn lunch_table() -> ResultTable {
        let mut t = ResultTable::new(vec![
            Column::new("lunchTime", ColumnType::String),
            Column::new("dept", ColumnType::String),
            Column::new("dept", ColumnType::String),
            Column::new("sum(salary)", ColumnType::Number),
            Column::new("min(age)", ColumnType::Number),
        ]);
        let rows = [
            ("12:00", "Eng", 100, 30),
            ("13:00", "Eng", 200, 35),
            ("12:00", "Sales", 50, 40),
            ("13:00", "Marketing", 80, 25),
        ];
        for (lunch, dept, salary, age) in rows {
            t.push_row(vec![
                Cell::new(lunch),
                Cell::new(dept),
                Cell::new(dept),
                Cell::new(salary as i64),
                Cell::new(age as i64),
            ]);
        }
        t
    }

    #[test]
    fn test_pivot_shape() {
        let q = parse_query(
            "select dept, sum(salary), min(age) group by dept pivot lunchTime",
            false,
        )
        .unwrap();
        let mut t = lunch_table();
        pivot_table(&mut t, &q).unwrap();

        let ids: Vec<&str> = t.cols.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "dept",
                "12:00 sum(salary)",
                "13:00 sum(salary)",
                "12:00 min(age)",
                "13:00 min(age)",
            ]
        );
        // group columns + non-group columns * distinct keys
        assert_eq!(t.cols.len(), 1 + 2 * 2);
        assert_eq!(t.rows.len(), 3);
        assert!(t.check_shape().is_ok());
    }

    #[test]
    fn test_pivot_placement() {
        let q = parse_query(
            "select dept, sum(salary), min(age) group by dept pivot lunchTime",
            false,
        )
        .unwrap();
        let mut t = lunch_table();
        pivot_table(&mut t, &q).unwrap();

        let eng = &t.rows[0].c;
        assert_eq!(eng[0].v, Some(Value::from("Eng")));
        assert_eq!(eng[1].v, Some(Value::Int(100)));
        assert_eq!(eng[2].v, Some(Value::Int(200)));
        assert_eq!(eng[3].v, Some(Value::Int(30)));
        assert_eq!(eng[4].v, Some(Value::Int(35)));

        let sales = &t.rows[1].c;
        assert_eq!(sales[0].v, Some(Value::from("Sales")));
        assert_eq!(sales[1].v, Some(Value::Int(50)));
        assert!(sales[2].is_null());
        assert!(sales[4].is_null());

        let marketing = &t.rows[2].c;
        assert!(marketing[1].is_null());
        assert_eq!(marketing[2].v, Some(Value::Int(80)));
    }

    #[test]
    fn test_pivot_two_group_columns() {
        let q = parse_query(
            "select dept, isSenior, sum(salary) group by dept, isSenior pivot lunchTime",
            false,
        )
        .unwrap();
        let mut t = ResultTable::new(vec![
            Column::new("lunchTime", ColumnType::String),
            Column::new("dept", ColumnType::String),
            Column::new("isSenior", ColumnType::Boolean),
            Column::new("dept", ColumnType::String),
            Column::new("isSenior", ColumnType::Boolean),
            Column::new("sum(salary)", ColumnType::Number),
        ]);
        let rows = [
            ("12:00", "Eng", true, 100),
            ("13:00", "Eng", true, 200),
            ("12:00", "Eng", false, 50),
            ("13:00", "Sales", false, 80),
            ("13:00", "Eng", false, 60),
        ];
        for (lunch, dept, senior, salary) in rows {
            t.push_row(vec![
                Cell::new(lunch),
                Cell::new(dept),
                Cell::new(senior),
                Cell::new(dept),
                Cell::new(senior),
                Cell::new(salary as i64),
            ]);
        }
        pivot_table(&mut t, &q).unwrap();

        let ids: Vec<&str> = t.cols.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["dept", "isSenior", "12:00 sum(salary)", "13:00 sum(salary)"]
        );
        // (Eng, true), (Eng, false), (Sales, false)
        assert_eq!(t.rows.len(), 3);

        let senior_eng = &t.rows[0].c;
        assert_eq!(senior_eng[0].v, Some(Value::from("Eng")));
        assert_eq!(senior_eng[1].v, Some(Value::Bool(true)));
        assert_eq!(senior_eng[2].v, Some(Value::Int(100)));
        assert_eq!(senior_eng[3].v, Some(Value::Int(200)));

        let junior_eng = &t.rows[1].c;
        assert_eq!(junior_eng[0].v, Some(Value::from("Eng")));
        assert_eq!(junior_eng[1].v, Some(Value::Bool(false)));
        assert_eq!(junior_eng[2].v, Some(Value::Int(50)));
        assert_eq!(junior_eng[3].v, Some(Value::Int(60)));

        let sales = &t.rows[2].c;
        assert_eq!(sales[0].v, Some(Value::from("Sales")));
        assert_eq!(sales[1].v, Some(Value::Bool(false)));
        assert!(sales[2].is_null());
        assert_eq!(sales[3].v, Some(Value::Int(80)));
    }

    #[test]
    fn test_pivot_labels_use_title() {
        let q = parse_query("select sum(salary) pivot dept", false).unwrap();
        let mut sum = Column::new("sum(salary)", ColumnType::Number);
        sum.label = "Total".to_string();
        let mut t = ResultTable::new(vec![Column::new("dept", ColumnType::String), sum]);
        t.push_row(vec![Cell::new("Eng"), Cell::new(10i64)]);
        t.push_row(vec![Cell::new("Sales"), Cell::new(20i64)]);
        pivot_table(&mut t, &q).unwrap();

        assert_eq!(t.cols.len(), 2);
        assert_eq!(t.cols[0].id, "Eng sum(salary)");
        assert_eq!(t.cols[0].label, "Eng Total");
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.rows[0].c[1].v, Some(Value::Int(20)));
    }

    #[test]
    fn test_pivot_key_prefers_formatted_value() {
        let q = parse_query("select sum(salary) pivot isSenior, dept", false).unwrap();
        let mut t = ResultTable::new(vec![
            Column::new("isSenior", ColumnType::Boolean),
            Column::new("dept", ColumnType::String),
            Column::new("sum(salary)", ColumnType::Number),
        ]);
        t.push_row(vec![
            Cell {
                v: Some(Value::Bool(true)),
                f: Some("Yes".into()),
            },
            Cell::new("Eng"),
            Cell::new(10i64),
        ]);
        pivot_table(&mut t, &q).unwrap();
        assert_eq!(t.cols[0].id, "Yes,Eng sum(salary)");
    }

    #[test]
    fn test_pivot_empty_result() {
        let q = parse_query("select dept, sum(salary) group by dept pivot x", false).unwrap();
        let mut t = ResultTable::new(vec![
            Column::new("x", ColumnType::String),
            Column::new("dept", ColumnType::String),
            Column::new("dept", ColumnType::String),
            Column::new("sum(salary)", ColumnType::Number),
        ]);
        pivot_table(&mut t, &q).unwrap();
        assert_eq!(t.cols.len(), 1);
        assert!(t.rows.is_empty());
    }
}
