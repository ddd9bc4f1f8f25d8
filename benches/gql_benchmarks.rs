//! Benchmarks for the query pipeline.
//!
//! - tokenizing and parsing (text → Query)
//! - compiling to each dialect (Query → SQL)
//! - pivoting a raw result table
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gqlsql::ast::{compile, parse_query, tokenize, Dialect, TableAccess};
use gqlsql::db::{pivot_table, Cell, Column, ColumnType, ResultTable};

const SIMPLE: &str = "select dept, salary";

const FILTERED: &str = "select name, salary where salary > 1000 and dept = 'Eng' \
    order by salary desc limit 20";

const AGGREGATE: &str = "select dept, sum(salary), max(age) where isSenior = true \
    group by dept order by sum(salary) desc \
    label sum(salary) 'Total' format sum(salary) '#,##0.00'";

const PIVOT: &str = "select dept, sum(salary) group by dept pivot lunchTime, isSenior";

const FUNCTIONS: &str = "select year(hireDate), upper(name), \
    dateDiff(now(), hireDate) where name starts with 'A' \
    and hireDate > date '2010-01-01' options no_format";

fn inputs() -> [(&'static str, &'static str); 5] {
    [
        ("simple", SIMPLE),
        ("filtered", FILTERED),
        ("aggregate", AGGREGATE),
        ("pivot", PIVOT),
        ("functions", FUNCTIONS),
    ]
}

fn bench_tokenizing(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenizing");
    for (name, gql) in inputs() {
        group.bench_with_input(BenchmarkId::new("tokenize", name), gql, |b, gql| {
            b.iter(|| tokenize(black_box(gql)))
        });
    }
    group.finish();
}

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");
    for (name, gql) in inputs() {
        group.bench_with_input(BenchmarkId::new("parse", name), gql, |b, gql| {
            b.iter(|| parse_query(black_box(gql), false))
        });
    }
    group.finish();
}

fn bench_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("compilation");
    let allowed: Vec<String> = Vec::new();
    let access = TableAccess {
        default_table: "employees",
        allowed: &allowed,
    };
    for (name, gql) in inputs() {
        let query = match parse_query(gql, false) {
            Ok(q) => q,
            Err(_) => continue,
        };
        for dialect in [Dialect::Gql, Dialect::MySql, Dialect::PostgreSql] {
            group.bench_with_input(
                BenchmarkId::new(dialect.name(), name),
                &query,
                |b, query| b.iter(|| compile(black_box(query), dialect, &access)),
            );
        }
    }
    group.finish();
}

/// Raw rows for `PIVOT`: 4 lunch times x 2 flags x `depts` departments.
fn pivot_input(depts: usize) -> ResultTable {
    let mut table = ResultTable::new(vec![
        Column::new("lunchTime", ColumnType::String),
        Column::new("isSenior", ColumnType::Boolean),
        Column::new("dept", ColumnType::String),
        Column::new("dept", ColumnType::String),
        Column::new("sum(salary)", ColumnType::Number),
    ]);
    for d in 0..depts {
        let dept = format!("dept{}", d);
        for lunch in ["11:30", "12:00", "12:30", "13:00"] {
            for senior in [true, false] {
                table.push_row(vec![
                    Cell::new(lunch),
                    Cell::new(senior),
                    Cell::new(dept.as_str()),
                    Cell::new(dept.as_str()),
                    Cell::new((d * 100) as i64),
                ]);
            }
        }
    }
    table
}

fn bench_pivot(c: &mut Criterion) {
    let mut group = c.benchmark_group("pivot");
    let query = match parse_query(PIVOT, false) {
        Ok(q) => q,
        Err(e) => panic!("pivot query does not parse: {}", e),
    };
    for depts in [10, 100, 1000] {
        let raw = pivot_input(depts);
        group.bench_with_input(BenchmarkId::new("pivot_table", depts), &raw, |b, raw| {
            b.iter(|| {
                let mut table = raw.clone();
                pivot_table(black_box(&mut table), &query)
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_tokenizing,
    bench_parsing,
    bench_compilation,
    bench_pivot
);
criterion_main!(benches);
