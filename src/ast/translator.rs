/// Query translation front end.
///
/// A [`Translator`] holds the per-data-source settings (target dialect,
/// default table, reachable tables, extended-functions mode) and turns query
/// text into SQL, either as a `Result` or as a self-describing
/// [`Translation`] record.
use tracing::debug;

use super::compiler::{compile, Dialect, TableAccess};
use super::parser::parse_query;
use super::types::Query;
use crate::error::{GqlError, Reason, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationStatus {
    Ok,
    SyntaxError,
    AccessDenied,
    Error,
}

/// Column descriptor derived from the select list.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub id: String,
    pub label: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Translation {
    pub dialect: Dialect,
    pub status: TranslationStatus,
    pub gql: String,
    pub sql: String,
    pub error: Option<GqlError>,
    pub columns: Vec<ColumnSpec>,
}

impl Translation {
    pub fn is_ok(&self) -> bool {
        self.status == TranslationStatus::Ok
    }
}

#[derive(Debug, Clone)]
pub struct Translator {
    pub dialect: Dialect,
    pub default_table: String,
    pub allowed_tables: Vec<String>,
    pub extended_functions: bool,
}

impl Translator {
    pub fn new(dialect: Dialect, default_table: impl Into<String>) -> Self {
        Self {
            dialect,
            default_table: default_table.into(),
            allowed_tables: Vec::new(),
            extended_functions: false,
        }
    }

    pub fn with_tables(mut self, tables: Vec<String>) -> Self {
        self.allowed_tables = tables;
        self
    }

    pub fn with_extended_functions(mut self, extended: bool) -> Self {
        self.extended_functions = extended;
        self
    }

    pub fn parse(&self, gql: &str) -> Result<Query> {
        parse_query(gql, self.extended_functions)
    }

    pub fn compile(&self, query: &Query) -> Result<String> {
        let access = TableAccess {
            default_table: &self.default_table,
            allowed: &self.allowed_tables,
        };
        let sql = compile(query, self.dialect, &access)?;
        debug!(dialect = %self.dialect, %sql, "compiled query");
        Ok(sql)
    }

    /// Parse and compile in one step, reporting failures in the record
    /// instead of returning them.
    pub fn translate(&self, gql: &str) -> Translation {
        let mut out = Translation {
            dialect: self.dialect,
            status: TranslationStatus::Ok,
            gql: gql.to_string(),
            sql: String::new(),
            error: None,
            columns: Vec::new(),
        };

        let query = match self.parse(gql) {
            Ok(q) => q,
            Err(e) => {
                out.status = TranslationStatus::SyntaxError;
                out.error = Some(e);
                return out;
            }
        };

        out.columns = query
            .select
            .iter()
            .map(|s| ColumnSpec {
                id: s.expr.column_id(),
                label: s.label.clone(),
                format: s.format.clone(),
            })
            .collect();

        match self.compile(&query) {
            Ok(sql) => out.sql = sql,
            Err(e) => {
                out.status = match e.reason {
                    Reason::AccessDenied => TranslationStatus::AccessDenied,
                    _ => TranslationStatus::Error,
                };
                out.error = Some(e);
            }
        }
        out
    }
}
