//! Data source contract and the execute pipeline.
//!
//! ```text
//! query text → parse → compile → DataSource::getdata → labels/formats
//!            → [format + pivot] | format → Response
//! ```
//!
//! Every failure is collapsed into an error [`Response`] at
//! [`Executor::execute`]; nothing partial is ever returned.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::convert::{apply_formats, strip_formatted, FormatOptions};
use super::labels::assign_labels_and_formats;
use super::pivot::pivot_table;
use super::table::{ResultTable, Response};
use crate::ast::Translator;
use crate::error::GqlError;

/// A backend that runs generated SQL and returns a raw table whose column
/// types are already mapped onto the display types.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Idempotent. Failures are observed through [`DataSource::is_connected`].
    async fn connect(&mut self);

    fn is_connected(&self) -> bool;

    async fn getdata(&self, sql: &str) -> Result<ResultTable>;
}

/// A source for dialects without a bundled driver. It never connects.
pub struct Unavailable {
    backend: String,
}

impl Unavailable {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
        }
    }
}

#[async_trait]
impl DataSource for Unavailable {
    async fn connect(&mut self) {
        warn!(backend = %self.backend, "no driver is bundled for this backend");
    }

    fn is_connected(&self) -> bool {
        false
    }

    async fn getdata(&self, _sql: &str) -> Result<ResultTable> {
        Err(GqlError::access_denied("db connection failed").into())
    }
}

/// Binds a data source to the translator configured for it.
pub struct Executor {
    source: Box<dyn DataSource>,
    translator: Translator,
}

impl Executor {
    pub fn new(source: Box<dyn DataSource>, translator: Translator) -> Self {
        Self { source, translator }
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub async fn connect(&mut self) {
        self.source.connect().await;
        if !self.source.is_connected() {
            warn!("data source is not connected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.source.is_connected()
    }

    /// Run `gql` end to end. Always yields a response carrying the wire
    /// version; failures become a single-entry error list.
    pub async fn execute(&self, gql: &str) -> Response {
        match self.run(gql).await {
            Ok(table) => Response::ok(table),
            Err(err) => {
                let err = GqlError::from_anyhow(&err);
                warn!(reason = %err.reason, message = %err.message, "query failed");
                Response::error(&err)
            }
        }
    }

    async fn run(&self, gql: &str) -> Result<ResultTable> {
        if !self.source.is_connected() {
            return Err(GqlError::access_denied("db connection failed").into());
        }

        let query = self.translator.parse(gql)?;
        debug!(query = %query, "parsed query");
        let sql = self.translator.compile(&query)?;

        let mut table = self.source.getdata(&sql).await?;
        info!(
            rows = table.rows.len(),
            cols = table.cols.len(),
            "fetched result"
        );

        assign_labels_and_formats(&mut table, &query)?;

        if query.has_pivot() {
            // pivot keys use the formatted text
            apply_formats(
                &mut table,
                FormatOptions {
                    no_values: query.no_values,
                    no_format: false,
                },
            )?;
            pivot_table(&mut table, &query)?;
            if query.no_format {
                strip_formatted(&mut table);
            }
        } else {
            apply_formats(
                &mut table,
                FormatOptions {
                    no_values: query.no_values,
                    no_format: query.no_format,
                },
            )?;
        }
        Ok(table)
    }
}
