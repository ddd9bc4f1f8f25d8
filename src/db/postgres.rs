//! PostgreSQL data source.
//!
//! The statement is prepared once to learn the result column types, then run
//! through the simple query protocol so every value arrives as text. Text is
//! mapped onto the display types: dates and timestamps become epoch
//! milliseconds, times become milliseconds since midnight.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use postgres_native_tls::MakeTlsConnector;
use std::time::Duration;
use tokio_postgres::types::Type;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, error, info, warn};

use super::config::{ConnectionConfig, SslMode};
use super::source::DataSource;
use super::table::{Cell, Column, ColumnType, ResultTable, Value};
use crate::error::GqlError;

pub struct PostgresSource {
    config: ConnectionConfig,
    client: Option<Client>,
}

impl PostgresSource {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }
}

#[async_trait]
impl DataSource for PostgresSource {
    async fn connect(&mut self) {
        if self.client.is_some() {
            return;
        }
        match create_client(&self.config).await {
            Ok(client) => {
                info!(db = %self.config.display_string(), "connected to PostgreSQL");
                self.client = Some(client);
            }
            Err(e) => {
                warn!(db = %self.config.display_string(), error = %format!("{:#}", e), "connection failed");
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    async fn getdata(&self, sql: &str) -> Result<ResultTable> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| GqlError::access_denied("db connection failed"))?;

        let statement = client.prepare(sql).await?;
        let types: Vec<Type> = statement
            .columns()
            .iter()
            .map(|c| c.type_().clone())
            .collect();
        let mut table = ResultTable::new(
            statement
                .columns()
                .iter()
                .map(|c| Column::new(c.name(), column_type(c.type_())))
                .collect(),
        );

        for message in client.simple_query(sql).await? {
            if let SimpleQueryMessage::Row(row) = message {
                let mut cells = Vec::with_capacity(types.len());
                for (idx, ty) in types.iter().enumerate() {
                    let cell = match row.try_get(idx)? {
                        Some(text) => Cell::new(parse_text(ty, text)),
                        None => Cell::null(),
                    };
                    cells.push(cell);
                }
                table.push_row(cells);
            }
        }
        debug!(rows = table.rows.len(), "PostgreSQL query finished");
        Ok(table)
    }
}

/// Display type for a PostgreSQL column type.
pub fn column_type(ty: &Type) -> ColumnType {
    match *ty {
        Type::BOOL => ColumnType::Boolean,
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => ColumnType::Number,
        Type::FLOAT4 | Type::FLOAT8 | Type::NUMERIC => ColumnType::Number,
        Type::DATE => ColumnType::Date,
        Type::TIMESTAMP | Type::TIMESTAMPTZ => ColumnType::DateTime,
        Type::TIME => ColumnType::TimeOfDay,
        _ => ColumnType::String,
    }
}

/// Convert a text-protocol value. Values that do not parse (`infinity`, BC
/// dates, ...) are kept as text.
pub fn parse_text(ty: &Type, text: &str) -> Value {
    let parsed = match *ty {
        Type::BOOL => match text {
            "t" => Some(Value::Bool(true)),
            "f" => Some(Value::Bool(false)),
            _ => None,
        },
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => text.parse::<i64>().ok().map(Value::Int),
        Type::FLOAT4 | Type::FLOAT8 | Type::NUMERIC => text.parse::<f64>().ok().map(Value::Float),
        Type::DATE => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(|d| Value::Int(d.and_time(NaiveTime::MIN).and_utc().timestamp_millis())),
        Type::TIMESTAMP => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .map(|dt| Value::Int(dt.and_utc().timestamp_millis())),
        Type::TIMESTAMPTZ => DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z")
            .ok()
            .map(|dt| Value::Int(dt.timestamp_millis())),
        Type::TIME => NaiveTime::parse_from_str(text, "%H:%M:%S%.f").ok().map(|t| {
            let ms = i64::from(t.num_seconds_from_midnight()) * 1000
                + i64::from(t.nanosecond() / 1_000_000);
            Value::Int(ms)
        }),
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::String(text.to_string()))
}

/// Connect with a 15s timeout, spawning the connection driver task.
pub async fn create_client(config: &ConnectionConfig) -> Result<Client> {
    let conn_string = config.connection_string();
    let timeout = Duration::from_secs(15);

    let client = match config.ssl_mode {
        SslMode::Disable => {
            let (client, connection) =
                tokio::time::timeout(timeout, tokio_postgres::connect(&conn_string, NoTls))
                    .await
                    .map_err(|_| anyhow::anyhow!("Connection timed out after 15s"))?
                    .context("Failed to connect to PostgreSQL")?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });
            client
        }
        SslMode::Prefer | SslMode::Require => {
            let tls = build_tls_connector(config)?;
            let (client, connection) =
                tokio::time::timeout(timeout, tokio_postgres::connect(&conn_string, tls))
                    .await
                    .map_err(|_| anyhow::anyhow!("Connection timed out after 15s"))?
                    .context("Failed to connect to PostgreSQL")?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });
            client
        }
    };

    Ok(client)
}

fn build_tls_connector(config: &ConnectionConfig) -> Result<MakeTlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();
    if config.accept_invalid_certs {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }
    let connector = builder.build().context("Failed to build TLS connector")?;
    Ok(MakeTlsConnector::new(connector))
}
