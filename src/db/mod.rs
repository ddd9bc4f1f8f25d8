/// Result-table pipeline.
///
/// ```text
/// SQL text
///       ↓
/// DataSource::getdata      (source.rs, postgres.rs)
///       ↓
/// Label/format assignment  (labels.rs, pattern.rs)
///       ↓
/// Format conversion        (convert.rs)
///       ↓
/// Pivot                    (pivot.rs)
///       ↓
/// Response                 (table.rs)
/// ```
pub mod config;
pub mod convert;
pub mod labels;
pub mod pattern;
pub mod pivot;
pub mod postgres;
pub mod source;
pub mod table;

pub use config::{split_tables, Backend, ConnectionConfig, SslMode};
pub use convert::{apply_formats, FormatOptions};
pub use labels::assign_labels_and_formats;
pub use pivot::pivot_table;
pub use postgres::PostgresSource;
pub use source::{DataSource, Executor, Unavailable};
pub use table::*;

/// Data source for a configuration. Backends without a bundled driver can
/// still translate but never connect.
pub fn open_source(config: &ConnectionConfig) -> Box<dyn DataSource> {
    match config.backend {
        Backend::Postgresql => Box::new(PostgresSource::new(config.clone())),
        Backend::Mysql | Backend::Mariadb => Box::new(Unavailable::new("mysql")),
    }
}
