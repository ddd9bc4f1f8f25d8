pub mod ast;
pub mod cgi;
pub mod db;
pub mod error;
pub mod export;

pub use ast::{Dialect, Query, Translation, Translator};
pub use db::{ConnectionConfig, DataSource, Executor, Response, ResultTable};
pub use error::{GqlError, Reason, Result};
