/// Query language front end.
///
/// ```text
/// query text
///       ↓
/// Tokenizer               (token.rs)
///       ↓
/// Parser → Query AST      (parser.rs, types.rs)
///       ↓
/// Arity validation        (validate.rs)
///       ↓
/// Dialect compiler        (compiler.rs, formatter.rs for the query language itself)
///       ↓
/// SQL text → db/ execution
/// ```
pub mod compiler;
pub mod formatter;
pub mod parser;
pub mod token;
pub mod translator;
pub mod types;
pub mod validate;

pub use compiler::{compile, Dialect, TableAccess};
pub use formatter::{quote_ident, quote_string};
pub use parser::parse_query;
pub use token::{tokenize, Token, TokenKind, Tokenizer};
pub use translator::{ColumnSpec, Translation, TranslationStatus, Translator};
pub use types::*;
