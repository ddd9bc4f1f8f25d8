//! Error taxonomy shared by every stage of the query pipeline.
//!
//! Each stage returns [`Result`] and propagates with `?`; the error is turned
//! into the wire `errors` list exactly once, at the execute boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of error reasons understood by visualization clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    NotModified,
    UserNotAuthenticated,
    UnknownDataSourceId,
    AccessDenied,
    UnsupportedQueryOperation,
    InvalidQuery,
    InvalidRequest,
    InternalError,
    NotSupported,
    IllegalFormattingPatterns,
    Other,
    /// Never surfaced intentionally.
    Undefined,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::NotModified => "not_modified",
            Reason::UserNotAuthenticated => "user_not_authenticated",
            Reason::UnknownDataSourceId => "unknown_data_source_id",
            Reason::AccessDenied => "access_denied",
            Reason::UnsupportedQueryOperation => "unsupported_query_operation",
            Reason::InvalidQuery => "invalid_query",
            Reason::InvalidRequest => "invalid_request",
            Reason::InternalError => "internal_error",
            Reason::NotSupported => "not_supported",
            Reason::IllegalFormattingPatterns => "illegal_formatting_patterns",
            Reason::Other => "other",
            Reason::Undefined => "undefined",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error carrying a reason code, a message and, for syntax errors, the
/// 1-based position in the query text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{reason}: {message}")]
pub struct GqlError {
    pub reason: Reason,
    pub message: String,
    pub position: Option<usize>,
}

impl GqlError {
    pub fn new(reason: Reason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            position: None,
        }
    }

    /// Syntax error at `pos`; the message is prefixed with the position.
    pub fn syntax(pos: usize, message: impl AsRef<str>) -> Self {
        Self {
            reason: Reason::InvalidQuery,
            message: format!("pos {}: {}", pos, message.as_ref()),
            position: Some(pos),
        }
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::new(Reason::InvalidQuery, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(Reason::AccessDenied, message)
    }

    pub fn formatting(message: impl Into<String>) -> Self {
        Self::new(Reason::IllegalFormattingPatterns, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Reason::InternalError, message)
    }

    /// Recover the reason code from an arbitrary error. Errors that do not
    /// carry one are reported as `invalid_request`.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<GqlError>() {
            Some(e) => e.clone(),
            None => Self::new(Reason::InvalidRequest, format!("{:#}", err)),
        }
    }
}

pub type Result<T> = std::result::Result<T, GqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_spelling() {
        assert_eq!(Reason::IllegalFormattingPatterns.to_string(), "illegal_formatting_patterns");
        assert_eq!(
            serde_json::to_string(&Reason::UnknownDataSourceId).unwrap(),
            "\"unknown_data_source_id\""
        );
        let parsed: Reason = serde_json::from_str("\"access_denied\"").unwrap();
        assert_eq!(parsed, Reason::AccessDenied);
    }

    #[test]
    fn test_syntax_error_display() {
        let err = GqlError::syntax(19, "unexpected token '*'");
        assert_eq!(err.position, Some(19));
        assert_eq!(err.message, "pos 19: unexpected token '*'");
        assert_eq!(err.to_string(), "invalid_query: pos 19: unexpected token '*'");
    }

    #[test]
    fn test_from_anyhow_keeps_reason() {
        let err: anyhow::Error = GqlError::access_denied("db connection failed").into();
        let back = GqlError::from_anyhow(&err);
        assert_eq!(back.reason, Reason::AccessDenied);

        let other = anyhow::anyhow!("socket closed");
        let wrapped = GqlError::from_anyhow(&other);
        assert_eq!(wrapped.reason, Reason::InvalidRequest);
        assert_eq!(wrapped.message, "socket closed");
    }
}
