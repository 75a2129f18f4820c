//! Error types for record parsing.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("malformed record: field `{field}` {detail}")]
    MalformedRecord { field: &'static str, detail: String },
}

impl CoreError {
    pub(crate) fn missing(field: &'static str) -> Self {
        Self::MalformedRecord {
            field,
            detail: "is missing".to_string(),
        }
    }

    pub(crate) fn invalid(field: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedRecord {
            field,
            detail: detail.into(),
        }
    }
}
