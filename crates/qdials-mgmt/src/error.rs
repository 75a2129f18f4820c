//! Error types for management operations.

use thiserror::Error;

use crate::message::Operation;

#[derive(Debug, Error)]
pub enum MgmtError {
    /// Connection refused, broken or timed out.
    #[error("management transport failed: {0}")]
    Transport(String),

    /// The router answered with a non-success status.
    #[error("management {operation} failed: {status_code} {status_description}")]
    Operation {
        operation: Operation,
        status_code: i64,
        status_description: String,
    },

    /// A success response whose body is not shaped as documented.
    #[error("malformed management response: {0}")]
    MalformedResponse(String),

    #[error("management io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MgmtError {
    /// True for failures of the channel itself rather than of one operation.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Io(_))
    }
}
