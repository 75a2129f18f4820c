//! qdials-mgmt: router management IO boundary.
//! Provides the request/response message model, channel and connector traits,
//! the paginated management client, and a newline-delimited JSON transport.
//! No scrubbing logic lives here.

pub mod channel;
pub mod client;
pub mod error;
pub mod json_line;
pub mod message;

pub use channel::{Connector, ManagementChannel, MgmtTarget};
pub use client::{AttributeMap, MAX_BATCH, MgmtClient, QueryRows};
pub use error::MgmtError;
pub use json_line::{JsonLineChannel, JsonLineConnector};
pub use message::{Operation, Request, Response};
