//! Management request/response messages.
//!
//! Requests carry the operation in application properties:
//!
//! ```text
//! properties = { operation: READ|QUERY|DELETE, type|entityType, identity?, offset?, count? }
//! body       = { attributeNames?: [..] }                      (QUERY only)
//! ```
//!
//! Responses carry `statusCode` / `statusDescription` in properties and the
//! entity map (READ) or `{attributeNames, results}` table (QUERY) in the body.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Status description of a successful READ or QUERY.
pub const STATUS_OK: &str = "OK";

/// Status code of a successful DELETE.
pub const STATUS_NO_CONTENT: i64 = 204;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Read,
    Query,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Query => "QUERY",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub body: Value,
}

impl Request {
    pub fn read(entity_type: &str, identity: &str) -> Self {
        Self::targeted(Operation::Read, entity_type, identity)
    }

    pub fn delete(entity_type: &str, identity: &str) -> Self {
        Self::targeted(Operation::Delete, entity_type, identity)
    }

    /// One QUERY page starting at `offset`, at most `count` rows.
    pub fn query(entity_type: &str, attribute_names: &[&str], offset: usize, count: usize) -> Self {
        let mut properties = Map::new();
        properties.insert("operation".into(), json!(Operation::Query.as_str()));
        properties.insert("entityType".into(), json!(entity_type));
        properties.insert("offset".into(), json!(offset));
        properties.insert("count".into(), json!(count));
        Self {
            properties,
            body: json!({ "attributeNames": attribute_names }),
        }
    }

    fn targeted(operation: Operation, entity_type: &str, identity: &str) -> Self {
        let mut properties = Map::new();
        properties.insert("operation".into(), json!(operation.as_str()));
        properties.insert("type".into(), json!(entity_type));
        properties.insert("identity".into(), json!(identity));
        Self {
            properties,
            body: Value::Object(Map::new()),
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self.properties.get("operation")?.as_str()? {
            "READ" => Some(Operation::Read),
            "QUERY" => Some(Operation::Query),
            "DELETE" => Some(Operation::Delete),
            _ => None,
        }
    }

    pub fn identity(&self) -> Option<&str> {
        self.properties.get("identity")?.as_str()
    }

    /// `type` for READ/DELETE, `entityType` for QUERY.
    pub fn entity_type(&self) -> Option<&str> {
        self.properties
            .get("type")
            .or_else(|| self.properties.get("entityType"))?
            .as_str()
    }

    pub fn offset(&self) -> Option<u64> {
        self.properties.get("offset")?.as_u64()
    }

    pub fn count(&self) -> Option<u64> {
        self.properties.get("count")?.as_u64()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub body: Value,
}

impl Response {
    pub fn new(status_code: i64, status_description: &str, body: Value) -> Self {
        let mut properties = Map::new();
        properties.insert("statusCode".into(), json!(status_code));
        properties.insert("statusDescription".into(), json!(status_description));
        Self { properties, body }
    }

    /// `200 OK` carrying `body`.
    pub fn ok(body: Value) -> Self {
        Self::new(200, STATUS_OK, body)
    }

    pub fn no_content() -> Self {
        Self::new(STATUS_NO_CONTENT, "No Content", Value::Null)
    }

    pub fn status_code(&self) -> Option<i64> {
        self.properties.get("statusCode")?.as_i64()
    }

    pub fn status_description(&self) -> Option<&str> {
        self.properties.get("statusDescription")?.as_str()
    }

    /// Success for READ and QUERY.
    pub fn is_ok(&self) -> bool {
        self.status_description() == Some(STATUS_OK)
    }

    /// Success for DELETE.
    pub fn is_no_content(&self) -> bool {
        self.status_code() == Some(STATUS_NO_CONTENT)
    }
}
