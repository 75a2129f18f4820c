//! Typed views over raw management attribute maps.
//!
//! QUERY rows and READ bodies arrive as `serde_json` maps keyed by attribute
//! name. The constructors here validate each required field and fail with
//! [`CoreError::MalformedRecord`] instead of guessing.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::CoreError;

/// Entity type of configured autolinks.
pub const AUTOLINK_TYPE: &str = "org.apache.qpid.dispatch.router.config.autoLink";

/// Entity type of live router addresses (usage statistics).
pub const ADDRESS_TYPE: &str = "org.apache.qpid.dispatch.router.address";

/// Attribute projection requested when querying autolinks.
pub const AUTOLINK_ATTRIBUTES: [&str; 4] = ["identity", "address", "direction", "phase"];

/// Direction of an autolink relative to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Messages flow into the router (`in`).
    Inbound,
    /// Messages are delivered out of the router (`out`).
    Outbound,
}

impl Direction {
    /// Parse the router's `in` / `out` strings, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("in") {
            Some(Self::Inbound)
        } else if raw.eq_ignore_ascii_case("out") {
            Some(Self::Outbound)
        } else {
            None
        }
    }
}

/// Router-internal key of the queue backing `address` in `phase`.
///
/// ```text
/// phase 0, "addr1" -> "M0addr1"
/// ```
pub fn queue_key(phase: u32, address: &str) -> String {
    format!("M{phase}{address}")
}

/// One configured autolink binding, as returned by a QUERY row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub identity: String,
    pub address: String,
    pub direction: Direction,
    pub phase: u32,
}

impl LinkRecord {
    /// Build a record from a QUERY row map, validating every required field.
    pub fn from_attributes(attrs: &Map<String, Value>) -> Result<Self, CoreError> {
        let identity = require_str(attrs, "identity")?;
        let address = require_str(attrs, "address")?;
        let raw_direction = require_str(attrs, "direction")?;
        let direction = Direction::parse(&raw_direction).ok_or_else(|| {
            CoreError::invalid("direction", format!("has unknown value {raw_direction:?}"))
        })?;
        let phase = require_phase(attrs)?;

        Ok(Self {
            identity,
            address,
            direction,
            phase,
        })
    }

    /// Key used to READ live usage for this link's address.
    pub fn queue_key(&self) -> String {
        queue_key(self.phase, &self.address)
    }

    pub fn is_inbound(&self) -> bool {
        self.direction == Direction::Inbound
    }
}

/// Live subscriber statistics of one router address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressUsage {
    pub subscriber_count: u64,
    pub remote_count: u64,
}

impl AddressUsage {
    pub fn from_attributes(attrs: &Map<String, Value>) -> Result<Self, CoreError> {
        Ok(Self {
            subscriber_count: require_count(attrs, "subscriberCount")?,
            remote_count: require_count(attrs, "remoteCount")?,
        })
    }

    pub fn total_usage(&self) -> u64 {
        self.subscriber_count.saturating_add(self.remote_count)
    }

    pub fn is_idle(&self) -> bool {
        self.total_usage() == 0
    }
}

/// Outbound autolink identity per address, rebuilt every cycle.
///
/// When several outbound links share an address the last one seen wins.
#[derive(Debug, Clone, Default)]
pub struct OutboundIndex {
    by_address: HashMap<String, String>,
}

impl OutboundIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: &LinkRecord) {
        self.by_address
            .insert(record.address.clone(), record.identity.clone());
    }

    pub fn get(&self, address: &str) -> Option<&str> {
        self.by_address.get(address).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

fn require_str(attrs: &Map<String, Value>, field: &'static str) -> Result<String, CoreError> {
    match attrs.get(field) {
        None | Some(Value::Null) => Err(CoreError::missing(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(CoreError::invalid(
            field,
            format!("must be a string, got {other}"),
        )),
    }
}

// Phase is normally an integer but some router versions report it as a string.
fn require_phase(attrs: &Map<String, Value>) -> Result<u32, CoreError> {
    let invalid = |v: &Value| CoreError::invalid("phase", format!("must be a small integer, got {v}"));
    match attrs.get("phase") {
        None | Some(Value::Null) => Err(CoreError::missing("phase")),
        Some(v @ Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| invalid(v)),
        Some(v @ Value::String(s)) => s.trim().parse::<u32>().map_err(|_| invalid(v)),
        Some(v) => Err(invalid(v)),
    }
}

fn require_count(attrs: &Map<String, Value>, field: &'static str) -> Result<u64, CoreError> {
    match attrs.get(field) {
        None | Some(Value::Null) => Err(CoreError::missing(field)),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            CoreError::invalid(field, format!("must be a non-negative integer, got {n}"))
        }),
        Some(other) => Err(CoreError::invalid(
            field,
            format!("must be a non-negative integer, got {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("test fixture must be an object"),
        }
    }

    #[test]
    fn parse_inbound_link() {
        let row = attrs(json!({
            "identity": "id1",
            "address": "addr1",
            "direction": "in",
            "phase": 0,
        }));
        let link = LinkRecord::from_attributes(&row).expect("should parse");
        assert_eq!(link.identity, "id1");
        assert_eq!(link.address, "addr1");
        assert_eq!(link.direction, Direction::Inbound);
        assert!(link.is_inbound());
        assert_eq!(link.queue_key(), "M0addr1");
    }

    #[test]
    fn direction_is_case_insensitive() {
        assert_eq!(Direction::parse("IN"), Some(Direction::Inbound));
        assert_eq!(Direction::parse("Out"), Some(Direction::Outbound));
        assert_eq!(Direction::parse("both"), None);
    }

    #[test]
    fn queue_key_uses_phase() {
        let row = attrs(json!({
            "identity": "id2",
            "address": "orders",
            "direction": "out",
            "phase": 1,
        }));
        let link = LinkRecord::from_attributes(&row).expect("should parse");
        assert_eq!(link.direction, Direction::Outbound);
        assert_eq!(link.queue_key(), "M1orders");
    }

    #[test]
    fn phase_as_string_is_accepted() {
        let row = attrs(json!({
            "identity": "id3",
            "address": "a",
            "direction": "in",
            "phase": "2",
        }));
        let link = LinkRecord::from_attributes(&row).expect("should parse");
        assert_eq!(link.phase, 2);
    }

    #[test]
    fn missing_identity_is_malformed() {
        let row = attrs(json!({"address": "a", "direction": "in", "phase": 0}));
        let err = LinkRecord::from_attributes(&row).unwrap_err();
        assert_eq!(
            err,
            CoreError::MalformedRecord {
                field: "identity",
                detail: "is missing".to_string()
            }
        );
    }

    #[test]
    fn null_address_is_malformed() {
        let row = attrs(json!({"identity": "x", "address": null, "direction": "in", "phase": 0}));
        let err = LinkRecord::from_attributes(&row).unwrap_err();
        assert!(matches!(
            err,
            CoreError::MalformedRecord {
                field: "address",
                ..
            }
        ));
    }

    #[test]
    fn unknown_direction_is_malformed() {
        let row = attrs(json!({"identity": "x", "address": "a", "direction": "sideways", "phase": 0}));
        let err = LinkRecord::from_attributes(&row).unwrap_err();
        assert!(err.to_string().contains("direction"), "{err}");
    }

    #[test]
    fn negative_phase_is_malformed() {
        let row = attrs(json!({"identity": "x", "address": "a", "direction": "in", "phase": -1}));
        assert!(LinkRecord::from_attributes(&row).is_err());
    }

    #[test]
    fn usage_idle_only_when_both_zero() {
        let idle = AddressUsage::from_attributes(&attrs(json!({
            "subscriberCount": 0,
            "remoteCount": 0,
        })))
        .expect("should parse");
        assert!(idle.is_idle());

        let remote = AddressUsage::from_attributes(&attrs(json!({
            "subscriberCount": 0,
            "remoteCount": 2,
        })))
        .expect("should parse");
        assert_eq!(remote.total_usage(), 2);
        assert!(!remote.is_idle());
    }

    #[test]
    fn usage_missing_count_is_malformed() {
        let err = AddressUsage::from_attributes(&attrs(json!({"subscriberCount": 0}))).unwrap_err();
        assert!(matches!(
            err,
            CoreError::MalformedRecord {
                field: "remoteCount",
                ..
            }
        ));
    }

    #[test]
    fn outbound_index_last_wins() {
        let mut index = OutboundIndex::new();
        assert!(index.is_empty());
        for id in ["o1", "o2"] {
            index.insert(&LinkRecord {
                identity: id.to_string(),
                address: "addr1".to_string(),
                direction: Direction::Outbound,
                phase: 0,
            });
        }
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("addr1"), Some("o2"));
        assert_eq!(index.get("addr2"), None);
    }
}
