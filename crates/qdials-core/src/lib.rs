//! qdials-core: autolink record model and idle-link debounce.
//! Pure logic only. Management IO lives in `qdials-mgmt`.

pub mod eligibility;
pub mod error;
pub mod record;

pub use eligibility::{CandidateKey, EligibilityTracker};
pub use error::CoreError;
pub use record::{
    ADDRESS_TYPE, AUTOLINK_ATTRIBUTES, AUTOLINK_TYPE, AddressUsage, Direction, LinkRecord,
    OutboundIndex, queue_key,
};
