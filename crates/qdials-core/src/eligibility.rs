//! Two-generation debounce for idle autolinks.
//!
//! An inbound link observed idle in one cycle is only a candidate. It is
//! confirmed for deletion when the very next successful cycle observes it idle
//! again:
//!
//! ```text
//! confirmed = previous ∩ current
//! previous := current
//! ```
//!
//! The baseline is always replaced, never merged, so no stale history
//! survives more than one cycle. A failed cycle calls [`EligibilityTracker::reset`].

use std::collections::HashSet;

/// `(identity, address)` pair naming an inbound link under observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateKey {
    pub identity: String,
    pub address: String,
}

impl CandidateKey {
    pub fn new(identity: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            address: address.into(),
        }
    }
}

/// Holds the previous cycle's idle observations.
#[derive(Debug, Clone, Default)]
pub struct EligibilityTracker {
    previous: HashSet<CandidateKey>,
}

impl EligibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vote with this cycle's idle observations.
    ///
    /// Returns the keys idle in both the previous and the current cycle,
    /// sorted for a stable deletion order, and replaces the baseline with
    /// `current`.
    pub fn advance(&mut self, current: HashSet<CandidateKey>) -> Vec<CandidateKey> {
        let mut confirmed: Vec<CandidateKey> =
            self.previous.intersection(&current).cloned().collect();
        confirmed.sort();
        self.previous = current;
        confirmed
    }

    /// Forget all observations. Used when a cycle's view of the router is unknown.
    pub fn reset(&mut self) {
        self.previous.clear();
    }

    pub fn previous(&self) -> &HashSet<CandidateKey> {
        &self.previous
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[(&str, &str)]) -> HashSet<CandidateKey> {
        keys.iter().map(|(i, a)| CandidateKey::new(*i, *a)).collect()
    }

    #[test]
    fn single_observation_never_confirms() {
        let mut tracker = EligibilityTracker::new();
        let confirmed = tracker.advance(set(&[("id1", "addr1")]));
        assert!(confirmed.is_empty(), "first idle sighting is only a candidate");
        assert_eq!(tracker.previous().len(), 1);
    }

    #[test]
    fn two_consecutive_observations_confirm() {
        let mut tracker = EligibilityTracker::new();
        tracker.advance(set(&[("id1", "addr1"), ("id2", "addr2")]));
        let confirmed = tracker.advance(set(&[("id1", "addr1")]));
        assert_eq!(confirmed, vec![CandidateKey::new("id1", "addr1")]);
    }

    #[test]
    fn baseline_is_replaced_not_merged() {
        let mut tracker = EligibilityTracker::new();
        tracker.advance(set(&[("id1", "addr1")]));
        // id1 busy this cycle
        assert!(tracker.advance(set(&[("id2", "addr2")])).is_empty());
        // id1 idle again: count restarts, no deletion yet
        let confirmed = tracker.advance(set(&[("id1", "addr1"), ("id2", "addr2")]));
        assert_eq!(confirmed, vec![CandidateKey::new("id2", "addr2")]);
        assert_eq!(tracker.previous(), &set(&[("id1", "addr1"), ("id2", "addr2")]));
    }

    #[test]
    fn baseline_is_observations_not_confirmed() {
        let mut tracker = EligibilityTracker::new();
        tracker.advance(set(&[("id1", "addr1")]));
        tracker.advance(set(&[("id1", "addr1"), ("id3", "addr3")]));
        assert_eq!(tracker.previous().len(), 2);
    }

    #[test]
    fn reset_discards_history() {
        let mut tracker = EligibilityTracker::new();
        tracker.advance(set(&[("id1", "addr1")]));
        tracker.reset();
        assert!(tracker.is_empty());
        assert!(tracker.advance(set(&[("id1", "addr1")])).is_empty());
    }

    #[test]
    fn same_identity_different_address_is_distinct() {
        let mut tracker = EligibilityTracker::new();
        tracker.advance(set(&[("id1", "addr1")]));
        assert!(tracker.advance(set(&[("id1", "addr9")])).is_empty());
    }

    #[test]
    fn confirmed_is_sorted() {
        let mut tracker = EligibilityTracker::new();
        let keys = set(&[("b", "x"), ("a", "y"), ("c", "z")]);
        tracker.advance(keys.clone());
        let confirmed = tracker.advance(keys);
        let ids: Vec<&str> = confirmed.iter().map(|k| k.identity.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
