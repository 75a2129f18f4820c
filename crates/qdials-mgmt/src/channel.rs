//! Channel and connector traits plus management endpoint addressing.
//! The traits are the mock-injection seam for tests.

use std::fmt;

use crate::error::MgmtError;
use crate::message::{Request, Response};

/// A blocking request/response exchange with one management endpoint.
///
/// Implementations own their timeout: `call` must return (with
/// [`MgmtError::Transport`]) rather than block forever.
pub trait ManagementChannel: Send {
    fn call(&mut self, request: &Request) -> Result<Response, MgmtError>;

    /// Release the underlying connection. Must be idempotent.
    fn close(&mut self) {}
}

impl<T: ManagementChannel + ?Sized> ManagementChannel for Box<T> {
    fn call(&mut self, request: &Request) -> Result<Response, MgmtError> {
        (**self).call(request)
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// Opens a fresh management channel. Called once per poll cycle.
pub trait Connector: Send + Sync {
    type Channel: ManagementChannel;

    fn connect(&self) -> Result<Self::Channel, MgmtError>;
}

impl<T: Connector + ?Sized> Connector for &T {
    type Channel = T::Channel;

    fn connect(&self) -> Result<Self::Channel, MgmtError> {
        (**self).connect()
    }
}

/// Which router's management agent to talk to.
///
/// A remote router or edge router is reached through the directly connected
/// router acting as a proxy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MgmtTarget {
    #[default]
    Local,
    Router(String),
    Edge(String),
}

impl MgmtTarget {
    /// Build from optional router/edge ids. Returns `None` when both are set.
    pub fn from_ids(router_id: Option<String>, edge_id: Option<String>) -> Option<Self> {
        match (router_id, edge_id) {
            (Some(_), Some(_)) => None,
            (Some(router), None) => Some(Self::Router(router)),
            (None, Some(edge)) => Some(Self::Edge(edge)),
            (None, None) => Some(Self::Local),
        }
    }

    /// Management node address to send requests to.
    pub fn address(&self) -> String {
        match self {
            Self::Local => "$management".to_string(),
            Self::Router(id) => format!("_topo/0/{id}/$management"),
            Self::Edge(id) => format!("_edge/{id}/$management"),
        }
    }
}

impl fmt::Display for MgmtTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_address() {
        assert_eq!(MgmtTarget::Local.address(), "$management");
    }

    #[test]
    fn router_address() {
        let target = MgmtTarget::from_ids(Some("R2".into()), None).expect("valid");
        assert_eq!(target.address(), "_topo/0/R2/$management");
    }

    #[test]
    fn edge_address() {
        let target = MgmtTarget::from_ids(None, Some("E1".into())).expect("valid");
        assert_eq!(target.to_string(), "_edge/E1/$management");
    }

    #[test]
    fn router_and_edge_are_exclusive() {
        assert_eq!(MgmtTarget::from_ids(Some("R".into()), Some("E".into())), None);
        assert_eq!(MgmtTarget::from_ids(None, None), Some(MgmtTarget::Local));
    }

    #[test]
    fn boxed_channel_forwards() {
        struct Echo;
        impl ManagementChannel for Echo {
            fn call(&mut self, _request: &Request) -> Result<Response, MgmtError> {
                Ok(Response::no_content())
            }
        }
        let mut boxed: Box<dyn ManagementChannel> = Box::new(Echo);
        let resp = boxed.call(&Request::delete("t", "i")).expect("ok");
        assert!(resp.is_no_content());
    }
}
