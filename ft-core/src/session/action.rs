use std::fmt;

use serde::{
    Deserialize,
    Serialize,
};

use crate::flow::NodeInterfacePair;

/// How a device treats traffic that matches a session.
///
/// A next hop can only be recorded together with the interface it sits behind, so the
/// interface is not optional on [`SessionAction::ForwardOutInterface`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum SessionAction {
    /// Accepted by the device that originated the session.
    Accept,
    /// Accepted into a VRF of the device.
    AcceptVrf {
        /// The receiving VRF.
        vrf: String,
    },
    /// Forwarded by a fresh FIB lookup.
    FibLookup,
    /// Forwarded by a FIB lookup done after the session's NAT is applied.
    PostNatFibLookup,
    /// Forwarded out a fixed interface, towards a fixed neighbor if one is known.
    ForwardOutInterface {
        /// Egress interface.
        outgoing_interface: String,
        /// Neighbor on the far side of the egress interface.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next_hop: Option<NodeInterfacePair>,
    },
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => f.write_str("accept"),
            Self::AcceptVrf { vrf } => write!(f, "accept into vrf {vrf}"),
            Self::FibLookup => f.write_str("fib lookup"),
            Self::PostNatFibLookup => f.write_str("post-nat fib lookup"),
            Self::ForwardOutInterface { outgoing_interface, next_hop: Some(next_hop) } => {
                write!(f, "forward out {outgoing_interface} to {next_hop}")
            },
            Self::ForwardOutInterface { outgoing_interface, next_hop: None } => {
                write!(f, "forward out {outgoing_interface}")
            },
        }
    }
}
