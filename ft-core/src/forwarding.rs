//! How a routing step ended up forwarding (or not forwarding) a flow.
use std::fmt;
use std::net::Ipv4Addr;

use serde::{
    Deserialize,
    Serialize,
};

use crate::step::StepAction;

/// The forwarding decision recorded by a routing step.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ForwardingDetail {
    /// Dropped by a discard (null) route.
    Discarded,
    /// Handed to another VRF for a second lookup.
    DelegatedToNextVrf {
        /// The VRF the lookup continues in.
        next_vrf: String,
    },
    /// Sent out an interface.
    ForwardedOutInterface {
        /// Egress interface.
        output_interface: String,
        /// Address ARPed for on the egress interface, if resolved.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arp_ip: Option<Ipv4Addr>,
    },
    /// Encapsulated into a VXLAN tunnel.
    ForwardedIntoVxlanTunnel {
        /// VXLAN network identifier.
        vni: u32,
        /// Remote tunnel endpoint.
        vtep: Ipv4Addr,
    },
}

impl ForwardingDetail {
    /// The routing-step action this forwarding decision is recorded under.
    #[must_use]
    pub const fn step_action(&self) -> StepAction {
        match self {
            Self::Discarded => StepAction::NullRouted,
            Self::DelegatedToNextVrf { .. } => StepAction::ForwardedToNextVrf,
            Self::ForwardedOutInterface { .. } | Self::ForwardedIntoVxlanTunnel { .. } => StepAction::Forwarded,
        }
    }
}

impl fmt::Display for ForwardingDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discarded => f.write_str("discarded"),
            Self::DelegatedToNextVrf { next_vrf } => write!(f, "delegated to vrf {next_vrf}"),
            Self::ForwardedOutInterface { output_interface, arp_ip: Some(arp_ip) } => {
                write!(f, "forwarded out {output_interface}, arp {arp_ip}")
            },
            Self::ForwardedOutInterface { output_interface, arp_ip: None } => write!(f, "forwarded out {output_interface}"),
            Self::ForwardedIntoVxlanTunnel { vni, vtep } => write!(f, "forwarded into vxlan vni {vni} to {vtep}"),
        }
    }
}
