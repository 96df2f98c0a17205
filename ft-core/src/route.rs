//! Candidate routes matched during a routing step.
use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::{
    required,
    ModelError,
    ModelResult,
};

/// The protocol a route was learned from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoutingProtocol {
    /// Aggregate route.
    Aggregate,
    /// External BGP.
    Bgp,
    /// Directly connected subnet.
    Connected,
    /// Internal BGP.
    Ibgp,
    /// IS-IS level 1.
    IsisL1,
    /// IS-IS level 2.
    IsisL2,
    /// Host route for an interface address.
    Local,
    /// OSPF intra-area.
    Ospf,
    /// OSPF inter-area.
    OspfIa,
    /// OSPF external type 1.
    OspfE1,
    /// OSPF external type 2.
    OspfE2,
    /// Statically configured.
    Static,
}

impl fmt::Display for RoutingProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Aggregate => "aggregate",
            Self::Bgp => "bgp",
            Self::Connected => "connected",
            Self::Ibgp => "ibgp",
            Self::IsisL1 => "isisL1",
            Self::IsisL2 => "isisL2",
            Self::Local => "local",
            Self::Ospf => "ospf",
            Self::OspfIa => "ospfIa",
            Self::OspfE1 => "ospfE1",
            Self::OspfE2 => "ospfE2",
            Self::Static => "static",
        };
        f.write_str(name)
    }
}

/// Where a route sends matching traffic.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum NextHop {
    /// Drop the traffic.
    Discard,
    /// Out an interface, optionally towards a gateway address on it.
    Interface {
        /// Egress interface.
        interface: String,
        /// Gateway on the interface's subnet, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ip: Option<Ipv4Addr>,
    },
    /// Towards an address that must itself be resolved.
    Ip {
        /// The next-hop address.
        ip: Ipv4Addr,
    },
    /// Look the destination up again in another VRF.
    Vrf {
        /// The VRF to delegate to.
        vrf: String,
    },
    /// Into a VXLAN tunnel.
    Vtep {
        /// VXLAN network identifier.
        vni: u32,
        /// Remote tunnel endpoint.
        vtep: Ipv4Addr,
    },
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discard => f.write_str("discard"),
            Self::Interface { interface, ip: Some(ip) } => write!(f, "interface {interface} ip {ip}"),
            Self::Interface { interface, ip: None } => write!(f, "interface {interface}"),
            Self::Ip { ip } => write!(f, "ip {ip}"),
            Self::Vrf { vrf } => write!(f, "vrf {vrf}"),
            Self::Vtep { vni, vtep } => write!(f, "vni {vni} vtep {vtep}"),
        }
    }
}

/// A route that matched the flow's destination.
///
/// `next_hop_ip` and `next_vrf` are derived from `next_hop` once, at construction. Routes order
/// by protocol, prefix, admin distance, metric and next hop, which is the order ECMP sets are
/// presented in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RouteInfoRecord", rename_all = "camelCase")]
pub struct RouteInfo {
    protocol: RoutingProtocol,
    network: Ipv4Network,
    next_hop: NextHop,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_hop_ip: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_vrf: Option<String>,
    admin_distance: u32,
    metric: u64,
}

impl RouteInfo {
    /// Creates a route, deriving its next-hop address and next VRF.
    #[must_use]
    pub fn new(
        protocol: RoutingProtocol,
        network: Ipv4Network,
        next_hop: NextHop,
        admin_distance: u32,
        metric: u64,
    ) -> Self {
        let next_hop_ip = match &next_hop {
            NextHop::Interface { ip, .. } => *ip,
            NextHop::Ip { ip } => Some(*ip),
            NextHop::Discard | NextHop::Vrf { .. } | NextHop::Vtep { .. } => None,
        };
        let next_vrf = match &next_hop {
            NextHop::Vrf { vrf } => Some(vrf.clone()),
            _ => None,
        };
        Self { protocol, network, next_hop, next_hop_ip, next_vrf, admin_distance, metric }
    }

    /// Source protocol.
    #[must_use]
    pub const fn protocol(&self) -> RoutingProtocol {
        self.protocol
    }

    /// Matched prefix.
    #[must_use]
    pub const fn network(&self) -> Ipv4Network {
        self.network
    }

    /// Next hop as configured or learned.
    #[must_use]
    pub const fn next_hop(&self) -> &NextHop {
        &self.next_hop
    }

    /// Next-hop address, when the next hop names one.
    #[must_use]
    pub const fn next_hop_ip(&self) -> Option<Ipv4Addr> {
        self.next_hop_ip
    }

    /// VRF the lookup is delegated to, when the next hop is a VRF.
    #[must_use]
    pub fn next_vrf(&self) -> Option<&str> {
        self.next_vrf.as_deref()
    }

    /// Administrative distance.
    #[must_use]
    pub const fn admin_distance(&self) -> u32 {
        self.admin_distance
    }

    /// Protocol metric.
    #[must_use]
    pub const fn metric(&self) -> u64 {
        self.metric
    }
}

impl Ord for RouteInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.protocol
            .cmp(&other.protocol)
            .then(self.network.cmp(&other.network))
            .then(self.admin_distance.cmp(&other.admin_distance))
            .then(self.metric.cmp(&other.metric))
            .then_with(|| self.next_hop.cmp(&other.next_hop))
    }
}

impl PartialOrd for RouteInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RouteInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} via {} [{}/{}]",
            self.protocol, self.network, self.next_hop, self.admin_distance, self.metric
        )
    }
}

/// Wire form of [`RouteInfo`]; the derived fields are recomputed rather than trusted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteInfoRecord {
    protocol: Option<RoutingProtocol>,
    network: Option<Ipv4Network>,
    next_hop: Option<NextHop>,
    admin_distance: Option<u32>,
    metric: Option<u64>,
}

impl TryFrom<RouteInfoRecord> for RouteInfo {
    type Error = ModelError;

    fn try_from(record: RouteInfoRecord) -> ModelResult<Self> {
        const KIND: &str = "RouteInfo";
        Ok(Self::new(
            required(record.protocol, KIND, "protocol")?,
            required(record.network, KIND, "network")?,
            required(record.next_hop, KIND, "nextHop")?,
            required(record.admin_distance, KIND, "adminDistance")?,
            required(record.metric, KIND, "metric")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    fn prefix(s: &str) -> Ipv4Network {
        s.parse().unwrap()
    }

    #[rstest]
    #[case(NextHop::Ip { ip: Ipv4Addr::new(1, 1, 1, 1) }, Some(Ipv4Addr::new(1, 1, 1, 1)), None)]
    #[case(NextHop::Interface { interface: "eth0".into(), ip: None }, None, None)]
    #[case(NextHop::Vrf { vrf: "blue".into() }, None, Some("blue"))]
    #[case(NextHop::Discard, None, None)]
    fn test_derived_fields(#[case] next_hop: NextHop, #[case] ip: Option<Ipv4Addr>, #[case] vrf: Option<&str>) {
        let route = RouteInfo::new(RoutingProtocol::Static, prefix("10.0.0.0/8"), next_hop, 1, 0);
        assert_eq!(route.next_hop_ip(), ip);
        assert_eq!(route.next_vrf(), vrf);
    }

    #[rstest]
    fn test_route_order() {
        let a = RouteInfo::new(RoutingProtocol::Bgp, prefix("10.0.0.0/8"), NextHop::Ip { ip: [2, 2, 2, 2].into() }, 20, 0);
        let b = RouteInfo::new(RoutingProtocol::Bgp, prefix("10.0.0.0/8"), NextHop::Ip { ip: [1, 1, 1, 1].into() }, 20, 0);
        let c = RouteInfo::new(RoutingProtocol::Bgp, prefix("10.0.0.0/8"), NextHop::Ip { ip: [0, 0, 0, 1].into() }, 20, 5);
        let d = RouteInfo::new(RoutingProtocol::Static, prefix("0.0.0.0/0"), NextHop::Discard, 1, 0);
        let mut routes = vec![d.clone(), c.clone(), a.clone(), b.clone()];
        routes.sort();
        assert_eq!(routes, vec![b, a, c, d]);
    }

    #[rstest]
    fn test_decode_recomputes_derived_fields() {
        let route: RouteInfo = serde_json::from_str(
            r#"{"protocol":"ospfE2","network":"10.1.0.0/16","nextHop":{"type":"Ip","ip":"10.0.0.2"},
                "nextHopIp":"9.9.9.9","adminDistance":110,"metric":20}"#,
        )
        .unwrap();
        assert_eq!(route.next_hop_ip(), Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(route.to_string(), "ospfE2 10.1.0.0/16 via ip 10.0.0.2 [110/20]");
    }
}
