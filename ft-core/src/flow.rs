//! Flows, devices, dispositions and field-level flow diffs.
use std::fmt;
use std::net::Ipv4Addr;

use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::{
    ensure,
    required,
    ModelError,
    ModelResult,
};

/// VRF a flow enters when neither an ingress interface nor an ingress VRF is given.
pub const DEFAULT_VRF: &str = "default";

/// ICMP echo-request type; its return traffic is an echo reply.
const ICMP_ECHO_REQUEST: u8 = 8;
/// ICMP echo-reply type.
const ICMP_ECHO_REPLY: u8 = 0;

/// A device identity.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Node {
    /// Hostname of the device.
    pub name: String,
}

impl Node {
    /// Creates a node with the given hostname.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// An interface on a specific device.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeInterfacePair {
    /// Hostname of the device.
    pub hostname: String,
    /// Interface name on that device.
    pub interface: String,
}

impl NodeInterfacePair {
    /// Names `interface` on `hostname`.
    #[must_use]
    pub fn new(hostname: impl Into<String>, interface: impl Into<String>) -> Self {
        Self { hostname: hostname.into(), interface: interface.into() }
    }
}

impl fmt::Display for NodeInterfacePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.hostname, self.interface)
    }
}

/// IP protocols a flow may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IpProtocol {
    /// Transmission Control Protocol.
    Tcp,
    /// User Datagram Protocol.
    Udp,
    /// Stream Control Transmission Protocol.
    Sctp,
    /// Internet Control Message Protocol.
    Icmp,
    /// Generic Routing Encapsulation.
    Gre,
    /// IPsec Encapsulating Security Payload.
    Esp,
    /// IPsec Authentication Header.
    Ah,
    /// Open Shortest Path First.
    Ospf,
}

impl IpProtocol {
    /// Whether flows of this protocol carry source/destination ports.
    #[must_use]
    pub const fn has_ports(self) -> bool {
        matches!(self, Self::Tcp | Self::Udp | Self::Sctp)
    }

    /// Whether a stateful device can set up a session for flows of this protocol.
    #[must_use]
    pub const fn supports_sessions(self) -> bool {
        matches!(self, Self::Tcp | Self::Udp | Self::Icmp)
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Sctp => "SCTP",
            Self::Icmp => "ICMP",
            Self::Gre => "GRE",
            Self::Esp => "ESP",
            Self::Ah => "AH",
            Self::Ospf => "OSPF",
        };
        f.write_str(name)
    }
}

/// An immutable description of a simulated packet and where it enters the network.
///
/// A flow enters either through an interface or from a VRF on the ingress node (never both);
/// ports are present exactly when the protocol carries them, and ICMP type/code exactly when the
/// protocol is ICMP.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "FlowRecord", rename_all = "camelCase")]
pub struct Flow {
    ingress_node: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ingress_interface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ingress_vrf: Option<String>,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    ip_protocol: IpProtocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    src_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dst_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icmp_type: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icmp_code: Option<u8>,
}

impl Flow {
    /// Starts building a flow entering the network at `ingress_node`.
    #[must_use]
    pub fn builder(ingress_node: impl Into<String>) -> FlowBuilder {
        FlowBuilder { ingress_node: Some(ingress_node.into()), ..FlowBuilder::default() }
    }

    /// Hostname of the device where the flow starts.
    #[must_use]
    pub fn ingress_node(&self) -> &str {
        &self.ingress_node
    }

    /// Interface the flow enters through, if it enters from the wire.
    #[must_use]
    pub fn ingress_interface(&self) -> Option<&str> {
        self.ingress_interface.as_deref()
    }

    /// VRF the flow originates from, if it is originated by the device itself.
    #[must_use]
    pub fn ingress_vrf(&self) -> Option<&str> {
        self.ingress_vrf.as_deref()
    }

    /// Source address.
    #[must_use]
    pub const fn src_ip(&self) -> Ipv4Addr {
        self.src_ip
    }

    /// Destination address.
    #[must_use]
    pub const fn dst_ip(&self) -> Ipv4Addr {
        self.dst_ip
    }

    /// IP protocol.
    #[must_use]
    pub const fn ip_protocol(&self) -> IpProtocol {
        self.ip_protocol
    }

    /// Source port, for protocols that have ports.
    #[must_use]
    pub const fn src_port(&self) -> Option<u16> {
        self.src_port
    }

    /// Destination port, for protocols that have ports.
    #[must_use]
    pub const fn dst_port(&self) -> Option<u16> {
        self.dst_port
    }

    /// ICMP type, for ICMP flows.
    #[must_use]
    pub const fn icmp_type(&self) -> Option<u8> {
        self.icmp_type
    }

    /// ICMP code, for ICMP flows.
    #[must_use]
    pub const fn icmp_code(&self) -> Option<u8> {
        self.icmp_code
    }

    /// The return flow of this flow as seen at `node`, originating from `vrf`.
    ///
    /// Addresses and ports are swapped; an ICMP echo request becomes an echo reply.
    #[must_use]
    pub fn reverse(&self, node: &str, vrf: &str) -> Self {
        let (icmp_type, icmp_code) = match self.icmp_type {
            Some(ICMP_ECHO_REQUEST) => (Some(ICMP_ECHO_REPLY), Some(0)),
            other => (other, self.icmp_code),
        };
        Self {
            ingress_node: node.to_owned(),
            ingress_interface: None,
            ingress_vrf: Some(vrf.to_owned()),
            src_ip: self.dst_ip,
            dst_ip: self.src_ip,
            ip_protocol: self.ip_protocol,
            src_port: self.dst_port,
            dst_port: self.src_port,
            icmp_type,
            icmp_code,
        }
    }

    /// Copy of this flow with the header rewritten; used by NAT evaluation.
    pub(crate) fn with_header(
        &self,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        src_port: Option<u16>,
        dst_port: Option<u16>,
    ) -> Self {
        Self { src_ip, dst_ip, src_port, dst_port, ..self.clone() }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "start={}", self.ingress_node)?;
        if let Some(iface) = &self.ingress_interface {
            write!(f, " interface={iface}")?;
        } else if let Some(vrf) = &self.ingress_vrf {
            write!(f, " vrf={vrf}")?;
        }
        write!(f, " [{}", self.src_ip)?;
        if let Some(port) = self.src_port {
            write!(f, ":{port}")?;
        }
        write!(f, "->{}", self.dst_ip)?;
        if let Some(port) = self.dst_port {
            write!(f, ":{port}")?;
        }
        write!(f, " {}", self.ip_protocol)?;
        if let (Some(ty), Some(code)) = (self.icmp_type, self.icmp_code) {
            write!(f, " (type={ty}, code={code})")?;
        }
        f.write_str("]")
    }
}

/// Builder for [`Flow`]; [`FlowBuilder::build`] checks the header invariants.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowBuilder {
    ingress_node: Option<String>,
    ingress_interface: Option<String>,
    ingress_vrf: Option<String>,
    src_ip: Option<Ipv4Addr>,
    dst_ip: Option<Ipv4Addr>,
    ip_protocol: Option<IpProtocol>,
    src_port: Option<u16>,
    dst_port: Option<u16>,
    icmp_type: Option<u8>,
    icmp_code: Option<u8>,
}

/// Wire form of a [`Flow`]; identical fields, all optional until validated.
type FlowRecord = FlowBuilder;

impl FlowBuilder {
    /// The flow enters through this interface.
    #[must_use]
    pub fn ingress_interface(mut self, iface: impl Into<String>) -> Self {
        self.ingress_interface = Some(iface.into());
        self
    }

    /// The flow is originated by the device from this VRF.
    #[must_use]
    pub fn ingress_vrf(mut self, vrf: impl Into<String>) -> Self {
        self.ingress_vrf = Some(vrf.into());
        self
    }

    /// Source address.
    #[must_use]
    pub const fn src_ip(mut self, ip: Ipv4Addr) -> Self {
        self.src_ip = Some(ip);
        self
    }

    /// Destination address.
    #[must_use]
    pub const fn dst_ip(mut self, ip: Ipv4Addr) -> Self {
        self.dst_ip = Some(ip);
        self
    }

    /// IP protocol without ports (e.g. GRE or OSPF).
    #[must_use]
    pub const fn ip_protocol(mut self, protocol: IpProtocol) -> Self {
        self.ip_protocol = Some(protocol);
        self
    }

    /// A TCP flow between the given ports.
    #[must_use]
    pub const fn tcp(self, src_port: u16, dst_port: u16) -> Self {
        self.ported(IpProtocol::Tcp, src_port, dst_port)
    }

    /// A UDP flow between the given ports.
    #[must_use]
    pub const fn udp(self, src_port: u16, dst_port: u16) -> Self {
        self.ported(IpProtocol::Udp, src_port, dst_port)
    }

    /// A port-carrying flow of the given protocol.
    #[must_use]
    pub const fn ported(mut self, protocol: IpProtocol, src_port: u16, dst_port: u16) -> Self {
        self.ip_protocol = Some(protocol);
        self.src_port = Some(src_port);
        self.dst_port = Some(dst_port);
        self
    }

    /// An ICMP flow with the given type and code.
    #[must_use]
    pub const fn icmp(mut self, icmp_type: u8, icmp_code: u8) -> Self {
        self.ip_protocol = Some(IpProtocol::Icmp);
        self.icmp_type = Some(icmp_type);
        self.icmp_code = Some(icmp_code);
        self
    }

    /// Validates and builds the flow.
    ///
    /// # Errors
    ///
    /// Fails when a required header field is missing, when both an ingress interface and an
    /// ingress VRF are given, or when ports/ICMP fields do not match the protocol.
    pub fn build(self) -> ModelResult<Flow> {
        const KIND: &str = "Flow";
        let ingress_node = required(self.ingress_node, KIND, "ingressNode")?;
        let src_ip = required(self.src_ip, KIND, "srcIp")?;
        let dst_ip = required(self.dst_ip, KIND, "dstIp")?;
        let ip_protocol = required(self.ip_protocol, KIND, "ipProtocol")?;

        ensure(
            self.ingress_interface.is_none() || self.ingress_vrf.is_none(),
            KIND,
            "cannot enter through both an ingress interface and an ingress VRF",
        )?;
        let ingress_vrf = match (&self.ingress_interface, self.ingress_vrf) {
            (None, None) => Some(DEFAULT_VRF.to_owned()),
            (_, vrf) => vrf,
        };

        if ip_protocol.has_ports() {
            required(self.src_port, KIND, "srcPort")?;
            required(self.dst_port, KIND, "dstPort")?;
        } else {
            ensure(
                self.src_port.is_none() && self.dst_port.is_none(),
                KIND,
                "ports are only allowed for protocols that carry them",
            )?;
        }

        if ip_protocol == IpProtocol::Icmp {
            required(self.icmp_type, KIND, "icmpType")?;
            required(self.icmp_code, KIND, "icmpCode")?;
        } else {
            ensure(
                self.icmp_type.is_none() && self.icmp_code.is_none(),
                KIND,
                "ICMP type and code are only allowed for ICMP flows",
            )?;
        }

        Ok(Flow {
            ingress_node,
            ingress_interface: self.ingress_interface,
            ingress_vrf,
            src_ip,
            dst_ip,
            ip_protocol,
            src_port: self.src_port,
            dst_port: self.dst_port,
            icmp_type: self.icmp_type,
            icmp_code: self.icmp_code,
        })
    }
}

impl TryFrom<FlowRecord> for Flow {
    type Error = ModelError;

    fn try_from(record: FlowRecord) -> ModelResult<Self> {
        record.build()
    }
}

/// The classified final outcome of a trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowDisposition {
    /// Accepted by the destination device.
    Accepted,
    /// Delivered out an interface to a host on an attached subnet.
    DeliveredToSubnet,
    /// Denied by an inbound filter or policy.
    DeniedIn,
    /// Denied by an outbound filter.
    DeniedOut,
    /// Left the modeled network.
    ExitsNetwork,
    /// The snapshot does not have enough information to decide the outcome.
    InsufficientInfo,
    /// The flow entered a forwarding loop.
    Loop,
    /// The next hop did not answer ARP.
    NeighborUnreachable,
    /// No route matched the destination.
    NoRoute,
    /// Matched a discard route.
    NullRouted,
}

impl FlowDisposition {
    /// Whether the flow reached its destination (and so has return traffic).
    #[must_use]
    pub const fn is_successful(self) -> bool {
        matches!(self, Self::Accepted | Self::DeliveredToSubnet | Self::ExitsNetwork)
    }
}

impl fmt::Display for FlowDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accepted => "ACCEPTED",
            Self::DeliveredToSubnet => "DELIVERED_TO_SUBNET",
            Self::DeniedIn => "DENIED_IN",
            Self::DeniedOut => "DENIED_OUT",
            Self::ExitsNetwork => "EXITS_NETWORK",
            Self::InsufficientInfo => "INSUFFICIENT_INFO",
            Self::Loop => "LOOP",
            Self::NeighborUnreachable => "NEIGHBOR_UNREACHABLE",
            Self::NoRoute => "NO_ROUTE",
            Self::NullRouted => "NULL_ROUTED",
        };
        f.write_str(name)
    }
}

/// One rewritten header field: its name, value before, and value after.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDiff {
    /// Header field name (`srcIp`, `dstIp`, `srcPort` or `dstPort`).
    pub field_name: String,
    /// Value before the rewrite.
    pub old_value: String,
    /// Value after the rewrite.
    pub new_value: String,
}

impl FlowDiff {
    /// Creates a diff for `field_name`.
    #[must_use]
    pub fn new(field_name: impl Into<String>, old_value: impl ToString, new_value: impl ToString) -> Self {
        Self {
            field_name: field_name.into(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
        }
    }
}

impl fmt::Display for FlowDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field_name, self.old_value, self.new_value)
    }
}

/// Header fields compared by [`flow_diffs`], in presentation order.
type Header = (Ipv4Addr, Ipv4Addr, Option<u16>, Option<u16>);

/// Builds the ordered diff list between two headers.
fn header_diffs(before: Header, after: Header) -> Vec<FlowDiff> {
    let mut diffs = Vec::new();
    if before.0 != after.0 {
        diffs.push(FlowDiff::new("srcIp", before.0, after.0));
    }
    if before.1 != after.1 {
        diffs.push(FlowDiff::new("dstIp", before.1, after.1));
    }
    if let (Some(old), Some(new)) = (before.2, after.2) {
        if old != new {
            diffs.push(FlowDiff::new("srcPort", old, new));
        }
    }
    if let (Some(old), Some(new)) = (before.3, after.3) {
        if old != new {
            diffs.push(FlowDiff::new("dstPort", old, new));
        }
    }
    diffs
}

/// The ordered header rewrites that turn `before` into `after`.
#[must_use]
pub fn flow_diffs(before: &Flow, after: &Flow) -> Vec<FlowDiff> {
    header_diffs(
        (before.src_ip, before.dst_ip, before.src_port, before.dst_port),
        (after.src_ip, after.dst_ip, after.src_port, after.dst_port),
    )
}

/// The header rewrites a session applies to return traffic of a flow that was rewritten from
/// `original` to `current` on the forward path.
///
/// Return traffic arrives addressed to the rewritten flow (with source and destination swapped)
/// and must leave addressed to the original one.
#[must_use]
pub fn return_flow_diffs(original: &Flow, current: &Flow) -> Vec<FlowDiff> {
    header_diffs(
        (current.dst_ip, current.src_ip, current.dst_port, current.src_port),
        (original.dst_ip, original.src_ip, original.dst_port, original.src_port),
    )
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use rstest::*;

    use super::*;

    fn tcp_flow(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16) -> Flow {
        Flow::builder("r1")
            .ingress_interface("eth0")
            .src_ip(src.into())
            .dst_ip(dst.into())
            .tcp(sport, dport)
            .build()
            .unwrap()
    }

    #[rstest]
    fn test_flow_defaults_to_default_vrf() {
        let flow = Flow::builder("r1")
            .src_ip(Ipv4Addr::new(1, 1, 1, 1))
            .dst_ip(Ipv4Addr::new(2, 2, 2, 2))
            .ip_protocol(IpProtocol::Gre)
            .build()
            .unwrap();
        assert_eq!(flow.ingress_vrf(), Some(DEFAULT_VRF));
        assert_none!(flow.ingress_interface());
    }

    #[rstest]
    fn test_flow_rejects_interface_and_vrf() {
        let res = Flow::builder("r1")
            .ingress_interface("eth0")
            .ingress_vrf("blue")
            .src_ip(Ipv4Addr::new(1, 1, 1, 1))
            .dst_ip(Ipv4Addr::new(2, 2, 2, 2))
            .udp(1, 2)
            .build();
        assert!(matches!(res, Err(ModelError::Invariant { kind: "Flow", .. })));
    }

    #[rstest]
    #[case::missing_src(Flow::builder("r1").dst_ip(Ipv4Addr::LOCALHOST).udp(1, 2), "srcIp")]
    #[case::missing_protocol(Flow::builder("r1").src_ip(Ipv4Addr::LOCALHOST).dst_ip(Ipv4Addr::LOCALHOST), "ipProtocol")]
    #[case::missing_icmp_type(
        Flow::builder("r1").src_ip(Ipv4Addr::LOCALHOST).dst_ip(Ipv4Addr::LOCALHOST).ip_protocol(IpProtocol::Icmp),
        "icmpType"
    )]
    fn test_flow_missing_field(#[case] builder: FlowBuilder, #[case] field: &'static str) {
        assert_eq!(builder.build().unwrap_err(), ModelError::MissingField { kind: "Flow", field });
    }

    #[rstest]
    fn test_reverse_swaps_header() {
        let flow = tcp_flow([10, 0, 0, 1], [10, 0, 1, 1], 49152, 443);
        let rev = flow.reverse("r9", "default");
        assert_eq!(rev.ingress_node(), "r9");
        assert_eq!(rev.ingress_vrf(), Some("default"));
        assert_eq!(rev.src_ip(), flow.dst_ip());
        assert_eq!(rev.dst_ip(), flow.src_ip());
        assert_eq!(rev.src_port(), Some(443));
        assert_eq!(rev.dst_port(), Some(49152));
    }

    #[rstest]
    fn test_reverse_icmp_echo() {
        let flow = Flow::builder("r1")
            .src_ip(Ipv4Addr::new(1, 1, 1, 1))
            .dst_ip(Ipv4Addr::new(2, 2, 2, 2))
            .icmp(8, 0)
            .build()
            .unwrap();
        let rev = flow.reverse("r2", "default");
        assert_eq!(rev.icmp_type(), Some(0));
        assert_eq!(rev.icmp_code(), Some(0));
    }

    #[rstest]
    fn test_flow_diffs_ordered() {
        let before = tcp_flow([10, 0, 0, 1], [10, 0, 1, 1], 1000, 80);
        let after = tcp_flow([192, 168, 0, 1], [10, 0, 1, 1], 2000, 80);
        assert_eq!(
            flow_diffs(&before, &after),
            vec![FlowDiff::new("srcIp", "10.0.0.1", "192.168.0.1"), FlowDiff::new("srcPort", 1000, 2000)]
        );
        assert!(flow_diffs(&before, &before).is_empty());
    }

    #[rstest]
    fn test_return_flow_diffs_undo_source_nat() {
        let original = tcp_flow([10, 0, 0, 1], [8, 8, 8, 8], 1000, 53);
        let natted = tcp_flow([203, 0, 113, 5], [8, 8, 8, 8], 1000, 53);
        // return traffic arrives for 203.0.113.5 and must be sent back to 10.0.0.1
        assert_eq!(return_flow_diffs(&original, &natted), vec![FlowDiff::new("dstIp", "203.0.113.5", "10.0.0.1")]);
    }

    #[rstest]
    #[case(FlowDisposition::Accepted, true)]
    #[case(FlowDisposition::DeliveredToSubnet, true)]
    #[case(FlowDisposition::ExitsNetwork, true)]
    #[case(FlowDisposition::DeniedIn, false)]
    #[case(FlowDisposition::NoRoute, false)]
    #[case(FlowDisposition::Loop, false)]
    fn test_disposition_success(#[case] disposition: FlowDisposition, #[case] expected: bool) {
        assert_eq!(disposition.is_successful(), expected);
    }

    #[rstest]
    fn test_flow_decode_validates() {
        let err = serde_json::from_str::<Flow>(
            r#"{"ingressNode":"r1","srcIp":"1.1.1.1","dstIp":"2.2.2.2","ipProtocol":"TCP","srcPort":1}"#,
        )
        .unwrap_err();
        assert_contains!(err.to_string(), "dstPort");
    }
}
