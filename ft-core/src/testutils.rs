//! Fixtures and builders shared by this crate's tests and by downstream crates.
#![allow(clippy::must_use_candidate, clippy::missing_panics_doc)]

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use rstest::*;

use crate::acl::SessionMatchExpr;
use crate::flow::{
    Flow,
    Node,
    NodeInterfacePair,
    DEFAULT_VRF,
};
use crate::forwarding::ForwardingDetail;
use crate::session::FirewallSessionTraceInfo;
use crate::step::*;
use crate::trace::{
    BidirectionalTrace,
    Hop,
    Trace,
};

pub const CLIENT_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
pub const SERVER_IP: Ipv4Addr = Ipv4Addr::new(10, 1, 0, 1);

pub fn tcp_flow(node: &str, src_port: u16, dst_port: u16) -> Flow {
    Flow::builder(node)
        .ingress_interface("lan")
        .src_ip(CLIENT_IP)
        .dst_ip(SERVER_IP)
        .tcp(src_port, dst_port)
        .build()
        .unwrap()
}

#[fixture]
pub fn forward_flow() -> Flow {
    tcp_flow("A", 49152, 80)
}

#[fixture]
pub fn reverse_flow(forward_flow: Flow) -> Flow {
    forward_flow.reverse("B", DEFAULT_VRF)
}

pub fn enter(host: &str, iface: &str) -> Step {
    EnterInputIfaceStep::new(
        EnterInputIfaceStepDetail {
            input_interface: NodeInterfacePair::new(host, iface),
            input_vrf: Some(DEFAULT_VRF.into()),
        },
        StepAction::Received,
    )
    .unwrap()
    .into()
}

pub fn forward_out(iface: &str) -> Step {
    RoutingStep::new(
        RoutingStepDetail::new(
            DEFAULT_VRF,
            vec![],
            Some(ForwardingDetail::ForwardedOutInterface { output_interface: iface.into(), arp_ip: None }),
        ),
        StepAction::Forwarded,
    )
    .unwrap()
    .into()
}

pub fn transmit(host: &str, iface: &str) -> Step {
    ExitOutputIfaceStep::new(
        ExitOutputIfaceStepDetail { output_interface: NodeInterfacePair::new(host, iface) },
        StepAction::Transmitted,
    )
    .unwrap()
    .into()
}

pub fn inbound(iface: &str) -> Step {
    InboundStep::new(InboundStepDetail { interface: iface.into() }, StepAction::Accepted).unwrap().into()
}

pub fn deny_in(filter: &str, iface: &str) -> Step {
    FilterStep::new(
        FilterStepDetail {
            filter: filter.into(),
            filter_type: FilterType::IngressFilter,
            interface: Some(iface.into()),
        },
        StepAction::Denied,
    )
    .unwrap()
    .into()
}

/// Hops through `devices`, forwarding at every device but the last, which runs `last`.
pub fn path(devices: &[&str], last: Step) -> Vec<Hop> {
    let mut hops: Vec<Hop> = devices
        .iter()
        .map(|device| {
            Hop::new(Node::new(*device), vec![enter(device, "in"), forward_out("out"), transmit(device, "out")])
        })
        .collect();
    if let Some(hop) = hops.last_mut() {
        let device = hop.device().clone();
        *hop = Hop::new(device.clone(), vec![enter(&device.name, "in"), last]);
    }
    hops
}

pub fn accepted_trace(devices: &[&str]) -> Trace {
    Trace::from_hops(path(devices, inbound("in"))).unwrap()
}

pub fn denied_trace(devices: &[&str]) -> Trace {
    Trace::from_hops(path(devices, deny_in("acl", "in"))).unwrap()
}

/// A successful bidirectional trace over `devices`, with the reverse path retracing it.
pub fn accepted(flow: &Flow, devices: &[&str]) -> BidirectionalTrace {
    let last = devices.last().copied().unwrap_or("B");
    let back: Vec<&str> = devices.iter().rev().copied().collect();
    BidirectionalTrace::new(
        flow.clone(),
        accepted_trace(devices),
        BTreeSet::new(),
        Some(flow.reverse(last, DEFAULT_VRF)),
        Some(accepted_trace(&back)),
    )
    .unwrap()
}

pub fn denied(flow: &Flow, devices: &[&str]) -> BidirectionalTrace {
    BidirectionalTrace::new(flow.clone(), denied_trace(devices), BTreeSet::new(), None, None).unwrap()
}

pub fn session_on(host: &str, forward: &Flow) -> FirewallSessionTraceInfo {
    FirewallSessionTraceInfo::new(
        host,
        BTreeSet::from(["out".to_string()]),
        Some("in".into()),
        None,
        SessionMatchExpr::for_return_of(forward).unwrap().into(),
        None,
    )
    .unwrap()
}

#[fixture]
pub fn bidirectional_trace(forward_flow: Flow) -> BidirectionalTrace {
    accepted(&forward_flow, &["A", "B"])
}
