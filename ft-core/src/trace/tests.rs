use std::collections::BTreeSet;

use assertables::*;
use rstest::*;
use serde::{
    Deserialize,
    Serialize,
};

use super::*;
use crate::errors::ModelError;
use crate::flow::Flow;
use crate::testutils::*;

#[rstest]
fn test_from_hops_derives_disposition() {
    assert_eq!(accepted_trace(&["A", "B"]).disposition(), FlowDisposition::Accepted);
    assert_eq!(denied_trace(&["A"]).disposition(), FlowDisposition::DeniedIn);
}

#[rstest]
fn test_from_hops_rejects_non_terminal_end() {
    let hops = vec![Hop::new(Node::new("A"), vec![enter("A", "in"), forward_out("out")])];
    let err = Trace::from_hops(hops).unwrap_err();
    assert_contains!(err.to_string(), "final step Routing");
    assert_err!(Trace::from_hops(vec![]));
    assert_err!(Trace::from_hops(vec![Hop::new(Node::new("A"), vec![])]));
}

#[rstest]
fn test_trace_equality_respects_step_order() {
    let a = Trace::new(FlowDisposition::Accepted, vec![Hop::new(Node::new("A"), vec![enter("A", "in"), inbound("in")])]);
    let b = Trace::new(FlowDisposition::Accepted, vec![Hop::new(Node::new("A"), vec![inbound("in"), enter("A", "in")])]);
    assert_ne!(a, b);
    assert_eq!(a, a.clone());
}

#[rstest]
fn test_hop_names(bidirectional_trace: BidirectionalTrace) {
    let names: Vec<_> = bidirectional_trace.forward_trace().hop_names().collect();
    assert_eq!(names, ["A", "B"]);
    let names: Vec<_> = bidirectional_trace.reverse_trace().unwrap().hop_names().collect();
    assert_eq!(names, ["B", "A"]);
}

#[rstest]
fn test_successful_trace_requires_reverse_flow(forward_flow: Flow) {
    let res = BidirectionalTrace::new(forward_flow, accepted_trace(&["A", "B"]), BTreeSet::new(), None, None);
    assert!(matches!(res, Err(ModelError::Invariant { kind: "BidirectionalTrace", .. })));
}

#[rstest]
fn test_failed_trace_rejects_reverse_flow(forward_flow: Flow, reverse_flow: Flow) {
    let res = BidirectionalTrace::new(
        forward_flow,
        denied_trace(&["A"]),
        BTreeSet::new(),
        Some(reverse_flow),
        Some(accepted_trace(&["B", "A"])),
    );
    assert_err!(res);
}

#[rstest]
fn test_reverse_trace_requires_reverse_flow(forward_flow: Flow, reverse_flow: Flow) {
    let missing_trace = BidirectionalTrace::new(
        forward_flow.clone(),
        accepted_trace(&["A", "B"]),
        BTreeSet::new(),
        Some(reverse_flow),
        None,
    );
    assert_contains!(missing_trace.unwrap_err().to_string(), "reverseTrace");

    let stray_trace =
        BidirectionalTrace::new(forward_flow, denied_trace(&["A"]), BTreeSet::new(), None, Some(denied_trace(&["B"])));
    assert_err!(stray_trace);
}

#[rstest]
fn test_trace_and_reverse_flow_invariant(reverse_flow: Flow) {
    assert_err!(TraceAndReverseFlow::new(accepted_trace(&["A"]), None, BTreeSet::new()));
    assert_err!(TraceAndReverseFlow::new(denied_trace(&["A"]), Some(reverse_flow.clone()), BTreeSet::new()));
    assert_ok!(TraceAndReverseFlow::new(accepted_trace(&["A"]), Some(reverse_flow), BTreeSet::new()));
}

#[rstest]
fn test_from_parts(forward_flow: Flow, reverse_flow: Flow) {
    let session = session_on("B", &forward_flow);
    let forward = TraceAndReverseFlow::new(
        accepted_trace(&["A", "B"]),
        Some(reverse_flow.clone()),
        BTreeSet::from([session.clone()]),
    )
    .unwrap();

    let bidir = BidirectionalTrace::from_parts(forward_flow.clone(), forward, Some(accepted_trace(&["B", "A"]))).unwrap();
    assert_eq!(bidir.forward_flow(), &forward_flow);
    assert_eq!(bidir.reverse_flow(), Some(&reverse_flow));
    assert_eq!(bidir.new_sessions(), &BTreeSet::from([session]));
}

#[rstest]
fn test_key_ignores_trace_bodies(forward_flow: Flow) {
    let short = accepted(&forward_flow, &["A", "B"]);
    let long = accepted(&forward_flow, &["A", "C", "B"]);
    assert_ne!(short, long);
    assert_eq!(short.key(), long.key());
    assert_ne!(short.key(), denied(&forward_flow, &["A", "B"]).key());
}

#[rstest]
fn test_json_round_trip_with_sessions(forward_flow: Flow, reverse_flow: Flow) {
    let bidir = BidirectionalTrace::new(
        forward_flow.clone(),
        accepted_trace(&["A", "B"]),
        BTreeSet::from([session_on("A", &forward_flow), session_on("B", &forward_flow)]),
        Some(reverse_flow),
        Some(accepted_trace(&["B", "A"])),
    )
    .unwrap();

    let json = serde_json::to_string(&bidir).unwrap();
    let decoded: BidirectionalTrace = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, bidir);
}

#[rstest]
fn test_msgpack_round_trip(bidirectional_trace: BidirectionalTrace) {
    let mut buf = Vec::new();
    bidirectional_trace
        .serialize(&mut rmp_serde::Serializer::new(&mut buf).with_struct_map().with_human_readable())
        .unwrap();
    let mut de = rmp_serde::Deserializer::new(buf.as_slice()).with_human_readable();
    let decoded = BidirectionalTrace::deserialize(&mut de).unwrap();
    assert_eq!(decoded, bidirectional_trace);
}

#[rstest]
fn test_decode_checks_invariants(bidirectional_trace: BidirectionalTrace) {
    let mut json = serde_json::to_value(&bidirectional_trace).unwrap();
    json.as_object_mut().unwrap().remove("reverseFlow");
    let err = serde_json::from_value::<BidirectionalTrace>(json.clone()).unwrap_err();
    assert_contains!(err.to_string(), "reverseFlow must be present");

    json.as_object_mut().unwrap().remove("forwardTrace");
    let err = serde_json::from_value::<BidirectionalTrace>(json).unwrap_err();
    assert_contains!(err.to_string(), "`forwardTrace`");
}

#[rstest]
fn test_display() {
    let trace = denied_trace(&["A", "B"]);
    assert_eq!(
        trace.to_string(),
        "DENIED_IN\n\
         1. node: A\n  \
         EnterInputInterface(RECEIVED) A[in]\n  \
         Routing(FORWARDED) vrf default, forwarded out out\n  \
         ExitOutputInterface(TRANSMITTED) A[out]\n\
         2. node: B\n  \
         EnterInputInterface(RECEIVED) B[in]\n  \
         Filter(DENIED) acl"
    );
}
