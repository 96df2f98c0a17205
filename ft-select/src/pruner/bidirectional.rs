use ft_core::trace::Trace;
use ft_core::{
    BidirectionalTrace,
    Flow,
    FlowDisposition,
};

use super::{
    Projection,
    Pruner,
};

/// How many traces are kept when the caller does not say.
pub const DEFAULT_MAX_TRACES: usize = 256;

/// A value the trace pruner diversifies over.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TraceFeature {
    /// A forward or reverse flow; `None` when there is no reverse flow.
    Flow(Option<Flow>),
    /// A forward or reverse disposition; `None` when there is no reverse trace.
    Disposition(Option<FlowDisposition>),
    /// Device names along a trace; empty when there is no reverse trace.
    HopNames(Vec<String>),
}

fn hop_names(trace: Option<&Trace>) -> TraceFeature {
    TraceFeature::HopNames(trace.map(|t| t.hop_names().map(str::to_owned).collect()).unwrap_or_default())
}

/// Picks which bidirectional traces to show.
///
/// Diversifies, in priority order, over the forward flow, the reverse flow, the forward and reverse
/// dispositions, and the device paths of the forward and reverse traces.
pub struct BidirectionalTracePruner {
    pruner: Pruner<BidirectionalTrace, TraceFeature>,
}

impl BidirectionalTracePruner {
    /// Creates the pruner.
    #[must_use]
    pub fn new() -> Self {
        let projections: Vec<Projection<BidirectionalTrace, TraceFeature>> = vec![
            Box::new(|t: &BidirectionalTrace| TraceFeature::Flow(Some(t.forward_flow().clone()))),
            Box::new(|t: &BidirectionalTrace| TraceFeature::Flow(t.reverse_flow().cloned())),
            Box::new(|t: &BidirectionalTrace| TraceFeature::Disposition(Some(t.forward_trace().disposition()))),
            Box::new(|t: &BidirectionalTrace| TraceFeature::Disposition(t.reverse_trace().map(Trace::disposition))),
            Box::new(|t: &BidirectionalTrace| hop_names(Some(t.forward_trace()))),
            Box::new(|t: &BidirectionalTrace| hop_names(t.reverse_trace())),
        ];
        Self { pruner: Pruner::new(projections) }
    }

    /// Keeps at most `max_size` of `traces`, preserving their order.
    #[must_use]
    pub fn prune(&self, traces: Vec<BidirectionalTrace>, max_size: usize) -> Vec<BidirectionalTrace> {
        self.pruner.prune(traces, max_size)
    }
}

impl Default for BidirectionalTracePruner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use assertables::*;
    use ft_core::testutils::*;
    use rstest::*;

    use super::*;

    fn accepted_via(flow: &Flow, reverse: &Flow, devices: &[&str]) -> BidirectionalTrace {
        let back: Vec<_> = devices.iter().rev().copied().collect();
        BidirectionalTrace::new(
            flow.clone(),
            accepted_trace(devices),
            BTreeSet::new(),
            Some(reverse.clone()),
            Some(accepted_trace(&back)),
        )
        .unwrap()
    }

    #[rstest]
    fn test_coverage_prefers_new_disposition(forward_flow: Flow, reverse_flow: Flow) {
        let candidates = vec![
            accepted_via(&forward_flow, &reverse_flow, &["A", "B"]),
            accepted_via(&forward_flow, &reverse_flow, &["A", "C"]),
            denied(&forward_flow, &["A", "B"]),
            denied(&forward_flow, &["A", "B"]),
        ];

        let pruned = BidirectionalTracePruner::new().prune(candidates.clone(), 2);

        assert_eq!(pruned.len(), 2);
        let dispositions: Vec<_> = pruned.iter().map(|t| t.forward_trace().disposition()).collect();
        assert_contains!(dispositions, &FlowDisposition::Accepted);
        assert_contains!(dispositions, &FlowDisposition::DeniedIn);
        assert_ne!(pruned[0], pruned[1]);
        assert_eq!(pruned, vec![candidates[0].clone(), candidates[2].clone()]);
    }

    #[rstest]
    fn test_distinct_flows_come_first() {
        let a = tcp_flow("A", 1000, 80);
        let b = tcp_flow("A", 1001, 80);
        let candidates = vec![
            accepted(&a, &["A", "B"]),
            denied(&a, &["A"]),
            accepted(&a, &["A", "C", "B"]),
            accepted(&b, &["A", "B"]),
        ];

        let pruned = BidirectionalTracePruner::default().prune(candidates.clone(), 2);
        assert_eq!(pruned, vec![candidates[0].clone(), candidates[3].clone()]);
    }

    #[rstest]
    fn test_missing_reverse_trace_is_its_own_value(forward_flow: Flow) {
        let candidates = vec![
            accepted(&forward_flow, &["A", "B"]),
            accepted(&forward_flow, &["A", "B"]),
            denied(&forward_flow, &["A", "B"]),
        ];
        let pruned = BidirectionalTracePruner::new().prune(candidates.clone(), 2);
        assert_eq!(pruned, vec![candidates[0].clone(), candidates[2].clone()]);
    }
}
