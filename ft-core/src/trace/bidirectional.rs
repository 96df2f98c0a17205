use std::collections::BTreeSet;
use std::fmt;

use serde::{
    Deserialize,
    Serialize,
};

use super::Trace;
use crate::errors::{
    ensure,
    required,
    ModelError,
    ModelResult,
};
use crate::flow::Flow;
use crate::session::FirewallSessionTraceInfo;

fn check_reverse_flow(kind: &'static str, trace: &Trace, reverse_flow: Option<&Flow>) -> ModelResult<()> {
    let successful = trace.disposition().is_successful();
    ensure(
        reverse_flow.is_some() == successful,
        kind,
        &format!(
            "reverseFlow must be present iff the forward disposition is successful (disposition {}, reverseFlow {})",
            trace.disposition(),
            if reverse_flow.is_some() { "present" } else { "absent" },
        ),
    )
}

/// The result of simulating one flow in the forward direction: its trace, the flow return
/// traffic would take (only when the trace succeeded), and the sessions set up along the way.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TraceAndReverseFlowRecord", rename_all = "camelCase")]
pub struct TraceAndReverseFlow {
    trace: Trace,
    #[serde(skip_serializing_if = "Option::is_none")]
    reverse_flow: Option<Flow>,
    new_sessions: BTreeSet<FirewallSessionTraceInfo>,
}

impl TraceAndReverseFlow {
    const KIND: &'static str = "TraceAndReverseFlow";

    /// Pairs a trace with its reverse flow.
    ///
    /// # Errors
    ///
    /// Fails unless `reverse_flow` is present exactly when the trace's disposition is successful.
    pub fn new(
        trace: Trace,
        reverse_flow: Option<Flow>,
        new_sessions: BTreeSet<FirewallSessionTraceInfo>,
    ) -> ModelResult<Self> {
        check_reverse_flow(Self::KIND, &trace, reverse_flow.as_ref())?;
        Ok(Self { trace, reverse_flow, new_sessions })
    }

    /// The forward trace.
    #[must_use]
    pub const fn trace(&self) -> &Trace {
        &self.trace
    }

    /// The return flow, present iff the trace succeeded.
    #[must_use]
    pub const fn reverse_flow(&self) -> Option<&Flow> {
        self.reverse_flow.as_ref()
    }

    /// Sessions set up while forwarding.
    #[must_use]
    pub const fn new_sessions(&self) -> &BTreeSet<FirewallSessionTraceInfo> {
        &self.new_sessions
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TraceAndReverseFlowRecord {
    trace: Option<Trace>,
    reverse_flow: Option<Flow>,
    #[serde(default)]
    new_sessions: BTreeSet<FirewallSessionTraceInfo>,
}

impl TryFrom<TraceAndReverseFlowRecord> for TraceAndReverseFlow {
    type Error = ModelError;

    fn try_from(record: TraceAndReverseFlowRecord) -> ModelResult<Self> {
        Self::new(required(record.trace, Self::KIND, "trace")?, record.reverse_flow, record.new_sessions)
    }
}

/// A forward trace paired with the trace of its return traffic.
///
/// The reverse flow and reverse trace are present exactly when the forward trace's disposition is
/// successful.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BidirectionalTraceRecord", rename_all = "camelCase")]
pub struct BidirectionalTrace {
    forward_flow: Flow,
    forward_trace: Trace,
    new_sessions: BTreeSet<FirewallSessionTraceInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reverse_flow: Option<Flow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reverse_trace: Option<Trace>,
}

/// The part of a [`BidirectionalTrace`] that identifies its logical outcome: everything except
/// the trace bodies.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    /// The forward flow.
    pub forward_flow: Flow,
    /// Sessions set up by the forward flow.
    pub new_sessions: BTreeSet<FirewallSessionTraceInfo>,
    /// The return flow, if any.
    pub reverse_flow: Option<Flow>,
}

impl BidirectionalTrace {
    const KIND: &'static str = "BidirectionalTrace";

    /// Creates a bidirectional trace.
    ///
    /// # Errors
    ///
    /// Fails unless `reverse_flow` is present exactly when the forward disposition is successful,
    /// and `reverse_trace` is present exactly when `reverse_flow` is.
    pub fn new(
        forward_flow: Flow,
        forward_trace: Trace,
        new_sessions: BTreeSet<FirewallSessionTraceInfo>,
        reverse_flow: Option<Flow>,
        reverse_trace: Option<Trace>,
    ) -> ModelResult<Self> {
        check_reverse_flow(Self::KIND, &forward_trace, reverse_flow.as_ref())?;
        ensure(
            reverse_flow.is_some() == reverse_trace.is_some(),
            Self::KIND,
            "reverseTrace must be present iff reverseFlow is present",
        )?;
        Ok(Self { forward_flow, forward_trace, new_sessions, reverse_flow, reverse_trace })
    }

    /// Pairs the forward simulation result for `forward_flow` with the trace of its reverse flow.
    ///
    /// # Errors
    ///
    /// Fails when `reverse_trace` is present without a reverse flow or missing with one.
    pub fn from_parts(
        forward_flow: Flow,
        forward: TraceAndReverseFlow,
        reverse_trace: Option<Trace>,
    ) -> ModelResult<Self> {
        let TraceAndReverseFlow { trace, reverse_flow, new_sessions } = forward;
        Self::new(forward_flow, trace, new_sessions, reverse_flow, reverse_trace)
    }

    /// The forward flow.
    #[must_use]
    pub const fn forward_flow(&self) -> &Flow {
        &self.forward_flow
    }

    /// The forward trace.
    #[must_use]
    pub const fn forward_trace(&self) -> &Trace {
        &self.forward_trace
    }

    /// Sessions set up by the forward flow.
    #[must_use]
    pub const fn new_sessions(&self) -> &BTreeSet<FirewallSessionTraceInfo> {
        &self.new_sessions
    }

    /// The return flow, present iff the forward trace succeeded.
    #[must_use]
    pub const fn reverse_flow(&self) -> Option<&Flow> {
        self.reverse_flow.as_ref()
    }

    /// The trace of the return flow.
    #[must_use]
    pub const fn reverse_trace(&self) -> Option<&Trace> {
        self.reverse_trace.as_ref()
    }

    /// The grouping key; two traces with equal keys describe the same logical outcome.
    #[must_use]
    pub fn key(&self) -> Key {
        Key {
            forward_flow: self.forward_flow.clone(),
            new_sessions: self.new_sessions.clone(),
            reverse_flow: self.reverse_flow.clone(),
        }
    }
}

impl fmt::Display for BidirectionalTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "forward flow: {}\n{}", self.forward_flow, self.forward_trace)?;
        for session in &self.new_sessions {
            write!(f, "\nnew {session}")?;
        }
        if let (Some(flow), Some(trace)) = (&self.reverse_flow, &self.reverse_trace) {
            write!(f, "\nreverse flow: {flow}\n{trace}")?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BidirectionalTraceRecord {
    forward_flow: Option<Flow>,
    forward_trace: Option<Trace>,
    #[serde(default)]
    new_sessions: BTreeSet<FirewallSessionTraceInfo>,
    reverse_flow: Option<Flow>,
    reverse_trace: Option<Trace>,
}

impl TryFrom<BidirectionalTraceRecord> for BidirectionalTrace {
    type Error = ModelError;

    fn try_from(record: BidirectionalTraceRecord) -> ModelResult<Self> {
        Self::new(
            required(record.forward_flow, Self::KIND, "forwardFlow")?,
            required(record.forward_trace, Self::KIND, "forwardTrace")?,
            record.new_sessions,
            record.reverse_flow,
            record.reverse_trace,
        )
    }
}
