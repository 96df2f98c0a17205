use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::debug;

use super::scope::{
    match_session_step_detail,
    setup_session_step_detail,
    SessionScope,
};
use super::SessionAction;
use crate::acl::{
    AclLineMatchExpr,
    SessionMatchExpr,
};
use crate::errors::{
    ensure,
    required,
    ModelError,
    ModelResult,
};
use crate::flow::{
    flow_diffs,
    return_flow_diffs,
    Flow,
    NodeInterfacePair,
};
use crate::step::{
    MatchSessionStep,
    SetupSessionStep,
    StepAction,
};
use crate::transformation::Transformation;

/// A session a device installed while forwarding a flow, as recorded in a trace.
///
/// Return traffic entering `hostname` at one of `incoming_interfaces` and matching
/// `session_flows` is rewritten by
/// `transformation` (if any) and then sent out `outgoing_interface` towards `next_hop`, or
/// accepted by the device itself when there is no outgoing interface. With an outgoing interface
/// but no next hop, the traffic is delivered to the attached subnet or leaves the network.
///
/// The egress is the one fixed when the session was set up. Whether it should instead be
/// re-resolved per return packet, and whether the transformation then applies before or after that
/// lookup, is an open question; [`FirewallSessionTraceInfo::process_return`] keeps the egress fixed
/// and applies the transformation first.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "FirewallSessionTraceInfoRecord", rename_all = "camelCase")]
pub struct FirewallSessionTraceInfo {
    hostname: String,
    incoming_interfaces: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outgoing_interface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_hop: Option<NodeInterfacePair>,
    session_flows: AclLineMatchExpr,
    #[serde(skip_serializing_if = "Option::is_none")]
    transformation: Option<Transformation>,
}

/// What a session did to a matching return flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionReturn {
    /// The return flow after the session's transformation.
    pub flow: Flow,
    /// The step recording the match.
    pub step: MatchSessionStep,
}

impl FirewallSessionTraceInfo {
    const KIND: &'static str = "FirewallSessionTraceInfo";

    /// Creates a session record.
    ///
    /// # Errors
    ///
    /// Fails when `next_hop` is given without `outgoing_interface`.
    pub fn new(
        hostname: impl Into<String>,
        incoming_interfaces: BTreeSet<String>,
        outgoing_interface: Option<String>,
        next_hop: Option<NodeInterfacePair>,
        session_flows: AclLineMatchExpr,
        transformation: Option<Transformation>,
    ) -> ModelResult<Self> {
        ensure(
            next_hop.is_none() || outgoing_interface.is_some(),
            Self::KIND,
            "nextHop cannot be present without outgoingInterface",
        )?;
        Ok(Self {
            hostname: hostname.into(),
            incoming_interfaces,
            outgoing_interface,
            next_hop,
            session_flows,
            transformation,
        })
    }

    /// Device holding the session.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Interfaces at which return traffic can hit the session.
    #[must_use]
    pub const fn incoming_interfaces(&self) -> &BTreeSet<String> {
        &self.incoming_interfaces
    }

    /// Egress interface for matching traffic; `None` means the device accepts it.
    #[must_use]
    pub fn outgoing_interface(&self) -> Option<&str> {
        self.outgoing_interface.as_deref()
    }

    /// Neighbor matching traffic is sent to.
    #[must_use]
    pub const fn next_hop(&self) -> Option<&NodeInterfacePair> {
        self.next_hop.as_ref()
    }

    /// Match expression over the return traffic.
    #[must_use]
    pub const fn session_flows(&self) -> &AclLineMatchExpr {
        &self.session_flows
    }

    /// Rewrite applied to matching traffic.
    #[must_use]
    pub const fn transformation(&self) -> Option<&Transformation> {
        self.transformation.as_ref()
    }

    /// How matching traffic is treated.
    #[must_use]
    pub fn session_action(&self) -> SessionAction {
        match &self.outgoing_interface {
            None => SessionAction::Accept,
            Some(outgoing_interface) => SessionAction::ForwardOutInterface {
                outgoing_interface: outgoing_interface.clone(),
                next_hop: self.next_hop.clone(),
            },
        }
    }

    /// Whether the header of `flow` satisfies `session_flows`, regardless of where it entered.
    ///
    /// # Errors
    ///
    /// Fails when `session_flows` refers to something outside the expression itself.
    pub fn matches(&self, flow: &Flow) -> ModelResult<bool> {
        self.session_flows.evaluate(flow)
    }

    /// Whether `flow` enters the network on an interface this session is installed on.
    #[must_use]
    pub fn is_installed_at(&self, flow: &Flow) -> bool {
        flow.ingress_node() == self.hostname
            && flow.ingress_interface().is_some_and(|iface| self.incoming_interfaces.contains(iface))
    }

    /// Runs a return flow through the session; `None` if the flow does not hit it.
    ///
    /// A flow hits the session when it enters at [`Self::is_installed_at`] and its header
    /// [`Self::matches`].
    ///
    /// # Errors
    ///
    /// Fails when the match expression or the transformation guard cannot be evaluated.
    pub fn process_return(&self, flow: &Flow) -> ModelResult<Option<SessionReturn>> {
        if !self.is_installed_at(flow) || !self.matches(flow)? {
            return Ok(None);
        }

        let returned = match &self.transformation {
            Some(transformation) => transformation.apply(flow)?.flow,
            None => flow.clone(),
        };
        debug!(hostname = %self.hostname, %flow, "return flow matched session");

        let criteria =
            SessionMatchExpr::new(flow.ip_protocol(), flow.src_ip(), flow.dst_ip(), flow.src_port(), flow.dst_port())?;
        let detail = match_session_step_detail(&SessionScope::Incoming {
            incoming_interfaces: self.incoming_interfaces.clone(),
        })
        .session_action(self.session_action())
        .match_criteria(criteria)
        .transformation(flow_diffs(flow, &returned))
        .build()?;

        Ok(Some(SessionReturn { step: MatchSessionStep::new(detail, StepAction::MatchedSession)?, flow: returned }))
    }

    /// The step recording this session being set up by a forward flow that was rewritten from
    /// `original` to `current` before the session was installed.
    ///
    /// The step matches the return of `current` and carries the rewrites that restore the
    /// original addressing on the way back.
    ///
    /// # Errors
    ///
    /// Fails when the flow's protocol cannot carry a session.
    pub fn setup_step(&self, original: &Flow, current: &Flow) -> ModelResult<SetupSessionStep> {
        let detail = setup_session_step_detail(&SessionScope::Incoming {
            incoming_interfaces: self.incoming_interfaces.clone(),
        })
        .session_action(self.session_action())
        .match_criteria(SessionMatchExpr::for_return_of(current)?)
        .transformation(return_flow_diffs(original, current))
        .build()?;
        SetupSessionStep::new(detail, StepAction::SetupSession)
    }
}

impl fmt::Display for FirewallSessionTraceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "session on {} [{}]: {}",
            self.hostname,
            self.incoming_interfaces.iter().join(", "),
            self.session_action()
        )
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirewallSessionTraceInfoRecord {
    hostname: Option<String>,
    #[serde(default)]
    incoming_interfaces: BTreeSet<String>,
    outgoing_interface: Option<String>,
    next_hop: Option<NodeInterfacePair>,
    session_flows: Option<AclLineMatchExpr>,
    transformation: Option<Transformation>,
}

impl TryFrom<FirewallSessionTraceInfoRecord> for FirewallSessionTraceInfo {
    type Error = ModelError;

    fn try_from(record: FirewallSessionTraceInfoRecord) -> ModelResult<Self> {
        Self::new(
            required(record.hostname, Self::KIND, "hostname")?,
            record.incoming_interfaces,
            record.outgoing_interface,
            record.next_hop,
            required(record.session_flows, Self::KIND, "sessionFlows")?,
            record.transformation,
        )
    }
}
