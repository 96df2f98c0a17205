//! Kind-specific payloads carried by steps.
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use serde::{
    Deserialize,
    Serialize,
};

use super::StepAction;
use crate::acl::SessionMatchExpr;
use crate::errors::{
    ensure,
    required,
    ModelError,
    ModelResult,
};
use crate::flow::{
    FlowDiff,
    NodeInterfacePair,
};
use crate::forwarding::ForwardingDetail;
use crate::route::RouteInfo;
use crate::session::{
    scope,
    SessionAction,
    SessionScope,
};
use crate::transformation::TransformationType;

/// Cross-checks between a detail and the action it is recorded with.
pub(crate) trait ValidateDetail {
    fn check(&self, _kind: &'static str, _action: StepAction) -> ModelResult<()> {
        Ok(())
    }
}

/// The device originated the flow from a VRF.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginateStepDetail {
    /// VRF the flow was originated from.
    pub originating_vrf: String,
}

/// The flow entered the device through an interface.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterInputIfaceStepDetail {
    /// Ingress interface.
    pub input_interface: NodeInterfacePair,
    /// VRF of the ingress interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_vrf: Option<String>,
}

/// The flow was injected at a source interface on its first device.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterSrcIfaceStepDetail {
    /// Interface the flow is treated as entering from.
    pub src_interface: String,
}

/// A FIB lookup: the matched candidate routes and what was done with the flow.
///
/// Routes are kept in [`RouteInfo`] order regardless of the order they were supplied in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RoutingStepDetailRecord", rename_all = "camelCase")]
pub struct RoutingStepDetail {
    vrf: String,
    routes: Vec<RouteInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    forwarding_detail: Option<ForwardingDetail>,
}

impl RoutingStepDetail {
    /// Creates a routing detail for a lookup in `vrf`.
    #[must_use]
    pub fn new(vrf: impl Into<String>, mut routes: Vec<RouteInfo>, forwarding_detail: Option<ForwardingDetail>) -> Self {
        routes.sort();
        Self { vrf: vrf.into(), routes, forwarding_detail }
    }

    /// VRF the lookup was done in.
    #[must_use]
    pub fn vrf(&self) -> &str {
        &self.vrf
    }

    /// Matched routes, in presentation order.
    #[must_use]
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    /// The forwarding decision, when one was made.
    #[must_use]
    pub const fn forwarding_detail(&self) -> Option<&ForwardingDetail> {
        self.forwarding_detail.as_ref()
    }
}

impl ValidateDetail for RoutingStepDetail {
    fn check(&self, kind: &'static str, action: StepAction) -> ModelResult<()> {
        match (action, &self.forwarding_detail) {
            (StepAction::NoRoute, forwarding) => ensure(
                forwarding.is_none() && self.routes.is_empty(),
                kind,
                "NO_ROUTE carries neither routes nor a forwarding detail",
            ),
            (_, Some(forwarding)) => ensure(
                forwarding.step_action() == action,
                kind,
                &format!("forwarding detail ({forwarding}) disagrees with action {action}"),
            ),
            (_, None) => Ok(()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutingStepDetailRecord {
    vrf: Option<String>,
    #[serde(default)]
    routes: Vec<RouteInfo>,
    forwarding_detail: Option<ForwardingDetail>,
}

impl TryFrom<RoutingStepDetailRecord> for RoutingStepDetail {
    type Error = ModelError;

    fn try_from(record: RoutingStepDetailRecord) -> ModelResult<Self> {
        Ok(Self::new(required(record.vrf, "RoutingStepDetail", "vrf")?, record.routes, record.forwarding_detail))
    }
}

/// Where in the pipeline a filter is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterType {
    /// Inbound interface filter.
    IngressFilter,
    /// Inbound filter evaluated after NAT.
    PostTransformationIngressFilter,
    /// Outbound filter evaluated before NAT.
    PreTransformationEgressFilter,
    /// Outbound interface filter.
    EgressFilter,
    /// Outbound filter evaluated on the flow as it entered the device.
    EgressOriginalFlowFilter,
}

impl FilterType {
    /// Whether a denial by this filter is an outbound denial.
    #[must_use]
    pub const fn is_egress(self) -> bool {
        matches!(self, Self::PreTransformationEgressFilter | Self::EgressFilter | Self::EgressOriginalFlowFilter)
    }
}

/// An ACL evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStepDetail {
    /// Name of the evaluated filter.
    pub filter: String,
    /// Where the filter sits in the pipeline.
    pub filter_type: FilterType,
    /// Interface the filter is attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

/// An outbound filter evaluated before source NAT.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreSourceNatOutgoingFilterStepDetail {
    /// Egress interface.
    pub output_interface: String,
    /// Name of the evaluated filter.
    pub filter: String,
}

/// A NAT evaluation and the header rewrites it made, in order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationStepDetail {
    transformation_type: TransformationType,
    #[serde(default)]
    flow_diffs: Vec<FlowDiff>,
}

impl TransformationStepDetail {
    /// Creates a transformation detail.
    #[must_use]
    pub const fn new(transformation_type: TransformationType, flow_diffs: Vec<FlowDiff>) -> Self {
        Self { transformation_type, flow_diffs }
    }

    /// Source or destination NAT.
    #[must_use]
    pub const fn transformation_type(&self) -> TransformationType {
        self.transformation_type
    }

    /// Field rewrites, in the order they were applied.
    #[must_use]
    pub fn flow_diffs(&self) -> &[FlowDiff] {
        &self.flow_diffs
    }
}

impl ValidateDetail for TransformationStepDetail {
    fn check(&self, kind: &'static str, action: StepAction) -> ModelResult<()> {
        match action {
            StepAction::Transformed => ensure(!self.flow_diffs.is_empty(), kind, "TRANSFORMED requires flow diffs"),
            StepAction::Permitted => {
                ensure(self.flow_diffs.is_empty(), kind, "PERMITTED cannot carry flow diffs")
            },
            _ => Ok(()),
        }
    }
}

/// The egress interface of a terminal network-edge step, and the next hop that was resolved.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EgressStepDetail {
    /// Egress interface.
    pub output_interface: NodeInterfacePair,
    /// Next-hop address ARPed for, if one was resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_next_hop_ip: Option<Ipv4Addr>,
}

/// ARP for the next hop failed.
pub type ArpErrorStepDetail = EgressStepDetail;
/// The flow left the device towards a subnet or out of the network.
pub type DeliveredStepDetail = EgressStepDetail;

/// The flow left the device through an interface.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitOutputIfaceStepDetail {
    /// Egress interface.
    pub output_interface: NodeInterfacePair,
}

/// VXLAN encapsulation or decapsulation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VxlanTunnelStepDetail {
    /// VXLAN network identifier.
    pub vni: u32,
    /// Source tunnel endpoint.
    pub src_vtep_ip: Ipv4Addr,
    /// Destination tunnel endpoint.
    pub dst_vtep_ip: Ipv4Addr,
    /// VRF the VNI is bound to.
    pub vrf: String,
}

/// The flow was destined to the device itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundStepDetail {
    /// Interface owning the destination address.
    pub interface: String,
}

/// A named packet policy evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStepDetail {
    /// Name of the policy.
    pub policy: String,
}

/// A session event: the session's scope (flattened), how it treats matching traffic, the return
/// traffic it matches, and the rewrites it applies to that traffic.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SessionStepDetailBuilder", rename_all = "camelCase")]
pub struct SessionStepDetail {
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    incoming_interfaces: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    originating_vrf: Option<String>,
    session_action: SessionAction,
    match_criteria: SessionMatchExpr,
    transformation: Vec<FlowDiff>,
}

/// Detail of a step matching an existing session.
pub type MatchSessionStepDetail = SessionStepDetail;
/// Detail of a step setting up a new session.
pub type SetupSessionStepDetail = SessionStepDetail;

impl SessionStepDetail {
    /// An empty builder; prefer [`scope::session_step_detail`] to fill in the scope.
    #[must_use]
    pub fn builder() -> SessionStepDetailBuilder {
        SessionStepDetailBuilder::default()
    }

    /// Interfaces at which the session matches traffic (empty for an originating scope).
    #[must_use]
    pub const fn incoming_interfaces(&self) -> &BTreeSet<String> {
        &self.incoming_interfaces
    }

    /// VRF of local origination, for an originating scope.
    #[must_use]
    pub fn originating_vrf(&self) -> Option<&str> {
        self.originating_vrf.as_deref()
    }

    /// The scope, reassembled from the flattened fields.
    #[must_use]
    pub fn session_scope(&self) -> SessionScope {
        scope::from_parts(&self.incoming_interfaces, self.originating_vrf.as_deref())
    }

    /// Treatment of matching traffic.
    #[must_use]
    pub const fn session_action(&self) -> &SessionAction {
        &self.session_action
    }

    /// The traffic the session matches.
    #[must_use]
    pub const fn match_criteria(&self) -> &SessionMatchExpr {
        &self.match_criteria
    }

    /// Rewrites applied to matching traffic.
    #[must_use]
    pub fn transformation(&self) -> &[FlowDiff] {
        &self.transformation
    }
}

impl ValidateDetail for SessionStepDetail {}

/// Builder for [`SessionStepDetail`]; `session_action` and `match_criteria` are required.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStepDetailBuilder {
    #[serde(default)]
    incoming_interfaces: BTreeSet<String>,
    originating_vrf: Option<String>,
    session_action: Option<SessionAction>,
    match_criteria: Option<SessionMatchExpr>,
    #[serde(default)]
    transformation: Vec<FlowDiff>,
}

impl SessionStepDetailBuilder {
    /// Interfaces at which the session matches traffic.
    #[must_use]
    pub fn incoming_interfaces(mut self, interfaces: BTreeSet<String>) -> Self {
        self.incoming_interfaces = interfaces;
        self
    }

    /// VRF of local origination.
    #[must_use]
    pub fn originating_vrf(mut self, vrf: Option<String>) -> Self {
        self.originating_vrf = vrf;
        self
    }

    /// Treatment of matching traffic.
    #[must_use]
    pub fn session_action(mut self, action: SessionAction) -> Self {
        self.session_action = Some(action);
        self
    }

    /// The traffic the session matches.
    #[must_use]
    pub fn match_criteria(mut self, criteria: SessionMatchExpr) -> Self {
        self.match_criteria = Some(criteria);
        self
    }

    /// Rewrites applied to matching traffic.
    #[must_use]
    pub fn transformation(mut self, diffs: Vec<FlowDiff>) -> Self {
        self.transformation = diffs;
        self
    }

    /// Validates and builds the detail.
    ///
    /// # Errors
    ///
    /// Fails when a required field is missing or when both scope forms are set.
    pub fn build(self) -> ModelResult<SessionStepDetail> {
        const KIND: &str = "SessionStepDetail";
        ensure(
            self.originating_vrf.is_none() || self.incoming_interfaces.is_empty(),
            KIND,
            "a session is scoped by incoming interfaces or by originating VRF, not both",
        )?;
        Ok(SessionStepDetail {
            incoming_interfaces: self.incoming_interfaces,
            originating_vrf: self.originating_vrf,
            session_action: required(self.session_action, KIND, "sessionAction")?,
            match_criteria: required(self.match_criteria, KIND, "matchCriteria")?,
            transformation: self.transformation,
        })
    }
}

impl TryFrom<SessionStepDetailBuilder> for SessionStepDetail {
    type Error = ModelError;

    fn try_from(builder: SessionStepDetailBuilder) -> ModelResult<Self> {
        builder.build()
    }
}

impl ValidateDetail for OriginateStepDetail {}
impl ValidateDetail for EnterInputIfaceStepDetail {}
impl ValidateDetail for EnterSrcIfaceStepDetail {}
impl ValidateDetail for FilterStepDetail {}
impl ValidateDetail for PreSourceNatOutgoingFilterStepDetail {}
impl ValidateDetail for EgressStepDetail {}
impl ValidateDetail for ExitOutputIfaceStepDetail {}
impl ValidateDetail for VxlanTunnelStepDetail {}
impl ValidateDetail for InboundStepDetail {}
impl ValidateDetail for PolicyStepDetail {}
