//! Steps: the atomic records of what one processing stage inside a device did to a flow.
//!
//! Every kind pairs a kind-specific detail with a [`StepAction`] drawn from the subset of actions
//! legal for that kind. Both are checked when the step is built and again when it is decoded, so
//! an ill-formed step never exists.
mod action;
mod detail;

use std::fmt;

use itertools::Itertools;
use serde::de::Error as _;
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
};

pub use self::action::StepAction;
use self::detail::ValidateDetail;
pub use self::detail::{
    ArpErrorStepDetail,
    DeliveredStepDetail,
    EgressStepDetail,
    EnterInputIfaceStepDetail,
    EnterSrcIfaceStepDetail,
    ExitOutputIfaceStepDetail,
    FilterStepDetail,
    FilterType,
    InboundStepDetail,
    MatchSessionStepDetail,
    OriginateStepDetail,
    PolicyStepDetail,
    PreSourceNatOutgoingFilterStepDetail,
    RoutingStepDetail,
    SessionStepDetail,
    SessionStepDetailBuilder,
    SetupSessionStepDetail,
    TransformationStepDetail,
    VxlanTunnelStepDetail,
};
use crate::errors::{
    required,
    ModelError,
    ModelResult,
};
use crate::flow::FlowDisposition;

#[derive(Deserialize)]
struct StepRecord<D> {
    detail: Option<D>,
    action: Option<StepAction>,
}

impl<D> StepRecord<D> {
    fn into_parts(self, kind: &'static str) -> ModelResult<(D, StepAction)> {
        Ok((required(self.detail, kind, "detail")?, required(self.action, kind, "action")?))
    }
}

fn check_action(kind: &'static str, action: StepAction, allowed: &[StepAction]) -> ModelResult<()> {
    if allowed.contains(&action) {
        Ok(())
    } else {
        Err(ModelError::IllegalAction { kind, action, allowed: allowed.iter().join(", ") })
    }
}

macro_rules! step_kinds {
    ($(
        $(#[$meta:meta])*
        $variant:ident($step:ident, $detail:ty) => [$($allowed:ident),+ $(,)?];
    )+) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
            pub struct $step {
                detail: $detail,
                action: StepAction,
            }

            impl $step {
                /// Actions a step of this kind may be recorded with.
                pub const LEGAL_ACTIONS: &'static [StepAction] = &[$(StepAction::$allowed),+];
                const KIND: &'static str = stringify!($variant);

                /// Builds the step.
                ///
                /// # Errors
                ///
                /// Fails when `action` is not one of [`Self::LEGAL_ACTIONS`] or disagrees with `detail`.
                pub fn new(detail: $detail, action: StepAction) -> ModelResult<Self> {
                    check_action(Self::KIND, action, Self::LEGAL_ACTIONS)?;
                    detail.check(Self::KIND, action)?;
                    Ok(Self { detail, action })
                }

                /// The kind-specific payload.
                #[must_use]
                pub const fn detail(&self) -> &$detail {
                    &self.detail
                }

                /// What the step did.
                #[must_use]
                pub const fn action(&self) -> StepAction {
                    self.action
                }
            }

            impl<'de> Deserialize<'de> for $step {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    StepRecord::<$detail>::deserialize(deserializer)?
                        .into_parts(Self::KIND)
                        .and_then(|(detail, action)| Self::new(detail, action))
                        .map_err(D::Error::custom)
                }
            }

            impl From<$step> for Step {
                fn from(step: $step) -> Self {
                    Self::$variant(step)
                }
            }
        )+

        /// One processing stage inside a device, tagged on the wire by its kind.
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(tag = "type")]
        pub enum Step {
            $(
                $(#[$meta])*
                $variant($step),
            )+
            /// A forwarding loop was detected.
            Loop,
        }

        impl Step {
            /// What the step did.
            #[must_use]
            pub const fn action(&self) -> StepAction {
                match self {
                    $(Self::$variant(step) => step.action,)+
                    Self::Loop => StepAction::Loop,
                }
            }

            /// Name of the step's kind, as used for the wire tag.
            #[must_use]
            pub const fn kind(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => $step::KIND,)+
                    Self::Loop => "Loop",
                }
            }
        }
    };
}

step_kinds! {
    /// The device originated the flow.
    Originate(OriginateStep, OriginateStepDetail) => [Originated];
    /// The flow entered through an interface.
    EnterInputInterface(EnterInputIfaceStep, EnterInputIfaceStepDetail) => [Received, SentIn, DeniedIn];
    /// The flow was injected at a source interface.
    EnterSrcInterface(EnterSrcIfaceStep, EnterSrcIfaceStepDetail) => [Received];
    /// A FIB lookup and the resulting forwarding decision.
    Routing(RoutingStep, RoutingStepDetail) => [Forwarded, ForwardedToNextVrf, NoRoute, NullRouted];
    /// An ACL evaluation.
    Filter(FilterStep, FilterStepDetail) => [Permitted, Denied];
    /// An outbound filter evaluated before source NAT.
    PreSourceNatOutgoingFilter(PreSourceNatOutgoingFilterStep, PreSourceNatOutgoingFilterStepDetail) => [Permitted, Denied];
    /// A NAT evaluation.
    Transformation(TransformationStep, TransformationStepDetail) => [Transformed, Permitted];
    /// ARP for the next hop failed.
    ArpError(ArpErrorStep, ArpErrorStepDetail) => [NeighborUnreachable, InsufficientInfo];
    /// The flow was delivered to a subnet or left the network.
    Delivered(DeliveredStep, DeliveredStepDetail) => [DeliveredToSubnet, ExitsNetwork];
    /// The flow left through an interface.
    ExitOutputInterface(ExitOutputIfaceStep, ExitOutputIfaceStepDetail) => [Transmitted, SentOut, DeniedOut];
    /// The flow was decapsulated from a VXLAN tunnel.
    EnterFromVxlanTunnel(EnterFromVxlanTunnelStep, VxlanTunnelStepDetail) => [Received];
    /// The flow was encapsulated into a VXLAN tunnel.
    ExitIntoVxlanTunnel(ExitIntoVxlanTunnelStep, VxlanTunnelStepDetail) => [Transmitted];
    /// The flow was destined to the device itself.
    Inbound(InboundStep, InboundStepDetail) => [Accepted];
    /// The flow matched an existing session.
    MatchSession(MatchSessionStep, MatchSessionStepDetail) => [MatchedSession];
    /// The flow set up a new session.
    SetupSession(SetupSessionStep, SetupSessionStepDetail) => [SetupSession];
    /// A named packet policy was evaluated.
    Policy(PolicyStep, PolicyStepDetail) => [Permitted, Denied];
}

impl Step {
    /// The disposition a trace ending in this step has, or `None` when the step is not terminal.
    #[must_use]
    pub const fn implied_disposition(&self) -> Option<FlowDisposition> {
        use FlowDisposition as FD;
        use StepAction as SA;

        match (self, self.action()) {
            (Self::Inbound(_), _) => Some(FD::Accepted),
            (Self::Delivered(_), SA::DeliveredToSubnet) => Some(FD::DeliveredToSubnet),
            (Self::Delivered(_), SA::ExitsNetwork) => Some(FD::ExitsNetwork),
            (Self::ArpError(_), SA::NeighborUnreachable) => Some(FD::NeighborUnreachable),
            (Self::ArpError(_), SA::InsufficientInfo) => Some(FD::InsufficientInfo),
            (Self::Routing(_), SA::NoRoute) => Some(FD::NoRoute),
            (Self::Routing(_), SA::NullRouted) => Some(FD::NullRouted),
            (Self::Filter(step), SA::Denied) if step.detail.filter_type.is_egress() => Some(FD::DeniedOut),
            (Self::Filter(_) | Self::Policy(_), SA::Denied) | (Self::EnterInputInterface(_), SA::DeniedIn) => {
                Some(FD::DeniedIn)
            },
            (Self::PreSourceNatOutgoingFilter(_), SA::Denied) | (Self::ExitOutputInterface(_), SA::DeniedOut) => {
                Some(FD::DeniedOut)
            },
            (Self::Loop, _) => Some(FD::Loop),
            _ => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.action())?;
        match self {
            Self::Originate(step) => write!(f, " vrf {}", step.detail.originating_vrf),
            Self::EnterInputInterface(step) => write!(f, " {}", step.detail.input_interface),
            Self::EnterSrcInterface(step) => write!(f, " {}", step.detail.src_interface),
            Self::Routing(step) => {
                write!(f, " vrf {}", step.detail.vrf())?;
                if !step.detail.routes().is_empty() {
                    write!(f, " routes [{}]", step.detail.routes().iter().join("; "))?;
                }
                match step.detail.forwarding_detail() {
                    Some(forwarding) => write!(f, ", {forwarding}"),
                    None => Ok(()),
                }
            },
            Self::Filter(step) => write!(f, " {}", step.detail.filter),
            Self::PreSourceNatOutgoingFilter(step) => {
                write!(f, " {} on {}", step.detail.filter, step.detail.output_interface)
            },
            Self::Transformation(step) => {
                write!(f, " {}", step.detail.transformation_type())?;
                if !step.detail.flow_diffs().is_empty() {
                    write!(f, " [{}]", step.detail.flow_diffs().iter().join(", "))?;
                }
                Ok(())
            },
            Self::ArpError(step) => write!(f, " {}", step.detail.output_interface),
            Self::Delivered(step) => write!(f, " {}", step.detail.output_interface),
            Self::ExitOutputInterface(step) => write!(f, " {}", step.detail.output_interface),
            Self::EnterFromVxlanTunnel(EnterFromVxlanTunnelStep { detail, .. })
            | Self::ExitIntoVxlanTunnel(ExitIntoVxlanTunnelStep { detail, .. }) => {
                write!(f, " vni {} {} -> {}", detail.vni, detail.src_vtep_ip, detail.dst_vtep_ip)
            },
            Self::Inbound(step) => write!(f, " {}", step.detail.interface),
            Self::MatchSession(MatchSessionStep { detail, .. }) | Self::SetupSession(SetupSessionStep { detail, .. }) => {
                write!(f, " {} {}", detail.session_scope(), detail.session_action())
            },
            Self::Policy(step) => write!(f, " {}", step.detail.policy),
            Self::Loop => Ok(()),
        }
    }
}
