use std::fmt;

use serde::{
    Deserialize,
    Serialize,
};

/// What a single processing step did to the flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepAction {
    /// Accepted by the device itself.
    Accepted,
    /// Delivered to a host on an attached subnet.
    DeliveredToSubnet,
    /// Denied by a filter or policy.
    Denied,
    /// Denied on the way in.
    DeniedIn,
    /// Denied on the way out.
    DeniedOut,
    /// Left the modeled network.
    ExitsNetwork,
    /// Forwarded according to a route.
    Forwarded,
    /// Handed to another VRF.
    ForwardedToNextVrf,
    /// Not enough information to decide.
    InsufficientInfo,
    /// Forwarding loop detected.
    Loop,
    /// Matched an existing session.
    MatchedSession,
    /// Next hop did not answer ARP.
    NeighborUnreachable,
    /// No route for the destination.
    NoRoute,
    /// Matched a discard route.
    NullRouted,
    /// Originated by the device.
    Originated,
    /// Permitted (or passed through unchanged).
    Permitted,
    /// Received on an interface.
    Received,
    /// Sent into the device.
    SentIn,
    /// Sent out of the device.
    SentOut,
    /// Set up a new session.
    SetupSession,
    /// Rewritten by NAT.
    Transformed,
    /// Transmitted out an interface.
    Transmitted,
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accepted => "ACCEPTED",
            Self::DeliveredToSubnet => "DELIVERED_TO_SUBNET",
            Self::Denied => "DENIED",
            Self::DeniedIn => "DENIED_IN",
            Self::DeniedOut => "DENIED_OUT",
            Self::ExitsNetwork => "EXITS_NETWORK",
            Self::Forwarded => "FORWARDED",
            Self::ForwardedToNextVrf => "FORWARDED_TO_NEXT_VRF",
            Self::InsufficientInfo => "INSUFFICIENT_INFO",
            Self::Loop => "LOOP",
            Self::MatchedSession => "MATCHED_SESSION",
            Self::NeighborUnreachable => "NEIGHBOR_UNREACHABLE",
            Self::NoRoute => "NO_ROUTE",
            Self::NullRouted => "NULL_ROUTED",
            Self::Originated => "ORIGINATED",
            Self::Permitted => "PERMITTED",
            Self::Received => "RECEIVED",
            Self::SentIn => "SENT_IN",
            Self::SentOut => "SENT_OUT",
            Self::SetupSession => "SETUP_SESSION",
            Self::Transformed => "TRANSFORMED",
            Self::Transmitted => "TRANSMITTED",
        };
        f.write_str(name)
    }
}
