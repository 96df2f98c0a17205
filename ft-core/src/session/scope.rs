//! Session scopes and the one place that branches on them.
//!
//! Anything that needs the interfaces or the VRF a session matches on goes through
//! [`to_incoming_interfaces`] / [`to_originating_vrf`], and session step details are started
//! from the builders here, so the incoming-vs-originating distinction is made in one spot.
use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};

use crate::step::{
    MatchSessionStepDetail,
    SessionStepDetailBuilder,
};

/// Where a session matches future traffic.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum SessionScope {
    /// Traffic arriving on any of the interfaces.
    #[serde(rename = "IncomingSessionScope")]
    Incoming {
        /// Interfaces the session is installed on.
        incoming_interfaces: BTreeSet<String>,
    },
    /// Traffic originated by the device from the VRF.
    #[serde(rename = "OriginatingSessionScope")]
    Originating {
        /// VRF of local origination.
        originating_vrf: String,
    },
}

impl SessionScope {
    /// A scope matching traffic arriving on `interfaces`.
    #[must_use]
    pub fn incoming<I, S>(interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Incoming { incoming_interfaces: interfaces.into_iter().map(Into::into).collect() }
    }

    /// A scope matching traffic originated from `vrf`.
    #[must_use]
    pub fn originating(vrf: impl Into<String>) -> Self {
        Self::Originating { originating_vrf: vrf.into() }
    }
}

impl fmt::Display for SessionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incoming { incoming_interfaces } => {
                write!(f, "incoming [{}]", incoming_interfaces.iter().join(", "))
            },
            Self::Originating { originating_vrf } => write!(f, "originating vrf {originating_vrf}"),
        }
    }
}

/// Interfaces at which a session with this scope can be matched; empty for an originating scope.
#[must_use]
pub fn to_incoming_interfaces(scope: &SessionScope) -> BTreeSet<String> {
    match scope {
        SessionScope::Incoming { incoming_interfaces } => incoming_interfaces.clone(),
        SessionScope::Originating { .. } => BTreeSet::new(),
    }
}

/// VRF of local origination for a session with this scope; `None` for an incoming scope.
#[must_use]
pub fn to_originating_vrf(scope: &SessionScope) -> Option<String> {
    match scope {
        SessionScope::Incoming { .. } => None,
        SessionScope::Originating { originating_vrf } => Some(originating_vrf.clone()),
    }
}

/// A session step-detail builder with the scope already filled in.
#[must_use]
pub fn session_step_detail(scope: &SessionScope) -> SessionStepDetailBuilder {
    MatchSessionStepDetail::builder()
        .incoming_interfaces(to_incoming_interfaces(scope))
        .originating_vrf(to_originating_vrf(scope))
}

/// Builder for the detail of a `SetupSession` step in `scope`.
#[must_use]
pub fn setup_session_step_detail(scope: &SessionScope) -> SessionStepDetailBuilder {
    session_step_detail(scope)
}

/// Builder for the detail of a `MatchSession` step in `scope`.
#[must_use]
pub fn match_session_step_detail(scope: &SessionScope) -> SessionStepDetailBuilder {
    session_step_detail(scope)
}

pub(crate) fn from_parts(incoming_interfaces: &BTreeSet<String>, originating_vrf: Option<&str>) -> SessionScope {
    match originating_vrf {
        Some(vrf) => SessionScope::originating(vrf),
        None => SessionScope::Incoming { incoming_interfaces: incoming_interfaces.clone() },
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;
    use crate::acl::SessionMatchExpr;
    use crate::flow::IpProtocol;
    use crate::session::SessionAction;
    use crate::step::SetupSessionStepDetail;

    #[rstest]
    fn test_incoming_scope_dispatch() {
        let scope = SessionScope::incoming(["eth0", "eth1"]);
        assert_eq!(to_incoming_interfaces(&scope), BTreeSet::from(["eth0".to_string(), "eth1".to_string()]));
        assert_eq!(to_originating_vrf(&scope), None);
    }

    #[rstest]
    fn test_originating_scope_dispatch() {
        let scope = SessionScope::originating("default");
        assert!(to_incoming_interfaces(&scope).is_empty());
        assert_eq!(to_originating_vrf(&scope).as_deref(), Some("default"));
    }

    #[rstest]
    #[case::incoming(SessionScope::incoming(["eth0"]))]
    #[case::originating(SessionScope::originating("mgmt"))]
    fn test_builder_carries_scope(#[case] scope: SessionScope) {
        let criteria =
            SessionMatchExpr::new(IpProtocol::Tcp, [10, 0, 0, 2].into(), [10, 0, 0, 1].into(), Some(80), Some(40000))
                .unwrap();
        let detail: SetupSessionStepDetail = setup_session_step_detail(&scope)
            .session_action(SessionAction::FibLookup)
            .match_criteria(criteria)
            .build()
            .unwrap();
        assert_eq!(detail.session_scope(), scope);
    }

    #[rstest]
    fn test_scope_wire_tag() {
        let json = serde_json::to_value(SessionScope::originating("default")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "OriginatingSessionScope", "originatingVrf": "default"}));
    }
}
