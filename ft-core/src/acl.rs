//! ACL-style match expressions over flows.
//!
//! Only the subset needed to describe which traffic hits a firewall session is modeled here;
//! full ACL compilation lives with the configuration parsers.
use std::collections::BTreeSet;
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
use crate::flow::{
    Flow,
    IpProtocol,
};

/// Exact match on the 5-tuple of return traffic for a session.
///
/// Ports are either both present or both absent.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "SessionMatchExprRecord", rename_all = "camelCase")]
pub struct SessionMatchExpr {
    ip_protocol: IpProtocol,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    #[serde(skip_serializing_if = "Option::is_none")]
    src_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dst_port: Option<u16>,
}

impl SessionMatchExpr {
    const KIND: &'static str = "SessionMatchExpr";

    /// Creates a session match expression.
    ///
    /// # Errors
    ///
    /// Fails when exactly one of `src_port`/`dst_port` is given.
    pub fn new(
        ip_protocol: IpProtocol,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        src_port: Option<u16>,
        dst_port: Option<u16>,
    ) -> ModelResult<Self> {
        ensure(
            src_port.is_some() == dst_port.is_some(),
            Self::KIND,
            "srcPort and dstPort must be both present or both absent",
        )?;
        Ok(Self { ip_protocol, src_ip, dst_ip, src_port, dst_port })
    }

    /// The expression matching return traffic of `forward` (addresses and ports swapped).
    ///
    /// # Errors
    ///
    /// Fails when the flow's protocol cannot carry a session.
    pub fn for_return_of(forward: &Flow) -> ModelResult<Self> {
        ensure(
            forward.ip_protocol().supports_sessions(),
            Self::KIND,
            &format!("cannot match session return flow with IP protocol {}", forward.ip_protocol()),
        )?;
        Self::new(forward.ip_protocol(), forward.dst_ip(), forward.src_ip(), forward.dst_port(), forward.src_port())
    }

    /// Matched IP protocol.
    #[must_use]
    pub const fn ip_protocol(&self) -> IpProtocol {
        self.ip_protocol
    }

    /// Matched source address.
    #[must_use]
    pub const fn src_ip(&self) -> Ipv4Addr {
        self.src_ip
    }

    /// Matched destination address.
    #[must_use]
    pub const fn dst_ip(&self) -> Ipv4Addr {
        self.dst_ip
    }

    /// Matched source port, if ports are matched.
    #[must_use]
    pub const fn src_port(&self) -> Option<u16> {
        self.src_port
    }

    /// Matched destination port, if ports are matched.
    #[must_use]
    pub const fn dst_port(&self) -> Option<u16> {
        self.dst_port
    }

    /// Whether `flow` matches this expression.
    #[must_use]
    pub fn matches(&self, flow: &Flow) -> bool {
        self.ip_protocol == flow.ip_protocol()
            && self.src_ip == flow.src_ip()
            && self.dst_ip == flow.dst_ip()
            && self.src_port.map_or(true, |p| flow.src_port() == Some(p))
            && self.dst_port.map_or(true, |p| flow.dst_port() == Some(p))
    }
}

/// Wire form of [`SessionMatchExpr`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionMatchExprRecord {
    ip_protocol: Option<IpProtocol>,
    src_ip: Option<Ipv4Addr>,
    dst_ip: Option<Ipv4Addr>,
    src_port: Option<u16>,
    dst_port: Option<u16>,
}

impl TryFrom<SessionMatchExprRecord> for SessionMatchExpr {
    type Error = ModelError;

    fn try_from(record: SessionMatchExprRecord) -> ModelResult<Self> {
        Self::new(
            required(record.ip_protocol, Self::KIND, "ipProtocol")?,
            required(record.src_ip, Self::KIND, "srcIp")?,
            required(record.dst_ip, Self::KIND, "dstIp")?,
            record.src_port,
            record.dst_port,
        )
    }
}

/// A boolean match expression over a flow.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum AclLineMatchExpr {
    /// Matches every flow.
    True,
    /// Matches no flow.
    False,
    /// Matches when every conjunct matches.
    And {
        /// Sub-expressions, all of which must match.
        conjuncts: Vec<AclLineMatchExpr>,
    },
    /// Matches when any disjunct matches.
    Or {
        /// Sub-expressions, one of which must match.
        disjuncts: Vec<AclLineMatchExpr>,
    },
    /// Matches when the operand does not.
    Not {
        /// The negated expression.
        operand: Box<AclLineMatchExpr>,
    },
    /// Matches the 5-tuple of a session's return traffic.
    MatchSession(SessionMatchExpr),
    /// Matches flows that entered through one of the given interfaces.
    MatchSrcInterface {
        /// Interface names.
        interfaces: BTreeSet<String>,
    },
    /// Matches flows permitted by a named ACL; needs the device's ACL table to evaluate.
    PermittedByAcl {
        /// Name of the referenced ACL.
        acl_name: String,
    },
}

impl AclLineMatchExpr {
    /// Conjunction of `conjuncts`.
    #[must_use]
    pub const fn and(conjuncts: Vec<Self>) -> Self {
        Self::And { conjuncts }
    }

    /// Disjunction of `disjuncts`.
    #[must_use]
    pub const fn or(disjuncts: Vec<Self>) -> Self {
        Self::Or { disjuncts }
    }

    /// Negation of `operand`.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Self) -> Self {
        Self::Not { operand: Box::new(operand) }
    }

    /// Whether the expression can be evaluated against a bare flow, with no device context
    /// (no named ACL references and no source-interface tests).
    #[must_use]
    pub fn is_self_contained(&self) -> bool {
        match self {
            Self::True | Self::False | Self::MatchSession(_) => true,
            Self::And { conjuncts: exprs } | Self::Or { disjuncts: exprs } => exprs.iter().all(Self::is_self_contained),
            Self::Not { operand } => operand.is_self_contained(),
            Self::MatchSrcInterface { .. } | Self::PermittedByAcl { .. } => false,
        }
    }

    /// Evaluates the expression against `flow`.
    ///
    /// # Errors
    ///
    /// Fails with [`ModelError::UnresolvedReference`] when a named ACL reference is reached.
    pub fn evaluate(&self, flow: &Flow) -> ModelResult<bool> {
        match self {
            Self::True => Ok(true),
            Self::False => Ok(false),
            Self::And { conjuncts } => {
                for expr in conjuncts {
                    if !expr.evaluate(flow)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            },
            Self::Or { disjuncts } => {
                for expr in disjuncts {
                    if expr.evaluate(flow)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            },
            Self::Not { operand } => Ok(!operand.evaluate(flow)?),
            Self::MatchSession(expr) => Ok(expr.matches(flow)),
            Self::MatchSrcInterface { interfaces } => {
                Ok(flow.ingress_interface().is_some_and(|iface| interfaces.contains(iface)))
            },
            Self::PermittedByAcl { acl_name } => {
                Err(ModelError::UnresolvedReference { kind: "PermittedByAcl", name: acl_name.clone() })
            },
        }
    }
}

impl From<SessionMatchExpr> for AclLineMatchExpr {
    fn from(expr: SessionMatchExpr) -> Self {
        Self::MatchSession(expr)
    }
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use rstest::*;

    use super::*;

    #[fixture]
    fn forward() -> Flow {
        Flow::builder("fw")
            .ingress_interface("inside")
            .src_ip(Ipv4Addr::new(10, 0, 0, 1))
            .dst_ip(Ipv4Addr::new(192, 0, 2, 10))
            .tcp(40000, 22)
            .build()
            .unwrap()
    }

    #[rstest]
    #[case(None, None, true)]
    #[case(Some(1), Some(2), true)]
    #[case(Some(1), None, false)]
    #[case(None, Some(2), false)]
    fn test_session_match_expr_ports(#[case] src: Option<u16>, #[case] dst: Option<u16>, #[case] ok: bool) {
        let res = SessionMatchExpr::new(IpProtocol::Tcp, Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST, src, dst);
        assert_eq!(res.is_ok(), ok);
    }

    #[rstest]
    fn test_return_expr_matches_reverse(forward: Flow) {
        let expr = SessionMatchExpr::for_return_of(&forward).unwrap();
        assert!(expr.matches(&forward.reverse("server", "default")));
        assert!(!expr.matches(&forward));
    }

    #[rstest]
    fn test_return_expr_rejects_gre() {
        let gre = Flow::builder("fw")
            .src_ip(Ipv4Addr::new(1, 1, 1, 1))
            .dst_ip(Ipv4Addr::new(2, 2, 2, 2))
            .ip_protocol(IpProtocol::Gre)
            .build()
            .unwrap();
        assert_err!(SessionMatchExpr::for_return_of(&gre));
    }

    #[rstest]
    fn test_evaluate_composite(forward: Flow) {
        let inside = AclLineMatchExpr::MatchSrcInterface { interfaces: BTreeSet::from(["inside".to_string()]) };
        let expr = AclLineMatchExpr::and(vec![inside.clone(), AclLineMatchExpr::not(AclLineMatchExpr::False)]);
        assert_eq!(expr.evaluate(&forward), Ok(true));
        assert!(!expr.is_self_contained());

        let either = AclLineMatchExpr::or(vec![AclLineMatchExpr::False, AclLineMatchExpr::not(inside)]);
        assert_eq!(either.evaluate(&forward), Ok(false));
    }

    #[rstest]
    fn test_evaluate_acl_reference_fails(forward: Flow) {
        let expr = AclLineMatchExpr::or(vec![
            AclLineMatchExpr::False,
            AclLineMatchExpr::PermittedByAcl { acl_name: "OUTSIDE_IN".into() },
        ]);
        assert_eq!(
            expr.evaluate(&forward),
            Err(ModelError::UnresolvedReference { kind: "PermittedByAcl", name: "OUTSIDE_IN".into() })
        );
    }

    #[rstest]
    fn test_decode_tagged_expr() {
        let expr: AclLineMatchExpr = serde_json::from_str(
            r#"{"type":"Not","operand":{"type":"MatchSession","ipProtocol":"UDP","srcIp":"1.1.1.1","dstIp":"2.2.2.2","srcPort":53,"dstPort":5353}}"#,
        )
        .unwrap();
        assert!(expr.is_self_contained());

        let err = serde_json::from_str::<AclLineMatchExpr>(
            r#"{"type":"MatchSession","ipProtocol":"UDP","srcIp":"1.1.1.1","dstIp":"2.2.2.2","srcPort":53}"#,
        )
        .unwrap_err();
        assert_contains!(err.to_string(), "srcPort and dstPort");
    }
}
