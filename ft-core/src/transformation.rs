//! NAT transformations as supplied by the configuration layer, and their evaluation on a flow.
use std::fmt;
use std::net::Ipv4Addr;

use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};

use crate::acl::AclLineMatchExpr;
use crate::errors::ModelResult;
use crate::flow::{
    flow_diffs,
    Flow,
};
use crate::step::{
    StepAction,
    TransformationStep,
    TransformationStepDetail,
};

/// The kind of address translation a rewrite performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformationType {
    /// Source NAT.
    SourceNat,
    /// Destination NAT.
    DestNat,
}

impl fmt::Display for TransformationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceNat => f.write_str("SOURCE_NAT"),
            Self::DestNat => f.write_str("DEST_NAT"),
        }
    }
}

/// Which end of the flow a rewrite touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeaderField {
    /// Source address or port.
    Source,
    /// Destination address or port.
    Destination,
}

/// A single header rewrite.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Rewrite {
    /// Replace an address.
    AssignIp {
        /// Translation kind reported for this rewrite.
        transformation_type: TransformationType,
        /// Which address to replace.
        field: HeaderField,
        /// The new address.
        ip: Ipv4Addr,
    },
    /// Replace a port; has no effect on flows without ports.
    AssignPort {
        /// Translation kind reported for this rewrite.
        transformation_type: TransformationType,
        /// Which port to replace.
        field: HeaderField,
        /// The new port.
        port: u16,
    },
    /// Matches without rewriting anything.
    Noop {
        /// Translation kind reported for this rewrite.
        transformation_type: TransformationType,
    },
}

impl Rewrite {
    /// The translation kind this rewrite is reported under.
    #[must_use]
    pub const fn transformation_type(&self) -> TransformationType {
        match self {
            Self::AssignIp { transformation_type, .. }
            | Self::AssignPort { transformation_type, .. }
            | Self::Noop { transformation_type } => *transformation_type,
        }
    }

    fn apply(&self, flow: &Flow) -> Flow {
        let (mut src_ip, mut dst_ip) = (flow.src_ip(), flow.dst_ip());
        let (mut src_port, mut dst_port) = (flow.src_port(), flow.dst_port());
        match self {
            Self::AssignIp { field: HeaderField::Source, ip, .. } => src_ip = *ip,
            Self::AssignIp { field: HeaderField::Destination, ip, .. } => dst_ip = *ip,
            Self::AssignPort { field: HeaderField::Source, port, .. } => src_port = src_port.map(|_| *port),
            Self::AssignPort { field: HeaderField::Destination, port, .. } => dst_port = dst_port.map(|_| *port),
            Self::Noop { .. } => {},
        }
        flow.with_header(src_ip, dst_ip, src_port, dst_port)
    }
}

/// A guarded chain of header rewrites.
///
/// When `guard` matches, `rewrites` are applied in order and evaluation continues with
/// `and_then`; otherwise evaluation continues with `or_else`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transformation {
    /// Which flows this transformation applies to.
    pub guard: AclLineMatchExpr,
    /// Ordered rewrites applied when the guard matches.
    #[serde(default)]
    pub rewrites: Vec<Rewrite>,
    /// Evaluated after the rewrites when the guard matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and_then: Option<Box<Transformation>>,
    /// Evaluated instead when the guard does not match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub or_else: Option<Box<Transformation>>,
}

/// The result of evaluating a [`Transformation`] on a flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransformationOutcome {
    /// The rewritten flow.
    pub flow: Flow,
    /// One step per group of same-type rewrites that applied, in application order.
    pub steps: Vec<TransformationStep>,
}

impl Transformation {
    /// A transformation applying `rewrites` to every flow.
    #[must_use]
    pub const fn always(rewrites: Vec<Rewrite>) -> Self {
        Self::when(AclLineMatchExpr::True, rewrites)
    }

    /// A transformation applying `rewrites` to flows matching `guard`.
    #[must_use]
    pub const fn when(guard: AclLineMatchExpr, rewrites: Vec<Rewrite>) -> Self {
        Self { guard, rewrites, and_then: None, or_else: None }
    }

    /// Sets the transformation evaluated after this one matches.
    #[must_use]
    pub fn and_then(mut self, next: Self) -> Self {
        self.and_then = Some(Box::new(next));
        self
    }

    /// Sets the transformation evaluated when this one does not match.
    #[must_use]
    pub fn or_else(mut self, next: Self) -> Self {
        self.or_else = Some(Box::new(next));
        self
    }

    /// Evaluates the transformation on `flow`.
    ///
    /// # Errors
    ///
    /// Fails when a guard cannot be evaluated without device context.
    pub fn apply(&self, flow: &Flow) -> ModelResult<TransformationOutcome> {
        let mut steps = Vec::new();
        let flow = self.apply_into(flow.clone(), &mut steps)?;
        Ok(TransformationOutcome { flow, steps })
    }

    fn apply_into(&self, flow: Flow, steps: &mut Vec<TransformationStep>) -> ModelResult<Flow> {
        if !self.guard.evaluate(&flow)? {
            return match &self.or_else {
                Some(next) => next.apply_into(flow, steps),
                None => Ok(flow),
            };
        }

        let mut current = flow;
        let groups = self.rewrites.iter().chunk_by(|rewrite| rewrite.transformation_type());
        for (transformation_type, group) in &groups {
            let before = current.clone();
            for rewrite in group {
                current = rewrite.apply(&current);
            }
            let diffs = flow_diffs(&before, &current);
            let action = if diffs.is_empty() { StepAction::Permitted } else { StepAction::Transformed };
            steps.push(TransformationStep::new(TransformationStepDetail::new(transformation_type, diffs), action)?);
        }

        match &self.and_then {
            Some(next) => next.apply_into(current, steps),
            None => Ok(current),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;
    use crate::flow::FlowDiff;

    #[fixture]
    fn flow() -> Flow {
        Flow::builder("edge")
            .ingress_interface("lan")
            .src_ip(Ipv4Addr::new(10, 1, 1, 1))
            .dst_ip(Ipv4Addr::new(198, 51, 100, 7))
            .tcp(5555, 443)
            .build()
            .unwrap()
    }

    #[rstest]
    fn test_source_nat_produces_transformed_step(flow: Flow) {
        let snat = Transformation::always(vec![
            Rewrite::AssignIp {
                transformation_type: TransformationType::SourceNat,
                field: HeaderField::Source,
                ip: Ipv4Addr::new(203, 0, 113, 1),
            },
            Rewrite::AssignPort {
                transformation_type: TransformationType::SourceNat,
                field: HeaderField::Source,
                port: 1024,
            },
        ]);
        let outcome = snat.apply(&flow).unwrap();

        assert_eq!(outcome.flow.src_ip(), Ipv4Addr::new(203, 0, 113, 1));
        assert_eq!(outcome.flow.src_port(), Some(1024));
        assert_eq!(outcome.steps.len(), 1);
        let step = &outcome.steps[0];
        assert_eq!(step.action(), StepAction::Transformed);
        assert_eq!(
            step.detail().flow_diffs(),
            &[FlowDiff::new("srcIp", "10.1.1.1", "203.0.113.1"), FlowDiff::new("srcPort", 5555, 1024)]
        );
    }

    #[rstest]
    fn test_noop_produces_permitted_step(flow: Flow) {
        let noop = Transformation::always(vec![Rewrite::Noop { transformation_type: TransformationType::DestNat }]);
        let outcome = noop.apply(&flow).unwrap();
        assert_eq!(outcome.flow, flow);
        assert_eq!(outcome.steps[0].action(), StepAction::Permitted);
        assert!(outcome.steps[0].detail().flow_diffs().is_empty());
    }

    #[rstest]
    fn test_guard_miss_falls_to_or_else(flow: Flow) {
        let dnat = Transformation::when(AclLineMatchExpr::False, vec![])
            .or_else(Transformation::always(vec![Rewrite::AssignIp {
                transformation_type: TransformationType::DestNat,
                field: HeaderField::Destination,
                ip: Ipv4Addr::new(10, 9, 9, 9),
            }]))
            .and_then(Transformation::always(vec![Rewrite::Noop { transformation_type: TransformationType::SourceNat }]));

        let outcome = dnat.apply(&flow).unwrap();
        assert_eq!(outcome.flow.dst_ip(), Ipv4Addr::new(10, 9, 9, 9));
        // and_then belongs to the guard that missed, so it does not run
        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(outcome.steps[0].detail().transformation_type(), TransformationType::DestNat);
    }
}
