//! Hops, traces, and the forward/reverse pairing of traces.
mod bidirectional;

use std::fmt;

use serde::{
    Deserialize,
    Serialize,
};

pub use self::bidirectional::{
    BidirectionalTrace,
    Key,
    TraceAndReverseFlow,
};
use crate::errors::{
    ModelError,
    ModelResult,
};
use crate::flow::{
    FlowDisposition,
    Node,
};
use crate::step::Step;

/// One device's processing of a flow, in chronological order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hop {
    device: Node,
    steps: Vec<Step>,
}

impl Hop {
    /// Creates a hop through `device`.
    #[must_use]
    pub const fn new(device: Node, steps: Vec<Step>) -> Self {
        Self { device, steps }
    }

    /// The device.
    #[must_use]
    pub const fn device(&self) -> &Node {
        &self.device
    }

    /// The steps taken inside the device.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node: {}", self.device)?;
        for step in &self.steps {
            write!(f, "\n  {step}")?;
        }
        Ok(())
    }
}

/// The path of a flow through the network and where it ended up.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trace {
    disposition: FlowDisposition,
    hops: Vec<Hop>,
}

impl Trace {
    /// Creates a trace with an explicit disposition.
    #[must_use]
    pub const fn new(disposition: FlowDisposition, hops: Vec<Hop>) -> Self {
        Self { disposition, hops }
    }

    /// Creates a trace whose disposition is the one implied by the last step of the last hop.
    ///
    /// # Errors
    ///
    /// Fails when there are no steps or the last step does not end a trace.
    pub fn from_hops(hops: Vec<Hop>) -> ModelResult<Self> {
        let Some(last) = hops.last().and_then(|hop| hop.steps.last()) else {
            return Err(ModelError::invariant("Trace", "cannot derive a disposition from a trace with no steps"));
        };
        let Some(disposition) = last.implied_disposition() else {
            return Err(ModelError::invariant("Trace", format!("final step {} does not end a trace", last.kind())));
        };
        Ok(Self { disposition, hops })
    }

    /// Where the flow ended up.
    #[must_use]
    pub const fn disposition(&self) -> FlowDisposition {
        self.disposition
    }

    /// The hops, in path order.
    #[must_use]
    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    /// Names of the devices traversed, in path order.
    pub fn hop_names(&self) -> impl Iterator<Item = &str> {
        self.hops.iter().map(|hop| hop.device.name.as_str())
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.disposition)?;
        for (i, hop) in self.hops.iter().enumerate() {
            write!(f, "\n{}. {hop}", i + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
