#![deny(
    // Strict on purpose: anything that trips these gets an inline allow so a reviewer takes a second look.
    clippy::nursery,
    clippy::pedantic,
)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

//! # ft-core: flow-trace result model
//!
//! Immutable records of what a network simulation did to a flow:
//!
//! 1. [`step`]: one processing stage inside a device, as a closed sum over step kinds. Each kind
//!    carries a detail payload and an action from the set legal for that kind.
//! 2. [`session`]: the firewall sessions devices set up for return traffic, with their scope and
//!    the action they take.
//! 3. [`trace`]: hops (a device and its steps), traces (hops plus a disposition), and the pairing of
//!    a forward trace with the trace of its return traffic.
//!
//! Supporting types describe the flows themselves ([`flow`]), ACL match expressions ([`acl`]), NAT
//! ([`transformation`]), and the routing inputs to a forwarding decision ([`route`],
//! [`forwarding`]).
//!
//! Every type is built through a constructor that returns a [`ModelResult`], and decoding goes
//! through the same checks, so a value that exists is a valid one.

pub mod acl;
pub mod errors;
pub mod flow;
pub mod forwarding;
pub mod logging;
pub mod route;
pub mod session;
pub mod step;
pub mod trace;
pub mod transformation;

#[cfg(any(test, feature = "testutils"))]
#[allow(missing_docs)]
pub mod testutils;

pub use errors::{
    ModelError,
    ModelResult,
};
pub use flow::{
    Flow,
    FlowDisposition,
    Node,
};
pub use session::{
    FirewallSessionTraceInfo,
    SessionAction,
    SessionScope,
};
pub use step::{
    Step,
    StepAction,
};
pub use trace::{
    BidirectionalTrace,
    Hop,
    Trace,
    TraceAndReverseFlow,
};
