#![deny(clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

//! # ft-select: choosing which flow traces to show
//!
//! A network simulation can produce far more [`BidirectionalTrace`](ft_core::BidirectionalTrace)s
//! for a query than anyone wants to read. This crate picks a bounded, diverse subset:
//!
//! - [`pruner::Pruner`] is a generic greedy coverage sampler over prioritized projections.
//! - [`pruner::BidirectionalTracePruner`] instantiates it for bidirectional traces.
//! - [`io`] reads trace files (JSON or `MessagePack`) and writes the selection and run metadata into
//!   a timestamped directory.
//! - [`run`] strings these together for the `ftselect` binary.

pub mod io;
pub mod pruner;
pub mod selection;

pub use pruner::{
    BidirectionalTracePruner,
    Pruner,
    DEFAULT_MAX_TRACES,
};
pub use selection::{
    run,
    SelectionConfig,
    SelectionOutcome,
};
