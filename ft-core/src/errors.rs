//! Construction and decoding failures for the trace model.
//!
//! Every value object in this crate is built through a smart constructor that returns a
//! [`ModelResult`]; decoding goes through the same constructors, so a malformed record can never
//! produce a half-valid object.

use thiserror::Error;

use crate::step::StepAction;

/// Result alias used by every smart constructor in the crate.
pub type ModelResult<T> = Result<T, ModelError>;

/// A construction-time or decode-time failure, naming the offending kind and field/invariant.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// A required field was not supplied.
    #[error("{kind}: missing required field `{field}`")]
    MissingField {
        /// The kind being constructed (e.g. `RoutingStep`).
        kind: &'static str,
        /// The wire name of the missing field.
        field: &'static str,
    },

    /// A step was given an action outside the set legal for its kind.
    #[error("{kind}: illegal action {action}, expected one of [{allowed}]")]
    IllegalAction {
        /// The step kind.
        kind: &'static str,
        /// The rejected action.
        action: StepAction,
        /// Comma-separated list of legal actions.
        allowed: String,
    },

    /// A cross-field invariant did not hold.
    #[error("{kind}: {message}")]
    Invariant {
        /// The kind being constructed.
        kind: &'static str,
        /// Which invariant was violated.
        message: String,
    },

    /// An expression referred to a named object that cannot be resolved in this context.
    #[error("{kind}: cannot resolve reference to `{name}`")]
    UnresolvedReference {
        /// The expression kind holding the reference.
        kind: &'static str,
        /// The referenced name.
        name: String,
    },
}

impl ModelError {
    pub(crate) fn invariant(kind: &'static str, message: impl Into<String>) -> Self {
        Self::Invariant { kind, message: message.into() }
    }
}

/// Unwraps a required field of a raw (wire) record, reporting the field by name when absent.
pub(crate) fn required<T>(value: Option<T>, kind: &'static str, field: &'static str) -> ModelResult<T> {
    value.ok_or(ModelError::MissingField { kind, field })
}

/// Fails with an [`ModelError::Invariant`] unless `cond` holds.
pub(crate) fn ensure(cond: bool, kind: &'static str, message: &str) -> ModelResult<()> {
    if cond {
        Ok(())
    } else {
        Err(ModelError::invariant(kind, message))
    }
}
