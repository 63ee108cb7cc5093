//! Unified error types for the model kernel.
//!
//! Structural and temporal errors surface from the resolver with the
//! offending element key or id in the message; LP-level errors pass through
//! from the backend boundary.

use crate::id::{ElementKey, Id, TypeKey};
use melt_solver::LpError;
use melt_time::TimeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Two data elements share the same element key
    #[error("Duplicate element: {0}")]
    DuplicateElement(ElementKey),

    /// No include function registered for the element's type key
    #[error("Unknown type: {0}")]
    UnknownType(TypeKey),

    /// A required field is absent from an element value
    #[error("Missing field '{field}' in element {key}")]
    MissingField { key: ElementKey, field: String },

    /// A field holds a value of the wrong kind
    #[error("Field '{field}' in element {key} is not a {expected}")]
    WrongFieldType {
        key: ElementKey,
        field: String,
        expected: &'static str,
    },

    /// A reference that no element in the input can ever satisfy
    #[error("Dangling reference: element {key} refers to missing {missing}")]
    DanglingReference { key: ElementKey, missing: Id },

    /// The include fixed point stalled with unresolved references
    #[error("Unresolved references after fixed point:\n{report}")]
    UnresolvedReferences { report: String },

    /// The assemble fixed point stalled
    #[error("Assemble stalled:\n{report}")]
    AssembleStalled { report: String },

    /// A structural invariant does not hold
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Temporal model error
    #[error(transparent)]
    Time(#[from] TimeError),

    /// LP backend error
    #[error(transparent)]
    Lp(#[from] LpError),
}

/// Convenience type alias for Results using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dangling_reference_names_target() {
        let err = CoreError::DanglingReference {
            key: ElementKey::new("Arrow", "BaseArrow", "A1"),
            missing: Id::new("Balance", "Nowhere"),
        };
        let text = err.to_string();
        assert!(text.contains("Balance.Nowhere"));
        assert!(text.contains("A1"));
    }

    #[test]
    fn test_lp_error_conversion() {
        let err: CoreError = LpError::UnknownId("x".into()).into();
        assert!(matches!(err, CoreError::Lp(_)));
    }
}
