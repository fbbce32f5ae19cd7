//! Error types for declaration and dispatch.
//!
//! ## Error Hierarchy
//!
//! ```text
//! TetherError (top-level wrapper)
//! ├── RegistrationError - declaration and initialization errors
//! └── CallError         - per-call failures surfaced to the host
//! ```
//!
//! A [`CallError`] never leaves the engine in a different state than before
//! the call, so the host may keep dispatching after any of them.

use thiserror::Error;

use crate::handle::WrapperHandle;

// ============================================================================
// Call Errors
// ============================================================================

/// A failed call, reported to the host as a single message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// No overload of the group accepts this many arguments.
    #[error("no overload of '{name}' takes {argc} argument(s)")]
    ArityMismatch { name: String, argc: usize },

    /// An argument (or the receiver) has the wrong dynamic type.
    #[error("type mismatch{}: expected {expected}, got {actual}", argument_suffix(.argument))]
    TypeMismatch {
        expected: String,
        actual: String,
        argument: Option<usize>,
    },

    /// A const wrapper was used where mutable access is required.
    #[error("const violation: {detail}")]
    ConstViolation { detail: String },

    /// The wrapper was already released, or its borrowed object is gone.
    #[error("use after free: wrapper {handle} is no longer live")]
    UseAfterFree { handle: WrapperHandle },

    /// A value type has no host binding and cannot fall back to wrapping.
    #[error("no value binding registered for '{type_name}'")]
    UnboundType { type_name: String },

    /// Native code failed or panicked.
    #[error("native exception: {message}")]
    NativeException { message: String },

    /// The call named an entry point that does not exist.
    #[error("unknown entry '{name}'")]
    UnknownEntry { name: String },
}

fn argument_suffix(argument: &Option<usize>) -> String {
    match argument {
        Some(index) => format!(" in argument {}", index),
        None => String::new(),
    }
}

impl CallError {
    /// Type mismatch between an expected type name and an actual one.
    pub fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        CallError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
            argument: None,
        }
    }

    /// Native failure with the given message.
    pub fn native(message: impl Into<String>) -> Self {
        CallError::NativeException {
            message: message.into(),
        }
    }

    /// Attach an argument position to a type mismatch that has none yet.
    pub fn at_argument(self, index: usize) -> Self {
        match self {
            CallError::TypeMismatch {
                expected,
                actual,
                argument: None,
            } => CallError::TypeMismatch {
                expected,
                actual,
                argument: Some(index),
            },
            other => other,
        }
    }
}

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors raised while declaring classes and functions or initializing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The class was already declared.
    #[error("class '{name}' is already declared")]
    DuplicateClass { name: String },

    /// A name refers to no declared class.
    #[error("unknown class '{name}'")]
    UnknownClass { name: String },

    /// An overload group already has an entry at this arity.
    #[error("'{name}' already has an overload taking {arity} argument(s)")]
    DuplicateArity { name: String, arity: usize },

    /// An overload exceeds the configured maximum arity.
    #[error("'{name}' takes {arity} argument(s), the limit is {max}")]
    ArityLimit {
        name: String,
        arity: usize,
        max: usize,
    },

    /// The superclass graph contains a cycle through this class.
    #[error("inheritance cycle through '{name}'")]
    InheritanceCycle { name: String },

    /// Declarations were changed after initialization.
    #[error("the engine is already initialized")]
    AlreadyInitialized,
}

// ============================================================================
// Unified Error
// ============================================================================

/// Top-level error wrapping both phases.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TetherError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Call(#[from] CallError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_mismatch_display() {
        let err = CallError::ArityMismatch {
            name: "f".into(),
            argc: 3,
        };
        assert_eq!(err.to_string(), "no overload of 'f' takes 3 argument(s)");
    }

    #[test]
    fn mismatch_display_with_and_without_argument() {
        let err = CallError::mismatch("int", "string");
        assert_eq!(err.to_string(), "type mismatch: expected int, got string");
        let err = err.at_argument(1);
        assert_eq!(
            err.to_string(),
            "type mismatch in argument 1: expected int, got string"
        );
    }

    #[test]
    fn at_argument_keeps_innermost_position() {
        let err = CallError::mismatch("int", "bool").at_argument(2).at_argument(0);
        assert!(matches!(
            err,
            CallError::TypeMismatch {
                argument: Some(2),
                ..
            }
        ));
    }

    #[test]
    fn at_argument_ignores_other_kinds() {
        let err = CallError::native("boom").at_argument(0);
        assert_eq!(err, CallError::native("boom"));
    }

    #[test]
    fn use_after_free_display() {
        let err = CallError::UseAfterFree {
            handle: WrapperHandle::new(4, 2),
        };
        assert_eq!(err.to_string(), "use after free: wrapper #4.2 is no longer live");
    }

    #[test]
    fn unified_error_from() {
        let err: TetherError = RegistrationError::AlreadyInitialized.into();
        assert!(matches!(err, TetherError::Registration(_)));
        let err: TetherError = CallError::native("x").into();
        assert_eq!(err.to_string(), "native exception: x");
    }
}
