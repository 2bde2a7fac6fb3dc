//! Error types for the Aspect core.
//!
//! Invocation failures are carried as [`SharedError`] so that every observer of
//! a failing call (after-throwing advice, after-finally advice and the caller)
//! sees the very same error object.

use std::sync::Arc;

use thiserror::Error;

/// An error raised by an original behavior or by an advice callback.
///
/// Reference counted so it can be handed to several advice stages and still be
/// rethrown unchanged.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Result of invoking a member.
pub type InvokeResult<T = serde_json::Value> = Result<T, SharedError>;

/// Result of running an advice callback that produces no value.
pub type AdviceResult = Result<(), SharedError>;

/// Faults raised by the engine or by a class registry while dispatching a call.
#[derive(Debug, Clone, Error)]
pub enum MemberError {
    /// The member is not a method.
    #[error("member '{0}' is not callable")]
    NotCallable(String),

    /// The member has no getter.
    #[error("member '{0}' has no getter")]
    NoGetter(String),

    /// The member has no setter.
    #[error("member '{0}' has no setter")]
    NoSetter(String),

    /// A data member that is not writable was assigned to.
    #[error("member '{0}' is read-only")]
    ReadOnly(String),

    /// An asynchronous behavior was driven from a synchronous call site.
    #[error("member '{0}' is asynchronous and cannot be invoked synchronously")]
    RequiresAsync(String),

    /// The member does not exist on the class.
    #[error("member '{member}' is not defined on class '{class}'")]
    Undefined {
        /// Owning class name.
        class: String,
        /// Requested member name.
        member: String,
    },

    /// The receiver could not be downcast to the type the behavior expects.
    #[error("receiver is not an instance of '{expected}'")]
    ReceiverMismatch {
        /// Expected receiver type name.
        expected: &'static str,
    },

    /// Custom error raised by user code.
    #[error("{0}")]
    Custom(String),
}

impl MemberError {
    /// Creates a custom error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Converts this error into a [`SharedError`].
    pub fn into_shared(self) -> SharedError {
        Arc::new(self)
    }
}

/// Shorthand for raising a custom error from a behavior or an advice callback.
///
/// ```rust
/// use aspect_core::{InvokeResult, raise};
///
/// fn always_fails() -> InvokeResult {
///     Err(raise("boom"))
/// }
/// assert_eq!(always_fails().unwrap_err().to_string(), "boom");
/// ```
pub fn raise(msg: impl Into<String>) -> SharedError {
    MemberError::custom(msg).into_shared()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            MemberError::NoSetter("value".into()).to_string(),
            "member 'value' has no setter"
        );
        assert_eq!(
            MemberError::Undefined {
                class: "Counter".into(),
                member: "reset".into(),
            }
            .to_string(),
            "member 'reset' is not defined on class 'Counter'"
        );
    }

    #[test]
    fn test_raise_keeps_message() {
        let err = raise("boom");
        assert_eq!(err.to_string(), "boom");
        assert!(err.downcast_ref::<MemberError>().is_some());
    }
}
