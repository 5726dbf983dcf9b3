// vim: tw=80
//! The single error type for all Moxie operations.

/// Everything that can go wrong while declaring, dispatching, verifying or
/// checking.
///
/// Configuration errors are always returned to the declarer before any call
/// is dispatched.  Dispatch errors are returned to the caller of the mocked
/// method when it runs on the session's owning thread, and are otherwise
/// deferred until the next [`Session::verify`](crate::Session::verify).
/// None of them leave the engine in an inconsistent state.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// Bad cardinality range, matcher arity mismatch, mismatched
    /// consecutive-behavior count, or a builder option applied twice.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No expectation accepted a call made to a strict mock, either because
    /// nothing matched, everything that matched was exhausted, or the call
    /// arrived out of order.
    #[error("unexpected invocation: {0}")]
    UnexpectedInvocation(String),

    /// An expectation or group was not satisfied, or a deferred background
    /// failure surfaced.
    #[error("failed verification: {0}")]
    FailedVerification(String),

    /// A post-hoc `check` counted the wrong number of invocations.
    #[error("failed check: {0}")]
    FailedCheck(String),

    /// Invocations remained that no `check` had examined.
    #[error("unchecked invocation(s): {0}")]
    UncheckedInvocation(String),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// The rendered message, without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::Configuration(m)
            | Error::UnexpectedInvocation(m)
            | Error::FailedVerification(m)
            | Error::FailedCheck(m)
            | Error::UncheckedInvocation(m) => m,
        }
    }
}

/// Alias used by every fallible Moxie API.
pub type Result<T> = std::result::Result<T, Error>;
