use crate::types::{Address, Role, Selector};
use thiserror::Error;

/// Marker used when a downstream object fails without saying why.
pub const GENERIC_DISPATCH_FAILURE: &str = "dispatch failed";

#[derive(Debug, Error)]
pub enum XactError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("reentrant dispatch on {0}")]
    Reentrant(Address),

    #[error("unsupported action {0}")]
    UnsupportedAction(Selector),

    #[error("invalid origin: {0} does not resolve to the expected object")]
    InvalidOrigin(Address),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// A nested call rejected the action. The message is carried verbatim.
    #[error("{0}")]
    DownstreamFailure(String),

    #[error("approve to caller")]
    ApproveToCaller,

    #[error("invalid receiver: {0} is neither the target nor the arbiter")]
    InvalidReceiver(Address),

    #[error("malformed action: {0}")]
    MalformedAction(String),

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("object not found: {0}")]
    ObjectNotFound(Address),

    #[error("object already exists: {0}")]
    ObjectExists(Address),

    #[error("{0} does not implement the {1} role")]
    RoleNotImplemented(Address, Role),

    #[error("insufficient balance: {account} holds {available}, needs {required}")]
    InsufficientBalance {
        account: Address,
        available: u64,
        required: u64,
    },

    #[error("balance overflow: crediting {account} would exceed the maximum balance")]
    BalanceOverflow { account: Address },

    #[error("call depth exceeded (limit {0})")]
    CallDepthExceeded(usize),

    #[error("integrity counter exhausted on {0}")]
    CounterExhausted(Address),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl XactError {
    /// Rejection raised by action handlers (business logic).
    pub fn revert(message: impl Into<String>) -> Self {
        XactError::DownstreamFailure(message.into())
    }

    /// Normalise a failure coming back from a nested call.
    ///
    /// Everything is passed through untouched except a downstream rejection
    /// with an empty message, which becomes [`GENERIC_DISPATCH_FAILURE`].
    pub fn surfaced(self) -> Self {
        match self {
            XactError::DownstreamFailure(msg) if msg.trim().is_empty() => {
                XactError::DownstreamFailure(GENERIC_DISPATCH_FAILURE.to_string())
            }
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, XactError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_message_is_verbatim() {
        let err = XactError::revert("target is out of range");
        assert_eq!(err.to_string(), "target is out of range");
    }

    #[test]
    fn empty_downstream_failure_gets_marker() {
        let err = XactError::revert("").surfaced();
        assert_eq!(err.to_string(), GENERIC_DISPATCH_FAILURE);

        let err = XactError::revert("   ").surfaced();
        assert_eq!(err.to_string(), GENERIC_DISPATCH_FAILURE);
    }

    #[test]
    fn surfaced_keeps_typed_errors() {
        let err = XactError::InvalidAction("stale counter".to_string()).surfaced();
        assert!(matches!(err, XactError::InvalidAction(ref m) if m == "stale counter"));
    }
}
