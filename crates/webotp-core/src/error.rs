use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ReceiverLifecycleState;

/// Broad error category used by callers of the receiver handle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReceiverErrorCategory {
    /// Operation not allowed in the current lifecycle state.
    Lifecycle,
    /// The runtime input channel is gone.
    Channel,
}

/// Stable receiver error payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct ReceiverError {
    /// High-level error category.
    pub category: ReceiverErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ReceiverError {
    pub fn new(
        category: ReceiverErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build a standard invalid-state-transition error.
    pub fn invalid_state(current: ReceiverLifecycleState, action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            ReceiverErrorCategory::Lifecycle,
            "invalid_state_transition",
            format!("cannot run '{action}' while receiver is in state {current:?}"),
        )
    }

    /// The runtime stopped before answering.
    pub fn runtime_closed(action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            ReceiverErrorCategory::Channel,
            "runtime_closed",
            format!("receiver runtime stopped before handling '{action}'"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_invalid_state_error_code_stable() {
        let err = ReceiverError::invalid_state(ReceiverLifecycleState::Destroyed, "listen");
        assert_eq!(err.code, "invalid_state_transition");
        assert_eq!(err.category, ReceiverErrorCategory::Lifecycle);
        assert!(err.message.contains("'listen'"));
    }

    #[test]
    fn runtime_closed_is_a_channel_error() {
        let err = ReceiverError::runtime_closed("destroy");
        assert_eq!(err.code, "runtime_closed");
        assert_eq!(err.category, ReceiverErrorCategory::Channel);
        assert_eq!(
            err.to_string(),
            "Channel:runtime_closed: receiver runtime stopped before handling 'destroy'"
        );
    }
}
