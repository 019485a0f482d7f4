use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::status::{Status, StatusCode};

/// Notification action announcing that a browser code was retrieved (or timed out).
pub const SMS_CODE_RETRIEVED_ACTION: &str =
    "com.google.android.gms.auth.api.phone.SMS_CODE_RETRIEVED";
/// Extras key holding the serialized [`Status`].
pub const EXTRA_STATUS: &str = "com.google.android.gms.auth.api.phone.EXTRA_STATUS";
/// Extras key holding the retrieved code line.
pub const EXTRA_SMS_CODE_LINE: &str = "com.google.android.gms.auth.api.phone.EXTRA_SMS_CODE_LINE";

/// Histogram recording [`BackendAvailability`] outcomes.
pub const BACKEND_AVAILABILITY_HISTOGRAM: &str = "Blink.Sms.BackendAvailability";
/// Exclusive upper bound of the availability histogram.
pub const BACKEND_AVAILABILITY_BUCKETS: usize = 4;

/// Whether the retriever backend could serve a request.
///
/// `Available` is the default: classification paths that match no specific
/// unavailability branch report it as well (see `classifier`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum BackendAvailability {
    #[default]
    Available,
    ApiNotConnected,
    PlatformNotSupported,
    ApiNotAvailable,
}

impl BackendAvailability {
    pub const ALL: [Self; BACKEND_AVAILABILITY_BUCKETS] = [
        Self::Available,
        Self::ApiNotConnected,
        Self::PlatformNotSupported,
        Self::ApiNotAvailable,
    ];

    /// Histogram bucket for this outcome.
    pub fn ordinal(self) -> usize {
        self as usize
    }
}

/// Retrieval backend a code was delivered through.
///
/// The user-consent backend has its own receiver owned by the provider, so
/// this receiver only ever reports the verification backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GmsBackend {
    /// Browser-code verification flow.
    Verification,
}

/// Identifier of one retrieval attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Opaque deferred action that presents the one-time permission prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResolutionHandle {
    id: Uuid,
}

impl ResolutionHandle {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for ResolutionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure of the browser-code retriever task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("retriever task failed with status {status}")]
pub struct RetrieverFailure {
    /// Platform status code.
    pub status: StatusCode,
    /// Present only when the failure can be resolved through a prompt.
    pub resolution: Option<ResolutionHandle>,
}

impl RetrieverFailure {
    /// A plain API failure without a resolution.
    pub fn api(status: StatusCode) -> Self {
        Self {
            status,
            resolution: None,
        }
    }

    /// A failure the user can resolve through `resolution`.
    pub fn resolvable(status: StatusCode, resolution: ResolutionHandle) -> Self {
        Self {
            status,
            resolution: Some(resolution),
        }
    }
}

/// Result code delivered by a completed permission prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PromptResult(pub i32);

impl PromptResult {
    pub const OK: Self = Self(-1);
    pub const CANCELED: Self = Self(0);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }
}

/// Notification as delivered by the platform hub, before validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawNotification {
    pub action: String,
    pub extras: Option<Map<String, Value>>,
}

impl RawNotification {
    /// A notification without extras.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            extras: None,
        }
    }

    /// Attach one extra, creating the extras bundle when needed.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Well-formed code-retrieved notification as the platform sends it.
    pub fn code_retrieved(status: StatusCode, code_line: Option<&str>) -> Self {
        let status = serde_json::to_value(Status::new(status)).unwrap_or(Value::Null);
        let notification = Self::new(SMS_CODE_RETRIEVED_ACTION).with_extra(EXTRA_STATUS, status);
        match code_line {
            Some(line) => notification.with_extra(EXTRA_SMS_CODE_LINE, line),
            None => notification,
        }
    }
}

/// Validated notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationEvent {
    CodeReceived { code: String },
    TimedOut,
}

/// Receiver lifecycle state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReceiverLifecycleState {
    /// Subscribed to notifications, no retrieval in flight.
    Idle,
    /// A retriever task is in flight.
    Retrieving,
    /// The one-time permission prompt is showing.
    AwaitingPermission,
    /// Unsubscribed; no further sessions.
    Destroyed,
}

/// Observability stream emitted by the receiver runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReceiverEvent {
    StateChanged {
        state: ReceiverLifecycleState,
    },
    SessionStarted {
        session: SessionId,
        is_local_request: bool,
    },
    /// A code was forwarded to the provider.
    CodeDelivered {
        code: String,
        backend: GmsBackend,
    },
    /// The provider was told the retrieval timed out.
    TimedOut,
    /// The provider was told the request was cancelled.
    Cancelled,
    /// The provider was told this method cannot be used.
    MethodNotAvailable {
        is_local_request: bool,
    },
    AvailabilityReported {
        availability: BackendAvailability,
    },
    PermissionRequested {
        session: SessionId,
    },
    /// A code-retrieved notification was lost before the runtime saw it.
    NotificationDropped {
        reason: String,
    },
    /// The retriever task of `session` went away without an outcome.
    RetrievalAbandoned {
        session: SessionId,
    },
    /// The permission prompt could not be launched or never completed.
    PermissionAbandoned {
        session: SessionId,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_ordinals_follow_histogram_buckets() {
        let ordinals: Vec<_> = BackendAvailability::ALL
            .iter()
            .map(|a| a.ordinal())
            .collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
        assert!(
            BackendAvailability::ALL
                .iter()
                .all(|a| a.ordinal() < BACKEND_AVAILABILITY_BUCKETS)
        );
        assert_eq!(BackendAvailability::default(), BackendAvailability::Available);
    }

    #[test]
    fn code_retrieved_builder_sets_status_and_code_line() {
        let raw = RawNotification::code_retrieved(StatusCode::SUCCESS, Some("123456"));
        assert_eq!(raw.action, SMS_CODE_RETRIEVED_ACTION);

        let extras = raw.extras.expect("extras should be present");
        assert_eq!(extras[EXTRA_STATUS]["status_code"], 0);
        assert_eq!(extras[EXTRA_SMS_CODE_LINE], "123456");
    }

    #[test]
    fn only_result_ok_grants_permission() {
        assert!(PromptResult::OK.is_ok());
        assert!(!PromptResult::CANCELED.is_ok());
        assert!(!PromptResult(1).is_ok());
    }

    #[test]
    fn resolution_handles_are_distinct() {
        assert_ne!(ResolutionHandle::new(), ResolutionHandle::new());
    }
}
