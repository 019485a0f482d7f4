//! Core contract of the WebOTP verification-code receiver.
//!
//! This crate defines the status taxonomy, the availability classifier,
//! notification validation, the receiver lifecycle model, and the
//! input/event channel abstractions shared by the runtime and its callers.

/// Async input/event channel primitives.
pub mod channel;
/// Retriever failure classification into availability outcomes.
pub mod classifier;
/// Stable receiver error types.
pub mod error;
/// Validation of code-retrieved notifications.
pub mod notification;
/// Receiver lifecycle state machine.
pub mod state_machine;
/// Platform status codes and their classes.
pub mod status;
/// Data types shared with collaborators and observers.
pub mod types;

pub use channel::{EventStream, ReceiverChannelError, ReceiverChannels};
pub use classifier::{FailureClassification, Recovery, classify_failure};
pub use error::{ReceiverError, ReceiverErrorCategory};
pub use notification::{NotificationSkip, parse_notification};
pub use state_machine::ReceiverStateMachine;
pub use status::{Status, StatusClass, StatusCode, classify_status};
pub use types::{
    BACKEND_AVAILABILITY_BUCKETS, BACKEND_AVAILABILITY_HISTOGRAM, BackendAvailability,
    EXTRA_SMS_CODE_LINE, EXTRA_STATUS, GmsBackend, NotificationEvent, PromptResult,
    RawNotification, ReceiverEvent, ReceiverLifecycleState, ResolutionHandle, RetrieverFailure,
    SMS_CODE_RETRIEVED_ACTION, SessionId,
};
