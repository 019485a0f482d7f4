//! Availability classification of retriever task failures.

use serde::{Deserialize, Serialize};

use crate::{
    status::{StatusClass, classify_status},
    types::{BackendAvailability, ResolutionHandle, RetrieverFailure},
};

/// Follow-up action chosen for a failed retriever task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Recovery {
    /// Tell the provider this retrieval method cannot be used.
    MethodNotAvailable,
    /// Tell the provider the request was cancelled.
    Cancel,
    /// Present the one-time permission prompt, then restart on approval.
    RequestPermission(ResolutionHandle),
    /// Unexpected failure; log only.
    Ignore,
}

/// Outcome of [`classify_failure`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureClassification {
    pub class: StatusClass,
    /// Availability to report, `None` while the permission prompt is pending.
    pub availability: Option<BackendAvailability>,
    pub recovery: Recovery,
}

impl FailureClassification {
    /// Whether reporting waits on the permission prompt.
    pub fn is_deferred(&self) -> bool {
        matches!(self.recovery, Recovery::RequestPermission(_))
    }
}

/// Map a retriever failure to the availability to report and the recovery to run.
///
/// Failures outside the three unavailability classes still report
/// [`BackendAvailability::Available`], the default bucket. This includes the
/// user-permission cancel path and unrecognized statuses. Only a resolvable
/// failure defers reporting, since the retried task reports on its own.
pub fn classify_failure(failure: &RetrieverFailure) -> FailureClassification {
    let class = classify_status(failure.status);
    let mut availability = BackendAvailability::default();

    let recovery = match class {
        StatusClass::ApiNotConnected => {
            availability = BackendAvailability::ApiNotConnected;
            Recovery::MethodNotAvailable
        }
        StatusClass::PlatformNotSupported => {
            availability = BackendAvailability::PlatformNotSupported;
            Recovery::MethodNotAvailable
        }
        StatusClass::ApiNotAvailable => {
            availability = BackendAvailability::ApiNotAvailable;
            Recovery::MethodNotAvailable
        }
        StatusClass::UserPermissionRequired => Recovery::Cancel,
        StatusClass::ResolutionRequired => match &failure.resolution {
            Some(handle) => {
                return FailureClassification {
                    class,
                    availability: None,
                    recovery: Recovery::RequestPermission(handle.clone()),
                };
            }
            None => Recovery::Ignore,
        },
        StatusClass::Success | StatusClass::Timeout | StatusClass::Unrecognized => {
            Recovery::Ignore
        }
    };

    FailureClassification {
        class,
        availability: Some(availability),
        recovery,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCode;

    #[test]
    fn unavailability_statuses_report_their_outcome() {
        let cases = [
            (
                StatusCode::API_NOT_CONNECTED,
                BackendAvailability::ApiNotConnected,
            ),
            (
                StatusCode::PLATFORM_NOT_SUPPORTED,
                BackendAvailability::PlatformNotSupported,
            ),
            (
                StatusCode::API_NOT_AVAILABLE,
                BackendAvailability::ApiNotAvailable,
            ),
        ];

        for (status, expected) in cases {
            let classification = classify_failure(&RetrieverFailure::api(status));
            assert_eq!(classification.availability, Some(expected), "{status}");
            assert_eq!(classification.recovery, Recovery::MethodNotAvailable);
            assert!(!classification.is_deferred());
        }
    }

    #[test]
    fn user_permission_required_cancels_and_reports_default() {
        let classification =
            classify_failure(&RetrieverFailure::api(StatusCode::USER_PERMISSION_REQUIRED));
        assert_eq!(classification.recovery, Recovery::Cancel);
        assert_eq!(
            classification.availability,
            Some(BackendAvailability::Available)
        );
    }

    #[test]
    fn resolvable_failure_defers_reporting() {
        let handle = ResolutionHandle::new();
        let classification = classify_failure(&RetrieverFailure::resolvable(
            StatusCode::RESOLUTION_REQUIRED,
            handle.clone(),
        ));
        assert_eq!(classification.class, StatusClass::ResolutionRequired);
        assert_eq!(classification.availability, None);
        assert_eq!(classification.recovery, Recovery::RequestPermission(handle));
        assert!(classification.is_deferred());
    }

    #[test]
    fn resolution_required_without_handle_is_unexpected() {
        let classification =
            classify_failure(&RetrieverFailure::api(StatusCode::RESOLUTION_REQUIRED));
        assert_eq!(classification.recovery, Recovery::Ignore);
        assert_eq!(
            classification.availability,
            Some(BackendAvailability::Available)
        );
    }

    #[test]
    fn unrecognized_status_falls_through_to_available() {
        let classification = classify_failure(&RetrieverFailure::api(StatusCode::INTERNAL_ERROR));
        assert_eq!(classification.class, StatusClass::Unrecognized);
        assert_eq!(classification.recovery, Recovery::Ignore);
        assert_eq!(
            classification.availability,
            Some(BackendAvailability::Available)
        );
    }

    #[test]
    fn handle_on_non_resolution_status_is_ignored() {
        let classification = classify_failure(&RetrieverFailure::resolvable(
            StatusCode::API_NOT_CONNECTED,
            ResolutionHandle::new(),
        ));
        assert_eq!(classification.recovery, Recovery::MethodNotAvailable);
    }
}
