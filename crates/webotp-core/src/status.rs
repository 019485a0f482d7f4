use std::fmt;

use serde::{Deserialize, Serialize};

/// Platform status code attached to retriever task failures and to
/// code-retrieved notifications.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct StatusCode(pub i32);

impl StatusCode {
    /// The operation completed successfully.
    pub const SUCCESS: Self = Self(0);
    /// The failure can be resolved by launching a resolution prompt.
    pub const RESOLUTION_REQUIRED: Self = Self(6);
    /// Internal platform error.
    pub const INTERNAL_ERROR: Self = Self(8);
    /// The retrieval window elapsed without a code.
    pub const TIMEOUT: Self = Self(15);
    /// The platform retriever service is not connected (usually outdated).
    pub const API_NOT_CONNECTED: Self = Self(36600);
    /// The OS version is too old for the retriever API.
    pub const PLATFORM_NOT_SUPPORTED: Self = Self(36601);
    /// The user has not granted the one-time permission.
    pub const USER_PERMISSION_REQUIRED: Self = Self(36602);
    /// The API is unavailable to this caller (e.g. not the default browser).
    pub const API_NOT_AVAILABLE: Self = Self(36603);
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for StatusCode {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Status parcel carried under [`crate::types::EXTRA_STATUS`] in notification extras.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Status {
    pub status_code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl Status {
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            status_message: None,
        }
    }
}

/// Coarse meaning of a platform status code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Timeout,
    ApiNotConnected,
    PlatformNotSupported,
    ApiNotAvailable,
    UserPermissionRequired,
    ResolutionRequired,
    Unrecognized,
}

/// Map platform status codes to their class.
pub fn classify_status(status: StatusCode) -> StatusClass {
    match status {
        StatusCode::SUCCESS => StatusClass::Success,
        StatusCode::TIMEOUT => StatusClass::Timeout,
        StatusCode::API_NOT_CONNECTED => StatusClass::ApiNotConnected,
        StatusCode::PLATFORM_NOT_SUPPORTED => StatusClass::PlatformNotSupported,
        StatusCode::API_NOT_AVAILABLE => StatusClass::ApiNotAvailable,
        StatusCode::USER_PERMISSION_REQUIRED => StatusClass::UserPermissionRequired,
        StatusCode::RESOLUTION_REQUIRED => StatusClass::ResolutionRequired,
        _ => StatusClass::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_status_codes() {
        assert_eq!(classify_status(StatusCode::SUCCESS), StatusClass::Success);
        assert_eq!(classify_status(StatusCode(15)), StatusClass::Timeout);
        assert_eq!(
            classify_status(StatusCode(36600)),
            StatusClass::ApiNotConnected
        );
        assert_eq!(
            classify_status(StatusCode::USER_PERMISSION_REQUIRED),
            StatusClass::UserPermissionRequired
        );
        assert_eq!(
            classify_status(StatusCode::RESOLUTION_REQUIRED),
            StatusClass::ResolutionRequired
        );
    }

    #[test]
    fn unknown_codes_are_unrecognized() {
        assert_eq!(
            classify_status(StatusCode::INTERNAL_ERROR),
            StatusClass::Unrecognized
        );
        assert_eq!(classify_status(StatusCode(-42)), StatusClass::Unrecognized);
    }

    #[test]
    fn status_parcel_reads_without_message() {
        let status: Status =
            serde_json::from_value(serde_json::json!({ "status_code": 15 })).expect("parse");
        assert_eq!(status, Status::new(StatusCode::TIMEOUT));
    }
}
