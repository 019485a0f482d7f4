//! Smoke run configuration parsing.

use std::{env, error::Error, fmt, str::FromStr, time::Duration};

use webotp_receiver::{ConfigError as ReceiverConfigError, ReceiverConfig};

const DEFAULT_CODE: &str = "123456";
const DEFAULT_WAIT_MS: u64 = 500;

/// Scripted platform behavior for one smoke run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Retriever starts, then a code arrives.
    Code,
    /// Retriever starts, then the retrieval times out.
    Timeout,
    NotConnected,
    PlatformNotSupported,
    NotAvailable,
    /// Retriever fails with user-permission-required.
    PermissionRequired,
    /// One-time permission prompt shown and granted, then a code arrives.
    ResolutionGranted,
    /// One-time permission prompt shown and denied.
    ResolutionDenied,
}

impl Scenario {
    pub const NAMES: [&'static str; 8] = [
        "code",
        "timeout",
        "not-connected",
        "platform-not-supported",
        "not-available",
        "permission-required",
        "resolution-granted",
        "resolution-denied",
    ];

    /// Sessions to observe before the hub broadcasts a code-retrieved
    /// notification; zero means the run never broadcasts one.
    pub fn sessions_before_notification(self) -> usize {
        match self {
            Self::Code | Self::Timeout => 1,
            Self::ResolutionGranted => 2,
            _ => 0,
        }
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "code" => Ok(Self::Code),
            "timeout" => Ok(Self::Timeout),
            "not-connected" => Ok(Self::NotConnected),
            "platform-not-supported" => Ok(Self::PlatformNotSupported),
            "not-available" => Ok(Self::NotAvailable),
            "permission-required" => Ok(Self::PermissionRequired),
            "resolution-granted" => Ok(Self::ResolutionGranted),
            "resolution-denied" => Ok(Self::ResolutionDenied),
            other => Err(format!(
                "unknown scenario '{other}', expected one of: {}",
                Self::NAMES.join(", ")
            )),
        }
    }
}

/// Configuration of one smoke run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeConfig {
    pub receiver: ReceiverConfig,
    pub scenario: Scenario,
    pub code: String,
    pub is_local_request: bool,
    /// How long to print events before destroying the receiver.
    pub wait: Duration,
}

impl SmokeConfig {
    pub fn from_env() -> Result<Self, SmokeConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(mut lookup: F) -> Result<Self, SmokeConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let receiver = ReceiverConfig::from_lookup(&mut lookup)?;

        let scenario = match non_empty(lookup("WEBOTP_SMOKE_SCENARIO")) {
            Some(value) => value
                .parse()
                .map_err(|reason| invalid("WEBOTP_SMOKE_SCENARIO", &value, reason))?,
            None => Scenario::Code,
        };

        let code =
            non_empty(lookup("WEBOTP_SMOKE_CODE")).unwrap_or_else(|| DEFAULT_CODE.to_owned());

        let is_local_request = match non_empty(lookup("WEBOTP_SMOKE_LOCAL")) {
            Some(value) => parse_bool(&value)
                .ok_or_else(|| invalid("WEBOTP_SMOKE_LOCAL", &value, "expected a boolean"))?,
            None => true,
        };

        let wait_ms = match non_empty(lookup("WEBOTP_SMOKE_WAIT_MS")) {
            Some(value) => value
                .parse::<u64>()
                .map_err(|err| invalid("WEBOTP_SMOKE_WAIT_MS", &value, err.to_string()))?,
            None => DEFAULT_WAIT_MS,
        };

        Ok(Self {
            receiver,
            scenario,
            code,
            is_local_request,
            wait: Duration::from_millis(wait_ms),
        })
    }
}

/// Errors produced while parsing smoke configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmokeConfigError {
    Receiver(ReceiverConfigError),
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for SmokeConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Receiver(err) => err.fmt(f),
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for SmokeConfigError {}

impl From<ReceiverConfigError> for SmokeConfigError {
    fn from(err: ReceiverConfigError) -> Self {
        Self::Receiver(err)
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> SmokeConfigError {
    SmokeConfigError::InvalidValue {
        key,
        value: value.to_owned(),
        reason: reason.into(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
