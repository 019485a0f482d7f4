//! Environment-backed configuration for the receiver runtime.

use std::{env, error::Error, fmt};

use webotp_core::SMS_CODE_RETRIEVED_ACTION;

const DEFAULT_INPUT_BUFFER: usize = 64;
const DEFAULT_EVENT_BUFFER: usize = 128;

/// Runtime configuration of one receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Capacity of the runtime input queue.
    pub input_buffer: usize,
    /// Capacity of the observer event stream.
    pub event_buffer: usize,
    /// Notification action the receiver registers for.
    pub code_retrieved_action: String,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            input_buffer: DEFAULT_INPUT_BUFFER,
            event_buffer: DEFAULT_EVENT_BUFFER,
            code_retrieved_action: SMS_CODE_RETRIEVED_ACTION.to_owned(),
        }
    }
}

impl ReceiverConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let input_buffer =
            parse_buffer_size("WEBOTP_INPUT_BUFFER", DEFAULT_INPUT_BUFFER, &mut lookup)?;
        let event_buffer =
            parse_buffer_size("WEBOTP_EVENT_BUFFER", DEFAULT_EVENT_BUFFER, &mut lookup)?;
        let code_retrieved_action = lookup("WEBOTP_CODE_RETRIEVED_ACTION")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| SMS_CODE_RETRIEVED_ACTION.to_owned());

        Ok(Self {
            input_buffer,
            event_buffer,
            code_retrieved_action,
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

fn parse_buffer_size<F>(
    key: &'static str,
    default: usize,
    lookup: &mut F,
) -> Result<usize, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    let parsed = value
        .trim()
        .parse::<usize>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value: value.clone(),
            reason: err.to_string(),
        })?;
    if parsed == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "must be at least 1".to_owned(),
        });
    }
    Ok(parsed)
}
