use thiserror::Error;

use crate::{
    status::{Status, StatusCode},
    types::{EXTRA_SMS_CODE_LINE, EXTRA_STATUS, NotificationEvent, RawNotification},
};

/// Reason a raw notification produced no event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationSkip {
    #[error("unexpected action '{0}'")]
    UnexpectedAction(String),
    #[error("notification carries no extras")]
    MissingExtras,
    #[error("cannot read status: {0}")]
    MalformedStatus(String),
    #[error("success notification without a readable code line")]
    MissingCodeLine,
    #[error("unhandled status {0}")]
    UnhandledStatus(StatusCode),
}

/// Validate a raw notification for `expected_action` and extract its event.
pub fn parse_notification(
    expected_action: &str,
    raw: &RawNotification,
) -> Result<NotificationEvent, NotificationSkip> {
    if raw.action != expected_action {
        return Err(NotificationSkip::UnexpectedAction(raw.action.clone()));
    }

    let Some(extras) = raw.extras.as_ref() else {
        return Err(NotificationSkip::MissingExtras);
    };

    let status = extras
        .get(EXTRA_STATUS)
        .ok_or_else(|| NotificationSkip::MalformedStatus("status extra missing".to_owned()))
        .and_then(|value| {
            serde_json::from_value::<Status>(value.clone())
                .map_err(|err| NotificationSkip::MalformedStatus(err.to_string()))
        })?;

    match status.status_code {
        StatusCode::SUCCESS => extras
            .get(EXTRA_SMS_CODE_LINE)
            .and_then(|value| value.as_str())
            .map(|code| NotificationEvent::CodeReceived {
                code: code.to_owned(),
            })
            .ok_or(NotificationSkip::MissingCodeLine),
        StatusCode::TIMEOUT => Ok(NotificationEvent::TimedOut),
        other => Err(NotificationSkip::UnhandledStatus(other)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::SMS_CODE_RETRIEVED_ACTION;

    #[test]
    fn extracts_code_from_success_notification() {
        let raw = RawNotification::code_retrieved(StatusCode::SUCCESS, Some("123456"));
        assert_eq!(
            parse_notification(SMS_CODE_RETRIEVED_ACTION, &raw),
            Ok(NotificationEvent::CodeReceived {
                code: "123456".into()
            })
        );
    }

    #[test]
    fn maps_timeout_status() {
        let raw = RawNotification::code_retrieved(StatusCode::TIMEOUT, None);
        assert_eq!(
            parse_notification(SMS_CODE_RETRIEVED_ACTION, &raw),
            Ok(NotificationEvent::TimedOut)
        );
    }

    #[test]
    fn skips_other_actions() {
        let raw = RawNotification::new("android.intent.action.SCREEN_ON");
        assert_eq!(
            parse_notification(SMS_CODE_RETRIEVED_ACTION, &raw),
            Err(NotificationSkip::UnexpectedAction(
                "android.intent.action.SCREEN_ON".into()
            ))
        );
    }

    #[test]
    fn skips_notification_without_extras() {
        let raw = RawNotification::new(SMS_CODE_RETRIEVED_ACTION);
        assert_eq!(
            parse_notification(SMS_CODE_RETRIEVED_ACTION, &raw),
            Err(NotificationSkip::MissingExtras)
        );
    }

    #[test]
    fn skips_unreadable_status() {
        let raw = RawNotification::new(SMS_CODE_RETRIEVED_ACTION)
            .with_extra(EXTRA_STATUS, json!("not-a-status"));
        assert!(matches!(
            parse_notification(SMS_CODE_RETRIEVED_ACTION, &raw),
            Err(NotificationSkip::MalformedStatus(_))
        ));

        let raw = RawNotification::new(SMS_CODE_RETRIEVED_ACTION)
            .with_extra(EXTRA_SMS_CODE_LINE, "123456");
        assert!(matches!(
            parse_notification(SMS_CODE_RETRIEVED_ACTION, &raw),
            Err(NotificationSkip::MalformedStatus(_))
        ));
    }

    #[test]
    fn skips_success_without_code_line() {
        let raw = RawNotification::code_retrieved(StatusCode::SUCCESS, None);
        assert_eq!(
            parse_notification(SMS_CODE_RETRIEVED_ACTION, &raw),
            Err(NotificationSkip::MissingCodeLine)
        );
    }

    #[test]
    fn leaves_other_statuses_unhandled() {
        let raw = RawNotification::code_retrieved(StatusCode::INTERNAL_ERROR, Some("123456"));
        assert_eq!(
            parse_notification(SMS_CODE_RETRIEVED_ACTION, &raw),
            Err(NotificationSkip::UnhandledStatus(StatusCode::INTERNAL_ERROR))
        );
    }
}
