//! Map provider failures onto the typed error kinds.
//!
//! Structured signals (transport flags, HTTP status, OAuth `error` codes, Google `reason`
//! fields) are consulted first. Message substrings are only inspected when nothing structured
//! is available, and that path always logs the raw text.

use tracing::warn;

use super::error::{AuthError, InitErrorKind};

/// Which part of initialization failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    /// Loading the remote API description.
    ClientLibrary,
    /// Loading the auth provider configuration.
    AuthSubsystem,
}

impl InitStage {
    fn default_kind(self) -> InitErrorKind {
        match self {
            InitStage::ClientLibrary => InitErrorKind::ScriptNotLoaded,
            InitStage::AuthSubsystem => InitErrorKind::AuthUnavailable,
        }
    }
}

/// Everything known about a failed initialization request.
#[derive(Debug, Clone, Default)]
pub struct FailureSignal<'a> {
    pub timed_out: bool,
    pub connect_failed: bool,
    pub status: Option<u16>,
    /// Google `error.status`, e.g. `PERMISSION_DENIED`.
    pub google_status: Option<&'a str>,
    /// Google `error.details[].reason` or `error.errors[].reason`.
    pub google_reason: Option<&'a str>,
    pub message: &'a str,
}

/// Classify an initialization failure.
pub fn classify_init_failure(stage: InitStage, signal: &FailureSignal<'_>) -> InitErrorKind {
    if signal.timed_out {
        return InitErrorKind::NetworkTimeout;
    }

    if let Some(reason) = signal.google_reason {
        if is_origin_reason(reason) {
            return InitErrorKind::CrossOriginBlocked;
        }
        return stage.default_kind();
    }

    if signal.connect_failed || signal.status.is_some() || signal.google_status.is_some() {
        return stage.default_kind();
    }

    classify_init_message(stage, signal.message)
}

fn is_origin_reason(reason: &str) -> bool {
    let upper = reason.to_ascii_uppercase();
    upper.contains("REFERRER_BLOCKED")
        || upper.contains("ORIGIN_MISMATCH")
        || upper.contains("ORIGINMISMATCH")
        || upper.contains("CORS")
}

/// Last-resort classification from free text.
pub fn classify_init_message(stage: InitStage, message: &str) -> InitErrorKind {
    warn!(
        ?stage,
        raw = message,
        "classifying initialization failure from message text"
    );
    let lower = message.to_ascii_lowercase();
    if lower.contains("cors")
        || lower.contains("cross-origin")
        || lower.contains("blocked")
        || lower.contains("response header")
    {
        InitErrorKind::CrossOriginBlocked
    } else if lower.contains("timeout") || lower.contains("timed out") {
        InitErrorKind::NetworkTimeout
    } else {
        stage.default_kind()
    }
}

/// Translate an OAuth error response into an [`AuthError`].
///
/// `code` is the `error` field of the response, `description` its `error_description`.
pub fn classify_auth_failure(code: Option<&str>, description: &str) -> AuthError {
    if let Some(code) = code {
        if let Some(err) = auth_error_for_code(code, description) {
            return err;
        }
    }

    warn!(
        code = ?code,
        raw = description,
        "classifying auth failure from message text"
    );
    let lower = description.to_ascii_lowercase();
    for candidate in [
        "popup_closed_by_user",
        "access_denied",
        "invalid_client",
        "unauthorized_client",
        "no registered origin",
        "invalid_grant",
        "invalid_token",
    ] {
        if lower.contains(candidate) {
            if let Some(err) = auth_error_for_code(candidate, description) {
                return err;
            }
        }
    }

    AuthError::provider(description.to_owned())
}

fn auth_error_for_code(code: &str, description: &str) -> Option<AuthError> {
    let err = match code {
        "popup_closed_by_user" => AuthError::PopupClosed,
        "access_denied" => AuthError::AccessDenied,
        "invalid_client" | "unauthorized_client" | "no registered origin" => {
            AuthError::InvalidClient(description.to_owned())
        }
        "invalid_grant" | "invalid_token" => AuthError::InvalidToken,
        _ => return None,
    };
    Some(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_win_over_everything() {
        let signal = FailureSignal {
            timed_out: true,
            status: Some(403),
            google_reason: Some("API_KEY_HTTP_REFERRER_BLOCKED"),
            ..Default::default()
        };
        assert_eq!(
            classify_init_failure(InitStage::ClientLibrary, &signal),
            InitErrorKind::NetworkTimeout
        );
    }

    #[test]
    fn referrer_reason_is_cross_origin() {
        let signal = FailureSignal {
            status: Some(403),
            google_status: Some("PERMISSION_DENIED"),
            google_reason: Some("API_KEY_HTTP_REFERRER_BLOCKED"),
            message: "Requests from referer are blocked.",
            ..Default::default()
        };
        let kind = classify_init_failure(InitStage::AuthSubsystem, &signal);
        assert_eq!(kind, InitErrorKind::CrossOriginBlocked);
        assert!(!kind.is_retryable());
    }

    #[test]
    fn status_without_reason_uses_stage() {
        let signal = FailureSignal {
            status: Some(503),
            message: "blocked by upstream",
            ..Default::default()
        };
        assert_eq!(
            classify_init_failure(InitStage::ClientLibrary, &signal),
            InitErrorKind::ScriptNotLoaded
        );
        assert_eq!(
            classify_init_failure(InitStage::AuthSubsystem, &signal),
            InitErrorKind::AuthUnavailable
        );
    }

    #[test]
    fn message_fallback() {
        assert_eq!(
            classify_init_message(InitStage::ClientLibrary, "CORS policy: No header"),
            InitErrorKind::CrossOriginBlocked
        );
        assert_eq!(
            classify_init_message(InitStage::AuthSubsystem, "operation timed out"),
            InitErrorKind::NetworkTimeout
        );
        assert_eq!(
            classify_init_message(InitStage::AuthSubsystem, "something odd"),
            InitErrorKind::AuthUnavailable
        );
    }

    #[test]
    fn oauth_codes_are_typed() {
        assert!(matches!(
            classify_auth_failure(Some("access_denied"), "user said no"),
            AuthError::AccessDenied
        ));
        assert!(matches!(
            classify_auth_failure(Some("invalid_client"), "The OAuth client was not found."),
            AuthError::InvalidClient(message) if message == "The OAuth client was not found."
        ));
        assert!(matches!(
            classify_auth_failure(Some("invalid_grant"), "Bad Request"),
            AuthError::InvalidToken
        ));
    }

    #[test]
    fn unknown_codes_fall_back_to_text() {
        assert!(matches!(
            classify_auth_failure(Some("weird"), "popup_closed_by_user"),
            AuthError::PopupClosed
        ));
        assert!(matches!(
            classify_auth_failure(None, "boom"),
            AuthError::Provider { message, .. } if message == "boom"
        ));
    }
}
