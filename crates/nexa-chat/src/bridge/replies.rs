//! In-character strings that stand in for failed or empty model replies.

use super::gemini::{BackendError, GenerateResponse};

pub const PERMISSION_DENIED_REPLY: &str =
    "*[System error: access to the API was denied. Check the API key settings or the account balance]*";
pub const RATE_LIMITED_REPLY: &str =
    "*[The character is tired (too many requests). Wait a little...]*";
pub const CONNECTION_REPLY: &str =
    "*[Connection error. Please press 'Regenerate' or try again later]*";
pub const SILENT_REPLY: &str = "*looks at you silently*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    PermissionDenied,
    RateLimited,
    Connection,
}

impl FailureKind {
    pub fn classify(error: &BackendError) -> Self {
        if let BackendError::Status { status, message } = error {
            if matches!(status, 401 | 403) || message.to_lowercase().contains("permission denied") {
                return FailureKind::PermissionDenied;
            }
            if *status == 429 {
                return FailureKind::RateLimited;
            }
        }
        FailureKind::Connection
    }

    pub fn reply(&self) -> &'static str {
        match self {
            FailureKind::PermissionDenied => PERMISSION_DENIED_REPLY,
            FailureKind::RateLimited => RATE_LIMITED_REPLY,
            FailureKind::Connection => CONNECTION_REPLY,
        }
    }
}

pub fn blocked_reply(reason: &str) -> String {
    format!(
        "*The character hesitates, not knowing how to react (System: Content blocked by {}). Try rephrasing.*",
        reason
    )
}

/// Text to show for a successful exchange, and whether it is a real turn
/// worth keeping in the session history.
pub fn interpret(response: GenerateResponse) -> (String, bool) {
    if !response.text.trim().is_empty() {
        return (response.text, true);
    }
    if let Some(reason) = response.block_reason {
        return (blocked_reply(&reason), false);
    }
    match response.finish_reason {
        Some(reason) if reason != "STOP" => (blocked_reply(&reason), false),
        _ => (SILENT_REPLY.to_string(), false),
    }
}

/// True for the bracketed system error strings produced above.
pub fn is_error_reply(text: &str) -> bool {
    text.starts_with("*[") && text.to_lowercase().contains("error")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, message: &str) -> BackendError {
        BackendError::Status { status, message: message.to_string() }
    }

    #[test]
    fn test_classify() {
        assert_eq!(FailureKind::classify(&status(403, "")), FailureKind::PermissionDenied);
        assert_eq!(FailureKind::classify(&status(401, "")), FailureKind::PermissionDenied);
        assert_eq!(
            FailureKind::classify(&status(400, "Permission denied on resource")),
            FailureKind::PermissionDenied
        );
        assert_eq!(FailureKind::classify(&status(429, "quota")), FailureKind::RateLimited);
        assert_eq!(FailureKind::classify(&status(500, "boom")), FailureKind::Connection);
        assert_eq!(
            FailureKind::classify(&BackendError::Transport("reset".into())),
            FailureKind::Connection
        );
    }

    #[test]
    fn test_interpret_empty_replies() {
        let blocked = interpret(GenerateResponse {
            text: String::new(),
            finish_reason: Some("SAFETY".into()),
            block_reason: None,
        });
        assert_eq!(blocked.0, blocked_reply("SAFETY"));
        assert!(!blocked.1);

        let prompt_blocked = interpret(GenerateResponse {
            text: String::new(),
            finish_reason: None,
            block_reason: Some("OTHER".into()),
        });
        assert!(prompt_blocked.0.contains("Content blocked by OTHER"));

        let silent = interpret(GenerateResponse {
            text: "  ".into(),
            finish_reason: Some("STOP".into()),
            block_reason: None,
        });
        assert_eq!(silent, (SILENT_REPLY.to_string(), false));
    }

    #[test]
    fn test_is_error_reply() {
        assert!(is_error_reply(PERMISSION_DENIED_REPLY));
        assert!(is_error_reply(CONNECTION_REPLY));
        assert!(!is_error_reply(SILENT_REPLY));
        assert!(!is_error_reply("*[smiles]* no problems here"));
    }
}
