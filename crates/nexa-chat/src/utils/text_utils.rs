//! Small text helpers shared by the controller, the bridge and the REPL

use std::borrow::Cow;
use regex::Regex;
use lazy_static::lazy_static;
use tracing::warn;

lazy_static! {
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

const AVATAR_SERVICE: &str = "https://ui-avatars.com/api/";

pub struct TextUtils;

impl TextUtils {
    /// Case-insensitive substring check. An empty pattern matches everything.
    pub fn contains_ignore_case(text: &str, pattern: &str) -> bool {
        if pattern.is_empty() {
            return true;
        }
        text.to_lowercase().contains(&pattern.to_lowercase())
    }

    /// Collapse runs of whitespace into single spaces and trim the ends
    pub fn normalize_whitespace(text: &str) -> Cow<'_, str> {
        let trimmed = text.trim();
        if trimmed.len() != text.len() || WHITESPACE_REGEX.find_iter(trimmed).any(|m| m.as_str() != " ") {
            Cow::Owned(WHITESPACE_REGEX.replace_all(trimmed, " ").into_owned())
        } else {
            Cow::Borrowed(text)
        }
    }

    pub fn is_blank(text: &str) -> bool {
        text.trim().is_empty()
    }

    /// Truncate to at most `max_chars` characters, ending with an ellipsis
    /// when anything was cut. Never splits a multi-byte character.
    pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> Cow<'_, str> {
        if text.chars().count() <= max_chars {
            Cow::Borrowed(text)
        } else if max_chars <= 3 {
            Cow::Borrowed("...")
        } else {
            let mut result: String = text.chars().take(max_chars - 3).collect();
            result.push_str("...");
            Cow::Owned(result)
        }
    }

    /// Generated placeholder avatar for a user or character name.
    pub fn avatar_url(name: &str) -> String {
        let name = Self::normalize_whitespace(name);
        let params = [
            ("name", &*name),
            ("background", "random"),
            ("size", "400"),
            ("bold", "true"),
        ];
        match reqwest::Url::parse_with_params(AVATAR_SERVICE, &params) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!("Could not build avatar URL: {}", e);
                AVATAR_SERVICE.to_string()
            }
        }
    }

    /// Mask everything except the last four characters of a secret.
    pub fn mask_secret(secret: &str) -> String {
        let count = secret.chars().count();
        if count == 0 {
            return "<unset>".to_string();
        }
        if count <= 4 {
            return "*".repeat(count);
        }
        let tail: String = secret.chars().skip(count - 4).collect();
        format!("{}{}", "*".repeat(count - 4), tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_ignore_case() {
        assert!(TextUtils::contains_ignore_case("Inspector Vale", "vale"));
        assert!(TextUtils::contains_ignore_case("Инспектор", "инсп"));
        assert!(TextUtils::contains_ignore_case("anything", ""));
        assert!(!TextUtils::contains_ignore_case("Akane", "vale"));
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(TextUtils::normalize_whitespace("  a \t b\n"), "a b");
        assert!(matches!(TextUtils::normalize_whitespace("a b"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(TextUtils::truncate_with_ellipsis("short", 10), "short");
        assert_eq!(TextUtils::truncate_with_ellipsis("привет мир", 6), "при...");
        assert_eq!(TextUtils::truncate_with_ellipsis("abcdef", 2), "...");
    }

    #[test]
    fn test_avatar_url_replaces_spaces() {
        let url = TextUtils::avatar_url("Inspector  Vale");
        assert!(url.starts_with(AVATAR_SERVICE));
        assert!(url.contains("name=Inspector+Vale&"));
    }

    #[test]
    fn test_avatar_url_encodes_reserved_characters() {
        let url = TextUtils::avatar_url("Tom & Jerry #1");
        assert!(url.contains("name=Tom+%26+Jerry+%231&"));
        assert!(url.ends_with("&background=random&size=400&bold=true"));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(TextUtils::mask_secret(""), "<unset>");
        assert_eq!(TextUtils::mask_secret("abc"), "***");
        assert_eq!(TextUtils::mask_secret("AIzaSyXYZ1234"), "*********1234");
    }
}
