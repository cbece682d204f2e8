// nexa-chat/crates/nexa-chat/src/auth.rs

use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand_core::OsRng;
use serde::Deserialize;
use validator::Validate;

use crate::utils::TextUtils;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterForm {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 32, message = "Username must be 1 to 32 characters"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password must not be empty"))]
    pub password: String,
}

impl RegisterForm {
    pub fn new(email: &str, username: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            username: username.trim().to_string(),
            password: password.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

impl LoginForm {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }
}

/// First human-readable message out of a validation failure.
pub fn first_validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Please fill in all fields".to_string())
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Failed to hash password: {}", e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    Valid,
    /// Matched a stored plaintext password; the caller should re-hash it.
    ValidLegacy,
    Invalid,
}

pub fn verify_password(stored: &str, candidate: &str) -> PasswordCheck {
    if stored.starts_with("$argon2") {
        return match PasswordHash::new(stored) {
            Ok(parsed) if Argon2::default().verify_password(candidate.as_bytes(), &parsed).is_ok() => {
                PasswordCheck::Valid
            }
            _ => PasswordCheck::Invalid,
        };
    }
    if !stored.is_empty() && stored == candidate {
        PasswordCheck::ValidLegacy
    } else {
        PasswordCheck::Invalid
    }
}

pub fn default_avatar_url(name: &str) -> String {
    TextUtils::avatar_url(name)
}
