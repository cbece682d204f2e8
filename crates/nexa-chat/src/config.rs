// nexa-chat/crates/nexa-chat/src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::utils::TextUtils;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub request_timeout_seconds: u64,
    pub reply_language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            data_dir: PathBuf::from("./data"),
            temperature: 1.15,
            top_k: 40,
            top_p: 0.95,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            request_timeout_seconds: 120,
            reply_language: "Russian".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        let defaults = Self::default();

        let api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .unwrap_or_default();
        if api_key.is_empty() {
            warn!("API key not found in environment variables (GEMINI_API_KEY). Replies will fail until one is set.");
        }

        let retry_attempts: u32 = parse_var("NEXA_RETRY_ATTEMPTS", defaults.retry_attempts)?;
        if retry_attempts == 0 {
            return Err(anyhow::anyhow!("NEXA_RETRY_ATTEMPTS must be at least 1"));
        }

        let api_base_url = env::var("NEXA_API_BASE_URL")
            .unwrap_or(defaults.api_base_url)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            api_key,
            model: env::var("NEXA_MODEL").unwrap_or(defaults.model),
            api_base_url,
            data_dir: env::var("NEXA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            temperature: parse_var("NEXA_TEMPERATURE", defaults.temperature)?,
            top_k: parse_var("NEXA_TOP_K", defaults.top_k)?,
            top_p: parse_var("NEXA_TOP_P", defaults.top_p)?,
            retry_attempts,
            retry_base_delay_ms: parse_var("NEXA_RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms)?,
            request_timeout_seconds: parse_var(
                "NEXA_REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            )?,
            reply_language: env::var("NEXA_REPLY_LANGUAGE").unwrap_or(defaults.reply_language),
        })
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- Model: {}", self.model);
        info!("- API Base URL: {}", self.api_base_url);
        info!("- API Key: {}", TextUtils::mask_secret(&self.api_key));
        info!("- Data Dir: {}", self.data_dir.display());
        info!("- Sampling: temperature {}, top-k {}, top-p {}", self.temperature, self.top_k, self.top_p);
        info!("- Retry: {} attempts, base delay {}ms", self.retry_attempts, self.retry_base_delay_ms);
        info!("- Request Timeout: {}s", self.request_timeout_seconds);
        info!("- Reply Language: {}", self.reply_language);
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config {
            api_key: "test-key-1234".to_string(),
            data_dir: PathBuf::from("/tmp/nexa-test"),
            retry_base_delay_ms: 5,
            ..Config::default()
        }
    }

    #[test]
    fn test_default_sampling_matches_roleplay_profile() {
        let config = Config::default();
        assert!((config.temperature - 1.15).abs() < f32::EPSILON);
        assert_eq!(config.top_k, 40);
        assert!((config.top_p - 0.95).abs() < f32::EPSILON);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_default_retry_budget() {
        let config = Config::default();
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_base_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_durations() {
        let config = create_test_config();
        assert_eq!(config.retry_base_delay(), Duration::from_millis(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_has_api_key() {
        let mut config = create_test_config();
        assert!(config.has_api_key());
        config.api_key = "   ".to_string();
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_base_url_has_no_trailing_slash() {
        let config = Config::default();
        assert!(!config.api_base_url.ends_with('/'));
        assert!(config.api_base_url.starts_with("https://"));
    }

    #[test]
    fn test_parse_var_falls_back_when_unset() {
        let value: u32 = parse_var("NEXA_TEST_SURELY_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
