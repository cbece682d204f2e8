// nexa-chat/crates/nexa-chat/src/bridge/mod.rs

//! Everything between a conversation and the hosted model: the role-play
//! directive, the REST client, bounded retry and the mapping of failures
//! to in-character replies.

pub mod gemini;
pub mod prompt;
pub mod replies;
pub mod retry;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use gemini::{BackendError, ChatBackend, GeminiClient, GenerateResponse, GenerationConfig};
pub use replies::is_error_reply;
pub use retry::RetryPolicy;
pub use session::{ChatBridge, ChatSession};
