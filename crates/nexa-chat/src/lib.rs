// nexa-chat/crates/nexa-chat/src/lib.rs

pub mod auth;
pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod store;
pub mod telemetry;
pub mod utils;

#[cfg(feature = "cli")]
pub mod repl;

// Public API exports
pub use bridge::{is_error_reply, ChatBridge, ChatSession};
pub use config::Config;
pub use controller::{AppController, Confirm, Conversation, Screen, ViewState};
pub use error::{ControllerError, SendError};
pub use store::{AppDatabase, AppStore, Character, Message, PersistentStore, User};
