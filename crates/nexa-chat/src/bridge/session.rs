use std::sync::Arc;
use tracing::{debug, error, info};

use super::gemini::{ChatBackend, Content, GeminiClient, GenerateRequest, GenerationConfig};
use super::prompt::{roleplay_directive, safety_settings};
use super::replies::{interpret, FailureKind};
use super::retry::RetryPolicy;
use crate::config::Config;

/// One ongoing role-play exchange. The remote endpoint is stateless, so the
/// session carries the directive and every completed turn.
#[derive(Debug, Clone)]
pub struct ChatSession {
    system_instruction: String,
    history: Vec<Content>,
}

impl ChatSession {
    pub fn turns(&self) -> usize {
        self.history.len()
    }
}

pub struct ChatBridge {
    backend: Arc<dyn ChatBackend>,
    retry: RetryPolicy,
    generation: GenerationConfig,
    reply_language: String,
}

impl ChatBridge {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        retry: RetryPolicy,
        generation: GenerationConfig,
        reply_language: &str,
    ) -> Self {
        Self {
            backend,
            retry,
            generation,
            reply_language: reply_language.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        info!(
            "Chat bridge using {} (temperature {}, top-k {}, top-p {})",
            config.model, config.temperature, config.top_k, config.top_p
        );
        Self::new(
            Arc::new(GeminiClient::from_config(config)),
            RetryPolicy::new(config.retry_attempts, config.retry_base_delay()),
            GenerationConfig {
                temperature: config.temperature,
                top_k: config.top_k,
                top_p: config.top_p,
            },
            &config.reply_language,
        )
    }

    pub fn create_session(&self, persona: &str) -> ChatSession {
        ChatSession {
            system_instruction: roleplay_directive(persona, &self.reply_language),
            history: Vec::new(),
        }
    }

    /// Sends `text` with the session's prior turns. Never fails: every
    /// failure is turned into an in-character line, and only exchanges
    /// that produced real text are recorded in the session.
    pub async fn send(&self, session: &mut ChatSession, text: &str) -> String {
        let mut contents = session.history.clone();
        contents.push(Content::user(text));
        let request = GenerateRequest {
            system_instruction: Content::system(session.system_instruction.clone()),
            contents,
            generation_config: self.generation.clone(),
            safety_settings: safety_settings(),
        };

        let backend = &self.backend;
        let request = &request;
        match self.retry.run(|| backend.generate(request)).await {
            Ok(response) => {
                let (reply, keep) = interpret(response);
                if keep {
                    session.history.push(Content::user(text));
                    session.history.push(Content::model(reply.clone()));
                } else {
                    debug!("Model returned no usable text; turn not recorded");
                }
                reply
            }
            Err(e) => {
                let kind = FailureKind::classify(&e);
                error!("Model exchange failed ({:?}): {}", kind, e);
                kind.reply().to_string()
            }
        }
    }
}
