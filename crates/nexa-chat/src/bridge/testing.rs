//! Scripted backend shared by bridge and controller tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::gemini::{BackendError, ChatBackend, GenerateRequest, GenerateResponse};

pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<GenerateResponse, BackendError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<GenerateResponse, BackendError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Replies the same text forever.
    pub fn echo_forever(text: &str) -> Self {
        let replies = (0..64)
            .map(|_| Ok(GenerateResponse { text: text.to_string(), ..Default::default() }))
            .collect();
        Self::new(replies)
    }

    /// Every call waits on `gate` before answering.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Transport("script exhausted".into())))
    }
}
