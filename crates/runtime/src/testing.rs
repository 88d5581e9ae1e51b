//! Scripted model backend for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::model::{Backend, Message, ModelError, ModelRequest, ModelResponse};
use crate::tools::{ToolCallRequest, ToolDescriptor};

/// One request as the backend saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDescriptor>,
}

/// Replays canned responses in order and records every request.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<ModelResponse, ModelError>>>,
    requests: Mutex<Vec<Recorded>>,
    delay: Option<Duration>,
}

impl ScriptedBackend {
    pub fn new(replies: impl IntoIterator<Item = Result<ModelResponse, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

impl Backend for ScriptedBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        self.requests.lock().unwrap().push(Recorded {
            system: request.system.map(str::to_string),
            messages: request.messages.to_vec(),
            tools: request.tools.to_vec(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(ModelError::Api("script exhausted".into())))
    }
}

pub fn answer(text: &str) -> Result<ModelResponse, ModelError> {
    Ok(ModelResponse {
        content: text.to_string(),
        tool_calls: Vec::new(),
    })
}

pub fn calls(commentary: &str, calls: Vec<ToolCallRequest>) -> Result<ModelResponse, ModelError> {
    Ok(ModelResponse {
        content: commentary.to_string(),
        tool_calls: calls,
    })
}

pub fn request(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
    let arguments = match arguments {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    ToolCallRequest::new(id, name, arguments)
}
