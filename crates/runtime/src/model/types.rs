use super::errors::ModelError;
use crate::tools::{ToolCallRequest, ToolCallResult, ToolDescriptor};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Set on tool messages: the request this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Set on the assistant message that records requested calls.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Assistant message recording the calls the model asked for, with any
    /// commentary it gave alongside them.
    pub fn tool_call_record(commentary: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::assistant(commentary)
        }
    }

    /// Tool message carrying a call's result (or its error text).
    pub fn tool_result(result: &ToolCallResult) -> Self {
        Self {
            tool_call_id: Some(result.call_id.clone()),
            ..Self::new(Role::Tool, result.content.clone())
        }
    }
}

/// Everything needed for a model request.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub system: Option<&'a str>,
    pub messages: &'a [Message],
    pub tools: &'a [ToolDescriptor],
}

/// What a backend returned, before classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

/// A classified model response: exactly one of final text or tool calls.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    FinalAnswer {
        text: String,
    },
    ToolCalls {
        /// Text that came with the calls; never the final answer.
        commentary: Option<String>,
        requests: Vec<ToolCallRequest>,
    },
}

impl ModelTurn {
    /// Classify a raw response. Pending tool calls take precedence over text.
    pub fn classify(response: ModelResponse) -> Self {
        let ModelResponse {
            content,
            tool_calls,
        } = response;

        if tool_calls.is_empty() {
            return Self::FinalAnswer { text: content };
        }

        let commentary = (!content.trim().is_empty()).then_some(content);
        Self::ToolCalls {
            commentary,
            requests: tool_calls,
        }
    }
}

/// Trait for LLM provider backends.
pub trait Backend: Send + Sync {
    fn call(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<ModelResponse, ModelError>> + Send;
}
