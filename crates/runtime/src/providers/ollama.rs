//! Ollama chat API backend.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::model::{Backend, Message, ModelError, ModelRequest, ModelResponse, Role};
use crate::tools::{ToolCallRequest, ToolDescriptor};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    stream: bool,
    options: ApiOptions,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDescriptor],
}

fn no_tools(tools: &&[ToolDescriptor]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Serialize)]
struct ApiOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, Deserialize)]
struct ApiTags {
    #[serde(default)]
    models: Vec<ApiModel>,
}

#[derive(Debug, Deserialize)]
struct ApiModel {
    name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaBackendBuilder {
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaBackendBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn build(self) -> OllamaBackend {
        OllamaBackend {
            client: reqwest::Client::new(),
            base_url: self.base_url.trim_end_matches('/').to_string(),
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Backend for a local or remote Ollama server.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaBackend {
    pub fn builder(model: impl Into<String>) -> OllamaBackendBuilder {
        OllamaBackendBuilder::new(model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>, ModelError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let tags: ApiTags = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn messages_to_api(system: Option<&str>, messages: &[Message]) -> Vec<ApiMessage> {
        // Ollama identifies tool results by tool name, not call id.
        let names: HashMap<&str, &str> = messages
            .iter()
            .flat_map(|m| &m.tool_calls)
            .map(|call| (call.id.as_str(), call.name.as_str()))
            .collect();

        let system = system.map(|text| ApiMessage {
            role: "system",
            content: text.to_string(),
            tool_calls: Vec::new(),
            tool_name: None,
        });

        system
            .into_iter()
            .chain(messages.iter().map(|msg| ApiMessage {
                role: msg.role.as_str(),
                content: msg.content.clone(),
                tool_calls: msg
                    .tool_calls
                    .iter()
                    .map(|call| ApiToolCall {
                        function: ApiFunction {
                            name: call.name.clone(),
                            arguments: Value::Object(call.arguments.clone()),
                        },
                    })
                    .collect(),
                tool_name: match msg.role {
                    Role::Tool => msg
                        .tool_call_id
                        .as_deref()
                        .and_then(|id| names.get(id))
                        .map(|name| name.to_string()),
                    _ => None,
                },
            }))
            .collect()
    }

    fn response_to_model(message: ApiResponseMessage) -> Result<ModelResponse, ModelError> {
        let tool_calls = message
            .tool_calls
            .into_iter()
            .map(|call| {
                let arguments = parse_arguments(&call.function.name, call.function.arguments)?;
                let id = format!("call_{}", Uuid::new_v4().simple());
                Ok(ToolCallRequest::new(id, call.function.name, arguments))
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        Ok(ModelResponse {
            content: message.content,
            tool_calls,
        })
    }
}

/// Arguments normally arrive as an object; some models send a JSON string.
fn parse_arguments(tool: &str, arguments: Value) -> Result<Map<String, Value>, ModelError> {
    let value = match arguments {
        Value::Null => return Ok(Map::new()),
        Value::String(text) if text.trim().is_empty() => return Ok(Map::new()),
        Value::String(text) => serde_json::from_str(&text).map_err(|e| {
            ModelError::InvalidResponse(format!("arguments for `{tool}` are not JSON: {e}"))
        })?,
        other => other,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ModelError::InvalidResponse(format!(
            "arguments for `{tool}` must be an object, got {other}"
        ))),
    }
}

impl std::fmt::Display for OllamaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ollama({}, {})", self.model, self.base_url)
    }
}

impl Backend for OllamaBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let api_request = ApiRequest {
            model: &self.model,
            messages: Self::messages_to_api(request.system, request.messages),
            stream: false,
            options: ApiOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
            tools: request.tools,
        };

        debug!(backend = %self, messages = api_request.messages.len(), "chat request");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        Self::response_to_model(api_response.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolCallResult;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn builder_defaults() {
        let backend = OllamaBackend::builder("llama3.2").build();
        assert_eq!(backend.model(), "llama3.2");
        assert_eq!(backend.base_url, DEFAULT_BASE_URL);
        assert_eq!(backend.temperature, 0.0);
        assert_eq!(backend.max_tokens, 2048);

        let backend = OllamaBackend::builder("qwen3")
            .base_url("http://gpu-box:11434/")
            .build();
        assert_eq!(backend.to_string(), "ollama(qwen3, http://gpu-box:11434)");
    }

    #[test]
    fn tool_results_carry_tool_name() {
        let call = ToolCallRequest::new("call_1", "add", args(json!({"a": -87, "b": 23})));
        let history = vec![
            Message::user("What is -87 + 23?"),
            Message::tool_call_record("", vec![call]),
            Message::tool_result(&ToolCallResult::success("call_1", "-64")),
        ];

        let wire = serde_json::to_value(OllamaBackend::messages_to_api(Some("be brief"), &history))
            .unwrap();
        assert_eq!(
            wire,
            json!([
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "What is -87 + 23?"},
                {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{"function": {"name": "add", "arguments": {"a": -87, "b": 23}}}]
                },
                {"role": "tool", "content": "-64", "tool_name": "add"}
            ])
        );
    }

    #[test]
    fn response_calls_get_unique_ids() {
        let message: ApiResponseMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [
                {"function": {"name": "add", "arguments": {"a": 1, "b": 2}}},
                {"function": {"name": "add", "arguments": "{\"a\": 3, \"b\": 4}"}}
            ]
        }))
        .unwrap();

        let response = OllamaBackend::response_to_model(message).unwrap();
        assert_eq!(response.tool_calls.len(), 2);
        assert!(response.tool_calls[0].id.starts_with("call_"));
        assert_ne!(response.tool_calls[0].id, response.tool_calls[1].id);
        assert_eq!(response.tool_calls[1].arguments, args(json!({"a": 3, "b": 4})));
    }

    #[test]
    fn plain_answer_has_no_calls() {
        let message: ApiResponseMessage =
            serde_json::from_value(json!({"role": "assistant", "content": "Hi!"})).unwrap();
        let response = OllamaBackend::response_to_model(message).unwrap();
        assert_eq!(response.content, "Hi!");
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        assert!(matches!(
            parse_arguments("add", json!([1, 2])),
            Err(ModelError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_arguments("add", json!("not json")),
            Err(ModelError::InvalidResponse(_))
        ));
        assert!(parse_arguments("now", Value::Null).unwrap().is_empty());
    }

    #[test]
    fn tools_omitted_when_catalog_empty() {
        let request = ApiRequest {
            model: "llama3.2",
            messages: Vec::new(),
            stream: false,
            options: ApiOptions {
                temperature: 0.0,
                num_predict: 16,
            },
            tools: &[],
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert!(wire.get("tools").is_none());
        assert_eq!(wire["stream"], json!(false));
        assert_eq!(wire["options"]["num_predict"], json!(16));
    }
}
