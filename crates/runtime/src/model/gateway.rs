//! Request/response wrapper around a backend.

use std::time::Duration;

use tracing::debug;

use super::{Backend, Message, ModelError, ModelRequest, ModelTurn};
use crate::tools::ToolDescriptor;

/// Default budget for one model query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Queries a backend and classifies what it returns.
///
/// The gateway never retries; a failed query is returned to the caller.
pub struct ModelGateway<B> {
    backend: B,
    system: Option<String>,
    timeout: Duration,
}

impl<B: Backend> ModelGateway<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            system: None,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Set the system prompt sent ahead of every conversation.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the per-query time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Send the conversation and tool catalog, and classify the answer.
    pub async fn query(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<ModelTurn, ModelError> {
        let request = ModelRequest {
            system: self.system.as_deref(),
            messages,
            tools,
        };

        debug!(messages = messages.len(), tools = tools.len(), "querying model");

        let response = tokio::time::timeout(self.timeout, self.backend.call(request))
            .await
            .map_err(|_| ModelError::Timeout(self.timeout))??;

        Ok(ModelTurn::classify(response))
    }
}
