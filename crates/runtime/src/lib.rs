//! Tether runtime: drives a conversation between a language model and the
//! tools of an MCP server.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **Schema translation**: server tool definitions become
//!   [`ToolDescriptor`]s in the model's function-calling shape.
//! - **ToolSession**: the single connection to a tool server, with a cached
//!   catalog and serialized access.
//! - **ModelGateway**: queries a [`Backend`] and classifies each response as a
//!   final answer or a set of tool calls.
//! - **Orchestrator** / **Agent**: the loop that alternates between the two
//!   until the model answers.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mcp::Endpoint;
//! use runtime::{Agent, AgentConfig, ModelGateway, OllamaBackend, ToolSession};
//!
//! # async fn example() -> runtime::Result<()> {
//! let backend = OllamaBackend::builder("llama3.2:latest").build();
//! let gateway = ModelGateway::new(backend);
//! let session = Arc::new(ToolSession::new(Endpoint::Sse(
//!     "http://localhost:8000/sse".to_string(),
//! )));
//!
//! let mut agent = Agent::start(gateway, session, AgentConfig::default());
//! let answer = agent.submit("What is -87 + 23?").await?;
//! println!("{answer}");
//!
//! agent.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod agent;
mod error;
pub mod model;
pub mod providers;
mod session;
pub mod tools;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentConfig, DEFAULT_MAX_ROUNDS, Orchestrator};
pub use error::{Error, Result};
pub use model::{Backend, Message, ModelError, ModelGateway, ModelTurn, Role};
pub use providers::{OllamaBackend, OllamaBackendBuilder};
pub use session::{SessionConfig, Status, ToolSession};
pub use tools::{SchemaError, ToolCallRequest, ToolCallResult, ToolDescriptor};
