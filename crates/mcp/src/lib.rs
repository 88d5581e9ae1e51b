//! MCP (Model Context Protocol) client library.
//!
//! This crate talks to a tool-execution server: it performs the `initialize`
//! handshake, lists the server's tools and calls them. Messages travel over a
//! [`Transport`]: a child process's stdio, a TCP stream, or HTTP+SSE.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Client, Connector, Endpoint};
//!
//! # async fn example() -> mcp::Result<()> {
//! let endpoint = Endpoint::Sse("http://localhost:8000/sse".to_string());
//! let mut client = Client::new(endpoint.connect().await?);
//! client.initialize().await?;
//!
//! for tool in client.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let arguments = serde_json::json!({"a": -87, "b": 23});
//! let result = client.call_tool("add", arguments.as_object().cloned()).await?;
//! println!("{}", result.render());
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod protocol;
mod sse;
mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::Client;
pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION, RequestId,
    ServerCapabilities, ServerInfo, Tool, ToolContent,
};
pub use sse::SseTransport;
pub use transport::{
    Connector, Endpoint, EndpointTransport, MAX_MESSAGE_SIZE, ServerConfig, StdioTransport,
    StreamTransport, TcpTransport, Transport,
};
