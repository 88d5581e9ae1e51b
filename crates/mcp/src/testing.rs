//! In-process scripted tool server.
//!
//! [`FakeServer`] is a [`Connector`] whose transports are in-memory pipes to
//! a task that answers `initialize`, `tools/list` and `tools/call` from a
//! fixed tool list and per-tool handlers. It counts connections and listings
//! and records every call so tests can assert on ordering and caching.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf, duplex,
};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    PROTOCOL_VERSION, RequestId, Tool, ToolContent,
};
use crate::transport::{Connector, StreamTransport};

/// Client side of an in-memory pipe.
pub type MemoryTransport = StreamTransport<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

/// How the fake server answers one `tools/call`.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Successful text result.
    Text(String),
    /// Result flagged with `isError`.
    ToolError(String),
    /// Successful result made of arbitrary content blocks.
    Blocks(Vec<ToolContent>),
    /// JSON-RPC error response.
    Rpc(JsonRpcError),
    /// Drop the connection without answering.
    HangUp,
    /// Never answer, keeping the connection open.
    Stall,
}

type Handler = Box<dyn Fn(&Map<String, Value>) -> Reply + Send + Sync>;

struct Script {
    tools: Vec<Tool>,
    handlers: HashMap<String, Handler>,
    refuse_connections: bool,
    stalled_handshakes: usize,
    chatty: bool,
}

/// Counters shared between a [`FakeServer`] and the test inspecting it.
#[derive(Debug, Default)]
pub struct Stats {
    connects: AtomicUsize,
    listings: AtomicUsize,
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl Stats {
    /// Transports handed out so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// `tools/list` requests served so far.
    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    /// Names of called tools, in arrival order.
    pub fn call_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    /// Calls with their arguments, in arrival order.
    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

/// Builder for [`FakeServer`].
pub struct FakeServerBuilder {
    script: Script,
}

impl FakeServerBuilder {
    /// Advertise `tool` and answer its calls with `handler`.
    pub fn tool<F>(mut self, tool: Tool, handler: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Reply + Send + Sync + 'static,
    {
        self.script
            .handlers
            .insert(tool.name.clone(), Box::new(handler));
        self.script.tools.push(tool);
        self
    }

    /// Fail every connection attempt.
    pub fn refuse_connections(mut self) -> Self {
        self.script.refuse_connections = true;
        self
    }

    /// Never answer `initialize` on the first `count` connections.
    pub fn stall_handshakes(mut self, count: usize) -> Self {
        self.script.stalled_handshakes = count;
        self
    }

    /// Emit a log notification before every response.
    pub fn chatty(mut self) -> Self {
        self.script.chatty = true;
        self
    }

    pub fn build(self) -> FakeServer {
        FakeServer {
            script: Arc::new(self.script),
            stats: Arc::new(Stats::default()),
        }
    }
}

/// An in-process MCP server.
pub struct FakeServer {
    script: Arc<Script>,
    stats: Arc<Stats>,
}

impl FakeServer {
    pub fn builder() -> FakeServerBuilder {
        FakeServerBuilder {
            script: Script {
                tools: Vec::new(),
                handlers: HashMap::new(),
                refuse_connections: false,
                stalled_handshakes: 0,
                chatty: false,
            },
        }
    }

    /// Handle to this server's counters.
    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.stats)
    }
}

/// A tool taking integer parameters `a` and `b`, both required.
pub fn binary_tool(name: &str, description: &str) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer", "title": "A"},
                "b": {"type": "integer", "title": "B"}
            },
            "required": ["a", "b"]
        }),
    }
}

/// Integer argument `key`, or zero.
pub fn int_arg(arguments: &Map<String, Value>, key: &str) -> i64 {
    arguments.get(key).and_then(Value::as_i64).unwrap_or(0)
}

impl Connector for FakeServer {
    type Transport = MemoryTransport;

    async fn connect(&self) -> Result<MemoryTransport> {
        if self.script.refuse_connections {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "fake server refused the connection",
            )));
        }
        let index = self.stats.connects.fetch_add(1, Ordering::SeqCst);
        let stall_handshake = index < self.script.stalled_handshakes;

        let (client_end, server_end) = duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client_end);
        tokio::spawn(serve(
            server_end,
            Arc::clone(&self.script),
            Arc::clone(&self.stats),
            stall_handshake,
        ));

        Ok(StreamTransport::new(client_read, client_write))
    }
}

async fn serve(
    stream: DuplexStream,
    script: Arc<Script>,
    stats: Arc<Stats>,
    stall_handshake: bool,
) {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let Ok(request) = serde_json::from_str::<JsonRpcRequest>(line.trim()) else {
            // Notifications carry no id.
            continue;
        };

        let response = match request.method.as_str() {
            "initialize" if stall_handshake => {
                std::future::pending::<()>().await;
                return;
            }
            "initialize" => JsonRpcResponse::success(
                request.id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {"listChanged": false}},
                    "serverInfo": {"name": "fake", "version": "0.0.0"}
                }),
            ),
            "tools/list" => {
                stats.listings.fetch_add(1, Ordering::SeqCst);
                JsonRpcResponse::success(request.id, json!({ "tools": script.tools }))
            }
            "tools/call" => {
                let params: CallToolParams = match request
                    .params
                    .map(serde_json::from_value::<CallToolParams>)
                    .transpose()
                {
                    Ok(Some(params)) => params,
                    _ => {
                        let error = JsonRpcError::new(JsonRpcError::INVALID_PARAMS, "bad params");
                        respond(&mut writer, &JsonRpcResponse::failure(request.id, error)).await;
                        continue;
                    }
                };
                let arguments = params.arguments.unwrap_or_default();
                if let Ok(mut calls) = stats.calls.lock() {
                    calls.push((params.name.clone(), arguments.clone()));
                }

                let reply = match script.handlers.get(&params.name) {
                    Some(handler) => handler(&arguments),
                    None => Reply::Rpc(JsonRpcError::new(
                        JsonRpcError::INVALID_PARAMS,
                        format!("Unknown tool: {}", params.name),
                    )),
                };

                match reply {
                    Reply::Text(text) => tool_response(request.id, CallToolResult::text(text)),
                    Reply::ToolError(text) => {
                        tool_response(request.id, CallToolResult::error(text))
                    }
                    Reply::Blocks(content) => tool_response(
                        request.id,
                        CallToolResult {
                            content,
                            is_error: false,
                        },
                    ),
                    Reply::Rpc(error) => JsonRpcResponse::failure(request.id, error),
                    Reply::HangUp => return,
                    Reply::Stall => {
                        std::future::pending::<()>().await;
                        return;
                    }
                }
            }
            other => JsonRpcResponse::failure(
                request.id,
                JsonRpcError::new(
                    JsonRpcError::METHOD_NOT_FOUND,
                    format!("Method not found: {other}"),
                ),
            ),
        };

        if script.chatty {
            let log = json!({
                "jsonrpc": "2.0",
                "method": "notifications/message",
                "params": {"level": "info", "data": "working"}
            });
            write_line(&mut writer, &log.to_string()).await;
        }
        respond(&mut writer, &response).await;
    }
}

fn tool_response(id: RequestId, result: CallToolResult) -> JsonRpcResponse {
    JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(Value::Null))
}

async fn respond(writer: &mut WriteHalf<DuplexStream>, response: &JsonRpcResponse) {
    if let Ok(json) = serde_json::to_string(response) {
        write_line(writer, &json).await;
    }
}

async fn write_line(writer: &mut WriteHalf<DuplexStream>, line: &str) {
    let _ = writer.write_all(line.as_bytes()).await;
    let _ = writer.write_all(b"\n").await;
    let _ = writer.flush().await;
}
