//! MCP client over a single transport.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, ListToolsParams, ListToolsResult, RequestId, Tool,
};
use crate::transport::Transport;

/// Upper bound on `tools/list` pages, against servers that loop cursors.
const MAX_LIST_PAGES: usize = 64;

/// A client speaking MCP over one transport.
///
/// Requests are strictly sequential: each call writes one request and reads
/// until its response arrives, so the caller must not share a client between
/// concurrent tasks without external locking.
pub struct Client<T> {
    transport: T,
    next_id: i64,
    server_info: Option<InitializeResult>,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: 1,
            server_info: None,
        }
    }

    /// Perform the `initialize` handshake.
    pub async fn initialize(&mut self) -> Result<&InitializeResult> {
        let result: InitializeResult = self
            .request("initialize", Some(InitializeParams::default()))
            .await?;

        self.notify("notifications/initialized", None::<()>).await?;

        debug!(
            server = %result.server_info.name,
            protocol = %result.protocol_version,
            "tool server initialized"
        );

        Ok(&*self.server_info.insert(result))
    }

    /// Server info, once initialized.
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    /// Fetch the complete tool list, following pagination cursors.
    pub async fn list_tools(&mut self) -> Result<Vec<Tool>> {
        let mut tools = Vec::new();
        let mut cursor = None;

        for _ in 0..MAX_LIST_PAGES {
            let page: ListToolsResult = self
                .request("tools/list", Some(ListToolsParams { cursor }))
                .await?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(tools),
            }
        }

        Err(Error::InvalidResponse(format!(
            "tools/list did not finish within {MAX_LIST_PAGES} pages"
        )))
    }

    /// Call a tool by name.
    ///
    /// A result the server flags with `isError` is returned as `Ok`; only
    /// protocol and transport failures are errors.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        self.request("tools/call", Some(params)).await
    }

    /// Close the transport.
    pub async fn close(mut self) -> Result<()> {
        self.transport.close().await
    }

    // --- Internal methods ---

    fn next_request_id(&mut self) -> RequestId {
        let id = RequestId::Number(self.next_id);
        self.next_id += 1;
        id
    }

    async fn request<P, R>(&mut self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }

        let request_json = serde_json::to_string(&request)?;
        self.transport.send(&request_json).await?;

        let response = self.read_response(&id).await?;
        let result_value = response.into_result()?;
        let result: R = serde_json::from_value(result_value)
            .map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))?;

        Ok(result)
    }

    async fn notify<P>(&mut self, method: &str, params: Option<P>) -> Result<()>
    where
        P: Serialize,
    {
        // Notifications have no ID
        let mut notification = Map::new();
        notification.insert("jsonrpc".into(), "2.0".into());
        notification.insert("method".into(), method.into());
        if let Some(p) = params {
            notification.insert("params".into(), serde_json::to_value(p)?);
        }

        let notification_json = serde_json::to_string(&notification)?;
        self.transport.send(&notification_json).await
    }

    /// Read until the response to `id` arrives.
    ///
    /// Server notifications and server-to-client requests that arrive first
    /// are skipped.
    async fn read_response(&mut self, id: &RequestId) -> Result<JsonRpcResponse> {
        loop {
            let line = self.transport.receive().await?;
            let message: Value = serde_json::from_str(&line)
                .map_err(|e| Error::InvalidResponse(format!("malformed message: {e}")))?;

            if message.get("method").is_some() || message.get("id").is_none() {
                debug!(method = ?message.get("method"), "skipping server message");
                continue;
            }

            let response: JsonRpcResponse = serde_json::from_value(message)
                .map_err(|e| Error::InvalidResponse(format!("malformed response: {e}")))?;

            if &response.id != id {
                return Err(Error::InvalidResponse(format!(
                    "response ID mismatch: expected {id:?}, got {:?}",
                    response.id
                )));
            }

            return Ok(response);
        }
    }
}
