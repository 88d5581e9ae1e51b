//! Tool server session management.
//!
//! A [`ToolSession`] owns at most one live connection to a tool server. All
//! protocol traffic goes through a single lock, so `connect`, `dispatch` and
//! `disconnect` never interleave on the wire.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use mcp::{Client, Connector};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::tools::{self, ToolCallRequest, ToolCallResult, ToolDescriptor};
use crate::{Error, Result};

/// Timeouts for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Transport establishment, handshake and catalog fetch together.
    pub connect_timeout: Duration,
    /// One `tools/call` round trip.
    pub call_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Disconnected,
    Connecting,
    Connected,
}

impl Status {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

struct StatusCell(AtomicU8);

impl StatusCell {
    fn get(&self) -> Status {
        Status::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, status: Status) {
        self.0.store(status as u8, Ordering::Release);
    }
}

/// Marks the session disconnected unless disarmed.
///
/// Held across every await that can leave the connection half-built or with
/// a request in flight, so a dropped future still settles the status.
struct Reset<'a> {
    status: &'a StatusCell,
    armed: bool,
}

impl<'a> Reset<'a> {
    fn arm(status: &'a StatusCell) -> Self {
        Self {
            status,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Reset<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.status.set(Status::Disconnected);
        }
    }
}

struct Live<T> {
    client: Client<T>,
    catalog: Arc<[ToolDescriptor]>,
}

/// A session with one tool server.
pub struct ToolSession<C: Connector> {
    connector: C,
    config: SessionConfig,
    live: Mutex<Option<Live<C::Transport>>>,
    status: StatusCell,
}

impl<C: Connector> ToolSession<C> {
    pub fn new(connector: C) -> Self {
        Self::with_config(connector, SessionConfig::default())
    }

    pub fn with_config(connector: C, config: SessionConfig) -> Self {
        Self {
            connector,
            config,
            live: Mutex::new(None),
            status: StatusCell(AtomicU8::new(Status::Disconnected as u8)),
        }
    }

    /// Current status. Does not wait for an operation in flight.
    pub fn status(&self) -> Status {
        self.status.get()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == Status::Connected
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Connect if needed and return the tool catalog.
    ///
    /// Already connected: returns the cached catalog without any traffic.
    /// Otherwise establishes the transport, performs the handshake and
    /// fetches and translates the catalog. On any failure the session stays
    /// disconnected and nothing is kept.
    pub async fn connect(&self) -> Result<Arc<[ToolDescriptor]>> {
        let mut live = self.live.lock().await;
        if let Some(live) = live.as_ref() {
            return Ok(Arc::clone(&live.catalog));
        }

        self.status.set(Status::Connecting);
        let reset = Reset::arm(&self.status);

        let established = tokio::time::timeout(self.config.connect_timeout, self.establish())
            .await
            .unwrap_or(Err(Error::Connection(mcp::Error::Timeout)))?;

        let catalog = Arc::clone(&established.catalog);
        *live = Some(established);
        self.status.set(Status::Connected);
        reset.disarm();

        info!(tools = catalog.len(), "connected to tool server");
        Ok(catalog)
    }

    async fn establish(&self) -> Result<Live<C::Transport>> {
        let transport = self.connector.connect().await?;
        let mut client = Client::new(transport);
        client.initialize().await?;

        let tools = client.list_tools().await?;
        match tools::translate_catalog(&tools) {
            Ok(catalog) => Ok(Live {
                client,
                catalog: catalog.into(),
            }),
            Err(e) => {
                error!(error = %e, "rejecting tool catalog");
                if let Err(close) = client.close().await {
                    warn!(error = %close, "failed to close tool server transport");
                }
                Err(e.into())
            }
        }
    }

    /// The cached catalog, without connecting.
    pub async fn catalog(&self) -> Result<Arc<[ToolDescriptor]>> {
        let live = self.live.lock().await;
        live.as_ref()
            .map(|live| Arc::clone(&live.catalog))
            .ok_or(Error::NotConnected)
    }

    /// Execute one tool call.
    ///
    /// A result the server flags as an error, or a JSON-RPC error response,
    /// is returned as a [`ToolCallResult`] with `is_error` set. Transport
    /// failures and timeouts are [`Error::Connection`] and leave the session
    /// disconnected.
    pub async fn dispatch(&self, request: &ToolCallRequest) -> Result<ToolCallResult> {
        let mut guard = self.live.lock().await;
        // Taken out for the call: if this future is dropped mid-request the
        // stream is left unusable and must not be put back.
        let Some(mut live) = guard.take() else {
            return Err(Error::NotConnected);
        };
        let reset = Reset::arm(&self.status);

        debug!(tool = %request.name, id = %request.id, "dispatching tool call");

        let arguments = Some(request.arguments.clone());
        let outcome = tokio::time::timeout(
            self.config.call_timeout,
            live.client.call_tool(&request.name, arguments),
        )
        .await
        .unwrap_or(Err(mcp::Error::Timeout));

        let result = match outcome {
            Ok(remote) => ToolCallResult::from_remote(&request.id, &remote),
            Err(mcp::Error::JsonRpc(rejection)) => {
                ToolCallResult::error(&request.id, rejection.message)
            }
            Err(e) => {
                warn!(tool = %request.name, error = %e, "tool call failed, dropping connection");
                if let Err(close) = live.client.close().await {
                    warn!(error = %close, "failed to close tool server transport");
                }
                return Err(Error::Connection(e));
            }
        };

        *guard = Some(live);
        reset.disarm();

        if result.is_error {
            warn!(
                tool = %request.name,
                id = %request.id,
                content = %result.content,
                "tool reported an error"
            );
        }
        Ok(result)
    }

    /// Close the connection and drop the cached catalog. No-op if not
    /// connected.
    pub async fn disconnect(&self) {
        let mut guard = self.live.lock().await;
        let Some(live) = guard.take() else {
            return;
        };
        self.status.set(Status::Disconnected);

        if let Err(e) = live.client.close().await {
            warn!(error = %e, "failed to close tool server transport");
        }
        info!("disconnected from tool server");
    }
}
