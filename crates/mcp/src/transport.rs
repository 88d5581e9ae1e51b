//! Message transports to an MCP server.
//!
//! A [`Transport`] moves whole JSON-RPC messages over one ordered duplex
//! channel; a [`Connector`] knows how to open a fresh one. The client never
//! interleaves requests, so transports need no correlation logic of their own.

use std::collections::HashMap;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::sse::SseTransport;

/// Maximum size of a single message (1MB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// How long a stdio server gets to exit after its stdin is closed.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// An ordered, message-oriented duplex channel to a server.
pub trait Transport: Send {
    /// Send one serialized message.
    fn send(&mut self, message: &str) -> impl Future<Output = Result<()>> + Send;

    /// Receive the next serialized message.
    ///
    /// Returns [`Error::ServerExited`] once the peer has gone away.
    fn receive(&mut self) -> impl Future<Output = Result<String>> + Send;

    /// Release the channel. Further use is an error.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens fresh transports to one server.
pub trait Connector: Send + Sync {
    type Transport: Transport + 'static;

    fn connect(&self) -> impl Future<Output = Result<Self::Transport>> + Send;
}

fn check_size(size: usize) -> Result<()> {
    if size > MAX_MESSAGE_SIZE {
        return Err(Error::OutputTooLarge {
            size,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}

/// Newline-delimited JSON over any async byte stream.
pub struct StreamTransport<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }
}

impl<R, W> Transport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, message: &str) -> Result<()> {
        self.writer.write_all(message.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<String> {
        // One byte past the limit is enough to tell an oversized line apart.
        let limit = MAX_MESSAGE_SIZE as u64 + 1;
        loop {
            let mut line = Vec::new();
            let bytes_read = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut line)
                .await?;
            if bytes_read == 0 {
                return Err(Error::ServerExited);
            }
            check_size(line.len())?;

            let line = String::from_utf8(line)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            let line = line.trim();
            if !line.is_empty() {
                return Ok(line.to_string());
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Line-delimited JSON-RPC over TCP.
pub type TcpTransport = StreamTransport<OwnedReadHalf, OwnedWriteHalf>;

impl TcpTransport {
    /// Connect to `address` (`host:port`).
    pub async fn connect(address: &str) -> Result<Self> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self::new(reader, writer))
    }
}

/// Configuration for a server launched as a child process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

/// Line-delimited JSON-RPC over a child process's stdin/stdout.
pub struct StdioTransport {
    process: Child,
    stream: StreamTransport<ChildStdout, ChildStdin>,
}

impl StdioTransport {
    /// Spawn the server process.
    ///
    /// The child is killed if the transport is dropped without `close`.
    pub fn spawn(config: &ServerConfig) -> Result<Self> {
        let spawn_error = |source| Error::Spawn {
            command: config.command.clone(),
            source,
        };

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut process = cmd.spawn().map_err(spawn_error)?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| spawn_error(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| spawn_error(std::io::Error::other("failed to capture stdout")))?;

        debug!(command = %config.command, pid = ?process.id(), "spawned tool server");

        Ok(Self {
            process,
            stream: StreamTransport::new(stdout, stdin),
        })
    }
}

impl Transport for StdioTransport {
    async fn send(&mut self, message: &str) -> Result<()> {
        self.stream.send(message).await
    }

    async fn receive(&mut self) -> Result<String> {
        self.stream.receive().await
    }

    async fn close(&mut self) -> Result<()> {
        // Closing stdin asks the server to exit; kill it if it lingers.
        if let Err(e) = self.stream.close().await {
            warn!(error = %e, "failed to close server stdin");
        }
        if tokio::time::timeout(EXIT_GRACE, self.process.wait())
            .await
            .is_err()
        {
            self.process.kill().await?;
        }
        Ok(())
    }
}

/// Where a tool server lives and how to reach it.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// Spawn a child process and talk over its stdio.
    Stdio(ServerConfig),
    /// Connect to `host:port`.
    Tcp(String),
    /// HTTP+SSE server at the given event-stream URL.
    Sse(String),
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio(config) => write!(f, "stdio:{}", config.command),
            Self::Tcp(address) => write!(f, "tcp:{address}"),
            Self::Sse(url) => write!(f, "{url}"),
        }
    }
}

/// A transport to any [`Endpoint`].
pub enum EndpointTransport {
    Stdio(StdioTransport),
    Tcp(TcpTransport),
    Sse(SseTransport),
}

impl Transport for EndpointTransport {
    async fn send(&mut self, message: &str) -> Result<()> {
        match self {
            Self::Stdio(t) => t.send(message).await,
            Self::Tcp(t) => t.send(message).await,
            Self::Sse(t) => t.send(message).await,
        }
    }

    async fn receive(&mut self) -> Result<String> {
        match self {
            Self::Stdio(t) => t.receive().await,
            Self::Tcp(t) => t.receive().await,
            Self::Sse(t) => t.receive().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Stdio(t) => t.close().await,
            Self::Tcp(t) => t.close().await,
            Self::Sse(t) => t.close().await,
        }
    }
}

impl Connector for Endpoint {
    type Transport = EndpointTransport;

    async fn connect(&self) -> Result<EndpointTransport> {
        match self {
            Self::Stdio(config) => StdioTransport::spawn(config).map(EndpointTransport::Stdio),
            Self::Tcp(address) => TcpTransport::connect(address)
                .await
                .map(EndpointTransport::Tcp),
            Self::Sse(url) => SseTransport::connect(url).await.map(EndpointTransport::Sse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, duplex};

    #[tokio::test]
    async fn stream_transport_frames_lines() {
        let (client_end, server_end) = duplex(1024);
        let (client_read, client_write) = tokio::io::split(client_end);
        let (mut server_read, mut server_write) = tokio::io::split(server_end);
        let mut transport = StreamTransport::new(client_read, client_write);

        transport.send(r#"{"a":1}"#).await.unwrap();
        let mut buf = [0u8; 8];
        server_read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"{\"a\":1}\n");

        server_write.write_all(b"\n{\"b\":2}\n").await.unwrap();
        assert_eq!(transport.receive().await.unwrap(), r#"{"b":2}"#);
    }

    #[tokio::test]
    async fn stream_transport_reports_eof() {
        let (client_end, server_end) = duplex(64);
        let (client_read, client_write) = tokio::io::split(client_end);
        let mut transport = StreamTransport::new(client_read, client_write);
        drop(server_end);

        assert!(matches!(
            transport.receive().await,
            Err(Error::ServerExited)
        ));
    }

    #[tokio::test]
    async fn oversized_line_is_rejected_without_newline() {
        let (client_end, server_end) = duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client_end);
        let (_server_read, mut server_write) = tokio::io::split(server_end);
        let mut transport = StreamTransport::new(client_read, client_write);

        let writer = tokio::spawn(async move {
            let chunk = vec![b'x'; 64 * 1024];
            loop {
                if server_write.write_all(&chunk).await.is_err() {
                    break;
                }
            }
        });

        match transport.receive().await {
            Err(Error::OutputTooLarge { size, max }) => {
                assert_eq!(max, MAX_MESSAGE_SIZE);
                assert_eq!(size, MAX_MESSAGE_SIZE + 1);
            }
            other => panic!("expected OutputTooLarge, got {other:?}"),
        }
        drop(transport);
        writer.abort();
    }

    #[tokio::test]
    async fn line_at_the_limit_is_accepted() {
        let (client_end, server_end) = duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client_end);
        let (_server_read, mut server_write) = tokio::io::split(server_end);
        let mut transport = StreamTransport::new(client_read, client_write);

        tokio::spawn(async move {
            let mut line = vec![b'7'; MAX_MESSAGE_SIZE - 1];
            line.push(b'\n');
            server_write.write_all(&line).await.unwrap();
        });

        let line = transport.receive().await.unwrap();
        assert_eq!(line.len(), MAX_MESSAGE_SIZE - 1);
    }

    #[tokio::test]
    async fn stdio_close_ends_the_server() {
        let config = ServerConfig {
            command: "cat".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
        };
        let mut transport = StdioTransport::spawn(&config).unwrap();
        transport.send(r#"{"ping":1}"#).await.unwrap();
        assert_eq!(transport.receive().await.unwrap(), r#"{"ping":1}"#);

        transport.close().await.unwrap();
        assert!(transport.process.try_wait().unwrap().is_some());
    }

    #[tokio::test]
    async fn stdio_spawn_failure_names_command() {
        let config = ServerConfig {
            command: "definitely-not-a-real-tether-server".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
        };
        match StdioTransport::spawn(&config) {
            Err(Error::Spawn { command, .. }) => {
                assert_eq!(command, "definitely-not-a-real-tether-server");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("spawn should fail"),
        }
    }

    #[test]
    fn endpoint_display() {
        assert_eq!(
            Endpoint::Sse("http://localhost:8000/sse".into()).to_string(),
            "http://localhost:8000/sse"
        );
        assert_eq!(
            Endpoint::Tcp("127.0.0.1:9000".into()).to_string(),
            "tcp:127.0.0.1:9000"
        );
    }
}
