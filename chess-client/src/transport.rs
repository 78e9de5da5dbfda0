//! Frame transports for the channel manager.
//!
//! A [`Transport`] moves whole text frames (one JSON document each); a
//! [`Connector`] opens a fresh transport for every (re)connection attempt.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, frame: String) -> ClientResult<()>;

    /// Next inbound frame. `None` means the peer closed the connection.
    ///
    /// Must be cancel-safe: the channel loop polls it inside `select!`.
    async fn recv(&mut self) -> Option<ClientResult<String>>;

    async fn close(&mut self) -> ClientResult<()>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> ClientResult<Box<dyn Transport>>;

    /// Human-readable target, for logs.
    fn describe(&self) -> String;
}

/// Newline-delimited frames over TCP.
pub struct TcpTransport {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, mut frame: String) -> ClientResult<()> {
        frame.push('\n');
        self.writer
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<ClientResult<String>> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => return Some(Ok(line)),
                Ok(None) => return None,
                Err(e) => return Some(Err(ClientError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> ClientResult<()> {
        self.writer
            .shutdown()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration) -> ClientResult<Self> {
        let addr = addr.into();
        if addr.trim().is_empty() || !addr.contains(':') {
            return Err(ClientError::InvalidAddress(addr));
        }
        Ok(Self {
            addr,
            connect_timeout,
        })
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> ClientResult<Box<dyn Transport>> {
        debug!(addr = %self.addr, "opening tcp connection");
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| ClientError::ConnectionFailed(format!("{}: timed out", self.addr)))?
            .map_err(|e| ClientError::ConnectionFailed(format!("{}: {}", self.addr, e)))?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {}", e);
        }
        Ok(Box::new(TcpTransport::new(stream)))
    }

    fn describe(&self) -> String {
        self.addr.clone()
    }
}
