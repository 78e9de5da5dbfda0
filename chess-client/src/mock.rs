//! Scripted connector for testing - only compiled in test mode or with the
//! `mock` feature.
//!
//! Each [`MockConnector::expect_connection`] queues one successful connection
//! and hands back the server side of it as a [`MockPeer`];
//! [`MockConnector::expect_failure`] queues a failed attempt. Connecting with
//! nothing queued fails.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chess_proto::{decode_frame, encode_frame, ClientMessage, ServerMessage};
use tokio::sync::mpsc;

use crate::error::{ClientError, ClientResult};
use crate::transport::{Connector, Transport};

enum Script {
    Accept(MockTransport),
    Fail(String),
}

enum PeerFrame {
    Text(String),
    Hangup,
}

#[derive(Clone, Default)]
pub struct MockConnector {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    attempts: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a connection that succeeds. The returned peer plays the server.
    pub fn expect_connection(&self) -> MockPeer {
        let (to_client, from_peer) = mpsc::unbounded_channel();
        let (to_peer, from_client) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let transport = MockTransport {
            incoming: from_peer,
            outgoing: to_peer,
            closed: Arc::clone(&closed),
        };
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Script::Accept(transport));
        MockPeer {
            to_client,
            from_client,
            closed,
        }
    }

    /// Queue a connection attempt that fails with `reason`.
    pub fn expect_failure(&self, reason: impl Into<String>) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Script::Fail(reason.into()));
    }

    /// Number of connection attempts made so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> ClientResult<Box<dyn Transport>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match script {
            Some(Script::Accept(transport)) => Ok(Box::new(transport)),
            Some(Script::Fail(reason)) => Err(ClientError::ConnectionFailed(reason)),
            None => Err(ClientError::ConnectionFailed(
                "no scripted connection".to_string(),
            )),
        }
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

struct MockTransport {
    incoming: mpsc::UnboundedReceiver<PeerFrame>,
    outgoing: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: String) -> ClientResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("connection closed".to_string()));
        }
        self.outgoing
            .send(frame)
            .map_err(|_| ClientError::Transport("peer gone".to_string()))
    }

    async fn recv(&mut self) -> Option<ClientResult<String>> {
        match self.incoming.recv().await {
            Some(PeerFrame::Text(text)) => Some(Ok(text)),
            Some(PeerFrame::Hangup) | None => None,
        }
    }

    async fn close(&mut self) -> ClientResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Server side of one scripted connection.
pub struct MockPeer {
    to_client: mpsc::UnboundedSender<PeerFrame>,
    from_client: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl MockPeer {
    /// Wait for the next message the client sends on this connection.
    pub async fn next_client_message(&mut self) -> Option<ClientMessage> {
        let frame = self.from_client.recv().await?;
        decode_frame(&frame).ok()
    }

    /// A message the client already sent, without waiting.
    pub fn try_next_client_message(&mut self) -> Option<ClientMessage> {
        let frame = self.from_client.try_recv().ok()?;
        decode_frame(&frame).ok()
    }

    pub fn push(&self, message: &ServerMessage) {
        if let Ok(frame) = encode_frame(message) {
            self.push_raw(frame);
        }
    }

    pub fn push_raw(&self, frame: impl Into<String>) {
        let _ = self.to_client.send(PeerFrame::Text(frame.into()));
    }

    /// Simulate the server dropping the connection.
    pub fn drop_connection(&self) {
        let _ = self.to_client.send(PeerFrame::Hangup);
    }

    /// Whether the client closed this connection.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
