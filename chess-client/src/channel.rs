//! Channel manager: the single persistent connection to the game server.
//!
//! The manager owns at most one connection task. That task connects through a
//! [`Connector`], announces the [`Identity`] before anything else, forwards
//! outbound frames, decodes inbound ones and publishes them on the
//! [`EventBus`]. Transport failures are retried under the configured
//! [`RetryPolicy`]; an authorization failure is final.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chess_proto::{decode_frame, encode_frame, ClientMessage, EventKind, ServerMessage};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::RetryPolicy;
use crate::error::{ClientError, ClientResult};
use crate::transport::{Connector, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub auth_token: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            auth_token: auth_token.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.user_id.trim().is_empty() && !self.auth_token.trim().is_empty()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// Everything the channel manager publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    State(ConnectionState),
    /// Published when a connection drops, before any retry. Connections that
    /// drop again before the server sends anything are not re-announced.
    ConnectionLost { reason: String },
    /// The retry budget ran out; the manager has stopped.
    RetriesExhausted { attempts: u32 },
    Message(ServerMessage),
}

/// Which inbound server events a subscriber wants. Lifecycle events
/// (state changes, connection loss, exhausted retries) are always delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interest {
    All,
    Only(Vec<EventKind>),
}

impl Interest {
    fn wants(&self, event: &ChannelEvent) -> bool {
        match (self, event) {
            (Interest::All, _) => true,
            (Interest::Only(kinds), ChannelEvent::Message(msg)) => kinds.contains(&msg.kind()),
            (Interest::Only(_), _) => true,
        }
    }
}

struct Subscriber {
    interest: Interest,
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

/// Routes channel events to subscribers, one subscription per owner.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<HashMap<String, Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, owner: &str, interest: Interest) -> ClientResult<Subscription> {
        let mut subscribers = self.lock();
        if subscribers.contains_key(owner) {
            return Err(ClientError::AlreadySubscribed(owner.to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        subscribers.insert(owner.to_string(), Subscriber { interest, tx });
        debug!(owner, "subscribed to channel events");
        Ok(Subscription {
            owner: owner.to_string(),
            bus: self.clone(),
            rx,
        })
    }

    pub fn publish(&self, event: ChannelEvent) {
        let mut subscribers = self.lock();
        subscribers.retain(|owner, sub| {
            if !sub.interest.wants(&event) {
                return true;
            }
            let delivered = sub.tx.send(event.clone()).is_ok();
            if !delivered {
                debug!(owner = owner.as_str(), "dropping closed subscriber");
            }
            delivered
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn unsubscribe(&self, owner: &str) {
        if self.lock().remove(owner).is_some() {
            debug!(owner, "unsubscribed from channel events");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A registered event stream. Dropping it unsubscribes.
pub struct Subscription {
    owner: String,
    bus: EventBus,
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl Subscription {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Next event. Cancel-safe.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.owner);
    }
}

/// Outbound side of the channel as seen by the session core.
pub trait Outbound {
    fn send(&self, message: ClientMessage) -> ClientResult<()>;

    fn is_connected(&self) -> bool;
}

/// Writes the connection state and announces changes on the bus.
#[derive(Clone)]
struct StatePublisher {
    state: Arc<watch::Sender<ConnectionState>>,
    bus: EventBus,
}

impl StatePublisher {
    fn set(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            info!(?prev, ?next, "connection state changed");
            self.bus.publish(ChannelEvent::State(next));
        }
    }

    fn get(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

struct ActiveConnection {
    identity: Identity,
    outbound: mpsc::UnboundedSender<String>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

pub struct ChannelManager {
    connector: Arc<dyn Connector>,
    policy: RetryPolicy,
    shutdown_timeout: Duration,
    publisher: StatePublisher,
    active: Option<ActiveConnection>,
}

impl ChannelManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        policy: RetryPolicy,
        shutdown_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            policy,
            shutdown_timeout,
            publisher: StatePublisher {
                state: Arc::new(state),
                bus: EventBus::new(),
            },
            active: None,
        }
    }

    /// Open the connection for `identity`.
    ///
    /// Returns once the connection task is started; progress is published as
    /// [`ChannelEvent::State`]. Connecting again with the same identity while
    /// a connection is live or in progress reuses it. A different identity
    /// tears the old connection down first.
    pub async fn connect(&mut self, identity: Option<Identity>) -> ClientResult<()> {
        let identity = match identity {
            Some(identity) if identity.is_complete() => identity,
            _ => return Err(ClientError::AuthRequired),
        };

        if let Some(active) = &self.active {
            if !active.task.is_finished() {
                if active.identity == identity {
                    debug!(user = %identity.user_id, "already connected, reusing connection");
                    return Ok(());
                }
                info!(
                    old = %active.identity.user_id,
                    new = %identity.user_id,
                    "identity changed, reconnecting"
                );
            }
            self.disconnect().await;
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let ctx = LoopContext {
            connector: Arc::clone(&self.connector),
            policy: self.policy.clone(),
            identity: identity.clone(),
            publisher: self.publisher.clone(),
            outbound_rx,
            shutdown_rx,
        };
        info!(target_addr = %self.connector.describe(), user = %identity.user_id, "connecting");
        let task = tokio::spawn(connection_loop(ctx));
        self.active = Some(ActiveConnection {
            identity,
            outbound: outbound_tx,
            shutdown: Some(shutdown_tx),
            task,
        });
        Ok(())
    }

    /// Close the connection and stop retrying. Publishes `Disconnected`.
    pub async fn disconnect(&mut self) {
        if let Some(mut active) = self.active.take() {
            if let Some(tx) = active.shutdown.take() {
                let _ = tx.send(());
            }
            match tokio::time::timeout(self.shutdown_timeout, &mut active.task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("connection task terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("connection task did not exit within timeout; aborting");
                    active.task.abort();
                    if let Err(join_err) = active.task.await {
                        debug!("connection task aborted: {join_err}");
                    }
                }
            }
        }
        self.publisher.set(ConnectionState::Disconnected);
    }

    /// Queue a message for the server. Fails unless currently connected.
    pub fn send(&self, message: ClientMessage) -> ClientResult<()> {
        if self.publisher.get() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let active = self.active.as_ref().ok_or(ClientError::NotConnected)?;
        let frame = encode_frame(&message)?;
        debug!(event = message.name(), "queueing outbound message");
        active
            .outbound
            .send(frame)
            .map_err(|_| ClientError::NotConnected)
    }

    /// Register `owner` for channel events.
    pub fn on(&self, owner: &str, interest: Interest) -> ClientResult<Subscription> {
        self.publisher.bus.subscribe(owner, interest)
    }

    pub fn state(&self) -> ConnectionState {
        self.publisher.get()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.publisher.state.subscribe()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.active.as_ref().map(|a| &a.identity)
    }

    pub fn bus(&self) -> &EventBus {
        &self.publisher.bus
    }
}

impl Outbound for ChannelManager {
    fn send(&self, message: ClientMessage) -> ClientResult<()> {
        ChannelManager::send(self, message)
    }

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        // No executor for a graceful close here.
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

// ── Connection loop ─────────────────────────────────────────────────

struct LoopContext {
    connector: Arc<dyn Connector>,
    policy: RetryPolicy,
    identity: Identity,
    publisher: StatePublisher,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    shutdown_rx: oneshot::Receiver<()>,
}

enum Ended {
    Shutdown,
    /// `established` is set once the server has sent at least one frame.
    Lost { reason: String, established: bool },
    Fatal(String),
}

async fn connection_loop(mut ctx: LoopContext) {
    let mut failures: u32 = 0;
    let mut was_connected = false;
    // One ConnectionLost per stable connection, however many retries follow.
    let mut loss_announced = false;

    loop {
        ctx.publisher.set(if was_connected || failures > 0 {
            ConnectionState::Reconnecting
        } else {
            ConnectionState::Connecting
        });

        let attempt = tokio::select! {
            biased;
            _ = &mut ctx.shutdown_rx => break,
            attempt = ctx.connector.connect() => attempt,
        };

        let failure = match attempt {
            Ok(transport) => match run_connection(&mut ctx, transport).await {
                Ended::Shutdown => break,
                Ended::Fatal(reason) => {
                    error!(%reason, "server refused the connection");
                    break;
                }
                Ended::Lost {
                    reason,
                    established,
                } => {
                    warn!(%reason, established, "connection lost");
                    was_connected = true;
                    if established {
                        failures = 0;
                        loss_announced = false;
                    }
                    ctx.publisher.set(ConnectionState::Reconnecting);
                    if !loss_announced {
                        loss_announced = true;
                        ctx.publisher.bus.publish(ChannelEvent::ConnectionLost {
                            reason: reason.clone(),
                        });
                    }
                    (!established).then_some(reason)
                }
            },
            Err(e) => Some(e.to_string()),
        };

        if let Some(reason) = failure {
            failures += 1;
            warn!(
                attempt = failures,
                max = ctx.policy.max_attempts,
                "connection attempt failed: {reason}"
            );
            if failures >= ctx.policy.max_attempts {
                error!(attempts = failures, "giving up on the game server");
                ctx.publisher
                    .bus
                    .publish(ChannelEvent::RetriesExhausted { attempts: failures });
                break;
            }
            ctx.publisher.set(ConnectionState::Reconnecting);
        }

        let delay = ctx.policy.delay_for(failures.max(1));
        debug!(?delay, "waiting before reconnecting");
        tokio::select! {
            biased;
            _ = &mut ctx.shutdown_rx => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    ctx.publisher.set(ConnectionState::Disconnected);
    debug!("connection loop exited");
}

async fn run_connection(ctx: &mut LoopContext, mut transport: Box<dyn Transport>) -> Ended {
    // Frames queued for a connection that has since dropped are not replayed.
    let mut stale = 0usize;
    while ctx.outbound_rx.try_recv().is_ok() {
        stale += 1;
    }
    if stale > 0 {
        warn!(count = stale, "discarded frames queued before reconnect");
    }

    let identify = ClientMessage::Identify {
        user_id: ctx.identity.user_id.clone(),
        auth_token: ctx.identity.auth_token.clone(),
    };
    let frame = match encode_frame(&identify) {
        Ok(frame) => frame,
        Err(e) => return Ended::Fatal(e.to_string()),
    };
    if let Err(e) = transport.send(frame).await {
        return Ended::Lost {
            reason: e.to_string(),
            established: false,
        };
    }
    ctx.publisher.set(ConnectionState::Connected);
    let mut established = false;

    loop {
        tokio::select! {
            biased;
            _ = &mut ctx.shutdown_rx => {
                let _ = transport.close().await;
                return Ended::Shutdown;
            }
            frame = ctx.outbound_rx.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = transport.send(frame).await {
                        return Ended::Lost {
                            reason: e.to_string(),
                            established,
                        };
                    }
                }
                None => {
                    let _ = transport.close().await;
                    return Ended::Shutdown;
                }
            },
            incoming = transport.recv() => match incoming {
                Some(Ok(text)) => match decode_frame::<ServerMessage>(&text) {
                    Ok(ServerMessage::Unknown) => {
                        established = true;
                        warn!(frame = %text, "ignoring unknown server event");
                    }
                    Ok(message) => {
                        established = true;
                        debug!(kind = ?message.kind(), "server event");
                        let fatal = match &message {
                            ServerMessage::ConnectionError { reason } => Some(reason.clone()),
                            _ => None,
                        };
                        ctx.publisher.bus.publish(ChannelEvent::Message(message));
                        if let Some(reason) = fatal {
                            let _ = transport.close().await;
                            return Ended::Fatal(reason);
                        }
                    }
                    Err(e) => {
                        warn!(frame = %text, "malformed server frame: {e}");
                    }
                },
                Some(Err(e)) => {
                    return Ended::Lost {
                        reason: e.to_string(),
                        established,
                    }
                }
                None => {
                    return Ended::Lost {
                        reason: "connection closed by server".to_string(),
                        established,
                    }
                }
            },
        }
    }
}
