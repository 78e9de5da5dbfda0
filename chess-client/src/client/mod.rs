//! Async front of the client: one actor task owning the [`ClientCore`] and
//! the channel, driven through a cloneable [`GameClientHandle`].

mod actor;
mod commands;
mod handle;

use std::sync::Arc;

use chess::{CozyRules, RulesEngine};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use crate::channel::{ChannelManager, Interest};
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::resume_store::ResumeStore;
use crate::session::ClientCore;
use crate::transport::{Connector, TcpConnector};
use actor::{run_client_actor, ActorState};
pub use handle::GameClientHandle;

const COMMAND_CAPACITY: usize = 32;

pub struct GameClient;

impl GameClient {
    /// Spawn the actor. Must be called inside a tokio runtime.
    pub fn spawn(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        rules: Arc<dyn RulesEngine>,
        store: Option<ResumeStore>,
    ) -> ClientResult<GameClientHandle> {
        let channel = ChannelManager::new(connector, config.retry.clone(), config.shutdown_timeout);
        let subscription = channel.on("session", Interest::All)?;
        let core = ClientCore::new(&config, rules, store, Instant::now());

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        let state = ActorState {
            core,
            channel,
            subscription,
            tick_interval: config.tick_interval,
        };
        tokio::spawn(run_client_actor(state, cmd_rx, event_tx));
        Ok(GameClientHandle::new(cmd_tx))
    }

    /// Spawn against the TCP server in `config`, with the bundled rules and
    /// the resume file under `config.data_dir` when one is set.
    pub fn spawn_tcp(config: ClientConfig) -> ClientResult<GameClientHandle> {
        let connector = TcpConnector::new(config.server_addr.clone(), config.connect_timeout)?;
        let store = config.data_dir.clone().map(ResumeStore::new);
        Self::spawn(config, Arc::new(connector), Arc::new(CozyRules), store)
    }
}
