use chess_proto::{ColorPreference, TimeControl};
use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::ClientCommand;
use crate::channel::Identity;
use crate::error::{ClientError, ClientResult};
use crate::events::{ClientEvent, GameView};
use crate::gate::MoveIntent;
use crate::negotiator::MatchRequest;
use crate::resume::RejoinStatus;

/// Cheap, cloneable handle to the client actor.
#[derive(Clone)]
pub struct GameClientHandle {
    cmd_tx: mpsc::Sender<ClientCommand>,
}

impl GameClientHandle {
    pub(crate) fn new(cmd_tx: mpsc::Sender<ClientCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Start connecting as `identity`. Progress arrives as
    /// [`ClientEvent::Connection`] events.
    pub async fn connect(&self, identity: Identity) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::Connect {
            identity,
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| ClientError::ActorClosed)?
    }

    pub async fn disconnect(&self) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::Disconnect { reply: tx }).await?;
        rx.await.map_err(|_| ClientError::ActorClosed)
    }

    pub async fn find_match(&self, request: MatchRequest) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::FindMatch { request, reply: tx })
            .await?;
        rx.await.map_err(|_| ClientError::ActorClosed)?
    }

    pub async fn cancel_matchmaking(&self) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::CancelMatchmaking { reply: tx })
            .await?;
        rx.await.map_err(|_| ClientError::ActorClosed)?
    }

    pub async fn challenge(
        &self,
        opponent_id: impl Into<String>,
        mode: TimeControl,
        color_preference: ColorPreference,
    ) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::Challenge {
            opponent_id: opponent_id.into(),
            mode,
            color_preference,
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| ClientError::ActorClosed)?
    }

    pub async fn respond_to_challenge(&self, accept: bool) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::RespondToChallenge { accept, reply: tx })
            .await?;
        rx.await.map_err(|_| ClientError::ActorClosed)?
    }

    pub async fn request_roster(&self) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::RequestRoster { reply: tx }).await?;
        rx.await.map_err(|_| ClientError::ActorClosed)?
    }

    /// Check a move locally and send it. Returns the notation sent; the
    /// board changes only when the server echoes the move.
    pub async fn submit_move(&self, intent: MoveIntent) -> ClientResult<String> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::SubmitMove { intent, reply: tx })
            .await?;
        Ok(rx.await.map_err(|_| ClientError::ActorClosed)??)
    }

    pub async fn rejoin(&self) -> ClientResult<RejoinStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::Rejoin { reply: tx }).await?;
        rx.await.map_err(|_| ClientError::ActorClosed)?
    }

    /// Stop trying to resume. Returns whether a rejoin was pending.
    pub async fn cancel_rejoin(&self) -> ClientResult<bool> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::CancelRejoin { reply: tx }).await?;
        rx.await.map_err(|_| ClientError::ActorClosed)
    }

    pub async fn leave(&self) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::Leave { reply: tx }).await?;
        rx.await.map_err(|_| ClientError::ActorClosed)?
    }

    pub async fn set_auto_rotate(&self, on: bool) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::SetAutoRotate { on, reply: tx })
            .await?;
        rx.await.map_err(|_| ClientError::ActorClosed)
    }

    pub async fn pause_clock(&self) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::PauseClock { reply: tx }).await?;
        rx.await.map_err(|_| ClientError::ActorClosed)
    }

    pub async fn resume_clock(&self) -> ClientResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::ResumeClock { reply: tx }).await?;
        rx.await.map_err(|_| ClientError::ActorClosed)
    }

    pub async fn view(&self) -> ClientResult<GameView> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::GetView { reply: tx }).await?;
        rx.await.map_err(|_| ClientError::ActorClosed)
    }

    /// Current view plus a receiver for everything that happens after it.
    pub async fn subscribe(&self) -> ClientResult<(GameView, broadcast::Receiver<ClientEvent>)> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientCommand::Subscribe { reply: tx }).await?;
        rx.await.map_err(|_| ClientError::ActorClosed)
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Shutdown).await;
    }

    async fn send(&self, cmd: ClientCommand) -> ClientResult<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| ClientError::ActorClosed)
    }
}
