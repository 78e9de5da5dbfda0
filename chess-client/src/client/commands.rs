use chess_proto::{ColorPreference, TimeControl};
use tokio::sync::{broadcast, oneshot};

use crate::channel::Identity;
use crate::error::ClientResult;
use crate::events::{ClientEvent, GameView};
use crate::gate::{MoveIntent, Rejection};
use crate::negotiator::MatchRequest;
use crate::resume::RejoinStatus;

/// Commands sent to the client actor. Each embeds a oneshot for the reply.
pub enum ClientCommand {
    Connect {
        identity: Identity,
        reply: oneshot::Sender<ClientResult<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    FindMatch {
        request: MatchRequest,
        reply: oneshot::Sender<ClientResult<()>>,
    },
    CancelMatchmaking {
        reply: oneshot::Sender<ClientResult<()>>,
    },
    Challenge {
        opponent_id: String,
        mode: TimeControl,
        color_preference: ColorPreference,
        reply: oneshot::Sender<ClientResult<()>>,
    },
    RespondToChallenge {
        accept: bool,
        reply: oneshot::Sender<ClientResult<()>>,
    },
    RequestRoster {
        reply: oneshot::Sender<ClientResult<()>>,
    },
    SubmitMove {
        intent: MoveIntent,
        reply: oneshot::Sender<Result<String, Rejection>>,
    },
    Rejoin {
        reply: oneshot::Sender<ClientResult<RejoinStatus>>,
    },
    CancelRejoin {
        reply: oneshot::Sender<bool>,
    },
    Leave {
        reply: oneshot::Sender<ClientResult<()>>,
    },
    SetAutoRotate {
        on: bool,
        reply: oneshot::Sender<()>,
    },
    PauseClock {
        reply: oneshot::Sender<()>,
    },
    ResumeClock {
        reply: oneshot::Sender<()>,
    },
    GetView {
        reply: oneshot::Sender<GameView>,
    },
    Subscribe {
        reply: oneshot::Sender<(GameView, broadcast::Receiver<ClientEvent>)>,
    },
    Shutdown,
}
