use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant};
use tracing::Instrument;

use super::commands::ClientCommand;
use crate::channel::{ChannelManager, Subscription};
use crate::events::ClientEvent;
use crate::session::ClientCore;

/// Everything the actor owns. Only the actor task touches it.
pub(crate) struct ActorState {
    pub core: ClientCore,
    pub channel: ChannelManager,
    pub subscription: Subscription,
    pub tick_interval: time::Duration,
}

/// The client actor loop.
/// Applies commands, channel events and clock ticks one at a time.
pub(crate) async fn run_client_actor(
    state: ActorState,
    cmd_rx: mpsc::Receiver<ClientCommand>,
    event_tx: broadcast::Sender<ClientEvent>,
) {
    run_client_actor_inner(state, cmd_rx, event_tx)
        .instrument(tracing::info_span!("game_client"))
        .await;
}

async fn run_client_actor_inner(
    mut state: ActorState,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
    event_tx: broadcast::Sender<ClientEvent>,
) {
    tracing::info!("Client actor started");

    let mut tick = time::interval(state.tick_interval);
    tick.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Shutdown) | None => {
                        tracing::info!("Client actor shutting down");
                        state.channel.disconnect().await;
                        break;
                    }
                    Some(cmd) => handle_command(&mut state, cmd, &event_tx).await,
                }
            }

            Some(event) = state.subscription.recv() => {
                let events = state.core.handle_channel(event, &state.channel, Instant::now());
                publish(&event_tx, events);
            }

            _ = tick.tick() => {
                publish(&event_tx, state.core.tick(Instant::now()));
            }
        }
    }

    tracing::info!("Client actor exited");
}

async fn handle_command(
    state: &mut ActorState,
    cmd: ClientCommand,
    event_tx: &broadcast::Sender<ClientEvent>,
) {
    let ActorState { core, channel, .. } = state;
    match cmd {
        ClientCommand::Connect { identity, reply } => {
            if identity.is_complete() {
                publish(event_tx, core.set_user(&identity.user_id));
            }
            let _ = reply.send(channel.connect(Some(identity)).await);
        }
        ClientCommand::Disconnect { reply } => {
            channel.disconnect().await;
            let _ = reply.send(());
        }
        ClientCommand::FindMatch { request, reply } => {
            let result = core.find_match(request, &*channel, Instant::now());
            let _ = reply.send(result.map(|events| publish(event_tx, events)));
        }
        ClientCommand::CancelMatchmaking { reply } => {
            let result = core.cancel_matchmaking(&*channel);
            let _ = reply.send(result.map(|events| publish(event_tx, events)));
        }
        ClientCommand::Challenge {
            opponent_id,
            mode,
            color_preference,
            reply,
        } => {
            let result = core.challenge(
                opponent_id,
                mode,
                color_preference,
                &*channel,
                Instant::now(),
            );
            let _ = reply.send(result.map(|events| publish(event_tx, events)));
        }
        ClientCommand::RespondToChallenge { accept, reply } => {
            let result = core.respond_to_challenge(accept, &*channel);
            let _ = reply.send(result.map(|events| publish(event_tx, events)));
        }
        ClientCommand::RequestRoster { reply } => {
            let _ = reply.send(core.request_roster(&*channel));
        }
        ClientCommand::SubmitMove { intent, reply } => {
            let _ = reply.send(core.submit_move(&intent, &*channel));
        }
        ClientCommand::Rejoin { reply } => {
            let _ = reply.send(core.rejoin(&*channel));
        }
        ClientCommand::CancelRejoin { reply } => {
            let events = core.cancel_rejoin();
            let cancelled = !events.is_empty();
            publish(event_tx, events);
            let _ = reply.send(cancelled);
        }
        ClientCommand::Leave { reply } => {
            let result = core.leave(&*channel);
            let _ = reply.send(result.map(|events| publish(event_tx, events)));
        }
        ClientCommand::SetAutoRotate { on, reply } => {
            publish(event_tx, core.set_auto_rotate(on));
            let _ = reply.send(());
        }
        ClientCommand::PauseClock { reply } => {
            publish(event_tx, core.pause_clock(Instant::now()));
            let _ = reply.send(());
        }
        ClientCommand::ResumeClock { reply } => {
            publish(event_tx, core.resume_clock(Instant::now()));
            let _ = reply.send(());
        }
        ClientCommand::GetView { reply } => {
            let _ = reply.send(core.view());
        }
        ClientCommand::Subscribe { reply } => {
            let _ = reply.send((core.view(), event_tx.subscribe()));
        }
        ClientCommand::Shutdown => {}
    }
}

fn publish(event_tx: &broadcast::Sender<ClientEvent>, events: Vec<ClientEvent>) {
    for event in events {
        // No subscribers is fine.
        let _ = event_tx.send(event);
    }
}
