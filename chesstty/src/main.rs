//! ChessTTY - line-oriented client for networked games.
//!
//! Reads commands from stdin, drives a [`GameClient`] and prints every
//! [`ClientEvent`] it broadcasts. Logs go to a daily rolling file so they
//! never interleave with the game output.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chess_client::{
    ClientEvent, ClockTracker, GameClient, GameClientHandle, GameView, Identity, MatchRequest,
};
use chess_proto::PieceColor;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod input;

use input::{parse_line, Input, HELP};

#[derive(Parser)]
#[command(name = "chesstty", about = "Play networked chess from the terminal")]
struct Cli {
    /// Game server address (host:port). Overrides CHESS_CLIENT_SERVER_ADDR.
    #[arg(short, long)]
    server: Option<String>,

    /// Connect right away as this user.
    #[arg(short, long, requires = "token")]
    user: Option<String>,

    /// Auth token for --user.
    #[arg(short, long)]
    token: Option<String>,

    /// Reconnect attempts before giving up. Overrides CHESS_CLIENT_MAX_RETRIES.
    #[arg(long)]
    max_retries: Option<u32>,

    /// Where the resume file lives. Overrides CHESS_CLIENT_DATA_DIR.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Do not remember games for resuming after a restart.
    #[arg(long)]
    no_resume: bool,

    /// Turn the board to face the side to move after every move.
    #[arg(long)]
    auto_rotate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_dir = config::get_log_dir();
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&log_dir, config::LOG_FILE_PREFIX);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client_config = config::client_config(&config::Overrides {
        server: cli.server,
        max_retries: cli.max_retries,
        data_dir: cli.data_dir,
        no_resume: cli.no_resume,
        auto_rotate: cli.auto_rotate,
    });
    tracing::info!(server = %client_config.server_addr, "ChessTTY starting up");

    println!("ChessTTY - networked chess");
    println!("Server: {}", client_config.server_addr);
    println!(
        "Debug logs: {}/{}.YYYY-MM-DD",
        log_dir.display(),
        config::LOG_FILE_PREFIX
    );
    println!("Type 'help' for commands.");

    let client = GameClient::spawn_tcp(client_config).context("failed to start client")?;
    let (_, events) = client.subscribe().await?;
    let printer = tokio::spawn(print_events(events));

    if let (Some(user), Some(token)) = (cli.user, cli.token) {
        client.connect(Identity::new(user, token)).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(Input::Quit)) => break,
            Ok(Some(input)) => {
                if let Err(e) = run(&client, input).await {
                    println!("! {e}");
                }
            }
            Err(e) => println!("! {e} (try 'help')"),
        }
    }

    client.shutdown().await;
    // Let the final disconnect event print.
    let _ = tokio::time::timeout(Duration::from_secs(2), printer).await;
    tracing::info!("ChessTTY shutting down");
    Ok(())
}

async fn run(client: &GameClientHandle, input: Input) -> anyhow::Result<()> {
    match input {
        Input::Connect { user, token } => client.connect(Identity::new(user, token)).await?,
        Input::Disconnect => client.disconnect().await?,
        Input::Queue { mode, color } => {
            client.find_match(MatchRequest::queue(mode, color)).await?
        }
        Input::Cancel => client.cancel_matchmaking().await?,
        Input::Challenge {
            opponent,
            mode,
            color,
        } => client.challenge(opponent, mode, color).await?,
        Input::Respond(accept) => client.respond_to_challenge(accept).await?,
        Input::Roster => client.request_roster().await?,
        Input::Move(intent) => {
            let sent = client.submit_move(intent).await?;
            println!("> sent {sent}");
        }
        Input::Rejoin => {
            let status = client.rejoin().await?;
            println!("> rejoin {status:?}");
        }
        Input::CancelRejoin => {
            if !client.cancel_rejoin().await? {
                println!("> nothing to cancel");
            }
        }
        Input::Leave => client.leave().await?,
        Input::Rotate(on) => client.set_auto_rotate(on).await?,
        Input::PauseClock => client.pause_clock().await?,
        Input::ResumeClock => client.resume_clock().await?,
        Input::View => println!("{}", render_view(&client.view().await?)),
        Input::Help => println!("{HELP}"),
        Input::Quit => {}
    }
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<ClientEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(text) = describe(&event) {
                    println!("{text}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "event printer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// One line per event. Clock ticks are too chatty to print.
fn describe(event: &ClientEvent) -> Option<String> {
    let text = match event {
        ClientEvent::Connection(state) => format!("* connection: {state:?}"),
        ClientEvent::ConnectionLost { reason } => format!("* connection lost: {reason}"),
        ClientEvent::RetriesExhausted { attempts } => {
            format!("* gave up after {attempts} attempts; 'connect' to try again")
        }
        ClientEvent::AuthRejected { reason } => format!("* server refused identity: {reason}"),
        ClientEvent::Negotiation(state) => format!("* matchmaking: {}", state.label()),
        ClientEvent::MatchGranted(grant) => format!(
            "* matched into {} as {}",
            grant.session_id,
            grant
                .assigned_color
                .map_or("spectator", PieceColor::as_str)
        ),
        ClientEvent::ChallengeOffered(offer) => format!(
            "* {} challenges you ({:?}, {:?}); 'accept' or 'decline'",
            offer.challenger_name, offer.mode, offer.color_preference
        ),
        ClientEvent::ChallengeSuperseded(offer) => {
            format!("* declined older challenge from {}", offer.challenger_name)
        }
        ClientEvent::Roster(users) => {
            let names: Vec<String> = users
                .iter()
                .map(|u| match u.rating {
                    Some(r) => format!("{} ({}) [{r}]", u.username, u.user_id),
                    None => format!("{} ({})", u.username, u.user_id),
                })
                .collect();
            format!("* online: {}", names.join(", "))
        }
        ClientEvent::SessionUpdated(view) => render_view(view),
        ClientEvent::Clock(_) => return None,
        ClientEvent::MoveRejected { reason, resync } => {
            if *resync {
                format!("! move rejected: {reason} (refreshing game state)")
            } else {
                format!("! move rejected: {reason}")
            }
        }
        ClientEvent::ResyncRequested { session_id } => {
            format!("* out of sync, refetching {session_id}")
        }
        ClientEvent::SessionEnded { session_id, reason } => {
            format!("* game {session_id} ended: {reason}")
        }
        ClientEvent::Resumed { session_id } => format!("* resumed {session_id}"),
        ClientEvent::RejoinCancelled => "* rejoin cancelled".to_string(),
        ClientEvent::GameOver(terminal) => format!(
            "* game over: {:?}, winner {}",
            terminal.kind,
            terminal.winner.map_or("none", PieceColor::as_str)
        ),
        ClientEvent::OpponentDisconnected { message } => format!("* {message}"),
        ClientEvent::OpponentResumed { message } => format!("* {message}"),
        ClientEvent::ServerError { message } => format!("! server: {message}"),
    };
    Some(text)
}

fn render_view(view: &GameView) -> String {
    let Some(session) = &view.session else {
        return format!(
            "[{:?}] no game ({})",
            view.connection,
            view.negotiation.label()
        );
    };
    let clock = |side: PieceColor| {
        let ms = match side {
            PieceColor::White => view.clock.white_ms,
            PieceColor::Black => view.clock.black_ms,
        };
        ClockTracker::format_time(Duration::from_millis(ms))
    };
    let last = session
        .move_log
        .last()
        .map_or(String::from("-"), |m| m.notation.clone());
    let mut out = format!(
        "[{}] {} (white, {}) vs {} (black, {}) | move {} last {} | {} to move | bottom {}\n  {}",
        session.session_id,
        session.player(PieceColor::White),
        clock(PieceColor::White),
        session.player(PieceColor::Black),
        clock(PieceColor::Black),
        session.move_log.len(),
        last,
        session.turn,
        view.orientation.bottom,
        session.position,
    );
    for side in [PieceColor::White, PieceColor::Black] {
        let taken = view.captured.captured_by(side);
        if !taken.is_empty() {
            let pieces: String = taken.iter().map(|k| k.to_char_upper()).collect();
            out.push_str(&format!("\n  {side} took {pieces}"));
        }
    }
    if let Some(terminal) = &session.terminal {
        out.push_str(&format!("\n  result: {:?}", terminal.kind));
    }
    out
}
