//! Line commands read from stdin.

use chess_client::MoveIntent;
use chess_proto::{ColorPreference, TimeControl};

pub const HELP: &str = "\
commands:
  connect <user> <token>          identify and connect
  disconnect                      close the connection
  queue <mode> [color]            join matchmaking (bullet|blitz|rapid|classical)
  cancel                          leave matchmaking
  challenge <user> <mode> [color] challenge a player directly
  accept | decline                answer the pending challenge
  roster                          list online players
  move <from><to>[promo]          submit a move, e.g. e2e4 or e7e8q
  rejoin | cancel-rejoin          resume the last game, or give up on it
  leave                           leave the current game
  rotate on|off                   turn the board to the side to move
  pause | resume                  stop or restart the local clock display
  view                            print the current game
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Connect { user: String, token: String },
    Disconnect,
    Queue { mode: TimeControl, color: ColorPreference },
    Cancel,
    Challenge {
        opponent: String,
        mode: TimeControl,
        color: ColorPreference,
    },
    Respond(bool),
    Roster,
    Move(MoveIntent),
    Rejoin,
    CancelRejoin,
    Leave,
    Rotate(bool),
    PauseClock,
    ResumeClock,
    View,
    Help,
    Quit,
}

/// Parse one line. Blank lines give `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Input>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let input = match (command.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("connect", [user, token]) => Input::Connect {
            user: user.to_string(),
            token: token.to_string(),
        },
        ("disconnect", []) => Input::Disconnect,
        ("queue", [mode, rest @ ..]) => Input::Queue {
            mode: parse_mode(mode)?,
            color: parse_color(rest.first())?,
        },
        ("cancel", []) => Input::Cancel,
        ("challenge", [opponent, mode, rest @ ..]) => Input::Challenge {
            opponent: opponent.to_string(),
            mode: parse_mode(mode)?,
            color: parse_color(rest.first())?,
        },
        ("accept", []) => Input::Respond(true),
        ("decline", []) => Input::Respond(false),
        ("roster", []) => Input::Roster,
        ("move", [_, ..]) => {
            let text = args.join(" ");
            Input::Move(MoveIntent::parse(&text).ok_or_else(|| format!("bad move: {text}"))?)
        }
        ("rejoin", []) => Input::Rejoin,
        ("cancel-rejoin", []) => Input::CancelRejoin,
        ("leave", []) => Input::Leave,
        ("rotate", ["on"]) => Input::Rotate(true),
        ("rotate", ["off"]) => Input::Rotate(false),
        ("pause", []) => Input::PauseClock,
        ("resume", []) => Input::ResumeClock,
        ("view", []) => Input::View,
        ("help", _) | ("?", _) => Input::Help,
        ("quit", _) | ("exit", _) => Input::Quit,
        _ => return Err(format!("unrecognised command: {line}")),
    };
    Ok(Some(input))
}

fn parse_mode(s: &str) -> Result<TimeControl, String> {
    TimeControl::parse(s).ok_or_else(|| format!("unknown time control: {s}"))
}

fn parse_color(s: Option<&&str>) -> Result<ColorPreference, String> {
    match s {
        None => Ok(ColorPreference::Random),
        Some(s) => ColorPreference::parse(s).ok_or_else(|| format!("unknown color: {s}")),
    }
}
