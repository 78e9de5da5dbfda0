use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("Frame contains a line break")]
    EmbeddedNewline,
}

/// Serialize a message into a single-line frame (no trailing newline).
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<String, ProtocolError> {
    let json = serde_json::to_string(msg).map_err(ProtocolError::Encode)?;
    // serde_json escapes newlines inside strings, so this only trips on bugs.
    if json.contains('\n') {
        return Err(ProtocolError::EmbeddedNewline);
    }
    Ok(json)
}

pub fn decode_frame<T: DeserializeOwned>(line: &str) -> Result<T, ProtocolError> {
    serde_json::from_str(line.trim_end_matches(['\r', '\n'])).map_err(ProtocolError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ClientMessage, ColorPreference, EventKind, GameStartPayload, ResultKind, ServerMessage,
        TimeControl,
    };
    use chess::PieceColor;

    #[test]
    fn test_client_message_uses_camel_case_tag_and_fields() {
        let frame = encode_frame(&ClientMessage::FindMatch {
            mode: TimeControl::Blitz,
            color_preference: ColorPreference::Random,
        })
        .unwrap();
        assert_eq!(
            frame,
            r#"{"event":"findMatch","mode":"blitz","colorPreference":"random"}"#
        );
    }

    #[test]
    fn test_unit_variant_encodes_tag_only() {
        let frame = encode_frame(&ClientMessage::CancelMatchmaking).unwrap();
        assert_eq!(frame, r#"{"event":"cancelMatchmaking"}"#);
    }

    #[test]
    fn test_decode_match_found() {
        let msg: ServerMessage = decode_frame(
            r#"{"event":"matchFound","sessionId":"g-1","assignedColor":"black"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ServerMessage::MatchFound {
                session_id: "g-1".into(),
                assigned_color: PieceColor::Black,
            }
        );
    }

    #[test]
    fn test_decode_game_start_defaults_resumed_flag() {
        let msg: ServerMessage = decode_frame(
            r#"{"event":"gameStart","sessionId":"g-1","initialPosition":"8/8/8/8/8/8/8/8 w - - 0 1","whiteId":"a","blackId":"b","whiteMs":1000,"blackMs":2000}"#,
        )
        .unwrap();
        match msg {
            ServerMessage::GameStart(GameStartPayload {
                is_resumed_game,
                white_ms,
                ..
            }) => {
                assert!(!is_resumed_game);
                assert_eq!(white_ms, 1000);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_game_over_with_unrecognised_result() {
        let msg: ServerMessage =
            decode_frame(r#"{"event":"gameOver","resultKind":"insufficientMaterial"}"#).unwrap();
        match msg {
            ServerMessage::GameOver(payload) => {
                assert_eq!(payload.result_kind, ResultKind::Other);
                assert!(payload.rating_deltas.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_decodes_to_unknown() {
        let msg: ServerMessage = decode_frame(r#"{"event":"somethingNew","x":1}"#).unwrap();
        assert_eq!(msg.kind(), EventKind::Unknown);
    }

    #[test]
    fn test_decode_tolerates_trailing_newline() {
        let msg: ServerMessage = decode_frame("{\"event\":\"connectionAck\"}\r\n").unwrap();
        assert_eq!(msg, ServerMessage::ConnectionAck);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = decode_frame::<ServerMessage>("not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }
}
