//! Relay wire protocol
//!
//! Every frame is one JSON object `{"type": ..., "payload": {...}}` on its own
//! line. The message set is closed: an unknown `type` fails to decode.

use crate::error::NetError;
use morris_core::{Action, Move, Position};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum RelayMessage {
    /// Open a room; `room_code` re-claims a previous room after a reconnect
    #[serde(rename_all = "camelCase")]
    Host {
        player_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_code: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Join {
        room_code: String,
        player_name: String,
    },
    #[serde(rename_all = "camelCase")]
    HostAccepted { room_code: String },
    OpponentJoined { name: String },
    /// `from` is null for a placement
    Move {
        from: Option<Position>,
        to: Position,
    },
    Capture { position: Position },
    ResetRequested {},
    OpponentDisconnected {},
    #[serde(rename_all = "camelCase")]
    LatencyProbe { sent_at: u64 },
    #[serde(rename_all = "camelCase")]
    LatencyAck { sent_at: u64 },
    Error { message: String },
}

impl RelayMessage {
    /// Message announcing one action applied locally
    pub fn for_action(action: Action) -> RelayMessage {
        match action {
            Action::Place(to) => RelayMessage::Move { from: None, to },
            Action::Slide { from, to } => RelayMessage::Move { from: Some(from), to },
            Action::Capture(position) => RelayMessage::Capture { position },
        }
    }

    /// Messages announcing a local move: the move, then its capture if any
    pub fn for_move(mv: &Move) -> Vec<RelayMessage> {
        let mut messages = vec![RelayMessage::Move {
            from: mv.from,
            to: mv.to,
        }];
        if let Some(position) = mv.capture {
            messages.push(RelayMessage::Capture { position });
        }
        messages
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::Host { .. } => "host",
            RelayMessage::Join { .. } => "join",
            RelayMessage::HostAccepted { .. } => "hostAccepted",
            RelayMessage::OpponentJoined { .. } => "opponentJoined",
            RelayMessage::Move { .. } => "move",
            RelayMessage::Capture { .. } => "capture",
            RelayMessage::ResetRequested {} => "resetRequested",
            RelayMessage::OpponentDisconnected {} => "opponentDisconnected",
            RelayMessage::LatencyProbe { .. } => "latencyProbe",
            RelayMessage::LatencyAck { .. } => "latencyAck",
            RelayMessage::Error { .. } => "error",
        }
    }
}

/// Serialize one message as a single line (no trailing newline)
pub fn encode(msg: &RelayMessage) -> Result<String, NetError> {
    Ok(serde_json::to_string(msg)?)
}

pub fn decode(line: &str) -> Result<RelayMessage, NetError> {
    Ok(serde_json::from_str(line.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pos(i: u8) -> Position {
        Position::new(i).unwrap()
    }

    #[test]
    fn test_wire_shape() {
        let msg = RelayMessage::Move { from: None, to: pos(5) };
        let value: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
        assert_eq!(value, json!({"type": "move", "payload": {"from": null, "to": 5}}));

        let msg = RelayMessage::Host {
            player_name: "Ada".to_string(),
            room_code: None,
        };
        let value: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
        assert_eq!(value, json!({"type": "host", "payload": {"playerName": "Ada"}}));

        let value: serde_json::Value =
            serde_json::from_str(&encode(&RelayMessage::LatencyAck { sent_at: 42 }).unwrap()).unwrap();
        assert_eq!(value, json!({"type": "latencyAck", "payload": {"sentAt": 42}}));
    }

    #[test]
    fn test_decode_relay_frames() {
        let msg = decode(r#"{"type":"join","payload":{"roomCode":"ABCD","playerName":"Bo"}}"#).unwrap();
        assert_eq!(
            msg,
            RelayMessage::Join {
                room_code: "ABCD".to_string(),
                player_name: "Bo".to_string()
            }
        );

        let msg = decode(r#"{"type":"resetRequested","payload":{}}"#).unwrap();
        assert_eq!(msg, RelayMessage::ResetRequested {});

        let msg = decode(r#"{"type":"move","payload":{"from":3,"to":4}}"#).unwrap();
        assert_eq!(msg, RelayMessage::Move { from: Some(pos(3)), to: pos(4) });
    }

    #[test]
    fn test_rejects_unknown_and_invalid() {
        assert!(matches!(
            decode(r#"{"type":"chat","payload":{"text":"hi"}}"#),
            Err(NetError::Protocol(_))
        ));
        assert!(decode(r#"{"type":"capture","payload":{"position":24}}"#).is_err());
        assert!(decode("not json").is_err());
    }

    #[test]
    fn test_for_move_splits_capture() {
        let mv = Move::slide(pos(3), pos(4)).with_capture(pos(9));
        assert_eq!(
            RelayMessage::for_move(&mv),
            vec![
                RelayMessage::Move { from: Some(pos(3)), to: pos(4) },
                RelayMessage::Capture { position: pos(9) },
            ]
        );
        assert_eq!(RelayMessage::for_move(&Move::place(pos(0))).len(), 1);
    }
}
