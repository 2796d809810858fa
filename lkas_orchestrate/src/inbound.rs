//! Inbound action/parameter channel (`SPEC_FULL.md` §4.E). A second TCP
//! listener accepts newline-delimited JSON messages and forwards them to the
//! tick loop through a channel the loop drains non-blockingly once per tick
//! — the tick loop itself never touches a socket directly.

use serde::Deserialize;
use std::sync::mpsc::{Receiver, Sender};

/// One inbound action, matching the `{"action": "..."}` wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Respawn,
    Pause,
    Resume,
}

/// One inbound parameter update, matching `{"category","name","value"}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParameterUpdate {
    pub category: String,
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum InboundWire {
    Action { action: Action },
    Parameter(ParameterUpdate),
}

/// A parsed inbound message, decoupled from its wire representation.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Action(Action),
    Parameter(ParameterUpdate),
}

/// Parse one line of inbound JSON. Malformed lines are logged by the caller
/// and otherwise ignored — never fatal to the tick loop.
pub fn parse_inbound_line(line: &str) -> Option<InboundMessage> {
    match serde_json::from_str::<InboundWire>(line) {
        Ok(InboundWire::Action { action }) => Some(InboundMessage::Action(action)),
        Ok(InboundWire::Parameter(update)) => Some(InboundMessage::Parameter(update)),
        Err(e) => {
            tracing::warn!(error = %e, line, "failed to parse inbound message");
            None
        }
    }
}

/// Non-blocking drain of whatever inbound messages have queued up since the
/// last tick. Bounded by `max` so a burst of inbound traffic cannot stall
/// the tick loop.
pub fn drain_inbound(rx: &Receiver<InboundMessage>, max: usize) -> Vec<InboundMessage> {
    let mut messages = Vec::new();
    for _ in 0..max {
        match rx.try_recv() {
            Ok(message) => messages.push(message),
            Err(_) => break,
        }
    }
    messages
}

/// Channel pair handed to the tick loop (receiver) and the TCP accept task
/// (sender).
pub fn inbound_channel() -> (Sender<InboundMessage>, Receiver<InboundMessage>) {
    std::sync::mpsc::channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_respawn_action() {
        let msg = parse_inbound_line(r#"{"action":"respawn"}"#).unwrap();
        assert_eq!(msg, InboundMessage::Action(Action::Respawn));
    }

    #[test]
    fn parses_parameter_update() {
        let msg =
            parse_inbound_line(r#"{"category":"decision","name":"kp","value":0.75}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Parameter(ParameterUpdate {
                category: "decision".to_string(),
                name: "kp".to_string(),
                value: 0.75,
            })
        );
    }

    #[test]
    fn malformed_json_is_ignored_not_fatal() {
        assert!(parse_inbound_line("not json at all").is_none());
    }

    #[test]
    fn drain_respects_the_max_bound() {
        let (tx, rx) = inbound_channel();
        for _ in 0..5 {
            tx.send(InboundMessage::Action(Action::Pause)).unwrap();
        }
        let drained = drain_inbound(&rx, 3);
        assert_eq!(drained.len(), 3);
        assert_eq!(drain_inbound(&rx, 10).len(), 2);
    }

    #[test]
    fn drain_on_empty_channel_yields_nothing() {
        let (_tx, rx) = inbound_channel();
        assert!(drain_inbound(&rx, 5).is_empty());
    }
}
