//! The detector's own parameter/reset channel (`SPEC_FULL.md` §4.B, §4.E).
//!
//! A plain blocking `TcpListener` mirrors `lkas_orchestrate::inbound`'s
//! wire format and non-blocking-drain shape, adapted to this worker's
//! synchronous loop instead of `tokio`: one thread per accepted connection
//! reads newline-delimited JSON lines and forwards them through an
//! `mpsc::channel` the worker loop drains once per frame.

use std::io::BufRead;
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{Receiver, Sender};

use serde::Deserialize;

/// `{"action":"reset"}` — resets the detector's EMA smoothing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DetectorAction {
    Reset,
}

/// `{"category","name","value"}` — only `category == "detection"` applies
/// here; anything else is logged and ignored (it is meant for the
/// orchestrator's own controller instance, not this worker).
#[derive(Debug, Clone, Deserialize)]
struct ParameterUpdate {
    category: String,
    name: String,
    value: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum InboundWire {
    Action { action: DetectorAction },
    Parameter(ParameterUpdate),
}

/// A parsed message bound for the worker loop.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorInboundMessage {
    Reset,
    Parameter { name: String, value: f64 },
}

/// Parse one line of inbound JSON. Malformed lines and non-`detection`
/// categories are logged by the caller and otherwise ignored.
fn parse_inbound_line(line: &str) -> Option<DetectorInboundMessage> {
    match serde_json::from_str::<InboundWire>(line) {
        Ok(InboundWire::Action {
            action: DetectorAction::Reset,
        }) => Some(DetectorInboundMessage::Reset),
        Ok(InboundWire::Parameter(update)) if update.category == "detection" => {
            Some(DetectorInboundMessage::Parameter {
                name: update.name,
                value: update.value,
            })
        }
        Ok(InboundWire::Parameter(update)) => {
            tracing::debug!(category = %update.category, "ignoring non-detection parameter");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, line, "failed to parse detector inbound message");
            None
        }
    }
}

/// Bound on inbound messages drained per frame, so a burst of client
/// traffic cannot stall the detection loop.
pub const MAX_INBOUND_PER_FRAME: usize = 32;

/// Non-blocking drain of whatever inbound messages have queued up since
/// the last frame.
pub fn drain_inbound(rx: &Receiver<DetectorInboundMessage>, max: usize) -> Vec<DetectorInboundMessage> {
    let mut messages = Vec::new();
    for _ in 0..max {
        match rx.try_recv() {
            Ok(message) => messages.push(message),
            Err(_) => break,
        }
    }
    messages
}

fn handle_connection(stream: TcpStream, tx: &Sender<DetectorInboundMessage>) {
    let reader = std::io::BufReader::new(stream);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        if let Some(message) = parse_inbound_line(line.trim()) {
            if tx.send(message).is_err() {
                break;
            }
        }
    }
}

/// Bind `bind_addr` and spawn an accept loop on a background thread, one
/// thread per connection. Returns the receiver the worker loop drains.
/// A bind failure is logged and leaves the detector running with no live
/// parameter channel rather than treating it as fatal — classical CV
/// detection works fine with its startup defaults.
pub fn spawn_inbound_listener(bind_addr: String) -> Receiver<DetectorInboundMessage> {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let listener = match TcpListener::bind(&bind_addr) {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(addr = %bind_addr, error = %e, "failed to bind detector parameter channel");
                return;
            }
        };
        tracing::info!(addr = %bind_addr, "detector parameter channel listening");
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let tx = tx.clone();
                    std::thread::spawn(move || handle_connection(stream, &tx));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "detector parameter channel accept failed");
                }
            }
        }
    });
    rx
}
