//! Telemetry broadcaster (`SPEC_FULL.md` §4.D/§4.E). No crate in the
//! teacher/pack stack offers a ZeroMQ-style PUB/SUB primitive, so outbound
//! telemetry fans out over a length-prefixed framed TCP transport built on
//! `tokio::net::TcpListener`, with `tokio::sync::broadcast` as the internal
//! fan-out: its lagged-receiver-drops-oldest behavior directly implements
//! the HWM-10/drop-oldest policy, so no hand-rolled ring buffer is needed.

use std::io;
use std::sync::Arc;

use lkas_common::model::DetectionResult;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// One telemetry message, tagged by topic on the wire (`SPEC_FULL.md` §6).
#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    Frame {
        frame_id: u64,
        timestamp: f64,
        width: u32,
        height: u32,
        jpeg: Arc<[u8]>,
    },
    Detection(DetectionResult),
    State {
        steering: f32,
        throttle: f32,
        brake: f32,
        speed_mps: f64,
    },
}

#[derive(Serialize)]
struct FrameMeta {
    frame_id: u64,
    timestamp: f64,
    width: u32,
    height: u32,
    jpeg_size: usize,
}

#[derive(Serialize)]
struct StateWire {
    steering: f32,
    throttle: f32,
    brake: f32,
    speed: f64,
}

/// Owns the outbound `tokio::sync::broadcast` sender; cloned into the tick
/// loop (for `publish`) and into each accepted connection's forwarding task.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<BroadcastMessage>,
}

impl Broadcaster {
    pub fn new(high_water_mark: usize) -> Self {
        let (tx, _rx) = broadcast::channel(high_water_mark);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.tx.subscribe()
    }

    /// Fire-and-forget publish. Never blocks the tick: `send` only fails
    /// when there are no subscribers, which is routine (no viewer
    /// attached) and logged at debug rather than warn.
    pub fn publish(&self, message: BroadcastMessage) {
        if self.tx.send(message).is_err() {
            debug!("broadcast publish had no subscribers");
        }
    }
}

/// Accept loop for the outbound telemetry socket. Each connection gets its
/// own `broadcast::Receiver` and forwards every message until the
/// connection drops or it falls more than `HWM` messages behind, at which
/// point `tokio::sync::broadcast` itself reports `Lagged` and the oldest
/// backlog is implicitly dropped.
pub async fn run_broadcast_listener(broadcaster: Broadcaster, bind_addr: &str) -> io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = bind_addr, "broadcaster listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        let mut rx = broadcaster.subscribe();
        tokio::spawn(async move {
            debug!(%peer, "telemetry subscriber connected");
            if let Err(e) = forward_to_subscriber(socket, &mut rx).await {
                debug!(%peer, error = %e, "telemetry subscriber disconnected");
            }
        });
    }
}

async fn forward_to_subscriber(
    mut socket: TcpStream,
    rx: &mut broadcast::Receiver<BroadcastMessage>,
) -> io::Result<()> {
    loop {
        let message = match rx.recv().await {
            Ok(message) => message,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "telemetry subscriber lagged; dropped oldest frames");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        };
        write_framed(&mut socket, &message).await?;
    }
}

/// Frame one message onto the wire: `topic\0` then a 4-byte little-endian
/// metadata length then the metadata (JSON, or JSON+JPEG for `frame`).
async fn write_framed(socket: &mut TcpStream, message: &BroadcastMessage) -> io::Result<()> {
    let (topic, meta_json, payload): (&str, Vec<u8>, &[u8]) = match message {
        BroadcastMessage::Frame {
            frame_id,
            timestamp,
            width,
            height,
            jpeg,
        } => {
            let meta = FrameMeta {
                frame_id: *frame_id,
                timestamp: *timestamp,
                width: *width,
                height: *height,
                jpeg_size: jpeg.len(),
            };
            (
                "frame",
                serde_json::to_vec(&meta).unwrap_or_default(),
                jpeg.as_ref(),
            )
        }
        BroadcastMessage::Detection(detection) => (
            "detection",
            serde_json::to_vec(detection).unwrap_or_default(),
            &[],
        ),
        BroadcastMessage::State {
            steering,
            throttle,
            brake,
            speed_mps,
        } => {
            let wire = StateWire {
                steering: *steering,
                throttle: *throttle,
                brake: *brake,
                speed: *speed_mps,
            };
            ("state", serde_json::to_vec(&wire).unwrap_or_default(), &[])
        }
    };

    socket.write_all(topic.as_bytes()).await?;
    socket.write_u8(0).await?;
    socket.write_u32_le(meta_json.len() as u32).await?;
    socket.write_all(&meta_json).await?;
    if !payload.is_empty() {
        socket.write_all(payload).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let broadcaster = Broadcaster::new(10);
        broadcaster.publish(BroadcastMessage::State {
            steering: 0.0,
            throttle: 0.4,
            brake: 0.0,
            speed_mps: 1.0,
        });
    }

    #[tokio::test]
    async fn subscriber_receives_a_published_message() {
        let broadcaster = Broadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        broadcaster.publish(BroadcastMessage::State {
            steering: 0.1,
            throttle: 0.5,
            brake: 0.0,
            speed_mps: 2.0,
        });
        let received = rx.recv().await.unwrap();
        assert!(matches!(received, BroadcastMessage::State { .. }));
    }

    #[tokio::test]
    async fn lagging_subscriber_reports_lagged_not_a_hang() {
        let broadcaster = Broadcaster::new(2);
        let mut rx = broadcaster.subscribe();
        for _ in 0..5 {
            broadcaster.publish(BroadcastMessage::State {
                steering: 0.0,
                throttle: 0.0,
                brake: 0.0,
                speed_mps: 0.0,
            });
        }
        let result = rx.recv().await;
        assert!(matches!(
            result,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }
}
