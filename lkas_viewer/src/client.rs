//! Broadcast subscriber: reads the length-prefixed framed telemetry stream
//! written by `lkas_orchestrate::broadcast::write_framed` and decodes it
//! into [`TelemetryMessage`]s.

use lkas_common::model::DetectionResult;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::error::{ViewerError, ViewerResult};

/// Longest topic tag accepted before a connection is treated as corrupt —
/// topics are `frame`/`detection`/`state`, nothing remotely close to this.
const MAX_TOPIC_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct FrameMeta {
    pub frame_id: u64,
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    pub jpeg_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateWire {
    pub steering: f32,
    pub throttle: f32,
    pub brake: f32,
    pub speed: f64,
}

/// One decoded telemetry message. `Frame` carries its JPEG bytes but the
/// viewer is only obligated to render overlays locally, not decode them —
/// callers that don't need pixels can ignore the payload.
#[derive(Debug, Clone)]
pub enum TelemetryMessage {
    Frame { meta: FrameMeta, jpeg: Vec<u8> },
    Detection(DetectionResult),
    State(StateWire),
}

/// Read exactly one framed message from the broadcast stream, blocking
/// until it arrives or the connection closes.
pub async fn read_message(socket: &mut TcpStream) -> ViewerResult<TelemetryMessage> {
    let topic = read_topic(socket).await?;
    let meta_len = socket.read_u32_le().await? as usize;
    let mut meta_buf = vec![0u8; meta_len];
    socket.read_exact(&mut meta_buf).await?;

    match topic.as_str() {
        "frame" => {
            let meta: FrameMeta = serde_json::from_slice(&meta_buf)
                .map_err(|e| ViewerError::MalformedFrame(format!("frame meta: {e}")))?;
            let mut jpeg = vec![0u8; meta.jpeg_size];
            socket.read_exact(&mut jpeg).await?;
            Ok(TelemetryMessage::Frame { meta, jpeg })
        }
        "detection" => {
            let detection: DetectionResult = serde_json::from_slice(&meta_buf)
                .map_err(|e| ViewerError::MalformedFrame(format!("detection: {e}")))?;
            Ok(TelemetryMessage::Detection(detection))
        }
        "state" => {
            let state: StateWire = serde_json::from_slice(&meta_buf)
                .map_err(|e| ViewerError::MalformedFrame(format!("state: {e}")))?;
            Ok(TelemetryMessage::State(state))
        }
        other => Err(ViewerError::MalformedFrame(format!(
            "unknown topic: {other}"
        ))),
    }
}

async fn read_topic(socket: &mut TcpStream) -> ViewerResult<String> {
    let mut bytes = Vec::new();
    loop {
        let b = socket.read_u8().await?;
        if b == 0 {
            break;
        }
        bytes.push(b);
        if bytes.len() > MAX_TOPIC_LEN {
            return Err(ViewerError::MalformedFrame(
                "topic tag exceeded maximum length".to_string(),
            ));
        }
    }
    String::from_utf8(bytes).map_err(|e| ViewerError::MalformedFrame(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn write_framed(socket: &mut TcpStream, topic: &str, meta: &[u8], payload: &[u8]) {
        socket.write_all(topic.as_bytes()).await.unwrap();
        socket.write_u8(0).await.unwrap();
        socket.write_u32_le(meta.len() as u32).await.unwrap();
        socket.write_all(meta).await.unwrap();
        if !payload.is_empty() {
            socket.write_all(payload).await.unwrap();
        }
    }

    #[tokio::test]
    async fn reads_a_state_message() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let writer_task = tokio::spawn(async move {
            let mut client = TcpStream::connect(addr).await.unwrap();
            let meta = serde_json::to_vec(&serde_json::json!({
                "steering": 0.1, "throttle": 0.5, "brake": 0.0, "speed": 2.0
            }))
            .unwrap();
            write_framed(&mut client, "state", &meta, &[]).await;
        });

        let (mut socket, _) = listener.accept().await.unwrap();
        let message = read_message(&mut socket).await.unwrap();
        writer_task.await.unwrap();

        match message {
            TelemetryMessage::State(state) => assert_eq!(state.throttle, 0.5),
            other => panic!("expected State, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reads_a_frame_message_with_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let writer_task = tokio::spawn(async move {
            let mut client = TcpStream::connect(addr).await.unwrap();
            let payload = vec![1u8, 2, 3, 4];
            let meta = serde_json::to_vec(&serde_json::json!({
                "frame_id": 7, "timestamp": 1.0, "width": 4, "height": 1, "jpeg_size": payload.len()
            }))
            .unwrap();
            write_framed(&mut client, "frame", &meta, &payload).await;
        });

        let (mut socket, _) = listener.accept().await.unwrap();
        let message = read_message(&mut socket).await.unwrap();
        writer_task.await.unwrap();

        match message {
            TelemetryMessage::Frame { meta, jpeg } => {
                assert_eq!(meta.frame_id, 7);
                assert_eq!(jpeg, vec![1, 2, 3, 4]);
            }
            other => panic!("expected Frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_topic_is_reported_as_malformed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let writer_task = tokio::spawn(async move {
            let mut client = TcpStream::connect(addr).await.unwrap();
            write_framed(&mut client, "bogus", b"{}", &[]).await;
        });

        let (mut socket, _) = listener.accept().await.unwrap();
        let result = read_message(&mut socket).await;
        writer_task.await.unwrap();

        assert!(matches!(result, Err(ViewerError::MalformedFrame(_))));
    }
}
