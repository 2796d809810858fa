//! Outbound actions and parameter tweaks, written as newline-delimited JSON
//! to the orchestrator's action socket — the same wire format
//! `lkas_orchestrate::inbound` parses.

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::error::ViewerResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Respawn,
    Pause,
    Resume,
}

#[derive(Debug, Serialize)]
struct ActionWire {
    action: Action,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParameterUpdate {
    pub category: String,
    pub name: String,
    pub value: f64,
}

pub async fn send_action(socket: &mut TcpStream, action: Action) -> ViewerResult<()> {
    send_line(socket, &ActionWire { action }).await
}

pub async fn send_parameter(socket: &mut TcpStream, update: &ParameterUpdate) -> ViewerResult<()> {
    send_line(socket, update).await
}

async fn send_line<T: Serialize>(socket: &mut TcpStream, value: &T) -> ViewerResult<()> {
    let mut line = serde_json::to_vec(value).expect("action/parameter payloads always serialize");
    line.push(b'\n');
    socket.write_all(&line).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn sends_a_respawn_action_as_one_json_line() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client_task = tokio::spawn(async move {
            let mut client = TcpStream::connect(addr).await.unwrap();
            send_action(&mut client, Action::Respawn).await.unwrap();
        });

        let (socket, _) = listener.accept().await.unwrap();
        let mut lines = tokio::io::BufReader::new(socket).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        client_task.await.unwrap();

        assert_eq!(line, r#"{"action":"respawn"}"#);
    }

    #[tokio::test]
    async fn sends_a_parameter_update_as_one_json_line() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client_task = tokio::spawn(async move {
            let mut client = TcpStream::connect(addr).await.unwrap();
            let update = ParameterUpdate {
                category: "decision".to_string(),
                name: "kp".to_string(),
                value: 0.6,
            };
            send_parameter(&mut client, &update).await.unwrap();
        });

        let (socket, _) = listener.accept().await.unwrap();
        let mut lines = tokio::io::BufReader::new(socket).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        client_task.await.unwrap();

        assert_eq!(line, r#"{"category":"decision","name":"kp","value":0.6}"#);
    }
}
