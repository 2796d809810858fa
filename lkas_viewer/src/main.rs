//! Viewer binary: subscribes to the orchestrator's telemetry stream and
//! renders a minimal status line per message (no UI cosmetics, per scope);
//! relays operator commands typed on stdin to the action socket.

use std::path::PathBuf;

use clap::Parser;
use lkas_common::config::{load_config, Config};
use lkas_viewer::{
    action::{send_action, send_parameter, Action, ParameterUpdate},
    client::TelemetryMessage,
    stream_forever,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// LKAS viewer — telemetry subscriber and remote control client.
#[derive(Parser, Debug)]
#[command(name = "lkas_viewer")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Broadcast subscriber and remote control client for the LKAS processing core")]
struct Args {
    /// Path to the LKAS configuration file (used only for the broadcaster's
    /// socket addresses).
    #[arg(short, long, default_value = lkas_common::consts::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the broadcaster's outbound telemetry address.
    #[arg(long)]
    broadcast_addr: Option<String>,

    /// Override the broadcaster's inbound action address.
    #[arg(long)]
    action_addr: Option<String>,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    let config: Config = load_config(&args.config).unwrap_or_default();
    let broadcast_addr = args
        .broadcast_addr
        .clone()
        .unwrap_or_else(|| config.broadcast.broadcast_url.clone());
    let action_addr = args
        .action_addr
        .clone()
        .unwrap_or_else(|| config.broadcast.action_url.clone());

    info!("lkas_viewer v{} starting...", env!("CARGO_PKG_VERSION"));

    let telemetry_addr = broadcast_addr.clone();
    tokio::spawn(async move {
        stream_forever(&telemetry_addr, |message| render_status(&message)).await;
    });

    run_command_loop(&action_addr).await;
    Ok(())
}

fn render_status(message: &TelemetryMessage) {
    match message {
        TelemetryMessage::Frame { meta, .. } => {
            println!("frame #{} {}x{}", meta.frame_id, meta.width, meta.height);
        }
        TelemetryMessage::Detection(detection) => {
            println!(
                "detection #{} left={} right={}",
                detection.frame_id,
                detection.left_lane.is_some(),
                detection.right_lane.is_some()
            );
        }
        TelemetryMessage::State(state) => {
            println!(
                "state steer={:.3} throttle={:.3} brake={:.3} speed={:.2}",
                state.steering, state.throttle, state.brake, state.speed
            );
        }
    }
}

/// Reads operator commands from stdin: `respawn`, `pause`, `resume`, or
/// `set <category> <name> <value>`. Each command opens a short-lived
/// connection to the action socket — simpler than holding one open across
/// an indefinite idle period, and actions are infrequent by nature.
async fn run_command_loop(action_addr: &str) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("commands: respawn | pause | resume | set <category> <name> <value>");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "stdin read error");
                break;
            }
        };

        if let Err(e) = dispatch_command(action_addr, line.trim()).await {
            warn!(error = %e, "failed to send command");
        }
    }
}

async fn dispatch_command(
    action_addr: &str,
    line: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if line.is_empty() {
        return Ok(());
    }

    let mut socket = TcpStream::connect(action_addr).await?;
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["respawn"] => send_action(&mut socket, Action::Respawn).await?,
        ["pause"] => send_action(&mut socket, Action::Pause).await?,
        ["resume"] => send_action(&mut socket, Action::Resume).await?,
        ["set", category, name, value] => {
            let value: f64 = value.parse()?;
            send_parameter(
                &mut socket,
                &ParameterUpdate {
                    category: category.to_string(),
                    name: name.to_string(),
                    value,
                },
            )
            .await?;
        }
        _ => warn!(line, "unrecognized command"),
    }
    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
