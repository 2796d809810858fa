//! Orchestrator binary: drives the vehicle, publishes camera frames,
//! applies decisions read back from the detection ring, and serves
//! telemetry/action sockets.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use lkas_common::config::{load_config, Config};
use lkas_orchestrate::{
    create_vehicle_actor, inbound_channel, run_broadcast_listener, Broadcaster, Orchestrator,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// LKAS orchestrator — fixed-rate tick loop tying the vehicle, shared
/// memory rings, and telemetry together.
#[derive(Parser, Debug)]
#[command(name = "lkas_orchestrate")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Orchestrator for the LKAS processing core")]
struct Args {
    /// Path to the LKAS configuration file.
    #[arg(short, long, default_value = lkas_common::consts::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Vehicle actor tag.
    #[arg(long, default_value = "demo")]
    vehicle: String,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run().await {
        error!("orchestrator startup failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("lkas_orchestrate v{} starting...", env!("CARGO_PKG_VERSION"));

    let config: Config = load_config(&args.config)?;
    let writer_pid = lkas_shm::platform::current_pid();

    let image_capacity =
        lkas_shm::image::slot_capacity(config.camera.width, config.camera.height, 3);
    let image_path = format!("/dev/shm/{}", config.shm.image_name);
    let detection_path = format!("/dev/shm/{}", config.shm.detection_name);

    let image_writer = lkas_shm::image::ImageRingWriter::create(
        &config.shm.image_name,
        &image_path,
        image_capacity,
        writer_pid,
    )?;
    let (detection_reader, detection_reattach_count) =
        attach_detection_with_retries(&config, &detection_path)?;

    let vehicle = create_vehicle_actor(&args.vehicle, config.camera.width, config.camera.height)?;

    let broadcaster = Broadcaster::new(lkas_common::consts::BROADCAST_HWM_DEFAULT);
    let (inbound_tx, inbound_rx) = inbound_channel();

    let mut orchestrator = Orchestrator::new(
        config.clone(),
        vehicle,
        image_writer,
        detection_reader,
        broadcaster.clone(),
        inbound_rx,
        detection_reattach_count,
    );
    let running = orchestrator.running_flag();

    if config.broadcast.enabled {
        let listener_broadcaster = broadcaster.clone();
        let bind_addr = config.broadcast.broadcast_url.clone();
        tokio::spawn(async move {
            if let Err(e) = run_broadcast_listener(listener_broadcaster, &bind_addr).await {
                error!(error = %e, "broadcast listener exited");
            }
        });

        let action_addr = config.broadcast.action_url.clone();
        tokio::spawn(async move {
            if let Err(e) = run_inbound_listener(&action_addr, inbound_tx).await {
                error!(error = %e, "inbound listener exited");
            }
        });
    }

    let tick_task = tokio::task::spawn_blocking(move || orchestrator.run());

    let shutdown = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    };

    tokio::select! {
        result = tick_task => {
            match result {
                Ok(Ok(())) => info!("tick loop exited normally"),
                Ok(Err(e)) => {
                    error!("tick loop error: {}", e);
                    std::process::exit(1);
                }
                Err(e) => {
                    error!("tick loop task panicked: {}", e);
                    std::process::exit(1);
                }
            }
        }
        _ = shutdown => {
            info!("initiating graceful shutdown...");
            running.store(false, std::sync::atomic::Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }

    info!("lkas_orchestrate shutdown complete");
    Ok(())
}

/// Retry attaching to the detection ring — the detector worker may not
/// have created it yet at orchestrator startup. Returns the reader along
/// with the number of retries spent, which seeds the orchestrator's
/// `reattaches` status counter (`SPEC_FULL.md` §7).
fn attach_detection_with_retries(
    config: &Config,
    path: &str,
) -> Result<(lkas_shm::detection::DetectionRingReader, u32), Box<dyn std::error::Error>> {
    let mut attempts = 0;
    loop {
        match lkas_shm::detection::DetectionRingReader::attach(&config.shm.detection_name, path) {
            Ok(reader) => return Ok((reader, attempts)),
            Err(e) if attempts < config.shm.attach_retry_count => {
                attempts += 1;
                tracing::debug!(attempt = attempts, error = %e, "detection ring not ready, retrying");
                std::thread::sleep(Duration::from_secs_f64(config.shm.attach_retry_delay_s));
            }
            Err(e) => return Err(Box::new(e)),
        }
    }
}

/// Accept loop for the inbound action/parameter socket: one connection at a
/// time is expected (the viewer), but any number are accepted and all feed
/// the same channel into the tick loop.
async fn run_inbound_listener(
    bind_addr: &str,
    tx: std::sync::mpsc::Sender<lkas_orchestrate::InboundMessage>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = bind_addr, "inbound listener listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(socket).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(message) = lkas_orchestrate::parse_inbound_line(&line) {
                            if tx.send(message).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(%peer, error = %e, "inbound connection read error");
                        break;
                    }
                }
            }
            tracing::debug!(%peer, "inbound connection closed");
        });
    }
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
