//! Detector worker binary: attaches to the image ring, runs lane detection,
//! publishes to the detection ring, and listens on its own parameter/reset
//! channel for live `detection`-category updates and respawn resets.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use clap::Parser;
use lkas_common::config::{load_config, Config};
use lkas_detect::detector::create_detector;
use lkas_detect::worker::DetectorWorker;
use nix::sys::signal::{signal, SigHandler, Signal};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// LKAS detector worker — classical CV lane detection over shared memory.
#[derive(Parser, Debug)]
#[command(name = "lkas_detect")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Lane detector worker for the LKAS processing core")]
struct Args {
    /// Path to the LKAS configuration file.
    #[arg(short, long, default_value = lkas_common::consts::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Detector variant tag.
    #[arg(short, long, default_value = "classical")]
    detector: String,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

static WORKER_RUNNING: OnceLock<Arc<std::sync::atomic::AtomicBool>> = OnceLock::new();

extern "C" fn handle_shutdown_signal(_: i32) {
    if let Some(flag) = WORKER_RUNNING.get() {
        flag.store(false, Ordering::SeqCst);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("detector worker startup failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("lkas_detect v{} starting...", env!("CARGO_PKG_VERSION"));

    let config: Config = load_config(&args.config)?;
    let writer_pid = lkas_shm::platform::current_pid();

    let image_capacity = lkas_shm::image::slot_capacity(
        config.camera.width as u32,
        config.camera.height as u32,
        3,
    );
    let image_path = format!("/dev/shm/{}", config.shm.image_name);
    let detection_path = format!("/dev/shm/{}", config.shm.detection_name);

    let image_reader = attach_with_retries(&config.shm.image_name, &image_path, image_capacity, &config)?;
    let detection_writer = lkas_shm::detection::DetectionRingWriter::create(
        &config.shm.detection_name,
        &detection_path,
        writer_pid,
    )?;

    let detector = create_detector(&config.detector, &args.detector)?;
    let inbound_rx = lkas_detect::spawn_inbound_listener(config.detector.action_url.clone());
    let mut worker = DetectorWorker::new(detector, image_reader, detection_writer, inbound_rx);

    let running = worker.running_flag();
    WORKER_RUNNING.set(running).expect("signal flag set once");
    unsafe {
        signal(Signal::SIGINT, SigHandler::Handler(handle_shutdown_signal))?;
        signal(Signal::SIGTERM, SigHandler::Handler(handle_shutdown_signal))?;
    }

    worker.run()?;

    info!("lkas_detect shutdown complete");
    Ok(())
}

/// Retry attaching to the image ring — the orchestrator may not have
/// created it yet at worker startup.
fn attach_with_retries(
    name: &str,
    path: &str,
    capacity: usize,
    config: &Config,
) -> Result<lkas_shm::image::ImageRingReader, Box<dyn std::error::Error>> {
    let mut attempts = 0;
    loop {
        match lkas_shm::image::ImageRingReader::attach(name, path, capacity) {
            Ok(reader) => return Ok(reader),
            Err(e) if attempts < config.shm.attach_retry_count => {
                attempts += 1;
                tracing::debug!(attempt = attempts, error = %e, "image ring not ready, retrying");
                std::thread::sleep(Duration::from_secs_f64(config.shm.attach_retry_delay_s));
            }
            Err(e) => return Err(Box::new(e)),
        }
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
