//! End-to-end tick loop test: a real image/detection ring pair, the demo
//! vehicle actor, and a broadcaster subscriber observing published state.

use std::time::Duration;

use lkas_common::config::Config;
use lkas_orchestrate::{create_vehicle_actor, inbound_channel, BroadcastMessage, Broadcaster, Orchestrator};
use tempfile::TempDir;

fn test_config(tick_hz: u32) -> Config {
    let mut config = Config::default();
    config.camera.width = 160;
    config.camera.height = 120;
    config.loop_.tick_hz = tick_hz;
    config.loop_.warmup_frames = 2;
    config
}

fn ring_path(dir: &TempDir, stem: &str) -> String {
    dir.path().join(stem).to_string_lossy().to_string()
}

#[test]
fn tick_loop_runs_publishes_state_and_shuts_down_cleanly() {
    let dir = TempDir::new().unwrap();
    let config = test_config(200);

    let image_capacity =
        lkas_shm::image::slot_capacity(config.camera.width, config.camera.height, 3);
    let image_path = ring_path(&dir, "image_ring");
    let detection_path = ring_path(&dir, "detection_ring");

    let image_writer =
        lkas_shm::image::ImageRingWriter::create("image_ring", &image_path, image_capacity, 1)
            .unwrap();
    // The orchestrator attaches the detection ring as a reader; create it
    // here standing in for a detector worker that never runs.
    let _detection_writer =
        lkas_shm::detection::DetectionRingWriter::create("detection_ring", &detection_path, 2)
            .unwrap();
    let detection_reader =
        lkas_shm::detection::DetectionRingReader::attach("detection_ring", &detection_path)
            .unwrap();

    let vehicle = create_vehicle_actor("demo", config.camera.width, config.camera.height).unwrap();
    let broadcaster = Broadcaster::new(16);
    let mut rx = broadcaster.subscribe();
    let (_tx, inbound_rx) = inbound_channel();

    let mut orchestrator = Orchestrator::new(
        config,
        vehicle,
        image_writer,
        detection_reader,
        broadcaster,
        inbound_rx,
        0,
    );
    let running = orchestrator.running_flag();

    let handle = std::thread::spawn(move || orchestrator.run());

    std::thread::sleep(Duration::from_millis(100));
    running.store(false, std::sync::atomic::Ordering::SeqCst);
    handle.join().unwrap().unwrap();

    let mut saw_state = false;
    while let Ok(message) = rx.try_recv() {
        if matches!(message, BroadcastMessage::State { .. }) {
            saw_state = true;
        }
    }
    assert!(saw_state, "expected at least one State broadcast");
}

#[test]
fn respawn_action_resets_the_tick_counter() {
    let dir = TempDir::new().unwrap();
    let config = test_config(200);

    let image_capacity =
        lkas_shm::image::slot_capacity(config.camera.width, config.camera.height, 3);
    let image_path = ring_path(&dir, "image_ring2");
    let detection_path = ring_path(&dir, "detection_ring2");

    let image_writer =
        lkas_shm::image::ImageRingWriter::create("image_ring2", &image_path, image_capacity, 1)
            .unwrap();
    let _detection_writer =
        lkas_shm::detection::DetectionRingWriter::create("detection_ring2", &detection_path, 2)
            .unwrap();
    let detection_reader =
        lkas_shm::detection::DetectionRingReader::attach("detection_ring2", &detection_path)
            .unwrap();

    let vehicle = create_vehicle_actor("demo", config.camera.width, config.camera.height).unwrap();
    let broadcaster = Broadcaster::new(16);
    let (tx, inbound_rx) = inbound_channel();

    let mut orchestrator = Orchestrator::new(
        config,
        vehicle,
        image_writer,
        detection_reader,
        broadcaster,
        inbound_rx,
        0,
    );
    let running = orchestrator.running_flag();

    tx.send(lkas_orchestrate::InboundMessage::Action(
        lkas_orchestrate::Action::Respawn,
    ))
    .unwrap();

    let handle = std::thread::spawn(move || orchestrator.run());
    std::thread::sleep(Duration::from_millis(50));
    running.store(false, std::sync::atomic::Ordering::SeqCst);
    handle.join().unwrap().unwrap();
}
