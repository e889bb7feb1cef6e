//! Stream images from a FLIR One G2 and print per-stream rates.
//!
//! Usage: cargo run --example stream [config.toml]
//! Runs until the device is unplugged or 30 seconds have elapsed.

use flirone::{ChannelSink, Config, Driver, StreamKind};
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => match Config::load(&path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    config.apply_env();

    let (sink, images) = ChannelSink::bounded(16);
    let mut driver: Driver = match Driver::new(&config, sink) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = driver.setup() {
        eprintln!("Failed to open device: {}", e);
        std::process::exit(1);
    }

    println!("Streaming...");

    let start = Instant::now();
    let mut last_report = Instant::now();
    let (mut visual, mut thermal) = (0u64, 0u64);

    while driver.ok() && start.elapsed() < Duration::from_secs(30) {
        driver.poll();

        for img in images.try_iter() {
            match img.stream {
                StreamKind::Visual => visual += 1,
                StreamKind::Thermal => thermal += 1,
            }
        }

        if last_report.elapsed() >= Duration::from_secs(1) {
            let stats = driver.stats();
            println!(
                "state={:?}  frames={}  visual={}  thermal={}  fps={:.1}  desync={}  overflow={}  decode_err={}",
                driver.state(),
                stats.frames,
                visual,
                thermal,
                stats.fps,
                stats.desync_resets,
                stats.overflow_resets,
                stats.decode_errors
            );
            last_report = Instant::now();
        }
    }

    if let Some(err) = driver.error() {
        eprintln!("Stream ended: {}", err);
    }
    driver.shutdown();
}
