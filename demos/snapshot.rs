//! Grab one visual and one thermal image and save them as PNG.
//!
//! Usage: cargo run --example snapshot [output_dir]

use flirone::{ChannelSink, Config, Driver, ImageData, StreamKind};
use std::path::PathBuf;
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let out_dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| ".".into()));
    let mut config = Config::default();
    config.apply_env();

    let (sink, images) = ChannelSink::bounded(4);
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

    let deadline = Instant::now() + Duration::from_secs(10);
    let (mut saved_visual, mut saved_thermal) = (!config.publish_rgb_image, !config.publish_ir_image);

    while driver.ok() && Instant::now() < deadline && !(saved_visual && saved_thermal) {
        driver.poll();
        for img in images.try_iter() {
            let (name, done) = match img.stream {
                StreamKind::Visual => ("visual.png", &mut saved_visual),
                StreamKind::Thermal => ("thermal.png", &mut saved_thermal),
            };
            if *done {
                continue;
            }
            let path = out_dir.join(name);
            let result = match &img.image {
                ImageData::Rgb8(buf) => buf.save(&path),
                ImageData::Mono8(buf) => buf.save(&path),
            };
            match result {
                Ok(()) => {
                    println!("Saved {} ({}x{} {})", path.display(), img.image.width(), img.image.height(), img.image.encoding());
                    *done = true;
                }
                Err(e) => eprintln!("Failed to save {}: {}", path.display(), e),
            }
        }
    }

    driver.shutdown();
    if !(saved_visual && saved_thermal) {
        eprintln!("Timed out before both images arrived");
        std::process::exit(1);
    }
}
