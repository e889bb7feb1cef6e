//! List all connected FLIR One G2 accessories.

fn main() {
    env_logger::init();

    match flirone::list_devices() {
        Ok(devices) => {
            println!("Found {} FLIR One device(s):", devices.len());
            for (i, dev) in devices.iter().enumerate() {
                println!(
                    "  [{}] {:04x}:{:04x}  Bus={} Addr={}",
                    i, dev.vendor_id, dev.product_id, dev.bus_number, dev.address
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
