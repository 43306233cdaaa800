//! List all connected ZED sensor modules.

fn main() {
    env_logger::init();

    let mut sensors = zedsense::SensorCapture::new();
    let serials = sensors.enumerate();

    println!("Found {} ZED sensor module(s):", serials.len());
    for sn in serials {
        match sensors.device_info(sn) {
            Some(info) => println!(
                "  sn {}  PID=0x{:04X}  FW={}",
                info.serial, info.product_id, info.fw
            ),
            None => println!("  sn {}", sn),
        }
    }
}
