//! Stream sensor data from a ZED camera to stdout.
//!
//! Usage: cargo run --example stream
//! Prints every ~100th IMU sample plus magnetometer, environmental and
//! camera-temperature updates as they arrive. Runs for 10 seconds.

use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let mut sensors = zedsense::SensorCapture::new();
    if let Err(e) = sensors.init(None) {
        eprintln!("Failed to open device: {}", e);
        std::process::exit(1);
    }

    println!("sn: {}", sensors.serial_number().unwrap_or(-1));
    if let Some(fw) = sensors.firmware_version() {
        println!("fw: {}", fw);
    }
    println!();

    let start = Instant::now();
    let mut count: u64 = 0;

    while start.elapsed() < Duration::from_secs(10) {
        if let Some(imu) = sensors.last_imu(Duration::from_millis(100)) {
            count += 1;

            if count % 100 == 1 {
                println!(
                    "ts={:<16} acc=[{:+7.3} {:+7.3} {:+7.3}] m/s²  gyr=[{:+8.3} {:+8.3} {:+8.3}] °/s{}",
                    imu.timestamp_ns,
                    imu.accel[0],
                    imu.accel[1],
                    imu.accel[2],
                    imu.gyro[0],
                    imu.gyro[1],
                    imu.gyro[2],
                    if imu.sync { "  [frame]" } else { "" },
                );
            }
        } else {
            eprintln!("No IMU sample for 100 ms");
            continue;
        }

        if let Some(mag) = sensors.last_mag(Duration::ZERO) {
            println!(
                "mag ts={:<16} [{:+7.2} {:+7.2} {:+7.2}] µT",
                mag.timestamp_ns, mag.mag[0], mag.mag[1], mag.mag[2]
            );
        }

        if let Some(env) = sensors.last_env(Duration::ZERO) {
            println!(
                "env ts={:<16} {:+.2} °C  {:.2} hPa  {:.2} %rH",
                env.timestamp_ns, env.temp, env.press, env.humid
            );
        }

        if let Some(cam) = sensors.last_cam_temp(Duration::ZERO) {
            println!(
                "cam ts={:<16} left {:+.2} °C  right {:+.2} °C",
                cam.timestamp_ns, cam.temp_left, cam.temp_right
            );
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    println!(
        "\nTotal: {} IMU samples in {:.1}s ({:.1} Hz)",
        count,
        elapsed,
        count as f64 / elapsed
    );
}
