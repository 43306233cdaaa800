//! # zedsense - ZED stereo camera sensor driver
//!
//! User-space driver for the sensor subsystem of Stereolabs ZED 2 and
//! ZED Mini cameras: IMU, magnetometer, environmental sensors and camera die
//! temperatures, streamed over USB HID at ~400 Hz. Provides:
//! - Device enumeration and open-by-serial
//! - Continuous acquisition with MCU-to-host clock alignment and long-term
//!   drift correction against the paired video stream
//! - Latest-sample access per modality with bounded-latency polling
//!
//! ## Quick Start
//! ```no_run
//! use std::time::Duration;
//!
//! let mut sensors = zedsense::SensorCapture::new();
//! sensors.init(None).unwrap();
//!
//! for _ in 0..100 {
//!     if let Some(imu) = sensors.last_imu(Duration::from_millis(100)) {
//!         println!("ts={} accel={:?}", imu.timestamp_ns, imu.accel);
//!     }
//! }
//! ```

pub mod capture;
pub mod error;
pub mod protocol;
pub mod sync;
pub mod types;

mod clock;
mod hid;
mod registry;

pub use capture::SensorCapture;
pub use clock::monotonic_ns;
pub use error::{DecodeError, Error};
pub use sync::VideoSync;
pub use types::*;

/// Result type alias for zedsense operations.
pub type Result<T> = std::result::Result<T, Error>;
