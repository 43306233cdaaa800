use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use hidapi::HidApi;

use crate::clock::{self, ClockAligner};
use crate::error::Error;
use crate::hid::{HidTransport, SensorPort};
use crate::protocol::{
    self, RawRecord, SampleStatus, ACC_SCALE, GYRO_SCALE, MAG_SCALE, RECORD_SIZE, REPORT_SIZE,
    TEMP_NOT_VALID, TEMP_SCALE,
};
use crate::registry::SampleRegistry;
use crate::sync::VideoSync;
use crate::types::{CamTempSample, DeviceInfo, EnvSample, FirmwareVersion, ImuSample, MagSample};
use crate::Result;

/// Read iterations between liveness pings, about one second at the nominal
/// 400 Hz report rate.
const PING_INTERVAL: u32 = 400;
/// Interrupt read timeout.
const READ_TIMEOUT_MS: i32 = 500;

/// State shared between the facade and the acquisition worker.
struct Shared {
    stop: AtomicBool,
    registry: SampleRegistry,
    video: Mutex<Option<Arc<VideoSync>>>,
}

/// Sensor facade for one ZED camera.
///
/// `init` opens the device by serial number, enables the stream and spawns
/// the acquisition worker; the `last_*` getters then serve the newest sample
/// of each modality. `reset` (also run on drop) stops the worker and
/// releases the device.
///
/// `init`/`reset` belong to a controlling thread; the getters may be called
/// from any thread concurrently with acquisition.
pub struct SensorCapture {
    devices: BTreeMap<i32, DeviceInfo>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    device: Option<DeviceInfo>,
    /// Keeps the hidapi context alive while the worker uses the device handle.
    api: Option<HidApi>,
}

impl SensorCapture {
    pub fn new() -> Self {
        Self {
            devices: BTreeMap::new(),
            shared: Arc::new(Shared {
                stop: AtomicBool::new(false),
                registry: SampleRegistry::new(),
                video: Mutex::new(None),
            }),
            worker: None,
            device: None,
            api: None,
        }
    }

    /// Scan the bus for ZED sensor modules and return their serial numbers.
    pub fn enumerate(&mut self) -> Vec<i32> {
        self.devices.clear();

        let api = match HidApi::new() {
            Ok(api) => api,
            Err(e) => {
                log::error!("HID enumeration failed: {}", e);
                return Vec::new();
            }
        };

        for dev in api.device_list() {
            if dev.vendor_id() != protocol::SL_USB_VENDOR {
                continue;
            }
            let Some(serial) = dev.serial_number().and_then(|s| s.parse::<i32>().ok()) else {
                continue;
            };
            let info = DeviceInfo {
                serial,
                product_id: dev.product_id(),
                fw: FirmwareVersion(dev.release_number()),
            };
            log::info!(
                "found ZED sensor module: sn {} (pid 0x{:04X}, fw {})",
                serial,
                info.product_id,
                info.fw
            );
            self.devices.insert(serial, info);
        }

        self.devices.keys().copied().collect()
    }

    /// Identity of an enumerated device.
    pub fn device_info(&self, serial: i32) -> Option<DeviceInfo> {
        self.devices.get(&serial).copied()
    }

    /// Open the camera with the given serial number (or the first one found)
    /// and start acquisition.
    pub fn init(&mut self, serial: Option<i32>) -> Result<()> {
        self.reset();

        if self.devices.is_empty() {
            self.enumerate();
        }

        let info = match serial {
            Some(sn) => *self.devices.get(&sn).ok_or(Error::DeviceNotFound(sn))?,
            None => *self.devices.values().next().ok_or(Error::NoDevices)?,
        };

        let api = HidApi::new()?;
        let device = api.open_serial(
            protocol::SL_USB_VENDOR,
            info.product_id,
            &info.serial.to_string(),
        )?;
        let transport = HidTransport::new(device);

        transport.enable_stream(true)?;
        if !transport.stream_enabled() {
            log::warn!("device did not confirm stream enable");
        }

        log::info!(
            "connected to ZED sensor module sn {} (fw {})",
            info.serial,
            info.fw
        );

        self.shared.stop.store(false, Ordering::Relaxed);
        let shared = self.shared.clone();
        let fw = info.fw;
        let worker = std::thread::Builder::new()
            .name("zedsense-grab".into())
            .spawn(move || acquisition_loop(transport, fw, shared))?;

        self.worker = Some(worker);
        self.device = Some(info);
        self.api = Some(api);
        Ok(())
    }

    /// Firmware release of the open device.
    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        self.device.map(|d| d.fw)
    }

    /// Serial number of the open device.
    pub fn serial_number(&self) -> Option<i32> {
        self.device.map(|d| d.serial)
    }

    /// True while the acquisition worker is alive.
    pub fn is_running(&self) -> bool {
        self.worker.is_some() && !self.shared.stop.load(Ordering::Relaxed)
    }

    /// Newest IMU sample, waiting up to `timeout` for one not yet consumed.
    pub fn last_imu(&self, timeout: Duration) -> Option<ImuSample> {
        self.shared.registry.imu.poll(timeout)
    }

    /// Newest magnetometer sample, waiting up to `timeout`.
    pub fn last_mag(&self, timeout: Duration) -> Option<MagSample> {
        self.shared.registry.mag.poll(timeout)
    }

    /// Newest environmental sample, waiting up to `timeout`.
    pub fn last_env(&self, timeout: Duration) -> Option<EnvSample> {
        self.shared.registry.env.poll(timeout)
    }

    /// Newest camera die temperatures, waiting up to `timeout`.
    pub fn last_cam_temp(&self, timeout: Duration) -> Option<CamTempSample> {
        self.shared.registry.cam_temp.poll(timeout)
    }

    /// Hand over the video collaborator's sync handle.
    ///
    /// The clock aligner reads the video frame timestamp at drift updates so
    /// the sensor timestamps converge to the video clock reference.
    pub fn enable_sync(&self, video: Arc<VideoSync>) {
        if let Ok(mut slot) = self.shared.video.lock() {
            *slot = Some(video);
        }
    }

    /// Stop acquisition and release the device. Idempotent; also runs on
    /// drop.
    pub fn reset(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("acquisition worker panicked");
            }
        }
        // A sample published before the stop must not satisfy a poll issued
        // after it.
        self.shared.registry.clear();
        self.api = None;
        if self.device.take().is_some() {
            log::info!("device closed");
        }
    }
}

impl Default for SensorCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SensorCapture {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Acquisition loop: pull interrupt reports, align timestamps, publish the
/// newest sample of each modality.
///
/// Runs until the stop flag is set. Transport and protocol errors are
/// recovered locally; nothing propagates out of the worker.
fn acquisition_loop<P: SensorPort>(port: P, fw: FirmwareVersion, shared: Arc<Shared>) {
    let mut aligner = ClockAligner::new();
    let mut buf = [0u8; REPORT_SIZE];
    let mut ping_count: u32 = 0;
    let press_scale = protocol::press_scale(fw);
    let humid_scale = protocol::humid_scale(fw);

    shared.registry.clear();
    log::info!("acquisition worker started");

    while !shared.stop.load(Ordering::Relaxed) {
        // The firmware stops streaming unless it hears from the host about
        // once per second.
        if ping_count >= PING_INTERVAL {
            ping_count = 0;
            if let Err(e) = port.send_ping() {
                log::warn!("liveness ping failed: {}", e);
            }
        }
        ping_count += 1;

        let n = match port.read_report(&mut buf, READ_TIMEOUT_MS) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("interrupt read failed: {}", e);
                port.set_blocking();
                continue;
            }
        };
        if n < RECORD_SIZE {
            port.set_blocking();
            continue;
        }

        let rec = match protocol::decode(&buf[..n]) {
            Ok(rec) => rec,
            Err(e) => {
                log::warn!("sensor report rejected: {}", e);
                port.set_blocking();
                continue;
            }
        };

        let host_ns = clock::monotonic_ns();
        let video = match shared.video.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        if let Some(video) = video.as_deref() {
            aligner.seed_offset(video);
        }

        let Some(timestamp_ns) = aligner.align(host_ns, rec.mcu_timestamp_ns(), rec.imu_not_valid == 0)
        else {
            // Bootstrap sample: anchors the clock, never published.
            continue;
        };

        aligner.observe_sync(
            clock::monotonic_ns(),
            timestamp_ns,
            rec.frame_sync,
            rec.frame_sync_count,
            !rec.sync_caps().is_empty(),
            video.as_deref(),
        );

        publish(&shared.registry, &rec, timestamp_ns, press_scale, humid_scale);
    }

    if let Err(e) = port.enable_stream(false) {
        log::warn!("unable to disable sensor stream: {}", e);
    }
    log::info!("acquisition worker stopped");
}

/// Fan a decoded record out to the per-modality cells.
fn publish(
    registry: &SampleRegistry,
    rec: &RawRecord,
    timestamp_ns: u64,
    press_scale: f32,
    humid_scale: f32,
) {
    registry.imu.publish(ImuSample {
        timestamp_ns,
        valid: rec.imu_not_valid == 0,
        sync: rec.frame_sync != 0,
        accel: [
            rec.ax as f32 * ACC_SCALE,
            rec.ay as f32 * ACC_SCALE,
            rec.az as f32 * ACC_SCALE,
        ],
        gyro: [
            rec.gx as f32 * GYRO_SCALE,
            rec.gy as f32 * GYRO_SCALE,
            rec.gz as f32 * GYRO_SCALE,
        ],
        temp: rec.imu_temp as f32 * TEMP_SCALE,
    });

    if rec.mag_status() == SampleStatus::New {
        registry.mag.publish(MagSample {
            timestamp_ns,
            mag: [
                rec.mx as f32 * MAG_SCALE,
                rec.my as f32 * MAG_SCALE,
                rec.mz as f32 * MAG_SCALE,
            ],
        });
    }

    let env_new = rec.env_status() == SampleStatus::New;
    if env_new {
        registry.env.publish(EnvSample {
            timestamp_ns,
            temp: rec.temp as f32 * TEMP_SCALE,
            press: rec.press as f32 * press_scale,
            humid: rec.humid as f32 * humid_scale,
        });
    }

    // Die temperatures ride along with the environmental acquisition at
    // firmware level.
    if env_new && rec.temp_cam_left != TEMP_NOT_VALID && rec.temp_cam_right != TEMP_NOT_VALID {
        registry.cam_temp.publish(CamTempSample {
            timestamp_ns,
            temp_left: rec.temp_cam_left as f32 * TEMP_SCALE,
            temp_right: rec.temp_cam_right as f32 * TEMP_SCALE,
        });
    }
}
