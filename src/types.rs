use std::fmt;

bitflags::bitflags! {
    /// Synchronization capabilities advertised in every sensor report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(C)]
    pub struct SyncCaps: u8 {
        /// The MCU latches video frame exposures into the sensor stream.
        const FRAME_SYNC = 1 << 0;
    }
}

/// Firmware release word: major version in the high byte, minor in the low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareVersion(pub u16);

impl FirmwareVersion {
    pub fn major(self) -> u16 {
        self.0 >> 8
    }

    pub fn minor(self) -> u16 {
        self.0 & 0x00FF
    }

    /// True when the firmware is at or past the given release.
    pub fn at_least(self, major: u16, minor: u16) -> bool {
        self.0 >= ((major << 8) | minor)
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major(), self.minor())
    }
}

/// Identity of an enumerated sensor module.
#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    /// Camera serial number.
    pub serial: i32,
    /// USB product ID (varies by camera model and revision).
    pub product_id: u16,
    /// Firmware release reported by the USB descriptor.
    pub fw: FirmwareVersion,
}

/// Inertial sample in physical units, aligned to the host monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct ImuSample {
    /// Host-aligned timestamp in nanoseconds.
    pub timestamp_ns: u64,
    /// False when the IMU block of the report was flagged invalid.
    pub valid: bool,
    /// True when this sample coincides with a video frame exposure.
    pub sync: bool,
    /// Linear acceleration [x, y, z] in m/s².
    pub accel: [f32; 3],
    /// Angular rate [x, y, z] in °/s.
    pub gyro: [f32; 3],
    /// IMU die temperature in °C.
    pub temp: f32,
}

/// Magnetometer sample in µT.
#[derive(Debug, Clone, Copy)]
pub struct MagSample {
    /// Host-aligned timestamp in nanoseconds.
    pub timestamp_ns: u64,
    /// Magnetic field [x, y, z] in µT.
    pub mag: [f32; 3],
}

/// Environmental sample (on-board barometer/hygrometer block).
#[derive(Debug, Clone, Copy)]
pub struct EnvSample {
    /// Host-aligned timestamp in nanoseconds.
    pub timestamp_ns: u64,
    /// Ambient temperature in °C.
    pub temp: f32,
    /// Atmospheric pressure in hPa.
    pub press: f32,
    /// Relative humidity in %rH.
    pub humid: f32,
}

/// Camera die temperatures, acquired alongside the environmental block.
#[derive(Debug, Clone, Copy)]
pub struct CamTempSample {
    /// Host-aligned timestamp in nanoseconds.
    pub timestamp_ns: u64,
    /// Left imager die temperature in °C.
    pub temp_left: f32,
    /// Right imager die temperature in °C.
    pub temp_right: f32,
}
