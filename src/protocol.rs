use crate::error::DecodeError;
use crate::types::{FirmwareVersion, SyncCaps};

// -- USB identifiers --
pub const SL_USB_VENDOR: u16 = 0x2B03;

// -- HID report IDs --
/// Sensor stream status (feature report, 2-byte payload `[id, enable]`).
pub const REP_ID_SENSOR_STREAM_STATUS: u8 = 0x02;
/// Sensor data (interrupt report, 64-byte packed record).
pub const REP_ID_SENSOR_DATA: u8 = 0x05;
/// Request set (feature report, 2-byte payload `[id, command]`).
pub const REP_ID_REQUEST_SET: u8 = 0x21;

/// Request-set command: keep the sensor stream alive.
pub const RQ_CMD_PING: u8 = 0xF2;

// -- Report geometry --
/// Full interrupt report, report ID included.
pub const REPORT_SIZE: usize = 64;
/// Bytes of the report carrying the packed sensor record; the remainder is
/// reserved by the firmware.
pub const RECORD_SIZE: usize = 44;
/// Stream status feature report payload: `[id, enable]`.
pub const STREAM_STATUS_SIZE: usize = 2;

// -- Fixed-point scaling factors (firmware conventions) --
/// Nanoseconds per MCU tick (25.6 MHz free-running counter).
pub const TS_SCALE: f64 = 39.0625;
/// m/s² per accelerometer LSB (±8 g full scale).
pub const ACC_SCALE: f32 = 9.8189 * (8.0 / 32768.0);
/// °/s per gyroscope LSB (±1000 °/s full scale).
pub const GYRO_SCALE: f32 = 1000.0 / 32768.0;
/// µT per magnetometer LSB.
pub const MAG_SCALE: f32 = 1.0 / 16.0;
/// °C per temperature LSB.
pub const TEMP_SCALE: f32 = 0.01;
/// hPa per pressure LSB, firmware 3.9 and later.
pub const PRESS_SCALE_NEW: f32 = 0.0001;
/// hPa per pressure LSB, firmware before 3.9.
pub const PRESS_SCALE_OLD: f32 = 0.01;
/// %rH per humidity LSB, firmware 3.9 and later.
pub const HUMID_SCALE_NEW: f32 = 0.01;
/// %rH per humidity LSB, firmware before 3.9.
pub const HUMID_SCALE_OLD: f32 = 1.0 / 1024.0;

/// Camera die temperature sentinel for "no reading available".
pub const TEMP_NOT_VALID: i16 = 0x7FFF;

/// Pressure scale for the given firmware release.
pub fn press_scale(fw: FirmwareVersion) -> f32 {
    if fw.at_least(3, 9) {
        PRESS_SCALE_NEW
    } else {
        PRESS_SCALE_OLD
    }
}

/// Humidity scale for the given firmware release.
pub fn humid_scale(fw: FirmwareVersion) -> f32 {
    if fw.at_least(3, 9) {
        HUMID_SCALE_NEW
    } else {
        HUMID_SCALE_OLD
    }
}

/// Validity marker carried by the magnetometer and environmental blocks.
///
/// Both sensors sample slower than the 400 Hz report rate, so most records
/// repeat the previous reading (`Old`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SampleStatus {
    /// Reading unchanged since the previous report.
    Old = 0,
    /// Fresh reading in this report.
    New = 1,
    /// Sensor block unusable.
    NotValid = 2,
}

impl SampleStatus {
    pub fn from_raw(v: u8) -> SampleStatus {
        match v {
            0 => SampleStatus::Old,
            1 => SampleStatus::New,
            _ => SampleStatus::NotValid,
        }
    }
}

/// Raw sensor record as carried by a `0x05` interrupt report.
///
/// Values are unscaled device units; the scale constants above convert them
/// to physical units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawRecord {
    /// 1 when this sample coincides with a video frame exposure.
    pub frame_sync: u8,
    /// Monotonic counter of frame-sync events.
    pub frame_sync_count: u32,
    /// 1 when the IMU fields must be ignored.
    pub imu_not_valid: u8,
    /// MCU free-running counter, `TS_SCALE` nanoseconds per tick.
    pub timestamp: u32,
    pub gx: i16,
    pub gy: i16,
    pub gz: i16,
    pub ax: i16,
    pub ay: i16,
    pub az: i16,
    pub imu_temp: i16,
    pub mag_valid: u8,
    pub mx: i16,
    pub my: i16,
    pub mz: i16,
    pub env_valid: u8,
    pub temp: i16,
    pub press: i16,
    pub humid: i16,
    pub temp_cam_left: i16,
    pub temp_cam_right: i16,
    pub sync_capabilities: u8,
}

impl RawRecord {
    /// MCU timestamp widened to nanoseconds.
    pub fn mcu_timestamp_ns(&self) -> u64 {
        (self.timestamp as f64 * TS_SCALE).round() as u64
    }

    pub fn mag_status(&self) -> SampleStatus {
        SampleStatus::from_raw(self.mag_valid)
    }

    pub fn env_status(&self) -> SampleStatus {
        SampleStatus::from_raw(self.env_valid)
    }

    pub fn sync_caps(&self) -> SyncCaps {
        SyncCaps::from_bits_truncate(self.sync_capabilities)
    }
}

fn u32_at(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn i16_at(buf: &[u8], off: usize) -> i16 {
    i16::from_le_bytes([buf[off], buf[off + 1]])
}

/// Decode a sensor interrupt report.
///
/// The record is field-packed little-endian, so fields are read by offset
/// rather than through a struct overlay.
///
/// Layout (offsets in bytes):
/// - `[0]`: report ID, 0x05
/// - `[1]`: frame_sync, `[2..6]`: frame_sync_count (u32)
/// - `[6]`: imu_not_valid, `[7..11]`: MCU timestamp (u32 ticks)
/// - `[11..17]`: gyro x/y/z (3× i16), `[17..23]`: accel x/y/z (3× i16)
/// - `[23..25]`: IMU temperature (i16)
/// - `[25]`: mag_valid, `[26..32]`: mag x/y/z (3× i16)
/// - `[32]`: env_valid, `[33..39]`: temperature, pressure, humidity (3× i16)
/// - `[39..43]`: left/right camera die temperatures (2× i16)
/// - `[43]`: sync_capabilities
pub fn decode(buf: &[u8]) -> Result<RawRecord, DecodeError> {
    if buf.first().copied() != Some(REP_ID_SENSOR_DATA) {
        return Err(DecodeError::BadId(buf.first().copied().unwrap_or(0)));
    }
    if buf.len() < RECORD_SIZE {
        return Err(DecodeError::ShortBuffer(buf.len()));
    }

    Ok(RawRecord {
        frame_sync: buf[1],
        frame_sync_count: u32_at(buf, 2),
        imu_not_valid: buf[6],
        timestamp: u32_at(buf, 7),
        gx: i16_at(buf, 11),
        gy: i16_at(buf, 13),
        gz: i16_at(buf, 15),
        ax: i16_at(buf, 17),
        ay: i16_at(buf, 19),
        az: i16_at(buf, 21),
        imu_temp: i16_at(buf, 23),
        mag_valid: buf[25],
        mx: i16_at(buf, 26),
        my: i16_at(buf, 28),
        mz: i16_at(buf, 30),
        env_valid: buf[32],
        temp: i16_at(buf, 33),
        press: i16_at(buf, 35),
        humid: i16_at(buf, 37),
        temp_cam_left: i16_at(buf, 39),
        temp_cam_right: i16_at(buf, 41),
        sync_capabilities: buf[43],
    })
}

/// Pack a record into a full interrupt report. Inverse of [`decode`]; used by
/// tests and simulated devices.
pub fn encode(rec: &RawRecord) -> [u8; REPORT_SIZE] {
    let mut buf = [0u8; REPORT_SIZE];
    buf[0] = REP_ID_SENSOR_DATA;
    buf[1] = rec.frame_sync;
    buf[2..6].copy_from_slice(&rec.frame_sync_count.to_le_bytes());
    buf[6] = rec.imu_not_valid;
    buf[7..11].copy_from_slice(&rec.timestamp.to_le_bytes());
    buf[11..13].copy_from_slice(&rec.gx.to_le_bytes());
    buf[13..15].copy_from_slice(&rec.gy.to_le_bytes());
    buf[15..17].copy_from_slice(&rec.gz.to_le_bytes());
    buf[17..19].copy_from_slice(&rec.ax.to_le_bytes());
    buf[19..21].copy_from_slice(&rec.ay.to_le_bytes());
    buf[21..23].copy_from_slice(&rec.az.to_le_bytes());
    buf[23..25].copy_from_slice(&rec.imu_temp.to_le_bytes());
    buf[25] = rec.mag_valid;
    buf[26..28].copy_from_slice(&rec.mx.to_le_bytes());
    buf[28..30].copy_from_slice(&rec.my.to_le_bytes());
    buf[30..32].copy_from_slice(&rec.mz.to_le_bytes());
    buf[32] = rec.env_valid;
    buf[33..35].copy_from_slice(&rec.temp.to_le_bytes());
    buf[35..37].copy_from_slice(&rec.press.to_le_bytes());
    buf[37..39].copy_from_slice(&rec.humid.to_le_bytes());
    buf[39..41].copy_from_slice(&rec.temp_cam_left.to_le_bytes());
    buf[41..43].copy_from_slice(&rec.temp_cam_right.to_le_bytes());
    buf[43] = rec.sync_capabilities;
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> RawRecord {
        RawRecord {
            frame_sync: 1,
            frame_sync_count: 0x0102_0304,
            imu_not_valid: 0,
            timestamp: 1_000_000,
            gx: -120,
            gy: 55,
            gz: 32767,
            ax: -32768,
            ay: 4096,
            az: 8192,
            imu_temp: 2750,
            mag_valid: 1,
            mx: -160,
            my: 320,
            mz: 16,
            env_valid: 1,
            temp: 2311,
            press: 10132,
            humid: 450,
            temp_cam_left: 3901,
            temp_cam_right: 3888,
            sync_capabilities: 1,
        }
    }

    #[test]
    fn test_roundtrip() {
        let rec = sample_record();
        let buf = encode(&rec);
        assert_eq!(decode(&buf).unwrap(), rec);
    }

    #[test]
    fn test_bad_report_id() {
        let mut buf = encode(&sample_record());
        buf[0] = 0x04;
        assert_eq!(decode(&buf), Err(DecodeError::BadId(0x04)));
        assert_eq!(decode(&[]), Err(DecodeError::BadId(0)));
    }

    #[test]
    fn test_short_buffer() {
        let buf = encode(&sample_record());
        assert_eq!(
            decode(&buf[..RECORD_SIZE - 1]),
            Err(DecodeError::ShortBuffer(RECORD_SIZE - 1))
        );
        // Exactly the packed record is enough, trailing padding is not required.
        assert!(decode(&buf[..RECORD_SIZE]).is_ok());
    }

    #[test]
    fn test_mcu_timestamp_scaling() {
        let rec = RawRecord {
            timestamp: 25_600,
            ..Default::default()
        };
        // 25600 ticks at 39.0625 ns/tick is exactly one millisecond.
        assert_eq!(rec.mcu_timestamp_ns(), 1_000_000);

        let rec = RawRecord {
            timestamp: 1_000_000,
            ..Default::default()
        };
        assert_eq!(rec.mcu_timestamp_ns(), 39_062_500);
    }

    #[test]
    fn test_fw_gated_scales() {
        assert_eq!(press_scale(FirmwareVersion(0x0309)), PRESS_SCALE_NEW);
        assert_eq!(press_scale(FirmwareVersion(0x0400)), PRESS_SCALE_NEW);
        assert_eq!(press_scale(FirmwareVersion(0x0308)), PRESS_SCALE_OLD);
        assert_eq!(humid_scale(FirmwareVersion(0x0309)), HUMID_SCALE_NEW);
        assert_eq!(humid_scale(FirmwareVersion(0x0205)), HUMID_SCALE_OLD);
    }

    #[test]
    fn test_sample_status() {
        assert_eq!(SampleStatus::from_raw(0), SampleStatus::Old);
        assert_eq!(SampleStatus::from_raw(1), SampleStatus::New);
        assert_eq!(SampleStatus::from_raw(2), SampleStatus::NotValid);
        assert_eq!(SampleStatus::from_raw(200), SampleStatus::NotValid);
    }
}
