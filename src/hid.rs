use crate::protocol::{
    REP_ID_REQUEST_SET, REP_ID_SENSOR_STREAM_STATUS, RQ_CMD_PING, STREAM_STATUS_SIZE,
};
use crate::Result;
use hidapi::HidDevice;

/// Port the acquisition worker drives.
///
/// Implemented by [`HidTransport`] for real hardware; tests substitute a
/// scripted mock.
pub(crate) trait SensorPort: Send {
    /// Start or stop the sensor stream on the device.
    fn enable_stream(&self, enable: bool) -> Result<()>;

    /// Keep the stream alive; the firmware halts it after a few seconds of
    /// host silence.
    fn send_ping(&self) -> Result<()>;

    /// Read one interrupt report, returning the number of bytes received
    /// (0 on timeout).
    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;

    /// Switch the handle back to blocking reads after a protocol hiccup.
    fn set_blocking(&self);
}

/// HID transport owning the device handle.
///
/// Feature reports carry control traffic (stream enable, ping, status);
/// sensor samples arrive as interrupt reports.
pub(crate) struct HidTransport {
    device: HidDevice,
}

impl HidTransport {
    pub fn new(device: HidDevice) -> Self {
        Self { device }
    }

    /// Query whether the device reports its stream as enabled.
    pub fn stream_enabled(&self) -> bool {
        let mut buf = [0u8; 65];
        buf[0] = REP_ID_SENSOR_STREAM_STATUS;
        match self.device.get_feature_report(&mut buf) {
            Ok(n) if n >= STREAM_STATUS_SIZE && buf[0] == REP_ID_SENSOR_STREAM_STATUS => {
                buf[1] == 1
            }
            Ok(n) => {
                log::warn!(
                    "stream status report mismatch ({} bytes, id 0x{:02X})",
                    n,
                    buf[0]
                );
                false
            }
            Err(e) => {
                log::warn!("unable to get stream status: {}", e);
                false
            }
        }
    }
}

impl SensorPort for HidTransport {
    fn enable_stream(&self, enable: bool) -> Result<()> {
        self.device
            .send_feature_report(&[REP_ID_SENSOR_STREAM_STATUS, enable as u8])?;
        Ok(())
    }

    fn send_ping(&self) -> Result<()> {
        self.device
            .send_feature_report(&[REP_ID_REQUEST_SET, RQ_CMD_PING])?;
        Ok(())
    }

    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        Ok(self.device.read_timeout(buf, timeout_ms)?)
    }

    fn set_blocking(&self) {
        if let Err(e) = self.device.set_blocking_mode(true) {
            log::warn!("unable to switch handle to blocking mode: {}", e);
        }
    }
}
