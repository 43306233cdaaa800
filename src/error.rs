/// Errors that can occur when interacting with the ZED sensor module.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no ZED camera with a sensor module found")]
    NoDevices,

    #[error("no ZED camera with serial number {0}")]
    DeviceNotFound(i32),

    #[error("malformed sensor report: {0}")]
    Decode(#[from] DecodeError),
}

/// Failures while decoding a raw sensor report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected report ID 0x{0:02X}, expected 0x05")]
    BadId(u8),

    #[error("short sensor report ({0} bytes)")]
    ShortBuffer(usize),
}
