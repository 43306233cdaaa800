//! Shared observables between the sensor and video capture components.
//!
//! The sensor facade and the video capture component reference each other
//! only through this handle: the video side writes its latest frame
//! timestamp (and optionally a startup offset), the sensor side reads them.
//! Two one-way scalar channels instead of a mutual ownership edge.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Handle published by the video capture component so that sensor timestamps
/// can converge to the video clock reference.
///
/// All fields are single-word observables with no ordering dependency
/// between them, hence relaxed atomics.
#[derive(Debug, Default)]
pub struct VideoSync {
    last_frame_ns: AtomicU64,
    start_offset_ns: AtomicI64,
}

impl VideoSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the host timestamp of the most recent video frame. Written by
    /// the video component for every captured frame.
    pub fn set_last_frame_ns(&self, ts_ns: u64) {
        self.last_frame_ns.store(ts_ns, Ordering::Relaxed);
    }

    /// Host timestamp of the most recent video frame.
    pub fn last_frame_ns(&self) -> u64 {
        self.last_frame_ns.load(Ordering::Relaxed)
    }

    /// Seed the sensor clock with an initial sensor-to-video offset in
    /// nanoseconds. Read once when the handle is first handed to the sensor
    /// side.
    pub fn set_start_offset_ns(&self, offset_ns: i64) {
        self.start_offset_ns.store(offset_ns, Ordering::Relaxed);
    }

    pub fn start_offset_ns(&self) -> i64 {
        self.start_offset_ns.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_way_channels() {
        let sync = VideoSync::new();
        assert_eq!(sync.last_frame_ns(), 0);
        assert_eq!(sync.start_offset_ns(), 0);

        sync.set_last_frame_ns(1_234_567);
        sync.set_start_offset_ns(-42);
        assert_eq!(sync.last_frame_ns(), 1_234_567);
        assert_eq!(sync.start_offset_ns(), -42);
    }
}
