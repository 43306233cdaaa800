//! Latest-sample hand-off between the acquisition worker and consumers.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::types::{CamTempSample, EnvSample, ImuSample, MagSample};

/// Single-slot "newest value" cell with a freshness flag.
///
/// The worker overwrites the slot at the sensor rate; consumers block until
/// a value they have not consumed yet appears. Values overwritten before
/// being polled are silently dropped.
pub(crate) struct LatestCell<T> {
    slot: Mutex<Slot<T>>,
    fresh: Condvar,
}

struct Slot<T> {
    value: Option<T>,
    fresh: bool,
}

impl<T: Clone> LatestCell<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                fresh: false,
            }),
            fresh: Condvar::new(),
        }
    }

    /// Store a new value and wake every waiting poller.
    pub fn publish(&self, value: T) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.value = Some(value);
            slot.fresh = true;
            self.fresh.notify_all();
        }
    }

    /// Wait up to `timeout` for a value not returned before, consuming its
    /// freshness. `None` on timeout.
    pub fn poll(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock().ok()?;
        while !slot.fresh {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, wait) = self.fresh.wait_timeout(slot, remaining).ok()?;
            slot = guard;
            if wait.timed_out() && !slot.fresh {
                return None;
            }
        }
        slot.fresh = false;
        slot.value.clone()
    }

    /// Drop freshness so a stale value can no longer satisfy a poll.
    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.fresh = false;
        }
    }
}

/// One cell per modality.
///
/// Cells are independent so that modalities publishing at different rates
/// never contend on a shared lock.
pub(crate) struct SampleRegistry {
    pub imu: LatestCell<ImuSample>,
    pub mag: LatestCell<MagSample>,
    pub env: LatestCell<EnvSample>,
    pub cam_temp: LatestCell<CamTempSample>,
}

impl SampleRegistry {
    pub fn new() -> Self {
        Self {
            imu: LatestCell::new(),
            mag: LatestCell::new(),
            env: LatestCell::new(),
            cam_temp: LatestCell::new(),
        }
    }

    pub fn clear(&self) {
        self.imu.clear();
        self.mag.clear();
        self.env.clear();
        self.cam_temp.clear();
    }
}
