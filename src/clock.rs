//! MCU-to-host clock alignment.
//!
//! The sensor MCU stamps every sample with a free-running 25.6 MHz counter.
//! This module maps those ticks onto the host monotonic clock and corrects
//! the MCU's long-term frequency drift using the sync edges the firmware
//! latches when a video frame is exposed.

use std::sync::OnceLock;
use std::time::Instant;

use crate::sync::VideoSync;

/// Host/MCU timestamp pairs collected before each drift update.
pub(crate) const DRIFT_WINDOW: usize = 50;
/// Drift updates considered part of the startup transient.
pub(crate) const NTP_ADJUST_CT: u32 = 3;
/// Drift updates between two offset re-alignments against the video clock.
pub(crate) const OFFSET_SAMPLES: u32 = 3;

/// Hard bounds for the drift multiplier.
const SCALE_MIN: f64 = 0.8;
const SCALE_MAX: f64 = 1.2;

/// One full period of the 32-bit MCU counter: 2^32 ticks × `TS_SCALE` ns,
/// about 168 seconds.
const MCU_WRAP_NS: u64 = 167_772_160_000;

/// Nanoseconds since a process-wide monotonic epoch.
///
/// Sensor and video components running in the same process share this epoch,
/// which keeps their timestamps directly comparable.
pub fn monotonic_ns() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// Maps MCU timestamps into the host clock frame.
///
/// The first valid IMU sample anchors `start_host_ns`; from then on every
/// sample advances `rel_mcu_ns` by its drift-corrected MCU delta, so the
/// published timestamp is
///
/// ```text
/// aligned_ns = (start_host_ns - sync_offset_ns) + rel_mcu_ns
/// ```
///
/// Drift correction multiplies `ntp_scale` into future deltas only, so the
/// published sequence never jumps on an update.
pub(crate) struct ClockAligner {
    start_host_ns: u64,
    last_mcu_ns: u64,
    rel_mcu_ns: u64,
    ntp_scale: f64,
    sync_offset_ns: i64,
    last_frame_sync_count: u32,
    host_ts: Vec<u64>,
    mcu_ts: Vec<u64>,
    ntp_adjust_count: u32,
    first_sample: bool,
    offset_sum_ns: i64,
    offset_count: u32,
    offset_seeded: bool,
}

impl ClockAligner {
    pub fn new() -> Self {
        Self {
            start_host_ns: 0,
            last_mcu_ns: 0,
            rel_mcu_ns: 0,
            ntp_scale: 1.0,
            sync_offset_ns: 0,
            last_frame_sync_count: 0,
            host_ts: Vec::with_capacity(DRIFT_WINDOW),
            mcu_ts: Vec::with_capacity(DRIFT_WINDOW),
            ntp_adjust_count: 0,
            first_sample: true,
            offset_sum_ns: 0,
            offset_count: 0,
            offset_seeded: false,
        }
    }

    /// Map an MCU timestamp (nanoseconds) into the host clock frame.
    ///
    /// Returns `None` until the first valid IMU sample establishes the host
    /// anchor; the anchoring sample itself is consumed here and must not be
    /// published.
    pub fn align(&mut self, host_ns: u64, mcu_ns: u64, imu_valid: bool) -> Option<u64> {
        if self.first_sample {
            if !imu_valid {
                return None;
            }
            self.start_host_ns = host_ns;
            self.last_mcu_ns = mcu_ns;
            self.first_sample = false;
            return None;
        }

        let delta_raw = if mcu_ns >= self.last_mcu_ns {
            mcu_ns - self.last_mcu_ns
        } else {
            // 32-bit counter wrapped
            mcu_ns + MCU_WRAP_NS - self.last_mcu_ns
        };
        self.last_mcu_ns = mcu_ns;

        self.rel_mcu_ns += (delta_raw as f64 * self.ntp_scale).round() as u64;

        Some((self.start_host_ns as i64 - self.sync_offset_ns + self.rel_mcu_ns as i64) as u64)
    }

    /// Record a potential sync edge and run the drift estimation once the
    /// pairing window fills up.
    ///
    /// `steady_ns` is the host clock at reception, `aligned_ns` the value
    /// [`align`](Self::align) just produced for this sample. Must be called
    /// for every aligned sample so the frame-sync counter stays current.
    pub fn observe_sync(
        &mut self,
        steady_ns: u64,
        aligned_ns: u64,
        frame_sync: u8,
        frame_sync_count: u32,
        sync_capable: bool,
        video: Option<&VideoSync>,
    ) {
        if sync_capable
            && self.last_frame_sync_count != 0
            && (frame_sync != 0 || frame_sync_count > self.last_frame_sync_count)
        {
            self.host_ts.push(steady_ns);
            self.mcu_ts.push(aligned_ns);

            if self.host_ts.len() == DRIFT_WINDOW && self.mcu_ts.len() == DRIFT_WINDOW {
                self.drift_update(aligned_ns, video);
            }
        }
        self.last_frame_sync_count = frame_sync_count;
    }

    fn drift_update(&mut self, aligned_ns: u64, video: Option<&VideoSync>) {
        // Discard more of the window while the device clock settles after
        // startup.
        let first = if self.ntp_adjust_count <= NTP_ADJUST_CT {
            DRIFT_WINDOW / 2
        } else {
            5
        };
        let last = DRIFT_WINDOW - 1;

        let host_span = (self.host_ts[last] - self.host_ts[first]) as f64;
        let mcu_span = (self.mcu_ts[last] - self.mcu_ts[first]) as f64;
        let scale = if mcu_span > 0.0 {
            (host_span / mcu_span).clamp(SCALE_MIN, SCALE_MAX)
        } else {
            1.0
        };

        // The multiplier only affects future deltas; already-published
        // timestamps stay continuous across the update.
        self.ntp_scale = (self.ntp_scale * scale).clamp(SCALE_MIN, SCALE_MAX);
        log::trace!("drift update: scale {:.6}, ntp_scale {:.6}", scale, self.ntp_scale);

        self.host_ts.clear();
        self.mcu_ts.clear();
        self.ntp_adjust_count += 1;

        if let Some(video) = video {
            self.offset_sum_ns += aligned_ns as i64 - video.last_frame_ns() as i64;
            self.offset_count += 1;

            if self.offset_count == OFFSET_SAMPLES {
                let offset = self.offset_sum_ns / self.offset_count as i64;
                self.sync_offset_ns += offset;
                log::info!(
                    "sensor/video offset adjusted by {} ns (total {} ns)",
                    offset,
                    self.sync_offset_ns
                );
                self.offset_sum_ns = 0;
                self.offset_count = 0;
            }
        }
    }

    /// Fold the video component's startup offset in, once per aligner.
    pub fn seed_offset(&mut self, video: &VideoSync) {
        if self.offset_seeded {
            return;
        }
        self.offset_seeded = true;
        let offset = video.start_offset_ns();
        if offset != 0 {
            self.sync_offset_ns += offset;
            log::info!("sensor/video offset seeded with {} ns", offset);
        }
    }

    #[cfg(test)]
    pub fn ntp_scale(&self) -> f64 {
        self.ntp_scale
    }

    #[cfg(test)]
    pub fn sync_offset_ns(&self) -> i64 {
        self.sync_offset_ns
    }

    #[cfg(test)]
    pub fn window_len(&self) -> usize {
        self.host_ts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{RawRecord, TS_SCALE};

    const START_HOST: u64 = 1_000_000_000;

    /// Drive one sample through align + observe_sync as the acquisition loop
    /// does, marking every sample as a sync edge.
    fn step_edge(
        al: &mut ClockAligner,
        steady: u64,
        mcu: u64,
        count: u32,
        video: Option<&VideoSync>,
    ) -> Option<u64> {
        let aligned = al.align(steady, mcu, true)?;
        al.observe_sync(steady, aligned, 1, count, true, video);
        Some(aligned)
    }

    #[test]
    fn test_bootstrap_sample_not_published() {
        let mut al = ClockAligner::new();
        assert!(al.align(START_HOST, 39_062_500, true).is_none());
        // Second sample is published, anchored at the bootstrap host time.
        assert!(al.align(START_HOST + 5, 40_062_500, true).is_some());
    }

    #[test]
    fn test_pre_bootstrap_invalid_samples_dropped() {
        let mut al = ClockAligner::new();
        assert!(al.align(START_HOST, 1_000_000, false).is_none());
        assert!(al.align(START_HOST + 1_000_000, 2_000_000, false).is_none());
        // First valid sample anchors, still unpublished.
        assert!(al.align(START_HOST + 2_000_000, 3_000_000, true).is_none());
        assert_eq!(
            al.align(START_HOST + 3_000_000, 4_000_000, true),
            Some(START_HOST + 2_000_000 + 1_000_000)
        );
    }

    #[test]
    fn test_bootstrap_timing_from_ticks() {
        // 25600-tick deltas are exactly 1 ms.
        let ticks = [1_000_000u32, 1_025_600, 1_051_200];
        let ns: Vec<u64> = ticks
            .iter()
            .map(|&t| RawRecord { timestamp: t, ..Default::default() }.mcu_timestamp_ns())
            .collect();

        let mut al = ClockAligner::new();
        assert!(al.align(START_HOST, ns[0], true).is_none());
        assert_eq!(al.align(START_HOST + 7, ns[1], true), Some(START_HOST + 1_000_000));
        assert_eq!(al.align(START_HOST + 13, ns[2], true), Some(START_HOST + 2_000_000));
    }

    #[test]
    fn test_monotonic_across_counter_wrap() {
        let mut al = ClockAligner::new();
        let near_wrap = MCU_WRAP_NS - 2_000_000;
        assert!(al.align(START_HOST, near_wrap, true).is_none());
        let before = al.align(START_HOST + 1, near_wrap + 1_000_000, true).unwrap();
        // Counter wraps: the next MCU value is numerically smaller.
        let after = al.align(START_HOST + 2, 500_000, true).unwrap();
        assert!(after > before);
        assert_eq!(after - before, 1_500_000);
    }

    /// Feed `DRIFT_WINDOW` sync edges with fixed host/MCU step ratios. The
    /// caller must have primed the frame-sync counter with one leading edge.
    fn run_window(
        al: &mut ClockAligner,
        steady: &mut u64,
        mcu: &mut u64,
        count: &mut u32,
        host_step: u64,
        mcu_step: u64,
        video: Option<&VideoSync>,
    ) {
        for _ in 0..DRIFT_WINDOW {
            *steady += host_step;
            *mcu += mcu_step;
            *count += 1;
            step_edge(al, *steady, *mcu, *count, video).unwrap();
        }
    }

    #[test]
    fn test_drift_correction_window() {
        let mut al = ClockAligner::new();
        let (mut steady, mut mcu, mut count) = (START_HOST, 500_000u64, 0u32);

        al.align(steady, mcu, true);
        // Prime the frame-sync counter; not recorded as an edge.
        steady += 2_750_000;
        mcu += 2_500_000;
        count += 1;
        step_edge(&mut al, steady, mcu, count, None).unwrap();
        assert_eq!(al.window_len(), 0);

        // Host advances 10% faster than the MCU.
        run_window(&mut al, &mut steady, &mut mcu, &mut count, 2_750_000, 2_500_000, None);
        assert_eq!(al.ntp_scale(), 1.1);
        assert_eq!(al.window_len(), 0);

        // A 1:1 window against the corrected clock leaves the scale alone.
        run_window(&mut al, &mut steady, &mut mcu, &mut count, 2_750_000, 2_500_000, None);
        assert_eq!(al.ntp_scale(), 1.1);
    }

    #[test]
    fn test_partial_window_changes_nothing() {
        let mut al = ClockAligner::new();
        let (mut steady, mut mcu, mut count) = (START_HOST, 500_000u64, 0u32);
        al.align(steady, mcu, true);

        for i in 0..DRIFT_WINDOW {
            steady += 2_750_000;
            mcu += 2_500_000;
            count += 1;
            step_edge(&mut al, steady, mcu, count, None).unwrap();
            // First sample only primes the counter, so the window is one
            // short of full after DRIFT_WINDOW samples.
            assert_eq!(al.window_len(), i);
        }
        assert_eq!(al.ntp_scale(), 1.0);
    }

    #[test]
    fn test_scale_clamped() {
        let mut al = ClockAligner::new();
        let (mut steady, mut mcu, mut count) = (START_HOST, 500_000u64, 0u32);
        al.align(steady, mcu, true);
        steady += 5_000_000;
        mcu += 2_500_000;
        count += 1;
        step_edge(&mut al, steady, mcu, count, None).unwrap();

        // Host runs at twice the MCU rate; the update clamps at 1.2.
        run_window(&mut al, &mut steady, &mut mcu, &mut count, 5_000_000, 2_500_000, None);
        assert_eq!(al.ntp_scale(), 1.2);

        // A second runaway window cannot push the multiplier past the bound.
        run_window(&mut al, &mut steady, &mut mcu, &mut count, 5_000_000, 2_500_000, None);
        assert_eq!(al.ntp_scale(), 1.2);
    }

    #[test]
    fn test_offset_realignment_every_third_update() {
        let video = VideoSync::new();
        let mut al = ClockAligner::new();
        let (mut steady, mut mcu, mut count) = (START_HOST, 500_000u64, 0u32);

        al.align(steady, mcu, true);
        steady += 2_500_000;
        mcu += 2_500_000;
        count += 1;
        video.set_last_frame_ns(START_HOST + (mcu - 500_000) - 6_000);
        step_edge(&mut al, steady, mcu, count, Some(&video)).unwrap();

        for window in 1..=3u32 {
            for _ in 0..DRIFT_WINDOW {
                steady += 2_500_000;
                mcu += 2_500_000;
                count += 1;
                // Video clock trails the aligned sensor clock by 6 µs; its
                // frame timestamp is published before the matching sensor
                // sample arrives.
                video.set_last_frame_ns(START_HOST + (mcu - 500_000) - 6_000);
                let aligned = step_edge(&mut al, steady, mcu, count, Some(&video)).unwrap();
                assert_eq!(aligned, START_HOST + (mcu - 500_000));
            }
            if window < 3 {
                assert_eq!(al.sync_offset_ns(), 0);
            }
        }
        // Third drift update folds the accumulated average in.
        assert_eq!(al.sync_offset_ns(), 6_000);

        // The next aligned timestamp absorbs the offset as a one-time shift.
        steady += 2_500_000;
        mcu += 2_500_000;
        let expected = START_HOST + (mcu - 500_000) - 6_000;
        assert_eq!(al.align(steady, mcu, true), Some(expected));
    }

    #[test]
    fn test_seed_offset_applied_once() {
        let video = VideoSync::new();
        video.set_start_offset_ns(1_500);

        let mut al = ClockAligner::new();
        al.seed_offset(&video);
        al.seed_offset(&video);
        assert_eq!(al.sync_offset_ns(), 1_500);

        al.align(START_HOST, 1_000_000, true);
        assert_eq!(
            al.align(START_HOST + 10, 2_000_000, true),
            Some(START_HOST - 1_500 + 1_000_000)
        );
    }

    #[test]
    fn test_wrap_span_matches_tick_scale() {
        assert_eq!(MCU_WRAP_NS, ((1u64 << 32) as f64 * TS_SCALE) as u64);
    }
}
