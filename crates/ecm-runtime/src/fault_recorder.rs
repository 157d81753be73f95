//! Fault frame recording for postmortem diagnosis.
//!
//! A pre-allocated ring buffer captures per-drive state at each cycle. When a
//! drive reports a failure kind, the last N frames are retained so an
//! operator can see the cycles leading up to it without attaching a live
//! debugger to the real-time thread.
//!
//! - **Pre-allocated**: the buffer is sized once at startup, no heap activity
//!   on the cyclic path.
//! - **Single writer**: the Cyclic Engine is the only caller, so no
//!   synchronization is needed.
//! - **Freeze on fault**: once a fault frame is recorded the buffer stops
//!   accepting new frames, preserving the lead-up context until read.

use ecm_common::error::LastFailureKind;
use ecm_common::status::DriveStatus;
use static_assertions::const_assert;
use std::time::Duration;

/// Default number of fault frames to retain.
pub const DEFAULT_FAULT_FRAME_COUNT: usize = 64;

// The ring buffer pre-allocates `capacity` frames up front; keep a single
// snapshot small so a default-sized recorder stays a bounded, predictable
// allocation regardless of how many drives a frame ends up holding.
const_assert!(std::mem::size_of::<DriveSnapshot>() <= 64);

/// Per-drive snapshot captured in one cycle frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveSnapshot {
    /// Bus position of this drive.
    pub position: u16,
    /// Raw statusword (0x6041) at capture time.
    pub statusword: u16,
    /// Modes-of-operation display (0x6061) at capture time.
    pub mode_display: i8,
    /// Actual position (0x6064), in user units.
    pub position_actual: f64,
    /// Drive-reported fault code, if any.
    pub fault_code: Option<u16>,
    /// Most recent failure kind recorded for this drive.
    pub last_failure: LastFailureKind,
}

impl From<&DriveStatus> for DriveSnapshot {
    fn from(status: &DriveStatus) -> Self {
        Self {
            position: status.position,
            statusword: status.statusword,
            mode_display: status.mode_display,
            position_actual: status.position_actual,
            fault_code: status.fault_code,
            last_failure: status.last_failure,
        }
    }
}

/// A single frame of fault recorder data.
#[derive(Debug, Clone, Default)]
pub struct FaultFrame {
    /// Cycle number when this frame was captured.
    pub cycle: u64,
    /// Timestamp in nanoseconds since recorder start.
    pub timestamp_ns: u64,
    /// Cycle execution time.
    pub execution_time: Duration,
    /// Whether this cycle overran its deadline.
    pub overrun: bool,
    /// Working counter observed this cycle, if the network is not SDO-only.
    pub wkc: Option<u16>,
    /// Expected working counter for the configured topology.
    pub expected_wkc: Option<u16>,
    /// Per-drive snapshots, in configured drive order.
    pub drives: Vec<DriveSnapshot>,
    /// Which drive (if any) triggered this frame to be recorded as a fault.
    pub fault_position: Option<u16>,
    /// Whether this frame has been populated.
    pub valid: bool,
}

impl FaultFrame {
    fn new(cycle: u64, timestamp_ns: u64, execution_time: Duration, overrun: bool) -> Self {
        Self {
            cycle,
            timestamp_ns,
            execution_time,
            overrun,
            valid: true,
            ..Default::default()
        }
    }
}

/// Pre-allocated ring buffer for fault frame recording.
#[derive(Debug)]
pub struct FaultRecorder {
    frames: Box<[FaultFrame]>,
    write_pos: usize,
    frame_count: usize,
    start_time: std::time::Instant,
    frozen: bool,
    fault_frame_index: Option<usize>,
}

impl FaultRecorder {
    /// Create a new fault recorder with the specified capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let frames: Vec<FaultFrame> = (0..capacity).map(|_| FaultFrame::default()).collect();

        Self {
            frames: frames.into_boxed_slice(),
            write_pos: 0,
            frame_count: 0,
            start_time: std::time::Instant::now(),
            frozen: false,
            fault_frame_index: None,
        }
    }

    /// Create a new fault recorder with default capacity.
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_FAULT_FRAME_COUNT)
    }

    /// Maximum number of frames the recorder holds.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Number of valid frames currently recorded.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frame_count.min(self.frames.len())
    }

    /// Whether recording is frozen (a fault frame has been captured).
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Record a normal cycle frame, returning it for the caller to populate
    /// with drive snapshots. Returns `None` once frozen.
    pub fn record_cycle(
        &mut self,
        cycle: u64,
        execution_time: Duration,
        overrun: bool,
        drives: Vec<DriveSnapshot>,
    ) -> Option<&FaultFrame> {
        if self.frozen {
            return None;
        }

        let timestamp_ns = self.start_time.elapsed().as_nanos() as u64;
        let idx = self.write_pos;

        let mut frame = FaultFrame::new(cycle, timestamp_ns, execution_time, overrun);
        frame.drives = drives;
        self.frames[idx] = frame;

        self.write_pos = (self.write_pos + 1) % self.frames.len();
        self.frame_count = self.frame_count.saturating_add(1);

        Some(&self.frames[idx])
    }

    /// Record working counter values on the most recently written frame.
    pub fn set_last_wkc(&mut self, actual: u16, expected: u16) {
        if self.frozen {
            return;
        }
        let idx = (self.write_pos + self.frames.len() - 1) % self.frames.len();
        self.frames[idx].wkc = Some(actual);
        self.frames[idx].expected_wkc = Some(expected);
    }

    /// Record a fault frame and freeze the recorder, preserving the lead-up
    /// context already captured by prior `record_cycle` calls.
    pub fn record_fault(
        &mut self,
        cycle: u64,
        fault_position: u16,
        execution_time: Duration,
        drives: Vec<DriveSnapshot>,
    ) {
        if self.frozen {
            return;
        }

        let timestamp_ns = self.start_time.elapsed().as_nanos() as u64;
        let idx = self.write_pos;

        let mut frame = FaultFrame::new(cycle, timestamp_ns, execution_time, false);
        frame.drives = drives;
        frame.fault_position = Some(fault_position);
        self.frames[idx] = frame;
        self.fault_frame_index = Some(idx);

        self.write_pos = (self.write_pos + 1) % self.frames.len();
        self.frame_count = self.frame_count.saturating_add(1);
        self.frozen = true;
    }

    /// The frame that triggered the freeze, if any.
    #[must_use]
    pub fn fault_frame(&self) -> Option<&FaultFrame> {
        self.fault_frame_index.map(|idx| &self.frames[idx])
    }

    /// Frames in chronological order (oldest first), up to and including the
    /// fault frame.
    pub fn frames_chronological(&self) -> impl Iterator<Item = &FaultFrame> {
        let count = self.frame_count();
        let cap = self.frames.len();

        let start = if self.frame_count > cap {
            self.write_pos
        } else {
            0
        };

        (0..count).map(move |i| {
            let idx = (start + i) % cap;
            &self.frames[idx]
        })
    }

    /// The N most recently written frames, newest first.
    pub fn recent_frames(&self, count: usize) -> Vec<&FaultFrame> {
        let actual_count = count.min(self.frame_count());
        let cap = self.frames.len();

        (0..actual_count)
            .map(|i| {
                let idx = if self.write_pos == 0 {
                    cap - 1 - i
                } else {
                    (self.write_pos + cap - 1 - i) % cap
                };
                &self.frames[idx]
            })
            .filter(|f| f.valid)
            .collect()
    }

    /// Clear all frames and unfreeze the recorder.
    pub fn reset(&mut self) {
        for frame in self.frames.iter_mut() {
            *frame = FaultFrame::default();
        }
        self.write_pos = 0;
        self.frame_count = 0;
        self.start_time = std::time::Instant::now();
        self.frozen = false;
        self.fault_frame_index = None;
    }

    /// A loggable summary of the recorded fault, if any.
    #[must_use]
    pub fn fault_summary(&self) -> Option<FaultSummary> {
        let frame = self.fault_frame()?;
        let position = frame.fault_position?;
        let drive = frame.drives.iter().find(|d| d.position == position)?;

        Some(FaultSummary {
            cycle: frame.cycle,
            position,
            last_failure: drive.last_failure,
            statusword: drive.statusword,
            fault_code: drive.fault_code,
            wkc_mismatch: frame
                .wkc
                .zip(frame.expected_wkc)
                .is_some_and(|(actual, expected)| actual != expected),
            frames_available: self.frame_count(),
        })
    }
}

/// Summary of a recorded fault for logging.
#[derive(Debug, Clone)]
pub struct FaultSummary {
    /// Cycle at which the fault was recorded.
    pub cycle: u64,
    /// Bus position of the drive that triggered the fault frame.
    pub position: u16,
    /// Recorded failure kind for that drive.
    pub last_failure: LastFailureKind,
    /// Statusword at the time of the fault.
    pub statusword: u16,
    /// Fault code reported by the drive, if any.
    pub fault_code: Option<u16>,
    /// Whether a working counter mismatch coincided with the fault.
    pub wkc_mismatch: bool,
    /// Number of frames available for analysis.
    pub frames_available: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(position: u16, last_failure: LastFailureKind) -> DriveSnapshot {
        DriveSnapshot {
            position,
            statusword: 0,
            mode_display: 0,
            position_actual: 0.0,
            fault_code: None,
            last_failure,
        }
    }

    #[test]
    fn recorder_starts_empty_and_unfrozen() {
        let recorder = FaultRecorder::new(10);
        assert_eq!(recorder.capacity(), 10);
        assert_eq!(recorder.frame_count(), 0);
        assert!(!recorder.is_frozen());
    }

    #[test]
    fn record_cycle_accumulates_frames() {
        let mut recorder = FaultRecorder::new(10);
        recorder.record_cycle(1, Duration::from_micros(120), false, vec![snapshot(0, LastFailureKind::None)]);
        assert_eq!(recorder.frame_count(), 1);
        assert!(!recorder.is_frozen());
    }

    #[test]
    fn ring_buffer_wraps_and_keeps_most_recent() {
        let mut recorder = FaultRecorder::new(4);
        for i in 0..10 {
            recorder.record_cycle(i, Duration::ZERO, false, vec![]);
        }
        assert_eq!(recorder.frame_count(), 4);

        let recent = recorder.recent_frames(4);
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].cycle, 9);
        assert_eq!(recent[3].cycle, 6);
    }

    #[test]
    fn fault_freezes_and_blocks_further_recording() {
        let mut recorder = FaultRecorder::new(10);
        for i in 0..5 {
            recorder.record_cycle(i, Duration::ZERO, false, vec![snapshot(0, LastFailureKind::None)]);
        }

        recorder.record_fault(5, 0, Duration::ZERO, vec![snapshot(0, LastFailureKind::DriveFault)]);

        assert!(recorder.is_frozen());
        let frame = recorder.fault_frame().unwrap();
        assert_eq!(frame.cycle, 5);
        assert_eq!(frame.fault_position, Some(0));

        assert!(recorder
            .record_cycle(6, Duration::ZERO, false, vec![])
            .is_none());
    }

    #[test]
    fn fault_summary_reports_failing_drive() {
        let mut recorder = FaultRecorder::new(10);
        recorder.record_cycle(41, Duration::ZERO, false, vec![snapshot(2, LastFailureKind::None)]);
        recorder.record_fault(
            42,
            2,
            Duration::ZERO,
            vec![snapshot(2, LastFailureKind::PpStallFailed)],
        );
        recorder.set_last_wkc(3, 4);

        let summary = recorder.fault_summary().unwrap();
        assert_eq!(summary.cycle, 42);
        assert_eq!(summary.position, 2);
        assert_eq!(summary.last_failure, LastFailureKind::PpStallFailed);
        assert!(summary.wkc_mismatch);
    }

    #[test]
    fn chronological_iteration_follows_wrap() {
        let mut recorder = FaultRecorder::new(4);
        for i in 0..6 {
            recorder.record_cycle(i, Duration::ZERO, false, vec![]);
        }
        let cycles: Vec<u64> = recorder.frames_chronological().map(|f| f.cycle).collect();
        assert_eq!(cycles, vec![2, 3, 4, 5]);
    }

    #[test]
    fn reset_clears_frames_and_unfreezes() {
        let mut recorder = FaultRecorder::new(10);
        for i in 0..5 {
            recorder.record_cycle(i, Duration::ZERO, false, vec![]);
        }
        recorder.record_fault(5, 0, Duration::ZERO, vec![snapshot(0, LastFailureKind::HomingFailed)]);
        assert!(recorder.is_frozen());

        recorder.reset();

        assert!(!recorder.is_frozen());
        assert_eq!(recorder.frame_count(), 0);
        assert!(recorder.fault_frame().is_none());
    }
}
