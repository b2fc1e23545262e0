//! # Buffer Monitor
//!
//! The ring buffer belongs to the audio thread and nobody else may read it
//! while audio is running. Anything that wants to show buffer state (a level
//! meter, a log line at shutdown) reads a copy instead.
//!
//! At the end of every callback the audio thread tries to publish a
//! [`BufferSnapshot`] with `try_lock`. If a reader happens to hold the lock
//! at that moment the publish is skipped; the next callback will catch up.
//! The audio thread never waits.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::ContractViolation;

/// A copy of the delay's state at the end of one callback.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BufferSnapshot {
    pub capacity_frames: usize,
    pub channel_count: usize,
    pub write_cursor: usize,

    /// Frames pushed through the buffer since the stream started.
    pub frames_processed: u64,

    /// Largest absolute input sample in the last callback.
    pub input_peak: f32,

    /// Largest absolute output sample in the last callback.
    pub output_peak: f32,

    /// Most recent block the buffer refused, if any.
    pub last_violation: Option<ContractViolation>,
}

/// Shared between the audio thread (writer) and any number of readers.
#[derive(Debug, Default)]
pub struct LoopbackMonitor {
    snapshot: Mutex<BufferSnapshot>,
    contract_violations: AtomicU64,
}

impl LoopbackMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published snapshot without blocking.
    ///
    /// Returns `false` when a reader held the lock and the snapshot was
    /// dropped.
    pub fn publish(&self, snapshot: BufferSnapshot) -> bool {
        match self.snapshot.try_lock() {
            Some(mut published) => {
                *published = snapshot;
                true
            }
            None => false,
        }
    }

    /// Count a rejected block. Lock-free, so it's safe on the audio thread.
    pub fn record_violation(&self) {
        self.contract_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy out the latest snapshot.
    pub fn snapshot(&self) -> BufferSnapshot {
        *self.snapshot.lock()
    }

    pub fn contract_violations(&self) -> u64 {
        self.contract_violations.load(Ordering::Relaxed)
    }

    /// Forget everything from the previous stream. Only called from
    /// `initialize()`, while no audio is running.
    pub fn reset(&self) {
        *self.snapshot.lock() = BufferSnapshot::default();
        self.contract_violations.store(0, Ordering::Relaxed);
    }
}

/// Largest absolute sample in `samples`, or 0.0 for an empty slice.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .fold(0.0_f32, |peak, sample| peak.max(sample.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Readers see exactly what the audio thread published.
    #[test]
    fn test_publish_then_read() {
        let monitor = LoopbackMonitor::new();
        let snapshot = BufferSnapshot {
            capacity_frames: 132_300,
            channel_count: 1,
            write_cursor: 512,
            frames_processed: 512,
            input_peak: 0.5,
            output_peak: 0.0,
            last_violation: None,
        };

        assert!(monitor.publish(snapshot));
        assert_eq!(monitor.snapshot(), snapshot);
    }

    /// Publishing while a reader holds the lock gives up instead of
    /// waiting.
    #[test]
    fn test_publish_never_blocks_on_reader() {
        let monitor = LoopbackMonitor::new();
        let held = monitor.snapshot.lock();

        let published = monitor.publish(BufferSnapshot {
            write_cursor: 7,
            ..BufferSnapshot::default()
        });
        assert!(!published);

        drop(held);
        assert_eq!(monitor.snapshot().write_cursor, 0);
    }

    /// Violations are counted and cleared on reset.
    #[test]
    fn test_violation_counter() {
        let monitor = LoopbackMonitor::new();
        monitor.record_violation();
        monitor.record_violation();
        assert_eq!(monitor.contract_violations(), 2);

        monitor.publish(BufferSnapshot {
            last_violation: Some(ContractViolation::ChannelCount {
                expected: 2,
                actual: 1,
            }),
            ..BufferSnapshot::default()
        });
        monitor.reset();
        assert_eq!(monitor.contract_violations(), 0);
        assert_eq!(monitor.snapshot(), BufferSnapshot::default());
    }

    /// Peak is the largest magnitude, sign ignored.
    #[test]
    fn test_peak() {
        assert_eq!(peak(&[]), 0.0);
        assert_eq!(peak(&[0.25, -0.75, 0.5]), 0.75);
        assert_eq!(peak(&[0.0, 0.0]), 0.0);
    }
}
