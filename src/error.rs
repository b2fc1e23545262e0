//! # Error Types
//!
//! Two kinds of failure exist, and they live on different threads:
//!
//! - [`ConfigError`] is raised while building the ring buffer, before the
//!   stream starts. It is reported to the user and the stream never runs.
//! - [`ContractViolation`] is raised on the audio thread when the host hands
//!   over blocks whose shape doesn't match the buffer. It is `Copy` and holds
//!   only integers, so returning it never allocates. Formatting it is left
//!   to a non-real-time thread.

use thiserror::Error;

/// Parameters that cannot produce a valid delay ring buffer.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("delay must be a positive number of seconds, got {0}")]
    InvalidDelay(f64),

    #[error("sample rate must be a positive number of Hz, got {0}")]
    InvalidSampleRate(f32),

    #[error("channel count must be at least 1")]
    NoChannels,

    /// `round(delay_seconds * sample_rate)` came out as zero frames.
    #[error("a delay of {delay_seconds} s at {sample_rate} Hz rounds to zero frames")]
    ZeroCapacity { delay_seconds: f64, sample_rate: f32 },

    #[error("a delay of {delay_seconds} s at {sample_rate} Hz with {channel_count} channel(s) does not fit in memory")]
    CapacityOverflow {
        delay_seconds: f64,
        sample_rate: f32,
        channel_count: usize,
    },
}

/// Result type alias for buffer construction.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// The host supplied blocks that don't match the buffer's shape.
///
/// This is a bug in the host integration, not a runtime condition. The
/// buffer rejects the whole call and leaves its state untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("input block holds {actual} samples, expected {expected}")]
    InputShape { expected: usize, actual: usize },

    #[error("output block holds {actual} samples, expected {expected}")]
    OutputShape { expected: usize, actual: usize },

    #[error("host buffer has {actual} channel(s), the delay was built for {expected}")]
    ChannelCount { expected: usize, actual: usize },

    #[error("{frame_count} frames overflow the addressable sample count")]
    FrameCountOverflow { frame_count: usize },
}
