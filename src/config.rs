//! # Stream Configuration
//!
//! The three numbers that fix the shape of the delay for a whole stream:
//! how long the delay is, how fast samples arrive, and how many channels
//! each frame carries. They are validated once, before any audio flows.
//!
//! ## From seconds to frames
//!
//! ```text
//! capacity_frames = round(delay_seconds * sample_rate)
//! ```
//!
//! At 44100 Hz a 3 second delay holds 132300 frames. For stereo that is
//! 264600 `f32` samples, about 1 MB.

use std::mem::size_of;
use std::num::NonZeroUsize;

use crate::error::{ConfigError, ConfigResult};

/// Largest number of `f32` samples a single allocation can hold.
const MAX_STORAGE_LEN: usize = isize::MAX as usize / size_of::<f32>();

/// Delay, sample rate and channel count for one stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayConfig {
    /// Delay between capture and playback, in seconds.
    pub delay_seconds: f64,

    /// Stream sample rate in Hz, as reported by the host.
    pub sample_rate: f32,

    /// Samples per frame.
    pub channel_count: usize,
}

impl Default for DelayConfig {
    /// Three seconds of mono at 44.1 kHz: long enough to clearly hear
    /// yourself back through a microphone.
    fn default() -> Self {
        Self {
            delay_seconds: 3.0,
            sample_rate: 44100.0,
            channel_count: 1,
        }
    }
}

impl DelayConfig {
    pub fn new(delay_seconds: f64, sample_rate: f32, channel_count: usize) -> Self {
        Self {
            delay_seconds,
            sample_rate,
            channel_count,
        }
    }

    /// Number of frames the ring buffer must hold to produce this delay.
    ///
    /// Fails for non-positive or non-finite inputs and for delays that
    /// round to zero frames (e.g. 10 µs at 44.1 kHz).
    pub fn capacity_frames(&self) -> ConfigResult<NonZeroUsize> {
        // `!(x > 0.0)` also rejects NaN.
        if !(self.delay_seconds > 0.0) || !self.delay_seconds.is_finite() {
            return Err(ConfigError::InvalidDelay(self.delay_seconds));
        }
        if !(self.sample_rate > 0.0) || !self.sample_rate.is_finite() {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }

        let frames = (self.delay_seconds * f64::from(self.sample_rate)).round();
        if frames >= usize::MAX as f64 {
            return Err(self.overflow());
        }

        NonZeroUsize::new(frames as usize).ok_or(ConfigError::ZeroCapacity {
            delay_seconds: self.delay_seconds,
            sample_rate: self.sample_rate,
        })
    }

    /// The channel count, rejecting zero.
    pub fn channels(&self) -> ConfigResult<NonZeroUsize> {
        NonZeroUsize::new(self.channel_count).ok_or(ConfigError::NoChannels)
    }

    /// Total interleaved samples of storage, `capacity_frames * channels`.
    ///
    /// A `Vec` can't hold more than `isize::MAX` bytes, so the sample count
    /// is capped at `isize::MAX / size_of::<f32>()` even on 64-bit targets
    /// where the product itself still fits in a `usize`.
    pub fn storage_len(&self) -> ConfigResult<usize> {
        let frames = self.capacity_frames()?;
        let channels = self.channels()?;
        frames
            .get()
            .checked_mul(channels.get())
            .filter(|&len| len <= MAX_STORAGE_LEN)
            .ok_or_else(|| self.overflow())
    }

    fn overflow(&self) -> ConfigError {
        ConfigError::CapacityOverflow {
            delay_seconds: self.delay_seconds,
            sample_rate: self.sample_rate,
            channel_count: self.channel_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Capacity is the rounded product of delay and rate.
    #[test]
    fn test_capacity_is_rounded_product() {
        let cases = [
            (3.0, 44100.0, 132_300),
            (0.5, 48000.0, 24_000),
            (0.1, 44100.0, 4_410),
            // 0.00001 * 44100 = 0.441 -> rounds to 0, covered below.
            // 0.00002 * 44100 = 0.882 -> rounds up to 1.
            (0.00002, 44100.0, 1),
            // 1.5 frames rounds away from zero.
            (1.5, 1.0, 2),
            (2.4, 1.0, 2),
        ];

        for (delay, rate, expected) in cases {
            let config = DelayConfig::new(delay, rate, 1);
            let frames = config.capacity_frames().expect("valid config");
            assert_eq!(
                frames.get(),
                expected,
                "delay {delay} s at {rate} Hz should hold {expected} frames"
            );
        }
    }

    /// A delay too short for the sample rate is rejected.
    #[test]
    fn test_zero_capacity_is_rejected() {
        let config = DelayConfig::new(0.00001, 44100.0, 1);
        assert_eq!(
            config.capacity_frames(),
            Err(ConfigError::ZeroCapacity {
                delay_seconds: 0.00001,
                sample_rate: 44100.0,
            })
        );
    }

    /// Zero, negative and NaN parameters never reach the allocation.
    #[test]
    fn test_non_positive_parameters_are_rejected() {
        assert_eq!(
            DelayConfig::new(0.0, 44100.0, 1).capacity_frames(),
            Err(ConfigError::InvalidDelay(0.0))
        );
        assert_eq!(
            DelayConfig::new(-1.0, 44100.0, 1).capacity_frames(),
            Err(ConfigError::InvalidDelay(-1.0))
        );
        assert!(matches!(
            DelayConfig::new(f64::NAN, 44100.0, 1).capacity_frames(),
            Err(ConfigError::InvalidDelay(_))
        ));
        assert_eq!(
            DelayConfig::new(1.0, 0.0, 1).capacity_frames(),
            Err(ConfigError::InvalidSampleRate(0.0))
        );
        assert_eq!(
            DelayConfig::new(1.0, -48000.0, 1).capacity_frames(),
            Err(ConfigError::InvalidSampleRate(-48000.0))
        );
        assert_eq!(
            DelayConfig::new(1.0, 44100.0, 0).channels(),
            Err(ConfigError::NoChannels)
        );
    }

    /// Infinite delays and absurd channel counts report overflow instead
    /// of attempting a giant allocation.
    #[test]
    fn test_overflow_is_rejected() {
        assert!(matches!(
            DelayConfig::new(f64::INFINITY, 44100.0, 1).capacity_frames(),
            Err(ConfigError::InvalidDelay(_))
        ));
        assert!(matches!(
            DelayConfig::new(1.0e30, 44100.0, 1).capacity_frames(),
            Err(ConfigError::CapacityOverflow { .. })
        ));
        assert!(matches!(
            DelayConfig::new(1.0, 44100.0, usize::MAX).storage_len(),
            Err(ConfigError::CapacityOverflow { .. })
        ));
    }

    /// A frame count that fits in `usize` but not in one allocation is
    /// rejected too. 1e14 s at 44.1 kHz is 4.41e18 samples, above
    /// `isize::MAX / 4` (about 2.3e18).
    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_storage_larger_than_an_allocation_is_rejected() {
        let config = DelayConfig::new(1.0e14, 44100.0, 1);
        assert!(config.capacity_frames().is_ok());
        assert!(matches!(
            config.storage_len(),
            Err(ConfigError::CapacityOverflow { .. })
        ));

        // Huge but allocatable sizes still pass validation.
        let frames = 1_usize << 40;
        let config = DelayConfig::new(frames as f64, 1.0, 2);
        assert!(frames * 2 <= MAX_STORAGE_LEN);
        assert_eq!(config.storage_len(), Ok(frames * 2));
    }

    /// Storage holds one sample per channel per frame.
    #[test]
    fn test_storage_len() {
        let config = DelayConfig::new(0.5, 48000.0, 2);
        assert_eq!(config.storage_len(), Ok(48_000));
    }

    /// The defaults describe a valid stream.
    #[test]
    fn test_default_is_valid() {
        let config = DelayConfig::default();
        assert_eq!(config.capacity_frames().map(NonZeroUsize::get), Ok(132_300));
        assert_eq!(config.channels().map(NonZeroUsize::get), Ok(1));
    }
}
