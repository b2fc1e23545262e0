//! # Plugin Parameters
//!
//! The loopback has a single parameter: how long the delay is. Unlike a
//! musical delay, the delay time here fixes the size of the ring buffer for
//! the whole stream, so it can't be swept while audio runs. The value is
//! read when the host initializes the plugin. Changing it takes effect on
//! the next initialization (e.g. restarting the standalone app, or the
//! host reactivating the plugin).
//!
//! The parameter ID (`#[id = "..."]`) is what hosts store in presets.
//! Never change it once published.

use nih_plug::prelude::*;

use crate::config::DelayConfig;

/// Shortest delay offered. Anything shorter is closer to a comb filter
/// than to hearing yourself back.
pub const MIN_DELAY_SECONDS: f32 = 0.05;

/// Longest delay offered. Ten seconds of 8 channels at 192 kHz is about
/// 60 MB of storage, still allocated once.
pub const MAX_DELAY_SECONDS: f32 = 10.0;

/// All user-facing parameters for the delay loopback.
#[derive(Params)]
pub struct LoopbackParams {
    /// **Delay** in seconds between capture and playback.
    ///
    /// Skewed so the first half of the knob covers the short delays where
    /// small changes are audible. Not automatable: a new value only
    /// applies when the buffer is rebuilt.
    #[id = "delay"]
    pub delay: FloatParam,
}

impl Default for LoopbackParams {
    fn default() -> Self {
        let default_delay = DelayConfig::default().delay_seconds as f32;

        Self {
            delay: FloatParam::new(
                "Delay",
                default_delay,
                FloatRange::Skewed {
                    min: MIN_DELAY_SECONDS,
                    max: MAX_DELAY_SECONDS,
                    factor: FloatRange::skew_factor(-1.0),
                },
            )
            .with_unit(" s")
            .with_step_size(0.01)
            .with_value_to_string(formatters::v2s_f32_rounded(2))
            .non_automatable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The default delay is the same three seconds the core config uses.
    #[test]
    fn test_default_delay() {
        let params = LoopbackParams::default();
        assert!((params.delay.value() - 3.0).abs() < 1e-6);
    }
}
