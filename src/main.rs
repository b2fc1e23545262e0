//! Standalone host for the delay loopback.
//!
//! nih-plug's standalone wrapper opens the audio devices and calls the
//! plugin's `process()` once per period. Run with `--help` for the device,
//! sample rate and period size flags; an unknown device name prints the
//! available devices.

use delay_loopback::DelayLoopback;
use nih_plug::prelude::*;

fn main() {
    nih_export_standalone::<DelayLoopback>();
}
