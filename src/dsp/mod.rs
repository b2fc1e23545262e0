//! # DSP (Digital Signal Processing) Primitives
//!
//! - **`ring_buffer`**: a fixed-length circular store that swaps the oldest
//!   frames out to the output while the newest input frames take their
//!   place. This is the whole signal path of the loopback.

pub mod ring_buffer;
