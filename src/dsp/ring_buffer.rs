//! # Delay Ring Buffer
//!
//! A fixed delay is a queue exactly `capacity_frames` long: every frame that
//! goes in pushes the oldest frame out. Stored in a ring, that queue needs
//! only one cursor. The slot under the cursor holds the oldest frame, so
//! each step is a swap:
//!
//! 1. Read the frame at `write_cursor` into the output (it is exactly
//!    `capacity_frames` frames old).
//! 2. Overwrite that slot with the new input frame.
//! 3. Advance `write_cursor`, wrapping to 0 at the end of storage.
//!
//! ## Whole blocks, not single frames
//!
//! Hosts deliver audio a block at a time. Instead of repeating the swap
//! with a modulo per frame, a block is split into contiguous segments that
//! end either at the end of the block or at the end of storage:
//!
//! ```text
//! storage:  [ . . . . . . . . . . ]      capacity_frames = 10
//!                           ^ write_cursor = 7
//!
//! block of 6 frames:   segment 1 = slots 7..10  (3 frames)
//!                      segment 2 = slots 0..3   (3 frames, after wrap)
//! ```
//!
//! Each segment is two bulk copies (storage → output, then input → storage)
//! or a single `swap_with_slice` for in-place processing. A block longer
//! than the whole buffer just keeps looping; the loop runs at most
//! `ceil(frame_count / capacity_frames) + 1` times.
//!
//! ## Layout
//!
//! Storage is interleaved, frame-major: frame `f` of a stereo buffer lives
//! at `storage[2 * f]` (left) and `storage[2 * f + 1]` (right). Blocks use
//! the same layout, which keeps every segment one contiguous slice.

use std::num::NonZeroUsize;
use std::ops::Range;

use crate::config::DelayConfig;
use crate::error::{ConfigError, ConfigResult, ContractViolation};

/// A fixed-length delay for interleaved multi-channel audio.
///
/// All memory is allocated in [`new()`](Self::new). The processing methods
/// only copy between preallocated slices, so they are safe to call from a
/// real-time audio thread.
#[derive(Debug, Clone)]
pub struct DelayRingBuffer {
    /// `capacity_frames * channel_count` samples, starting as silence.
    storage: Vec<f32>,

    capacity_frames: NonZeroUsize,

    channel_count: NonZeroUsize,

    /// Next frame to be read out and overwritten. Always strictly less
    /// than `capacity_frames`.
    write_cursor: usize,
}

impl DelayRingBuffer {
    /// Allocate a silent buffer sized for `config`.
    ///
    /// This is the only place the buffer allocates. Call it before the
    /// stream starts, never from the audio callback.
    ///
    /// The allocation is fallible: a delay too long for the available
    /// memory is reported as [`ConfigError::CapacityOverflow`] instead of
    /// aborting the process.
    pub fn new(config: &DelayConfig) -> ConfigResult<Self> {
        let capacity_frames = config.capacity_frames()?;
        let channel_count = config.channels()?;
        let storage_len = config.storage_len()?;

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(storage_len)
            .map_err(|_| ConfigError::CapacityOverflow {
                delay_seconds: config.delay_seconds,
                sample_rate: config.sample_rate,
                channel_count: config.channel_count,
            })?;
        storage.resize(storage_len, 0.0);

        Ok(Self {
            storage,
            capacity_frames,
            channel_count,
            write_cursor: 0,
        })
    }

    /// Delay the interleaved `input` block into `output`.
    ///
    /// Both blocks must hold exactly `frame_count * channel_count` samples.
    /// Output frame `i` receives the frame that was stored `capacity_frames`
    /// frames before input frame `i` arrived, which is silence until the
    /// buffer has filled once.
    ///
    /// On a shape mismatch nothing is read or written and the violation is
    /// returned.
    pub fn process(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        frame_count: usize,
    ) -> Result<(), ContractViolation> {
        let expected = self.block_len(frame_count)?;
        if input.len() != expected {
            return Err(ContractViolation::InputShape {
                expected,
                actual: input.len(),
            });
        }
        if output.len() != expected {
            return Err(ContractViolation::OutputShape {
                expected,
                actual: output.len(),
            });
        }

        self.for_each_segment(frame_count, |storage, block| {
            // Read before write: the old frames leave before the new ones
            // take their slots.
            output[block.clone()].copy_from_slice(storage);
            storage.copy_from_slice(&input[block]);
        });

        Ok(())
    }

    /// Delay an interleaved block in place.
    ///
    /// `block` holds the captured input on entry and the delayed output on
    /// return. This is the same transform as [`process()`](Self::process),
    /// done as one swap per segment.
    pub fn process_in_place(
        &mut self,
        block: &mut [f32],
        frame_count: usize,
    ) -> Result<(), ContractViolation> {
        let expected = self.block_len(frame_count)?;
        if block.len() != expected {
            return Err(ContractViolation::InputShape {
                expected,
                actual: block.len(),
            });
        }

        self.for_each_segment(frame_count, |storage, range| {
            storage.swap_with_slice(&mut block[range]);
        });

        Ok(())
    }

    /// Refill the buffer with silence and move the cursor back to 0.
    pub fn clear(&mut self) {
        self.storage.fill(0.0);
        self.write_cursor = 0;
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames.get()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count.get()
    }

    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    /// The raw interleaved history, starting at storage slot 0 (not at the
    /// cursor).
    #[cfg(test)]
    pub(crate) fn storage(&self) -> &[f32] {
        &self.storage
    }

    /// `true` while every stored sample is exactly zero.
    pub fn is_silent(&self) -> bool {
        self.storage.iter().all(|&sample| sample == 0.0)
    }

    /// The delay this buffer produces at `sample_rate`, in seconds.
    pub fn delay_seconds(&self, sample_rate: f32) -> f64 {
        self.capacity_frames.get() as f64 / f64::from(sample_rate)
    }

    /// Samples in a block of `frame_count` frames.
    fn block_len(&self, frame_count: usize) -> Result<usize, ContractViolation> {
        frame_count
            .checked_mul(self.channel_count.get())
            .ok_or(ContractViolation::FrameCountOverflow { frame_count })
    }

    /// Walk `frame_count` frames starting at the cursor, one contiguous
    /// segment at a time.
    ///
    /// `visit` receives the storage slots of the segment and the matching
    /// sample range within the caller's block. The cursor is advanced and
    /// wrapped after every segment, so it never rests at `capacity_frames`.
    fn for_each_segment<F>(&mut self, frame_count: usize, mut visit: F)
    where
        F: FnMut(&mut [f32], Range<usize>),
    {
        let capacity = self.capacity_frames.get();
        let channels = self.channel_count.get();
        let mut done = 0;

        while done < frame_count {
            // Step 1: SIZE the segment.
            //
            // It runs from the cursor to whichever comes first: the end of
            // the block, or the end of storage. With capacity 10, cursor 7
            // and 6 frames left, that is 3 frames (slots 7, 8, 9). The
            // other 3 are handled on the next pass, after the wrap.
            let segment = (frame_count - done).min(capacity - self.write_cursor);

            // Step 2: MAP frames to samples.
            //
            // Both storage and block are interleaved, so frame `f` starts at
            // sample `f * channels`. A run of whole frames is therefore one
            // contiguous run of samples on both sides, which is what lets a
            // segment be a single slice copy or swap.
            let slots = self.write_cursor * channels..(self.write_cursor + segment) * channels;
            let block = done * channels..(done + segment) * channels;

            // Step 3: SWAP. The caller reads the oldest frames out of
            // `slots` and leaves the newest frames in their place.
            visit(&mut self.storage[slots], block);

            // Step 4: ADVANCE, wrapping right away.
            //
            // A segment that ends exactly at the end of storage leaves the
            // cursor at 0, never at `capacity`, so the next segment (or the
            // next call) starts from the front. Every pass consumes at least
            // one frame, so the loop always terminates.
            done += segment;
            self.write_cursor += segment;
            if self.write_cursor == capacity {
                self.write_cursor = 0;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
