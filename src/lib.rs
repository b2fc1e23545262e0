//! # Delay Loopback: Hear Yourself N Seconds Later
//!
//! Captures live audio and plays it back after a fixed delay, continuously,
//! built with [nih-plug](https://github.com/robbert-vdh/nih-plug). Runs as an
//! AUv2/VST3/CLAP plugin inside a DAW, or on its own through the standalone
//! binary, which opens an input and an output device directly.
//!
//! ## Signal Flow
//!
//! ```text
//!              host block (planar, one slice per channel)
//!                               │
//!                               ▼
//!                  interleave into scratch frames
//!                               │
//!                               ▼
//!        ┌──────────────────────────────────────────────┐
//!        │  DelayRingBuffer::process_in_place()         │
//!        │  oldest frames out  ⇄  newest frames in      │
//!        └──────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                 de-interleave back into the host block
//!                               │
//!                               ▼
//!                 output = input from `delay` seconds ago
//! ```
//!
//! There is no dry signal, feedback or filtering: what comes out is exactly
//! what went in, `round(delay * sample_rate)` frames later.

pub mod config;
pub mod dsp;
pub mod error;
pub mod monitor;
pub mod params;

use std::num::NonZeroU32;
use std::ops::Range;
use std::sync::Arc;

use nih_plug::prelude::*;

use config::DelayConfig;
use dsp::ring_buffer::DelayRingBuffer;
use error::ContractViolation;
use monitor::{peak, BufferSnapshot, LoopbackMonitor};
use params::LoopbackParams;

/// The main plugin struct.
///
/// The ring buffer is created in `initialize()`, once the host has told us
/// the sample rate and channel count, and from then on it is touched only
/// by `process()` on the audio thread. Other threads look at it through
/// [`LoopbackMonitor`].
pub struct DelayLoopback {
    params: Arc<LoopbackParams>,

    /// Snapshot published at the end of every `process()` call.
    monitor: Arc<LoopbackMonitor>,

    /// `None` until the first successful `initialize()`.
    ring: Option<DelayRingBuffer>,

    /// Interleaved frames for one host block. Sized in `initialize()` from
    /// the host's maximum block size so `process()` never allocates.
    scratch: Vec<f32>,

    /// Frames pushed through the ring since `initialize()`.
    frames_processed: u64,

    last_violation: Option<ContractViolation>,
}

impl Default for DelayLoopback {
    fn default() -> Self {
        Self {
            params: Arc::new(LoopbackParams::default()),
            monitor: Arc::new(LoopbackMonitor::new()),
            ring: None,
            scratch: Vec::new(),
            frames_processed: 0,
            last_violation: None,
        }
    }
}

impl DelayLoopback {
    /// Handle for reading buffer state from outside the audio thread.
    pub fn monitor(&self) -> Arc<LoopbackMonitor> {
        self.monitor.clone()
    }

    /// Rebuild the ring buffer and scratch space for a new stream.
    fn build(
        &mut self,
        config: &DelayConfig,
        max_block_frames: usize,
    ) -> Result<(), error::ConfigError> {
        let ring = match DelayRingBuffer::new(config) {
            Ok(ring) => ring,
            Err(err) => {
                // Never keep streaming through a buffer shaped for the old
                // stream.
                self.ring = None;
                return Err(err);
            }
        };

        // At least one frame, so the chunk loop in `process_channels()`
        // always makes progress.
        self.scratch = vec![0.0; max_block_frames.max(1) * ring.channel_count()];
        self.ring = Some(ring);
        self.frames_processed = 0;
        self.last_violation = None;
        self.monitor.reset();

        Ok(())
    }

    fn publish(&self, input_peak: f32, output_peak: f32) {
        let Some(ring) = &self.ring else {
            return;
        };

        self.monitor.publish(BufferSnapshot {
            capacity_frames: ring.capacity_frames(),
            channel_count: ring.channel_count(),
            write_cursor: ring.write_cursor(),
            frames_processed: self.frames_processed,
            input_peak,
            output_peak,
            last_violation: self.last_violation,
        });
    }

    /// The real-time body of `process()`, working on planar channel slices.
    ///
    /// Each channel slice holds the captured input on entry and receives the
    /// delayed output. The ring stores interleaved frames, so every chunk of
    /// the host block goes through `scratch`:
    ///
    /// 1. **Interleave** the chunk's planar channels into `scratch`.
    /// 2. **Swap** `scratch` through the ring: the oldest buffered frames
    ///    come out, the captured frames take their slots.
    /// 3. **De-interleave** `scratch` back into the host's channels.
    ///
    /// `scratch` was sized for the host's maximum block, so normally there
    /// is one chunk. A host that sends more than it promised just gets
    /// several chunks; the ring doesn't care how its input is split.
    ///
    /// Blocks with the wrong number of channels, or channels of unequal
    /// length, come out as silence and are counted on the monitor. They're
    /// never logged from here because formatting a message allocates.
    fn process_channels(&mut self, channels: &mut [&mut [f32]]) -> ProcessStatus {
        let Some(ring) = self.ring.as_mut() else {
            return ProcessStatus::Normal;
        };

        let channel_count = ring.channel_count();
        let tail = u32::try_from(ring.capacity_frames()).unwrap_or(u32::MAX);
        let samples = channels.first().map_or(0, |channel| channel.len());

        // ─── Reject blocks the ring wasn't built for ───
        //
        // The shape is checked for the whole block up front, so a bad block
        // is rejected before any chunk has been swapped through the ring.
        let violation = if channels.len() != channel_count {
            Some(ContractViolation::ChannelCount {
                expected: channel_count,
                actual: channels.len(),
            })
        } else if channels.iter().any(|channel| channel.len() != samples) {
            Some(ContractViolation::InputShape {
                expected: samples * channel_count,
                actual: channels.iter().map(|channel| channel.len()).sum(),
            })
        } else {
            None
        };

        if let Some(violation) = violation {
            self.last_violation = Some(violation);
            self.monitor.record_violation();
            for channel in channels.iter_mut() {
                channel.fill(0.0);
            }
            self.publish(0.0, 0.0);
            return ProcessStatus::Tail(tail);
        }

        let max_chunk_frames = self.scratch.len() / channel_count;
        let mut input_peak = 0.0_f32;
        let mut output_peak = 0.0_f32;
        let mut start = 0;

        while start < samples {
            let frames = (samples - start).min(max_chunk_frames);
            let chunk = start..start + frames;
            let interleaved = &mut self.scratch[..frames * channel_count];

            // Step 1: INTERLEAVE the captured input into scratch frames.
            interleave(channels, chunk.clone(), interleaved);
            input_peak = input_peak.max(peak(interleaved));

            // Step 2: SWAP the chunk through the ring. After this call,
            // `interleaved` holds the frames captured `capacity_frames`
            // frames ago (silence until the ring has filled once).
            //
            // The shape was checked above, so this only fails if the
            // scratch math is wrong. Silence is the only safe output then.
            if let Err(violation) = ring.process_in_place(interleaved, frames) {
                self.last_violation = Some(violation);
                self.monitor.record_violation();
                interleaved.fill(0.0);
            } else {
                self.frames_processed += frames as u64;
            }
            output_peak = output_peak.max(peak(interleaved));

            // Step 3: DE-INTERLEAVE the delayed frames back into the
            // host's channels, overwriting the input in place.
            deinterleave(interleaved, channels, chunk);

            start += frames;
        }

        self.publish(input_peak, output_peak);

        // Keep the host calling us after the input goes quiet until the
        // whole buffered history has played out.
        ProcessStatus::Tail(tail)
    }
}

impl Plugin for DelayLoopback {
    const NAME: &'static str = "Delay Loopback";
    const VENDOR: &'static str = "Loveless Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "steve.loveless@gmail.com";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Mono comes first: the standalone wrapper picks the first layout, and
    // the usual source is a single microphone.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Called before streaming starts, and again whenever the host changes
    /// the sample rate, block size or channel layout. This is the only
    /// place memory is allocated.
    ///
    /// Returning `false` tells the host the stream can't start, which is
    /// what happens when the delay rounds to zero frames at this rate.
    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        let channel_count = audio_io_layout
            .main_input_channels
            .map(|c| c.get() as usize)
            .unwrap_or(0);

        let config = DelayConfig::new(
            f64::from(self.params.delay.value()),
            buffer_config.sample_rate,
            channel_count,
        );

        if let Err(err) = self.build(&config, buffer_config.max_buffer_size as usize) {
            nih_error!("Cannot start the delay loopback: {err}");
            return false;
        }

        if let Some(ring) = &self.ring {
            nih_log!(
                "Delay loopback: {:.3} s ({} frames) at {} Hz, {} channel(s)",
                ring.delay_seconds(buffer_config.sample_rate),
                ring.capacity_frames(),
                buffer_config.sample_rate,
                ring.channel_count()
            );
        }

        true
    }

    /// Playback stopped: forget the buffered history so old audio doesn't
    /// come out when the stream resumes.
    fn reset(&mut self) {
        if let Some(ring) = &mut self.ring {
            ring.clear();
        }
    }

    /// One host period. Swaps the block's frames through the ring buffer.
    ///
    /// nih-plug hands us planar channels (one slice per channel) with the
    /// input already in place, and expects the output in the same slices.
    /// All the work happens in [`DelayLoopback::process_channels()`].
    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        self.process_channels(buffer.as_slice())
    }

    /// The stream stopped. Not on the audio thread, so logging is fine.
    fn deactivate(&mut self) {
        let snapshot = self.monitor.snapshot();
        nih_log!(
            "Delay loopback stopped after {} frames",
            snapshot.frames_processed
        );

        // Whatever is still in the ring never made it out of the speakers.
        if let Some(ring) = &self.ring {
            if !ring.is_silent() {
                nih_log!(
                    "Discarding up to {} frames of buffered audio",
                    ring.capacity_frames()
                );
            }
        }

        let violations = self.monitor.contract_violations();
        if violations > 0 {
            match snapshot.last_violation {
                Some(violation) => {
                    nih_warn!("{violations} block(s) were rejected, last one: {violation}")
                }
                None => nih_warn!("{violations} block(s) were rejected"),
            }
        }
    }
}

/// Copy `frames` of every planar host channel into interleaved frames.
///
/// Planar (what the host gives us):
///
/// ```text
/// left:  [L0, L1, L2]
/// right: [R0, R1, R2]
/// ```
///
/// Interleaved (what the ring stores):
///
/// ```text
/// [L0, R0, L1, R1, L2, R2]
/// ```
///
/// Channel `c` of frame `f` lands at `f * channel_count + c`, so walking
/// the interleaved slice from offset `c` in steps of `channel_count` visits
/// exactly that channel's samples in order.
fn interleave(channels: &[&mut [f32]], frames: Range<usize>, interleaved: &mut [f32]) {
    let channel_count = channels.len();
    for (channel, samples) in channels.iter().enumerate() {
        for (slot, &sample) in interleaved
            .iter_mut()
            .skip(channel)
            .step_by(channel_count)
            .zip(&samples[frames.clone()])
        {
            *slot = sample;
        }
    }
}

/// The inverse of [`interleave()`]: copy interleaved frames back into
/// `frames` of every planar host channel.
fn deinterleave(interleaved: &[f32], channels: &mut [&mut [f32]], frames: Range<usize>) {
    let channel_count = channels.len();
    for (channel, samples) in channels.iter_mut().enumerate() {
        for (sample, &slot) in samples[frames.clone()]
            .iter_mut()
            .zip(interleaved.iter().skip(channel).step_by(channel_count))
        {
            *sample = slot;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Plugin format trait implementations
// ─────────────────────────────────────────────────────────────────────

impl ClapPlugin for DelayLoopback {
    const CLAP_ID: &'static str = "com.loveless-audio.delay-loopback";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("Plays the input back after a fixed delay");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Mono,
        ClapFeature::Stereo,
        ClapFeature::Delay,
    ];
}

impl Vst3Plugin for DelayLoopback {
    // Must be exactly 16 ASCII bytes.
    const VST3_CLASS_ID: [u8; 16] = *b"DelayLoopbk_v001";

    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Delay];
}

// ─────────────────────────────────────────────────────────────────────
// Export macros
// ─────────────────────────────────────────────────────────────────────
//
// nih_export_clap! exports the `clap_entry` symbol for CLAP hosts.
// nih_export_vst3! exports `GetPluginFactory` for VST3 hosts.
// clap_wrapper re-exports the CLAP entry point as AUv2 for Logic Pro.

nih_export_clap!(DelayLoopback);
nih_export_vst3!(DelayLoopback);

clap_wrapper::export_auv2!();
