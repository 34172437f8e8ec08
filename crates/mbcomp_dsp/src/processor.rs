//! Audio Processor Trait
//!
//! Defines the prepare/process/reset lifecycle shared by every stage of the
//! multiband pipeline (crossover filters, compressors, gain stages).

use crate::buffer::AudioBuffer;
use crate::error::DspError;

pub const MIN_SAMPLE_RATE: f32 = 8_000.0;
pub const MAX_SAMPLE_RATE: f32 = 384_000.0;
pub const MAX_CHANNELS: usize = 8;
pub const MAX_BLOCK_SIZE: usize = 16_384;

/// Stream metadata handed to processors at prepare-time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    pub sample_rate: f32,
    pub channels: usize,
    pub max_block_size: usize,
}

impl ProcessSpec {
    pub fn new(sample_rate: f32, channels: usize, max_block_size: usize) -> Self {
        Self {
            sample_rate,
            channels,
            max_block_size,
        }
    }

    /// Validate the spec before any buffers are allocated from it
    pub fn validate(&self) -> Result<(), DspError> {
        if !self.sample_rate.is_finite()
            || self.sample_rate < MIN_SAMPLE_RATE
            || self.sample_rate > MAX_SAMPLE_RATE
        {
            return Err(DspError::InvalidSampleRate(self.sample_rate));
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(DspError::InvalidChannelCount(self.channels));
        }
        if self.max_block_size == 0 || self.max_block_size > MAX_BLOCK_SIZE {
            return Err(DspError::InvalidBlockSize(self.max_block_size));
        }
        Ok(())
    }
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self::new(48_000.0, 2, 512)
    }
}

/// Trait for audio processors in the DSP chain
///
/// # Real-time Safety Contract
///
/// `prepare()` is the only place allowed to allocate. Implementors MUST
/// follow these rules in `process()`:
/// - NO heap allocations (no Vec::push, no Box::new, no String)
/// - NO syscalls (no file I/O, no network, no mutex locks)
/// - NO unbounded loops
/// - Constant or O(n) time complexity where n = buffer size
///
/// Violating these rules causes audio dropouts ("glitches").
pub trait AudioProcessor: Send {
    /// Size internal state for the given stream and clear it
    fn prepare(&mut self, spec: &ProcessSpec);

    /// Process audio buffer in-place
    fn process(&mut self, buffer: &mut AudioBuffer);

    /// Reset internal state (delay lines, envelopes, ramps)
    fn reset(&mut self);

    /// Human-readable name for debugging
    fn name(&self) -> &'static str;
}
