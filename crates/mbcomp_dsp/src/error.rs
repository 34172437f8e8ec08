//! DSP Error Types

use thiserror::Error;

/// Errors that can occur while preparing DSP components
///
/// None of these are produced by the per-block processing path; they only
/// surface at prepare-time when sample rate, channel layout or block size
/// are being set up.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Sample rate must be between 8000 and 384000 Hz, got {0}")]
    InvalidSampleRate(f32),

    #[error("Channel count must be between 1 and 8, got {0}")]
    InvalidChannelCount(usize),

    #[error("Block size must be between 1 and 16384 frames, got {0}")]
    InvalidBlockSize(usize),

    #[error("Invalid filter coefficients for frequency {frequency}Hz at sample rate {sample_rate}Hz")]
    InvalidCoefficients { frequency: f32, sample_rate: f32 },

    #[error("Buffer size mismatch: expected {expected}, got {got}")]
    BufferSizeMismatch { expected: usize, got: usize },
}
