//! Mbcomp DSP - Digital Signal Processing Module
//!
//! This crate provides the real-time half of the Mbcomp three-band
//! compressor:
//! - 4th-order Linkwitz-Riley lowpass/highpass/allpass filters
//! - Three-band splitter with phase-matched low band
//! - Per-band feed-forward compressor with bypass/solo/mute flags
//! - Solo/mute-aware mix bus and smoothed input/output gain
//! - Lock-free level meters and an SPSC analysis FIFO
//! - FFT spectrum analyzer for visualization (UI side)
//!
//! # Architecture
//!
//! Everything sized by the stream (band buffers, filter state, envelope
//! state) is allocated in `prepare()`. The per-block path only mutates
//! contents: no allocation, no locks, no I/O. Non-finite and denormal
//! samples are flushed at every stage boundary.

mod band;
mod buffer;
mod compressor;
mod crossover;
mod error;
mod fft;
mod fifo;
mod gain;
mod meter;
mod mixbus;
mod processor;
mod splitter;

pub use band::{Band, BandFlags, NUM_BANDS};
pub use buffer::{sanitize_sample, AudioBuffer, DENORMAL_THRESHOLD};
pub use compressor::{
    ratio_from_index, ratio_from_label, ratio_label, BandState, Compressor, CompressorBand,
    CompressorSettings, DEFAULT_RATIO_INDEX, RATIO_CHOICES,
};
pub use crossover::{clamp_cutoff, FilterMode, LinkwitzRileyFilter, MIN_CUTOFF_HZ};
pub use error::DspError;
pub use fft::{
    bin_edges_hz, FftOrder, SpectrumAnalyzer, SpectrumFrame, SpectrumHandle, NUM_BINS,
    SPECTRUM_FLOOR_DB,
};
pub use fifo::{analysis_fifo, AnalysisConsumer, AnalysisProducer};
pub use gain::{GainStage, GAIN_RAMP_SECONDS};
pub use meter::{db_to_gain, gain_to_db, BandLevels, LevelMeter, MINUS_INFINITY_DB};
pub use mixbus::{active_bands, mix};
pub use processor::{
    AudioProcessor, ProcessSpec, MAX_BLOCK_SIZE, MAX_CHANNELS, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE,
};
pub use splitter::{BandSplitter, DEFAULT_LOW_MID_HZ, DEFAULT_MID_HIGH_HZ};
