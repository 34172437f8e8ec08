//! Engine and Stream Configuration

use mbcomp_dsp::{FftOrder, ProcessSpec};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Audio stream configuration as supplied by the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sample rate in Hz (e.g., 44100, 48000, 96000)
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Maximum block size in frames the host will deliver
    pub buffer_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            buffer_size: 512,
        }
    }
}

impl StreamConfig {
    /// Latency of one block in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.to_process_spec()
            .validate()
            .map_err(|e| EngineError::ConfigError(e.to_string()))
    }

    /// Processor-side view of this configuration
    pub fn to_process_spec(&self) -> ProcessSpec {
        ProcessSpec::new(
            self.sample_rate as f32,
            self.channels as usize,
            self.buffer_size as usize,
        )
    }
}

/// Overall engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub stream: StreamConfig,

    /// Analysis FIFO capacity in samples (mono)
    pub analysis_fifo_frames: usize,

    /// Spectrum analyzer window length (2048, 4096 or 8192)
    pub fft_order: usize,

    /// How often the meter monitor publishes levels
    pub meter_refresh_hz: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            analysis_fifo_frames: 48000,
            fft_order: FftOrder::Order2048.size(),
            meter_refresh_hz: 30.0,
        }
    }
}

impl EngineConfig {
    /// Small blocks, short analysis window
    pub fn low_latency() -> Self {
        Self {
            stream: StreamConfig {
                buffer_size: 128, // ~2.6ms latency
                ..StreamConfig::default()
            },
            analysis_fifo_frames: 16384,
            fft_order: FftOrder::Order2048.size(),
            meter_refresh_hz: 60.0,
        }
    }

    /// Large blocks, finer spectrum resolution
    pub fn stable() -> Self {
        Self {
            stream: StreamConfig {
                buffer_size: 1024, // ~21ms latency
                ..StreamConfig::default()
            },
            analysis_fifo_frames: 65536,
            fft_order: FftOrder::Order8192.size(),
            meter_refresh_hz: 30.0,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.stream.validate()?;
        self.fft()?;
        if self.analysis_fifo_frames < self.fft_order {
            return Err(EngineError::ConfigError(format!(
                "Analysis FIFO ({} frames) smaller than FFT window ({})",
                self.analysis_fifo_frames, self.fft_order
            )));
        }
        if !(1.0..=240.0).contains(&self.meter_refresh_hz) {
            return Err(EngineError::ConfigError(format!(
                "Invalid meter refresh rate: {}",
                self.meter_refresh_hz
            )));
        }
        Ok(())
    }

    /// Typed FFT order
    pub fn fft(&self) -> EngineResult<FftOrder> {
        FftOrder::from_size(self.fft_order)
            .ok_or_else(|| EngineError::ConfigError(format!("Invalid FFT size: {}", self.fft_order)))
    }
}
