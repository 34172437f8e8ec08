//! Mbcomp Core - Multiband Compressor Engine
//!
//! This crate provides the engine surface around the real-time DSP in
//! `mbcomp_dsp`:
//! - Typed, lock-free parameter store with JSON persistence
//! - The per-block multiband pipeline (`MultibandProcessor`)
//! - Band telemetry and a background meter/spectrum monitor
//! - Stream/engine configuration and the settings file
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Host / UI Thread                        │
//! │  ParameterStore::set ──▶ [AtomicU32; 25]                    │
//! │  MeterMonitor ◀──events── (crossbeam-channel)               │
//! └─────────────────────────────────────────────────────────────┘
//!                 │ relaxed atomics          ▲ relaxed atomics
//!                 ▼                          │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio Thread                           │
//! │  gain in ─▶ split ─▶ 3 × compress ─▶ mix ─▶ gain out        │
//! │                                              └──rtrb──▶ FFT │
//! │              (Zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod message;
mod monitor;
mod params;
mod processor;
mod settings;
mod telemetry;

pub use config::{EngineConfig, StreamConfig};
pub use error::{EngineError, EngineResult};
pub use message::{Command, Event, MeterReading};
pub use monitor::MeterMonitor;
pub use params::{
    BandParams, BandSnapshot, BoolParam, ChoiceParam, FloatParam, ParamId, ParamSpec,
    ParameterSnapshot, ParameterState, ParameterStore, ProcessorParams, NUM_PARAMS, STATE_VERSION,
};
pub use processor::MultibandProcessor;
pub use settings::{AnalyzerSettings, MbcompSettings};
pub use telemetry::Telemetry;

// Re-export DSP types for convenience
pub use mbcomp_dsp::{AudioBuffer, Band, BandFlags, BandLevels, ProcessSpec, NUM_BANDS};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        let _config = EngineConfig::default();
        let store = std::sync::Arc::new(ParameterStore::new());
        assert!(MultibandProcessor::new(store).is_ok());
    }
}
