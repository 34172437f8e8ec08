//! Message Types for Thread Communication
//!
//! Commands flow from the host/UI thread -> meter monitor thread
//! Events flow from the meter monitor thread -> host/UI thread

use mbcomp_dsp::{Band, BandLevels, SpectrumFrame, NUM_BANDS};
use serde::{Deserialize, Serialize};

/// Commands sent to the meter monitor
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Publish a meter update right away
    RequestLevels,

    /// Change the periodic update rate (Hz)
    SetRefreshRate(f32),

    /// Stop the monitor thread
    Shutdown,
}

/// Pre/post levels of one band as sent to the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    /// "Low", "Mid" or "High"
    pub band: String,
    pub input_db: f32,
    pub output_db: f32,
    pub gain_reduction_db: f32,
}

impl MeterReading {
    pub fn new(band: Band, levels: BandLevels) -> Self {
        Self {
            band: band.label().to_string(),
            input_db: levels.input_db,
            output_db: levels.output_db,
            gain_reduction_db: levels.gain_reduction_db(),
        }
    }
}

/// Events sent from the meter monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// Per-band levels, low/mid/high order
    MeterUpdate { bands: Vec<MeterReading> },

    /// Smoothed spectrum in dB, 32 log-spaced bins from 20 Hz
    SpectrumUpdate {
        bins_db: Vec<f32>,
        sequence: u64,
        /// Samples the audio side had to drop so far
        dropped_samples: u64,
    },

    /// Error occurred
    Error { message: String },

    /// Monitor thread exited
    Stopped,
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }

    pub fn meter_update(levels: &[BandLevels; NUM_BANDS]) -> Self {
        Event::MeterUpdate {
            bands: Band::ALL
                .iter()
                .map(|&band| MeterReading::new(band, levels[band.index()]))
                .collect(),
        }
    }

    pub fn spectrum_update(frame: &SpectrumFrame, dropped_samples: u64) -> Self {
        Event::SpectrumUpdate {
            bins_db: frame.bins_db.to_vec(),
            sequence: frame.sequence,
            dropped_samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_update_serialization() {
        let levels = [
            BandLevels {
                input_db: -12.0,
                output_db: -18.0,
            },
            BandLevels::SILENT,
            BandLevels {
                input_db: -3.0,
                output_db: -3.0,
            },
        ];
        let event = Event::meter_update(&levels);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"MeterUpdate\""));
        assert!(json.contains("\"payload\""));

        let deserialized: Event = serde_json::from_str(&json).unwrap();
        if let Event::MeterUpdate { bands } = deserialized {
            assert_eq!(bands.len(), 3);
            assert_eq!(bands[0].band, "Low");
            assert_eq!(bands[0].gain_reduction_db, 6.0);
            assert_eq!(bands[1].input_db, -100.0);
            assert_eq!(bands[2].band, "High");
        } else {
            panic!("Deserialization produced wrong variant");
        }
    }

    #[test]
    fn test_spectrum_update() {
        let frame = SpectrumFrame::default();
        let event = Event::spectrum_update(&frame, 7);
        if let Event::SpectrumUpdate {
            bins_db,
            sequence,
            dropped_samples,
        } = event
        {
            assert_eq!(bins_db.len(), 32);
            assert_eq!(sequence, 0);
            assert_eq!(dropped_samples, 7);
        } else {
            panic!("Wrong variant");
        }
    }

    #[test]
    fn test_error_event() {
        let event = Event::error("Test error message");
        assert_eq!(
            event,
            Event::Error {
                message: "Test error message".to_string()
            }
        );
    }

    #[test]
    fn test_unit_variant_serialization() {
        let json = serde_json::to_string(&Event::Stopped).unwrap();
        assert_eq!(json, r#"{"type":"Stopped"}"#);
    }
}
