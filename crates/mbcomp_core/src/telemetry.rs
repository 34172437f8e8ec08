//! Band Telemetry
//!
//! Shared, lock-free view of the per-band pre/post RMS levels. The audio
//! thread owns the writing side through each `CompressorBand`; any number of
//! readers can hold a clone of [`Telemetry`].

use std::sync::Arc;

use mbcomp_dsp::{Band, BandLevels, LevelMeter, NUM_BANDS};

/// Handles to the three band meters
#[derive(Clone)]
pub struct Telemetry {
    meters: [Arc<LevelMeter>; NUM_BANDS],
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            meters: core::array::from_fn(|_| Arc::new(LevelMeter::new())),
        }
    }

    /// Shared meter of one band (used to wire up the writer)
    pub fn meter(&self, band: Band) -> Arc<LevelMeter> {
        Arc::clone(&self.meters[band.index()])
    }

    pub fn band(&self, band: Band) -> BandLevels {
        self.meters[band.index()].levels()
    }

    /// All six values, band order low/mid/high
    ///
    /// Each value is read independently; a concurrent block may land
    /// between two reads.
    pub fn levels(&self) -> [BandLevels; NUM_BANDS] {
        Band::ALL.map(|band| self.band(band))
    }

    pub fn reset(&self) {
        for meter in &self.meters {
            meter.reset();
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_meters() {
        let telemetry = Telemetry::new();
        let reader = telemetry.clone();

        telemetry.meter(Band::Mid).publish(BandLevels {
            input_db: -10.0,
            output_db: -14.0,
        });

        let levels = reader.levels();
        assert_eq!(levels[0], BandLevels::SILENT);
        assert_eq!(levels[1].gain_reduction_db(), 4.0);
        assert_eq!(reader.band(Band::Mid).input_db, -10.0);

        reader.reset();
        assert_eq!(telemetry.band(Band::Mid), BandLevels::SILENT);
    }
}
