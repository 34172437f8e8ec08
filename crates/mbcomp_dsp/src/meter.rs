//! Level Conversion and Lock-free Meters
//!
//! The audio thread publishes per-band RMS levels with plain relaxed atomic
//! stores; the UI thread reads them without blocking. Readers may observe a
//! value that is one block stale, which is fine for meter display.

use std::sync::atomic::{AtomicU32, Ordering};

/// Level reported for silence
pub const MINUS_INFINITY_DB: f32 = -100.0;

/// Convert decibels to linear amplitude; anything at or below
/// [`MINUS_INFINITY_DB`] maps to 0
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    if db > MINUS_INFINITY_DB {
        10.0_f32.powf(db * 0.05)
    } else {
        0.0
    }
}

/// Convert linear amplitude to decibels, floored at [`MINUS_INFINITY_DB`]
#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(MINUS_INFINITY_DB)
    } else {
        MINUS_INFINITY_DB
    }
}

/// Pre/post-processing RMS of one band, in dB
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandLevels {
    pub input_db: f32,
    pub output_db: f32,
}

impl BandLevels {
    pub const SILENT: BandLevels = BandLevels {
        input_db: MINUS_INFINITY_DB,
        output_db: MINUS_INFINITY_DB,
    };

    /// Gain reduction applied by the compressor (positive = quieter)
    pub fn gain_reduction_db(&self) -> f32 {
        self.input_db - self.output_db
    }
}

/// Single-writer, multi-reader level meter
pub struct LevelMeter {
    /// Stored as f32 bits for atomic access
    input_bits: AtomicU32,
    output_bits: AtomicU32,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self {
            input_bits: AtomicU32::new(MINUS_INFINITY_DB.to_bits()),
            output_bits: AtomicU32::new(MINUS_INFINITY_DB.to_bits()),
        }
    }

    /// Publish new levels; one store per field, no read-modify-write
    #[inline]
    pub fn publish(&self, levels: BandLevels) {
        self.input_bits
            .store(levels.input_db.to_bits(), Ordering::Relaxed);
        self.output_bits
            .store(levels.output_db.to_bits(), Ordering::Relaxed);
    }

    pub fn input_db(&self) -> f32 {
        f32::from_bits(self.input_bits.load(Ordering::Relaxed))
    }

    pub fn output_db(&self) -> f32 {
        f32::from_bits(self.output_bits.load(Ordering::Relaxed))
    }

    pub fn levels(&self) -> BandLevels {
        BandLevels {
            input_db: self.input_db(),
            output_db: self.output_db(),
        }
    }

    pub fn reset(&self) {
        self.publish(BandLevels::SILENT);
    }
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new()
    }
}
