//! Frequency Bands
//!
//! The processor always works with exactly three bands in ascending
//! frequency order.

pub const NUM_BANDS: usize = 3;

/// One of the three frequency ranges the signal is split into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    Low,
    Mid,
    High,
}

impl Band {
    /// All bands, frequency-ascending
    pub const ALL: [Band; NUM_BANDS] = [Band::Low, Band::Mid, Band::High];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Band::Low => 0,
            Band::Mid => 1,
            Band::High => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub const fn label(self) -> &'static str {
        match self {
            Band::Low => "Low",
            Band::Mid => "Mid",
            Band::High => "High",
        }
    }
}

/// Per-band routing flags, read once per block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BandFlags {
    pub bypassed: bool,
    pub solo: bool,
    pub mute: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_order() {
        for (i, band) in Band::ALL.iter().enumerate() {
            assert_eq!(band.index(), i);
            assert_eq!(Band::from_index(i), Some(*band));
        }
        assert!(Band::Low < Band::Mid && Band::Mid < Band::High);
        assert_eq!(Band::from_index(3), None);
    }

    #[test]
    fn test_default_flags_are_clear() {
        let flags = BandFlags::default();
        assert!(!flags.bypassed && !flags.solo && !flags.mute);
    }
}
