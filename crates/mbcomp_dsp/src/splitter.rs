//! Three-Band Splitter
//!
//! Routes one input block through five Linkwitz-Riley stages to produce
//! low, mid and high band buffers:
//!
//! ```text
//! input ──┬── LP1 (lowMid) ── AP2 (midHigh) ────────────────► low
//!         └── HP1 (lowMid) ──┬── LP2 (midHigh) ─────────────► mid
//!                            └── HP2 (midHigh) ─────────────► high
//! ```
//!
//! The allpass on the low branch gives it the same phase as the mid+high
//! pair produced at `midHigh`, so the three bands re-sum to an allpassed
//! copy of the input (flat magnitude) instead of cancelling near the upper
//! crossover. The stage order in [`BandSplitter::split`] is part of that
//! contract: `fb2` must be copied from `fb1` after HP1 and before LP2.

use crate::band::{Band, NUM_BANDS};
use crate::buffer::AudioBuffer;
use crate::crossover::{FilterMode, LinkwitzRileyFilter};
use crate::processor::{AudioProcessor, ProcessSpec};

pub const DEFAULT_LOW_MID_HZ: f32 = 400.0;
pub const DEFAULT_MID_HIGH_HZ: f32 = 2000.0;

/// Splits audio into three frequency-ascending bands
pub struct BandSplitter {
    lp1: LinkwitzRileyFilter,
    hp1: LinkwitzRileyFilter,
    ap2: LinkwitzRileyFilter,
    lp2: LinkwitzRileyFilter,
    hp2: LinkwitzRileyFilter,
    /// fb0 (low), fb1 (mid), fb2 (high)
    bands: [AudioBuffer; NUM_BANDS],
}

impl BandSplitter {
    pub fn new() -> Self {
        Self {
            lp1: LinkwitzRileyFilter::new(FilterMode::LowPass, DEFAULT_LOW_MID_HZ),
            hp1: LinkwitzRileyFilter::new(FilterMode::HighPass, DEFAULT_LOW_MID_HZ),
            ap2: LinkwitzRileyFilter::new(FilterMode::AllPass, DEFAULT_MID_HIGH_HZ),
            lp2: LinkwitzRileyFilter::new(FilterMode::LowPass, DEFAULT_MID_HIGH_HZ),
            hp2: LinkwitzRileyFilter::new(FilterMode::HighPass, DEFAULT_MID_HIGH_HZ),
            bands: core::array::from_fn(|_| AudioBuffer::new(0, 0)),
        }
    }

    /// Allocate band buffers and re-prime every filter stage
    pub fn prepare(&mut self, spec: &ProcessSpec) {
        for filter in self.filters_mut() {
            filter.prepare(spec);
        }
        self.bands = core::array::from_fn(|_| AudioBuffer::new(spec.channels, spec.max_block_size));
    }

    /// Retune the crossovers; coefficients are only recomputed for the
    /// frequencies that actually changed
    pub fn set_crossovers(&mut self, low_mid_hz: f32, mid_high_hz: f32) {
        self.lp1.set_cutoff(low_mid_hz);
        self.hp1.set_cutoff(low_mid_hz);
        self.ap2.set_cutoff(mid_high_hz);
        self.lp2.set_cutoff(mid_high_hz);
        self.hp2.set_cutoff(mid_high_hz);
    }

    /// Crossover frequencies currently in effect
    pub fn crossovers(&self) -> (f32, f32) {
        (self.lp1.cutoff(), self.lp2.cutoff())
    }

    /// Split `input` into the three band buffers
    ///
    /// Frequencies are applied before any audio is touched, so a change
    /// never lands mid-block.
    ///
    /// # Real-time Safety
    /// No allocations; band buffers were sized in `prepare()`.
    pub fn split(&mut self, input: &AudioBuffer, low_mid_hz: f32, mid_high_hz: f32) {
        self.set_crossovers(low_mid_hz, mid_high_hz);

        let [fb0, fb1, fb2] = &mut self.bands;

        // 1. fresh copies of the input
        fb0.copy_from(input);
        fb1.copy_from(input);

        // 3. low = AP2(LP1(input))
        self.lp1.process_block(fb0);
        self.ap2.process_block(fb0);

        // 4. mid+high = HP1(input)
        self.hp1.process_block(fb1);

        // 5. high branch starts from the HP1 output
        fb2.copy_from(fb1);

        // 6. mid = LP2(HP1(input))
        self.lp2.process_block(fb1);

        // 7. high = HP2(HP1(input))
        self.hp2.process_block(fb2);
    }

    pub fn bands(&self) -> &[AudioBuffer; NUM_BANDS] {
        &self.bands
    }

    pub fn bands_mut(&mut self) -> &mut [AudioBuffer; NUM_BANDS] {
        &mut self.bands
    }

    pub fn band(&self, band: Band) -> &AudioBuffer {
        &self.bands[band.index()]
    }

    /// Clear filter history without reallocating
    pub fn reset(&mut self) {
        for filter in self.filters_mut() {
            filter.reset();
        }
        for buffer in &mut self.bands {
            buffer.clear();
        }
    }

    fn filters_mut(&mut self) -> [&mut LinkwitzRileyFilter; 5] {
        [
            &mut self.lp1,
            &mut self.hp1,
            &mut self.ap2,
            &mut self.lp2,
            &mut self.hp2,
        ]
    }
}

impl Default for BandSplitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SAMPLE_RATE: f32 = 48000.0;
    const BLOCK: usize = 256;

    fn prepared() -> BandSplitter {
        let mut splitter = BandSplitter::new();
        splitter.prepare(&ProcessSpec::new(SAMPLE_RATE, 2, BLOCK));
        splitter
    }

    fn sine_block(freq: f32, start: usize, len: usize) -> AudioBuffer {
        let samples: Vec<f32> = (start..start + len)
            .map(|i| (2.0 * PI * freq * i as f32 / SAMPLE_RATE).sin())
            .collect();
        AudioBuffer::from_channels(vec![samples.clone(), samples]).unwrap()
    }

    /// Per-band RMS of a steady sine after settling
    fn band_energy(freq: f32, low_mid: f32, mid_high: f32) -> [f32; 3] {
        let mut splitter = prepared();
        let mut energy = [0.0_f64; 3];
        let mut count = 0usize;
        for block in 0..400 {
            let input = sine_block(freq, block * BLOCK, BLOCK);
            splitter.split(&input, low_mid, mid_high);
            if block >= 200 {
                for (b, buffer) in splitter.bands().iter().enumerate() {
                    energy[b] += buffer
                        .channel(0)
                        .iter()
                        .map(|s| (*s as f64) * (*s as f64))
                        .sum::<f64>();
                }
                count += BLOCK;
            }
        }
        energy.map(|e| (e / count as f64).sqrt() as f32)
    }

    #[test]
    fn test_bands_match_input_shape() {
        let mut splitter = prepared();
        let input = sine_block(1000.0, 0, 100);
        splitter.split(&input, 400.0, 2000.0);
        for band in splitter.bands() {
            assert_eq!(band.len(), 100);
            assert_eq!(band.num_channels(), 2);
        }
    }

    #[test]
    fn test_sum_of_bands_is_allpassed_input() {
        let mut splitter = prepared();
        let mut ap_low_mid = LinkwitzRileyFilter::new(FilterMode::AllPass, 400.0);
        let mut ap_mid_high = LinkwitzRileyFilter::new(FilterMode::AllPass, 2000.0);
        let spec = ProcessSpec::new(SAMPLE_RATE, 2, BLOCK);
        ap_low_mid.prepare(&spec);
        ap_mid_high.prepare(&spec);

        for block in 0..40 {
            // Broadband test signal: three sines spread across all bands
            let samples: Vec<f32> = (block * BLOCK..(block + 1) * BLOCK)
                .map(|i| {
                    let t = i as f32 / SAMPLE_RATE;
                    0.4 * (2.0 * PI * 90.0 * t).sin()
                        + 0.3 * (2.0 * PI * 1100.0 * t).sin()
                        + 0.3 * (2.0 * PI * 7000.0 * t).sin()
                })
                .collect();
            let input = AudioBuffer::from_channels(vec![samples.clone(), samples]).unwrap();

            splitter.split(&input, 400.0, 2000.0);

            let mut reference = input.clone();
            ap_low_mid.process(&mut reference);
            ap_mid_high.process(&mut reference);

            for ch in 0..2 {
                for i in 0..BLOCK {
                    let sum: f32 = splitter.bands().iter().map(|b| b.channel(ch)[i]).sum();
                    let expected = reference.channel(ch)[i];
                    assert!(
                        (sum - expected).abs() < 1e-3,
                        "block {} ch {} sample {}: {} vs {}",
                        block,
                        ch,
                        i,
                        sum,
                        expected
                    );
                }
            }
        }
    }

    #[test]
    fn test_sine_lands_in_expected_band() {
        let low = band_energy(100.0, 400.0, 2000.0);
        assert!(low[0] > 0.69 && low[1] < 0.05 && low[2] < 0.01, "{:?}", low);

        let mid = band_energy(900.0, 400.0, 2000.0);
        assert!(mid[1] > mid[0] && mid[1] > mid[2], "{:?}", mid);

        let high = band_energy(10000.0, 400.0, 2000.0);
        assert!(high[2] > 0.69 && high[0] < 0.01 && high[1] < 0.05, "{:?}", high);
    }

    #[test]
    fn test_adjacent_crossovers_at_range_boundary() {
        // 999 / 1000 Hz are the closest values the parameter ranges allow
        let low = band_energy(100.0, 999.0, 1000.0);
        assert!(low[0] > 0.69, "{:?}", low);

        let high = band_energy(10000.0, 999.0, 1000.0);
        assert!(high[2] > 0.69, "{:?}", high);

        // Mid band is a narrow sliver and stays well below the neighbours
        let at_crossover = band_energy(1000.0, 999.0, 1000.0);
        assert!(at_crossover[1] < at_crossover[0] + at_crossover[2]);
    }

    #[test]
    fn test_crossovers_only_change_between_blocks() {
        let mut splitter = prepared();
        assert_eq!(splitter.crossovers(), (DEFAULT_LOW_MID_HZ, DEFAULT_MID_HIGH_HZ));

        let input = sine_block(500.0, 0, BLOCK);
        splitter.split(&input, 250.0, 5000.0);
        assert_eq!(splitter.crossovers(), (250.0, 5000.0));
    }

    #[test]
    fn test_reset_clears_history() {
        let mut splitter = prepared();
        splitter.split(&sine_block(300.0, 0, BLOCK), 400.0, 2000.0);
        splitter.reset();

        let silence = AudioBuffer::new(2, BLOCK);
        splitter.split(&silence, 400.0, 2000.0);
        for band in Band::ALL {
            assert!(splitter.band(band).channel(0).iter().all(|&s| s == 0.0));
        }
    }
}
