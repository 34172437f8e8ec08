//! Linkwitz-Riley Crossover Filter
//!
//! 4th-order (24dB/oct) Linkwitz-Riley filter built from two cascaded
//! 2nd-order Butterworth BiQuads (Q = 1/√2). Low- and high-pass outputs at
//! the same cutoff sum to an allpass response: flat magnitude, no dip at the
//! crossover point. The allpass mode computes exactly that sum, so it has
//! the same phase as a low+high pair at its cutoff.
//!
//! Coefficients come from the RBJ cookbook via the `biquad` crate.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, Hertz, Type, Q_BUTTERWORTH_F32};

use crate::buffer::{AudioBuffer, DENORMAL_THRESHOLD};
use crate::error::DspError;
use crate::processor::{AudioProcessor, ProcessSpec};

/// Lowest cutoff the filter accepts
pub const MIN_CUTOFF_HZ: f32 = 10.0;

/// Cutoffs are kept below this fraction of the sample rate; a cookbook
/// BiQuad at exactly Nyquist puts its poles on the unit circle
pub const MAX_CUTOFF_RATIO: f32 = 0.49;

/// Filter topology, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    LowPass,
    HighPass,
    AllPass,
}

/// Pass-through section used before the first `prepare()`
const IDENTITY: Coefficients<f32> = Coefficients {
    a1: 0.0,
    a2: 0.0,
    b0: 1.0,
    b1: 0.0,
    b2: 0.0,
};

/// Clamp a requested cutoff into the numerically safe range for `sample_rate`
pub fn clamp_cutoff(frequency: f32, sample_rate: f32) -> f32 {
    let max = (sample_rate * MAX_CUTOFF_RATIO).max(MIN_CUTOFF_HZ);
    if frequency.is_nan() {
        return MIN_CUTOFF_HZ;
    }
    frequency.clamp(MIN_CUTOFF_HZ, max)
}

#[derive(Clone, Copy)]
enum Slope {
    Low,
    High,
}

fn butterworth(slope: Slope, frequency: f32, sample_rate: f32) -> Result<Coefficients<f32>, DspError> {
    let invalid = |_| DspError::InvalidCoefficients {
        frequency,
        sample_rate,
    };
    let fs = Hertz::<f32>::from_hz(sample_rate).map_err(invalid)?;
    let f0 = Hertz::<f32>::from_hz(frequency).map_err(invalid)?;

    let coeffs = match slope {
        Slope::Low => Coefficients::<f32>::from_params(Type::LowPass, fs, f0, Q_BUTTERWORTH_F32),
        Slope::High => Coefficients::<f32>::from_params(Type::HighPass, fs, f0, Q_BUTTERWORTH_F32),
    };
    coeffs.map_err(invalid)
}

/// Two cascaded Butterworth sections = one LR4 slope
struct Lr4Section {
    first: DirectForm2Transposed<f32>,
    second: DirectForm2Transposed<f32>,
}

impl Lr4Section {
    fn new(coeffs: Coefficients<f32>) -> Self {
        Self {
            first: DirectForm2Transposed::<f32>::new(coeffs),
            second: DirectForm2Transposed::<f32>::new(coeffs),
        }
    }

    #[inline]
    fn run(&mut self, input: f32) -> f32 {
        self.second.run(self.first.run(input))
    }

    fn update_coefficients(&mut self, coeffs: Coefficients<f32>) {
        self.first.update_coefficients(coeffs);
        self.second.update_coefficients(coeffs);
    }

    fn reset_state(&mut self) {
        self.first.reset_state();
        self.second.reset_state();
    }
}

/// Per-channel filter state
struct ChannelState {
    lowpass: Lr4Section,
    highpass: Lr4Section,
}

impl ChannelState {
    fn reset(&mut self) {
        self.lowpass.reset_state();
        self.highpass.reset_state();
    }
}

/// Linkwitz-Riley 4th-order filter operating on planar buffers
///
/// Call `prepare()` before processing; `set_cutoff()` only between blocks.
pub struct LinkwitzRileyFilter {
    mode: FilterMode,
    cutoff_hz: f32,
    sample_rate: f32,
    lowpass_coeffs: Coefficients<f32>,
    highpass_coeffs: Coefficients<f32>,
    channels: Vec<ChannelState>,
}

impl LinkwitzRileyFilter {
    pub fn new(mode: FilterMode, cutoff_hz: f32) -> Self {
        Self {
            mode,
            cutoff_hz,
            sample_rate: 0.0,
            lowpass_coeffs: IDENTITY,
            highpass_coeffs: IDENTITY,
            channels: Vec::new(),
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Cutoff currently in effect (after clamping)
    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Recompute coefficients for a new cutoff
    ///
    /// Must only be called between blocks. Out-of-range values are clamped;
    /// setting the current cutoff again is a no-op. Returns the cutoff in
    /// effect afterwards.
    pub fn set_cutoff(&mut self, frequency: f32) -> f32 {
        if self.sample_rate <= 0.0 {
            // Not prepared yet; remember the request for prepare()
            if !frequency.is_nan() {
                self.cutoff_hz = frequency.max(MIN_CUTOFF_HZ);
            }
            return self.cutoff_hz;
        }

        let frequency = clamp_cutoff(frequency, self.sample_rate);
        if frequency != self.cutoff_hz {
            // On a design failure the previous coefficients stay in place
            if self.update_coefficients(frequency).is_ok() {
                self.cutoff_hz = frequency;
            }
        }
        self.cutoff_hz
    }

    fn update_coefficients(&mut self, frequency: f32) -> Result<(), DspError> {
        let lowpass = butterworth(Slope::Low, frequency, self.sample_rate)?;
        let highpass = butterworth(Slope::High, frequency, self.sample_rate)?;

        self.lowpass_coeffs = lowpass;
        self.highpass_coeffs = highpass;
        for state in &mut self.channels {
            state.lowpass.update_coefficients(lowpass);
            state.highpass.update_coefficients(highpass);
        }
        Ok(())
    }

    /// Process one sample of one channel
    #[inline]
    pub fn process_sample(&mut self, channel: usize, input: f32) -> f32 {
        let Some(state) = self.channels.get_mut(channel) else {
            return input;
        };
        match self.mode {
            FilterMode::LowPass => state.lowpass.run(input),
            FilterMode::HighPass => state.highpass.run(input),
            FilterMode::AllPass => state.lowpass.run(input) + state.highpass.run(input),
        }
    }

    /// Filter the buffer in place, advancing state by exactly one block
    ///
    /// A channel fed a silent block whose ringing has decayed below
    /// [`DENORMAL_THRESHOLD`] has its history zeroed, so the delay lines
    /// never sit on subnormal values.
    ///
    /// # Real-time Safety
    /// No allocations. O(n) where n = frames × channels.
    pub fn process_block(&mut self, buffer: &mut AudioBuffer) {
        let channels = buffer.num_channels().min(self.channels.len());
        for ch in 0..channels {
            let state = &mut self.channels[ch];
            let samples = buffer.channel_mut(ch);
            let silent_input = samples.iter().all(|&s| s == 0.0);
            match self.mode {
                FilterMode::LowPass => {
                    for sample in samples.iter_mut() {
                        *sample = state.lowpass.run(*sample);
                    }
                }
                FilterMode::HighPass => {
                    for sample in samples.iter_mut() {
                        *sample = state.highpass.run(*sample);
                    }
                }
                FilterMode::AllPass => {
                    for sample in samples.iter_mut() {
                        *sample = state.lowpass.run(*sample) + state.highpass.run(*sample);
                    }
                }
            }

            if silent_input && samples.iter().all(|s| s.abs() < DENORMAL_THRESHOLD) {
                state.reset();
                samples.fill(0.0);
            }
        }
    }
}

impl AudioProcessor for LinkwitzRileyFilter {
    /// (Re)allocate per-channel state, recompute coefficients, zero history
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.sample_rate = spec.sample_rate;
        self.channels.clear();

        let cutoff = clamp_cutoff(self.cutoff_hz, spec.sample_rate);
        if self.update_coefficients(cutoff).is_ok() {
            self.cutoff_hz = cutoff;
        }

        let (lowpass, highpass) = (self.lowpass_coeffs, self.highpass_coeffs);
        self.channels = (0..spec.channels)
            .map(|_| ChannelState {
                lowpass: Lr4Section::new(lowpass),
                highpass: Lr4Section::new(highpass),
            })
            .collect();
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        self.process_block(buffer);
    }

    fn reset(&mut self) {
        for state in &mut self.channels {
            state.reset();
        }
    }

    fn name(&self) -> &'static str {
        match self.mode {
            FilterMode::LowPass => "LR4 Lowpass",
            FilterMode::HighPass => "LR4 Highpass",
            FilterMode::AllPass => "LR4 Allpass",
        }
    }
}
