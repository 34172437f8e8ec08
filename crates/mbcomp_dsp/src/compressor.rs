//! Per-Band Compressor
//!
//! Feed-forward compressor: a peak ballistics envelope follower drives a
//! hard-knee gain computer.
//!
//! ```text
//! env[n]  = |x| + cte · (env[n-1] − |x|)      cte = attack if |x| > env, else release
//! gain    = 1                                  env <  threshold
//!         = (env / threshold)^(1/ratio − 1)    env >= threshold
//! y[n]    = gain · x[n]
//! ```
//!
//! Settings are re-read every block and applied instantly at the block
//! boundary; there is no smoothing of threshold/ratio changes.

use std::f32::consts::PI;
use std::sync::Arc;

use crate::band::BandFlags;
use crate::buffer::{sanitize_sample, AudioBuffer};
use crate::meter::{db_to_gain, gain_to_db, BandLevels, LevelMeter};
use crate::processor::{AudioProcessor, ProcessSpec};

/// Discrete ratio choices, in order
pub const RATIO_CHOICES: [f32; 14] = [
    1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 10.0, 15.0, 20.0, 50.0, 100.0,
];

/// Index into [`RATIO_CHOICES`] selected by default (3:1)
pub const DEFAULT_RATIO_INDEX: usize = 3;

pub const MIN_TIME_MS: f32 = 5.0;
pub const MAX_TIME_MS: f32 = 500.0;
pub const MIN_THRESHOLD_DB: f32 = -60.0;
pub const MAX_THRESHOLD_DB: f32 = 12.0;

/// Ratio for a choice index; out-of-range indices clamp to the nearest end
pub fn ratio_from_index(index: usize) -> f32 {
    RATIO_CHOICES[index.min(RATIO_CHOICES.len() - 1)]
}

/// Display label for a ratio choice ("4.0", "1.5", "100.0")
pub fn ratio_label(index: usize) -> String {
    format!("{:.1}", ratio_from_index(index))
}

/// Map a choice label back to its exact ratio
///
/// Only labels of the choice set are accepted, nothing in between.
pub fn ratio_from_label(label: &str) -> Option<f32> {
    let value: f32 = label.trim().parse().ok()?;
    RATIO_CHOICES.iter().copied().find(|&ratio| ratio == value)
}

/// Compressor control values for one band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    pub attack_ms: f32,
    pub release_ms: f32,
    pub threshold_db: f32,
    pub ratio: f32,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            attack_ms: 50.0,
            release_ms: 250.0,
            threshold_db: 0.0,
            ratio: RATIO_CHOICES[DEFAULT_RATIO_INDEX],
        }
    }
}

impl CompressorSettings {
    /// Clamp every field into its valid range (NaN falls back to default)
    pub fn clamped(self) -> Self {
        let defaults = Self::default();
        let clamp = |value: f32, min: f32, max: f32, fallback: f32| {
            if value.is_nan() {
                fallback
            } else {
                value.clamp(min, max)
            }
        };
        Self {
            attack_ms: clamp(self.attack_ms, MIN_TIME_MS, MAX_TIME_MS, defaults.attack_ms),
            release_ms: clamp(self.release_ms, MIN_TIME_MS, MAX_TIME_MS, defaults.release_ms),
            threshold_db: clamp(
                self.threshold_db,
                MIN_THRESHOLD_DB,
                MAX_THRESHOLD_DB,
                defaults.threshold_db,
            ),
            ratio: clamp(self.ratio, 1.0, RATIO_CHOICES[RATIO_CHOICES.len() - 1], defaults.ratio),
        }
    }
}

/// Peak envelope follower with separate attack/release time constants
struct BallisticsFilter {
    /// -2π·1000 / fs, so that cte = exp(exp_factor / time_ms)
    exp_factor: f32,
    attack_cte: f32,
    release_cte: f32,
    state: Vec<f32>,
}

impl BallisticsFilter {
    fn new() -> Self {
        Self {
            exp_factor: -2.0 * PI * 1000.0 / 48000.0,
            attack_cte: 0.0,
            release_cte: 0.0,
            state: Vec::new(),
        }
    }

    fn prepare(&mut self, sample_rate: f32, channels: usize) {
        self.exp_factor = -2.0 * PI * 1000.0 / sample_rate;
        self.state = vec![0.0; channels];
    }

    fn set_times(&mut self, attack_ms: f32, release_ms: f32) {
        self.attack_cte = self.time_constant(attack_ms);
        self.release_cte = self.time_constant(release_ms);
    }

    fn time_constant(&self, time_ms: f32) -> f32 {
        if time_ms < 1.0e-3 {
            0.0
        } else {
            (self.exp_factor / time_ms).exp()
        }
    }

    /// Advance one channel's envelope; `None` for a channel that was never
    /// prepared
    ///
    /// The stored envelope is flushed to zero once it decays below the
    /// denormal threshold.
    #[inline]
    fn process_sample(&mut self, channel: usize, input: f32) -> Option<f32> {
        let state = self.state.get_mut(channel)?;
        let level = input.abs();
        let previous = *state;
        let cte = if level > previous {
            self.attack_cte
        } else {
            self.release_cte
        };
        let env = sanitize_sample(level + cte * (previous - level));
        *state = env;
        Some(env)
    }

    fn reset(&mut self) {
        self.state.fill(0.0);
    }
}

/// Hard-knee feed-forward compressor
pub struct Compressor {
    envelope: BallisticsFilter,
    settings: CompressorSettings,
    threshold: f32,
    threshold_inverse: f32,
    ratio_inverse: f32,
}

impl Compressor {
    pub fn new() -> Self {
        let mut compressor = Self {
            envelope: BallisticsFilter::new(),
            settings: CompressorSettings::default(),
            threshold: 1.0,
            threshold_inverse: 1.0,
            ratio_inverse: 1.0,
        };
        compressor.update(CompressorSettings::default());
        compressor
    }

    /// Apply new settings; cheap enough to call every block
    pub fn update(&mut self, settings: CompressorSettings) {
        let settings = settings.clamped();
        self.threshold = db_to_gain(settings.threshold_db);
        self.threshold_inverse = 1.0 / self.threshold;
        self.ratio_inverse = 1.0 / settings.ratio;
        self.envelope.set_times(settings.attack_ms, settings.release_ms);
        self.settings = settings;
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }

    /// Compress one sample; channels outside the prepared layout pass
    /// through unchanged
    #[inline]
    pub fn process_sample(&mut self, channel: usize, input: f32) -> f32 {
        let Some(env) = self.envelope.process_sample(channel, input) else {
            return input;
        };
        let gain = if env < self.threshold {
            1.0
        } else {
            (env * self.threshold_inverse).powf(self.ratio_inverse - 1.0)
        };
        gain * input
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioProcessor for Compressor {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.envelope.prepare(spec.sample_rate, spec.channels);
        // Time constants depend on the sample rate
        self.update(self.settings);
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let channels = buffer.num_channels().min(self.envelope.state.len());
        for ch in 0..channels {
            for sample in buffer.channel_mut(ch) {
                *sample = self.process_sample(ch, *sample);
            }
        }
    }

    fn reset(&mut self) {
        self.envelope.reset();
    }

    fn name(&self) -> &'static str {
        "Compressor"
    }
}

/// Whether a band's compressor runs this block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandState {
    Active,
    Bypassed,
}

/// One band of the multiband compressor
///
/// Wraps a [`Compressor`] with bypass/solo/mute flags and publishes pre/post
/// RMS levels to a shared [`LevelMeter`].
pub struct CompressorBand {
    compressor: Compressor,
    flags: BandFlags,
    meter: Arc<LevelMeter>,
}

impl CompressorBand {
    pub fn new(meter: Arc<LevelMeter>) -> Self {
        Self {
            compressor: Compressor::new(),
            flags: BandFlags::default(),
            meter,
        }
    }

    pub fn prepare(&mut self, spec: &ProcessSpec) {
        self.compressor.prepare(spec);
        self.meter.reset();
    }

    /// Reconfigure envelope and gain computer for the coming block
    pub fn update_settings(&mut self, settings: CompressorSettings) {
        self.compressor.update(settings);
    }

    pub fn settings(&self) -> &CompressorSettings {
        self.compressor.settings()
    }

    pub fn set_flags(&mut self, flags: BandFlags) {
        self.flags = flags;
    }

    pub fn flags(&self) -> BandFlags {
        self.flags
    }

    /// Hard switch on the bypass flag at the block boundary
    pub fn state(&self) -> BandState {
        if self.flags.bypassed {
            BandState::Bypassed
        } else {
            BandState::Active
        }
    }

    pub fn meter(&self) -> &Arc<LevelMeter> {
        &self.meter
    }

    /// Compress the band in place and publish its levels
    ///
    /// A bypassed band leaves the buffer untouched but is still metered.
    pub fn process(&mut self, buffer: &mut AudioBuffer) -> BandLevels {
        let input_db = gain_to_db(buffer.rms_level());

        if self.state() == BandState::Active {
            self.compressor.process(buffer);
        }

        let levels = BandLevels {
            input_db,
            output_db: gain_to_db(buffer.rms_level()),
        };
        self.meter.publish(levels);
        levels
    }

    pub fn reset(&mut self) {
        self.compressor.reset();
    }
}

impl Default for CompressorBand {
    fn default() -> Self {
        Self::new(Arc::new(LevelMeter::new()))
    }
}
