//! Smoothed Gain Stage
//!
//! Linear-gain ramp used for input and output trim. A new target is reached
//! in a fixed 50 ms, one equal step per frame, so automation never clicks.

use crate::buffer::AudioBuffer;
use crate::meter::db_to_gain;
use crate::processor::{AudioProcessor, ProcessSpec};

/// Time to reach a new target gain
pub const GAIN_RAMP_SECONDS: f32 = 0.05;

/// Ramped scalar gain
#[derive(Debug, Clone)]
pub struct GainStage {
    target_db: f32,
    current: f32,
    target: f32,
    /// Gain the running ramp started from
    start: f32,
    step: f32,
    /// Frames into the current ramp
    elapsed: usize,
    /// Frames left in the current ramp
    countdown: usize,
    ramp_frames: usize,
}

impl GainStage {
    /// Unity gain, not yet prepared (target changes jump immediately)
    pub fn new() -> Self {
        Self {
            target_db: 0.0,
            current: 1.0,
            target: 1.0,
            start: 1.0,
            step: 0.0,
            elapsed: 0,
            countdown: 0,
            ramp_frames: 0,
        }
    }

    /// Set a new target in dB
    ///
    /// Re-sending the current target is a no-op and does not restart the
    /// ramp.
    pub fn set_target_db(&mut self, db: f32) {
        if db == self.target_db || db.is_nan() {
            return;
        }
        self.target_db = db;
        self.target = db_to_gain(db);

        if self.ramp_frames == 0 {
            self.current = self.target;
            self.countdown = 0;
            return;
        }

        self.start = self.current;
        self.elapsed = 0;
        self.countdown = self.ramp_frames;
        self.step = (self.target - self.start) / self.ramp_frames as f32;
    }

    pub fn target_db(&self) -> f32 {
        self.target_db
    }

    /// Gain the next frame will use
    pub fn current_gain(&self) -> f32 {
        self.current
    }

    /// Per-frame step of the running ramp (0 when settled)
    pub fn ramp_step(&self) -> f32 {
        if self.is_smoothing() {
            self.step
        } else {
            0.0
        }
    }

    pub fn is_smoothing(&self) -> bool {
        self.countdown > 0
    }

    /// Advance one frame and return its gain
    ///
    /// Ramp values are computed from the start point, not accumulated, so
    /// rounding never piles up into a jump at the end of the ramp.
    #[inline]
    pub fn next_gain(&mut self) -> f32 {
        if self.countdown == 0 {
            return self.target;
        }
        self.countdown -= 1;
        self.elapsed += 1;
        if self.countdown == 0 {
            self.current = self.target;
        } else {
            self.current = self.start + self.step * self.elapsed as f32;
        }
        self.current
    }
}

impl Default for GainStage {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioProcessor for GainStage {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.ramp_frames = (GAIN_RAMP_SECONDS * spec.sample_rate).floor() as usize;
        self.reset();
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if !self.is_smoothing() {
            // Unity leaves samples bit-exact
            if self.target != 1.0 {
                buffer.apply_gain(self.target);
            }
            return;
        }

        let channels = buffer.num_channels();
        for frame in 0..buffer.len() {
            let gain = self.next_gain();
            for ch in 0..channels {
                buffer.channel_mut(ch)[frame] *= gain;
            }
        }
    }

    /// Jump straight to the target
    fn reset(&mut self) {
        self.current = self.target;
        self.start = self.target;
        self.elapsed = 0;
        self.countdown = 0;
        self.step = 0.0;
    }

    fn name(&self) -> &'static str {
        "Gain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48000.0;

    fn prepared() -> GainStage {
        let mut gain = GainStage::new();
        gain.prepare(&ProcessSpec::new(SAMPLE_RATE, 2, 512));
        gain
    }

    fn ones(frames: usize) -> AudioBuffer {
        AudioBuffer::from_channels(vec![vec![1.0; frames]; 2]).unwrap()
    }

    #[test]
    fn test_unity_passthrough_is_bit_exact() {
        let mut gain = prepared();
        let mut buffer = AudioBuffer::from_channels(vec![vec![0.1, -0.7, 0.33]; 2]).unwrap();
        let original = buffer.clone();
        gain.process(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_step_change_is_ramped() {
        let mut gain = prepared();
        gain.set_target_db(12.0);
        assert!(gain.is_smoothing());

        let ramp_frames = (GAIN_RAMP_SECONDS * SAMPLE_RATE) as usize;
        let max_step = (db_to_gain(12.0) - 1.0) / ramp_frames as f32;
        assert!((gain.ramp_step() - max_step).abs() < 1e-9);

        // DC input makes the output equal the per-frame gain; allow only
        // float rounding on top of the ideal step
        let bound = max_step + 4.0 * f32::EPSILON * db_to_gain(12.0);
        let mut previous = 1.0_f32;
        for _ in 0..10 {
            let mut buffer = ones(512);
            gain.process(&mut buffer);
            for &sample in buffer.channel(0) {
                assert!(
                    (sample - previous).abs() <= bound,
                    "jump of {} exceeds ramp step {}",
                    sample - previous,
                    max_step
                );
                previous = sample;
            }
        }
        assert!((previous - db_to_gain(12.0)).abs() < 1e-6);
    }

    #[test]
    fn test_ramp_converges_in_50ms() {
        let mut gain = prepared();
        gain.set_target_db(-6.0);

        let ramp_frames = (GAIN_RAMP_SECONDS * SAMPLE_RATE) as usize;
        for _ in 0..ramp_frames - 1 {
            gain.next_gain();
        }
        assert!(gain.is_smoothing());
        assert_eq!(gain.next_gain(), db_to_gain(-6.0));
        assert!(!gain.is_smoothing());
    }

    #[test]
    fn test_same_target_is_idempotent() {
        let mut gain = prepared();
        gain.set_target_db(6.0);
        for _ in 0..100 {
            gain.next_gain();
        }
        let mid_ramp = gain.current_gain();

        gain.set_target_db(6.0);
        assert_eq!(gain.current_gain(), mid_ramp);
        assert!((gain.ramp_step() - (db_to_gain(6.0) - 1.0) / 2400.0).abs() < 1e-9);
    }

    #[test]
    fn test_retarget_mid_ramp_starts_from_current() {
        let mut gain = prepared();
        gain.set_target_db(12.0);
        for _ in 0..1200 {
            gain.next_gain();
        }
        let current = gain.current_gain();
        gain.set_target_db(0.0);
        assert!(gain.next_gain() < current);
    }

    #[test]
    fn test_unprepared_jumps_to_target() {
        let mut gain = GainStage::new();
        gain.set_target_db(-12.0);
        assert!(!gain.is_smoothing());
        assert_eq!(gain.current_gain(), db_to_gain(-12.0));

        let mut buffer = ones(4);
        gain.process(&mut buffer);
        assert_eq!(buffer.channel(1)[3], db_to_gain(-12.0));
    }

    #[test]
    fn test_reset_settles_on_target() {
        let mut gain = prepared();
        gain.set_target_db(3.0);
        gain.reset();
        assert!(!gain.is_smoothing());
        assert_eq!(gain.current_gain(), db_to_gain(3.0));
    }
}
