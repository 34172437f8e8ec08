//! FFT Spectrum Analyzer
//!
//! UI-side analysis of the processed output for visualization.
//!
//! # Architecture
//!
//! ```text
//! audio thread                        UI thread
//! AnalysisProducer ──rtrb──▶ AnalysisConsumer ─▶ SpectrumAnalyzer::update()
//!                                                   │ window + FFT + log bins
//!                                                   ▼
//!                                         RwLock<SpectrumFrame> ◀── SpectrumHandle
//! ```
//!
//! The analyzer owns the consumer end of the FIFO and a sliding window of
//! the most recent `fft_size` samples. Nothing here runs on the audio thread.

use std::f32::consts::PI;
use std::sync::Arc;

use parking_lot::RwLock;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::fifo::AnalysisConsumer;

/// Number of display bins, logarithmically spaced
pub const NUM_BINS: usize = 32;

/// Magnitude floor of the display, in dB
pub const SPECTRUM_FLOOR_DB: f32 = -72.0;

/// Lowest frequency shown
pub const MIN_DISPLAY_HZ: f32 = 20.0;

/// Highest frequency shown (capped at Nyquist)
pub const MAX_DISPLAY_HZ: f32 = 20_000.0;

/// Rise factor per analysis frame (higher = faster response to new peaks)
const SPECTRUM_ATTACK: f32 = 0.5;

/// Fall factor per analysis frame (0.0 = instant, 1.0 = hold)
const SPECTRUM_DECAY: f32 = 0.7;

/// Supported analysis window lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FftOrder {
    #[default]
    Order2048 = 11,
    Order4096 = 12,
    Order8192 = 13,
}

impl FftOrder {
    pub const ALL: [FftOrder; 3] = [FftOrder::Order2048, FftOrder::Order4096, FftOrder::Order8192];

    pub const fn size(self) -> usize {
        1 << (self as usize)
    }

    /// Look up an order by its window length
    pub fn from_size(size: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|order| order.size() == size)
    }
}

/// One published analysis result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumFrame {
    /// Smoothed magnitude per display bin, in dB (floored)
    pub bins_db: [f32; NUM_BINS],
    /// Increments every time a new frame is published
    pub sequence: u64,
}

impl Default for SpectrumFrame {
    fn default() -> Self {
        Self {
            bins_db: [SPECTRUM_FLOOR_DB; NUM_BINS],
            sequence: 0,
        }
    }
}

/// Cloneable read-only view of the latest spectrum
#[derive(Clone)]
pub struct SpectrumHandle {
    frame: Arc<RwLock<SpectrumFrame>>,
}

impl SpectrumHandle {
    pub fn latest(&self) -> SpectrumFrame {
        *self.frame.read()
    }
}

/// Lower/upper edge frequency of a display bin
pub fn bin_edges_hz(index: usize, sample_rate: f32) -> (f32, f32) {
    let max_hz = MAX_DISPLAY_HZ.min(sample_rate * 0.5);
    let ratio = (max_hz / MIN_DISPLAY_HZ).ln() / NUM_BINS as f32;
    let low = MIN_DISPLAY_HZ * (ratio * index as f32).exp();
    let high = MIN_DISPLAY_HZ * (ratio * (index + 1) as f32).exp();
    (low, high)
}

/// Spectrum analyzer fed from an [`AnalysisConsumer`]
pub struct SpectrumAnalyzer {
    consumer: AnalysisConsumer,
    sample_rate: f32,
    order: FftOrder,
    refresh_hz: f32,
    /// Circular history of the latest `fft_size` samples
    history: Vec<f32>,
    write_pos: usize,
    filled: usize,
    samples_since_fft: usize,
    hop: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    fft_buffer: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    pull_buffer: Vec<f32>,
    raw: [f32; NUM_BINS],
    smoothed: [f32; NUM_BINS],
    sequence: u64,
    frame: Arc<RwLock<SpectrumFrame>>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer computing at most `refresh_hz` frames per second
    pub fn new(consumer: AnalysisConsumer, sample_rate: f32, order: FftOrder, refresh_hz: f32) -> Self {
        let mut analyzer = Self {
            consumer,
            sample_rate,
            order,
            refresh_hz: refresh_hz.max(1.0),
            history: Vec::new(),
            write_pos: 0,
            filled: 0,
            samples_since_fft: 0,
            hop: 1,
            window: Vec::new(),
            fft: FftPlanner::new().plan_fft_forward(order.size()),
            fft_buffer: Vec::new(),
            fft_scratch: Vec::new(),
            pull_buffer: vec![0.0; 1024],
            raw: [SPECTRUM_FLOOR_DB; NUM_BINS],
            smoothed: [SPECTRUM_FLOOR_DB; NUM_BINS],
            sequence: 0,
            frame: Arc::new(RwLock::new(SpectrumFrame::default())),
        };
        analyzer.set_order(order);
        analyzer
    }

    /// Switch window length; history and smoothing restart
    pub fn set_order(&mut self, order: FftOrder) {
        let size = order.size();
        self.order = order;
        self.fft = FftPlanner::new().plan_fft_forward(size);
        self.window = (0..size)
            .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f32 / (size - 1) as f32).cos()))
            .collect();
        self.fft_buffer = vec![Complex::new(0.0, 0.0); size];
        self.fft_scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];
        self.history = vec![0.0; size];
        self.update_hop();
        self.reset();
    }

    pub fn order(&self) -> FftOrder {
        self.order
    }

    pub fn set_refresh_rate(&mut self, refresh_hz: f32) {
        self.refresh_hz = refresh_hz.max(1.0);
        self.update_hop();
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn handle(&self) -> SpectrumHandle {
        SpectrumHandle {
            frame: Arc::clone(&self.frame),
        }
    }

    /// Unsmoothed magnitudes from the most recent FFT
    pub fn raw_spectrum(&self) -> [f32; NUM_BINS] {
        self.raw
    }

    /// Smoothed magnitudes, as published
    pub fn spectrum(&self) -> [f32; NUM_BINS] {
        self.smoothed
    }

    /// Samples lost on the audio side because the FIFO was full
    pub fn dropped_samples(&self) -> u64 {
        self.consumer.dropped_samples()
    }

    /// Drain the FIFO and compute a new frame when enough samples arrived
    ///
    /// Returns true if a new frame was published.
    pub fn update(&mut self) -> bool {
        loop {
            let read = self.consumer.pop_into(&mut self.pull_buffer);
            if read == 0 {
                break;
            }
            for i in 0..read {
                self.history[self.write_pos] = self.pull_buffer[i];
                self.write_pos = (self.write_pos + 1) % self.history.len();
            }
            self.filled = (self.filled + read).min(self.history.len());
            self.samples_since_fft += read;
        }

        if self.filled < self.history.len() || self.samples_since_fft < self.hop {
            return false;
        }
        self.samples_since_fft = 0;

        self.compute();
        self.publish();
        true
    }

    /// Clear history and the published spectrum
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.write_pos = 0;
        self.filled = 0;
        self.samples_since_fft = 0;
        self.raw = [SPECTRUM_FLOOR_DB; NUM_BINS];
        self.smoothed = [SPECTRUM_FLOOR_DB; NUM_BINS];
        *self.frame.write() = SpectrumFrame {
            sequence: self.sequence,
            ..Default::default()
        };
    }

    fn update_hop(&mut self) {
        self.hop = ((self.sample_rate / self.refresh_hz) as usize).max(1);
    }

    fn compute(&mut self) {
        let size = self.history.len();

        // Oldest sample first
        for i in 0..size {
            let sample = self.history[(self.write_pos + i) % size];
            self.fft_buffer[i] = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.fft_scratch);

        // A full-scale sine peaks at size/4 after the Hann window
        let reference = size as f32 / 4.0;
        let bin_hz = self.sample_rate / size as f32;
        let nyquist = size / 2;

        for (index, raw) in self.raw.iter_mut().enumerate() {
            let (low_hz, high_hz) = bin_edges_hz(index, self.sample_rate);
            let start = ((low_hz / bin_hz).round() as usize).clamp(1, nyquist);
            let end = ((high_hz / bin_hz).round() as usize).clamp(start + 1, nyquist + 1);

            let peak = self.fft_buffer[start..end]
                .iter()
                .map(|c| c.norm())
                .fold(0.0_f32, f32::max);

            *raw = (20.0 * (peak / reference).max(1.0e-10).log10()).max(SPECTRUM_FLOOR_DB);
        }

        for (smoothed, &raw) in self.smoothed.iter_mut().zip(&self.raw) {
            if raw > *smoothed {
                *smoothed += (raw - *smoothed) * SPECTRUM_ATTACK;
            } else {
                *smoothed = *smoothed * SPECTRUM_DECAY + raw * (1.0 - SPECTRUM_DECAY);
            }
        }
    }

    fn publish(&mut self) {
        self.sequence += 1;
        *self.frame.write() = SpectrumFrame {
            bins_db: self.smoothed,
            sequence: self.sequence,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fifo::analysis_fifo;

    const SAMPLE_RATE: f32 = 48000.0;

    fn sine(freq: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SAMPLE_RATE).sin())
            .collect()
    }

    #[test]
    fn test_fft_order_sizes() {
        assert_eq!(FftOrder::Order2048.size(), 2048);
        assert_eq!(FftOrder::Order4096.size(), 4096);
        assert_eq!(FftOrder::Order8192.size(), 8192);
        assert_eq!(FftOrder::from_size(4096), Some(FftOrder::Order4096));
        assert_eq!(FftOrder::from_size(1000), None);
        assert_eq!(FftOrder::default(), FftOrder::Order2048);
    }

    #[test]
    fn test_bin_edges_are_log_spaced() {
        let (first_low, _) = bin_edges_hz(0, SAMPLE_RATE);
        let (_, last_high) = bin_edges_hz(NUM_BINS - 1, SAMPLE_RATE);
        assert!((first_low - MIN_DISPLAY_HZ).abs() < 0.01);
        assert!((last_high - MAX_DISPLAY_HZ).abs() < 1.0);

        for i in 0..NUM_BINS - 1 {
            assert!((bin_edges_hz(i, SAMPLE_RATE).1 - bin_edges_hz(i + 1, SAMPLE_RATE).0).abs() < 0.01);
        }

        // Low sample rates cap the display at Nyquist
        let (_, top) = bin_edges_hz(NUM_BINS - 1, 22050.0);
        assert!((top - 11025.0).abs() < 1.0);
    }

    #[test]
    fn test_starts_at_floor() {
        let (_, consumer) = analysis_fifo(4096);
        let analyzer = SpectrumAnalyzer::new(consumer, SAMPLE_RATE, FftOrder::Order2048, 30.0);
        let frame = analyzer.handle().latest();
        assert_eq!(frame.sequence, 0);
        assert!(frame.bins_db.iter().all(|&db| db == SPECTRUM_FLOOR_DB));
    }

    #[test]
    fn test_needs_full_window_before_first_frame() {
        let (mut producer, consumer) = analysis_fifo(8192);
        let mut analyzer = SpectrumAnalyzer::new(consumer, SAMPLE_RATE, FftOrder::Order2048, 30.0);

        producer.push(&sine(1000.0, 0.5, 1000));
        assert!(!analyzer.update());

        producer.push(&sine(1000.0, 0.5, 2000));
        assert!(analyzer.update());
        assert_eq!(analyzer.handle().latest().sequence, 1);

        // Nothing new: no frame
        assert!(!analyzer.update());
    }

    #[test]
    fn test_sine_peaks_in_matching_bin() {
        let (mut producer, consumer) = analysis_fifo(8192);
        let mut analyzer = SpectrumAnalyzer::new(consumer, SAMPLE_RATE, FftOrder::Order4096, 30.0);

        producer.push(&sine(1000.0, 0.5, 6000));
        assert!(analyzer.update());

        let raw = analyzer.raw_spectrum();
        let loudest = (0..NUM_BINS)
            .max_by(|&a, &b| raw[a].total_cmp(&raw[b]))
            .unwrap();
        let (low, high) = bin_edges_hz(loudest, SAMPLE_RATE);
        assert!(low <= 1000.0 && 1000.0 <= high, "peak in bin {} ({}..{} Hz)", loudest, low, high);

        // Half-scale sine reads about -6 dB (Hann scalloping < 1.5 dB)
        assert!(raw[loudest] > -8.0 && raw[loudest] < -5.0, "{}", raw[loudest]);

        // Smoothing moves halfway toward the first peak
        let smoothed = analyzer.spectrum()[loudest];
        assert!((smoothed - (SPECTRUM_FLOOR_DB + (raw[loudest] - SPECTRUM_FLOOR_DB) * 0.5)).abs() < 1e-3);
    }

    #[test]
    fn test_silence_stays_at_floor() {
        let (mut producer, consumer) = analysis_fifo(4096);
        let mut analyzer = SpectrumAnalyzer::new(consumer, SAMPLE_RATE, FftOrder::Order2048, 30.0);
        producer.push(&[0.0; 4000]);
        assert!(analyzer.update());
        assert!(analyzer.raw_spectrum().iter().all(|&db| db == SPECTRUM_FLOOR_DB));
    }

    #[test]
    fn test_set_order_restarts_history() {
        let (mut producer, consumer) = analysis_fifo(16384);
        let mut analyzer = SpectrumAnalyzer::new(consumer, SAMPLE_RATE, FftOrder::Order2048, 30.0);
        producer.push(&sine(440.0, 0.5, 3000));
        assert!(analyzer.update());

        analyzer.set_order(FftOrder::Order8192);
        assert_eq!(analyzer.order(), FftOrder::Order8192);
        assert!(analyzer.spectrum().iter().all(|&db| db == SPECTRUM_FLOOR_DB));

        producer.push(&sine(440.0, 0.5, 5000));
        assert!(!analyzer.update());
        producer.push(&sine(440.0, 0.5, 4000));
        assert!(analyzer.update());
    }
}
