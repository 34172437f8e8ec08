//! Planar Audio Buffer
//!
//! Fixed-capacity, multi-channel sample storage. Memory is allocated once
//! (at prepare-time); per-block operations only change the active length
//! and the sample contents.

use crate::error::DspError;

/// Magnitudes below this are flushed to zero to keep filter and envelope
/// state out of the denormal range
pub const DENORMAL_THRESHOLD: f32 = 1.0e-15;

/// Replace NaN/Inf with silence and flush denormals to zero
#[inline]
pub fn sanitize_sample(sample: f32) -> f32 {
    if !sample.is_finite() || sample.abs() < DENORMAL_THRESHOLD {
        0.0
    } else {
        sample
    }
}

/// Planar (one `Vec` per channel) audio buffer
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    len: usize,
}

impl AudioBuffer {
    /// Allocate a zeroed buffer; the active length starts at `capacity`
    pub fn new(num_channels: usize, capacity: usize) -> Self {
        Self {
            channels: vec![vec![0.0; capacity]; num_channels],
            len: capacity,
        }
    }

    /// Build a buffer from per-channel sample vectors
    ///
    /// All channels must have the same length.
    pub fn from_channels(channels: Vec<Vec<f32>>) -> Result<Self, DspError> {
        let len = channels.first().map_or(0, Vec::len);
        if let Some(bad) = channels.iter().find(|c| c.len() != len) {
            return Err(DspError::BufferSizeMismatch {
                expected: len,
                got: bad.len(),
            });
        }
        Ok(Self { channels, len })
    }

    /// Deinterleave `[L0, R0, L1, R1, ...]` into a new buffer
    pub fn from_interleaved(data: &[f32], num_channels: usize) -> Self {
        let num_channels = num_channels.max(1);
        let frames = data.len() / num_channels;
        let mut buffer = Self::new(num_channels, frames);
        buffer.read_interleaved(data);
        buffer
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of active frames
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of frames that fit without reallocating
    pub fn capacity(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Change the active length, clamped to capacity. Never allocates.
    ///
    /// Returns the length actually applied.
    pub fn set_len(&mut self, len: usize) -> usize {
        self.len = len.min(self.capacity());
        self.len
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index][..self.len]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        let len = self.len;
        &mut self.channels[index][..len]
    }

    /// Zero the active region
    pub fn clear(&mut self) {
        let len = self.len;
        for channel in &mut self.channels {
            channel[..len].fill(0.0);
        }
    }

    /// Copy `other` into this buffer, taking over its active length
    ///
    /// Only the channels both buffers share are copied; frames beyond this
    /// buffer's capacity are ignored.
    pub fn copy_from(&mut self, other: &AudioBuffer) {
        let len = self.set_len(other.len);
        for (dst, src) in self.channels.iter_mut().zip(&other.channels) {
            dst[..len].copy_from_slice(&src[..len]);
        }
    }

    /// Copy `frames` frames of `other` starting at `offset` into the start
    /// of this buffer, setting the active length accordingly
    pub fn copy_from_range(&mut self, other: &AudioBuffer, offset: usize, frames: usize) {
        let available = other.len.saturating_sub(offset);
        let len = self.set_len(frames.min(available));
        for (dst, src) in self.channels.iter_mut().zip(&other.channels) {
            dst[..len].copy_from_slice(&src[offset..offset + len]);
        }
    }

    /// Write this buffer's active region into `other` starting at `offset`
    pub fn write_to_range(&self, other: &mut AudioBuffer, offset: usize) {
        let len = self.len.min(other.len.saturating_sub(offset));
        for (src, dst) in self.channels.iter().zip(other.channels.iter_mut()) {
            dst[offset..offset + len].copy_from_slice(&src[..len]);
        }
    }

    /// Sum `other`'s active region into this buffer
    pub fn add_from(&mut self, other: &AudioBuffer) {
        let len = self.len.min(other.len);
        for (dst, src) in self.channels.iter_mut().zip(&other.channels) {
            for (d, s) in dst[..len].iter_mut().zip(&src[..len]) {
                *d += *s;
            }
        }
    }

    /// Multiply every active sample by a constant
    pub fn apply_gain(&mut self, gain: f32) {
        let len = self.len;
        for channel in &mut self.channels {
            for sample in &mut channel[..len] {
                *sample *= gain;
            }
        }
    }

    /// Channel-averaged RMS of the active region (linear)
    pub fn rms_level(&self) -> f32 {
        if self.len == 0 || self.channels.is_empty() {
            return 0.0;
        }

        let sum: f32 = self
            .channels
            .iter()
            .map(|channel| {
                let energy: f32 = channel[..self.len].iter().map(|s| s * s).sum();
                (energy / self.len as f32).sqrt()
            })
            .sum();

        sum / self.channels.len() as f32
    }

    /// Flush NaN, Inf and denormals in the active region to zero
    pub fn sanitize(&mut self) {
        let len = self.len;
        for channel in &mut self.channels {
            for sample in &mut channel[..len] {
                *sample = sanitize_sample(*sample);
            }
        }
    }

    /// Fill from an interleaved slice; returns the number of frames read
    pub fn read_interleaved(&mut self, data: &[f32]) -> usize {
        let num_channels = self.num_channels();
        if num_channels == 0 {
            return 0;
        }
        let len = self.set_len(data.len() / num_channels);
        for (frame, samples) in data.chunks_exact(num_channels).take(len).enumerate() {
            for (channel, sample) in self.channels.iter_mut().zip(samples) {
                channel[frame] = *sample;
            }
        }
        len
    }

    /// Write the active region into an interleaved slice; returns frames written
    pub fn write_interleaved(&self, data: &mut [f32]) -> usize {
        let num_channels = self.num_channels();
        if num_channels == 0 {
            return 0;
        }
        let frames = self.len.min(data.len() / num_channels);
        for (frame, samples) in data.chunks_exact_mut(num_channels).take(frames).enumerate() {
            for (channel, sample) in self.channels.iter().zip(samples.iter_mut()) {
                *sample = channel[frame];
            }
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_silent() {
        let buffer = AudioBuffer::new(2, 64);
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.len(), 64);
        assert_eq!(buffer.capacity(), 64);
        assert!(buffer.channel(1).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_from_channels_rejects_ragged_input() {
        let result = AudioBuffer::from_channels(vec![vec![0.0; 4], vec![0.0; 3]]);
        assert_eq!(
            result,
            Err(DspError::BufferSizeMismatch {
                expected: 4,
                got: 3
            })
        );
    }

    #[test]
    fn test_set_len_clamps_to_capacity() {
        let mut buffer = AudioBuffer::new(1, 16);
        assert_eq!(buffer.set_len(8), 8);
        assert_eq!(buffer.channel(0).len(), 8);
        assert_eq!(buffer.set_len(100), 16);
        assert_eq!(buffer.capacity(), 16);
    }

    #[test]
    fn test_interleaved_round_trip() {
        let data = vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let buffer = AudioBuffer::from_interleaved(&data, 2);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.channel(0), &[0.1, 0.2, 0.3]);
        assert_eq!(buffer.channel(1), &[-0.1, -0.2, -0.3]);

        let mut out = vec![0.0; 6];
        assert_eq!(buffer.write_interleaved(&mut out), 3);
        assert_eq!(out, data);
    }

    #[test]
    fn test_add_and_gain() {
        let mut a = AudioBuffer::from_channels(vec![vec![1.0, 2.0]]).unwrap();
        let b = AudioBuffer::from_channels(vec![vec![0.5, 0.5]]).unwrap();
        a.add_from(&b);
        a.apply_gain(2.0);
        assert_eq!(a.channel(0), &[3.0, 5.0]);
    }

    #[test]
    fn test_range_copies() {
        let source = AudioBuffer::from_channels(vec![(0..10).map(|i| i as f32).collect()]).unwrap();
        let mut scratch = AudioBuffer::new(1, 4);

        scratch.copy_from_range(&source, 8, 4);
        assert_eq!(scratch.len(), 2);
        assert_eq!(scratch.channel(0), &[8.0, 9.0]);

        let mut dest = AudioBuffer::new(1, 10);
        scratch.write_to_range(&mut dest, 3);
        assert_eq!(&dest.channel(0)[3..5], &[8.0, 9.0]);
        assert_eq!(dest.channel(0)[5], 0.0);
    }

    #[test]
    fn test_rms_is_channel_averaged() {
        let buffer =
            AudioBuffer::from_channels(vec![vec![1.0, -1.0, 1.0, -1.0], vec![0.0; 4]]).unwrap();
        assert!((buffer.rms_level() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sanitize_flushes_bad_values() {
        let mut buffer =
            AudioBuffer::from_channels(vec![vec![f32::NAN, f32::INFINITY, 1.0e-20, 0.25]]).unwrap();
        buffer.sanitize();
        assert_eq!(buffer.channel(0), &[0.0, 0.0, 0.0, 0.25]);
    }
}
