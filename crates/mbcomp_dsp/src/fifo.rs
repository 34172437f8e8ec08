//! Analysis FIFO
//!
//! Lock-free single-producer/single-consumer sample queue between the audio
//! thread and the spectrum analyzer.
//!
//! # Real-time Safety
//! The producer side never blocks or allocates. When the consumer falls
//! behind, samples that do not fit are dropped and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::buffer::AudioBuffer;

/// Create a connected producer/consumer pair holding up to `capacity` samples
pub fn analysis_fifo(capacity: usize) -> (AnalysisProducer, AnalysisConsumer) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        AnalysisProducer {
            producer,
            dropped: Arc::clone(&dropped),
        },
        AnalysisConsumer { consumer, dropped },
    )
}

/// Audio-thread end of the analysis FIFO
pub struct AnalysisProducer {
    producer: Producer<f32>,
    dropped: Arc<AtomicU64>,
}

impl AnalysisProducer {
    /// Push as many samples as fit; returns how many were written
    pub fn push(&mut self, samples: &[f32]) -> usize {
        let writable = samples.len().min(self.producer.slots());
        let written = self
            .producer
            .write_chunk_uninit(writable)
            .map_or(0, |chunk| chunk.fill_from_iter(samples.iter().copied()));

        let lost = samples.len() - written;
        if lost > 0 {
            self.dropped.fetch_add(lost as u64, Ordering::Relaxed);
        }
        written
    }

    /// Push the first channel of a buffer
    pub fn push_buffer(&mut self, buffer: &AudioBuffer) -> usize {
        if buffer.num_channels() == 0 {
            return 0;
        }
        self.push(buffer.channel(0))
    }

    /// Free space in samples
    pub fn available(&self) -> usize {
        self.producer.slots()
    }

    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Analyzer end of the analysis FIFO
pub struct AnalysisConsumer {
    consumer: Consumer<f32>,
    dropped: Arc<AtomicU64>,
}

impl AnalysisConsumer {
    /// Samples waiting to be read
    pub fn available(&self) -> usize {
        self.consumer.slots()
    }

    /// Move up to `out.len()` samples into `out`; returns how many were read
    pub fn pop_into(&mut self, out: &mut [f32]) -> usize {
        let to_read = out.len().min(self.consumer.slots());
        match self.consumer.read_chunk(to_read) {
            Ok(chunk) => {
                let (first, second) = chunk.as_slices();
                out[..first.len()].copy_from_slice(first);
                out[first.len()..first.len() + second.len()].copy_from_slice(second);
                chunk.commit_all();
                to_read
            }
            Err(_) => 0,
        }
    }

    /// Samples the producer had to drop because the ring was full
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// True once the producer has been dropped
    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }
}
