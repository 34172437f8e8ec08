//! Multiband Processor
//!
//! The per-block pipeline of the compressor:
//!
//! ```text
//! host ─▶ GainStage(in) ─▶ BandSplitter ─┬▶ CompressorBand(low)  ─┐
//!                                         ├▶ CompressorBand(mid)  ─┼▶ mix ─▶ GainStage(out) ─▶ host
//!                                         └▶ CompressorBand(high) ─┘                │
//!                                                                        AnalysisProducer
//! ```
//!
//! # Real-time Safety
//!
//! `prepare()` allocates every buffer. `process()` and
//! `process_interleaved()` read one parameter snapshot per sub-block with
//! relaxed atomic loads, never lock, never allocate and never log. Host
//! buffers longer than the prepared block size are processed in
//! consecutive sub-blocks.

use std::sync::Arc;

use mbcomp_dsp::{
    analysis_fifo, mix, AnalysisProducer, AudioBuffer, AudioProcessor, Band, BandSplitter,
    CompressorBand, FftOrder, GainStage, ProcessSpec, SpectrumAnalyzer, NUM_BANDS,
};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::params::{ParameterSnapshot, ParameterStore, ProcessorParams};
use crate::telemetry::Telemetry;

/// Three-band compressor driven by a [`ParameterStore`]
pub struct MultibandProcessor {
    store: Arc<ParameterStore>,
    params: ProcessorParams,
    telemetry: Telemetry,
    spec: Option<ProcessSpec>,
    input_gain: GainStage,
    output_gain: GainStage,
    splitter: BandSplitter,
    bands: [CompressorBand; NUM_BANDS],
    /// Working buffer, one sub-block long
    block: AudioBuffer,
    analysis: Option<AnalysisProducer>,
}

impl MultibandProcessor {
    /// Create an unprepared processor; parameter handles are resolved here
    pub fn new(store: Arc<ParameterStore>) -> EngineResult<Self> {
        let params = ProcessorParams::resolve(&store)?;
        let telemetry = Telemetry::new();
        let bands = Band::ALL.map(|band| CompressorBand::new(telemetry.meter(band)));

        Ok(Self {
            store,
            params,
            telemetry,
            spec: None,
            input_gain: GainStage::new(),
            output_gain: GainStage::new(),
            splitter: BandSplitter::new(),
            bands,
            block: AudioBuffer::new(0, 0),
            analysis: None,
        })
    }

    /// Allocate buffers and re-prime all filter, envelope and gain state
    ///
    /// An invalid spec is rejected and the previous preparation (if any)
    /// stays in effect.
    pub fn prepare(&mut self, spec: ProcessSpec) -> EngineResult<()> {
        spec.validate()?;

        let snapshot = self.params.snapshot(&self.store);

        // Targets first so prepare() starts the gains settled, not ramping
        self.input_gain.set_target_db(snapshot.gain_in_db);
        self.output_gain.set_target_db(snapshot.gain_out_db);
        self.input_gain.prepare(&spec);
        self.output_gain.prepare(&spec);

        self.splitter.prepare(&spec);
        self.splitter
            .set_crossovers(snapshot.low_mid_hz, snapshot.mid_high_hz);

        for (band, state) in self.bands.iter_mut().zip(snapshot.bands) {
            band.update_settings(state.settings);
            band.set_flags(state.flags);
            band.prepare(&spec);
        }

        self.block = AudioBuffer::new(spec.channels, spec.max_block_size);
        self.spec = Some(spec);

        info!(
            "Multiband processor prepared: {} Hz, {} channels, {} frames",
            spec.sample_rate, spec.channels, spec.max_block_size
        );
        Ok(())
    }

    pub fn is_prepared(&self) -> bool {
        self.spec.is_some()
    }

    pub fn spec(&self) -> Option<ProcessSpec> {
        self.spec
    }

    pub fn store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    /// Shared band meters
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Crossover frequencies of the most recent block
    pub fn crossovers(&self) -> (f32, f32) {
        self.splitter.crossovers()
    }

    /// Route the processed output (first channel) into an analysis FIFO
    pub fn attach_analysis(&mut self, producer: AnalysisProducer) {
        self.analysis = Some(producer);
        debug!("Analysis FIFO attached");
    }

    pub fn detach_analysis(&mut self) -> Option<AnalysisProducer> {
        self.analysis.take()
    }

    /// Create an analysis FIFO of `fifo_frames` samples, route the output
    /// into it and return a spectrum analyzer reading the other end
    ///
    /// The analyzer runs at the prepared sample rate, so this fails with
    /// [`EngineError::NotPrepared`] before `prepare()`.
    pub fn attach_analyzer(
        &mut self,
        fifo_frames: usize,
        order: FftOrder,
        refresh_hz: f32,
    ) -> EngineResult<SpectrumAnalyzer> {
        let spec = self.spec.ok_or(EngineError::NotPrepared)?;
        let (producer, consumer) = analysis_fifo(fifo_frames);
        self.attach_analysis(producer);
        Ok(SpectrumAnalyzer::new(consumer, spec.sample_rate, order, refresh_hz))
    }

    /// Clear all processing history without reallocating
    pub fn reset(&mut self) {
        self.splitter.reset();
        for band in &mut self.bands {
            band.reset();
        }
        self.input_gain.reset();
        self.output_gain.reset();
        self.telemetry.reset();
    }

    /// Process a planar buffer in place
    ///
    /// Before `prepare()` the buffer is left untouched. Only the channels
    /// shared with the prepared layout are processed; missing channels are
    /// treated as silence.
    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        let Some(spec) = self.spec else {
            return;
        };
        let missing_channels = buffer.num_channels() < spec.channels;

        let mut offset = 0;
        while offset < buffer.len() {
            let frames = (buffer.len() - offset).min(spec.max_block_size);
            if missing_channels {
                self.block.set_len(frames);
                self.block.clear();
            }
            self.block.copy_from_range(buffer, offset, frames);
            self.process_block();
            self.block.write_to_range(buffer, offset);
            offset += frames;
        }
    }

    /// Process interleaved samples in place using the prepared channel count
    pub fn process_interleaved(&mut self, data: &mut [f32]) {
        let Some(spec) = self.spec else {
            return;
        };

        for chunk in data.chunks_mut(spec.max_block_size * spec.channels) {
            if self.block.read_interleaved(chunk) == 0 {
                continue;
            }
            self.process_block();
            self.block.write_interleaved(chunk);
        }
    }

    /// One sub-block through the full chain; order is fixed
    fn process_block(&mut self) {
        let snapshot: ParameterSnapshot = self.params.snapshot(&self.store);

        self.block.sanitize();

        self.input_gain.set_target_db(snapshot.gain_in_db);
        self.input_gain.process(&mut self.block);
        self.block.sanitize();

        self.splitter
            .split(&self.block, snapshot.low_mid_hz, snapshot.mid_high_hz);

        for ((buffer, band), state) in self
            .splitter
            .bands_mut()
            .iter_mut()
            .zip(self.bands.iter_mut())
            .zip(snapshot.bands)
        {
            buffer.sanitize();
            band.update_settings(state.settings);
            band.set_flags(state.flags);
            band.process(buffer);
            buffer.sanitize();
        }

        mix(self.splitter.bands(), &snapshot.flags(), &mut self.block);

        self.output_gain.set_target_db(snapshot.gain_out_db);
        self.output_gain.process(&mut self.block);
        self.block.sanitize();

        if let Some(analysis) = &mut self.analysis {
            analysis.push_buffer(&self.block);
        }
    }
}
