//! Mbcomp Demo - Headless Host
//!
//! Drives the multiband processor with a synthetic three-band signal in
//! real time, automates a few parameters and prints the monitor events.

use std::f32::consts::PI;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mbcomp_core::{
    Band, EngineConfig, EngineResult, Event, MbcompSettings, MeterMonitor, MultibandProcessor,
    ParamId, ParameterStore, StreamConfig,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mbcomp-demo", about = "Run the three-band compressor on a synthetic signal")]
struct Args {
    /// Length of the run in seconds
    #[arg(short, long, default_value_t = 3.0)]
    seconds: f32,

    #[arg(long, default_value_t = 48000)]
    sample_rate: u32,

    /// Frames per host block
    #[arg(short, long, default_value_t = 512)]
    block_size: u32,

    /// Settings file (defaults to the platform config dir)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the final parameter state back to the settings file
    #[arg(long)]
    save: bool,

    /// Print events as JSON lines instead of log output
    #[arg(long)]
    json: bool,
}

/// Kick-like low thump, a steady mid tone and a gated high tone
fn synth_frame(t: f32) -> f32 {
    let beat = (t * 2.0).fract();
    let low = 0.8 * (-beat * 12.0).exp() * (2.0 * PI * 60.0 * t).sin();
    let mid = 0.3 * (2.0 * PI * 1000.0 * t).sin();
    let high = if (t * 4.0).fract() < 0.5 { 0.2 } else { 0.0 } * (2.0 * PI * 8000.0 * t).sin();
    low + mid + high
}

fn report(event: &Event, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize event: {}", e),
        }
        return;
    }

    match event {
        Event::MeterUpdate { bands } => {
            let line: Vec<String> = bands
                .iter()
                .map(|r| format!("{} {:6.1} dB (GR {:4.1})", r.band, r.output_db, r.gain_reduction_db))
                .collect();
            info!("{}", line.join(" | "));
        }
        Event::SpectrumUpdate { bins_db, sequence, dropped_samples } => {
            let peak = bins_db.iter().copied().fold(f32::MIN, f32::max);
            debug!("Spectrum #{}: peak {:.1} dB, {} dropped", sequence, peak, dropped_samples);
        }
        Event::Error { message } => error!("Monitor error: {}", message),
        Event::Stopped => info!("Monitor stopped"),
    }
}

fn run(args: Args) -> EngineResult<()> {
    let settings = match &args.settings {
        Some(path) => MbcompSettings::load_from(path),
        None => MbcompSettings::load(),
    };

    let store = Arc::new(ParameterStore::new());
    if let Err(e) = settings.apply_to(&store) {
        warn!("Ignoring saved parameters: {}", e);
    }

    let config = EngineConfig {
        stream: StreamConfig {
            sample_rate: args.sample_rate,
            channels: 2,
            buffer_size: args.block_size,
        },
        fft_order: settings.analyzer.order().size(),
        meter_refresh_hz: settings.analyzer.refresh_hz,
        ..EngineConfig::default()
    };
    config.validate()?;
    info!(
        "Stream: {} Hz, {} frames ({:.1} ms)",
        config.stream.sample_rate,
        config.stream.buffer_size,
        config.stream.latency_ms()
    );

    let mut processor = MultibandProcessor::new(Arc::clone(&store))?;
    processor.prepare(config.stream.to_process_spec())?;

    let mut monitor = if settings.analyzer.enabled {
        let analyzer = processor.attach_analyzer(
            config.analysis_fifo_frames,
            config.fft()?,
            config.meter_refresh_hz,
        )?;
        MeterMonitor::with_analyzer(processor.telemetry().clone(), analyzer, config.meter_refresh_hz)?
    } else {
        MeterMonitor::spawn(processor.telemetry().clone(), config.meter_refresh_hz)?
    };

    let sample_rate = config.stream.sample_rate as f32;
    let frames = config.stream.buffer_size as usize;
    let total_blocks = ((args.seconds.max(0.0) * sample_rate) as usize).div_ceil(frames);
    let block_duration = Duration::from_secs_f32(config.stream.latency_ms() / 1000.0);
    let mut interleaved = vec![0.0_f32; frames * 2];

    info!("Processing {} blocks", total_blocks);
    for block in 0..total_blocks {
        let progress = block as f32 / total_blocks.max(1) as f32;

        // Automation: pull the mid threshold down, solo the highs for the last quarter
        store.set(ParamId::Threshold(Band::Mid), -30.0 * progress);
        store.set(ParamId::Solo(Band::High), if progress >= 0.75 { 1.0 } else { 0.0 });

        for (i, frame) in interleaved.chunks_mut(2).enumerate() {
            let t = (block * frames + i) as f32 / sample_rate;
            let sample = synth_frame(t);
            frame[0] = sample;
            frame[1] = sample;
        }

        processor.process_interleaved(&mut interleaved);

        while let Some(event) = monitor.poll_event() {
            report(&event, args.json);
        }
        std::thread::sleep(block_duration);
    }

    monitor.request_levels()?;
    monitor.shutdown();
    while let Some(event) = monitor.poll_event() {
        report(&event, args.json);
    }

    for band in Band::ALL {
        let levels = processor.telemetry().band(band);
        info!(
            "{} band final: in {:.1} dB, out {:.1} dB, GR {:.1} dB",
            band.label(),
            levels.input_db,
            levels.output_db,
            levels.gain_reduction_db()
        );
    }

    if args.save {
        let updated = MbcompSettings::from_store(&store, settings.analyzer.clone());
        match &args.settings {
            Some(path) => updated.save_to(path)?,
            None => updated.save()?,
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mbcomp_core=debug,mbcomp_demo=info")),
        )
        .init();

    info!("Starting Mbcomp demo host");

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
