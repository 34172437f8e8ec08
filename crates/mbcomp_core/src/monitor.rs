//! Meter Monitor
//!
//! Background thread that turns the lock-free telemetry (and, optionally,
//! the spectrum analyzer) into [`Event`]s for a UI.
//!
//! # Architecture
//!
//! ```text
//! UI thread ──Command (bounded)──▶ "mbcomp-meters" thread ──Event (unbounded)──▶ UI thread
//!                                        │
//!                                        ├── Telemetry::levels()   (atomic loads)
//!                                        └── SpectrumAnalyzer::update()
//! ```
//!
//! The monitor never touches the audio thread: it only reads meters and
//! drains the analysis FIFO.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use mbcomp_dsp::SpectrumAnalyzer;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::message::{Command, Event};
use crate::telemetry::Telemetry;

pub const MIN_REFRESH_HZ: f32 = 1.0;
pub const MAX_REFRESH_HZ: f32 = 240.0;

fn refresh_interval(refresh_hz: f32) -> Duration {
    let hz = if refresh_hz.is_finite() {
        refresh_hz.clamp(MIN_REFRESH_HZ, MAX_REFRESH_HZ)
    } else {
        MIN_REFRESH_HZ
    };
    Duration::from_secs_f32(1.0 / hz)
}

/// Handle to the meter monitor thread
pub struct MeterMonitor {
    command_sender: Sender<Command>,
    event_receiver: Receiver<Event>,
    thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
}

impl MeterMonitor {
    /// Start publishing band levels at `refresh_hz`
    pub fn spawn(telemetry: Telemetry, refresh_hz: f32) -> EngineResult<Self> {
        Self::start(telemetry, None, refresh_hz)
    }

    /// Start publishing band levels and spectrum frames
    pub fn with_analyzer(
        telemetry: Telemetry,
        analyzer: SpectrumAnalyzer,
        refresh_hz: f32,
    ) -> EngineResult<Self> {
        Self::start(telemetry, Some(analyzer), refresh_hz)
    }

    fn start(
        telemetry: Telemetry,
        analyzer: Option<SpectrumAnalyzer>,
        refresh_hz: f32,
    ) -> EngineResult<Self> {
        let (command_sender, command_receiver) = bounded::<Command>(32);
        let (event_sender, event_receiver) = unbounded::<Event>();

        let is_running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&is_running);

        let thread = thread::Builder::new()
            .name("mbcomp-meters".into())
            .spawn(move || {
                Self::monitor_thread_main(
                    command_receiver,
                    event_sender,
                    telemetry,
                    analyzer,
                    refresh_hz,
                );
                running_clone.store(false, Ordering::SeqCst);
            })
            .map_err(|e| EngineError::ThreadSpawnError(e.to_string()))?;

        Ok(Self {
            command_sender,
            event_receiver,
            thread: Some(thread),
            is_running,
        })
    }

    /// Ask for an immediate meter update
    pub fn request_levels(&self) -> EngineResult<()> {
        self.send_command(Command::RequestLevels)
    }

    pub fn set_refresh_rate(&self, refresh_hz: f32) -> EngineResult<()> {
        self.send_command(Command::SetRefreshRate(refresh_hz))
    }

    /// Stop the thread and wait for it to exit
    pub fn shutdown(&mut self) {
        let _ = self.command_sender.send(Command::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Get next event (non-blocking)
    pub fn poll_event(&self) -> Option<Event> {
        self.event_receiver.try_recv().ok()
    }

    /// Get next event, waiting at most `timeout`
    pub fn wait_event(&self, timeout: Duration) -> Option<Event> {
        self.event_receiver.recv_timeout(timeout).ok()
    }

    fn send_command(&self, command: Command) -> EngineResult<()> {
        self.command_sender
            .send(command)
            .map_err(|_| EngineError::ChannelSendError)
    }

    fn monitor_thread_main(
        command_receiver: Receiver<Command>,
        event_sender: Sender<Event>,
        telemetry: Telemetry,
        mut analyzer: Option<SpectrumAnalyzer>,
        refresh_hz: f32,
    ) {
        info!("Meter monitor started at {} Hz", refresh_hz);
        let mut interval = refresh_interval(refresh_hz);

        loop {
            match command_receiver.recv_timeout(interval) {
                Ok(Command::RequestLevels) => {
                    let _ = event_sender.send(Event::meter_update(&telemetry.levels()));
                }
                Ok(Command::SetRefreshRate(hz)) => {
                    if !hz.is_finite() {
                        warn!("Ignoring invalid refresh rate: {}", hz);
                        let _ = event_sender.send(Event::error(format!("Invalid refresh rate: {}", hz)));
                        continue;
                    }
                    interval = refresh_interval(hz);
                    if let Some(analyzer) = analyzer.as_mut() {
                        analyzer.set_refresh_rate(hz);
                    }
                    debug!("Meter refresh interval now {:?}", interval);
                }
                Ok(Command::Shutdown) => break,
                Err(RecvTimeoutError::Timeout) => {
                    if event_sender
                        .send(Event::meter_update(&telemetry.levels()))
                        .is_err()
                    {
                        debug!("Event receiver dropped");
                        break;
                    }
                    if let Some(analyzer) = analyzer.as_mut() {
                        if analyzer.update() {
                            let frame = analyzer.handle().latest();
                            let _ = event_sender.send(Event::spectrum_update(&frame, analyzer.dropped_samples()));
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let _ = event_sender.send(Event::Stopped);
        info!("Meter monitor stopped");
    }
}

impl Drop for MeterMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbcomp_dsp::{analysis_fifo, Band, BandLevels, FftOrder};

    fn wait_for<F: Fn(&Event) -> bool>(monitor: &MeterMonitor, predicate: F) -> Option<Event> {
        for _ in 0..100 {
            match monitor.wait_event(Duration::from_millis(50)) {
                Some(event) if predicate(&event) => return Some(event),
                _ => {}
            }
        }
        None
    }

    #[test]
    fn test_monitor_starts_and_stops() {
        let mut monitor = MeterMonitor::spawn(Telemetry::new(), 30.0).unwrap();
        assert!(monitor.is_running());

        monitor.shutdown();
        assert!(!monitor.is_running());
        assert!(std::iter::from_fn(|| monitor.poll_event()).any(|e| e == Event::Stopped));
    }

    #[test]
    fn test_request_levels() {
        let telemetry = Telemetry::new();
        telemetry.meter(Band::High).publish(BandLevels {
            input_db: -6.0,
            output_db: -9.0,
        });

        let monitor = MeterMonitor::spawn(telemetry, 1.0).unwrap();
        monitor.request_levels().unwrap();

        let event = wait_for(&monitor, |e| matches!(e, Event::MeterUpdate { .. }));
        if let Some(Event::MeterUpdate { bands }) = event {
            assert_eq!(bands[2].gain_reduction_db, 3.0);
            assert_eq!(bands[0].input_db, -100.0);
        } else {
            panic!("No meter update received");
        }
    }

    #[test]
    fn test_periodic_updates_and_refresh_rate() {
        let monitor = MeterMonitor::spawn(Telemetry::new(), 1.0).unwrap();
        monitor.set_refresh_rate(100.0).unwrap();
        assert!(wait_for(&monitor, |e| matches!(e, Event::MeterUpdate { .. })).is_some());

        monitor.set_refresh_rate(f32::NAN).unwrap();
        assert!(wait_for(&monitor, |e| matches!(e, Event::Error { .. })).is_some());
    }

    #[test]
    fn test_spectrum_events() {
        let (mut producer, consumer) = analysis_fifo(8192);
        let analyzer = SpectrumAnalyzer::new(consumer, 48000.0, FftOrder::Order2048, 100.0);
        let monitor = MeterMonitor::with_analyzer(Telemetry::new(), analyzer, 100.0).unwrap();

        let tone: Vec<f32> = (0..4096)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 48000.0).sin())
            .collect();
        producer.push(&tone);

        let event = wait_for(&monitor, |e| matches!(e, Event::SpectrumUpdate { .. }));
        if let Some(Event::SpectrumUpdate { bins_db, sequence, .. }) = event {
            assert_eq!(bins_db.len(), 32);
            assert!(sequence >= 1);
        } else {
            panic!("No spectrum update received");
        }
    }

    #[test]
    fn test_drop_joins_thread() {
        let monitor = MeterMonitor::spawn(Telemetry::new(), 60.0).unwrap();
        let running = Arc::clone(&monitor.is_running);
        drop(monitor);
        assert!(!running.load(Ordering::SeqCst));
    }
}
