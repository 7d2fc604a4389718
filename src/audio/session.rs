//! Processing sessions
//!
//! A session is one start-to-stop run of the audio loop on its own worker
//! thread. The worker is the only owner of the capture device, the stability
//! filter and the note sink; everything else talks to it through the stop
//! flag, the shared stability parameters and the notification channel.

use crossbeam_channel::{bounded, Sender};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::capture::{BlockRead, CaptureSource};
use crate::error::SessionError;
use crate::pitch::estimator::{mean_square, AutocorrelationEstimator, FrequencyEstimator, DEFAULT_WINDOW_SIZE};
use crate::sink::NoteEventSink;
use crate::stability::filter::StabilityFilter;
use crate::stability::parameters::StabilityParameters;
use crate::types::events::{Delivery, NoteEvent, Notification, PitchObservation};
use crate::types::note::note_name;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Builds the sink on the worker thread
pub type SinkFactory = Box<dyn FnOnce() -> Result<Box<dyn NoteEventSink>, SessionError> + Send>;
/// Opens the capture source on the worker thread
pub type CaptureFactory = Box<dyn FnOnce() -> Result<Box<dyn CaptureSource>, SessionError> + Send>;

/// Fixed per-session audio settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// Frames per processed block
    pub block_size: usize,
    /// Samples the estimator analyses per block
    pub analysis_window: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            analysis_window: DEFAULT_WINDOW_SIZE,
        }
    }
}

/// Counters reported when a session ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub blocks: u64,
    pub events: u64,
    pub overflows: u64,
}

/// Capture -> estimate -> stabilize -> dispatch, one block per step
pub struct AudioLoop<C, E, S> {
    capture: C,
    estimator: E,
    sink: S,
    filter: StabilityFilter,
    params: Arc<StabilityParameters>,
    notifications: Sender<Notification>,
    block: Vec<f32>,
    stats: LoopStats,
}

impl<C, E, S> AudioLoop<C, E, S>
where
    C: CaptureSource,
    E: FrequencyEstimator,
    S: NoteEventSink,
{
    pub fn new(
        capture: C,
        estimator: E,
        sink: S,
        params: Arc<StabilityParameters>,
        notifications: Sender<Notification>,
        block_size: usize,
    ) -> Self {
        let filter = StabilityFilter::new(params.snapshot().window_capacity);
        Self {
            capture,
            estimator,
            sink,
            filter,
            params,
            notifications,
            block: vec![0.0; block_size.max(1)],
            stats: LoopStats::default(),
        }
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Run until `stop` is raised, the source ends, or a fatal error
    pub fn run(&mut self, stop: &AtomicBool) -> Result<(), SessionError> {
        self.filter.reset();
        self.notify(Notification::Status(format!("Processing started ({})", self.sink.describe())));

        while !stop.load(Ordering::Relaxed) {
            if !self.step()? {
                info!("Input exhausted after {} blocks", self.stats.blocks);
                break;
            }
        }
        Ok(())
    }

    /// Process one block; `Ok(false)` once the source is exhausted
    pub fn step(&mut self) -> Result<bool, SessionError> {
        match self.capture.read_block(&mut self.block)? {
            BlockRead::Finished => return Ok(false),
            BlockRead::Pending => return Ok(true),
            BlockRead::Ready { overflows } => {
                if overflows > 0 {
                    debug!("Capture overflow, {} chunks dropped", overflows);
                    self.stats.overflows += overflows;
                }
            }
        }

        // Read once so a concurrent update cannot split a block's decision
        let config = self.params.snapshot();
        let observation = PitchObservation::new(self.estimator.estimate(&self.block), mean_square(&self.block));
        self.stats.blocks += 1;

        self.notify(Notification::Level {
            frequency: observation.frequency,
            amplitude: observation.amplitude,
        });

        if let Some(event) = self.filter.observe(observation, &config) {
            self.dispatch(event)?;
        }
        Ok(true)
    }

    /// Flush the sounding note and release the sink
    /// Runs after a normal stop and after a fatal error alike
    pub fn shutdown(mut self) -> LoopStats {
        if let Some(event) = self.filter.flush() {
            if let Err(e) = self.dispatch(event) {
                warn!("Final note off failed: {}", e);
            }
        }
        if let Err(e) = self.sink.release_all() {
            warn!("Releasing sink failed: {}", e);
        }
        self.filter.reset();
        self.notify(Notification::Status("Processing stopped".to_string()));

        // Fields drop in declaration order: capture first, then the sink
        self.stats
    }

    fn dispatch(&mut self, event: NoteEvent) -> Result<(), SessionError> {
        self.stats.events += 1;
        match event {
            NoteEvent::Changed { note } => {
                let delivery = self.sink.on_note_changed(note)?;
                let status = match &delivery {
                    Delivery::Midi { note: wire } => format!("Note: {} ({}) -> MIDI {}", note, note_name(note), wire),
                    Delivery::Key(key) => format!("Note: {} ({}) -> Key: {}", note, note_name(note), key),
                    Delivery::Unmapped => format!("Note: {} ({}) (not mapped)", note, note_name(note)),
                };
                info!("{}", status);
                self.notify(Notification::Status(status));
                self.notify(Notification::NoteChanged { note, delivery });
            }
            NoteEvent::Off => {
                self.sink.on_note_off()?;
                debug!("Note off");
                self.notify(Notification::NoteOff);
            }
        }
        Ok(())
    }

    fn notify(&self, notification: Notification) {
        // A departed listener must not stop the audio loop
        let _ = self.notifications.send(notification);
    }
}

/// Handle to a running session worker
pub struct Session {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Session {
    /// Spawn the worker and wait until the sink and capture are open
    ///
    /// The sink is built first; if it is unavailable the capture device is
    /// never opened. Start-up failures are returned here, later failures
    /// arrive as `Notification::Stopped` with an error.
    pub fn start(
        settings: SessionSettings,
        open_sink: SinkFactory,
        open_capture: CaptureFactory,
        params: Arc<StabilityParameters>,
        notifications: Sender<Notification>,
    ) -> Result<Self, SessionError> {
        if settings.block_size == 0 || settings.analysis_window < settings.block_size {
            return Err(SessionError::Config(format!(
                "block size {} must be non-zero and within the analysis window {}",
                settings.block_size, settings.analysis_window
            )));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let (ready_tx, ready_rx) = bounded::<Result<(), SessionError>>(1);

        let worker = thread::Builder::new()
            .name("stylomidi-session".to_string())
            .spawn(move || {
                let sink = match open_sink() {
                    Ok(sink) if sink.is_available() => sink,
                    Ok(sink) => {
                        let reason = format!("{} has no usable backend", sink.describe());
                        let _ = ready_tx.send(Err(SessionError::SinkUnavailable(reason)));
                        return;
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let capture = match open_capture() {
                    Ok(capture) => capture,
                    Err(e) => {
                        drop(sink);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let estimator = AutocorrelationEstimator::new(capture.sample_rate(), settings.analysis_window);
                let mut audio_loop = AudioLoop::new(
                    capture,
                    estimator,
                    sink,
                    params,
                    notifications.clone(),
                    settings.block_size,
                );
                let _ = ready_tx.send(Ok(()));

                let result = audio_loop.run(&stop_flag);
                if let Err(e) = &result {
                    warn!("Session ended with error: {}", e);
                }
                let stats = audio_loop.shutdown();
                info!(
                    "Session finished: {} blocks, {} events, {} overflows",
                    stats.blocks, stats.events, stats.overflows
                );

                let _ = notifications.send(Notification::Stopped {
                    error: result.err().map(|e| e.to_string()),
                    overflows: stats.overflows,
                });
            })
            .map_err(|e| SessionError::Device(format!("Failed to spawn session worker: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                stop,
                worker: Some(worker),
            }),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(SessionError::Device("Session worker exited during start".to_string()))
            }
        }
    }

    /// Signal the worker and wait for its flush-and-release to finish
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Session worker panicked");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<C: CaptureSource + ?Sized> CaptureSource for Box<C> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn read_block(&mut self, block: &mut [f32]) -> Result<BlockRead, SessionError> {
        (**self).read_block(block)
    }
}

impl<S: NoteEventSink + ?Sized> NoteEventSink for Box<S> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn on_note_changed(&mut self, note: i32) -> Result<Delivery, crate::error::SinkError> {
        (**self).on_note_changed(note)
    }

    fn on_note_off(&mut self) -> Result<(), crate::error::SinkError> {
        (**self).on_note_off()
    }

    fn release_all(&mut self) -> Result<(), crate::error::SinkError> {
        (**self).release_all()
    }
}
