//! Tone engine: lifecycle, volume and note control over the audio graph
//!
//! The engine owns the graph lazily. Nothing is built until the first
//! `initialize` (explicit, or implied by `play_note`), and `shutdown`
//! tears everything down so a later `initialize` starts fresh.

mod bus;
pub mod graph;
pub mod midi;
mod player;
mod recorder;
mod scheduler;

pub use bus::clamp_volume;
pub use graph::AudioGraph;
pub use player::{default_device_name, list_output_devices, AudioOutput, CpalOutput, OfflineOutput};
pub use recorder::Recorder;

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::melody::Melody;
use crate::synth::{NoteName, VoiceState, REFERENCE_FREQUENCY};

/// Default master volume
pub const DEFAULT_VOLUME: f32 = 0.7;

/// Default sample rate before an output reports its own
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Where the engine is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Uninitialized,
    /// Graph built, output not pulling samples
    Suspended,
    Running,
    /// The output could not be opened; playback is a no-op
    Unavailable,
    Closed,
}

/// The piano tone engine
pub struct ToneEngine {
    output: Box<dyn AudioOutput>,
    graph: Option<Arc<Mutex<AudioGraph>>>,
    status: EngineStatus,
    volume: f32,
    sample_rate: u32,
    warned_unavailable: bool,
}

impl ToneEngine {
    pub fn new(output: Box<dyn AudioOutput>, sample_rate: u32) -> Self {
        Self {
            output,
            graph: None,
            status: EngineStatus::Uninitialized,
            volume: DEFAULT_VOLUME,
            sample_rate,
            warned_unavailable: false,
        }
    }

    /// Engine playing through a cpal device (`None` = default device)
    pub fn with_device(device: Option<String>, sample_rate: u32) -> Self {
        Self::new(Box::new(CpalOutput::new(device)), sample_rate)
    }

    /// Engine with no device, driven by [`ToneEngine::render`]
    pub fn offline(sample_rate: u32) -> Self {
        Self::new(Box::new(OfflineOutput::new()), sample_rate)
    }

    /// Build the graph and open the output. Idempotent.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        match self.status {
            EngineStatus::Suspended | EngineStatus::Running => return Ok(()),
            EngineStatus::Unavailable => {
                return Err(EngineError::Unavailable(
                    "output failed to open earlier".to_string(),
                ))
            }
            EngineStatus::Uninitialized | EngineStatus::Closed => {}
        }

        let graph = Arc::new(Mutex::new(AudioGraph::new(self.sample_rate, self.volume)));
        match self.output.open(Arc::clone(&graph)) {
            Ok(()) => {
                let rate = lock(&graph).sample_rate();
                info!(sample_rate = rate, volume = self.volume, "tone engine initialized");
                self.graph = Some(graph);
                self.status = EngineStatus::Suspended;
                Ok(())
            }
            Err(e) => {
                self.status = EngineStatus::Unavailable;
                if !self.warned_unavailable {
                    warn!("audio unavailable, playback disabled: {}", e);
                    self.warned_unavailable = true;
                }
                Err(e)
            }
        }
    }

    /// Initialize if needed and start the output. Failures are logged.
    pub fn resume(&mut self) {
        if self.status == EngineStatus::Running {
            return;
        }
        if self.initialize().is_err() {
            return;
        }

        match self.output.resume() {
            Ok(()) => self.status = EngineStatus::Running,
            Err(e) => warn!("failed to resume audio output: {}", e),
        }
    }

    /// Pause the output; scheduled work waits with the clock
    pub fn suspend(&mut self) {
        if self.status != EngineStatus::Running {
            return;
        }
        match self.output.suspend() {
            Ok(()) => self.status = EngineStatus::Suspended,
            Err(e) => warn!("failed to suspend audio output: {}", e),
        }
    }

    /// Set the master volume, clamped to [0, 1]
    pub fn set_volume(&mut self, level: f32) {
        self.volume = clamp_volume(level);
        let volume = self.volume;
        self.with_graph(|g| g.set_volume(volume));
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Start a voice for `note`, replacing any voice already on that key
    pub fn play_note(&mut self, note: NoteName) {
        self.resume();
        self.with_graph(|g| g.play_note(note));
    }

    /// [`play_note`](Self::play_note) by name; unparseable names play the
    /// reference A4 (440 Hz)
    pub fn play_note_str(&mut self, name: &str) {
        self.play_note(parse_or_reference(name));
    }

    /// Fade out the voice on `note` over the release time
    pub fn stop_note(&mut self, note: NoteName) {
        self.with_graph(|g| g.stop_note(note));
    }

    pub fn stop_note_str(&mut self, name: &str) {
        self.stop_note(parse_or_reference(name));
    }

    pub fn stop_all_notes(&mut self) {
        self.with_graph(|g| g.stop_all_notes());
    }

    /// Play a melody from the current time, replacing any melody in progress.
    ///
    /// Returns the melody length in seconds (zero when audio is unavailable).
    pub fn play_melody(&mut self, melody: &Melody) -> f64 {
        self.stop_melody();
        self.resume();

        let schedule = melody.schedule();
        let end = self.with_graph(|g| g.schedule_melody(schedule.steps, schedule.length));
        match end {
            Some(_) => {
                info!(melody = %melody.name, length = schedule.length, "melody started");
                schedule.length
            }
            None => 0.0,
        }
    }

    /// Cancel pending melody steps and release every sounding note
    pub fn stop_melody(&mut self) {
        let cancelled = self.with_graph(|g| {
            let cancelled = g.cancel_melody();
            g.stop_all_notes();
            cancelled
        });
        if cancelled == Some(true) {
            debug!("melody stopped");
        }
    }

    pub fn is_melody_playing(&self) -> bool {
        self.with_graph(|g| g.is_melody_playing()).unwrap_or(false)
    }

    /// Drop every voice and close the output. Idempotent.
    pub fn shutdown(&mut self) {
        match self.status {
            EngineStatus::Uninitialized | EngineStatus::Closed => return,
            EngineStatus::Unavailable => {
                self.status = EngineStatus::Closed;
                self.warned_unavailable = false;
                return;
            }
            EngineStatus::Suspended | EngineStatus::Running => {}
        }

        self.with_graph(|g| g.clear());
        self.output.close();
        self.graph = None;
        self.status = EngineStatus::Closed;
        info!("tone engine shut down");
    }

    /// Pull mono samples from the graph, for offline rendering.
    ///
    /// Writes silence when there is no graph.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.with_graph(|g| g.render(out)).is_none() {
            out.fill(0.0);
        }
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn is_unavailable(&self) -> bool {
        self.status == EngineStatus::Unavailable
    }

    /// Sample rate of the graph, or the requested rate before initialization
    pub fn sample_rate(&self) -> u32 {
        self.with_graph(|g| g.sample_rate() as u32)
            .unwrap_or(self.sample_rate)
    }

    pub fn active_notes(&self) -> Vec<NoteName> {
        self.with_graph(|g| g.active_notes()).unwrap_or_default()
    }

    pub fn voice_count(&self) -> usize {
        self.with_graph(|g| g.voice_count()).unwrap_or(0)
    }

    pub fn voice_state(&self, note: NoteName) -> Option<VoiceState> {
        self.with_graph(|g| g.voice_state(&note)).flatten()
    }

    /// Graph clock in seconds (zero before initialization)
    pub fn current_time(&self) -> f64 {
        self.with_graph(|g| g.now()).unwrap_or(0.0)
    }

    fn with_graph<R>(&self, f: impl FnOnce(&mut AudioGraph) -> R) -> Option<R> {
        let graph = self.graph.as_ref()?;
        let mut guard = lock(graph);
        Some(f(&mut guard))
    }
}

impl Drop for ToneEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock(graph: &Mutex<AudioGraph>) -> std::sync::MutexGuard<'_, AudioGraph> {
    graph.lock().unwrap_or_else(PoisonError::into_inner)
}

fn parse_or_reference(name: &str) -> NoteName {
    name.parse().unwrap_or_else(|e| {
        warn!("{}; using {} Hz", e, REFERENCE_FREQUENCY);
        NoteName::REFERENCE
    })
}
