//! Piano voice: three weighted partials under one envelope gain

use super::envelope::{Envelope, EnvelopeShape, EnvelopeStage};
use super::note::NoteName;
use super::oscillator::{Oscillator, Waveform};

/// Identifier distinguishing successive voices for the same note
pub type VoiceId = u64;

/// Margin between the end of the envelope and the oscillator stop (seconds)
pub const STOP_MARGIN: f64 = 0.1;

/// Partial layout: waveform, frequency multiple, mix weight
const PARTIALS: [(Waveform, f64, f64); 3] = [
    // Triangle at the fundamental for a soft tone
    (Waveform::Triangle, 1.0, 0.4),
    // Sine an octave up for brightness
    (Waveform::Sine, 2.0, 0.1),
    // Sine at the fundamental for body
    (Waveform::Sine, 1.0, 0.3),
];

/// Lifecycle of a voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Created,
    Attacking,
    Decaying,
    Sustaining,
    Releasing,
    Stopped,
    Retriggered,
}

#[derive(Debug, Clone)]
struct Partial {
    oscillator: Oscillator,
    weight: f64,
}

/// One sounding (or fading) instance of a note
#[derive(Debug, Clone)]
pub struct Voice {
    id: VoiceId,
    note: NoteName,
    frequency: f64,
    partials: [Partial; 3],
    envelope: Envelope,
    shape: EnvelopeShape,
    start_time: f64,
    released_at: Option<f64>,
    retriggered: bool,
}

impl Voice {
    /// Create a voice for `note` that starts at `t0` with the full envelope programmed
    pub fn new(
        id: VoiceId,
        note: NoteName,
        frequency: f64,
        shape: EnvelopeShape,
        t0: f64,
        sample_rate: f64,
    ) -> Self {
        let stop = t0 + shape.total_duration() + STOP_MARGIN;
        let partials = PARTIALS.map(|(waveform, multiple, weight)| {
            let mut oscillator = Oscillator::new(waveform, frequency * multiple, sample_rate, t0);
            oscillator.stop(stop, t0);
            Partial { oscillator, weight }
        });

        Self {
            id,
            note,
            frequency,
            partials,
            envelope: Envelope::triggered(&shape, t0),
            shape,
            start_time: t0,
            released_at: None,
            retriggered: false,
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn note(&self) -> NoteName {
        self.note
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Latest scheduled oscillator stop
    pub fn stop_time(&self) -> f64 {
        self.partials
            .iter()
            .filter_map(|p| p.oscillator.stop_time())
            .fold(self.start_time, f64::max)
    }

    /// Envelope gain at time `t`
    pub fn level(&self, t: f64) -> f64 {
        self.envelope.value_at(t)
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Key release: ramp from the current level to silence over `fade`
    pub fn release(&mut self, now: f64, fade: f64) {
        self.envelope.fade_out(now, fade);
        self.released_at = Some(now);
    }

    /// Whether a key release has already been applied
    pub fn is_released(&self) -> bool {
        self.released_at.is_some()
    }

    /// Superseded by a new voice for the same note: fade fast, stop shortly after
    pub fn retrigger_fade(&mut self, now: f64, fade: f64, stop_after: f64) {
        self.envelope.fade_out(now, fade);
        self.stop(now + stop_after, now);
        self.retriggered = true;
    }

    /// Schedule all oscillators to stop at `when`.
    ///
    /// Oscillators that have already stopped are left alone.
    pub fn stop(&mut self, when: f64, now: f64) {
        for partial in &mut self.partials {
            if !partial.oscillator.stop(when, now) {
                tracing::trace!(note = %self.note, voice = self.id, "oscillator already stopped");
            }
        }
    }

    /// Whether every oscillator has stopped by time `t`
    pub fn is_finished(&self, t: f64) -> bool {
        self.partials.iter().all(|p| p.oscillator.has_stopped(t))
    }

    /// Current state at time `t`
    pub fn state(&self, t: f64) -> VoiceState {
        if self.retriggered {
            return VoiceState::Retriggered;
        }
        if self.is_finished(t) {
            return VoiceState::Stopped;
        }
        if self.released_at.is_some_and(|r| t >= r) {
            return VoiceState::Releasing;
        }
        if t < self.start_time {
            return VoiceState::Created;
        }
        match self.shape.stage_at(t - self.start_time) {
            EnvelopeStage::Attack => VoiceState::Attacking,
            EnvelopeStage::Decay => VoiceState::Decaying,
            EnvelopeStage::Sustain => VoiceState::Sustaining,
            EnvelopeStage::Release => VoiceState::Releasing,
        }
    }

    /// Generate the next sample at time `t`
    pub fn process(&mut self, t: f64) -> f64 {
        let mut sum = 0.0;
        for partial in &mut self.partials {
            sum += partial.oscillator.generate(t) * partial.weight;
        }
        sum * self.envelope.value_at(t)
    }
}
