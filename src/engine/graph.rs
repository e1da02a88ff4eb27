//! Render-side state: sample clock, voice registry, scheduler and master bus
//!
//! Everything time-based happens on the sample clock. Before each frame
//! the graph runs the tasks that have come due, so fades, cleanups and
//! melody steps land on exact frames whether the graph is driven by a
//! device callback or rendered offline.

use std::collections::HashMap;

use super::bus::MasterBus;
use super::scheduler::{Scheduler, TaskAction};
use crate::synth::{EnvelopeShape, NoteName, Voice, VoiceId, VoiceState};

/// Fade applied to a voice superseded by a retrigger (seconds)
pub const RETRIGGER_FADE: f64 = 0.05;
/// Delay before a superseded voice's oscillators stop (seconds)
pub const RETRIGGER_STOP: f64 = 0.06;
/// Key-release fade (seconds)
pub const RELEASE_FADE: f64 = 0.5;
/// Delay past the envelope end before an untouched voice is dropped (seconds)
pub const CLEANUP_MARGIN: f64 = 0.15;

/// The audio graph shared between the engine and the output callback
pub struct AudioGraph {
    sample_rate: f64,
    frames: u64,
    shape: EnvelopeShape,
    bus: MasterBus,
    voices: HashMap<NoteName, Voice>,
    fading: Vec<Voice>,
    scheduler: Scheduler,
    next_voice_id: VoiceId,
    melody_end: Option<f64>,
}

impl AudioGraph {
    pub fn new(sample_rate: u32, volume: f32) -> Self {
        let sample_rate = sample_rate as f64;
        Self {
            sample_rate,
            frames: 0,
            shape: EnvelopeShape::default(),
            bus: MasterBus::new(volume, sample_rate),
            voices: HashMap::new(),
            fading: Vec::new(),
            scheduler: Scheduler::new(),
            next_voice_id: 0,
            melody_end: None,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Switch to the rate the output device actually runs at.
    ///
    /// Intended for use before any note has been played.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        let volume = self.bus.gain() as f32;
        self.sample_rate = sample_rate as f64;
        self.frames = 0;
        self.bus = MasterBus::new(volume, self.sample_rate);
    }

    /// Current clock time in seconds
    pub fn now(&self) -> f64 {
        self.frames as f64 / self.sample_rate
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.bus.set_gain(volume);
    }

    pub fn volume(&self) -> f64 {
        self.bus.gain()
    }

    pub fn shape(&self) -> &EnvelopeShape {
        &self.shape
    }

    /// Start `note` now, superseding any voice already registered for it
    pub fn play_note(&mut self, note: NoteName) {
        let now = self.now();
        self.start_voice(note, now);
    }

    fn start_voice(&mut self, note: NoteName, now: f64) {
        if let Some(mut old) = self.voices.remove(&note) {
            self.scheduler.cancel_lifecycle(&note);
            old.retrigger_fade(now, RETRIGGER_FADE, RETRIGGER_STOP);
            tracing::debug!(%note, voice = old.id(), "retrigger");
            self.fading.push(old);
        }

        let id = self.next_voice_id;
        self.next_voice_id += 1;

        let voice = Voice::new(id, note, note.frequency(), self.shape, now, self.sample_rate);
        let cleanup = now + self.shape.total_duration() + CLEANUP_MARGIN;
        self.scheduler.schedule(cleanup, note, TaskAction::Expire(id));
        self.voices.insert(note, voice);

        tracing::debug!(%note, voice = id, frequency = note.frequency(), "voice started");
    }

    /// Key release: fade `note` over [`RELEASE_FADE`] and drop it afterwards
    pub fn stop_note(&mut self, note: NoteName) {
        let now = self.now();
        let Some(voice) = self.voices.get_mut(&note) else {
            return;
        };
        if voice.is_released() {
            return;
        }

        self.scheduler.cancel_lifecycle(&note);
        voice.release(now, RELEASE_FADE);
        let id = voice.id();
        self.scheduler
            .schedule(now + RELEASE_FADE, note, TaskAction::Discard(id));

        tracing::debug!(%note, voice = id, "release");
    }

    pub fn stop_all_notes(&mut self) {
        let notes: Vec<NoteName> = self.voices.keys().copied().collect();
        for note in notes {
            self.stop_note(note);
        }
    }

    /// Drop every voice and pending task at once
    pub fn clear(&mut self) {
        self.voices.clear();
        self.fading.clear();
        self.scheduler.clear();
        self.melody_end = None;
    }

    /// Schedule melody steps as offsets from now; returns the end time
    pub fn schedule_melody<I>(&mut self, steps: I, length: f64) -> f64
    where
        I: IntoIterator<Item = (f64, NoteName)>,
    {
        let now = self.now();
        for (offset, note) in steps {
            self.scheduler
                .schedule(now + offset, note, TaskAction::Trigger);
        }
        let end = now + length;
        self.melody_end = Some(end);
        end
    }

    /// Cancel the melody's pending steps; already-sounding notes are left alone
    pub fn cancel_melody(&mut self) -> bool {
        let cancelled = self.scheduler.cancel_triggers();
        let was_playing = self.is_melody_playing();
        self.melody_end = None;
        cancelled > 0 || was_playing
    }

    pub fn is_melody_playing(&self) -> bool {
        self.melody_end.is_some_and(|end| self.now() < end)
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn fading_count(&self) -> usize {
        self.fading.len()
    }

    pub fn has_voice(&self, note: &NoteName) -> bool {
        self.voices.contains_key(note)
    }

    pub fn voice(&self, note: &NoteName) -> Option<&Voice> {
        self.voices.get(note)
    }

    pub fn voice_state(&self, note: &NoteName) -> Option<VoiceState> {
        let now = self.now();
        self.voices.get(note).map(|v| v.state(now))
    }

    /// Notes with a registered voice, sorted by pitch
    pub fn active_notes(&self) -> Vec<NoteName> {
        let mut notes: Vec<NoteName> = self.voices.keys().copied().collect();
        notes.sort();
        notes
    }

    /// Deadline of the pending cleanup or release for `note`
    pub fn cleanup_deadline(&self, note: &NoteName) -> Option<f64> {
        self.scheduler.deadline_for(note)
    }

    fn run_due_tasks(&mut self, now: f64) {
        while let Some(task) = self.scheduler.pop_due(now) {
            match task.action {
                TaskAction::Expire(id) | TaskAction::Discard(id) => {
                    // A stale task must not remove a newer voice for the same note
                    if self.voices.get(&task.note).is_some_and(|v| v.id() == id) {
                        self.voices.remove(&task.note);
                        tracing::trace!(note = %task.note, voice = id, "voice removed");
                    }
                }
                TaskAction::Trigger => self.start_voice(task.note, now),
            }
        }
    }

    fn next_sample(&mut self) -> f64 {
        let now = self.now();
        self.run_due_tasks(now);

        let mut mix = 0.0;
        for voice in self.voices.values_mut() {
            mix += voice.process(now);
        }
        for voice in &mut self.fading {
            mix += voice.process(now);
        }

        self.frames += 1;
        self.bus.process(mix)
    }

    fn prune_fading(&mut self) {
        let now = self.now();
        self.fading.retain(|v| !v.is_finished(now));
    }

    /// Render mono samples, advancing the clock by `out.len()` frames
    pub fn render(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.next_sample() as f32;
        }
        self.prune_fading();
    }

    /// Render interleaved frames, copying the mono mix to every channel
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        for frame in out.chunks_mut(channels.max(1)) {
            let sample = self.next_sample() as f32;
            frame.fill(sample);
        }
        self.prune_fading();
    }

    /// Render and discard `seconds` of audio
    pub fn advance(&mut self, seconds: f64) {
        let mut remaining = (seconds * self.sample_rate).round() as usize;
        let mut block = [0.0f32; 512];
        while remaining > 0 {
            let n = remaining.min(block.len());
            self.render(&mut block[..n]);
            remaining -= n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::SILENCE;

    const SR: u32 = 44100;

    fn note(s: &str) -> NoteName {
        s.parse().unwrap()
    }

    fn graph() -> AudioGraph {
        AudioGraph::new(SR, 0.7)
    }

    fn peak(graph: &mut AudioGraph, seconds: f64) -> f32 {
        let mut buf = vec![0.0f32; (seconds * SR as f64) as usize];
        graph.render(&mut buf);
        buf.iter().fold(0.0f32, |a, &b| a.max(b.abs()))
    }

    #[test]
    fn test_play_registers_voice() {
        let mut g = graph();
        g.play_note(note("C4"));

        assert_eq!(g.voice_count(), 1);
        assert_eq!(g.active_notes(), vec![note("C4")]);
        assert!(peak(&mut g, 0.1) > 0.0);
    }

    #[test]
    fn test_repeated_play_keeps_one_voice() {
        let mut g = graph();
        for _ in 0..3 {
            g.play_note(note("C4"));
            g.advance(0.005);
        }
        assert_eq!(g.voice_count(), 1);
        assert!(g.fading_count() > 0);

        g.advance(0.07);
        assert_eq!(g.voice_count(), 1);
        assert_eq!(g.fading_count(), 0);
    }

    #[test]
    fn test_self_cleanup_after_envelope() {
        let mut g = graph();
        g.play_note(note("G4"));

        let deadline = g.cleanup_deadline(&note("G4")).unwrap();
        assert!((deadline - (1.91 + 0.15)).abs() < 1e-9);

        g.advance(2.0);
        assert_eq!(g.voice_count(), 1);
        g.advance(0.07);
        assert_eq!(g.voice_count(), 0);
    }

    #[test]
    fn test_stop_note_ramps_and_removes() {
        let mut g = graph();
        g.play_note(note("A4"));
        g.advance(0.3);
        assert_eq!(g.voice_state(&note("A4")), Some(VoiceState::Sustaining));

        let t = g.now();
        g.stop_note(note("A4"));
        assert_eq!(g.voice_state(&note("A4")), Some(VoiceState::Releasing));

        let voice = g.voice(&note("A4")).unwrap();
        assert!((voice.envelope().end_time().unwrap() - (t + 0.5)).abs() < 1e-9);
        assert_eq!(voice.envelope().final_value(), SILENCE);

        g.advance(0.49);
        assert_eq!(g.voice_count(), 1);
        g.advance(0.02);
        assert_eq!(g.voice_count(), 0);
    }

    #[test]
    fn test_second_stop_keeps_first_deadline() {
        let mut g = graph();
        g.play_note(note("A4"));
        g.advance(0.3);
        g.stop_note(note("A4"));
        let end = g.voice(&note("A4")).unwrap().envelope().end_time().unwrap();

        g.advance(0.4);
        g.stop_note(note("A4"));
        let voice = g.voice(&note("A4")).unwrap();
        assert!((voice.envelope().end_time().unwrap() - end).abs() < 1e-9);

        g.advance(0.11);
        assert_eq!(g.voice_count(), 0);
    }

    #[test]
    fn test_stop_all_twice_removes_on_schedule() {
        let mut g = graph();
        g.play_note(note("C4"));
        g.play_note(note("E4"));
        g.stop_all_notes();
        g.advance(0.25);
        g.stop_all_notes();

        g.advance(0.26);
        assert_eq!(g.voice_count(), 0);
    }

    #[test]
    fn test_stop_without_voice_is_noop() {
        let mut g = graph();
        g.stop_note(note("B4"));
        assert_eq!(g.voice_count(), 0);
        assert_eq!(g.fading_count(), 0);
    }

    #[test]
    fn test_retrigger_silences_old_voice_first() {
        let mut g = graph();
        g.play_note(note("E4"));
        g.advance(0.01);
        g.play_note(note("E4"));

        assert_eq!(g.fading_count(), 1);
        let old = &g.fading[0];
        assert_eq!(old.start_time(), 0.0);
        assert!((old.stop_time() - 0.07).abs() < 1e-3);
        assert_eq!(old.state(g.now()), VoiceState::Retriggered);
        assert!(old.level(g.now() + 0.05) <= SILENCE + 1e-9);

        g.advance(0.09);
        assert_eq!(g.voice_count(), 1);
        assert_eq!(g.fading_count(), 0);
        assert!(g.voice(&note("E4")).unwrap().start_time() > 0.0);
    }

    #[test]
    fn test_retrigger_during_release_keeps_new_voice() {
        let mut g = graph();
        g.play_note(note("D4"));
        g.advance(0.2);
        g.stop_note(note("D4"));
        g.advance(0.1);
        g.play_note(note("D4"));

        // The release's discard would have fired 0.4s from now
        g.advance(0.6);
        assert_eq!(g.voice_count(), 1);
        assert_eq!(g.voice_state(&note("D4")), Some(VoiceState::Sustaining));
    }

    #[test]
    fn test_stop_after_retrigger_targets_new_voice() {
        let mut g = graph();
        g.play_note(note("F4"));
        g.advance(0.05);
        g.play_note(note("F4"));
        g.stop_note(note("F4"));

        assert_eq!(g.voice_state(&note("F4")), Some(VoiceState::Releasing));
        g.advance(0.51);
        assert_eq!(g.voice_count(), 0);
    }

    #[test]
    fn test_notes_are_independent() {
        let mut g = graph();
        g.play_note(note("C4"));
        g.play_note(note("E4"));
        g.advance(0.2);
        g.stop_note(note("C4"));
        g.play_note(note("G4"));
        g.advance(0.6);

        assert_eq!(g.active_notes(), vec![note("E4"), note("G4")]);
    }

    #[test]
    fn test_stop_all_notes() {
        let mut g = graph();
        for n in ["C4", "E4", "G4"] {
            g.play_note(note(n));
        }
        g.advance(0.1);
        g.stop_all_notes();
        for n in ["C4", "E4", "G4"] {
            assert_eq!(g.voice_state(&note(n)), Some(VoiceState::Releasing));
        }
        g.advance(0.51);
        assert_eq!(g.voice_count(), 0);
    }

    #[test]
    fn test_polyphony_does_not_scale_loudness() {
        let mut single = graph();
        single.play_note(note("C4"));
        let one = peak(&mut single, 0.5);

        let mut chord = graph();
        for n in ["C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5"] {
            chord.play_note(note(n));
        }
        let eight = peak(&mut chord, 0.5);

        assert!(eight < 1.0, "clipped: {}", eight);
        assert!(eight < one * 4.0, "one {} eight {}", one, eight);
    }

    #[test]
    fn test_volume_zero_is_silent() {
        let mut g = AudioGraph::new(SR, 0.0);
        g.play_note(note("A4"));
        assert_eq!(peak(&mut g, 0.2), 0.0);
    }

    #[test]
    fn test_melody_triggers_on_schedule() {
        let mut g = graph();
        let end = g.schedule_melody(vec![(0.0, note("C4")), (0.3, note("D4"))], 0.6);
        assert!((end - 0.6).abs() < 1e-9);

        g.advance(0.01);
        assert_eq!(g.active_notes(), vec![note("C4")]);
        assert!(g.is_melody_playing());

        g.advance(0.3);
        assert_eq!(g.active_notes(), vec![note("C4"), note("D4")]);

        g.advance(0.3);
        assert!(!g.is_melody_playing());
    }

    #[test]
    fn test_cancel_melody() {
        let mut g = graph();
        g.schedule_melody(vec![(0.0, note("C4")), (0.3, note("D4"))], 0.6);
        g.advance(0.01);

        assert!(g.cancel_melody());
        g.advance(0.5);
        assert!(!g.has_voice(&note("D4")));
        assert!(!g.is_melody_playing());
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut g = graph();
        g.play_note(note("C4"));
        g.schedule_melody(vec![(1.0, note("D4"))], 1.5);
        g.clear();

        assert_eq!(g.voice_count(), 0);
        g.advance(1.2);
        assert_eq!(g.voice_count(), 0);
    }

    #[test]
    fn test_render_interleaved_duplicates_channels() {
        let mut g = graph();
        g.play_note(note("A4"));
        let mut buf = vec![0.0f32; 512];
        g.render_interleaved(&mut buf, 2);

        for frame in buf.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert!((g.now() - 256.0 / SR as f64).abs() < 1e-12);
    }
}
