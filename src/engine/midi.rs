//! MIDI keyboard input.
//!
//! Note messages from a MIDI input port are decoded on the midir thread and
//! handed to the main loop over a channel, which applies them to the engine.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use anyhow::{anyhow, Result};
use midir::{MidiInput, MidiInputConnection};
use tracing::{debug, info};

use super::ToneEngine;
use crate::synth::NoteName;

/// A decoded note message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn(NoteName),
    NoteOff(NoteName),
}

impl MidiEvent {
    /// Decode raw MIDI bytes.
    ///
    /// Note-on with velocity 0 is a note-off. Anything other than a note
    /// message, or a note outside the playable octaves, yields `None`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let &[status, number, velocity, ..] = bytes else {
            return None;
        };
        let note = NoteName::from_midi(number & 0x7F)?;

        match status & 0xF0 {
            0x90 if velocity > 0 => Some(MidiEvent::NoteOn(note)),
            0x90 | 0x80 => Some(MidiEvent::NoteOff(note)),
            _ => None,
        }
    }

    /// Apply the event to the engine.
    pub fn apply(self, engine: &mut ToneEngine) {
        match self {
            MidiEvent::NoteOn(note) => engine.play_note(note),
            MidiEvent::NoteOff(note) => engine.stop_note(note),
        }
    }
}

/// A connected MIDI input port.
pub struct MidiKeyboard {
    // Dropping the connection closes the port
    _connection: MidiInputConnection<()>,
    port_name: String,
    events: Receiver<MidiEvent>,
}

impl MidiKeyboard {
    /// Connect to the first port whose name contains `port_name`, or to the
    /// first available port.
    pub fn connect(port_name: Option<&str>) -> Result<Self> {
        let mut midi_in = MidiInput::new("Ivory MIDI Input")?;
        midi_in.ignore(midir::Ignore::All);
        let ports = midi_in.ports();

        if ports.is_empty() {
            return Err(anyhow!("No MIDI input ports available"));
        }

        let port = if let Some(name) = port_name {
            ports
                .iter()
                .find(|p| {
                    midi_in
                        .port_name(p)
                        .map(|n| n.contains(name))
                        .unwrap_or(false)
                })
                .ok_or_else(|| anyhow!("MIDI port '{}' not found", name))?
                .clone()
        } else {
            ports[0].clone()
        };

        let port_name_actual = midi_in.port_name(&port)?;
        let (sender, events) = mpsc::channel::<MidiEvent>();

        let connection = midi_in
            .connect(
                &port,
                "ivory-input",
                move |_stamp, bytes, _| {
                    if let Some(event) = MidiEvent::parse(bytes) {
                        let _ = sender.send(event);
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("failed to connect to MIDI port: {}", e))?;

        info!("MIDI input connected to: {}", port_name_actual);

        Ok(Self {
            _connection: connection,
            port_name: port_name_actual,
            events,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Wait up to `timeout` for events and apply everything received.
    ///
    /// Returns `false` once the input thread has gone away.
    pub fn pump(&self, engine: &mut ToneEngine, timeout: Duration) -> bool {
        match self.events.recv_timeout(timeout) {
            Ok(event) => {
                debug!(?event, "midi");
                event.apply(engine);
            }
            Err(RecvTimeoutError::Timeout) => return true,
            Err(RecvTimeoutError::Disconnected) => return false,
        }

        while let Ok(event) = self.events.try_recv() {
            debug!(?event, "midi");
            event.apply(engine);
        }
        true
    }
}

/// List available MIDI input ports.
pub fn list_midi_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new("Ivory MIDI List")?;
    let ports = midi_in.ports();

    let names: Vec<String> = ports
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect();

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(s: &str) -> NoteName {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_note_on() {
        assert_eq!(MidiEvent::parse(&[0x90, 60, 100]), Some(MidiEvent::NoteOn(note("C4"))));
        // Any channel
        assert_eq!(MidiEvent::parse(&[0x95, 69, 80]), Some(MidiEvent::NoteOn(note("A4"))));
    }

    #[test]
    fn test_parse_note_off() {
        assert_eq!(MidiEvent::parse(&[0x80, 61, 0]), Some(MidiEvent::NoteOff(note("C#4"))));
        assert_eq!(MidiEvent::parse(&[0x90, 61, 0]), Some(MidiEvent::NoteOff(note("C#4"))));
    }

    #[test]
    fn test_parse_ignores_other_messages() {
        assert_eq!(MidiEvent::parse(&[0xB0, 1, 64]), None);
        assert_eq!(MidiEvent::parse(&[0xC0, 42]), None);
        assert_eq!(MidiEvent::parse(&[]), None);
    }

    #[test]
    fn test_parse_ignores_unplayable_octaves() {
        // MIDI 0..=11 would be octave -1
        assert_eq!(MidiEvent::parse(&[0x90, 11, 100]), None);
        assert_eq!(MidiEvent::parse(&[0x90, 12, 100]), Some(MidiEvent::NoteOn(note("C0"))));
    }

    #[test]
    fn test_apply_to_engine() {
        let mut engine = ToneEngine::offline(44100);
        MidiEvent::NoteOn(note("E4")).apply(&mut engine);
        assert_eq!(engine.active_notes(), vec![note("E4")]);

        MidiEvent::NoteOff(note("E4")).apply(&mut engine);
        assert_eq!(
            engine.voice_state(note("E4")),
            Some(crate::synth::VoiceState::Releasing)
        );
    }
}
