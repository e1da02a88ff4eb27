//! Melodies: note/duration sequences played through the engine
//!
//! A melody is a tempo (milliseconds per beat) and a list of notes with
//! durations in beats. Missing notes are rests. Melodies can be written
//! in a compact score notation, loaded from JSON, or pulled out of a
//! generated-melody payload.

mod builtin;
mod generated;

pub use builtin::{builtin, builtins, BUILTIN_IDS};
pub use generated::{parse_generated, strip_code_fence, Generated};

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::synth::NoteName;

/// Pause inserted after every note (seconds)
pub const NOTE_GAP: f64 = 0.05;

/// One step of a melody
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelodyNote {
    /// Note to play; `None` is a rest
    #[serde(default, deserialize_with = "note_or_rest")]
    pub note: Option<NoteName>,
    /// Length in beats
    #[serde(default = "default_duration")]
    pub duration: f64,
}

fn default_duration() -> f64 {
    1.0
}

/// A named note sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Melody {
    #[serde(default, deserialize_with = "id_from_any")]
    pub id: String,
    pub name: String,
    /// Milliseconds per beat
    pub tempo: f64,
    pub notes: Vec<MelodyNote>,
}

/// Melody steps laid out on a timeline
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    /// (offset in seconds, note) for every non-rest step
    pub steps: Vec<(f64, NoteName)>,
    /// Time from the first step to the end of the last gap (seconds)
    pub length: f64,
}

impl Melody {
    /// Parse a score such as `"E4 D4 C4 - E4:2"`.
    ///
    /// Tokens are `NOTE[:beats]`; `-` is a rest.
    pub fn from_score(id: &str, name: &str, tempo: f64, score: &str) -> Result<Self> {
        let mut notes = Vec::new();

        for token in score.split_whitespace() {
            let (pitch, beats) = match token.split_once(':') {
                Some((pitch, beats)) => {
                    let beats: f64 = beats
                        .parse()
                        .with_context(|| format!("invalid duration in '{}'", token))?;
                    (pitch, beats)
                }
                None => (token, 1.0),
            };

            let note = if pitch == "-" {
                None
            } else {
                Some(pitch.parse::<NoteName>()?)
            };
            notes.push(MelodyNote { note, duration: beats });
        }

        let melody = Self {
            id: id.to_string(),
            name: name.to_string(),
            tempo,
            notes,
        };
        melody.validate()?;
        Ok(melody)
    }

    /// Reject tempos and durations that cannot be scheduled
    pub fn validate(&self) -> Result<()> {
        if !(self.tempo.is_finite() && self.tempo > 0.0) {
            bail!("melody '{}' has invalid tempo {}", self.name, self.tempo);
        }
        if self.notes.is_empty() {
            bail!("melody '{}' has no notes", self.name);
        }
        for (i, step) in self.notes.iter().enumerate() {
            if !(step.duration.is_finite() && step.duration >= 0.0) {
                bail!("melody '{}' step {} has invalid duration {}", self.name, i, step.duration);
            }
        }
        Ok(())
    }

    /// Lay the steps out on a timeline: each step lasts `duration * tempo`
    /// milliseconds followed by [`NOTE_GAP`]
    pub fn schedule(&self) -> Schedule {
        let beat = self.tempo / 1000.0;
        let mut offset = 0.0;
        let mut steps = Vec::with_capacity(self.notes.len());

        for step in &self.notes {
            if let Some(note) = step.note {
                steps.push((offset, note));
            }
            offset += step.duration * beat + NOTE_GAP;
        }

        Schedule {
            steps,
            length: offset,
        }
    }

    /// Render the melody back into score notation
    pub fn to_score(&self) -> String {
        self.notes
            .iter()
            .map(|step| {
                let pitch = step
                    .note
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string());
                if step.duration == 1.0 {
                    pitch
                } else {
                    format!("{}:{}", pitch, step.duration)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Load a melody from a JSON file holding either a melody or a generated payload
pub fn load(path: &Path) -> Result<Melody> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read melody file {:?}", path))?;
    let generated = parse_generated(&contents);

    match generated.melody {
        Some(melody) => {
            melody.validate()?;
            Ok(melody)
        }
        None => bail!("no melody found in {:?}", path),
    }
}

/// Find a melody by id or name among `extra` and the built-ins, else load it from a path
pub fn resolve(query: &str, extra: &[Melody]) -> Result<Melody> {
    let matches = |m: &Melody| m.id == query || m.name.eq_ignore_ascii_case(query);

    if let Some(found) = extra.iter().find(|m| matches(m)) {
        return Ok(found.clone());
    }
    if let Some(found) = builtins()?.into_iter().find(|m| matches(m)) {
        return Ok(found);
    }

    let path = Path::new(query);
    if path.exists() {
        return load(path);
    }
    bail!("unknown melody '{}'", query)
}

fn note_or_rest<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NoteName>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("-") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn id_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    // Stored melodies carry numeric ids; built-ins use slugs
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(match raw {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn note(s: &str) -> NoteName {
        s.parse().unwrap()
    }

    #[test]
    fn test_from_score() {
        let m = Melody::from_score("t", "Test", 400.0, "C4 D4:2 - E4:0.5").unwrap();
        assert_eq!(m.notes.len(), 4);
        assert_eq!(m.notes[1].duration, 2.0);
        assert_eq!(m.notes[2].note, None);
        assert_eq!(m.notes[3].note, Some(note("E4")));
    }

    #[test]
    fn test_from_score_rejects_bad_tokens() {
        assert!(Melody::from_score("t", "T", 400.0, "C4 X9").is_err());
        assert!(Melody::from_score("t", "T", 400.0, "C4:fast").is_err());
        assert!(Melody::from_score("t", "T", 0.0, "C4").is_err());
        assert!(Melody::from_score("t", "T", 400.0, "").is_err());
    }

    #[test]
    fn test_schedule_offsets() {
        let m = Melody::from_score("t", "T", 400.0, "C4 D4:2 - E4").unwrap();
        let s = m.schedule();

        let offsets: Vec<f64> = s.steps.iter().map(|(t, _)| *t).collect();
        // 0.4 s beat plus gap; the rest still takes its slot
        let expected = [0.0, 0.45, 1.75];
        assert_eq!(offsets.len(), 3);
        for (got, want) in offsets.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{} vs {}", got, want);
        }
        assert!((s.length - (0.45 + 0.85 + 0.45 + 0.45)).abs() < 1e-9);
    }

    #[test]
    fn test_score_round_trip() {
        let score = "E4 D4 - C4:2 G4:0.5";
        let m = Melody::from_score("t", "T", 300.0, score).unwrap();
        assert_eq!(m.to_score(), score);
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{"id": 7, "name": "Saved", "tempo": 350,
            "notes": [{"note": "C4", "duration": 1}, {"note": null, "duration": 2}, {"note": "G#4"}]}"#;
        let m: Melody = serde_json::from_str(json).unwrap();

        assert_eq!(m.id, "7");
        assert_eq!(m.tempo, 350.0);
        assert_eq!(m.notes[1].note, None);
        assert_eq!(m.notes[2].duration, 1.0);
        assert_eq!(m.notes[2].note, Some(note("G#4")));
    }

    #[test]
    fn test_json_rejects_bad_note() {
        let json = r#"{"name": "Bad", "tempo": 300, "notes": [{"note": "Q4", "duration": 1}]}"#;
        assert!(serde_json::from_str::<Melody>(json).is_err());
    }

    #[test]
    fn test_load_plain_melody_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"name": "File", "tempo": 300, "notes": [{{"note": "E4", "duration": 1}}]}}"#
        )
        .unwrap();

        let m = load(file.path()).unwrap();
        assert_eq!(m.name, "File");
        assert_eq!(m.id, "");
    }

    #[test]
    fn test_load_without_melody_fails() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "just some words").unwrap();
        assert!(load(file.path()).is_err());
    }

    #[test]
    fn test_resolve_prefers_extra() {
        let extra = Melody::from_score("mary-little-lamb", "Custom", 200.0, "C4").unwrap();
        let found = resolve("mary-little-lamb", &[extra]).unwrap();
        assert_eq!(found.name, "Custom");

        let builtin = resolve("Red River Valley", &[]).unwrap();
        assert_eq!(builtin.id, "red-river-valley");

        assert!(resolve("no-such-melody", &[]).is_err());
    }
}
