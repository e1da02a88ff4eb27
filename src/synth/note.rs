//! Note names and equal-tempered tuning

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Reference tuning used when a note name cannot be parsed (A4)
pub const REFERENCE_FREQUENCY: f64 = 440.0;

/// Frequency of A0, the anchor for octave-0 pitch classes
const A0_FREQUENCY: f64 = 27.5;

/// Highest octave accepted in a note name
pub const MAX_OCTAVE: u8 = 9;

/// Error returned when a note name fails to parse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteError {
    #[error("invalid note name '{0}'")]
    Invalid(String),
}

/// The twelve pitch classes of the chromatic scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitones above C
    pub fn semitone(self) -> u8 {
        self as u8
    }

    /// Pitch class for a semitone offset (wraps at 12)
    pub fn from_semitone(semitone: u8) -> Self {
        Self::ALL[(semitone % 12) as usize]
    }

    /// Frequency of this pitch class in octave 0
    pub fn base_frequency(self) -> f64 {
        let from_a = self.semitone() as f64 - PitchClass::A.semitone() as f64;
        A0_FREQUENCY * 2f64.powf(from_a / 12.0)
    }

    /// Whether this is a black key on a piano keyboard
    pub fn is_sharp(self) -> bool {
        matches!(
            self,
            PitchClass::CSharp
                | PitchClass::DSharp
                | PitchClass::FSharp
                | PitchClass::GSharp
                | PitchClass::ASharp
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

/// A symbolic pitch: pitch class plus octave, e.g. `F#5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteName {
    pitch: PitchClass,
    octave: u8,
}

impl NoteName {
    /// A4, the tuning reference at [`REFERENCE_FREQUENCY`]
    pub const REFERENCE: NoteName = NoteName {
        pitch: PitchClass::A,
        octave: 4,
    };

    /// Create a note, rejecting octaves above [`MAX_OCTAVE`]
    pub fn new(pitch: PitchClass, octave: u8) -> Result<Self, NoteError> {
        if octave > MAX_OCTAVE {
            return Err(NoteError::Invalid(format!("{}{}", pitch.as_str(), octave)));
        }
        Ok(Self { pitch, octave })
    }

    /// Map a MIDI note number (60 = C4) to a note name
    pub fn from_midi(number: u8) -> Option<Self> {
        let octave = (number / 12).checked_sub(1)?;
        Self::new(PitchClass::from_semitone(number % 12), octave).ok()
    }

    pub fn pitch(&self) -> PitchClass {
        self.pitch
    }

    pub fn octave(&self) -> u8 {
        self.octave
    }

    /// Equal-tempered frequency in Hz: `base(pitch) * 2^octave`
    pub fn frequency(&self) -> f64 {
        self.pitch.base_frequency() * 2f64.powi(self.octave as i32)
    }
}

impl FromStr for NoteName {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NoteError::Invalid(s.to_string());
        let trimmed = s.trim();
        let mut chars = trimmed.chars();

        let letter = chars.next().ok_or_else(invalid)?.to_ascii_uppercase();
        let natural = match letter {
            'C' => PitchClass::C,
            'D' => PitchClass::D,
            'E' => PitchClass::E,
            'F' => PitchClass::F,
            'G' => PitchClass::G,
            'A' => PitchClass::A,
            'B' => PitchClass::B,
            _ => return Err(invalid()),
        };

        let rest = chars.as_str();
        // B# and Cb cross an octave boundary
        let (pitch, digits) = if let Some(digits) = rest.strip_prefix('#') {
            if natural == PitchClass::B {
                return Err(invalid());
            }
            (PitchClass::from_semitone(natural.semitone() + 1), digits)
        } else if let Some(digits) = rest.strip_prefix('b') {
            if natural == PitchClass::C {
                return Err(invalid());
            }
            (PitchClass::from_semitone(natural.semitone() + 11), digits)
        } else {
            (natural, rest)
        };

        if digits.len() != 1 {
            return Err(invalid());
        }
        let octave = digits.parse::<u8>().map_err(|_| invalid())?;

        NoteName::new(pitch, octave)
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch.as_str(), self.octave)
    }
}

impl Serialize for NoteName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NoteName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
