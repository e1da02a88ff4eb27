//! Synthesis building blocks
//!
//! Note naming, oscillators, the piano envelope, voices, and the
//! master-bus compressor.

mod compressor;
mod envelope;
mod note;
mod oscillator;
mod voice;

pub use compressor::{Compressor, CompressorSettings};
pub use envelope::{Envelope, EnvelopeShape, EnvelopeStage, SILENCE};
pub use note::{NoteError, NoteName, PitchClass, REFERENCE_FREQUENCY};
pub use oscillator::{Oscillator, Waveform};
pub use voice::{Voice, VoiceId, VoiceState};
