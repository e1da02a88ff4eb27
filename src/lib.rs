//! Ivory - Polyphonic piano tone engine
//!
//! Synthesizes piano-like tones from note names. Every note is a small
//! additive voice with a fixed envelope; voices share a master bus with
//! a compressor so chords stay at a steady loudness.

pub mod config;
pub mod engine;
pub mod keyboard;
pub mod melody;
pub mod synth;

pub use config::IvoryConfig;
pub use engine::{EngineError, EngineStatus, ToneEngine};
pub use melody::Melody;
pub use synth::NoteName;
