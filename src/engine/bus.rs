//! Master bus: volume gain feeding the dynamics compressor

use crate::synth::{Compressor, CompressorSettings};

/// Shared output path for every voice
#[derive(Debug, Clone)]
pub struct MasterBus {
    gain: f64,
    compressor: Compressor,
}

impl MasterBus {
    pub fn new(volume: f32, sample_rate: f64) -> Self {
        Self {
            gain: clamp_volume(volume) as f64,
            compressor: Compressor::new(CompressorSettings::default(), sample_rate),
        }
    }

    /// Apply a new volume immediately (no ramp)
    pub fn set_gain(&mut self, volume: f32) {
        self.gain = clamp_volume(volume) as f64;
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    /// Route one mixed sample through gain and compressor
    pub fn process(&mut self, mix: f64) -> f64 {
        self.compressor.process(mix * self.gain)
    }
}

/// Clamp a volume level to [0, 1]; NaN is treated as silence
pub fn clamp_volume(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}
