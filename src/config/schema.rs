//! Configuration schema definitions

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::melody::Melody;

/// Main configuration for Ivory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IvoryConfig {
    /// Audio output settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// Master bus settings
    #[serde(default)]
    pub master: MasterConfig,

    /// Extra melodies, alongside the built-in ones
    #[serde(default)]
    pub melodies: Vec<MelodyConfig>,
}

impl IvoryConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate < 8000 || self.audio.sample_rate > 192000 {
            bail!("Sample rate must be between 8000 and 192000");
        }
        if self.audio.buffer_size < 64 || self.audio.buffer_size > 8192 {
            bail!("Buffer size must be between 64 and 8192");
        }

        if !(0.0..=1.0).contains(&self.master.volume) {
            bail!("Master volume must be between 0.0 and 1.0");
        }

        let mut seen = HashSet::new();
        for melody in &self.melodies {
            if !seen.insert(melody.id.as_str()) {
                bail!("Duplicate melody id '{}'", melody.id);
            }
            melody
                .to_melody()
                .with_context(|| format!("Melody '{}' is invalid", melody.id))?;
        }

        Ok(())
    }

    /// The configured melodies, parsed
    pub fn melodies(&self) -> Result<Vec<Melody>> {
        self.melodies.iter().map(MelodyConfig::to_melody).collect()
    }
}

/// Audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz for offline rendering; live output uses the device rate
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Buffer size in samples (default: 512)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Output device name (None = default device)
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            device: None,
        }
    }
}

fn default_sample_rate() -> u32 { 44100 }
fn default_buffer_size() -> usize { 512 }

/// Master bus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Master volume 0.0-1.0 (default: 0.7)
    #[serde(default = "default_volume")]
    pub volume: f32,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
        }
    }
}

fn default_volume() -> f32 { 0.7 }

/// A melody written in score notation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MelodyConfig {
    pub id: String,
    pub name: String,

    /// Milliseconds per beat
    pub tempo: f64,

    /// Whitespace-separated `NOTE[:beats]` tokens, `-` for a rest
    pub score: String,
}

impl MelodyConfig {
    pub fn to_melody(&self) -> Result<Melody> {
        Melody::from_score(&self.id, &self.name, self.tempo, &self.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn melody(id: &str, score: &str) -> MelodyConfig {
        MelodyConfig {
            id: id.to_string(),
            name: id.to_uppercase(),
            tempo: 300.0,
            score: score.to_string(),
        }
    }

    #[test]
    fn test_default_audio_config() {
        let yaml = "sample_rate: 48000";
        let config: AudioConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.buffer_size, 512); // default
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: IvoryConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.master.volume, 0.7);
        assert!(config.melodies.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_melody_config() {
        let yaml = r#"
id: scale
name: C Major Scale
tempo: 250
score: "C4 D4 E4 F4 G4 A4 B4 C5:2"
"#;
        let config: MelodyConfig = serde_yaml::from_str(yaml).unwrap();
        let melody = config.to_melody().unwrap();
        assert_eq!(melody.name, "C Major Scale");
        assert_eq!(melody.notes.len(), 8);
        assert_eq!(melody.notes[7].duration, 2.0);
    }

    #[test]
    fn test_config_validation() {
        let mut config = IvoryConfig::default();
        config.melodies = vec![melody("a", "C4 E4"), melody("b", "G4")];
        assert!(config.validate().is_ok());
        assert_eq!(config.melodies().unwrap().len(), 2);

        config.master.volume = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_audio() {
        let mut config = IvoryConfig::default();
        config.audio.sample_rate = 4000;
        assert!(config.validate().is_err());

        let mut config = IvoryConfig::default();
        config.audio.buffer_size = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_melody_ids() {
        let mut config = IvoryConfig::default();
        config.melodies = vec![melody("a", "C4"), melody("a", "D4")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_melody_score() {
        let mut config = IvoryConfig::default();
        config.melodies = vec![melody("bad", "C4 Z4")];
        assert!(config.validate().is_err());
    }
}
