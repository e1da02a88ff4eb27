//! Configuration loading and validation

mod schema;

pub use schema::*;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Load configuration from a YAML file
pub fn load_config(path: &Path) -> Result<IvoryConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {:?}", path))?;
    let config: IvoryConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config {:?}", path))?;
    config.validate()?;
    Ok(config)
}

/// Load `path` if it exists, otherwise use the defaults
pub fn load_or_default(path: &Path) -> Result<IvoryConfig> {
    if path.exists() {
        load_config(path)
    } else {
        debug!("no config at {:?}, using defaults", path);
        Ok(IvoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_minimal_config() {
        let yaml = r#"
audio:
  sample_rate: 48000
  buffer_size: 512

master:
  volume: 0.5

melodies:
  - id: fifths
    name: Fifths
    tempo: 400
    score: "C4 G4 - C5:2"
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.master.volume, 0.5);
        assert_eq!(config.melodies[0].id, "fifths");
    }

    #[test]
    fn test_load_rejects_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"master:\n  volume: 3.0\n").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(&dir.path().join("missing.yaml")).unwrap();
        assert_eq!(config.master.volume, 0.7);
    }

    #[test]
    fn test_example_config_is_valid() {
        let config: IvoryConfig =
            serde_yaml::from_str(include_str!("../../ivory.example.yaml")).unwrap();
        assert!(config.validate().is_ok());
    }
}
