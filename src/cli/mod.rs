//! CLI interface for Ivory

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Polyphonic piano tone engine
#[derive(Parser)]
#[command(name = "ivory")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play notes on the default output device
    Play {
        /// Notes to play, e.g. C4 E4 G4
        #[arg(required = true)]
        notes: Vec<String>,

        /// Delay between notes in milliseconds (0 = chord)
        #[arg(short, long, default_value = "0")]
        gap: u64,

        /// Configuration file path
        #[arg(short, long, default_value = "ivory.yaml")]
        config: PathBuf,
    },

    /// Play a built-in, configured, or JSON melody
    Melody {
        /// Melody id, name, or path to a JSON file
        name: String,

        /// Configuration file path
        #[arg(short, long, default_value = "ivory.yaml")]
        config: PathBuf,
    },

    /// Render a melody to a WAV file
    Render {
        /// Melody id, name, or path to a JSON file
        name: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Seconds of decay rendered after the last note
        #[arg(short, long, default_value = "2.5")]
        tail: f64,

        /// Configuration file path
        #[arg(short, long, default_value = "ivory.yaml")]
        config: PathBuf,
    },

    /// Interactive terminal piano
    Keyboard {
        /// Configuration file path
        #[arg(short, long, default_value = "ivory.yaml")]
        config: PathBuf,
    },

    /// Play from a MIDI input device
    Midi {
        /// MIDI input port (substring match; default: first port)
        #[arg(short, long)]
        port: Option<String>,

        /// Configuration file path
        #[arg(short, long, default_value = "ivory.yaml")]
        config: PathBuf,
    },

    /// List built-in and configured melodies
    Melodies {
        /// Configuration file path
        #[arg(short, long, default_value = "ivory.yaml")]
        config: PathBuf,
    },

    /// List audio output devices and MIDI input ports
    Devices,

    /// Validate a configuration file
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "ivory.yaml")]
        config: PathBuf,
    },

    /// Generate an example configuration file
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_play() {
        let cli = Cli::try_parse_from(["ivory", "play", "C4", "E4", "--gap", "120"]).unwrap();
        match cli.command {
            Commands::Play { notes, gap, config } => {
                assert_eq!(notes, ["C4", "E4"]);
                assert_eq!(gap, 120);
                assert_eq!(config, PathBuf::from("ivory.yaml"));
            }
            _ => panic!("expected play"),
        }
    }

    #[test]
    fn test_play_requires_notes() {
        assert!(Cli::try_parse_from(["ivory", "play"]).is_err());
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::try_parse_from(["ivory", "render", "home-on-range", "-o", "out.wav"]).unwrap();
        match cli.command {
            Commands::Render { name, output, tail, .. } => {
                assert_eq!(name, "home-on-range");
                assert_eq!(output, PathBuf::from("out.wav"));
                assert_eq!(tail, 2.5);
            }
            _ => panic!("expected render"),
        }
    }
}
