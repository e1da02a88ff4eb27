//! Ivory - Polyphonic piano tone engine

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use ivory::config::{self, IvoryConfig};
use ivory::engine::midi::{self, MidiKeyboard};
use ivory::engine::{self as audio, Recorder, ToneEngine};
use ivory::keyboard;
use ivory::melody::{self, Melody};
use ivory::synth::{EnvelopeShape, NoteName};

mod cli;

use cli::{Cli, Commands};

/// Extra wait after the envelope so the last release finishes
const DECAY_MARGIN: Duration = Duration::from_millis(300);

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play { notes, gap, config: config_path } => {
            let cfg = config::load_or_default(&config_path)?;
            let notes = notes
                .iter()
                .map(|n| n.parse::<NoteName>())
                .collect::<Result<Vec<_>, _>>()?;

            let mut engine = live_engine(&cfg)?;
            let running = interrupt_flag()?;

            for (i, note) in notes.iter().enumerate() {
                if i > 0 && gap > 0 && !sleep_while_running(&running, Duration::from_millis(gap)) {
                    break;
                }
                println!("  {}  {:.2} Hz", note, note.frequency());
                engine.play_note(*note);
            }

            wait_for_decay(&engine, &running);
            engine.shutdown();
        }

        Commands::Melody { name, config: config_path } => {
            let cfg = config::load_or_default(&config_path)?;
            let tune = melody::resolve(&name, &cfg.melodies()?)?;

            let mut engine = live_engine(&cfg)?;
            let running = interrupt_flag()?;

            println!("Playing {} ({} notes)...", tune.name, tune.notes.len());
            engine.play_melody(&tune);

            while engine.is_melody_playing() {
                if !sleep_while_running(&running, Duration::from_millis(50)) {
                    engine.stop_melody();
                    break;
                }
            }
            wait_for_decay(&engine, &running);
            engine.shutdown();
        }

        Commands::Render {
            name,
            output,
            tail,
            config: config_path,
        } => {
            let cfg = config::load_or_default(&config_path)?;
            let tune = melody::resolve(&name, &cfg.melodies()?)?;

            let sample_rate = cfg.audio.sample_rate;
            let mut engine = ToneEngine::offline(sample_rate);
            engine.set_volume(cfg.master.volume);

            let length = engine.play_melody(&tune);
            let duration = length + tail.max(0.0);
            println!("Rendering {} ({:.1}s) to {:?}...", tune.name, duration, output);

            let mut recorder = Recorder::new(&output, sample_rate)?;
            let mut last_second = 0;
            recorder.capture(&mut engine, duration, cfg.audio.buffer_size, |secs| {
                // Progress update every second
                let second = secs as u64;
                if second > last_second {
                    last_second = second;
                    print!("\r  Progress: {}s / {:.0}s", second, duration);
                    use std::io::Write;
                    let _ = std::io::stdout().flush();
                }
            })?;
            recorder.finalize()?;
            println!("\nRendered to {:?}", output);
        }

        Commands::Keyboard { config: config_path } => {
            let cfg = config::load_or_default(&config_path)?;
            let mut melodies = melody::builtins()?;
            melodies.extend(cfg.melodies()?);

            let mut engine = interactive_engine(&cfg);
            keyboard::run_keyboard(&mut engine, &melodies)?;
            engine.shutdown();
        }

        Commands::Midi { port, config: config_path } => {
            let cfg = config::load_or_default(&config_path)?;
            let input = MidiKeyboard::connect(port.as_deref())?;
            let mut engine = interactive_engine(&cfg);
            let running = interrupt_flag()?;

            if engine.is_unavailable() {
                println!("No audio output; notes will be silent.");
            }
            println!("Listening on {} (Ctrl-C to stop)...", input.port_name());
            while running.load(Ordering::SeqCst) {
                if !input.pump(&mut engine, Duration::from_millis(50)) {
                    println!("MIDI input closed.");
                    break;
                }
            }
            engine.shutdown();
        }

        Commands::Melodies { config: config_path } => {
            let cfg = config::load_or_default(&config_path)?;

            println!("Built-in melodies:");
            for m in melody::builtins()? {
                print_melody(&m);
            }

            let extra = cfg.melodies()?;
            if !extra.is_empty() {
                println!("\nConfigured melodies:");
                for m in &extra {
                    print_melody(m);
                }
            }
        }

        Commands::Devices => {
            println!("Available audio devices:\n");

            if let Some(name) = audio::default_device_name() {
                println!("Default output: {}\n", name);
            }

            println!("Output devices:");
            let devices = audio::list_output_devices();
            if devices.is_empty() {
                println!("  (none)");
            }
            for (name, config) in devices {
                println!(
                    "  - {} ({} Hz, {} ch)",
                    name, config.sample_rate.0, config.channels
                );
            }

            println!("\nMIDI inputs:");
            match midi::list_midi_ports() {
                Ok(ports) if ports.is_empty() => println!("  (none)"),
                Ok(ports) => {
                    for port in ports {
                        println!("  - {}", port);
                    }
                }
                Err(e) => println!("  Error listing MIDI ports: {}", e),
            }
        }

        Commands::Check { config: config_path } => {
            println!("Checking configuration at {:?}...", config_path);

            match config::load_config(&config_path) {
                Ok(cfg) => {
                    println!("Configuration is valid!");
                    println!("  Sample rate: {} Hz", cfg.audio.sample_rate);
                    println!("  Buffer size: {}", cfg.audio.buffer_size);
                    println!(
                        "  Device: {}",
                        cfg.audio.device.as_deref().unwrap_or("(default)")
                    );
                    println!("  Master volume: {:.0}%", cfg.master.volume * 100.0);
                    println!("  Melodies: {}", cfg.melodies.len());
                    for m in &cfg.melodies {
                        println!("    - {} ({})", m.name, m.id);
                    }
                }
                Err(e) => {
                    println!("Configuration is invalid: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Init => {
            let example_config = include_str!("../ivory.example.yaml");

            let path = "ivory.yaml";
            if std::path::Path::new(path).exists() {
                println!("ivory.yaml already exists. Not overwriting.");
            } else {
                std::fs::write(path, example_config)?;
                println!("Created ivory.yaml with example configuration.");
            }
        }
    }

    Ok(())
}

/// Engine on the configured device, ready to play
fn live_engine(cfg: &IvoryConfig) -> Result<ToneEngine> {
    let mut engine = ToneEngine::with_device(cfg.audio.device.clone(), cfg.audio.sample_rate);
    engine.set_volume(cfg.master.volume);

    engine
        .initialize()
        .context("cannot play without an audio output")?;
    engine.resume();
    if engine.is_unavailable() {
        bail!("audio output unavailable");
    }
    Ok(engine)
}

/// Engine for the interactive commands; keeps going without a device
fn interactive_engine(cfg: &IvoryConfig) -> ToneEngine {
    let mut engine = ToneEngine::with_device(cfg.audio.device.clone(), cfg.audio.sample_rate);
    engine.set_volume(cfg.master.volume);
    // Logs the unavailable warning once; the UI reads `is_unavailable`
    engine.resume();
    engine
}

/// Flag cleared by Ctrl-C
fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(running)
}

/// Sleep in short steps; returns `false` if interrupted
fn sleep_while_running(running: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        thread::sleep(Duration::from_millis(10).min(deadline.saturating_duration_since(Instant::now())));
    }
    running.load(Ordering::SeqCst)
}

/// Wait until every voice has been cleaned up, bounded by one envelope
fn wait_for_decay(engine: &ToneEngine, running: &AtomicBool) {
    let limit = Duration::from_secs_f64(EnvelopeShape::default().total_duration()) + DECAY_MARGIN;
    let deadline = Instant::now() + limit;

    while engine.voice_count() > 0 && Instant::now() < deadline {
        if !sleep_while_running(running, Duration::from_millis(50)) {
            break;
        }
    }
}

fn print_melody(m: &Melody) {
    let length = m.schedule().length;
    println!(
        "  {:<20} {:<28} {:>3} notes  {:>5.1}s",
        m.id,
        m.name,
        m.notes.len(),
        length
    );
}
