//! Interactive terminal piano
//!
//! Shows one octave starting at C4 with the computer-keyboard bindings:
//! - `a s d f g h j` play the white keys, `w e t y u` the black keys
//! - `+` / `-` change the volume
//! - `1`..`5` start or stop a melody
//! - space releases every note, `q` / Esc quits
//!
//! Output is suspended while the terminal loses focus and resumed when it
//! comes back. Without an audio device the controls keep working and the
//! status bar reads NO AUDIO.
//!
//! Terminals report key presses only, so a press starts the note and the
//! note decays on its own.

mod piano;

pub use piano::Piano;

use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};

use crate::engine::{EngineStatus, ToneEngine};
use crate::melody::Melody;
use crate::synth::{NoteName, PitchClass};

/// Octave played by the letter keys
pub const KEYBOARD_OCTAVE: u8 = 4;

/// Volume change per `+` / `-` press
pub const VOLUME_STEP: f32 = 0.05;

/// Maximum number of melodies reachable from the number keys
pub const MELODY_SLOTS: usize = 5;

pub(crate) const WHITE_KEYS: [(char, PitchClass); 7] = [
    ('a', PitchClass::C),
    ('s', PitchClass::D),
    ('d', PitchClass::E),
    ('f', PitchClass::F),
    ('g', PitchClass::G),
    ('h', PitchClass::A),
    ('j', PitchClass::B),
];

/// (key, pitch, index of the white key to its left)
pub(crate) const BLACK_KEYS: [(char, PitchClass, usize); 5] = [
    ('w', PitchClass::CSharp, 0),
    ('e', PitchClass::DSharp, 1),
    ('t', PitchClass::FSharp, 3),
    ('y', PitchClass::GSharp, 4),
    ('u', PitchClass::ASharp, 5),
];

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Play(NoteName),
    VolumeUp,
    VolumeDown,
    /// Toggle the melody in this slot
    Melody(usize),
    StopAll,
    /// Terminal lost focus
    Suspend,
    /// Terminal regained focus
    Resume,
    Quit,
}

impl Action {
    /// Action for a terminal event; key releases and repeats are ignored
    pub fn from_event(event: &Event) -> Option<Self> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                Self::from_key(key.code, key.modifiers)
            }
            Event::FocusLost => Some(Action::Suspend),
            Event::FocusGained => Some(Action::Resume),
            _ => None,
        }
    }

    pub fn from_key(code: KeyCode, modifiers: KeyModifiers) -> Option<Self> {
        let KeyCode::Char(c) = code else {
            return (code == KeyCode::Esc).then_some(Action::Quit);
        };
        if modifiers.contains(KeyModifiers::CONTROL) {
            return (c == 'c').then_some(Action::Quit);
        }

        match c.to_ascii_lowercase() {
            'q' => Some(Action::Quit),
            ' ' => Some(Action::StopAll),
            '+' | '=' => Some(Action::VolumeUp),
            '-' | '_' => Some(Action::VolumeDown),
            d @ '1'..='9' => {
                let slot = d as usize - '1' as usize;
                (slot < MELODY_SLOTS).then_some(Action::Melody(slot))
            }
            c => key_note(c).map(Action::Play),
        }
    }
}

/// Note bound to a letter key
pub fn key_note(key: char) -> Option<NoteName> {
    let pitch = WHITE_KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, p)| *p)
        .or_else(|| BLACK_KEYS.iter().find(|(k, _, _)| *k == key).map(|(_, p, _)| *p))?;
    NoteName::new(pitch, KEYBOARD_OCTAVE).ok()
}

/// Keyboard session state
#[derive(Debug, Default)]
pub struct KeyboardState {
    playing: Option<usize>,
    last_note: Option<NoteName>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an action; returns `false` when the session should end
    pub fn apply(&mut self, action: Action, engine: &mut ToneEngine, melodies: &[Melody]) -> bool {
        match action {
            Action::Play(note) => {
                engine.play_note(note);
                self.last_note = Some(note);
            }
            Action::VolumeUp => engine.set_volume(engine.volume() + VOLUME_STEP),
            Action::VolumeDown => engine.set_volume(engine.volume() - VOLUME_STEP),
            Action::Melody(slot) => {
                if self.playing_melody(engine) == Some(slot) {
                    engine.stop_melody();
                    self.playing = None;
                } else if let Some(melody) = melodies.get(slot) {
                    engine.play_melody(melody);
                    self.playing = Some(slot);
                }
            }
            Action::StopAll => {
                engine.stop_all_notes();
            }
            Action::Suspend => engine.suspend(),
            Action::Resume => engine.resume(),
            Action::Quit => return false,
        }
        true
    }

    /// Slot of the melody still playing, if any
    pub fn playing_melody(&self, engine: &ToneEngine) -> Option<usize> {
        self.playing.filter(|_| engine.is_melody_playing())
    }

    pub fn last_note(&self) -> Option<NoteName> {
        self.last_note
    }
}

/// Run the keyboard TUI until the user quits
pub fn run_keyboard(engine: &mut ToneEngine, melodies: &[Melody]) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, engine, melodies);

    // Cleanup
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableFocusChange, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    engine: &mut ToneEngine,
    melodies: &[Melody],
) -> Result<()> {
    let mut state = KeyboardState::new();

    loop {
        terminal.draw(|f| draw_ui(f, engine, &state, melodies))?;

        if event::poll(Duration::from_millis(50))? {
            if let Some(action) = Action::from_event(&event::read()?) {
                if !state.apply(action, engine, melodies) {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn draw_ui(f: &mut Frame, engine: &ToneEngine, state: &KeyboardState, melodies: &[Melody]) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(melodies.len().min(MELODY_SLOTS) as u16 + 2),
            Constraint::Length(3),
        ])
        .split(area);

    let active = engine.active_notes();
    let piano = Piano::new(&active).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Octave {} ", KEYBOARD_OCTAVE)),
    );
    f.render_widget(piano, chunks[0]);

    draw_melodies(f, chunks[1], engine, state, melodies);
    draw_status(f, chunks[2], engine, state);
}

fn draw_melodies(
    f: &mut Frame,
    area: Rect,
    engine: &ToneEngine,
    state: &KeyboardState,
    melodies: &[Melody],
) {
    let playing = state.playing_melody(engine);
    let lines: Vec<Line> = melodies
        .iter()
        .take(MELODY_SLOTS)
        .enumerate()
        .map(|(i, m)| {
            let style = if playing == Some(i) {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(format!("  {}  ", i + 1), Style::default().fg(Color::Yellow)),
                Span::styled(m.name.clone(), style),
            ])
        })
        .collect();

    let paragraph =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Melodies "));
    f.render_widget(paragraph, area);
}

fn draw_status(f: &mut Frame, area: Rect, engine: &ToneEngine, state: &KeyboardState) {
    let (status, status_color) = match engine.status() {
        EngineStatus::Running => ("PLAYING", Color::Green),
        EngineStatus::Unavailable => ("NO AUDIO", Color::Red),
        _ => ("IDLE", Color::Yellow),
    };
    let last = state
        .last_note()
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-".to_string());

    let text = Line::from(vec![
        Span::raw("  Status: "),
        Span::styled(status, Style::default().fg(status_color)),
        Span::raw(format!("  |  Volume: {:.0}%", engine.volume() * 100.0)),
        Span::raw(format!("  |  Voices: {}", engine.voice_count())),
        Span::raw(format!("  |  Last: {}", last)),
        Span::raw("  |  +/-: volume  Space: stop  q: quit"),
    ]);

    let paragraph = Paragraph::new(text).block(Block::default().borders(Borders::ALL));

    f.render_widget(paragraph, area);
}
