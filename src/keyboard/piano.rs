//! One-octave piano widget for ratatui

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Widget},
};

use super::{BLACK_KEYS, KEYBOARD_OCTAVE, WHITE_KEYS};
use crate::synth::{NoteName, PitchClass};

const WHITE_STYLE: Style = Style::new().fg(Color::Black).bg(Color::White);
const BLACK_STYLE: Style = Style::new().fg(Color::White).bg(Color::Black);
const WHITE_ACTIVE: Style = Style::new().fg(Color::Black).bg(Color::Cyan);
const BLACK_ACTIVE: Style = Style::new().fg(Color::Black).bg(Color::Magenta);

/// Draws the keyboard octave with sounding notes highlighted
pub struct Piano<'a> {
    active: &'a [NoteName],
    block: Option<Block<'a>>,
}

impl<'a> Piano<'a> {
    pub fn new(active: &'a [NoteName]) -> Self {
        Self {
            active,
            block: None,
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    fn is_active(&self, pitch: PitchClass) -> bool {
        self.active
            .iter()
            .any(|n| n.pitch() == pitch && n.octave() == KEYBOARD_OCTAVE)
    }

    /// Column span of white key `index` within `area`
    fn white_span(area: Rect, index: usize) -> (u16, u16) {
        let width = area.width / WHITE_KEYS.len() as u16;
        (area.x + index as u16 * width, width)
    }

    fn render_keys(&self, area: Rect, buf: &mut Buffer) {
        let key_width = area.width / WHITE_KEYS.len() as u16;
        if key_width < 3 || area.height < 3 {
            return;
        }

        for (i, (key, pitch)) in WHITE_KEYS.iter().enumerate() {
            let (x, width) = Self::white_span(area, i);
            let style = if self.is_active(*pitch) {
                WHITE_ACTIVE
            } else {
                WHITE_STYLE
            };
            buf.set_style(Rect::new(x, area.y, width - 1, area.height), style);

            let bottom = area.y + area.height - 1;
            buf.set_string(x + 1, bottom, key.to_string(), style);
            if area.height > 3 {
                buf.set_string(x + 1, bottom - 1, pitch.as_str(), style);
            }
        }

        let black_height = (area.height * 3 / 5).max(1);
        let black_width = (key_width / 2).max(1);

        for (key, pitch, after) in BLACK_KEYS.iter() {
            let (x, width) = Self::white_span(area, *after);
            let left = x + width - black_width / 2 - 1;
            let style = if self.is_active(*pitch) {
                BLACK_ACTIVE
            } else {
                BLACK_STYLE
            };
            buf.set_style(Rect::new(left, area.y, black_width, black_height), style);
            buf.set_string(left, area.y + black_height - 1, key.to_string(), style);
        }
    }
}

impl Widget for Piano<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner_area = match &self.block {
            Some(block) => {
                let inner = block.inner(area);
                block.clone().render(area, buf);
                inner
            }
            None => area,
        };

        self.render_keys(inner_area, buf);
    }
}
