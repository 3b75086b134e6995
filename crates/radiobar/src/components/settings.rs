//! Settings dialog: overrides the stations feed URL.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use radiobar_core::Intent;

use crate::{
    action::Action,
    component::Component,
    theme::{style_focused_border, style_input, style_muted, style_secondary},
};

pub struct Settings {
    input: Input,
}

impl Settings {
    pub fn new() -> Self {
        Self {
            input: Input::default(),
        }
    }

    /// Start editing from the URL currently in use.
    pub fn open(&mut self, current_url: &str) {
        self.input = Input::new(current_url.to_string());
    }

    pub fn value(&self) -> &str {
        self.input.value()
    }

    fn dialog_area(area: Rect) -> Rect {
        let width = area.width.saturating_sub(4).min(72);
        let height = 5.min(area.height);
        Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + area.height.saturating_sub(height) / 2,
            width,
            height,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Settings {
    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        match key.code {
            KeyCode::Esc => vec![Action::CloseOverlay],
            KeyCode::Enter => {
                let url = self.value().trim();
                if url.is_empty() {
                    return vec![];
                }
                vec![
                    Action::Send(Intent::SetFeedUrl(url.to_string())),
                    Action::CloseOverlay,
                ]
            }
            _ => {
                self.input.handle_event(&Event::Key(key));
                vec![]
            }
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool) {
        let dialog = Self::dialog_area(area);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(style_focused_border())
            .title(" Settings ");
        let inner = block.inner(dialog);
        frame.render_widget(Clear, dialog);
        frame.render_widget(block, dialog);
        if inner.height < 3 {
            return;
        }

        let field_width = inner.width.saturating_sub(1) as usize;
        let scroll = self.input.visual_scroll(field_width);
        let value = self.input.value();
        let shown: String = value.chars().skip(scroll).collect();

        let rows = [
            Line::from(Span::styled("Override stations JSON feed:", style_secondary())),
            Line::from(Span::styled(format!("{:<field_width$}", shown), style_input())),
            Line::from(Span::styled("Enter update   Esc cancel", style_muted())),
        ];
        for (i, row) in rows.into_iter().enumerate() {
            let line_area = Rect {
                y: inner.y + i as u16,
                height: 1,
                ..inner
            };
            frame.render_widget(Paragraph::new(row), line_area);
        }

        let cursor_x = inner.x + (self.input.visual_cursor().saturating_sub(scroll)) as u16;
        frame.set_cursor_position((cursor_x.min(inner.right().saturating_sub(1)), inner.y + 1));
    }
}
