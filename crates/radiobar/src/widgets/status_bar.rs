//! Status bar: bottom lines with the latest log event and keybindings.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_ACCENT, C_INPUT_FG, C_MUTED, C_SECONDARY, C_SEPARATOR, C_WARNING};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Normal,
    Menu,
    Settings,
}

impl InputMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "RADIO",
            Self::Menu => "MENU",
            Self::Settings => "SETTINGS",
        }
    }

    fn keys(self) -> &'static str {
        match self {
            Self::Normal => {
                " ↑↓/jk select  Enter play  s stop  m mute  r reload  , settings  Tab menu  q quit"
            }
            Self::Menu => " ↑↓ select  Enter choose  Esc/Tab close",
            Self::Settings => " type feed URL  Enter update  Esc cancel",
        }
    }
}

/// A forwarded log line: "HH:MM:SS LEVEL message".
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub text: String,
    pub is_error: bool,
}

/// Draw the log bar: last forwarded WARN/ERROR line.
pub fn draw_log_bar(frame: &mut Frame, area: Rect, last_log: Option<&LogLine>) {
    let line = match last_log {
        Some(log) => {
            let color = if log.is_error { C_ACCENT } else { C_WARNING };
            Line::from(vec![
                Span::styled("● ", Style::default().fg(color)),
                Span::styled(log.text.as_str(), Style::default().fg(C_SECONDARY)),
            ])
        }
        None => Line::from(Span::styled("─".repeat(area.width as usize), Style::default().fg(C_SEPARATOR))),
    };
    frame.render_widget(Paragraph::new(line), area);
}

/// Draw the keybindings footer bar (one row).
pub fn draw_keys_bar(frame: &mut Frame, area: Rect, mode: InputMode) {
    let label_color = match mode {
        InputMode::Normal => C_SECONDARY,
        InputMode::Menu | InputMode::Settings => C_INPUT_FG,
    };
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", mode.label()),
            Style::default().fg(label_color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(mode.keys(), Style::default().fg(C_MUTED)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}
