//! StatusMenu: the one-line menu bar at the top and its drop-down.
//!
//! The bar label reads "Radio" until something plays, then the station
//! title.  The drop-down lists every station, a separator, and Quit.

use ratatui::crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use radiobar_core::{Intent, PresentationSink, Station};

use crate::{
    action::Action,
    component::Component,
    components::Redraw,
    theme::{
        station_color, style_focused_border, style_muted, style_playing, style_secondary,
        style_selected, C_MENU_BAR_BG, C_PRIMARY, C_WARNING,
    },
};

pub const IDLE_LABEL: &str = "Radio";
const LABEL_MAX_WIDTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum MenuEntry {
    Station(Station),
    Separator,
    Quit,
}

pub struct StatusMenu {
    entries: Vec<MenuEntry>,
    label: String,
    muted: bool,
    now_playing: Option<Station>,
    list_state: ListState,
    redraw: Redraw,
}

impl StatusMenu {
    pub fn new(redraw: Redraw) -> Self {
        let mut menu = Self {
            entries: Vec::new(),
            label: IDLE_LABEL.to_string(),
            muted: false,
            now_playing: None,
            list_state: ListState::default(),
            redraw,
        };
        menu.rebuild(&[]);
        menu
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    /// Put the highlight on the playing station, or the first entry.
    pub fn reset_selection(&mut self) {
        let playing = self.now_playing.as_ref().and_then(|p| {
            self.entries
                .iter()
                .position(|e| matches!(e, MenuEntry::Station(s) if s == p))
        });
        self.list_state.select(Some(playing.unwrap_or(0)));
    }

    fn rebuild(&mut self, stations: &[Station]) {
        self.entries = stations.iter().cloned().map(MenuEntry::Station).collect();
        if !self.entries.is_empty() {
            self.entries.push(MenuEntry::Separator);
        }
        self.entries.push(MenuEntry::Quit);
        self.list_state.select(Some(0));
    }

    fn step(&mut self, forward: bool) {
        let len = self.entries.len();
        let mut i = self.list_state.selected().unwrap_or(0);
        loop {
            i = if forward {
                (i + 1).min(len - 1)
            } else {
                i.saturating_sub(1)
            };
            let edge = if forward { i == len - 1 } else { i == 0 };
            if self.entries[i] != MenuEntry::Separator || edge {
                break;
            }
        }
        self.list_state.select(Some(i));
    }

    fn render_entry(&self, entry: &MenuEntry) -> ListItem<'static> {
        match entry {
            MenuEntry::Station(station) => {
                let playing = self.now_playing.as_ref() == Some(station);
                let mark = if playing { "✓ " } else { "  " };
                ListItem::new(Line::from(vec![
                    Span::styled(mark, style_playing()),
                    Span::styled("■ ", Style::default().fg(station_color(&station.colour))),
                    Span::styled(
                        station.title.clone(),
                        if playing { style_playing() } else { Style::default().fg(C_PRIMARY) },
                    ),
                ]))
            }
            MenuEntry::Separator => ListItem::new(Span::styled("──────────", style_muted())),
            MenuEntry::Quit => ListItem::new(Span::styled("  Quit", style_secondary())),
        }
    }

    /// The single-row menu bar.
    pub fn draw_bar(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![
            Span::styled(" ♪ ", style_playing()),
            Span::styled(
                self.label().to_string(),
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
            ),
        ];
        if self.muted {
            spans.push(Span::styled("  (muted)", Style::default().fg(C_WARNING)));
        }
        spans.push(Span::styled("   Tab menu", style_muted()));
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(C_MENU_BAR_BG)),
            area,
        );
    }

    fn popup_area(&self, area: Rect) -> Rect {
        let widest = self
            .entries()
            .iter()
            .map(|e| match e {
                MenuEntry::Station(s) => s.title.width() + 4,
                _ => 10,
            })
            .max()
            .unwrap_or(10) as u16;
        Rect {
            x: area.x + 1,
            y: area.y + 1,
            width: (widest + 2).min(area.width.saturating_sub(1)),
            height: (self.entries().len() as u16 + 2).min(area.height.saturating_sub(1)),
        }
    }
}

/// Cut `text` to at most `max` columns, marking the cut with an ellipsis.
pub fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push('…');
    out
}

impl PresentationSink for StatusMenu {
    fn on_stations_changed(&mut self, stations: &[Station]) {
        self.rebuild(stations);
        self.redraw.notify_one();
    }

    fn on_now_playing_changed(&mut self, station: Option<&Station>, muted: bool) {
        self.label = match station {
            Some(s) => truncate_to_width(&s.title, LABEL_MAX_WIDTH),
            None => IDLE_LABEL.to_string(),
        };
        self.now_playing = station.cloned();
        self.muted = muted;
        self.redraw.notify_one();
    }

    // The label follows now-playing, which the directory has already reverted.
    fn on_playback_failed(&mut self, _station: &Station, _reason: &str) {}
}

impl Component for StatusMenu {
    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.step(false);
                vec![]
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.step(true);
                vec![]
            }
            KeyCode::Esc | KeyCode::Tab => vec![Action::CloseOverlay],
            KeyCode::Char('q') => vec![Action::Quit],
            KeyCode::Enter => {
                let entry = self.list_state.selected().and_then(|i| self.entries.get(i));
                match entry {
                    Some(MenuEntry::Station(s)) => {
                        vec![Action::Send(Intent::Play(s.clone())), Action::CloseOverlay]
                    }
                    Some(MenuEntry::Quit) => vec![Action::Quit],
                    _ => vec![],
                }
            }
            _ => vec![],
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool) {
        let popup = self.popup_area(area);
        let items: Vec<ListItem> = self.entries.iter().map(|e| self.render_entry(e)).collect();
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(style_focused_border()),
            )
            .highlight_style(style_selected());
        frame.render_widget(Clear, popup);
        frame.render_stateful_widget(list, popup, &mut self.list_state);
    }
}
