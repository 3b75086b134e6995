//! StationList component: the main pane.
//!
//! A presentation sink: the service pushes the station list and the
//! now-playing state in, and the draw loop renders whatever is current.
//! Enter asks for playback of the highlighted row; nothing here changes
//! now-playing state directly.

use ratatui::crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use radiobar_core::{FeedFailure, Intent, PresentationSink, Station};

use crate::{
    action::Action,
    component::Component,
    components::Redraw,
    theme::{
        contrast_color, station_color, style_focused_border, style_muted, style_playing,
        style_secondary, style_selected, style_unfocused_border, C_ACCENT, C_LINK, C_PRIMARY,
        C_WARNING,
    },
};

pub struct StationList {
    stations: Vec<Station>,
    now_playing: Option<Station>,
    muted: bool,
    list_state: ListState,
    /// Last playback or feed failure, cleared when the condition goes away.
    problem: Option<String>,
    redraw: Redraw,
}

impl StationList {
    pub fn new(redraw: Redraw) -> Self {
        Self {
            stations: Vec::new(),
            now_playing: None,
            muted: false,
            list_state: ListState::default(),
            problem: None,
            redraw,
        }
    }

    pub fn selected(&self) -> Option<&Station> {
        self.list_state.selected().and_then(|i| self.stations.get(i))
    }

    pub fn problem(&self) -> Option<&str> {
        self.problem.as_deref()
    }

    fn select_up(&mut self) {
        if let Some(i) = self.list_state.selected() {
            self.list_state.select(Some(i.saturating_sub(1)));
        }
    }

    fn select_down(&mut self) {
        let last = self.stations.len().saturating_sub(1);
        if let Some(i) = self.list_state.selected() {
            self.list_state.select(Some((i + 1).min(last)));
        }
    }

    fn is_current(&self, station: &Station) -> bool {
        self.now_playing.as_ref() == Some(station)
    }

    fn render_item<'a>(&self, station: &'a Station, is_selected: bool) -> ListItem<'a> {
        let is_current = self.is_current(station);
        let (icon, icon_style) = if is_current {
            ("▶", style_playing())
        } else {
            (" ", style_muted())
        };

        let name_style = if is_current {
            style_playing()
        } else if is_selected {
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
        } else {
            style_secondary()
        };

        let swatch = Span::styled(
            "  ",
            Style::default().bg(station_color(&station.colour)),
        );

        ListItem::new(Line::from(vec![
            Span::raw(" "),
            swatch,
            Span::raw(" "),
            Span::styled(icon, icon_style),
            Span::raw(" "),
            Span::styled(station.title.as_str(), name_style),
        ]))
    }

    fn draw_now_playing(&self, frame: &mut Frame, area: Rect) {
        let lines = match &self.now_playing {
            Some(station) => {
                let badge = Span::styled(
                    format!(" {} ", station.title),
                    Style::default()
                        .bg(station_color(&station.colour))
                        .fg(contrast_color(&station.colour))
                        .add_modifier(Modifier::BOLD),
                );
                let mut first = vec![Span::styled(" ▶ ", style_playing()), badge];
                if self.muted {
                    first.push(Span::styled("  [muted]", Style::default().fg(C_WARNING)));
                }
                vec![
                    Line::from(first),
                    Line::from(Span::styled(
                        format!("   {}", station.website),
                        Style::default().fg(C_LINK),
                    )),
                ]
            }
            None => {
                let mut first = vec![Span::styled(" ■ nothing playing", style_muted())];
                if self.muted {
                    first.push(Span::styled("  [muted]", Style::default().fg(C_WARNING)));
                }
                vec![Line::from(first), Line::default()]
            }
        };
        frame.render_widget(Paragraph::new(lines), area);
    }
}

impl PresentationSink for StationList {
    fn on_stations_changed(&mut self, stations: &[Station]) {
        let keep = self.selected().cloned();
        self.stations = stations.to_vec();
        let selected = keep
            .and_then(|s| self.stations.iter().position(|x| *x == s))
            .or(if self.stations.is_empty() { None } else { Some(0) });
        self.list_state.select(selected);
        self.problem = None;
        self.redraw.notify_one();
    }

    fn on_now_playing_changed(&mut self, station: Option<&Station>, muted: bool) {
        if station.is_some() {
            self.problem = None;
        }
        self.now_playing = station.cloned();
        self.muted = muted;
        self.redraw.notify_one();
    }

    fn on_playback_failed(&mut self, station: &Station, reason: &str) {
        self.problem = Some(format!("Could not play {}: {}", station.title, reason));
        self.redraw.notify_one();
    }

    fn on_feed_failed(&mut self, failure: &FeedFailure) {
        self.problem = Some(failure.summary());
        self.redraw.notify_one();
    }
}

impl Component for StationList {
    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.select_up();
                vec![]
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.select_down();
                vec![]
            }
            KeyCode::Enter => match self.selected() {
                Some(station) => vec![Action::Send(Intent::Play(station.clone()))],
                None => vec![],
            },
            KeyCode::Char('s') => vec![Action::Send(Intent::Stop)],
            KeyCode::Char('m') => vec![Action::Send(Intent::ToggleMute)],
            KeyCode::Char('r') => vec![Action::Send(Intent::Reload)],
            _ => vec![],
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool) {
        let border_style = if focused {
            style_focused_border()
        } else {
            style_unfocused_border()
        };
        let title = format!(" Stations ({}) ", self.stations.len());
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(Span::styled(title, Style::default().fg(C_PRIMARY)));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let problem_height = if self.problem().is_some() { 1 } else { 0 };
        let chunks = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(problem_height),
        ])
        .split(inner);

        self.draw_now_playing(frame, chunks[0]);
        frame.render_widget(
            Paragraph::new(Span::styled(
                "─".repeat(chunks[1].width as usize),
                style_unfocused_border(),
            )),
            chunks[1],
        );

        if self.stations.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled(" no stations yet (r to reload)", style_muted())),
                chunks[2],
            );
        } else {
            let selected = self.list_state.selected();
            let items: Vec<ListItem> = self
                .stations
                .iter()
                .enumerate()
                .map(|(i, s)| self.render_item(s, selected == Some(i)))
                .collect();
            let list = List::new(items).highlight_style(style_selected());
            frame.render_stateful_widget(list, chunks[2], &mut self.list_state);
        }

        if let Some(problem) = &self.problem {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    format!(" ✗ {}", problem),
                    Style::default().fg(C_ACCENT),
                )),
                chunks[3],
            );
        }
    }
}
