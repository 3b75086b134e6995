//! App: terminal event loop.
//!
//! Architecture:
//! - The station list and status menu are presentation sinks shared with the
//!   service task behind `Arc<Mutex<_>>`; they poke `redraw` when they change.
//! - A `tokio::mpsc` channel carries `AppMessage` events in from background tasks.
//! - The event loop draws when something changed, then awaits the next input.
//! - Components return `Vec<Action>`; intents flow out through `IntentSender`.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    style::Style,
    widgets::Block,
    Frame, Terminal,
};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use radiobar_core::IntentSender;

use crate::{
    action::Action,
    component::Component,
    components::{
        lock, settings::Settings, station_list::StationList, status_menu::StatusMenu, Redraw,
    },
    theme::C_BG,
    widgets::status_bar::{self, InputMode, LogLine},
};

enum AppMessage {
    Event(Event),
    Log(LogLine),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Overlay {
    Menu,
    Settings,
}

pub struct App {
    station_list: Arc<Mutex<StationList>>,
    status_menu: Arc<Mutex<StatusMenu>>,
    settings: Settings,
    overlay: Option<Overlay>,
    intents: IntentSender,
    redraw: Redraw,
    /// Feed URL in effect, as confirmed by the service.
    feed_url: watch::Receiver<String>,
    last_log: Option<LogLine>,
    should_quit: bool,
}

impl App {
    pub fn new(
        station_list: Arc<Mutex<StationList>>,
        status_menu: Arc<Mutex<StatusMenu>>,
        intents: IntentSender,
        redraw: Redraw,
        feed_url: watch::Receiver<String>,
    ) -> Self {
        Self {
            station_list,
            status_menu,
            settings: Settings::new(),
            overlay: None,
            intents,
            redraw,
            feed_url,
            last_log: None,
            should_quit: false,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(mut self, mut log_rx: broadcast::Receiver<LogLine>) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(256);

        // ── Background task: keyboard events ──────────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: forwarded WARN/ERROR lines ───────────────────────
        let log_tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match log_rx.recv().await {
                    Ok(line) => {
                        if log_tx.send(AppMessage::Log(line)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!("log receiver lagged by {} lines", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        let result = loop {
            if needs_redraw {
                if let Err(e) = terminal.draw(|f| self.draw(f)) {
                    break Err(e.into());
                }
            }
            needs_redraw = false;

            if self.should_quit {
                break Ok(());
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    needs_redraw = self.handle_message(msg).await;
                }
                _ = self.redraw.notified() => {
                    needs_redraw = true;
                }
                _ = ui_tick.tick() => {}
            }
        };

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        info!("TUI closed");

        result
    }

    // ── Message handler ───────────────────────────────────────────────────────

    /// Returns `true` if the message requires a redraw.
    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(Event::Key(key)) => {
                if key.kind == KeyEventKind::Release {
                    return false;
                }
                for action in self.handle_key(key) {
                    self.dispatch(action).await;
                }
                true
            }
            AppMessage::Event(Event::Resize(..)) => true,
            AppMessage::Event(_) => false,
            AppMessage::Log(line) => {
                self.last_log = Some(line);
                true
            }
        }
    }

    fn input_mode(&self) -> InputMode {
        match self.overlay {
            None => InputMode::Normal,
            Some(Overlay::Menu) => InputMode::Menu,
            Some(Overlay::Settings) => InputMode::Settings,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return vec![Action::Quit];
        }
        match self.overlay {
            Some(Overlay::Menu) => lock(&self.status_menu).handle_key(key),
            Some(Overlay::Settings) => self.settings.handle_key(key),
            None => match key.code {
                KeyCode::Char('q') => vec![Action::Quit],
                KeyCode::Char(',') => vec![Action::OpenSettings],
                KeyCode::Tab => vec![Action::OpenMenu],
                _ => lock(&self.station_list).handle_key(key),
            },
        }
    }

    async fn dispatch(&mut self, action: Action) {
        match action {
            Action::Send(intent) => {
                if let Err(e) = self.intents.send(intent).await {
                    warn!("{}", e);
                }
            }
            Action::OpenMenu => {
                lock(&self.status_menu).reset_selection();
                self.overlay = Some(Overlay::Menu);
            }
            Action::OpenSettings => {
                let current = self.feed_url.borrow().clone();
                self.settings.open(&current);
                self.overlay = Some(Overlay::Settings);
            }
            Action::CloseOverlay => self.overlay = None,
            Action::Quit => self.should_quit = true,
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        let chunks = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

        lock(&self.status_menu).draw_bar(frame, chunks[0]);
        lock(&self.station_list).draw(frame, chunks[1], self.overlay.is_none());
        status_bar::draw_log_bar(frame, chunks[2], self.last_log.as_ref());
        status_bar::draw_keys_bar(frame, chunks[3], self.input_mode());

        match self.overlay {
            Some(Overlay::Menu) => lock(&self.status_menu).draw(frame, area, true),
            Some(Overlay::Settings) => self.settings.draw(frame, chunks[1], true),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radiobar_core::{Intent, PresentationSink, ServiceEvent, Station};
    use tokio::sync::Notify;

    fn station(title: &str) -> Station {
        let base = format!("https://{}.fm", title.to_lowercase());
        Station {
            title: title.to_string(),
            website: base.parse().unwrap(),
            stream_url: format!("{base}/stream").parse().unwrap(),
            logo_url: format!("{base}/logo.png").parse().unwrap(),
            colour: "#336699".to_string(),
        }
    }

    fn key(code: KeyCode) -> AppMessage {
        AppMessage::Event(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn app() -> (App, mpsc::Receiver<ServiceEvent>) {
        let (app, rx, _feed_url_tx) = app_with_feed_url();
        (app, rx)
    }

    fn app_with_feed_url() -> (App, mpsc::Receiver<ServiceEvent>, watch::Sender<String>) {
        let redraw: Redraw = Arc::new(Notify::new());
        let list = Arc::new(Mutex::new(StationList::new(redraw.clone())));
        let menu = Arc::new(Mutex::new(StatusMenu::new(redraw.clone())));
        let stations = [station("Alpha"), station("Beta")];
        list.clone().on_stations_changed(&stations);
        menu.clone().on_stations_changed(&stations);

        let (tx, rx) = mpsc::channel(16);
        let (feed_url_tx, feed_url_rx) =
            watch::channel("https://orllewin.uk/stations.json".to_string());
        let app = App::new(list, menu, IntentSender::new(tx), redraw, feed_url_rx);
        (app, rx, feed_url_tx)
    }

    fn intent(rx: &mut mpsc::Receiver<ServiceEvent>) -> Intent {
        match rx.try_recv() {
            Ok(ServiceEvent::Intent(i)) => i,
            other => panic!("expected intent, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_enter_sends_play_for_selected_row() {
        let (mut app, mut rx) = app();
        app.handle_message(key(KeyCode::Down)).await;
        app.handle_message(key(KeyCode::Enter)).await;
        assert_eq!(intent(&mut rx), Intent::Play(station("Beta")));
    }

    #[tokio::test]
    async fn test_menu_overlay_plays_and_closes() {
        let (mut app, mut rx) = app();
        app.handle_message(key(KeyCode::Tab)).await;
        assert_eq!(app.overlay, Some(Overlay::Menu));
        assert_eq!(app.input_mode(), InputMode::Menu);

        app.handle_message(key(KeyCode::Enter)).await;
        assert_eq!(intent(&mut rx), Intent::Play(station("Alpha")));
        assert_eq!(app.overlay, None);
    }

    #[tokio::test]
    async fn test_menu_quit_entry_quits() {
        let (mut app, _rx) = app();
        app.handle_message(key(KeyCode::Tab)).await;
        for _ in 0..3 {
            app.handle_message(key(KeyCode::Down)).await;
        }
        app.handle_message(key(KeyCode::Enter)).await;
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_settings_submit_sets_feed_url() {
        let (mut app, mut rx) = app();
        app.handle_message(key(KeyCode::Char(','))).await;
        assert_eq!(app.overlay, Some(Overlay::Settings));
        // 'q' is text while the dialog is open.
        app.handle_message(key(KeyCode::Char('q'))).await;
        assert!(!app.should_quit);
        app.handle_message(key(KeyCode::Enter)).await;

        let expected = "https://orllewin.uk/stations.jsonq".to_string();
        assert_eq!(intent(&mut rx), Intent::SetFeedUrl(expected));
        assert_eq!(app.overlay, None);
    }

    #[tokio::test]
    async fn test_settings_prefill_follows_confirmed_feed_url() {
        let (mut app, _rx, feed_url_tx) = app_with_feed_url();

        // Submitted but not accepted: the dialog reopens on the old URL.
        app.handle_message(key(KeyCode::Char(','))).await;
        app.handle_message(key(KeyCode::Char('x'))).await;
        app.handle_message(key(KeyCode::Enter)).await;
        app.handle_message(key(KeyCode::Char(','))).await;
        assert_eq!(app.settings.value(), "https://orllewin.uk/stations.json");
        app.handle_message(key(KeyCode::Esc)).await;

        feed_url_tx.send_replace("https://x.test/s.json".to_string());
        app.handle_message(key(KeyCode::Char(','))).await;
        assert_eq!(app.settings.value(), "https://x.test/s.json");
    }

    #[tokio::test]
    async fn test_playback_keys_forward_intents() {
        let (mut app, mut rx) = app();
        app.handle_message(key(KeyCode::Char('m'))).await;
        app.handle_message(key(KeyCode::Char('s'))).await;
        app.handle_message(key(KeyCode::Char('r'))).await;
        assert_eq!(intent(&mut rx), Intent::ToggleMute);
        assert_eq!(intent(&mut rx), Intent::Stop);
        assert_eq!(intent(&mut rx), Intent::Reload);
    }

    #[tokio::test]
    async fn test_quit_key() {
        let (mut app, _rx) = app();
        app.handle_message(key(KeyCode::Char('q'))).await;
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_log_line_is_kept_for_status_bar() {
        let (mut app, _rx) = app();
        let line = LogLine {
            text: "12:00:00 [WARN] feed unavailable".into(),
            is_error: false,
        };
        assert!(app.handle_message(AppMessage::Log(line.clone())).await);
        assert_eq!(app.last_log, Some(line));
    }
}
