mod action;
mod app;
mod component;
mod components;
mod http;
mod log_forward;
mod mpv;
mod theme;
mod widgets;

use std::sync::{Arc, Mutex};

use radiobar_core::config::Config;
use radiobar_core::{
    IntentSender, PresentationSink, RadioService, ServiceEvent, StationDirectory,
};
use tokio::sync::{broadcast, mpsc, Notify};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::components::{station_list::StationList, status_menu::StatusMenu, Redraw};
use crate::log_forward::LogForwardLayer;
use crate::widgets::status_bar::LogLine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging: file + status-line forwarding ───────────────────────────────
    let (log_tx, log_rx) = broadcast::channel::<LogLine>(100);

    let data_dir = radiobar_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("radiobar.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(LogForwardLayer::new(log_tx))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,radiobar=debug,radiobar_core=debug")
            }),
        )
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("radiobar log: {}", log_path.display());
    info!("radiobar starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!("Using default config: {:#}", e);
            Config::default()
        }
    };

    // ── ServiceEvent channel (TUI/HTTP/player → RadioService) ────────────────
    let (event_tx, event_rx) = mpsc::channel::<ServiceEvent>(256);

    // ── Directory with its playback engine and observers ─────────────────────
    let (engine, player_task) =
        mpv::MpvEngine::spawn(event_tx.clone(), config.player.start_muted);
    let directory =
        StationDirectory::new(Box::new(engine)).starting_muted(config.player.start_muted);

    let redraw: Redraw = Arc::new(Notify::new());
    let mut station_list = Arc::new(Mutex::new(StationList::new(redraw.clone())));
    let mut status_menu = Arc::new(Mutex::new(StatusMenu::new(redraw.clone())));

    // Observers only hear about changes; seed the starting mute flag.
    let muted = directory.now_playing().muted;
    status_menu.on_now_playing_changed(None, muted);
    station_list.on_now_playing_changed(None, muted);

    // Subscriptions live until main returns.
    let menu_subscription = directory.subscribe(status_menu.clone());
    let list_subscription = directory.subscribe(station_list.clone());
    let (snapshot_subscription, snapshot_rx) = directory.watch_snapshots();
    let _subscriptions = [menu_subscription, list_subscription, snapshot_subscription];

    let intents = IntentSender::new(event_tx.clone());
    let http_config = config.http.clone();

    // ── Spawn RadioService loop ──────────────────────────────────────────────
    let service = RadioService::new(config, directory, &event_tx)?
        .persist_config_to(Config::config_path());
    let feed_url = service.watch_feed_url();
    let service_task = tokio::spawn(async move {
        if let Err(e) = service.run(event_rx).await {
            error!("RadioService exited with error: {}", e);
        }
    });

    // ── HTTP server ──────────────────────────────────────────────────────────
    if http_config.enabled {
        http::start_server(
            http_config.bind_address,
            http_config.port,
            snapshot_rx,
            intents.clone(),
        );
    }

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(station_list, status_menu, intents, redraw, feed_url);
    let ui_result = app.run(log_rx).await;

    // ── Shutdown: stop playback, then let mpv go with the engine ─────────────
    let _ = event_tx.send(ServiceEvent::Shutdown).await;
    drop(event_tx);
    if let Err(e) = service_task.await {
        error!("RadioService task failed: {}", e);
    }
    let _ = player_task.await;
    info!("radiobar stopped");

    ui_result
}
