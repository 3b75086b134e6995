use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use radiobar_core::{DirectorySnapshot, Intent, IntentSender};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Clone)]
struct HttpState {
    snapshot: watch::Receiver<DirectorySnapshot>,
    intents: IntentSender,
}

#[derive(Serialize)]
struct ApiState {
    rev: u64,
    stations: Vec<StationInfo>,
    current_station: Option<usize>,
    now_playing: Option<String>,
    muted: bool,
    feed_error: Option<String>,
}

#[derive(Serialize)]
struct StationInfo {
    idx: usize,
    title: String,
    website: String,
    stream_url: String,
    logo_url: String,
    colour: String,
}

#[derive(Deserialize)]
struct FeedUpdate {
    url: String,
}

pub fn router(snapshot: watch::Receiver<DirectorySnapshot>, intents: IntentSender) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/play/:idx", get(play_station).post(play_station))
        .route("/api/stop", get(stop).post(stop))
        .route("/api/mute", post(toggle_mute))
        .route("/api/mute/:on", get(set_muted).post(set_muted))
        .route("/api/reload", get(reload).post(reload))
        .route("/api/feed", put(set_feed))
        .layer(CorsLayer::permissive())
        .with_state(HttpState { snapshot, intents })
}

pub fn start_server(
    bind_address: String,
    port: u16,
    snapshot: watch::Receiver<DirectorySnapshot>,
    intents: IntentSender,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(snapshot, intents);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn get_state(State(state): State<HttpState>) -> Json<ApiState> {
    let snap = state.snapshot.borrow().clone();

    let stations: Vec<StationInfo> = snap
        .stations
        .iter()
        .enumerate()
        .map(|(idx, s)| StationInfo {
            idx,
            title: s.title.clone(),
            website: s.website.to_string(),
            stream_url: s.stream_url.to_string(),
            logo_url: s.logo_url.to_string(),
            colour: s.colour.clone(),
        })
        .collect();

    let current_station = snap
        .now_playing
        .station
        .as_ref()
        .and_then(|playing| snap.stations.iter().position(|s| s == playing));

    Json(ApiState {
        rev: snap.rev,
        stations,
        current_station,
        now_playing: snap.now_playing.title().map(str::to_string),
        muted: snap.now_playing.muted,
        feed_error: snap.feed_error,
    })
}

async fn forward(state: &HttpState, intent: Intent) -> StatusCode {
    if let Err(e) = state.intents.send(intent).await {
        error!("HTTP API: {}", e);
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

async fn play_station(State(state): State<HttpState>, Path(idx): Path<usize>) -> StatusCode {
    info!("HTTP API: Play station {}", idx);
    if idx >= state.snapshot.borrow().stations.len() {
        return StatusCode::NOT_FOUND;
    }
    forward(&state, Intent::PlayIndex(idx)).await
}

async fn stop(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Stop");
    forward(&state, Intent::Stop).await
}

async fn toggle_mute(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Toggle mute");
    forward(&state, Intent::ToggleMute).await
}

async fn set_muted(State(state): State<HttpState>, Path(on): Path<bool>) -> StatusCode {
    info!("HTTP API: Set muted {}", on);
    forward(&state, Intent::SetMuted(on)).await
}

async fn reload(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Reload feed");
    forward(&state, Intent::Reload).await
}

async fn set_feed(State(state): State<HttpState>, Json(update): Json<FeedUpdate>) -> StatusCode {
    info!("HTTP API: Set feed URL {}", update.url);
    if update.url.trim().is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    forward(&state, Intent::SetFeedUrl(update.url)).await
}
