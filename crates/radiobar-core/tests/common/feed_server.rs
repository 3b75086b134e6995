#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Router};

pub const TEST_FM_FEED: &str = r##"{"stations":[{"title":"Test FM","website":"https://t.fm","streamUrl":"https://t.fm/stream","logoUrl":"https://t.fm/logo.png","colour":"#336699"}]}"##;

pub const MISSING_LOGO_FEED: &str = r##"{"stations":[{"title":"Broken FM","website":"https://b.fm","streamUrl":"https://b.fm/stream","colour":"#336699"}]}"##;

pub const BAD_URL_FEED: &str = r##"{"stations":[{"title":"Broken FM","website":"https://b.fm","streamUrl":"not a url","logoUrl":"https://b.fm/logo.png","colour":"#336699"}]}"##;

/// Build a feed body with `n` well-formed stations titled `Station 0..n`.
pub fn feed_with(n: usize) -> String {
    let stations: Vec<String> = (0..n)
        .map(|i| {
            format!(
                r##"{{"title":"Station {i}","website":"https://s{i}.fm","streamUrl":"https://s{i}.fm/stream","logoUrl":"https://s{i}.fm/logo.png","colour":"#0000{i:02x}"}}"##
            )
        })
        .collect();
    format!(r#"{{"stations":[{}]}}"#, stations.join(","))
}

type Canned = Arc<Mutex<(StatusCode, String)>>;

/// In-process feed endpoint whose response can be swapped between requests.
///
/// Routes:
///   /stations.json  → the canned status + body
///   /slow.json      → the canned response, after a 3 s delay
pub struct FeedServer {
    pub addr: SocketAddr,
    canned: Canned,
}

impl FeedServer {
    pub async fn start(status: StatusCode, body: impl Into<String>) -> Self {
        let canned: Canned = Arc::new(Mutex::new((status, body.into())));
        let app = Router::new()
            .route("/stations.json", get(canned_feed))
            .route("/slow.json", get(slow_feed))
            .with_state(canned.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind feed server");
        let addr = listener.local_addr().expect("feed server addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("feed server");
        });

        Self { addr, canned }
    }

    pub async fn ok(body: impl Into<String>) -> Self {
        Self::start(StatusCode::OK, body).await
    }

    pub fn url(&self) -> String {
        format!("http://{}/stations.json", self.addr)
    }

    pub fn slow_url(&self) -> String {
        format!("http://{}/slow.json", self.addr)
    }

    pub fn respond_with(&self, status: StatusCode, body: impl Into<String>) {
        *self.canned.lock().unwrap() = (status, body.into());
    }
}

async fn canned_feed(State(canned): State<Canned>) -> (StatusCode, String) {
    canned.lock().unwrap().clone()
}

async fn slow_feed(State(canned): State<Canned>) -> (StatusCode, String) {
    tokio::time::sleep(Duration::from_secs(3)).await;
    canned.lock().unwrap().clone()
}

/// An address nothing is listening on.
pub async fn refused_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/stations.json")
}
