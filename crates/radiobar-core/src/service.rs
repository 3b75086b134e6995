//! RadioService: single-owner event loop for the station directory.
//!
//! All tasks that need to change directory state send `ServiceEvent`
//! messages to this loop: intents from the UI and HTTP API, feed
//! completions from fetch tasks, and late failures from the playback
//! engine.  The service owns the `StationDirectory` exclusively, so
//! mutations and observer fan-out never interleave.
//!
//! Feed fetches run on spawned tasks.  Their results come back as
//! `ServiceEvent::FeedLoaded` and are applied in arrival order; a fetch
//! started earlier may land later and win.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::Config;
use crate::directory::StationDirectory;
use crate::feed::{FeedClient, FetchError};
use crate::sink::FeedFailure;
use crate::station::{Feed, Station};

/// What a presentation sink (or the HTTP API) may ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Play(Station),
    /// Play the station at this position of the current list.
    PlayIndex(usize),
    Stop,
    SetMuted(bool),
    ToggleMute,
    /// Refetch the configured feed.
    Reload,
    /// Replace the configured feed URL, persist it, then reload.
    SetFeedUrl(String),
}

/// All inputs into the RadioService loop.
#[derive(Debug)]
pub enum ServiceEvent {
    Intent(Intent),
    /// A fetch task finished.
    FeedLoaded {
        url: String,
        result: Result<Feed, FetchError>,
    },
    /// The playback engine gave up on a stream it had accepted.
    PlaybackFailed { stream_url: Url, reason: String },
    Shutdown,
}

pub struct RadioService {
    config: Config,
    /// Where `SetFeedUrl` persists the config.  `None` keeps it in memory.
    config_path: Option<PathBuf>,
    directory: StationDirectory,
    feed_client: FeedClient,
    /// Weak so that the loop ends once every outside sender is gone.
    event_tx: mpsc::WeakSender<ServiceEvent>,
    /// The feed URL in effect; changes only once `SetFeedUrl` is accepted.
    feed_url_tx: watch::Sender<String>,
    fetches_started: u64,
}

impl RadioService {
    pub fn new(
        config: Config,
        directory: StationDirectory,
        event_tx: &mpsc::Sender<ServiceEvent>,
    ) -> Result<Self, FetchError> {
        let feed_client = FeedClient::new(Duration::from_secs(config.feed.timeout_secs))?;
        let (feed_url_tx, _) = watch::channel(config.feed.url.clone());
        Ok(Self {
            config,
            config_path: None,
            directory,
            feed_client,
            event_tx: event_tx.downgrade(),
            feed_url_tx,
            fetches_started: 0,
        })
    }

    pub fn persist_config_to(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Follows the accepted feed URL; rejected `SetFeedUrl` values never show up.
    pub fn watch_feed_url(&self) -> watch::Receiver<String> {
        self.feed_url_tx.subscribe()
    }

    /// Run the event loop.  Fetches the feed once on entry, then returns
    /// when a `Shutdown` event arrives or every sender has been dropped.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<ServiceEvent>) -> anyhow::Result<()> {
        info!("RadioService: starting event loop");
        self.reload();

        loop {
            match event_rx.recv().await {
                None => {
                    info!("RadioService: event channel closed, shutting down");
                    break;
                }
                Some(ServiceEvent::Shutdown) => {
                    info!("RadioService: shutdown requested");
                    break;
                }
                Some(evt) => self.handle_event(evt),
            }
        }

        if self.directory.now_playing().is_playing() {
            self.directory.stop();
        }
        Ok(())
    }

    pub fn handle_event(&mut self, evt: ServiceEvent) {
        match evt {
            ServiceEvent::Intent(intent) => {
                debug!("RadioService: intent {:?}", intent);
                self.handle_intent(intent);
            }
            ServiceEvent::FeedLoaded { url, result } => match result {
                Ok(feed) => self.directory.replace_stations(feed),
                Err(e) => self.directory.feed_failed(&FeedFailure::new(url, &e)),
            },
            ServiceEvent::PlaybackFailed { stream_url, reason } => {
                self.directory.playback_failed(&stream_url, &reason);
            }
            ServiceEvent::Shutdown => {}
        }
    }

    fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::Play(station) => self.directory.play(station),
            Intent::PlayIndex(idx) => match self.directory.stations().get(idx).cloned() {
                Some(station) => self.directory.play(station),
                None => warn!(
                    "No station at index {} ({} loaded)",
                    idx,
                    self.directory.stations().len()
                ),
            },
            Intent::Stop => self.directory.stop(),
            Intent::SetMuted(muted) => self.directory.set_muted(muted),
            Intent::ToggleMute => {
                let muted = !self.directory.now_playing().muted;
                self.directory.set_muted(muted);
            }
            Intent::Reload => self.reload(),
            Intent::SetFeedUrl(url) => self.set_feed_url(url),
        }
    }

    fn set_feed_url(&mut self, url: String) {
        let url = url.trim().to_string();
        if let Err(source) = Url::parse(&url) {
            let err = FetchError::InvalidUrl {
                url: url.clone(),
                source,
            };
            self.directory.feed_failed(&FeedFailure::new(url, &err));
            return;
        }

        info!("Feed URL changed to {}", url);
        self.config.feed.url = url.clone();
        self.feed_url_tx.send_replace(url);
        if let Some(path) = &self.config_path {
            if let Err(e) = self.config.save_to(path) {
                error!("Failed to persist config to {}: {}", path.display(), e);
            }
        }
        self.reload();
    }

    /// Start a background fetch of the configured feed.
    fn reload(&mut self) {
        let Some(tx) = self.event_tx.upgrade() else {
            debug!("RadioService: no senders left, skipping reload");
            return;
        };
        self.fetches_started += 1;
        let fetch_id = self.fetches_started;
        let url = self.config.feed.url.clone();
        let client = self.feed_client.clone();
        info!("Reloading feed #{} from {}", fetch_id, url);

        tokio::spawn(async move {
            let result = client.fetch_feed(&url).await;
            debug!("Feed fetch #{} finished (ok={})", fetch_id, result.is_ok());
            let _ = tx.send(ServiceEvent::FeedLoaded { url, result }).await;
        });
    }
}
