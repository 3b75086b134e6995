//! Presentation sinks: the observer side of the station directory.
//!
//! A sink only *reads* through these callbacks and only *writes* by sending
//! an [`Intent`] through an [`IntentSender`].  It never touches directory
//! state directly.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;
use tracing::debug;

use crate::feed::{FetchError, FetchErrorKind};
use crate::service::{Intent, ServiceEvent};
use crate::station::Station;

/// A feed fetch that failed, in a form every sink can hold on to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFailure {
    pub url: String,
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FeedFailure {
    pub fn new(url: impl Into<String>, error: &FetchError) -> Self {
        Self {
            url: url.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// One-line form shown to the user, e.g. "feed unavailable: ...".
    pub fn summary(&self) -> String {
        format!("{}: {}", self.kind.label(), self.message)
    }
}

pub trait PresentationSink: Send {
    fn on_stations_changed(&mut self, stations: &[Station]);

    fn on_now_playing_changed(&mut self, station: Option<&Station>, muted: bool);

    fn on_playback_failed(&mut self, station: &Station, reason: &str);

    /// The last fetch failed; the previous station list is still current.
    fn on_feed_failed(&mut self, _failure: &FeedFailure) {}
}

/// Lets a renderer keep its model behind a mutex it shares with the draw loop.
impl<T: PresentationSink> PresentationSink for Arc<Mutex<T>> {
    fn on_stations_changed(&mut self, stations: &[Station]) {
        lock(self).on_stations_changed(stations);
    }

    fn on_now_playing_changed(&mut self, station: Option<&Station>, muted: bool) {
        lock(self).on_now_playing_changed(station, muted);
    }

    fn on_playback_failed(&mut self, station: &Station, reason: &str) {
        lock(self).on_playback_failed(station, reason);
    }

    fn on_feed_failed(&mut self, failure: &FeedFailure) {
        lock(self).on_feed_failed(failure);
    }
}

pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── observer registry ─────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct ObserverSet {
    next_id: u64,
    entries: Vec<(u64, Box<dyn PresentationSink>)>,
}

impl ObserverSet {
    pub(crate) fn insert(&mut self, sink: Box<dyn PresentationSink>) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.push((id, sink));
        id
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Visit sinks in subscription order.
    pub(crate) fn for_each(&mut self, mut f: impl FnMut(&mut dyn PresentationSink)) {
        for (_, sink) in self.entries.iter_mut() {
            f(sink.as_mut());
        }
    }
}

/// Handle returned by [`StationDirectory::subscribe`].  Dropping it, or
/// calling [`release`](Subscription::release), unsubscribes the sink.
///
/// Must not be dropped from inside a sink callback: the observer set is
/// locked for the duration of a fan-out.
///
/// [`StationDirectory::subscribe`]: crate::directory::StationDirectory::subscribe
#[must_use = "dropping a Subscription unsubscribes the sink"]
pub struct Subscription {
    id: u64,
    observers: Weak<Mutex<ObserverSet>>,
}

impl Subscription {
    pub(crate) fn new(id: u64, observers: &Arc<Mutex<ObserverSet>>) -> Self {
        Self {
            id,
            observers: Arc::downgrade(observers),
        }
    }

    pub fn release(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            if lock(&observers).remove(self.id) {
                debug!("Observer {} unsubscribed", self.id);
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ── intents ───────────────────────────────────────────────────────────────────

/// Cloneable write side for sinks and the HTTP API.
#[derive(Debug, Clone)]
pub struct IntentSender {
    tx: mpsc::Sender<ServiceEvent>,
}

impl IntentSender {
    pub fn new(tx: mpsc::Sender<ServiceEvent>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, intent: Intent) -> anyhow::Result<()> {
        self.tx
            .send(ServiceEvent::Intent(intent))
            .await
            .map_err(|_| anyhow::anyhow!("radio service is gone"))
    }
}
