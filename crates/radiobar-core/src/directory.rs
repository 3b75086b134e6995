//! StationDirectory: the authoritative station list and now-playing state.
//!
//! Every mutation follows the same shape: update state, bump `rev`, then
//! notify all observers synchronously in subscription order.  The directory
//! itself is not shared; it lives inside the `RadioService` task, which is
//! the only caller of the mutating methods.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::playback::PlaybackEngine;
use crate::sink::{lock, FeedFailure, ObserverSet, PresentationSink, Subscription};
use crate::station::{Feed, Station};

/// The optional current station plus the mute flag.
///
/// The mute flag is independent of the station: `play` and `stop` leave it
/// as it is, only `set_muted` changes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NowPlaying {
    pub station: Option<Station>,
    pub muted: bool,
}

impl NowPlaying {
    pub fn title(&self) -> Option<&str> {
        self.station.as_ref().map(|s| s.title.as_str())
    }

    pub fn is_playing(&self) -> bool {
        self.station.is_some()
    }
}

/// Point-in-time copy of the directory, for readers outside the service task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectorySnapshot {
    /// Monotonic revision counter, incremented on every state change.
    pub rev: u64,
    pub stations: Vec<Station>,
    pub now_playing: NowPlaying,
    /// Most recent feed failure, cleared by the next successful load.
    pub feed_error: Option<String>,
}

pub struct StationDirectory {
    stations: Vec<Station>,
    now_playing: NowPlaying,
    engine: Box<dyn PlaybackEngine>,
    observers: Arc<Mutex<ObserverSet>>,
    feed_error: Option<String>,
    rev: u64,
}

impl StationDirectory {
    pub fn new(engine: Box<dyn PlaybackEngine>) -> Self {
        Self {
            stations: Vec::new(),
            now_playing: NowPlaying::default(),
            engine,
            observers: Arc::new(Mutex::new(ObserverSet::default())),
            feed_error: None,
            rev: 0,
        }
    }

    /// Start with the mute flag already set (no notification is sent).
    pub fn starting_muted(mut self, muted: bool) -> Self {
        if muted {
            if let Err(e) = self.engine.set_muted(true) {
                warn!("Failed to apply initial mute: {}", e);
            }
        }
        self.now_playing.muted = muted;
        self
    }

    pub fn subscribe(&self, sink: impl PresentationSink + 'static) -> Subscription {
        let id = lock(&self.observers).insert(Box::new(sink));
        debug!("Observer {} subscribed", id);
        Subscription::new(id, &self.observers)
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.observers).len()
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn now_playing(&self) -> &NowPlaying {
        &self.now_playing
    }

    pub fn rev(&self) -> u64 {
        self.rev
    }

    pub fn snapshot(&self) -> DirectorySnapshot {
        DirectorySnapshot {
            rev: self.rev,
            stations: self.stations.clone(),
            now_playing: self.now_playing.clone(),
            feed_error: self.feed_error.clone(),
        }
    }

    /// Subscribe a [`SnapshotSink`] seeded with the current state, so the
    /// published snapshot always equals [`snapshot`](Self::snapshot).
    pub fn watch_snapshots(&self) -> (Subscription, watch::Receiver<DirectorySnapshot>) {
        let (sink, rx) = SnapshotSink::channel(self.snapshot());
        (self.subscribe(sink), rx)
    }

    // ── mutations ─────────────────────────────────────────────────────────────

    /// Swap in a freshly fetched feed.  The list is replaced wholesale; the
    /// now-playing station is left alone even if the new feed lacks it.
    pub fn replace_stations(&mut self, feed: Feed) {
        self.stations = feed.stations;
        self.feed_error = None;
        self.rev += 1;
        info!("Directory now holds {} stations", self.stations.len());
        let stations = &self.stations;
        self.notify(|sink| sink.on_stations_changed(stations));
    }

    pub fn play(&mut self, station: Station) {
        info!("Playing station: {} ({})", station.title, station.stream_url);
        match self.engine.start_stream(&station.stream_url) {
            Ok(()) => {
                self.now_playing.station = Some(station);
                self.rev += 1;
                self.notify_now_playing();
            }
            Err(e) => {
                warn!("Failed to start '{}': {}", station.title, e);
                self.now_playing.station = None;
                self.rev += 1;
                let reason = e.to_string();
                self.notify(|sink| sink.on_playback_failed(&station, &reason));
                self.notify_now_playing();
            }
        }
    }

    pub fn stop(&mut self) {
        info!("Stopping playback");
        if let Err(e) = self.engine.stop() {
            warn!("Playback engine failed to stop: {}", e);
        }
        self.now_playing.station = None;
        self.rev += 1;
        self.notify_now_playing();
    }

    pub fn set_muted(&mut self, muted: bool) {
        info!("Setting muted={}", muted);
        if let Err(e) = self.engine.set_muted(muted) {
            warn!("Playback engine failed to set mute: {}", e);
        }
        self.now_playing.muted = muted;
        self.rev += 1;
        self.notify_now_playing();
    }

    /// A stream that was accepted earlier has failed.  Only a failure of the
    /// current station changes state; failures of superseded streams are
    /// dropped.
    pub fn playback_failed(&mut self, stream_url: &Url, reason: &str) {
        let station = match &self.now_playing.station {
            Some(current) if current.stream_url == *stream_url => current.clone(),
            _ => {
                debug!("Ignoring failure of superseded stream {}: {}", stream_url, reason);
                return;
            }
        };

        warn!("Playback of '{}' failed: {}", station.title, reason);
        self.now_playing.station = None;
        self.rev += 1;
        self.notify(|sink| sink.on_playback_failed(&station, reason));
        self.notify_now_playing();
    }

    /// A fetch failed.  The station list is kept as it is.
    pub fn feed_failed(&mut self, failure: &FeedFailure) {
        warn!(
            "{} ({}): {}",
            failure.kind.label(),
            failure.url,
            failure.message
        );
        self.feed_error = Some(failure.summary());
        self.rev += 1;
        self.notify(|sink| sink.on_feed_failed(failure));
    }

    // ── fan-out ───────────────────────────────────────────────────────────────

    fn notify_now_playing(&self) {
        let station = self.now_playing.station.as_ref();
        let muted = self.now_playing.muted;
        self.notify(|sink| sink.on_now_playing_changed(station, muted));
    }

    fn notify(&self, mut f: impl FnMut(&mut dyn PresentationSink)) {
        lock(&self.observers).for_each(|sink| f(sink));
    }
}

// ── snapshot publisher ────────────────────────────────────────────────────────

/// Observer that mirrors the directory into a `watch` channel, for readers
/// that live outside the service task (the HTTP API).
///
/// Every directory mutation bumps `rev` once and sends exactly one of the
/// counted callbacks below, so the mirrored `rev` tracks the directory's.
pub struct SnapshotSink {
    tx: watch::Sender<DirectorySnapshot>,
}

impl SnapshotSink {
    pub fn channel(initial: DirectorySnapshot) -> (Self, watch::Receiver<DirectorySnapshot>) {
        let (tx, rx) = watch::channel(initial);
        (Self { tx }, rx)
    }
}

impl PresentationSink for SnapshotSink {
    fn on_stations_changed(&mut self, stations: &[Station]) {
        self.tx.send_modify(|snap| {
            snap.rev += 1;
            snap.stations = stations.to_vec();
            snap.feed_error = None;
        });
    }

    fn on_now_playing_changed(&mut self, station: Option<&Station>, muted: bool) {
        self.tx.send_modify(|snap| {
            snap.rev += 1;
            snap.now_playing = NowPlaying {
                station: station.cloned(),
                muted,
            };
        });
    }

    fn on_playback_failed(&mut self, _station: &Station, _reason: &str) {}

    fn on_feed_failed(&mut self, failure: &FeedFailure) {
        self.tx.send_modify(|snap| {
            snap.rev += 1;
            snap.feed_error = Some(failure.summary());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FetchError, FetchErrorKind};
    use crate::playback::PlaybackError;

    // ── fixtures ──────────────────────────────────────────────────────────────

    #[derive(Debug, Clone, PartialEq)]
    enum EngineCall {
        Start(String),
        Stop,
        Mute(bool),
    }

    #[derive(Clone, Default)]
    struct RecordingEngine {
        calls: Arc<Mutex<Vec<EngineCall>>>,
        fail_starts: bool,
    }

    impl PlaybackEngine for RecordingEngine {
        fn start_stream(&mut self, url: &Url) -> Result<(), PlaybackError> {
            lock(&self.calls).push(EngineCall::Start(url.to_string()));
            if self.fail_starts {
                return Err(PlaybackError::Stream("404".to_string()));
            }
            Ok(())
        }

        fn stop(&mut self) -> Result<(), PlaybackError> {
            lock(&self.calls).push(EngineCall::Stop);
            Ok(())
        }

        fn set_muted(&mut self, muted: bool) -> Result<(), PlaybackError> {
            lock(&self.calls).push(EngineCall::Mute(muted));
            Ok(())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Stations(Vec<String>),
        NowPlaying(Option<String>, bool),
        Failed(String, String),
        Feed(FetchErrorKind),
    }

    /// Records into a log shared by every recorder, tagged with its name.
    #[derive(Clone)]
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<(&'static str, Seen)>>>,
    }

    impl PresentationSink for Recorder {
        fn on_stations_changed(&mut self, stations: &[Station]) {
            let titles = stations.iter().map(|s| s.title.clone()).collect();
            lock(&self.log).push((self.name, Seen::Stations(titles)));
        }

        fn on_now_playing_changed(&mut self, station: Option<&Station>, muted: bool) {
            let title = station.map(|s| s.title.clone());
            lock(&self.log).push((self.name, Seen::NowPlaying(title, muted)));
        }

        fn on_playback_failed(&mut self, station: &Station, reason: &str) {
            lock(&self.log).push((self.name, Seen::Failed(station.title.clone(), reason.into())));
        }

        fn on_feed_failed(&mut self, failure: &FeedFailure) {
            lock(&self.log).push((self.name, Seen::Feed(failure.kind)));
        }
    }

    fn station(title: &str) -> Station {
        let slug = title.to_lowercase().replace(' ', "-");
        Station {
            title: title.to_string(),
            website: Url::parse(&format!("https://{slug}.fm")).unwrap(),
            stream_url: Url::parse(&format!("https://{slug}.fm/stream")).unwrap(),
            logo_url: Url::parse(&format!("https://{slug}.fm/logo.png")).unwrap(),
            colour: "#336699".to_string(),
        }
    }

    fn directory() -> (StationDirectory, Arc<Mutex<Vec<EngineCall>>>) {
        let engine = RecordingEngine::default();
        let calls = engine.calls.clone();
        (StationDirectory::new(Box::new(engine)), calls)
    }

    fn recorder(
        dir: &StationDirectory,
        name: &'static str,
        log: &Arc<Mutex<Vec<(&'static str, Seen)>>>,
    ) -> Subscription {
        dir.subscribe(Recorder {
            name,
            log: log.clone(),
        })
    }

    // ── station list ──────────────────────────────────────────────────────────

    #[test]
    fn test_replace_keeps_feed_order() {
        let (mut dir, _) = directory();
        let feed = Feed::new(vec![station("C"), station("A"), station("B")]);
        dir.replace_stations(feed.clone());
        assert_eq!(dir.stations(), feed.stations.as_slice());
    }

    #[test]
    fn test_replace_is_wholesale() {
        let (mut dir, _) = directory();
        dir.replace_stations(Feed::new(vec![station("A"), station("B")]));
        dir.replace_stations(Feed::new(vec![station("C")]));
        assert_eq!(dir.stations(), &[station("C")]);
    }

    #[test]
    fn test_two_observers_notified_once_in_order() {
        let (mut dir, _) = directory();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _first = recorder(&dir, "list", &log);
        let _second = recorder(&dir, "menu", &log);

        dir.replace_stations(Feed::new(vec![station("A"), station("B")]));

        let seen = lock(&log).clone();
        let expected = Seen::Stations(vec!["A".into(), "B".into()]);
        assert_eq!(seen, vec![("list", expected.clone()), ("menu", expected)]);
    }

    #[test]
    fn test_replace_leaves_now_playing() {
        let (mut dir, _) = directory();
        dir.play(station("A"));
        dir.replace_stations(Feed::new(vec![station("B")]));
        assert_eq!(dir.now_playing().title(), Some("A"));
    }

    // ── playback ──────────────────────────────────────────────────────────────

    #[test]
    fn test_play_starts_stream_and_notifies() {
        let (mut dir, calls) = directory();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _sub = recorder(&dir, "list", &log);

        dir.play(station("Test FM"));

        assert_eq!(
            *lock(&calls),
            vec![EngineCall::Start("https://test-fm.fm/stream".into())]
        );
        assert_eq!(dir.now_playing().title(), Some("Test FM"));
        assert_eq!(
            *lock(&log),
            vec![("list", Seen::NowPlaying(Some("Test FM".into()), false))]
        );
    }

    #[test]
    fn test_play_then_play_supersedes() {
        let (mut dir, _) = directory();
        dir.set_muted(true);
        dir.play(station("A"));
        dir.play(station("B"));
        assert_eq!(dir.now_playing().station, Some(station("B")));
        assert!(dir.now_playing().muted);
    }

    #[test]
    fn test_play_then_stop_clears_station_only() {
        let (mut dir, calls) = directory();
        dir.play(station("A"));
        dir.stop();
        assert_eq!(dir.now_playing().station, None);
        assert!(!dir.now_playing().muted);
        assert_eq!(lock(&calls).last(), Some(&EngineCall::Stop));
    }

    #[test]
    fn test_mute_survives_play_and_stop() {
        let (mut dir, _) = directory();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _sub = recorder(&dir, "list", &log);

        dir.set_muted(true);
        dir.play(station("A"));
        dir.stop();

        let mutes: Vec<bool> = lock(&log)
            .iter()
            .filter_map(|(_, seen)| match seen {
                Seen::NowPlaying(_, muted) => Some(*muted),
                _ => None,
            })
            .collect();
        assert_eq!(mutes, vec![true, true, true]);
        assert!(dir.now_playing().muted);
    }

    #[test]
    fn test_set_muted_keeps_station() {
        let (mut dir, calls) = directory();
        dir.play(station("A"));
        dir.set_muted(true);
        assert_eq!(dir.now_playing().title(), Some("A"));
        assert_eq!(lock(&calls).last(), Some(&EngineCall::Mute(true)));
    }

    #[test]
    fn test_rejected_start_reverts_to_absent() {
        let engine = RecordingEngine {
            fail_starts: true,
            ..Default::default()
        };
        let mut dir = StationDirectory::new(Box::new(engine));
        let log = Arc::new(Mutex::new(Vec::new()));
        let _sub = recorder(&dir, "list", &log);

        dir.play(station("A"));

        assert_eq!(dir.now_playing().station, None);
        let seen = lock(&log).clone();
        assert_eq!(seen.len(), 2);
        assert!(matches!(&seen[0].1, Seen::Failed(title, _) if title == "A"));
        assert_eq!(seen[1].1, Seen::NowPlaying(None, false));
    }

    #[test]
    fn test_late_failure_of_current_stream() {
        let (mut dir, _) = directory();
        let log = Arc::new(Mutex::new(Vec::new()));
        dir.play(station("A"));
        let _sub = recorder(&dir, "list", &log);

        dir.playback_failed(&station("A").stream_url, "connection reset");

        assert_eq!(dir.now_playing().station, None);
        assert_eq!(
            *lock(&log),
            vec![
                ("list", Seen::Failed("A".into(), "connection reset".into())),
                ("list", Seen::NowPlaying(None, false)),
            ]
        );
    }

    #[test]
    fn test_late_failure_of_superseded_stream_is_ignored() {
        let (mut dir, _) = directory();
        dir.play(station("A"));
        dir.play(station("B"));
        let rev = dir.rev();

        dir.playback_failed(&station("A").stream_url, "eof");

        assert_eq!(dir.now_playing().title(), Some("B"));
        assert_eq!(dir.rev(), rev);
    }

    // ── feed failures / subscriptions ─────────────────────────────────────────

    #[test]
    fn test_feed_failure_keeps_stations() {
        let (mut dir, _) = directory();
        let log = Arc::new(Mutex::new(Vec::new()));
        dir.replace_stations(Feed::new(vec![station("A")]));
        let _sub = recorder(&dir, "list", &log);

        let failure = FeedFailure {
            url: "https://x.test/feed".into(),
            kind: FetchErrorKind::Decode,
            message: "missing field `title`".into(),
        };
        dir.feed_failed(&failure);

        assert_eq!(dir.stations(), &[station("A")]);
        assert_eq!(*lock(&log), vec![("list", Seen::Feed(FetchErrorKind::Decode))]);
    }

    #[test]
    fn test_released_observer_stops_receiving() {
        let (mut dir, _) = directory();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recorder(&dir, "list", &log);
        let _second = recorder(&dir, "menu", &log);

        first.release();
        dir.stop();

        assert_eq!(dir.observer_count(), 1);
        assert_eq!(*lock(&log), vec![("menu", Seen::NowPlaying(None, false))]);
    }

    #[test]
    fn test_starting_muted_tells_engine() {
        let engine = RecordingEngine::default();
        let calls = engine.calls.clone();
        let dir = StationDirectory::new(Box::new(engine)).starting_muted(true);
        assert!(dir.now_playing().muted);
        assert_eq!(*lock(&calls), vec![EngineCall::Mute(true)]);
    }

    #[test]
    fn test_snapshot_sink_mirrors_state() {
        let (mut dir, _) = directory();
        let (_sub, rx) = dir.watch_snapshots();

        dir.replace_stations(Feed::new(vec![station("A"), station("B")]));
        dir.play(station("B"));
        dir.set_muted(true);

        let snap = rx.borrow().clone();
        assert_eq!(snap.stations.len(), 2);
        assert_eq!(snap.now_playing.title(), Some("B"));
        assert!(snap.now_playing.muted);
        assert_eq!(snap.rev, 3);
        assert_eq!(snap.feed_error, None);
    }

    #[test]
    fn test_published_snapshot_matches_directory() {
        let engine = RecordingEngine {
            fail_starts: true,
            ..Default::default()
        };
        let mut dir = StationDirectory::new(Box::new(engine)).starting_muted(true);
        let (_sub, rx) = dir.watch_snapshots();
        assert_eq!(*rx.borrow(), dir.snapshot());

        dir.replace_stations(Feed::new(vec![station("A")]));
        dir.play(station("A"));
        assert_eq!(*rx.borrow(), dir.snapshot());

        let failure = FeedFailure::new("https://x.test/s.json", &FetchError::EmptyBody);
        dir.feed_failed(&failure);
        let snap = dir.snapshot();
        assert_eq!(snap.feed_error.as_deref(), Some(failure.summary().as_str()));
        assert_eq!(snap.stations.len(), 1);
        assert_eq!(*rx.borrow(), snap);

        dir.replace_stations(Feed::new(vec![station("B")]));
        assert_eq!(dir.snapshot().feed_error, None);
        assert_eq!(*rx.borrow(), dir.snapshot());
    }
}
