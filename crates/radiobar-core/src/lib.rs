//! Station feed synchronization and now-playing state for radiobar.
//!
//! The crate is split the same way data flows through it:
//!
//! ```text
//!   feed::FeedClient ──► service::RadioService ──► directory::StationDirectory
//!                              ▲                          │ fan-out
//!                              │ Intent                   ▼
//!                        sink::IntentSender ◄──── sink::PresentationSink
//! ```
//!
//! `StationDirectory` is the single source of truth.  It is owned by the
//! `RadioService` task; everything else talks to it through channels.

pub mod colour;
pub mod config;
pub mod directory;
pub mod feed;
pub mod platform;
pub mod playback;
pub mod service;
pub mod sink;
pub mod station;

pub use directory::{DirectorySnapshot, NowPlaying, StationDirectory};
pub use feed::{FeedClient, FetchError, FetchErrorKind};
pub use playback::{PlaybackEngine, PlaybackError};
pub use service::{Intent, RadioService, ServiceEvent};
pub use sink::{FeedFailure, IntentSender, PresentationSink, Subscription};
pub use station::{Feed, Station};
