//! Playback collaborator contract.
//!
//! The directory never decodes audio.  It hands stream URLs to whatever
//! implements [`PlaybackEngine`] and records the outcome.  Engines that
//! start streams asynchronously report late failures back through
//! [`crate::service::ServiceEvent::PlaybackFailed`].

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("playback engine unavailable: {0}")]
    Unavailable(String),
    #[error("could not open stream: {0}")]
    Stream(String),
}

pub trait PlaybackEngine: Send {
    /// Start streaming `url`, superseding whatever was playing.
    fn start_stream(&mut self, url: &Url) -> Result<(), PlaybackError>;

    fn stop(&mut self) -> Result<(), PlaybackError>;

    fn set_muted(&mut self, muted: bool) -> Result<(), PlaybackError>;
}

impl<E: PlaybackEngine + ?Sized> PlaybackEngine for Box<E> {
    fn start_stream(&mut self, url: &Url) -> Result<(), PlaybackError> {
        (**self).start_stream(url)
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        (**self).stop()
    }

    fn set_muted(&mut self, muted: bool) -> Result<(), PlaybackError> {
        (**self).set_muted(muted)
    }
}
