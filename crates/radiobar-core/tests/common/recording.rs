#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use radiobar_core::{PlaybackEngine, PlaybackError};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Start(String),
    Stop,
    Mute(bool),
}

/// Playback engine that only remembers what it was asked to do.
#[derive(Clone, Default)]
pub struct RecordingEngine {
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl RecordingEngine {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl PlaybackEngine for RecordingEngine {
    fn start_stream(&mut self, url: &Url) -> Result<(), PlaybackError> {
        self.calls
            .lock()
            .unwrap()
            .push(EngineCall::Start(url.to_string()));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        self.calls.lock().unwrap().push(EngineCall::Stop);
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) -> Result<(), PlaybackError> {
        self.calls.lock().unwrap().push(EngineCall::Mute(muted));
        Ok(())
    }
}
