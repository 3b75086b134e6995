use serde::{Deserialize, Serialize};
use url::Url;

/// A single radio station as published in the feed.
///
/// Stations have no id in the feed format, so identity is structural: two
/// records with the same fields are the same station.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub title: String,
    pub website: Url,
    pub stream_url: Url,
    pub logo_url: Url,
    /// Hex colour code, 6 or 8 digits with an optional leading `#`.
    /// Parsed lazily by the sinks, see [`crate::colour`].
    pub colour: String,
}

/// The ordered station list delivered by the feed source.
///
/// Order is display order: the list view and the status-bar menu both
/// render stations in exactly this sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub stations: Vec<Station>,
}

impl Feed {
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
