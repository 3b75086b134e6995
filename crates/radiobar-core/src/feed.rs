//! Feed client: one GET, one decode, no state between calls.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info};

use crate::station::Feed;

/// Broad class of a fetch failure, as surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The feed could not be retrieved at all.
    Transport,
    /// A body arrived but is not a valid feed.
    Decode,
}

impl FetchErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Transport => "feed unavailable",
            Self::Decode => "feed format error",
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid feed url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
    #[error("response had no body")]
    EmptyBody,
    #[error("malformed feed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Decode(_) => FetchErrorKind::Decode,
            Self::InvalidUrl { .. } | Self::Request(_) | Self::Status(_) | Self::EmptyBody => {
                FetchErrorKind::Transport
            }
        }
    }
}

/// Decode a feed body.  Any invalid record rejects the whole feed.
pub fn decode_feed(body: &[u8]) -> Result<Feed, FetchError> {
    let feed: Feed = serde_json::from_slice(body)?;
    Ok(feed)
}

/// HTTP client for the station feed.
///
/// Holds only a pooled `reqwest::Client`; every call to [`fetch_feed`]
/// is independent and performs no retries.
///
/// [`fetch_feed`]: FeedClient::fetch_feed
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("radiobar/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<Feed, FetchError> {
        let parsed = url::Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        info!("Fetching station feed: {}", parsed);

        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        let feed = decode_feed(&body)?;
        info!("Loaded {} stations from feed", feed.len());
        for station in &feed.stations {
            debug!("  station: {}", station.title);
        }
        Ok(feed)
    }
}
