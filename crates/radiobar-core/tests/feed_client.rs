mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::feed_server::{
    feed_with, refused_url, FeedServer, BAD_URL_FEED, MISSING_LOGO_FEED, TEST_FM_FEED,
};
use radiobar_core::{FeedClient, FetchError, FetchErrorKind};

fn client() -> FeedClient {
    FeedClient::new(Duration::from_secs(5)).expect("client should build")
}

#[tokio::test]
async fn fetch_returns_every_station_in_feed_order() {
    for n in [0, 1, 7] {
        let server = FeedServer::ok(feed_with(n)).await;
        let feed = client().fetch_feed(&server.url()).await.unwrap();

        let titles: Vec<String> = feed.stations.iter().map(|s| s.title.clone()).collect();
        let expected: Vec<String> = (0..n).map(|i| format!("Station {i}")).collect();
        assert_eq!(titles, expected);
    }
}

#[tokio::test]
async fn fetch_decodes_test_fm_exactly() {
    let server = FeedServer::ok(TEST_FM_FEED).await;
    let feed = client().fetch_feed(&server.url()).await.unwrap();

    assert_eq!(feed.len(), 1);
    let station = &feed.stations[0];
    assert_eq!(station.title, "Test FM");
    assert_eq!(station.website.as_str(), "https://t.fm/");
    assert_eq!(station.stream_url.as_str(), "https://t.fm/stream");
    assert_eq!(station.logo_url.as_str(), "https://t.fm/logo.png");
    assert_eq!(station.colour, "#336699");
}

#[tokio::test]
async fn missing_field_is_a_decode_error() {
    let server = FeedServer::ok(MISSING_LOGO_FEED).await;
    let err = client().fetch_feed(&server.url()).await.unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::Decode);
}

#[tokio::test]
async fn malformed_url_is_a_decode_error() {
    let server = FeedServer::ok(BAD_URL_FEED).await;
    let err = client().fetch_feed(&server.url()).await.unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::Decode);
}

#[tokio::test]
async fn garbage_body_is_a_decode_error() {
    let server = FeedServer::ok("<html>maintenance</html>").await;
    let err = client().fetch_feed(&server.url()).await.unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)));
}

#[tokio::test]
async fn non_200_status_is_a_transport_error() {
    for status in [StatusCode::NOT_FOUND, StatusCode::INTERNAL_SERVER_ERROR, StatusCode::CREATED] {
        let server = FeedServer::start(status, TEST_FM_FEED).await;
        let err = client().fetch_feed(&server.url()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(s) if s == status));
        assert_eq!(err.kind(), FetchErrorKind::Transport);
    }
}

#[tokio::test]
async fn empty_body_is_a_transport_error() {
    let server = FeedServer::ok("").await;
    let err = client().fetch_feed(&server.url()).await.unwrap_err();
    assert!(matches!(err, FetchError::EmptyBody));
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    let err = client().fetch_feed(&refused_url().await).await.unwrap_err();
    assert!(matches!(err, FetchError::Request(_)));
    assert_eq!(err.kind(), FetchErrorKind::Transport);
}

#[tokio::test]
async fn slow_feed_times_out() {
    let server = FeedServer::ok(TEST_FM_FEED).await;
    let client = FeedClient::new(Duration::from_millis(200)).unwrap();
    let err = client.fetch_feed(&server.slow_url()).await.unwrap_err();
    match err {
        FetchError::Request(e) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {other:?}"),
    }
}
