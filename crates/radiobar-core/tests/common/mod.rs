pub mod feed_server;
pub mod recording;
