//! Viewer client
//!
//! Connects to a feed server, sends stream and camera commands and delivers
//! the server's events over a channel.

pub mod viewer;

pub use viewer::FeedClient;
