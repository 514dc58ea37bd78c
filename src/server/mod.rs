//! Feed server
//!
//! Serves viewers over TCP: frames of the streams they subscribed to, the
//! shared camera targets and device states.

pub mod config;
pub mod connection;
pub mod device;
pub mod hub;
pub mod listener;

pub use config::ServerConfig;
pub use device::DeviceRuntime;
pub use hub::Hub;
pub use listener::FeedServer;
