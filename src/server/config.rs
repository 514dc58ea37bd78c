//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::ingest::channel::{DEFAULT_CHUNK_SIZE, DEFAULT_RECONNECT_INTERVAL};
use crate::protocol::DEFAULT_MAX_MESSAGE_SIZE;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Pipe read size; shorter reads end a frame
    pub chunk_size: usize,

    /// Delay before reopening a pipe whose writer went away
    pub reconnect_interval: Duration,

    /// Pipe throughput report interval
    pub stats_interval: Duration,

    /// Per-connection queue of frames and events waiting to be written
    pub outbound_queue: usize,

    /// Largest accepted message in either direction
    pub max_message_size: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Application-level read buffer size
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            max_connections: 0, // Unlimited
            chunk_size: DEFAULT_CHUNK_SIZE,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            stats_interval: Duration::from_secs(10),
            outbound_queue: 64,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            tcp_nodelay: true, // Important for low latency
            read_buffer_size: 16 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the pipe read size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Set the pipe reopen delay
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set the throughput report interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Set the per-connection outbound queue capacity
    pub fn outbound_queue(mut self, capacity: usize) -> Self {
        self.outbound_queue = capacity.max(1);
        self
    }

    /// Set the message size limit
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.chunk_size, 65536);
        assert_eq!(config.reconnect_interval, Duration::from_secs(1));
        assert_eq!(config.stats_interval, Duration::from_secs(10));
        assert_eq!(config.max_message_size, 3_000_000);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8001".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 8001);
    }

    #[test]
    fn test_builder_outbound_queue_minimum() {
        let config = ServerConfig::default().outbound_queue(0);

        assert_eq!(config.outbound_queue, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .chunk_size(4096)
            .reconnect_interval(Duration::from_millis(200))
            .stats_interval(Duration::from_secs(1))
            .max_message_size(1024);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.reconnect_interval, Duration::from_millis(200));
        assert_eq!(config.stats_interval, Duration::from_secs(1));
        assert_eq!(config.max_message_size, 1024);
    }
}
