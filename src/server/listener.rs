//! Feed server listener
//!
//! Starts the ingest tasks of every device, then runs the TCP accept loop
//! and spawns a connection handler per viewer.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::config::AppConfig;
use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::device::DeviceRuntime;
use crate::server::hub::Hub;

/// Live frame and camera server
pub struct FeedServer {
    config: ServerConfig,
    hub: Arc<Hub>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl FeedServer {
    /// Create a server for a validated configuration
    pub fn new(config: ServerConfig, app: AppConfig) -> Result<Self> {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Ok(Self {
            config,
            hub: Arc::new(Hub::new(app)?),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        })
    }

    /// Shared registries
    ///
    /// The server never reads device telemetry itself. Whatever watches the
    /// capture hardware feeds battery levels in through
    /// [`Hub::set_device_state`]; until it does, viewers see `null`.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = %listener.local_addr()?, "Feed server listening");

        // Dropped on return, which stops ingest
        let _devices = self.start_devices();

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    fn start_devices(&self) -> Vec<DeviceRuntime> {
        let app = self.hub.app();
        app.devices
            .iter()
            .map(|device| {
                DeviceRuntime::start(
                    device,
                    &app.pipe_prefix,
                    &self.config,
                    Arc::clone(self.hub.distributor()),
                )
            })
            .collect()
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let config = self.config.clone();
        let hub = Arc::clone(&self.hub);

        tokio::spawn(async move {
            // Held for the lifetime of the connection
            let _permit = permit;
            let mut connection = Connection::new(session_id, socket, peer_addr, config, hub);

            if let Err(e) = connection.run().await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
