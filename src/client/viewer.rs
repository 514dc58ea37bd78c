//! Feed client

use std::collections::HashMap;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::camera::Orientation;
use crate::error::{ProtocolError, Result};
use crate::media::Tier;
use crate::protocol::{ClientMessage, MessageCodec, ServerMessage, DEFAULT_MAX_MESSAGE_SIZE};

/// Connection to a feed server
///
/// # Example
/// ```no_run
/// use spherecast::{FeedClient, Tier};
/// use spherecast::protocol::ServerMessage;
///
/// # async fn example() -> spherecast::error::Result<()> {
/// let (mut client, mut events) = FeedClient::connect("127.0.0.1:8000").await?;
/// client.start_stream("theta_1", Tier::Low).await?;
///
/// while let Some(event) = events.recv().await {
///     if let ServerMessage::Frame { frame, .. } = event {
///         println!("frame {} ({} bytes)", frame.sequence, frame.size());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct FeedClient {
    writer: OwnedWriteHalf,
    codec: MessageCodec,
    write_buf: BytesMut,
    streams: HashMap<String, Tier>,
    reader: JoinHandle<()>,
}

impl FeedClient {
    /// Connect with the default message size limit
    ///
    /// Returns the client and a receiver for server events. The receiver
    /// ends when the connection does.
    pub async fn connect(
        addr: impl ToSocketAddrs,
    ) -> Result<(Self, mpsc::Receiver<ServerMessage>)> {
        Self::connect_with(addr, DEFAULT_MAX_MESSAGE_SIZE).await
    }

    /// Connect with a custom message size limit
    pub async fn connect_with(
        addr: impl ToSocketAddrs,
        max_message_size: usize,
    ) -> Result<(Self, mpsc::Receiver<ServerMessage>)> {
        let socket = TcpStream::connect(addr).await?;
        socket.set_nodelay(true)?;
        tracing::debug!(peer = %socket.peer_addr()?, "Connected to feed server");

        let (reader, writer) = socket.into_split();
        let codec = MessageCodec::new(max_message_size);
        let (tx, rx) = mpsc::channel(256);

        let reader = tokio::spawn(read_loop(reader, codec, tx));

        Ok((
            Self {
                writer,
                codec,
                write_buf: BytesMut::with_capacity(1024),
                streams: HashMap::new(),
                reader,
            },
            rx,
        ))
    }

    /// Subscribe to one tier of a device
    pub async fn start_stream(&mut self, device: &str, tier: Tier) -> Result<()> {
        self.send(&ClientMessage::StartStream {
            device: device.to_string(),
            tier,
        })
        .await?;
        self.streams.insert(device.to_string(), tier);
        Ok(())
    }

    /// Unsubscribe from every tier of a device
    pub async fn stop_stream(&mut self, device: &str) -> Result<()> {
        self.send(&ClientMessage::StopStream {
            device: device.to_string(),
            tier: None,
        })
        .await?;
        self.streams.remove(device);
        Ok(())
    }

    /// Switch a running stream to another tier
    ///
    /// Starts the stream if it wasn't running.
    pub async fn change_tier(&mut self, device: &str, tier: Tier) -> Result<()> {
        match self.streams.get(device).copied() {
            Some(current) if current == tier => return Ok(()),
            Some(current) => {
                self.send(&ClientMessage::StopStream {
                    device: device.to_string(),
                    tier: Some(current),
                })
                .await?;
            }
            None => {}
        }

        tracing::debug!(device = device, tier = %tier, "Changing stream tier");
        self.start_stream(device, tier).await
    }

    /// Tier currently requested for a device
    pub fn active_tier(&self, device: &str) -> Option<Tier> {
        self.streams.get(device).copied()
    }

    /// Steer a shared camera
    pub async fn send_camera_target(
        &mut self,
        camera: &str,
        orientation: Orientation,
        jump: bool,
    ) -> Result<()> {
        self.send(&ClientMessage::CameraTarget {
            camera: camera.to_string(),
            orientation,
            jump,
        })
        .await
    }

    /// Toggle the server-wide debug flag
    pub async fn set_debug(&mut self, enabled: bool) -> Result<()> {
        self.send(&ClientMessage::Debug { enabled }).await
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        let raw = message.to_raw()?;
        self.write_buf.clear();
        self.codec.encode(&raw, &mut self.write_buf)?;
        self.writer.write_all(&self.write_buf).await?;
        Ok(())
    }
}

impl Drop for FeedClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    codec: MessageCodec,
    tx: mpsc::Sender<ServerMessage>,
) {
    let mut buf = BytesMut::with_capacity(64 * 1024);

    loop {
        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                tracing::debug!("Feed server closed the connection");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Read from feed server failed");
                return;
            }
        }

        loop {
            let raw = match codec.decode(&mut buf) {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid message from feed server");
                    return;
                }
            };

            match ServerMessage::from_raw(&raw) {
                Ok(message) => {
                    if tx.send(message).await.is_err() {
                        return;
                    }
                }
                Err(e @ ProtocolError::UnknownEvent(_)) => {
                    tracing::debug!(error = %e, "Ignoring event");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring invalid event");
                }
            }
        }
    }
}
