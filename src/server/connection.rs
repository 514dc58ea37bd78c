//! Per-connection handling
//!
//! A connection first gets the initial sync, then a single loop multiplexes:
//! - commands read from the socket
//! - frames and liveness changes of its subscriptions
//! - camera target broadcasts
//! - device state broadcasts

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;

use crate::error::{Error, ProtocolError, Result};
use crate::media::Tier;
use crate::protocol::{ClientMessage, MessageCodec, ServerMessage};
use crate::registry::{ConsumerHandle, ConsumerId, Delivery, StreamKey};

use super::config::ServerConfig;
use super::hub::Hub;

/// One viewer connection
pub struct Connection {
    id: ConsumerId,
    socket: Option<TcpStream>,
    peer_addr: SocketAddr,
    config: ServerConfig,
    hub: Arc<Hub>,
    codec: MessageCodec,
    write_buf: BytesMut,
}

impl Connection {
    pub fn new(
        session_id: u64,
        socket: TcpStream,
        peer_addr: SocketAddr,
        config: ServerConfig,
        hub: Arc<Hub>,
    ) -> Self {
        let codec = MessageCodec::new(config.max_message_size);
        Self {
            id: ConsumerId(session_id),
            socket: Some(socket),
            peer_addr,
            config,
            hub,
            codec,
            write_buf: BytesMut::with_capacity(64 * 1024),
        }
    }

    /// Serve the connection until the peer goes away or misbehaves
    ///
    /// Subscriptions are removed whatever the outcome.
    pub async fn run(&mut self) -> Result<()> {
        self.hub.connection_opened();
        tracing::info!(consumer = %self.id, peer = %self.peer_addr, "Viewer connected");

        let result = self.serve().await;

        let removed = self.hub.distributor().unsubscribe_all(self.id);
        self.hub.connection_closed();
        tracing::info!(
            consumer = %self.id,
            peer = %self.peer_addr,
            subscriptions = removed,
            "Viewer disconnected"
        );

        match result {
            Err(Error::ConnectionClosed) => Ok(()),
            other => other,
        }
    }

    async fn serve(&mut self) -> Result<()> {
        let socket = self.socket.take().ok_or(Error::ConnectionClosed)?;
        let (mut reader, mut writer) = socket.into_split();

        let (handle, mut deliveries) = ConsumerHandle::channel(self.id, self.config.outbound_queue);
        // Subscribe before the snapshot so no update falls in between
        let mut targets = self.hub.cameras().subscribe();
        let mut devices = self.hub.subscribe_devices();

        for message in self.hub.initial_sync() {
            self.send(&mut writer, &message).await?;
        }

        let mut read_buf = BytesMut::with_capacity(self.config.read_buffer_size);

        loop {
            tokio::select! {
                read = reader.read_buf(&mut read_buf) => {
                    if read? == 0 {
                        return Err(Error::ConnectionClosed);
                    }
                    while let Some(raw) = self.codec.decode(&mut read_buf)? {
                        match ClientMessage::from_raw(&raw) {
                            Ok(message) => self.handle_message(message, &handle, &mut writer).await?,
                            Err(e @ (ProtocolError::UnknownEvent(_) | ProtocolError::InvalidPayload { .. })) => {
                                tracing::warn!(consumer = %self.id, error = %e, "Ignoring message");
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
                Some(delivery) = deliveries.recv() => self.deliver(&mut writer, delivery).await?,
                update = targets.recv() => match update {
                    Ok(update) => self.send(&mut writer, &ServerMessage::CameraTarget(update)).await?,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(consumer = %self.id, missed, "Camera updates lagged, resending targets");
                        for update in self.hub.cameras().snapshot() {
                            self.send(&mut writer, &ServerMessage::CameraTarget(update)).await?;
                        }
                    }
                    Err(RecvError::Closed) => return Err(Error::ConnectionClosed),
                },
                state = devices.recv() => match state {
                    Ok(state) => self.send(&mut writer, &ServerMessage::DeviceState(state)).await?,
                    Err(RecvError::Lagged(_)) => {
                        for state in self.hub.device_states() {
                            self.send(&mut writer, &ServerMessage::DeviceState(state)).await?;
                        }
                    }
                    Err(RecvError::Closed) => return Err(Error::ConnectionClosed),
                },
            }
        }
    }

    async fn handle_message(
        &mut self,
        message: ClientMessage,
        handle: &ConsumerHandle,
        writer: &mut OwnedWriteHalf,
    ) -> Result<()> {
        tracing::debug!(consumer = %self.id, event = message.event(), "Command received");

        match message {
            ClientMessage::StartStream { device, tier } => {
                let key = StreamKey::new(device, tier);
                if let Err(e) = self.hub.distributor().subscribe(&key, handle) {
                    tracing::warn!(consumer = %self.id, error = %e, "Start stream rejected");
                }
            }
            ClientMessage::StopStream { device, tier } => {
                let tiers = match tier {
                    Some(tier) => vec![tier],
                    None => Tier::ALL.to_vec(),
                };
                for tier in tiers {
                    self.hub
                        .distributor()
                        .unsubscribe(&StreamKey::new(device.as_str(), tier), self.id);
                }
            }
            ClientMessage::CameraTarget {
                camera,
                orientation,
                jump,
            } => {
                // Accepted targets come back through the broadcast
                if let Err(e) = self.hub.cameras().set_target(&camera, orientation, jump) {
                    tracing::debug!(consumer = %self.id, camera = %camera, error = %e, "Camera target rejected");
                }
            }
            ClientMessage::Debug { enabled } => {
                let state = self.hub.set_debug(enabled);
                self.send(writer, &ServerMessage::App(state)).await?;
            }
        }

        Ok(())
    }

    async fn deliver(&mut self, writer: &mut OwnedWriteHalf, delivery: Delivery) -> Result<()> {
        let message = match delivery {
            Delivery::Frame { key, frame } => ServerMessage::frame(&key.device, key.tier, frame),
            Delivery::StreamState { key, live } => ServerMessage::StreamState {
                device: key.device.to_string(),
                tier: key.tier,
                live,
            },
        };

        match self.send(writer, &message).await {
            // An oversized frame is skipped, the next one may fit
            Err(Error::Protocol(ProtocolError::MessageTooLarge { size, limit })) => {
                tracing::warn!(consumer = %self.id, size, limit, "Frame too large, skipped");
                Ok(())
            }
            other => other,
        }
    }

    async fn send(&mut self, writer: &mut OwnedWriteHalf, message: &ServerMessage) -> Result<()> {
        let raw = message.to_raw()?;
        self.write_buf.clear();
        self.codec.encode(&raw, &mut self.write_buf)?;
        writer.write_all(&self.write_buf).await?;
        Ok(())
    }
}
