//! Typed events carried by the codec
//!
//! Inbound (viewer → server): `start-stream`, `stop-stream`, `camera-target`,
//! `debug`. Outbound (server → viewer): `config`, `app`, `camera-target`,
//! `frame`, `device-state`, `stream-state`.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::camera::{Orientation, TargetUpdate};
use crate::config::{AppConfig, DeviceConfig};
use crate::error::ProtocolError;
use crate::media::{Frame, Tier};

use super::codec::RawMessage;

pub const START_STREAM: &str = "start-stream";
pub const STOP_STREAM: &str = "stop-stream";
pub const CAMERA_TARGET: &str = "camera-target";
pub const DEBUG: &str = "debug";
pub const CONFIG: &str = "config";
pub const APP: &str = "app";
pub const FRAME: &str = "frame";
pub const DEVICE_STATE: &str = "device-state";
pub const STREAM_STATE: &str = "stream-state";

/// Commands sent by viewers
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Subscribe to one tier of a device
    StartStream { device: String, tier: Tier },
    /// Unsubscribe from one tier, or from every tier when `tier` is `None`
    StopStream { device: String, tier: Option<Tier> },
    /// Steer a shared camera
    CameraTarget {
        camera: String,
        orientation: Orientation,
        jump: bool,
    },
    /// Toggle the shared debug flag
    Debug { enabled: bool },
}

/// Events sent to viewers
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Config(ConfigPayload),
    App(AppState),
    CameraTarget(TargetUpdate),
    Frame {
        device: String,
        tier: Tier,
        frame: Frame,
    },
    DeviceState(DeviceState),
    StreamState {
        device: String,
        tier: Tier,
        live: bool,
    },
}

/// Device list sent on connect; cameras travel inside their device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigPayload {
    pub devices: Vec<DeviceConfig>,
}

impl ConfigPayload {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            devices: config.devices.clone(),
        }
    }

    pub fn device(&self, key: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.key == key)
    }
}

/// Process-wide viewer settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    pub debug: bool,
}

/// Health of a capture device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub device: String,
    /// Battery level in percent, unknown for mains powered sources
    pub battery: Option<f64>,
}

impl DeviceState {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            battery: None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StreamRequest {
    device: String,
    #[serde(alias = "quality")]
    tier: Tier,
}

#[derive(Serialize, Deserialize)]
struct StopRequest {
    device: String,
    #[serde(default, alias = "quality", skip_serializing_if = "Option::is_none")]
    tier: Option<Tier>,
}

#[derive(Serialize, Deserialize)]
struct CameraRequest {
    camera: String,
    orientation: Orientation,
    #[serde(default)]
    jump: bool,
}

#[derive(Serialize, Deserialize)]
struct DebugRequest {
    enabled: bool,
}

#[derive(Serialize, Deserialize)]
struct FrameHeader {
    device: String,
    tier: Tier,
    number: u64,
    time: u64,
}

#[derive(Serialize, Deserialize)]
struct StreamStateHeader {
    device: String,
    tier: Tier,
    live: bool,
}

fn header<T: Serialize>(event: &'static str, value: &T) -> Result<RawMessage, ProtocolError> {
    let json = serde_json::to_vec(value).map_err(|source| ProtocolError::InvalidPayload {
        event: event.to_string(),
        source,
    })?;
    Ok(RawMessage::new(event, json))
}

fn parse<T: DeserializeOwned>(raw: &RawMessage) -> Result<T, ProtocolError> {
    serde_json::from_slice(&raw.header).map_err(|source| ProtocolError::InvalidPayload {
        event: raw.event.clone(),
        source,
    })
}

impl ClientMessage {
    pub fn event(&self) -> &'static str {
        match self {
            ClientMessage::StartStream { .. } => START_STREAM,
            ClientMessage::StopStream { .. } => STOP_STREAM,
            ClientMessage::CameraTarget { .. } => CAMERA_TARGET,
            ClientMessage::Debug { .. } => DEBUG,
        }
    }

    pub fn to_raw(&self) -> Result<RawMessage, ProtocolError> {
        match self {
            ClientMessage::StartStream { device, tier } => header(
                START_STREAM,
                &StreamRequest {
                    device: device.clone(),
                    tier: *tier,
                },
            ),
            ClientMessage::StopStream { device, tier } => header(
                STOP_STREAM,
                &StopRequest {
                    device: device.clone(),
                    tier: *tier,
                },
            ),
            ClientMessage::CameraTarget {
                camera,
                orientation,
                jump,
            } => header(
                CAMERA_TARGET,
                &CameraRequest {
                    camera: camera.clone(),
                    orientation: *orientation,
                    jump: *jump,
                },
            ),
            ClientMessage::Debug { enabled } => header(DEBUG, &DebugRequest { enabled: *enabled }),
        }
    }

    pub fn from_raw(raw: &RawMessage) -> Result<Self, ProtocolError> {
        match raw.event.as_str() {
            START_STREAM => {
                let req: StreamRequest = parse(raw)?;
                Ok(ClientMessage::StartStream {
                    device: req.device,
                    tier: req.tier,
                })
            }
            STOP_STREAM => {
                let req: StopRequest = parse(raw)?;
                Ok(ClientMessage::StopStream {
                    device: req.device,
                    tier: req.tier,
                })
            }
            CAMERA_TARGET => {
                let req: CameraRequest = parse(raw)?;
                Ok(ClientMessage::CameraTarget {
                    camera: req.camera,
                    orientation: req.orientation,
                    jump: req.jump,
                })
            }
            DEBUG => {
                let req: DebugRequest = parse(raw)?;
                Ok(ClientMessage::Debug {
                    enabled: req.enabled,
                })
            }
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}

impl ServerMessage {
    pub fn event(&self) -> &'static str {
        match self {
            ServerMessage::Config(_) => CONFIG,
            ServerMessage::App(_) => APP,
            ServerMessage::CameraTarget(_) => CAMERA_TARGET,
            ServerMessage::Frame { .. } => FRAME,
            ServerMessage::DeviceState(_) => DEVICE_STATE,
            ServerMessage::StreamState { .. } => STREAM_STATE,
        }
    }

    pub fn to_raw(&self) -> Result<RawMessage, ProtocolError> {
        match self {
            ServerMessage::Config(payload) => header(CONFIG, payload),
            ServerMessage::App(state) => header(APP, state),
            ServerMessage::CameraTarget(update) => header(CAMERA_TARGET, update),
            ServerMessage::Frame {
                device,
                tier,
                frame,
            } => Ok(header(
                FRAME,
                &FrameHeader {
                    device: device.clone(),
                    tier: *tier,
                    number: frame.sequence,
                    time: frame.capture_time,
                },
            )?
            .with_attachment(frame.payload.clone())),
            ServerMessage::DeviceState(state) => header(DEVICE_STATE, state),
            ServerMessage::StreamState { device, tier, live } => header(
                STREAM_STATE,
                &StreamStateHeader {
                    device: device.clone(),
                    tier: *tier,
                    live: *live,
                },
            ),
        }
    }

    pub fn from_raw(raw: &RawMessage) -> Result<Self, ProtocolError> {
        match raw.event.as_str() {
            CONFIG => Ok(ServerMessage::Config(parse(raw)?)),
            APP => Ok(ServerMessage::App(parse(raw)?)),
            CAMERA_TARGET => Ok(ServerMessage::CameraTarget(parse(raw)?)),
            FRAME => {
                let header: FrameHeader = parse(raw)?;
                Ok(ServerMessage::Frame {
                    device: header.device,
                    tier: header.tier,
                    frame: Frame::new(header.number, header.time, raw.attachment.clone()),
                })
            }
            DEVICE_STATE => Ok(ServerMessage::DeviceState(parse(raw)?)),
            STREAM_STATE => {
                let header: StreamStateHeader = parse(raw)?;
                Ok(ServerMessage::StreamState {
                    device: header.device,
                    tier: header.tier,
                    live: header.live,
                })
            }
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }

    /// Frame message for a delivered frame
    pub fn frame(device: &str, tier: Tier, frame: Frame) -> Self {
        ServerMessage::Frame {
            device: device.to_string(),
            tier,
            frame,
        }
    }

    /// Binary payload, if any
    pub fn attachment(&self) -> Option<&Bytes> {
        match self {
            ServerMessage::Frame { frame, .. } => Some(&frame.payload),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Fov;

    fn raw(event: &str, json: &str) -> RawMessage {
        RawMessage::new(event.to_string(), json.as_bytes().to_vec())
    }

    #[test]
    fn test_parse_start_stream() {
        let message =
            ClientMessage::from_raw(&raw("start-stream", r#"{"device":"theta","tier":"low"}"#)).unwrap();
        assert_eq!(
            message,
            ClientMessage::StartStream {
                device: "theta".into(),
                tier: Tier::Low
            }
        );

        // Older viewers call it quality
        let message =
            ClientMessage::from_raw(&raw("start-stream", r#"{"device":"theta","quality":"original"}"#))
                .unwrap();
        assert_eq!(message.event(), START_STREAM);
    }

    #[test]
    fn test_stop_stream_without_tier() {
        let message = ClientMessage::from_raw(&raw("stop-stream", r#"{"device":"theta"}"#)).unwrap();
        assert_eq!(
            message,
            ClientMessage::StopStream {
                device: "theta".into(),
                tier: None
            }
        );
    }

    #[test]
    fn test_parse_camera_target() {
        let message = ClientMessage::from_raw(&raw(
            "camera-target",
            r#"{"camera":"main","orientation":{"pitch":30,"yaw":-170,"fov":"auto"}}"#,
        ))
        .unwrap();

        match message {
            ClientMessage::CameraTarget {
                camera,
                orientation,
                jump,
            } => {
                assert_eq!(camera, "main");
                assert_eq!(orientation.pitch, 30.0);
                assert_eq!(orientation.yaw, -170.0);
                assert_eq!(orientation.fov, Fov::Auto);
                assert!(!jump);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_and_invalid() {
        assert!(matches!(
            ClientMessage::from_raw(&raw("force-program-refresh", "{}")),
            Err(ProtocolError::UnknownEvent(_))
        ));
        assert!(matches!(
            ClientMessage::from_raw(&raw("debug", r#"{"enabled":"yes"}"#)),
            Err(ProtocolError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_frame_carries_payload_as_attachment() {
        let frame = Frame::new(42, 1_700_000_000_000, Bytes::from_static(&[0xFF, 0xD8]));
        let message = ServerMessage::frame("theta", Tier::Original, frame.clone());

        let raw = message.to_raw().unwrap();
        assert_eq!(raw.event, "frame");
        assert_eq!(&raw.attachment[..], &[0xFF, 0xD8]);

        let header: serde_json::Value = serde_json::from_slice(&raw.header).unwrap();
        assert_eq!(header["number"], 42);
        assert_eq!(header["time"], 1_700_000_000_000u64);
        assert_eq!(header["tier"], "original");

        assert_eq!(ServerMessage::from_raw(&raw).unwrap(), message);
    }

    #[test]
    fn test_device_state_null_battery() {
        let raw = ServerMessage::DeviceState(DeviceState::new("theta")).to_raw().unwrap();
        assert_eq!(&raw.header[..], br#"{"device":"theta","battery":null}"#);
    }

    #[test]
    fn test_camera_target_init_flag() {
        let update = TargetUpdate {
            camera: "main".into(),
            to: Orientation::new(0.0, 90.0, Fov::Fixed(75.0)),
            jump: true,
            init: true,
        };
        let raw = ServerMessage::CameraTarget(update.clone()).to_raw().unwrap();
        let header: serde_json::Value = serde_json::from_slice(&raw.header).unwrap();
        assert_eq!(header["init"], true);
        assert_eq!(header["to"]["fov"], 75.0);

        assert_eq!(
            ServerMessage::from_raw(&raw).unwrap(),
            ServerMessage::CameraTarget(update)
        );
    }
}
