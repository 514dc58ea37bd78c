//! Drives a real feed server over TCP with the client API

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use spherecast::protocol::{DeviceState, ServerMessage};
use spherecast::{AppConfig, FeedClient, FeedServer, Fov, Orientation, ServerConfig, Tier};

fn app_config(pipe_prefix: &Path) -> AppConfig {
    let json = format!(
        r#"{{
            "pipe-prefix": {prefix:?},
            "devices": [{{
                "key": "theta",
                "type": "theta",
                "width": 3840,
                "height": 1920,
                "cameras": [{{
                    "key": "main",
                    "min-fov": 30,
                    "max-fov": 200,
                    "auto-fov": [{{"pitch": 0, "fov": 40}}, {{"pitch": 60, "fov": 120}}]
                }}]
            }}]
        }}"#,
        prefix = pipe_prefix.display().to_string()
    );
    AppConfig::from_json(&json).unwrap()
}

async fn start_server(
    pipe_prefix: &Path,
) -> (Arc<FeedServer>, std::net::SocketAddr, oneshot::Sender<()>) {
    let config = ServerConfig::default()
        .chunk_size(1024)
        .reconnect_interval(Duration::from_millis(20));
    let server = Arc::new(FeedServer::new(config, app_config(pipe_prefix)).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let running = Arc::clone(&server);
    tokio::spawn(async move {
        running
            .serve(listener, async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    (server, addr, shutdown_tx)
}

async fn next_matching<F>(events: &mut mpsc::Receiver<ServerMessage>, mut pred: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("connection closed");
        if pred(&event) {
            return event;
        }
    }
}

/// Round trip through a fresh connection so earlier commands are processed
///
/// The initial sync carries one `app` event and the debug reply another.
async fn sync(client: &mut FeedClient, events: &mut mpsc::Receiver<ServerMessage>) {
    client.set_debug(false).await.unwrap();
    for _ in 0..2 {
        next_matching(events, |e| matches!(e, ServerMessage::App(_))).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_initial_sync() {
    let dir = tempfile::tempdir().unwrap();
    let (_server, addr, shutdown) = start_server(dir.path()).await;

    let (_client, mut events) = FeedClient::connect(addr).await.unwrap();

    match next_matching(&mut events, |_| true).await {
        ServerMessage::Config(config) => {
            let device = config.device("theta").unwrap();
            assert_eq!(device.cameras[0].key, "main");
            assert_eq!(device.delay, 250);
        }
        other => panic!("expected config first, got {other:?}"),
    }
    assert!(matches!(
        next_matching(&mut events, |_| true).await,
        ServerMessage::App(state) if !state.debug
    ));
    match next_matching(&mut events, |_| true).await {
        ServerMessage::CameraTarget(update) => {
            assert_eq!(update.camera, "main");
            assert!(update.init);
            assert!(update.jump);
        }
        other => panic!("expected camera target, got {other:?}"),
    }
    assert!(matches!(
        next_matching(&mut events, |_| true).await,
        ServerMessage::DeviceState(DeviceState { battery: None, .. })
    ));

    let _ = shutdown.send(());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_frames_reach_subscribers() {
    let dir = tempfile::tempdir().unwrap();
    let (_server, addr, shutdown) = start_server(dir.path()).await;

    let (mut client, mut events) = FeedClient::connect(addr).await.unwrap();
    client.start_stream("theta", Tier::Low).await.unwrap();
    sync(&mut client, &mut events).await;

    let pipe = dir.path().join("pipe-theta-low");
    for _ in 0..400 {
        if pipe.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // One image: a full chunk and a short one
    tokio::task::spawn_blocking(move || {
        let mut writer = std::fs::OpenOptions::new().write(true).open(pipe).unwrap();
        writer.write_all(&[0x5A; 1500]).unwrap();
    })
    .await
    .unwrap();

    assert!(matches!(
        next_matching(&mut events, |e| matches!(e, ServerMessage::StreamState { .. })).await,
        ServerMessage::StreamState { live: true, tier: Tier::Low, .. }
    ));

    match next_matching(&mut events, |e| matches!(e, ServerMessage::Frame { .. })).await {
        ServerMessage::Frame { device, tier, frame } => {
            assert_eq!(device, "theta");
            assert_eq!(tier, Tier::Low);
            assert_eq!(frame.sequence, 1);
            assert_eq!(frame.size(), 1500);
            assert!(frame.capture_time > 0);
        }
        other => panic!("unexpected {other:?}"),
    }

    // Writer went away
    assert!(matches!(
        next_matching(&mut events, |e| matches!(e, ServerMessage::StreamState { .. })).await,
        ServerMessage::StreamState { live: false, .. }
    ));

    let _ = shutdown.send(());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_camera_targets_are_broadcast() {
    let dir = tempfile::tempdir().unwrap();
    let (server, addr, shutdown) = start_server(dir.path()).await;

    let (mut controller, mut controller_events) = FeedClient::connect(addr).await.unwrap();
    let (mut watcher, mut watcher_events) = FeedClient::connect(addr).await.unwrap();
    sync(&mut controller, &mut controller_events).await;
    sync(&mut watcher, &mut watcher_events).await;

    // Out of range pitch is rejected and never broadcast
    controller
        .send_camera_target("main", Orientation::new(100.0, 0.0, Fov::Fixed(60.0)), false)
        .await
        .unwrap();
    controller
        .send_camera_target("main", Orientation::new(30.0, 190.0, Fov::Auto), false)
        .await
        .unwrap();

    for events in [&mut controller_events, &mut watcher_events] {
        match next_matching(events, |e| {
            matches!(e, ServerMessage::CameraTarget(update) if !update.init)
        })
        .await
        {
            ServerMessage::CameraTarget(update) => {
                assert_eq!(update.camera, "main");
                assert_eq!(update.to.pitch, 30.0);
                assert_eq!(update.to.yaw, -170.0);
                assert_eq!(update.to.fov, Fov::Auto);
                assert!(!update.jump);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    let settings = server.hub().cameras().settings("main").unwrap();
    let target = server.hub().cameras().target("main").unwrap();
    assert_eq!(settings.resolve(&target.to).fov, 80.0);

    server.hub().set_device_state(DeviceState {
        device: "theta".into(),
        battery: Some(55.0),
    });
    assert!(matches!(
        next_matching(&mut watcher_events, |e| matches!(e, ServerMessage::DeviceState(_))).await,
        ServerMessage::DeviceState(DeviceState { battery: Some(b), .. }) if b == 55.0
    ));

    let _ = shutdown.send(());
}
