//! End-to-end tests: tracking server, TCP transport and session controller

use posetrack_core::config::{PoseTrackConfig, SessionConfig};
use posetrack_core::demo::DemoSource;
use posetrack_core::server::{SourceFactory, TrackingServer, STARTED_MESSAGE, STOPPED_MESSAGE};
use posetrack_core::session::SessionController;
use posetrack_core::source::{LandmarkFrame, LandmarkSource, ReplaySource};
use posetrack_core::tracking::{ArmLandmarks, Point};
use posetrack_core::transport;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::bytes::Bytes;

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn test_config() -> PoseTrackConfig {
    let mut config = PoseTrackConfig::default();
    config.tracking.frame_interval_ms = 1;
    config
}

fn arm(wrist: Point) -> ArmLandmarks {
    ArmLandmarks {
        shoulder: Point::new(0.5, 0.2),
        elbow: Point::new(0.5, 0.5),
        wrist,
    }
}

/// Alternating extended / curled frames: one rep per pair
fn curl_frames(reps: usize) -> Vec<LandmarkFrame> {
    let extended = arm(Point::new(0.5, 0.8));
    let curled = arm(Point::new(0.52, 0.25));
    (0..reps)
        .flat_map(|_| [extended, curled])
        .map(|arm| LandmarkFrame {
            landmarks: Some(arm),
            image: None,
        })
        .collect()
}

fn replay_factory(reps: usize) -> SourceFactory {
    Arc::new(move || Box::new(ReplaySource::new(curl_frames(reps))) as Box<dyn LandmarkSource>)
}

fn demo_factory() -> SourceFactory {
    Arc::new(|| {
        Box::new(DemoSource::with_seed(1, 11).with_image(Bytes::from_static(JPEG)))
            as Box<dyn LandmarkSource>
    })
}

async fn spawn_event_server(server: &Arc<TrackingServer>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(Arc::clone(server).serve_events(listener));
    addr
}

async fn spawn_video_server(server: &Arc<TrackingServer>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(Arc::clone(server).serve_video(listener));
    addr
}

async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", what));
}

#[tokio::test]
async fn test_start_stream_stop_round_trip() {
    init_tracing();
    let server = TrackingServer::new(test_config(), replay_factory(10));
    let addr = spawn_event_server(&server).await;

    let (sender, receiver) = transport::connect(addr).await.unwrap();
    let session = Arc::new(SessionController::new(
        Arc::new(sender),
        SessionConfig::default(),
    ));
    let subscription = session.subscribe(receiver);

    session.start();
    wait_until("20 samples", || {
        let seen = session.series().samples_seen();
        async move { seen >= 20 }
    })
    .await;

    let state = session.state();
    assert!(state.tracking);
    assert_eq!(state.reps, 10);
    assert_eq!(session.series().len(), 20);

    wait_until("start status", || {
        let status = session.state().last_status;
        async move { status.as_deref() == Some(STARTED_MESSAGE) }
    })
    .await;

    session.stop();
    wait_until("stop status", || {
        let status = session.state().last_status;
        async move { status.as_deref() == Some(STOPPED_MESSAGE) }
    })
    .await;

    let state = session.state();
    assert!(!state.tracking);
    assert_eq!(state.reps, 0);
    assert_eq!(state.angle, Some(0.0));
    // Series persist across stop by default
    assert_eq!(session.series().len(), 20);

    subscription.unsubscribe().await;
    server.shutdown();
}

#[tokio::test]
async fn test_duplicate_start_is_ignored() {
    init_tracing();
    let server = TrackingServer::new(test_config(), demo_factory());

    assert!(server.start_tracking().await);
    assert!(!server.start_tracking().await);
    assert!(server.is_tracking().await);

    assert!(server.stop_tracking().await);
    assert!(!server.is_tracking().await);
    assert!(!server.stop_tracking().await);
}

#[tokio::test]
async fn test_rep_count_restarts_each_session() {
    init_tracing();
    let server = TrackingServer::new(test_config(), replay_factory(3));
    let mut events = server.subscribe_events();

    for _ in 0..2 {
        server.start_tracking().await;
        let mut last_reps = 0;
        for _ in 0..6 {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .unwrap()
                .unwrap();
            if let posetrack_core::protocol::ServerEvent::PoseData(sample) = event {
                last_reps = sample.reps;
            }
        }
        assert_eq!(last_reps, 3);
        server.stop_tracking().await;
    }
}

#[tokio::test]
async fn test_video_feed_streams_jpeg_parts() {
    init_tracing();
    let server = TrackingServer::new(test_config(), demo_factory());
    let addr = spawn_video_server(&server).await;

    server.start_tracking().await;
    let mut frames = server.subscribe_frames();
    tokio::time::timeout(Duration::from_secs(5), frames.wait_for(|f| f.is_some()))
        .await
        .unwrap()
        .unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /video_feed HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let mut received = Vec::new();
    let mut chunk = [0u8; 4096];
    tokio::time::timeout(Duration::from_secs(5), async {
        while !received.windows(JPEG.len()).any(|w| w == JPEG) {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "video stream closed early");
            received.extend_from_slice(&chunk[..n]);
        }
    })
    .await
    .expect("no JPEG part received");

    let text = String::from_utf8_lossy(&received);
    assert!(text.starts_with("HTTP/1.1 200 OK"));
    assert!(text.contains("multipart/x-mixed-replace; boundary=frame"));
    assert!(text.contains("--frame\r\nContent-Type: image/jpeg\r\n\r\n"));

    server.shutdown();
}

#[tokio::test]
async fn test_unknown_video_path_is_404() {
    init_tracing();
    let server = TrackingServer::new(test_config(), demo_factory());
    let addr = spawn_video_server(&server).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /snapshot HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 404 Not Found"));

    server.shutdown();
}
