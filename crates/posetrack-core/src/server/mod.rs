//! Tracking Server
//!
//! Serves the JSON event channel and the MJPEG video feed. Clients send
//! `start_tracking` / `stop_tracking`; while tracking, a single task pulls
//! frames from a [`LandmarkSource`], runs the [`PoseTracker`] and fans
//! `pose_data` out to every connected client.

mod video;

pub use video::parse_request_path;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::bytes::{Bytes, BytesMut};
use tokio_util::codec::Encoder;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{PoseTrackConfig, TrackingConfig};
use crate::protocol::{ClientEvent, EventCodec, EventReader, ProtocolError, ServerEvent};
use crate::source::LandmarkSource;
use crate::tracking::PoseTracker;

/// Status reply to `start_tracking`
pub const STARTED_MESSAGE: &str = "Pose tracking started";
/// Status reply to `stop_tracking`
pub const STOPPED_MESSAGE: &str = "Tracking stopped";

/// Builds a fresh landmark source for each tracking session
pub type SourceFactory = Arc<dyn Fn() -> Box<dyn LandmarkSource> + Send + Sync>;

/// Handle to the running tracking loop
struct TrackingTask {
    session_id: Uuid,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl TrackingTask {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Pose tracking server shared by all client connections
pub struct TrackingServer {
    config: PoseTrackConfig,
    source_factory: SourceFactory,
    events: broadcast::Sender<ServerEvent>,
    frames: watch::Sender<Option<Bytes>>,
    tracking: Mutex<Option<TrackingTask>>,
    shutdown: CancellationToken,
}

impl TrackingServer {
    /// Create a server; `source_factory` is called once per tracking session
    pub fn new(config: PoseTrackConfig, source_factory: SourceFactory) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.server.broadcast_capacity.max(1));
        let (frames, _) = watch::channel(None);
        Arc::new(Self {
            config,
            source_factory,
            events,
            frames,
            tracking: Mutex::new(None),
            shutdown: CancellationToken::new(),
        })
    }

    /// Server configuration
    pub fn config(&self) -> &PoseTrackConfig {
        &self.config
    }

    /// Start the tracking loop. Returns `false` if it was already running.
    pub async fn start_tracking(&self) -> bool {
        let mut guard = self.tracking.lock().await;
        if guard.as_ref().is_some_and(TrackingTask::is_running) {
            tracing::debug!("start_tracking ignored: already tracking");
            return false;
        }

        let session_id = Uuid::new_v4();
        let token = self.shutdown.child_token();
        let source = (self.source_factory)();
        let handle = tokio::spawn(run_tracking(
            source,
            self.config.tracking.clone(),
            self.events.clone(),
            self.frames.clone(),
            token.clone(),
            session_id,
        ));

        tracing::info!("Tracking session {} started", session_id);
        *guard = Some(TrackingTask {
            session_id,
            token,
            handle,
        });
        true
    }

    /// Stop the tracking loop. Returns `false` if nothing was running.
    pub async fn stop_tracking(&self) -> bool {
        let task = self.tracking.lock().await.take();
        match task {
            Some(task) => {
                let was_running = task.is_running();
                task.token.cancel();
                if let Err(e) = task.handle.await {
                    tracing::warn!("Tracking session {} ended abnormally: {}", task.session_id, e);
                }
                tracing::info!("Tracking session {} stopped", task.session_id);
                was_running
            }
            None => false,
        }
    }

    /// Whether a tracking loop is running
    pub async fn is_tracking(&self) -> bool {
        self.tracking
            .lock()
            .await
            .as_ref()
            .is_some_and(TrackingTask::is_running)
    }

    /// Receiver of every event broadcast to clients
    pub fn subscribe_events(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Receiver of the latest encoded video frame
    pub fn subscribe_frames(&self) -> watch::Receiver<Option<Bytes>> {
        self.frames.subscribe()
    }

    /// Signal all listeners, clients and the tracking loop to stop
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Token cancelled on shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Bind both listeners from the configuration and serve until shutdown
    pub async fn run(self: Arc<Self>) -> Result<(), ProtocolError> {
        let server = &self.config.server;
        let events = TcpListener::bind((server.host.as_str(), server.event_port)).await?;
        let video = TcpListener::bind((server.host.as_str(), server.video_port)).await?;
        tracing::info!(
            "Event channel on {}, video feed on http://{}{}",
            events.local_addr()?,
            video.local_addr()?,
            server.video_path
        );

        let video_task = tokio::spawn(Arc::clone(&self).serve_video(video));
        Arc::clone(&self).serve_events(events).await;
        if let Err(e) = video_task.await {
            tracing::warn!("Video listener ended abnormally: {}", e);
        }
        self.stop_tracking().await;
        Ok(())
    }

    /// Accept event channel clients until shutdown
    pub async fn serve_events(self: Arc<Self>, listener: TcpListener) {
        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(Arc::clone(&self).handle_client(stream, peer));
                }
                Err(e) => {
                    tracing::warn!("Failed to accept client: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
        tracing::debug!("Event listener stopped");
    }

    async fn handle_client(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        tracing::info!("Client {} connected", peer);
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("set_nodelay failed for {}: {}", peer, e);
        }
        let (read_half, mut write_half) = stream.into_split();

        // Status replies go only to the requesting client
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerEvent>();
        let mut events = self.events.subscribe();
        let token = self.shutdown.child_token();

        let writer_token = token.clone();
        let writer = tokio::spawn(async move {
            let mut codec = EventCodec::new();
            let mut buf = BytesMut::new();
            loop {
                let event = tokio::select! {
                    _ = writer_token.cancelled() => break,
                    reply = reply_rx.recv() => match reply {
                        Some(event) => event,
                        None => break,
                    },
                    broadcast = events.recv() => match broadcast {
                        Ok(event) => event,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("Client {} lagging, skipped {} events", peer, skipped);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    },
                };

                buf.clear();
                let encoded = event
                    .to_envelope()
                    .and_then(|envelope| codec.encode(&envelope, &mut buf));
                if let Err(e) = encoded {
                    tracing::warn!("Failed to encode {} for {}: {}", event.name(), peer, e);
                    continue;
                }
                if let Err(e) = write_half.write_all(&buf).await {
                    tracing::debug!("Write to {} failed: {}", peer, e);
                    break;
                }
            }
            let _ = write_half.shutdown().await;
        });

        let mut reader = EventReader::new(read_half);
        loop {
            let next = tokio::select! {
                _ = token.cancelled() => break,
                next = reader.next_envelope() => next,
            };

            let envelope = match next {
                None => break,
                Some(Err(ProtocolError::IoError(e))) => {
                    tracing::debug!("Read from {} failed: {}", peer, e);
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!("Bad frame from {}: {}", peer, e);
                    continue;
                }
                Some(Ok(envelope)) => envelope,
            };

            match ClientEvent::try_from(envelope) {
                Ok(ClientEvent::StartTracking) => {
                    self.start_tracking().await;
                    let _ = reply_tx.send(ServerEvent::status(STARTED_MESSAGE));
                }
                Ok(ClientEvent::StopTracking) => {
                    self.stop_tracking().await;
                    let _ = reply_tx.send(ServerEvent::status(STOPPED_MESSAGE));
                }
                Err(e) => tracing::warn!("Ignoring event from {}: {}", peer, e),
            }
        }

        token.cancel();
        if let Err(e) = writer.await {
            tracing::warn!("Writer for {} ended abnormally: {}", peer, e);
        }
        tracing::info!("Client {} disconnected", peer);
    }
}

/// Pull frames at the configured pace until cancelled or the source ends
async fn run_tracking(
    mut source: Box<dyn LandmarkSource>,
    config: TrackingConfig,
    events: broadcast::Sender<ServerEvent>,
    frames: watch::Sender<Option<Bytes>>,
    token: CancellationToken,
    session_id: Uuid,
) {
    let mut tracker = PoseTracker::new(&config);
    let mut ticker = tokio::time::interval(Duration::from_millis(config.frame_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(frame) = source.next_frame() else {
            tracing::info!("Landmark source for session {} ended", session_id);
            break;
        };

        if let Some(image) = frame.image {
            frames.send_replace(Some(image));
        }

        if let Some(arm) = frame.landmarks {
            match tracker.process(&arm) {
                // No connected clients is not an error
                Ok(sample) => {
                    let _ = events.send(ServerEvent::PoseData(sample));
                }
                Err(e) => tracing::warn!("Discarding landmarks: {}", e),
            }
        }
    }

    tracing::debug!(
        "Session {} processed {} frames, {} reps",
        session_id,
        tracker.frames(),
        tracker.reps()
    );
}
