//! Session Controller
//!
//! Client-side state for one tracking view: the tracking flag, the latest
//! angle/reps/stage display fields and the chart series. Start and stop
//! emit control signals to the server; inbound `pose_data` events are
//! applied one at a time, in arrival order, by a subscription task.

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::protocol::{ClientEvent, EventReader, PoseSample, ProtocolError, ServerEvent, Stage};
use crate::transport::SignalSink;
use crate::window::PoseSeries;

/// Snapshot of the session's display state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    /// Whether tracking is active
    pub tracking: bool,
    /// Whether the live video feed should be shown
    pub live_feed: bool,
    /// Latest elbow angle; `None` until the first sample arrives
    pub angle: Option<f64>,
    /// Latest rep count
    pub reps: u32,
    /// Latest curl phase
    pub stage: Stage,
    /// Identifier of the current tracking session
    pub session_id: Option<Uuid>,
    /// When the current tracking session was started
    pub started_at: Option<DateTime<Utc>>,
    /// Last server status message
    pub last_status: Option<String>,
}

impl SessionState {
    /// Angle formatted the way it is displayed (two decimals)
    pub fn angle_display(&self) -> String {
        self.angle.map(|a| format!("{:.2}", a)).unwrap_or_default()
    }
}

/// Owns session state and the outbound signal sink
pub struct SessionController {
    sink: Arc<dyn SignalSink>,
    config: SessionConfig,
    state: RwLock<SessionState>,
    series: watch::Sender<Arc<PoseSeries>>,
}

impl SessionController {
    /// Create a controller sending control signals to `sink`
    pub fn new(sink: Arc<dyn SignalSink>, config: SessionConfig) -> Self {
        let (series, _) = watch::channel(Arc::new(PoseSeries::new(config.max_points)));
        Self {
            sink,
            config,
            state: RwLock::new(SessionState::default()),
            series,
        }
    }

    /// Begin tracking: signal the server and show the live feed
    pub fn start(&self) {
        self.emit(ClientEvent::StartTracking);

        let mut state = self.write_state();
        state.tracking = true;
        state.live_feed = true;
        state.session_id = Some(Uuid::new_v4());
        state.started_at = Some(Utc::now());
        tracing::info!(
            "Tracking started (session {})",
            state.session_id.unwrap_or_default()
        );
    }

    /// Stop tracking: signal the server and reset the display fields.
    ///
    /// Chart series are kept unless `clear_series_on_stop` is set.
    pub fn stop(&self) {
        self.emit(ClientEvent::StopTracking);

        let mut state = self.write_state();
        if let (Some(id), Some(started)) = (state.session_id, state.started_at) {
            let elapsed = Utc::now().signed_duration_since(started);
            tracing::info!(
                "Tracking stopped (session {}, {} reps, {}s)",
                id,
                state.reps,
                elapsed.num_seconds()
            );
        }
        state.tracking = false;
        state.live_feed = false;
        state.angle = Some(0.0);
        state.reps = 0;
        state.stage = Stage::None;
        state.session_id = None;
        state.started_at = None;

        if self.config.clear_series_on_stop {
            self.series
                .send_modify(|series| *series = Arc::new(series.cleared()));
        }
    }

    /// Current display state
    pub fn state(&self) -> SessionState {
        self.read_state().clone()
    }

    /// Whether tracking is active
    pub fn is_tracking(&self) -> bool {
        self.read_state().tracking
    }

    /// Current chart series snapshot
    pub fn series(&self) -> Arc<PoseSeries> {
        self.series.borrow().clone()
    }

    /// Receiver notified whenever a new series snapshot is published
    pub fn watch_series(&self) -> watch::Receiver<Arc<PoseSeries>> {
        self.series.subscribe()
    }

    /// Video feed URL, only while the live feed is enabled
    pub fn live_feed_url(&self) -> Option<&str> {
        if self.read_state().live_feed {
            Some(self.config.video_url.as_str())
        } else {
            None
        }
    }

    /// Apply one inbound event as a single state transition
    pub fn apply(&self, event: ServerEvent) {
        match event {
            ServerEvent::PoseData(sample) => self.apply_sample(&sample),
            ServerEvent::Status(status) => {
                tracing::info!("Server status: {}", status.message);
                self.write_state().last_status = Some(status.message);
            }
        }
    }

    fn apply_sample(&self, sample: &PoseSample) {
        // Held across the series publish so display fields and series move together
        let mut state = self.write_state();
        state.angle = Some(sample.angle);
        state.reps = sample.reps;
        state.stage = sample.stage;
        self.series
            .send_modify(|series| *series = Arc::new(series.append(sample)));
        tracing::debug!(
            "pose_data: angle={:.2} reps={} stage={}",
            sample.angle,
            sample.reps,
            sample.stage
        );
    }

    /// Start consuming inbound events from `reader`.
    ///
    /// Frames that fail validation are logged and dropped. The returned
    /// handle stops the task when dropped.
    pub fn subscribe<R>(self: &Arc<Self>, mut reader: EventReader<R>) -> Subscription
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let controller = Arc::clone(self);

        let handle = tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = child.cancelled() => break,
                    next = reader.next_envelope() => next,
                };

                match next {
                    None => {
                        tracing::info!("Tracking channel closed");
                        break;
                    }
                    Some(Err(ProtocolError::IoError(e))) => {
                        tracing::warn!("Tracking channel read failed: {}", e);
                        break;
                    }
                    Some(Err(e)) => tracing::warn!("Dropping inbound frame: {}", e),
                    Some(Ok(envelope)) => match ServerEvent::try_from(envelope) {
                        Ok(event) => controller.apply(event),
                        Err(e) => tracing::warn!("Dropping inbound event: {}", e),
                    },
                }
            }
        });

        Subscription {
            token,
            handle: Some(handle),
        }
    }

    fn emit(&self, event: ClientEvent) {
        if let Err(e) = self.sink.send(event) {
            tracing::warn!("Failed to send {}: {}", event.name(), e);
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to an active inbound subscription. Dropping it tears the
/// subscription down.
pub struct Subscription {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Whether the subscription task is still running
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the subscription and wait for its task to finish
    pub async fn unsubscribe(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Subscription task ended abnormally: {}", e);
            }
        }
    }

    /// Wait until the inbound channel ends on its own
    pub async fn closed(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Subscription task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn controller() -> (SessionController, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            SessionController::new(Arc::new(tx), SessionConfig::default()),
            rx,
        )
    }

    fn sample(angle: f64, reps: u32, stage: Stage) -> PoseSample {
        PoseSample {
            angle,
            reps,
            stage,
            shoulder_x: 0.5,
            shoulder_y: 0.3,
            elbow_x: 0.55,
            elbow_y: 0.5,
            wrist_x: 0.6,
            wrist_y: 0.7,
        }
    }

    #[test]
    fn test_start_emits_signal_and_sets_flags() {
        let (controller, mut rx) = controller();
        controller.start();

        assert_eq!(rx.try_recv().unwrap(), ClientEvent::StartTracking);
        let state = controller.state();
        assert!(state.tracking);
        assert!(state.live_feed);
        assert!(state.session_id.is_some());
        assert_eq!(
            controller.live_feed_url(),
            Some("http://localhost:5001/video_feed")
        );
    }

    #[test]
    fn test_stop_resets_display_fields() {
        let (controller, mut rx) = controller();
        controller.start();
        controller.apply(ServerEvent::PoseData(sample(25.0, 7, Stage::Up)));
        controller.stop();

        assert_eq!(rx.try_recv().unwrap(), ClientEvent::StartTracking);
        assert_eq!(rx.try_recv().unwrap(), ClientEvent::StopTracking);
        let state = controller.state();
        assert!(!state.tracking);
        assert!(!state.live_feed);
        assert_eq!(state.angle, Some(0.0));
        assert_eq!(state.reps, 0);
        assert_eq!(state.stage, Stage::None);
        assert_eq!(controller.live_feed_url(), None);
    }

    #[test]
    fn test_start_then_stop_without_samples() {
        let (controller, _rx) = controller();
        controller.start();
        controller.stop();

        let state = controller.state();
        assert!(!state.tracking);
        assert_eq!(state.angle_display(), "0.00");
        assert_eq!(state.reps, 0);
        assert_eq!(state.stage.label(), "");
        assert!(controller.series().is_empty());
    }

    #[test]
    fn test_series_survive_stop_by_default() {
        let (controller, _rx) = controller();
        controller.start();
        controller.apply(ServerEvent::PoseData(sample(90.0, 1, Stage::Down)));
        controller.stop();
        assert_eq!(controller.series().len(), 1);
    }

    #[test]
    fn test_series_cleared_on_stop_when_configured() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = SessionConfig {
            clear_series_on_stop: true,
            ..SessionConfig::default()
        };
        let controller = SessionController::new(Arc::new(tx), config);
        controller.apply(ServerEvent::PoseData(sample(90.0, 1, Stage::Down)));
        controller.stop();
        assert!(controller.series().is_empty());
    }

    #[test]
    fn test_failed_send_still_updates_state() {
        let (tx, rx) = mpsc::unbounded_channel::<ClientEvent>();
        drop(rx);
        let controller = SessionController::new(Arc::new(tx), SessionConfig::default());
        controller.start();
        assert!(controller.is_tracking());
    }

    #[test]
    fn test_status_recorded() {
        let (controller, _rx) = controller();
        controller.apply(ServerEvent::status("Pose tracking started"));
        assert_eq!(
            controller.state().last_status.as_deref(),
            Some("Pose tracking started")
        );
    }

    #[test]
    fn test_angle_display_before_first_sample() {
        let (controller, _rx) = controller();
        assert_eq!(controller.state().angle_display(), "");
        controller.apply(ServerEvent::PoseData(sample(42.123, 0, Stage::None)));
        assert_eq!(controller.state().angle_display(), "42.12");
    }
}
