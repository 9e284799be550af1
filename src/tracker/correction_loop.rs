//! Periodic drift correction around a tracker session.
//!
//! The loop task is the only writer of its session. Motion commands,
//! calibration and reference edits arrive through a [`CorrectionLoopHandle`]
//! and are applied in order between correction ticks, so no update is lost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::geometry::ImagePoint;
use crate::sensors::PositionSource;

use super::session::{TrackerCommand, TrackerError, TrackerEvent, TrackerSession, TrackerSnapshot};

/// Default interval between correction ticks.
pub const DEFAULT_CORRECTION_INTERVAL_MS: u64 = 5000;

/// Configuration for the correction loop.
#[derive(Debug, Clone)]
pub struct CorrectionLoopConfig {
    /// Interval between correction ticks (milliseconds).
    pub interval_ms: u64,
    /// Capacity of the request channel.
    pub request_buffer: usize,
}

impl Default for CorrectionLoopConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_CORRECTION_INTERVAL_MS,
            request_buffer: 64,
        }
    }
}

impl CorrectionLoopConfig {
    /// Set the correction interval.
    pub fn with_interval(mut self, ms: u64) -> Self {
        self.interval_ms = ms;
        self
    }

    /// Set the request channel capacity.
    pub fn with_request_buffer(mut self, capacity: usize) -> Self {
        self.request_buffer = capacity;
        self
    }
}

/// Errors from the correction loop handle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoopError {
    #[error("Correction loop is not running")]
    ChannelClosed,
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Control commands for the loop.
#[derive(Debug, Clone)]
enum ControlCommand {
    Stop,
    Pause,
    Resume,
}

/// Requests answered by the loop task.
enum LoopRequest {
    Command {
        command: TrackerCommand,
        reply: oneshot::Sender<Result<TrackerEvent, TrackerError>>,
    },
    CaptureReference {
        image: ImagePoint,
        reply: oneshot::Sender<Result<TrackerEvent, TrackerError>>,
    },
    CorrectNow {
        reply: oneshot::Sender<TrackerEvent>,
    },
    Snapshot {
        reply: oneshot::Sender<TrackerSnapshot>,
    },
}

/// Handle for driving the loop from outside.
#[derive(Clone)]
pub struct CorrectionLoopHandle {
    request_tx: mpsc::Sender<LoopRequest>,
    control_tx: mpsc::Sender<ControlCommand>,
    running: Arc<AtomicBool>,
}

impl CorrectionLoopHandle {
    /// Apply a command to the session and wait for the resulting event.
    pub async fn request(&self, command: TrackerCommand) -> Result<TrackerEvent, LoopError> {
        let (reply, rx) = oneshot::channel();
        self.send(LoopRequest::Command { command, reply }).await?;
        Ok(rx.await.map_err(|_| LoopError::ChannelClosed)??)
    }

    /// Place a reference point tagged with a fix and Wi-Fi scan read from the
    /// loop's position source right now.
    pub async fn capture_reference(&self, image: ImagePoint) -> Result<TrackerEvent, LoopError> {
        let (reply, rx) = oneshot::channel();
        self.send(LoopRequest::CaptureReference { image, reply })
            .await?;
        Ok(rx.await.map_err(|_| LoopError::ChannelClosed)??)
    }

    /// Run a correction immediately instead of waiting for the next tick.
    pub async fn correct_now(&self) -> Result<TrackerEvent, LoopError> {
        let (reply, rx) = oneshot::channel();
        self.send(LoopRequest::CorrectNow { reply }).await?;
        rx.await.map_err(|_| LoopError::ChannelClosed)
    }

    /// Copy of the current session state.
    pub async fn snapshot(&self) -> Result<TrackerSnapshot, LoopError> {
        let (reply, rx) = oneshot::channel();
        self.send(LoopRequest::Snapshot { reply }).await?;
        rx.await.map_err(|_| LoopError::ChannelClosed)
    }

    /// Stop the loop.
    pub async fn stop(&self) -> Result<(), LoopError> {
        self.running.store(false, Ordering::SeqCst);
        self.control(ControlCommand::Stop).await
    }

    /// Pause timed corrections. Requests are still served.
    pub async fn pause(&self) -> Result<(), LoopError> {
        self.control(ControlCommand::Pause).await
    }

    /// Resume timed corrections.
    pub async fn resume(&self) -> Result<(), LoopError> {
        self.control(ControlCommand::Resume).await
    }

    /// Check if the loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn send(&self, request: LoopRequest) -> Result<(), LoopError> {
        self.request_tx
            .send(request)
            .await
            .map_err(|_| LoopError::ChannelClosed)
    }

    async fn control(&self, command: ControlCommand) -> Result<(), LoopError> {
        self.control_tx
            .send(command)
            .await
            .map_err(|_| LoopError::ChannelClosed)
    }
}

/// Callback for every event the session produces.
pub type EventCallback = Box<dyn Fn(&TrackerEvent) + Send + Sync>;

/// Runs drift correction on a timer and serializes all session updates.
pub struct CorrectionLoopRunner {
    session: TrackerSession,
    source: Box<dyn PositionSource>,
    config: CorrectionLoopConfig,
    running: Arc<AtomicBool>,
    paused: bool,
    event_callback: Option<EventCallback>,
}

impl CorrectionLoopRunner {
    /// Create a runner around a session and a position source.
    pub fn new(
        session: TrackerSession,
        source: impl PositionSource + 'static,
        config: CorrectionLoopConfig,
    ) -> Self {
        Self {
            session,
            source: Box::new(source),
            config,
            running: Arc::new(AtomicBool::new(false)),
            paused: false,
            event_callback: None,
        }
    }

    /// Set a callback invoked with every session event.
    pub fn with_event_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TrackerEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(Box::new(callback));
        self
    }

    /// Spawn the loop task.
    /// Returns a handle for external control.
    pub async fn run(mut self) -> CorrectionLoopHandle {
        let (request_tx, mut request_rx) =
            mpsc::channel::<LoopRequest>(self.config.request_buffer.max(1));
        let (control_tx, mut control_rx) = mpsc::channel::<ControlCommand>(8);

        let handle = CorrectionLoopHandle {
            request_tx,
            control_tx,
            running: self.running.clone(),
        };

        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let period = Duration::from_millis(self.config.interval_ms.max(1));
            // first correction one full period after start
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!("Correction loop started ({} ms interval)", self.config.interval_ms);

            loop {
                tokio::select! {
                    biased;

                    Some(cmd) = control_rx.recv() => {
                        match cmd {
                            ControlCommand::Stop => {
                                tracing::info!("Correction loop stopping...");
                                break;
                            }
                            ControlCommand::Pause => {
                                tracing::info!("Correction loop paused");
                                self.paused = true;
                            }
                            ControlCommand::Resume => {
                                tracing::info!("Correction loop resumed");
                                self.paused = false;
                            }
                        }
                    }

                    request = request_rx.recv() => {
                        match request {
                            Some(request) => self.serve(request),
                            None => {
                                tracing::info!("All loop handles dropped");
                                break;
                            }
                        }
                    }

                    _ = ticker.tick() => {
                        if !self.paused {
                            self.correct();
                        }
                    }
                }
            }

            self.running.store(false, Ordering::SeqCst);
            tracing::info!("Correction loop stopped");
        });

        handle
    }

    fn serve(&mut self, request: LoopRequest) {
        match request {
            LoopRequest::Command { command, reply } => {
                let result = self.session.handle(command);
                self.notify(&result);
                let _ = reply.send(result);
            }
            LoopRequest::CaptureReference { image, reply } => {
                let estimate = self.source.read_estimate();
                let wifi_scan = self.source.capture_wifi_scan();
                let result = self.session.handle(TrackerCommand::AddReference {
                    image,
                    estimate,
                    wifi_scan,
                });
                self.notify(&result);
                let _ = reply.send(result);
            }
            LoopRequest::CorrectNow { reply } => {
                let event = self.correct();
                let _ = reply.send(event);
            }
            LoopRequest::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
        }
    }

    /// Poll the source once and apply whatever it returns.
    fn correct(&mut self) -> TrackerEvent {
        if !self.session.wants_fix() {
            return TrackerEvent::NoCorrection;
        }

        let estimate = self.source.read_estimate();
        let result = self.session.handle(TrackerCommand::ApplyEstimate(estimate));
        self.notify(&result);
        result.unwrap_or_else(|e| {
            tracing::error!("Correction failed: {}", e);
            TrackerEvent::NoCorrection
        })
    }

    fn notify(&self, result: &Result<TrackerEvent, TrackerError>) {
        match result {
            Ok(event) => {
                if let Some(ref callback) = self.event_callback {
                    callback(event);
                }
            }
            Err(e) => tracing::warn!("Tracker command rejected: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dead_reckoning::MotionCommand;
    use crate::sensors::{ExternalEstimate, GeoSource, NoFixSource, ScriptedSource};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn calibrate() -> TrackerCommand {
        TrackerCommand::Calibrate {
            p1: ImagePoint::new(0.0, 0.0),
            p2: ImagePoint::new(200.0, 0.0),
            distance_m: 20.0,
        }
    }

    #[test]
    fn test_correction_loop_config_default() {
        let config = CorrectionLoopConfig::default();
        assert_eq!(config.interval_ms, 5000);
        assert_eq!(config.request_buffer, 64);
    }

    #[test]
    fn test_correction_loop_config_builder() {
        let config = CorrectionLoopConfig::default()
            .with_interval(250)
            .with_request_buffer(4);
        assert_eq!(config.interval_ms, 250);
        assert_eq!(config.request_buffer, 4);
    }

    #[tokio::test]
    async fn test_requests_are_applied_in_order() {
        let runner = CorrectionLoopRunner::new(
            TrackerSession::new(),
            NoFixSource,
            CorrectionLoopConfig::default().with_interval(60_000),
        );
        let handle = runner.run().await;
        assert!(handle.is_running());

        handle.request(calibrate()).await.unwrap();
        handle
            .request(TrackerCommand::Move(MotionCommand::Forward(5.0)))
            .await
            .unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.pose.x, 5.0);
        assert_eq!(snapshot.path.len(), 1);
        assert_eq!(snapshot.calibration.unwrap().scale, 10.0);

        handle.stop().await.unwrap();
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_rejected_command_is_reported() {
        let handle = CorrectionLoopRunner::new(
            TrackerSession::new(),
            NoFixSource,
            CorrectionLoopConfig::default().with_interval(60_000),
        )
        .run()
        .await;

        let result = handle
            .request(TrackerCommand::SetStartPoint(ImagePoint::new(1.0, 1.0)))
            .await;
        assert_eq!(
            result,
            Err(LoopError::Tracker(TrackerError::MissingCalibration))
        );
        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_correct_now_uses_source() {
        let source = ScriptedSource::new(vec![Some(
            ExternalEstimate::new(0.0, 0.0, 5.0, GeoSource::Gps).with_world(10.0, 0.0),
        )]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let handle = CorrectionLoopRunner::new(
            TrackerSession::new(),
            source,
            CorrectionLoopConfig::default().with_interval(60_000),
        )
        .with_event_callback(move |event| {
            seen_clone.lock().unwrap().push(event.clone());
        })
        .run()
        .await;

        // no calibration yet: the source is not polled
        assert_eq!(handle.correct_now().await.unwrap(), TrackerEvent::NoCorrection);

        handle.request(calibrate()).await.unwrap();
        let event = handle.correct_now().await.unwrap();
        let TrackerEvent::Corrected { pose, correction } = event else {
            panic!("expected a correction, got {:?}", event);
        };
        assert!((correction.alpha - 0.84).abs() < 1e-12);
        assert!((pose.x - 8.4).abs() < 1e-12);

        // script exhausted
        assert_eq!(handle.correct_now().await.unwrap(), TrackerEvent::NoCorrection);

        let events = seen.lock().unwrap().clone();
        assert!(matches!(events[0], TrackerEvent::Calibrated(_)));
        assert!(matches!(events[1], TrackerEvent::Corrected { .. }));
        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_corrections_respect_period_and_pause() {
        let fix = |x: f64| {
            Some(ExternalEstimate::new(0.0, 0.0, 5.0, GeoSource::Gps).with_world(x, 0.0))
        };
        let source = ScriptedSource::new(vec![fix(10.0), fix(20.0), fix(30.0)]);
        let corrections = Arc::new(AtomicUsize::new(0));
        let counter = corrections.clone();
        let handle = CorrectionLoopRunner::new(
            TrackerSession::new(),
            source,
            CorrectionLoopConfig::default().with_interval(50),
        )
        .with_event_callback(move |event| {
            if matches!(event, TrackerEvent::Corrected { .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .run()
        .await;
        handle.request(calibrate()).await.unwrap();

        tokio::time::advance(Duration::from_millis(40)).await;
        tokio::task::yield_now().await;
        assert_eq!(corrections.load(Ordering::SeqCst), 0);
        assert_eq!(handle.snapshot().await.unwrap().pose.x, 0.0);

        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;
        assert_eq!(corrections.load(Ordering::SeqCst), 1);
        assert!((handle.snapshot().await.unwrap().pose.x - 8.4).abs() < 1e-12);

        handle.pause().await.unwrap();
        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(corrections.load(Ordering::SeqCst), 1);
        assert!((handle.snapshot().await.unwrap().pose.x - 8.4).abs() < 1e-12);

        handle.resume().await.unwrap();
        tokio::time::advance(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;
        assert_eq!(corrections.load(Ordering::SeqCst), 2);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_capture_reference_reads_source() {
        let source = ScriptedSource::new(vec![Some(ExternalEstimate::new(
            48.137,
            11.575,
            15.0,
            GeoSource::Wifi,
        ))]);
        let handle = CorrectionLoopRunner::new(
            TrackerSession::new(),
            source,
            CorrectionLoopConfig::default().with_interval(60_000),
        )
        .run()
        .await;

        handle.request(calibrate()).await.unwrap();
        let event = handle
            .capture_reference(ImagePoint::new(50.0, 50.0))
            .await
            .unwrap();
        let TrackerEvent::ReferenceAdded(point) = event else {
            panic!("expected ReferenceAdded");
        };
        assert_eq!(point.geo(), Some((48.137, 11.575)));
        assert_eq!(point.geo_source, Some(GeoSource::Wifi));
        handle.stop().await.unwrap();
    }
}
