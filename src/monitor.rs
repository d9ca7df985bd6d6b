//! The monitor: camera lifecycle plus the sampling loop.
//!
//! One controller owns the camera session, the classification client, and
//! the presenter. The loop runs on a fixed wall-clock interval: a slow or
//! failed tick never delays the next scheduled one, so classification
//! requests may overlap. Each tick carries a monotonic sequence number and
//! rendering discards responses older than the newest one already shown.
//!
//! Per-tick failures (capture, transport, malformed response) are contained:
//! logged, rendered as a generic status, and the loop carries on. Stopping
//! the monitor cancels the sampling loop and releases the camera.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::capture::CameraSource;
use crate::config::SamplingSettings;
use crate::detect::{DetectClient, Detection};
use crate::ui::{DetectionView, Severity, StatusPresenter};

/// Status line once the camera is live.
pub const STATUS_DETECTING: &str = "Camera is ON. Detecting...";
/// Status line for any per-tick failure.
pub const STATUS_FRAME_ERROR: &str = "Error processing frame";
/// Status line when no capture backend exists for the configured device.
pub const STATUS_UNSUPPORTED: &str = "Camera capture is not supported in this environment";

/// Counters for health logging and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonitorStats {
    /// Sampling ticks that ran while the camera was active.
    pub ticks: u64,
    /// Classification requests handed to a worker.
    pub requests_dispatched: u64,
    /// Outcomes rendered.
    pub rendered: u64,
    /// Outcomes discarded because a newer tick already rendered.
    pub stale_discarded: u64,
}

struct TickOutcome {
    seq: u64,
    result: Result<Detection>,
}

pub struct Monitor {
    sampling: SamplingSettings,
    camera: CameraSource,
    client: DetectClient,
    presenter: Box<dyn StatusPresenter>,
    active: bool,
    next_seq: u64,
    last_rendered_seq: u64,
    in_flight: u64,
    outcome_tx: Sender<TickOutcome>,
    outcome_rx: Receiver<TickOutcome>,
    stats: MonitorStats,
}

impl Monitor {
    pub fn new(
        sampling: SamplingSettings,
        camera: CameraSource,
        client: DetectClient,
        presenter: Box<dyn StatusPresenter>,
    ) -> Self {
        let (outcome_tx, outcome_rx) = channel();
        Self {
            sampling,
            camera,
            client,
            presenter,
            active: false,
            next_seq: 0,
            last_rendered_seq: 0,
            in_flight: 0,
            outcome_tx,
            outcome_rx,
            stats: MonitorStats::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// Acquire the camera and mark the loop active. Idempotent: a second
    /// call while active changes nothing. Returns false when the camera
    /// stays inactive (unsupported environment or acquisition failure).
    pub fn start(&mut self) -> bool {
        if self.active {
            return true;
        }
        if !self.camera.is_supported() {
            log::error!("no capture backend available");
            self.presenter.set_status(Severity::Danger, STATUS_UNSUPPORTED);
            return false;
        }
        match self.camera.start() {
            Ok(()) => {
                self.active = true;
                self.presenter.set_status(Severity::Success, STATUS_DETECTING);
                true
            }
            Err(err) => {
                log::error!("camera acquisition failed: {}", err);
                self.presenter.set_status(Severity::Danger, err.user_message());
                false
            }
        }
    }

    /// Cancel the sampling loop and release the camera. Idempotent.
    pub fn stop(&mut self) {
        self.active = false;
        self.camera.stop();
    }

    /// One sampling tick: drain finished classifications, then capture and
    /// dispatch the current frame. Ticks while inactive are no-ops.
    pub fn tick(&mut self) {
        self.drain_responses();
        if !self.active {
            return;
        }
        self.stats.ticks += 1;
        let seq = self.next_seq + 1;
        self.next_seq = seq;

        let frame = match self.camera.capture_frame() {
            Ok(frame) => frame,
            Err(err) => {
                self.apply_outcome(seq, Err(err.into()));
                return;
            }
        };
        let data_url = match frame.to_data_url(self.sampling.jpeg_quality) {
            Ok(data_url) => data_url,
            Err(err) => {
                self.apply_outcome(seq, Err(err));
                return;
            }
        };

        let client = self.client.clone();
        let tx = self.outcome_tx.clone();
        self.in_flight += 1;
        self.stats.requests_dispatched += 1;
        thread::spawn(move || {
            let result = client.classify(&data_url);
            let _ = tx.send(TickOutcome { seq, result });
        });
    }

    /// Run until the shutdown flag flips. The tick cadence is wall-clock
    /// fixed-interval; ticks that overrun their slot are skipped, never
    /// queued. Always releases the camera on the way out.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        if !self.start() {
            return Ok(());
        }
        let interval = self.sampling.interval();
        let mut next_tick = Instant::now();
        while !shutdown.load(Ordering::SeqCst) {
            self.tick();
            next_tick += interval;
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                next_tick = now;
            }
        }
        self.drain_responses();
        self.stop();
        log::info!(
            "monitor stopped: {} ticks, {} requests, {} rendered, {} stale",
            self.stats.ticks,
            self.stats.requests_dispatched,
            self.stats.rendered,
            self.stats.stale_discarded
        );
        Ok(())
    }

    /// Wait for in-flight classifications to land, up to `timeout`.
    pub fn settle(&mut self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let now = Instant::now();
            if now >= deadline {
                log::warn!("{} classification(s) still in flight after settle", self.in_flight);
                break;
            }
            match self.outcome_rx.recv_timeout(deadline - now) {
                Ok(outcome) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    self.apply_outcome(outcome.seq, outcome.result);
                }
                Err(_) => break,
            }
        }
    }

    fn drain_responses(&mut self) {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            self.apply_outcome(outcome.seq, outcome.result);
        }
    }

    /// Render one tick's outcome. Outcomes from ticks older than the newest
    /// rendered one are stale and dropped.
    fn apply_outcome(&mut self, seq: u64, outcome: Result<Detection>) {
        if seq <= self.last_rendered_seq {
            self.stats.stale_discarded += 1;
            log::debug!("tick {}: outcome superseded, discarded", seq);
            return;
        }
        self.last_rendered_seq = seq;
        self.stats.rendered += 1;
        match outcome {
            Err(err) => {
                log::warn!("tick {}: {:#}", seq, err);
                self.presenter.set_status(Severity::Danger, STATUS_FRAME_ERROR);
            }
            Ok(Detection::ServerError { message }) => {
                log::warn!("tick {}: server reported: {}", seq, message);
                self.presenter
                    .set_status(Severity::Warning, &format!("Detection error: {}", message));
            }
            Ok(Detection::Classified {
                prediction,
                confidence,
            }) => {
                let view = DetectionView::from_classification(&prediction, confidence);
                self.presenter.show_detection(&view);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CameraConfig;
    use crate::detect::Prediction;
    use crate::ui::{MemoryPresenter, PresenterEvent};

    // Nothing listens on the discard port, so dispatched requests fail fast.
    const UNREACHABLE_ENDPOINT: &str = "http://127.0.0.1:9/detect";

    fn test_monitor(device: &str) -> (Monitor, MemoryPresenter) {
        let presenter = MemoryPresenter::new();
        let camera = CameraSource::new(CameraConfig {
            device: device.to_string(),
            width: 32,
            height: 24,
        });
        let client = DetectClient::new(UNREACHABLE_ENDPOINT, Duration::from_millis(500))
            .expect("endpoint parses");
        let sampling = SamplingSettings {
            interval_ms: 10,
            jpeg_quality: 80,
        };
        let monitor = Monitor::new(sampling, camera, client, Box::new(presenter.clone()));
        (monitor, presenter)
    }

    fn classified(label: &str, confidence: f32) -> Result<Detection> {
        Ok(Detection::Classified {
            prediction: Prediction::parse(label),
            confidence,
        })
    }

    #[test]
    fn denied_camera_never_starts_the_loop() {
        let (mut monitor, presenter) = test_monitor("stub://denied");

        assert!(!monitor.start());
        assert!(!monitor.is_active());
        assert_eq!(
            presenter.last_status(),
            Some((
                Severity::Danger,
                "Please allow camera permissions".to_string()
            ))
        );

        monitor.tick();
        let stats = monitor.stats();
        assert_eq!(stats.ticks, 0);
        assert_eq!(stats.requests_dispatched, 0);
    }

    #[cfg(not(feature = "camera-v4l2"))]
    #[test]
    fn unsupported_device_reports_the_fixed_status() {
        let (mut monitor, presenter) = test_monitor("/dev/video0");

        assert!(!monitor.start());
        assert_eq!(
            presenter.last_status(),
            Some((Severity::Danger, STATUS_UNSUPPORTED.to_string()))
        );
    }

    #[test]
    fn start_is_idempotent_and_reports_detecting_once() {
        let (mut monitor, presenter) = test_monitor("stub://webcam");

        assert!(monitor.start());
        assert!(monitor.start());

        let statuses: Vec<_> = presenter
            .events()
            .into_iter()
            .filter(|event| matches!(event, PresenterEvent::Status { .. }))
            .collect();
        assert_eq!(
            statuses,
            vec![PresenterEvent::Status {
                severity: Severity::Success,
                text: STATUS_DETECTING.to_string(),
            }]
        );
    }

    #[test]
    fn unready_stream_skips_the_network_call() {
        let (mut monitor, presenter) = test_monitor("stub://unready");

        assert!(monitor.start());
        monitor.tick();

        let stats = monitor.stats();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.requests_dispatched, 0);
        assert_eq!(
            presenter.last_status(),
            Some((Severity::Danger, STATUS_FRAME_ERROR.to_string()))
        );
    }

    #[test]
    fn transport_failures_are_contained_per_tick() {
        let (mut monitor, presenter) = test_monitor("stub://webcam");

        assert!(monitor.start());
        monitor.tick();
        monitor.settle(Duration::from_secs(5));

        let stats = monitor.stats();
        assert_eq!(stats.requests_dispatched, 1);
        assert_eq!(stats.rendered, 1);
        assert_eq!(
            presenter.last_status(),
            Some((Severity::Danger, STATUS_FRAME_ERROR.to_string()))
        );
        assert!(monitor.is_active(), "loop keeps running after a bad tick");
    }

    #[test]
    fn newest_tick_wins_when_outcomes_arrive_out_of_order() {
        let (mut monitor, presenter) = test_monitor("stub://webcam");
        assert!(monitor.start());

        monitor.apply_outcome(2, classified("no_mask", 0.9));
        monitor.apply_outcome(1, classified("correct_mask", 0.8));

        let view = presenter.last_detection().expect("rendered detection");
        assert_eq!(view.label, "No Mask");

        let stats = monitor.stats();
        assert_eq!(stats.rendered, 1);
        assert_eq!(stats.stale_discarded, 1);
    }

    #[test]
    fn server_error_renders_as_warning_with_message() {
        let (mut monitor, presenter) = test_monitor("stub://webcam");
        assert!(monitor.start());

        monitor.apply_outcome(
            1,
            Ok(Detection::ServerError {
                message: "Unknown error".to_string(),
            }),
        );

        assert_eq!(
            presenter.last_status(),
            Some((
                Severity::Warning,
                "Detection error: Unknown error".to_string()
            ))
        );
    }

    #[test]
    fn stop_cancels_the_loop_and_releases_the_camera() {
        let (mut monitor, _presenter) = test_monitor("stub://webcam");
        assert!(monitor.start());

        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_active());

        monitor.tick();
        assert_eq!(monitor.stats().ticks, 0);
    }
}
