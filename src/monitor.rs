//! Monitoring session orchestration
//!
//! This module runs the per-frame loop: pose frame → classification → state
//! tracking → (conditionally) notification → session log. The loop is
//! single-threaded and strictly ordered; only the notifier's delivery work
//! leaves this thread, and the loop never waits on it.
//!
//! Frame acquisition sits behind [`PoseSource`] so the same loop runs against
//! a live pose pipeline, a recorded stream, or test fixtures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, error, info};

use crate::classifier::SpineClassifier;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::notifier::Notifier;
use crate::recorder::{format_elapsed, SessionRecorder};
use crate::tracker::{PostureTracker, TrackerEvent};
use crate::types::{Classification, Keypoint, NotificationRequest, SessionLogEntry};

/// One frame's worth of pose data from the external pose collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum PoseFrame {
    /// A person was detected; keypoints follow the pose model's body schema
    Detected(Vec<Keypoint>),
    /// Frame captured but no person found; classified as Unknown
    NoDetection,
    /// Capture finished normally
    EndOfStream,
}

/// Supplier of per-frame pose data.
///
/// An `Err` models sensor failure and is fatal to the session; degraded pose
/// extraction must surface as [`PoseFrame::NoDetection`] instead.
pub trait PoseSource {
    fn next_frame(&mut self) -> Result<PoseFrame, MonitorError>;
}

/// Per-frame processing result, exposed for overlays and tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRecord {
    pub classification: Classification,
    pub event: Option<TrackerEvent>,
}

/// Summary of a finished session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionReport {
    pub frames: u64,
    pub signals_requested: u64,
    pub duration: Duration,
}

/// Drives one monitoring session from a pose source to its collaborators
pub struct PostureMonitor<'a> {
    classifier: SpineClassifier,
    tracker: PostureTracker,
    notifier: &'a Notifier,
    recorder: &'a mut SessionRecorder,
    signal_command: String,
    stop: Arc<AtomicBool>,
    signals_requested: u64,
}

impl<'a> PostureMonitor<'a> {
    pub fn new(
        config: &MonitorConfig,
        notifier: &'a Notifier,
        recorder: &'a mut SessionRecorder,
    ) -> Self {
        Self {
            classifier: SpineClassifier::new(config.angle_threshold_deg),
            tracker: PostureTracker::new(config.tracker()),
            notifier,
            recorder,
            signal_command: config.signal_command.clone(),
            stop: Arc::new(AtomicBool::new(false)),
            signals_requested: 0,
        }
    }

    /// Handle that ends the capture loop from another thread (the user quit
    /// signal)
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run the session until end-of-stream, a quit request, or sensor failure.
    ///
    /// Sensor failure is the only fatal outcome; the session log accumulated
    /// so far stays in the recorder either way.
    pub fn run<S: PoseSource>(&mut self, source: &mut S) -> Result<SessionReport, MonitorError> {
        info!(target: "system", "posture monitoring started");
        let started = Instant::now();
        let mut frames: u64 = 0;

        loop {
            if self.stop.load(Ordering::Relaxed) {
                info!(target: "system", "quit requested, ending session");
                break;
            }

            let frame = match source.next_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    error!(target: "system", "capture failed: {}", e);
                    return Err(e);
                }
            };
            if frame == PoseFrame::EndOfStream {
                info!(target: "system", "end of capture stream");
                break;
            }

            self.process_frame(&frame, started.elapsed());
            frames += 1;

            if frames % 100 == 0 {
                let elapsed = started.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    debug!(
                        target: "system",
                        "average fps over {} frames: {:.2}",
                        frames,
                        frames as f64 / elapsed
                    );
                }
            }
        }

        let report = SessionReport {
            frames,
            signals_requested: self.signals_requested,
            duration: started.elapsed(),
        };
        info!(
            target: "system",
            "session ended: {} frames, {} signals, {}",
            report.frames,
            report.signals_requested,
            format_elapsed(report.duration)
        );
        Ok(report)
    }

    /// Process a single frame at elapsed session time `now`.
    ///
    /// Classification faults never escape: a frame that cannot be classified
    /// is an Unknown frame and the session continues.
    pub fn process_frame(&mut self, frame: &PoseFrame, now: Duration) -> FrameRecord {
        let classification = match frame {
            PoseFrame::Detected(keypoints) => self.classifier.classify(keypoints),
            PoseFrame::NoDetection | PoseFrame::EndOfStream => Classification::unknown(),
        };

        let event = self.tracker.observe(classification.status, now);
        match event {
            Some(TrackerEvent::WrongConfirmed) => {
                info!(target: "posture", "wrong posture confirmed, timing started");
            }
            Some(TrackerEvent::SignalDue) => {
                let request = NotificationRequest::new(self.signal_command.as_str());
                info!(
                    target: "posture",
                    "sustained wrong posture, requesting '{}' signal ({})",
                    request.command,
                    request.request_id
                );
                self.notifier.submit(request);
                self.signals_requested += 1;
            }
            Some(TrackerEvent::Corrected) => {
                info!(target: "posture", "posture corrected, tracking reset");
            }
            None => {}
        }

        self.recorder.record(SessionLogEntry {
            unix_timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            elapsed: format_elapsed(now),
            status: classification.status,
            angle: classification.deviation_degrees,
            confidence: classification.confidence,
        });
        debug!(
            target: "data",
            "posture={} angle={} confidence={}",
            classification.status,
            classification
                .deviation_degrees
                .map(|a| format!("{:.2}", a))
                .unwrap_or_else(|| "N/A".to_string()),
            classification
                .confidence
                .map(|c| format!("{:.2}", c))
                .unwrap_or_else(|| "N/A".to_string()),
        );

        FrameRecord {
            classification,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{LEFT_HIP, LEFT_SHOULDER, RIGHT_HIP, RIGHT_SHOULDER};
    use crate::notifier::{DeliveryError, NotifierConfig, Transport};
    use crate::types::PostureStatus;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicU32;

    struct CountingTransport(AtomicU32);

    impl Transport for CountingTransport {
        fn send(&self, _url: &str) -> Result<(), DeliveryError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ScriptedSource {
        frames: std::vec::IntoIter<Result<PoseFrame, MonitorError>>,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Result<PoseFrame, MonitorError>>) -> Self {
            Self {
                frames: frames.into_iter(),
            }
        }
    }

    impl PoseSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<PoseFrame, MonitorError> {
            self.frames.next().unwrap_or(Ok(PoseFrame::EndOfStream))
        }
    }

    fn quiet_notifier() -> (Notifier, Arc<CountingTransport>) {
        let transport = Arc::new(CountingTransport(AtomicU32::new(0)));
        let notifier = Notifier::with_transport(
            NotifierConfig::default(),
            Arc::clone(&transport) as Arc<dyn Transport>,
        );
        (notifier, transport)
    }

    fn upright_frame() -> PoseFrame {
        let mut kps = vec![Keypoint::new(0.0, 0.0, 0.0); 25];
        kps[LEFT_SHOULDER] = Keypoint::new(120.0, 100.0, 0.9);
        kps[RIGHT_SHOULDER] = Keypoint::new(80.0, 100.0, 0.9);
        kps[LEFT_HIP] = Keypoint::new(120.0, 300.0, 0.9);
        kps[RIGHT_HIP] = Keypoint::new(80.0, 300.0, 0.9);
        PoseFrame::Detected(kps)
    }

    fn slouched_frame() -> PoseFrame {
        let mut kps = vec![Keypoint::new(0.0, 0.0, 0.0); 25];
        kps[LEFT_SHOULDER] = Keypoint::new(120.0, 100.0, 0.9);
        kps[RIGHT_SHOULDER] = Keypoint::new(80.0, 100.0, 0.9);
        kps[LEFT_HIP] = Keypoint::new(320.0, 300.0, 0.9);
        kps[RIGHT_HIP] = Keypoint::new(280.0, 300.0, 0.9);
        PoseFrame::Detected(kps)
    }

    #[test]
    fn run_processes_frames_until_end_of_stream() {
        let (notifier, _) = quiet_notifier();
        let mut recorder = SessionRecorder::new();
        let config = MonitorConfig::default();
        let mut monitor = PostureMonitor::new(&config, &notifier, &mut recorder);

        let mut source = ScriptedSource::new(vec![
            Ok(upright_frame()),
            Ok(PoseFrame::NoDetection),
            Ok(upright_frame()),
            Ok(PoseFrame::EndOfStream),
        ]);

        let report = monitor.run(&mut source).unwrap();
        assert_eq!(report.frames, 3);
        assert_eq!(report.signals_requested, 0);
        assert_eq!(recorder.len(), 3);
        notifier.shutdown();
    }

    #[test]
    fn sensor_failure_is_fatal_but_keeps_the_log() {
        let (notifier, _) = quiet_notifier();
        let mut recorder = SessionRecorder::new();
        let config = MonitorConfig::default();
        let mut monitor = PostureMonitor::new(&config, &notifier, &mut recorder);

        let mut source = ScriptedSource::new(vec![
            Ok(upright_frame()),
            Err(MonitorError::FrameRead("device disconnected".to_string())),
        ]);

        let result = monitor.run(&mut source);
        assert!(matches!(result, Err(MonitorError::FrameRead(_))));
        assert_eq!(recorder.len(), 1);
        notifier.shutdown();
    }

    #[test]
    fn stop_handle_ends_the_session_before_the_next_frame() {
        let (notifier, _) = quiet_notifier();
        let mut recorder = SessionRecorder::new();
        let config = MonitorConfig::default();
        let mut monitor = PostureMonitor::new(&config, &notifier, &mut recorder);

        monitor.stop_handle().store(true, Ordering::Relaxed);
        let mut source = ScriptedSource::new((0..100).map(|_| Ok(upright_frame())).collect());

        let report = monitor.run(&mut source).unwrap();
        assert_eq!(report.frames, 0);
        notifier.shutdown();
    }

    #[test]
    fn sustained_slouch_drives_a_signal_through_the_notifier() {
        let (notifier, transport) = quiet_notifier();
        let mut recorder = SessionRecorder::new();
        let config = MonitorConfig::default();
        let mut monitor = PostureMonitor::new(&config, &notifier, &mut recorder);

        // Deterministic clock: 10 fps of wrong posture past debounce + threshold
        let frame = slouched_frame();
        let mut signals = 0;
        for tick in 0..30u64 {
            let record = monitor.process_frame(&frame, Duration::from_millis(tick * 100));
            if record.event == Some(TrackerEvent::SignalDue) {
                signals += 1;
            }
        }

        assert_eq!(signals, 1);
        notifier.shutdown();
        assert_eq!(transport.0.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.len(), 30);
    }

    #[test]
    fn no_detection_frames_classify_as_unknown() {
        let (notifier, _) = quiet_notifier();
        let mut recorder = SessionRecorder::new();
        let config = MonitorConfig::default();
        let mut monitor = PostureMonitor::new(&config, &notifier, &mut recorder);

        let record = monitor.process_frame(&PoseFrame::NoDetection, Duration::ZERO);
        assert_eq!(record.classification, Classification::unknown());
        assert_eq!(recorder.entries()[0].status, PostureStatus::Unknown);
        notifier.shutdown();
    }
}
