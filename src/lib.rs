//! Posture Sentry - real-time seated posture monitoring core
//!
//! Sentry consumes a stream of pose keypoints, classifies each frame's
//! posture, and drives a debounced external notification when poor posture
//! persists: keypoints → geometric classification → state tracking →
//! (conditionally) actuator signal, with every frame appended to the session
//! log.
//!
//! ## Modules
//!
//! - **Classifier**: spine-tilt geometry over shoulder/hip keypoints
//! - **Tracker**: debounce / sustained-wrong / cooldown state machine
//! - **Notifier**: fire-and-forget retried HTTP dispatch to the actuator
//! - **Recorder**: ordered session log with CSV export
//! - **Monitor**: the single-threaded per-frame loop tying them together

pub mod classifier;
pub mod config;
pub mod error;
pub mod monitor;
pub mod notifier;
pub mod recorder;
pub mod tracker;
pub mod types;

pub use classifier::SpineClassifier;
pub use config::MonitorConfig;
pub use error::MonitorError;
pub use monitor::{PoseFrame, PoseSource, PostureMonitor, SessionReport};
pub use notifier::{Notifier, NotifierConfig, Transport};
pub use recorder::{SavePrompt, SaveTarget, SessionRecorder};
pub use tracker::{PostureTracker, TrackerConfig, TrackerEvent};
pub use types::{Classification, Keypoint, NotificationRequest, PostureStatus, SessionLogEntry};

/// Sentry version embedded in logs and CLI output
pub const SENTRY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command sent to the actuator on sustained wrong posture
pub const DEFAULT_SIGNAL_COMMAND: &str = "ODD";
