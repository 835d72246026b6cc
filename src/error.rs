//! Error types for posture-sentry

use thiserror::Error;

/// Errors that can terminate or refuse a monitoring session.
///
/// Only sensor failures are fatal to a running session; classification faults
/// degrade to `Unknown` frames and notification faults stay inside the
/// notifier (logged, never propagated).
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("capture device unavailable: {0}")]
    SensorUnavailable(String),

    #[error("failed to read frame from capture device: {0}")]
    FrameRead(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),
}
