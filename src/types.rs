//! Core types for the posture monitoring pipeline
//!
//! This module defines the data structures that flow through each stage of a
//! monitoring session: pose keypoints, per-frame classifications, notification
//! requests, and session log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-frame posture verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostureStatus {
    Correct,
    Wrong,
    Unknown,
}

impl PostureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostureStatus::Correct => "Correct",
            PostureStatus::Wrong => "Wrong",
            PostureStatus::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for PostureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One anatomical landmark supplied by the pose source.
///
/// The pose model reports undetected landmarks with a negative x coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    /// Detection confidence in [0, 1]
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }

    /// Whether the pose model actually located this landmark
    pub fn is_detected(&self) -> bool {
        self.x >= 0.0
    }
}

impl From<[f64; 3]> for Keypoint {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Result of classifying a single frame.
///
/// Produced once per frame and never mutated. A classification that could not
/// be computed (missing landmarks, degenerate geometry) is the
/// [`Classification::unknown`] variant rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub status: PostureStatus,
    /// Spine deviation from vertical, in degrees
    pub deviation_degrees: Option<f64>,
    /// Mean detection confidence of the landmarks used, in [0, 1]
    pub confidence: Option<f64>,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            status: PostureStatus::Unknown,
            deviation_degrees: None,
            confidence: None,
        }
    }
}

/// A command destined for the external actuator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Stable handle for correlating delivery log lines
    pub request_id: Uuid,
    /// Actuator command, e.g. "ODD"
    pub command: String,
    /// When the tracker confirmed sustained wrong posture
    pub requested_at: DateTime<Utc>,
}

impl NotificationRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            command: command.into(),
            requested_at: Utc::now(),
        }
    }
}

/// One row of the session log, appended per processed frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLogEntry {
    /// Seconds since the Unix epoch at capture time
    pub unix_timestamp: f64,
    /// Elapsed session time, formatted HH:MM:SS.mmm
    pub elapsed: String,
    pub status: PostureStatus,
    pub angle: Option<f64>,
    pub confidence: Option<f64>,
}
