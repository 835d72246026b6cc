//! Session configuration
//!
//! All tunable parameters of a monitoring session live here as plain scalar
//! fields (durations in seconds) so a config round-trips through JSON
//! unchanged. Defaults are the production constants.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::DEFAULT_ANGLE_THRESHOLD_DEG;
use crate::error::MonitorError;
use crate::notifier::NotifierConfig;
use crate::tracker::TrackerConfig;
use crate::DEFAULT_SIGNAL_COMMAND;

/// Tunable parameters for a monitoring session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Actuator base URL
    pub actuator_url: String,
    /// Command sent on sustained wrong posture
    pub signal_command: String,
    /// Spine-tilt tolerance in degrees
    pub angle_threshold_deg: f64,
    /// Hysteresis: how long a status change must hold before it counts
    pub min_change_duration_secs: f64,
    /// How long confirmed wrong posture must persist before signaling
    pub wrong_threshold_secs: f64,
    /// Minimum spacing between emitted signals
    pub signal_cooldown_secs: f64,
    /// Per-command dispatch debounce
    pub debounce_secs: f64,
    /// Per-attempt HTTP timeout
    pub request_timeout_secs: f64,
    /// Delivery attempts per notification
    pub retry_attempts: u32,
    /// Pause between delivery attempts
    pub retry_delay_secs: f64,
    /// Notification worker threads
    pub notify_workers: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            actuator_url: "http://172.20.10.3".to_string(),
            signal_command: DEFAULT_SIGNAL_COMMAND.to_string(),
            angle_threshold_deg: DEFAULT_ANGLE_THRESHOLD_DEG,
            min_change_duration_secs: 0.5,
            wrong_threshold_secs: 2.1,
            signal_cooldown_secs: 5.0,
            debounce_secs: 1.0,
            request_timeout_secs: 1.0,
            retry_attempts: 3,
            retry_delay_secs: 0.1,
            notify_workers: 4,
        }
    }
}

impl MonitorConfig {
    /// Load a validated config from JSON
    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the config to pretty JSON
    pub fn to_json(&self) -> Result<String, MonitorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.actuator_url.trim().is_empty() {
            return Err(MonitorError::InvalidConfig(
                "actuator_url must not be empty".to_string(),
            ));
        }
        if self.signal_command.trim().is_empty() {
            return Err(MonitorError::InvalidConfig(
                "signal_command must not be empty".to_string(),
            ));
        }
        if !(self.angle_threshold_deg.is_finite() && self.angle_threshold_deg >= 0.0) {
            return Err(MonitorError::InvalidConfig(
                "angle_threshold_deg must be a non-negative number".to_string(),
            ));
        }
        for (name, value) in [
            ("min_change_duration_secs", self.min_change_duration_secs),
            ("wrong_threshold_secs", self.wrong_threshold_secs),
            ("signal_cooldown_secs", self.signal_cooldown_secs),
            ("debounce_secs", self.debounce_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("retry_delay_secs", self.retry_delay_secs),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(MonitorError::InvalidConfig(format!(
                    "{} must be a non-negative number",
                    name
                )));
            }
        }
        if self.retry_attempts == 0 {
            return Err(MonitorError::InvalidConfig(
                "retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.notify_workers == 0 {
            return Err(MonitorError::InvalidConfig(
                "notify_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Timing parameters for the posture state machine
    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            min_change_duration: Duration::from_secs_f64(self.min_change_duration_secs),
            wrong_threshold: Duration::from_secs_f64(self.wrong_threshold_secs),
            signal_cooldown: Duration::from_secs_f64(self.signal_cooldown_secs),
        }
    }

    /// Delivery parameters for the notifier
    pub fn notifier(&self) -> NotifierConfig {
        NotifierConfig {
            base_url: self.actuator_url.clone(),
            debounce: Duration::from_secs_f64(self.debounce_secs),
            retry_attempts: self.retry_attempts,
            retry_delay: Duration::from_secs_f64(self.retry_delay_secs),
            request_timeout: Duration::from_secs_f64(self.request_timeout_secs),
            workers: self.notify_workers,
        }
    }
}
