//! Posture state tracking
//!
//! This module turns the noisy per-frame classification signal into stable
//! events. Three independent timers compose into a single low-noise trigger:
//!
//! - a hysteresis window: a status change must hold for
//!   [`TrackerConfig::min_change_duration`] before it is acted on,
//! - a sustained-wrong threshold: a confirmed wrong episode must last
//!   [`TrackerConfig::wrong_threshold`] before a signal is due,
//! - a cooldown: at most one signal per [`TrackerConfig::signal_cooldown`],
//!   across episodes.
//!
//! The tracker is driven once per frame with the elapsed session time, so it
//! has no clock of its own and is fully deterministic.

use std::time::Duration;

use log::debug;

use crate::types::PostureStatus;

/// Timing parameters for the posture state machine
#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    /// How long a changed status must hold before it counts
    pub min_change_duration: Duration,
    /// How long confirmed wrong posture must persist before a signal is due
    pub wrong_threshold: Duration,
    /// Minimum spacing between emitted signals
    pub signal_cooldown: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_change_duration: Duration::from_millis(500),
            wrong_threshold: Duration::from_millis(2100),
            signal_cooldown: Duration::from_millis(5000),
        }
    }
}

/// Debounced event produced by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEvent {
    /// Wrong posture held past the hysteresis window; episode timing started
    WrongConfirmed,
    /// Episode reached the sustained-wrong threshold with the cooldown clear;
    /// the caller should dispatch a notification
    SignalDue,
    /// Posture returned to non-wrong and held; tracking re-armed
    Corrected,
}

/// Per-session posture state machine.
///
/// Owned and mutated exclusively by the frame-processing thread; all times are
/// durations since session start.
#[derive(Debug, Clone)]
pub struct PostureTracker {
    config: TrackerConfig,
    last_status: Option<PostureStatus>,
    last_status_change: Option<Duration>,
    wrong_since: Option<Duration>,
    signal_sent: bool,
    last_signal: Option<Duration>,
}

impl PostureTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            last_status: None,
            last_status_change: None,
            wrong_since: None,
            signal_sent: false,
            last_signal: None,
        }
    }

    /// Whether a confirmed wrong episode is currently being timed
    pub fn episode_active(&self) -> bool {
        self.wrong_since.is_some()
    }

    /// Feed one frame's classification into the state machine.
    ///
    /// `Unknown` is a neutral frame: it neither starts nor sustains a wrong
    /// episode, and clears an in-progress one no faster than the hysteresis
    /// window allows.
    pub fn observe(&mut self, status: PostureStatus, now: Duration) -> Option<TrackerEvent> {
        if self.last_status != Some(status) {
            debug!(
                target: "posture",
                "status changed to {} at {:.3}s",
                status,
                now.as_secs_f64()
            );
            self.last_status_change = Some(now);
            self.last_status = Some(status);
        }

        if status == PostureStatus::Wrong {
            self.observe_wrong(now)
        } else {
            self.observe_not_wrong(now)
        }
    }

    fn observe_wrong(&mut self, now: Duration) -> Option<TrackerEvent> {
        match self.wrong_since {
            None => {
                let stable = self
                    .last_status_change
                    .map(|changed| now.saturating_sub(changed) >= self.config.min_change_duration)
                    .unwrap_or(false);
                if stable {
                    self.wrong_since = Some(now);
                    return Some(TrackerEvent::WrongConfirmed);
                }
                None
            }
            Some(since) => {
                let sustained = now.saturating_sub(since) >= self.config.wrong_threshold;
                if sustained && !self.signal_sent {
                    let cooled = self
                        .last_signal
                        .map(|t| now.saturating_sub(t) >= self.config.signal_cooldown)
                        .unwrap_or(true);
                    if cooled {
                        self.signal_sent = true;
                        self.last_signal = Some(now);
                        // Episode is handled; a fresh one may start while still slouching
                        self.wrong_since = None;
                        return Some(TrackerEvent::SignalDue);
                    }
                }
                None
            }
        }
    }

    fn observe_not_wrong(&mut self, now: Duration) -> Option<TrackerEvent> {
        if self.wrong_since.is_none() && !self.signal_sent {
            return None;
        }
        let stable = self
            .last_status_change
            .map(|changed| now.saturating_sub(changed) >= self.config.min_change_duration)
            .unwrap_or(false);
        if stable {
            let had_episode = self.wrong_since.is_some();
            self.wrong_since = None;
            self.signal_sent = false;
            if had_episode {
                return Some(TrackerEvent::Corrected);
            }
            debug!(target: "posture", "signal re-armed at {:.3}s", now.as_secs_f64());
        }
        None
    }
}
