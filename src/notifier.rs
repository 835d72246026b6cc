//! Actuator notification dispatch
//!
//! This module delivers tracker-confirmed commands to the external HTTP
//! actuator without ever stalling the frame loop. Submission is fire-and-
//! forget: a per-command debounce drops duplicates before any network
//! attempt, then the request crosses a bounded channel to a small pool of
//! worker threads that perform the retried HTTP GET. All delivery outcomes
//! are observable only through the log.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::types::NotificationRequest;

/// Capacity of the queue between the frame loop and the delivery workers
const QUEUE_CAPACITY: usize = 32;

/// A single delivery attempt failed (connection error, timeout, non-2xx)
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct DeliveryError(pub String);

/// Seam between the notifier and the actual HTTP stack.
///
/// Production uses [`HttpTransport`]; tests substitute scripted failures.
pub trait Transport: Send + Sync {
    fn send(&self, url: &str) -> Result<(), DeliveryError>;
}

/// Blocking HTTP transport with a per-attempt timeout
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        Self { agent }
    }
}

impl Transport for HttpTransport {
    fn send(&self, url: &str) -> Result<(), DeliveryError> {
        // ureq reports non-2xx statuses as errors, which matches the
        // "any 2xx-class response is success" contract
        self.agent
            .get(url)
            .call()
            .map(|_| ())
            .map_err(|e| DeliveryError(e.to_string()))
    }
}

/// Delivery and throttling parameters
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Actuator base URL, e.g. "http://172.20.10.3"
    pub base_url: String,
    /// Minimum spacing between dispatches of the same command
    pub debounce: Duration,
    /// Delivery attempts per request
    pub retry_attempts: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
    /// Per-attempt HTTP timeout
    pub request_timeout: Duration,
    /// Worker threads performing deliveries
    pub workers: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://172.20.10.3".to_string(),
            debounce: Duration::from_secs(1),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(100),
            request_timeout: Duration::from_secs(1),
            workers: 4,
        }
    }
}

/// Fire-and-forget dispatcher for actuator commands.
///
/// The per-command last-sent map is the only mutable state shared across the
/// thread boundary; it is read by the debounce check and written on dispatch,
/// so it lives behind a mutex to keep duplicate sends out of the debounce
/// window.
pub struct Notifier {
    config: NotifierConfig,
    transport: Arc<dyn Transport>,
    tx: Sender<NotificationRequest>,
    workers: Vec<JoinHandle<()>>,
    last_sent: Arc<Mutex<HashMap<String, Instant>>>,
}

impl Notifier {
    /// Create a notifier delivering over HTTP
    pub fn new(config: NotifierConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(config.request_timeout));
        Self::with_transport(config, transport)
    }

    /// Create a notifier with a custom transport (used by tests)
    pub fn with_transport(config: NotifierConfig, transport: Arc<dyn Transport>) -> Self {
        let (tx, rx) = bounded::<NotificationRequest>(QUEUE_CAPACITY);
        let workers = (0..config.workers.max(1))
            .map(|_| spawn_worker(rx.clone(), Arc::clone(&transport), config.clone()))
            .collect();
        Self {
            config,
            transport,
            tx,
            workers,
            last_sent: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// One-shot startup connectivity check against `{base_url}/`.
    ///
    /// The outcome is logged; an unreachable actuator never blocks startup.
    pub fn probe(&self) {
        let url = format!("{}/", self.config.base_url.trim_end_matches('/'));
        match self.transport.send(&url) {
            Ok(()) => info!(target: "system", "actuator reachable at {}", self.config.base_url),
            Err(e) => warn!(
                target: "system",
                "actuator unreachable at startup ({}): {}",
                self.config.base_url,
                e
            ),
        }
    }

    /// Queue a command for delivery.
    ///
    /// Returns immediately. A duplicate of a command sent within the debounce
    /// window is dropped before any network attempt; a full queue drops the
    /// request with a warning.
    pub fn submit(&self, request: NotificationRequest) {
        let now = Instant::now();
        {
            let mut last_sent = self
                .last_sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(prev) = last_sent.get(&request.command) {
                if now.duration_since(*prev) < self.config.debounce {
                    debug!(
                        target: "signal",
                        "command '{}' suppressed by debounce ({} pending)",
                        request.command,
                        request.request_id
                    );
                    return;
                }
            }
            last_sent.insert(request.command.clone(), now);
        }

        match self.tx.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(req)) => {
                warn!(
                    target: "signal",
                    "notification queue full, dropping command '{}' ({})",
                    req.command,
                    req.request_id
                );
            }
            Err(TrySendError::Disconnected(req)) => {
                error!(
                    target: "signal",
                    "notification workers gone, dropping command '{}' ({})",
                    req.command,
                    req.request_id
                );
            }
        }
    }

    /// Close the queue and wait for queued deliveries to finish.
    ///
    /// Best effort: a worker mid-retry completes its remaining attempts.
    pub fn shutdown(self) {
        let Notifier { tx, workers, .. } = self;
        drop(tx);
        for handle in workers {
            let _ = handle.join();
        }
    }
}

fn spawn_worker(
    rx: Receiver<NotificationRequest>,
    transport: Arc<dyn Transport>,
    config: NotifierConfig,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for request in rx.iter() {
            let _ = deliver(&*transport, &config, &request);
        }
    })
}

/// Deliver one request with bounded retries, logging every outcome.
///
/// Returns the number of attempts used on success, or the last error after
/// exhausting retries. The error is terminal from the caller's point of view;
/// nothing is re-queued.
fn deliver(
    transport: &dyn Transport,
    config: &NotifierConfig,
    request: &NotificationRequest,
) -> Result<u32, DeliveryError> {
    let url = format!(
        "{}/LED={}",
        config.base_url.trim_end_matches('/'),
        request.command
    );

    let mut last_error = DeliveryError("no attempts made".to_string());
    for attempt in 1..=config.retry_attempts.max(1) {
        match transport.send(&url) {
            Ok(()) => {
                info!(
                    target: "signal",
                    "command '{}' delivered on attempt {} ({})",
                    request.command,
                    attempt,
                    request.request_id
                );
                return Ok(attempt);
            }
            Err(e) => {
                warn!(
                    target: "signal",
                    "attempt {} to send '{}' failed: {} ({})",
                    attempt,
                    request.command,
                    e,
                    request.request_id
                );
                last_error = e;
                if attempt < config.retry_attempts {
                    thread::sleep(config.retry_delay);
                }
            }
        }
    }

    error!(
        target: "signal",
        "all {} attempts to send '{}' failed ({})",
        config.retry_attempts,
        request.command,
        request.request_id
    );
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Transport that fails the first `failures` calls, then succeeds
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyTransport {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for FlakyTransport {
        fn send(&self, _url: &str) -> Result<(), DeliveryError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(DeliveryError("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn fast_config() -> NotifierConfig {
        NotifierConfig {
            retry_delay: Duration::from_millis(1),
            ..NotifierConfig::default()
        }
    }

    #[test]
    fn delivery_succeeds_on_third_attempt_after_two_failures() {
        let transport = FlakyTransport::new(2);
        let config = fast_config();
        let request = NotificationRequest::new("ODD");

        let result = deliver(&transport, &config, &request);
        assert_eq!(result.unwrap(), 3);
        assert_eq!(transport.call_count(), 3);
    }

    #[test]
    fn delivery_is_terminal_failure_after_exhausting_retries() {
        let transport = FlakyTransport::new(u32::MAX);
        let config = fast_config();
        let request = NotificationRequest::new("ODD");

        let result = deliver(&transport, &config, &request);
        assert!(result.is_err());
        assert_eq!(transport.call_count(), 3);
    }

    #[test]
    fn first_attempt_success_makes_no_further_calls() {
        let transport = FlakyTransport::new(0);
        let config = fast_config();
        let request = NotificationRequest::new("ODD");

        assert_eq!(deliver(&transport, &config, &request).unwrap(), 1);
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn duplicate_within_debounce_is_dropped_before_any_network_attempt() {
        let transport = Arc::new(FlakyTransport::new(0));
        let notifier = Notifier::with_transport(fast_config(), Arc::clone(&transport) as Arc<dyn Transport>);

        notifier.submit(NotificationRequest::new("ODD"));
        notifier.submit(NotificationRequest::new("ODD"));
        notifier.shutdown();

        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn distinct_commands_are_debounced_independently() {
        let transport = Arc::new(FlakyTransport::new(0));
        let notifier = Notifier::with_transport(fast_config(), Arc::clone(&transport) as Arc<dyn Transport>);

        notifier.submit(NotificationRequest::new("ODD"));
        notifier.submit(NotificationRequest::new("EVEN"));
        notifier.shutdown();

        assert_eq!(transport.call_count(), 2);
    }

    #[test]
    fn command_passes_again_once_debounce_window_elapses() {
        let transport = Arc::new(FlakyTransport::new(0));
        let config = NotifierConfig {
            debounce: Duration::from_millis(20),
            ..fast_config()
        };
        let notifier = Notifier::with_transport(config, Arc::clone(&transport) as Arc<dyn Transport>);

        notifier.submit(NotificationRequest::new("ODD"));
        thread::sleep(Duration::from_millis(40));
        notifier.submit(NotificationRequest::new("ODD"));
        notifier.shutdown();

        assert_eq!(transport.call_count(), 2);
    }
}
