//! Queue-backed calculation dispatcher.
//!
//! `submit` enqueues on a bounded mpsc channel. A worker task drains the
//! queue and delivers each request in its own task, retrying up to
//! `max_attempts` with exponential backoff. Requests that exhaust their
//! attempts are logged and kept in a bounded dead-letter list.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::{CalculationRequest, CalculationSink, CalculatorClient};

/// Dispatcher tuning.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub queue_capacity: usize,
    /// Total delivery attempts per request, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further attempt.
    pub backoff: Duration,
    pub dead_letter_capacity: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_attempts: 1,
            backoff: Duration::from_secs(2),
            dead_letter_capacity: 100,
        }
    }
}

/// A request whose every delivery attempt failed.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub request: CalculationRequest,
    pub attempts: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

type DeadLetters = Arc<Mutex<VecDeque<DeadLetter>>>;

/// Handle to the background delivery worker.
#[derive(Clone)]
pub struct CalculationDispatcher {
    tx: mpsc::Sender<CalculationRequest>,
    dead_letters: DeadLetters,
}

impl CalculationDispatcher {
    /// Start the worker on the current runtime.
    pub fn spawn(client: Arc<dyn CalculatorClient>, settings: DispatcherSettings) -> Self {
        let (tx, mut rx) = mpsc::channel::<CalculationRequest>(settings.queue_capacity.max(1));
        let dead_letters: DeadLetters = Arc::new(Mutex::new(VecDeque::new()));

        let worker_dead_letters = Arc::clone(&dead_letters);
        tokio::spawn(async move {
            info!(
                max_attempts = settings.max_attempts,
                queue_capacity = settings.queue_capacity,
                "calculation dispatcher started"
            );
            while let Some(request) = rx.recv().await {
                tokio::spawn(deliver(
                    Arc::clone(&client),
                    request,
                    settings.clone(),
                    Arc::clone(&worker_dead_letters),
                ));
            }
            debug!("calculation dispatcher stopped");
        });

        Self { tx, dead_letters }
    }
}

impl CalculationSink for CalculationDispatcher {
    fn submit(&self, request: CalculationRequest) {
        match self.tx.try_send(request) {
            Ok(()) => debug!(
                composition_id = request.composition_id,
                "calculation request queued"
            ),
            Err(mpsc::error::TrySendError::Full(_)) => warn!(
                composition_id = request.composition_id,
                "calculation queue full, request dropped"
            ),
            Err(mpsc::error::TrySendError::Closed(_)) => error!(
                composition_id = request.composition_id,
                "calculation dispatcher stopped, request dropped"
            ),
        }
    }

    fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

async fn deliver(
    client: Arc<dyn CalculatorClient>,
    request: CalculationRequest,
    settings: DispatcherSettings,
    dead_letters: DeadLetters,
) {
    let max_attempts = settings.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 0..max_attempts {
        match client.notify(&request).await {
            Ok(()) => {
                info!(
                    composition_id = request.composition_id,
                    attempt = attempt + 1,
                    "calculator notified"
                );
                return;
            }
            Err(e) => {
                warn!(
                    composition_id = request.composition_id,
                    attempt = attempt + 1,
                    error = %e,
                    "calculator notification failed"
                );
                last_error = e.to_string();
            }
        }

        if attempt + 1 < max_attempts {
            sleep(settings.backoff * 2u32.saturating_pow(attempt)).await;
        }
    }

    error!(
        composition_id = request.composition_id,
        attempts = max_attempts,
        error = %last_error,
        "calculation request dead-lettered"
    );
    let mut letters = dead_letters.lock().unwrap_or_else(PoisonError::into_inner);
    if letters.len() >= settings.dead_letter_capacity.max(1) {
        letters.pop_front();
    }
    letters.push_back(DeadLetter {
        request,
        attempts: max_attempts,
        error: last_error,
        failed_at: Utc::now(),
    });
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::calculator::CalculatorError;

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyClient {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyClient {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CalculatorClient for FlakyClient {
        async fn notify(&self, _request: &CalculationRequest) -> Result<(), CalculatorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(CalculatorError::Status(503))
            } else {
                Ok(())
            }
        }
    }

    async fn settle() {
        sleep(Duration::from_secs(600)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn default_makes_a_single_attempt() {
        let client = FlakyClient::new(u32::MAX);
        let dispatcher = CalculationDispatcher::spawn(client.clone(), DispatcherSettings::default());
        dispatcher.submit(CalculationRequest { composition_id: 7 });
        settle().await;

        assert_eq!(client.calls(), 1);
        let letters = dispatcher.dead_letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].request.composition_id, 7);
        assert_eq!(letters[0].attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let client = FlakyClient::new(2);
        let settings = DispatcherSettings {
            max_attempts: 3,
            ..Default::default()
        };
        let dispatcher = CalculationDispatcher::spawn(client.clone(), settings);
        dispatcher.submit(CalculationRequest { composition_id: 1 });
        settle().await;

        assert_eq!(client.calls(), 3);
        assert!(dispatcher.dead_letters().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dead_letters_are_bounded() {
        let client = FlakyClient::new(u32::MAX);
        let settings = DispatcherSettings {
            dead_letter_capacity: 2,
            ..Default::default()
        };
        let dispatcher = CalculationDispatcher::spawn(client.clone(), settings);
        for id in 1..=3 {
            dispatcher.submit(CalculationRequest { composition_id: id });
        }
        settle().await;

        let letters = dispatcher.dead_letters();
        assert_eq!(letters.len(), 2);
        assert!(letters.iter().all(|l| l.request.composition_id != 1));
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_drops_instead_of_blocking() {
        let client = FlakyClient::new(0);
        let settings = DispatcherSettings {
            queue_capacity: 1,
            ..Default::default()
        };
        let dispatcher = CalculationDispatcher::spawn(client.clone(), settings);
        dispatcher.submit(CalculationRequest { composition_id: 1 });
        dispatcher.submit(CalculationRequest { composition_id: 2 });
        settle().await;

        assert_eq!(client.calls(), 1);
    }
}
