use futures::stream::{BoxStream, StreamExt};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};

use crate::blockchain::deposit_processor::{DepositProcessor, ProcessOutcome};
use crate::blockchain::event_source::EventSource;
use crate::database::DepositStore;
use crate::error::MonitorError;
use crate::logging::{ErrorLogger, LogContext};
use crate::models::LogMatch;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Idle,
    Subscribed,
    Processing,
    Stopped,
}

impl MonitorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => MonitorState::Idle,
            1 => MonitorState::Subscribed,
            2 => MonitorState::Processing,
            _ => MonitorState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            MonitorState::Idle => 0,
            MonitorState::Subscribed => 1,
            MonitorState::Processing => 2,
            MonitorState::Stopped => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub in_flight: usize,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    shutdown: watch::Sender<bool>,
    in_flight: AtomicUsize,
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            state: AtomicU8::new(MonitorState::Idle.as_u8()),
            shutdown,
            in_flight: AtomicUsize::new(0),
            processed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    fn is_shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn set_state(&self, state: MonitorState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn task_started(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.set_state(MonitorState::Processing);
    }

    fn task_finished(&self, success: bool) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        if success {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        if remaining == 0 && !self.is_shutdown_requested() {
            self.set_state(MonitorState::Subscribed);
        }
    }
}

/// Cloneable control handle for a running monitor
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    shared: Arc<Shared>,
}

impl MonitorHandle {
    /// Request graceful shutdown
    pub fn shutdown(&self) {
        info!("Requesting graceful shutdown");
        self.shared.shutdown.send_replace(true);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shared.is_shutdown_requested()
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            state: MonitorState::from_u8(self.shared.state.load(Ordering::SeqCst)),
            in_flight: self.shared.in_flight.load(Ordering::SeqCst),
            processed: self.shared.processed.load(Ordering::SeqCst),
            succeeded: self.shared.succeeded.load(Ordering::SeqCst),
            failed: self.shared.failed.load(Ordering::SeqCst),
        }
    }

    /// Resolves once shutdown has been requested
    pub async fn wait_for_shutdown(&self) {
        let mut receiver = self.shared.shutdown.subscribe();
        // the sender lives in `shared`, so this only returns once the flag is set
        let _ = receiver.wait_for(|requested| *requested).await;
    }
}

/// Subscribes to deposit events and processes each match concurrently
pub struct DepositMonitor {
    source: Arc<dyn EventSource>,
    processor: Arc<DepositProcessor>,
    store: Arc<dyn DepositStore>,
    max_in_flight: usize,
    shared: Arc<Shared>,
}

impl DepositMonitor {
    pub fn new(
        source: Arc<dyn EventSource>,
        processor: DepositProcessor,
        store: Arc<dyn DepositStore>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            source,
            processor: Arc::new(processor),
            store,
            max_in_flight: max_in_flight.max(1),
            shared: Arc::new(Shared::new()),
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn status(&self) -> MonitorStatus {
        self.handle().status()
    }

    /// Run until shutdown is requested or the subscription ends.
    ///
    /// Returns `Ok(())` after a requested shutdown, `Subscription` if the
    /// initial subscription fails and `SubscriptionClosed` if the stream ends.
    pub async fn run(&self) -> Result<(), MonitorError> {
        info!("Starting deposit monitor with at most {} transactions in flight", self.max_in_flight);

        let mut stream = match self.source.subscribe().await {
            Ok(stream) => stream,
            Err(e) => {
                ErrorLogger::log_error(&e, Some(LogContext::new("monitor", "subscribe")));
                self.shared.set_state(MonitorState::Stopped);
                self.close_store().await;
                return Err(e);
            }
        };
        self.shared.set_state(MonitorState::Subscribed);

        let mut shutdown = self.shared.shutdown.subscribe();
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks: JoinSet<ProcessOutcome> = JoinSet::new();

        let outcome = loop {
            if self.shared.is_shutdown_requested() {
                info!("Shutdown signal received, stopping deposit monitor");
                break Ok(());
            }

            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    // re-checked at the top of the loop
                }

                Some(joined) = tasks.join_next() => {
                    self.on_task_finished(joined);
                }

                (permit, next) = next_match(&semaphore, &mut stream) => match next {
                    Some(log_match) => self.spawn_processing(&mut tasks, log_match, permit),
                    None => {
                        error!("Deposit event subscription ended unexpectedly");
                        break Err(MonitorError::SubscriptionClosed);
                    }
                },
            }
        };

        // dropping the stream unsubscribes
        drop(stream);

        if !tasks.is_empty() {
            info!("Waiting for {} in-flight transactions", tasks.len());
        }
        while let Some(joined) = tasks.join_next().await {
            self.on_task_finished(joined);
        }

        self.close_store().await;
        self.shared.set_state(MonitorState::Stopped);

        let status = self.status();
        info!(
            "Deposit monitor stopped: {} processed, {} succeeded, {} failed",
            status.processed, status.succeeded, status.failed
        );

        outcome
    }

    fn spawn_processing(
        &self,
        tasks: &mut JoinSet<ProcessOutcome>,
        log_match: LogMatch,
        permit: Option<OwnedSemaphorePermit>,
    ) {
        debug!("Deposit event in transaction {}", log_match.transaction_hash);

        let processor = Arc::clone(&self.processor);
        self.shared.task_started();
        tasks.spawn(async move {
            let _permit = permit;
            processor.process_transaction(&log_match.transaction_hash).await
        });
    }

    fn on_task_finished(&self, joined: Result<ProcessOutcome, JoinError>) {
        match joined {
            Ok(outcome) => self.shared.task_finished(outcome.is_success()),
            Err(e) => {
                error!("Deposit processing task failed: {}", e);
                self.shared.task_finished(false);
            }
        }
    }

    async fn close_store(&self) {
        match self.store.close().await {
            Ok(()) => info!("Deposit store closed"),
            Err(e) => warn!("Failed to close deposit store: {}", e),
        }
    }
}

/// Wait for a free processing slot, then for the next match
async fn next_match(
    semaphore: &Arc<Semaphore>,
    stream: &mut BoxStream<'_, LogMatch>,
) -> (Option<OwnedSemaphorePermit>, Option<LogMatch>) {
    let permit = Arc::clone(semaphore).acquire_owned().await.ok();
    let next = stream.next().await;
    (permit, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> Arc<Shared> {
        Arc::new(Shared::new())
    }

    #[test]
    fn test_state_round_trip() {
        for state in [
            MonitorState::Idle,
            MonitorState::Subscribed,
            MonitorState::Processing,
            MonitorState::Stopped,
        ] {
            assert_eq!(MonitorState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_task_counters() {
        let handle = MonitorHandle { shared: shared() };

        handle.shared.task_started();
        handle.shared.task_started();
        assert_eq!(handle.status().state, MonitorState::Processing);
        assert_eq!(handle.status().in_flight, 2);

        handle.shared.task_finished(true);
        assert_eq!(handle.status().state, MonitorState::Processing);

        handle.shared.task_finished(false);
        let status = handle.status();
        assert_eq!(status.state, MonitorState::Subscribed);
        assert_eq!(status.in_flight, 0);
        assert_eq!(status.processed, 2);
        assert_eq!(status.succeeded, 1);
        assert_eq!(status.failed, 1);
    }

    #[test]
    fn test_shutdown_signal() {
        let handle = MonitorHandle { shared: shared() };
        let clone = handle.clone();

        assert!(!handle.is_shutdown_requested());
        clone.shutdown();
        assert!(handle.is_shutdown_requested());
    }

    #[tokio::test]
    async fn test_wait_for_shutdown() {
        let handle = MonitorHandle { shared: shared() };
        let waiter = handle.clone();

        let task = tokio::spawn(async move { waiter.wait_for_shutdown().await });
        handle.shutdown();

        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .expect("waiter should finish")
            .unwrap();
    }

    #[test]
    fn test_status_serializes_lowercase_state() {
        let status = MonitorStatus {
            state: MonitorState::Subscribed,
            in_flight: 0,
            processed: 3,
            succeeded: 2,
            failed: 1,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "subscribed");
        assert_eq!(json["processed"], 3);
    }
}
