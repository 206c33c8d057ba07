//! Retry queue for order records that failed to persist after a payment
//! was verified. The payment stands either way; this only makes sure the
//! record eventually lands or is logged loudly for manual reconciliation.

use crate::metrics::PENDING_ORDER_RECORDS;
use crate::models::OrderRecord;
use crate::repositories::OrderRecordRepository;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt once `attempts` have failed.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempts.saturating_sub(1));
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone)]
struct PendingOrder {
    record: OrderRecord,
    attempts: u32,
    next_attempt_at: Instant,
}

impl PendingOrder {
    fn is_for(&self, order_id: &str, payment_id: &str) -> bool {
        self.record.order_id == order_id && self.record.payment_id == payment_id
    }
}

/// Result of [`PendingOrderQueue::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// The payment was already waiting; carries the record queued first.
    AlreadyQueued(OrderRecord),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub stored: usize,
    pub retrying: usize,
    pub abandoned: usize,
}

#[derive(Debug)]
pub struct PendingOrderQueue {
    entries: Mutex<VecDeque<PendingOrder>>,
    policy: RetryPolicy,
}

impl Default for PendingOrderQueue {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl PendingOrderQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            policy,
        }
    }

    /// Queues a record whose first insert already failed. At most one entry
    /// is kept per `(order_id, payment_id)`.
    pub async fn push(&self, record: OrderRecord) -> Enqueued {
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries
            .iter()
            .find(|entry| entry.is_for(&record.order_id, &record.payment_id))
        {
            return Enqueued::AlreadyQueued(existing.record.clone());
        }

        entries.push_back(PendingOrder {
            next_attempt_at: Instant::now() + self.policy.backoff(1),
            record,
            attempts: 1,
        });
        PENDING_ORDER_RECORDS.set(entries.len() as i64);
        Enqueued::Queued
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Retries every entry that is due at `now`.
    pub async fn drain_once(
        &self,
        repo: &dyn OrderRecordRepository,
        now: Instant,
    ) -> DrainReport {
        let due: Vec<PendingOrder> = {
            let mut entries = self.entries.lock().await;
            let (due, waiting): (VecDeque<_>, VecDeque<_>) = entries
                .drain(..)
                .partition(|entry| entry.next_attempt_at <= now);
            *entries = waiting;
            due.into_iter().collect()
        };

        let mut report = DrainReport::default();
        let mut retry = Vec::new();

        for mut entry in due {
            match repo.insert_if_absent(entry.record.clone()).await {
                Ok(outcome) => {
                    info!(
                        order_id = %entry.record.order_id,
                        payment_id = %entry.record.payment_id,
                        attempts = entry.attempts + 1,
                        inserted = outcome.was_inserted(),
                        "pending order record stored"
                    );
                    report.stored += 1;
                }
                Err(e) => {
                    entry.attempts += 1;
                    if entry.attempts >= self.policy.max_attempts {
                        let snapshot = serde_json::to_string(&entry.record).unwrap_or_default();
                        error!(
                            order_id = %entry.record.order_id,
                            payment_id = %entry.record.payment_id,
                            attempts = entry.attempts,
                            record = %snapshot,
                            "giving up on order record, manual reconciliation required: {}",
                            e
                        );
                        report.abandoned += 1;
                    } else {
                        warn!(
                            order_id = %entry.record.order_id,
                            attempts = entry.attempts,
                            "order record still not stored: {}",
                            e
                        );
                        entry.next_attempt_at = now + self.policy.backoff(entry.attempts);
                        retry.push(entry);
                        report.retrying += 1;
                    }
                }
            }
        }

        let mut entries = self.entries.lock().await;
        for entry in retry {
            let key = (&entry.record.order_id, &entry.record.payment_id);
            if !entries.iter().any(|queued| queued.is_for(key.0, key.1)) {
                entries.push_back(entry);
            }
        }
        PENDING_ORDER_RECORDS.set(entries.len() as i64);
        report
    }
}

/// Polls the queue until the runtime shuts down.
pub fn start_worker(
    queue: Arc<PendingOrderQueue>,
    repo: Arc<dyn OrderRecordRepository>,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(poll_interval).await;
            if queue.is_empty().await {
                continue;
            }
            let report = queue.drain_once(repo.as_ref(), Instant::now()).await;
            if report != DrainReport::default() {
                info!(
                    stored = report.stored,
                    retrying = report.retrying,
                    abandoned = report.abandoned,
                    "pending order records drained"
                );
            }
        }
    })
}
