use std::sync::Arc;
use std::time::Duration;

use lesson_core::model::ProgressRecord;
use storage::repository::ProgressStore;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Extra attempts the worker makes after a failed write before waiting for
/// the next flush request.
const MAX_RETRIES: u32 = 3;

/// Outcome counters published by the write worker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct WriteAck {
    /// Position of the most recent successful write.
    pub persisted_seconds: Option<f64>,
    pub writes: u64,
    pub failures: u64,
}

/// A staged record and its place in staging order.
#[derive(Debug, Clone)]
struct Staged {
    seq: u64,
    record: ProgressRecord,
}

/// Ordered, debounced progress persistence for a single lesson view.
///
/// The queue carries flush requests, not records. One worker drains it and
/// writes whatever snapshot is staged at that moment, skipping snapshots it
/// already stored, so a write can never land an older snapshot after a newer
/// one. A failed write is retried with the freshest snapshot.
pub(crate) struct ProgressWriter {
    queue: Option<mpsc::UnboundedSender<()>>,
    latest: watch::Sender<Option<Staged>>,
    acks: watch::Receiver<WriteAck>,
    seen_failures: u64,
    debounce: Duration,
    timer: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl ProgressWriter {
    pub(crate) fn new(store: Arc<dyn ProgressStore>, debounce: Duration) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let (ack_tx, acks) = watch::channel(WriteAck::default());
        let (latest, staged) = watch::channel(None);
        let worker = tokio::spawn(run_writer(store, rx, staged, ack_tx, debounce));
        Self {
            queue: Some(queue),
            latest,
            acks,
            seen_failures: 0,
            debounce,
            timer: None,
            worker: Some(worker),
        }
    }

    /// Replace the snapshot the next flush will write.
    pub(crate) fn stage(&self, record: ProgressRecord) {
        self.latest.send_modify(|slot| {
            let seq = slot.as_ref().map_or(1, |staged| staged.seq + 1);
            *slot = Some(Staged { seq, record });
        });
    }

    #[must_use]
    pub(crate) fn is_scheduled(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    /// Arm the debounce timer. Returns `false` when one is already pending; the
    /// pending timer will pick up the freshest staged snapshot.
    pub(crate) fn schedule(&mut self) -> bool {
        if self.is_scheduled() {
            return false;
        }
        let Some(queue) = self.queue.clone() else {
            return false;
        };
        let debounce = self.debounce;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if queue.send(()).is_err() {
                tracing::warn!("progress writer stopped; dropping debounced write");
            }
        }));
        true
    }

    /// Cancel any pending timer, stage `record` and request a write right away.
    pub(crate) fn persist_now(&mut self, record: ProgressRecord) {
        self.cancel();
        self.stage(record);
        let sent = self
            .queue
            .as_ref()
            .is_some_and(|queue| queue.send(()).is_ok());
        if !sent {
            tracing::warn!("progress writer stopped; dropping record");
        }
    }

    /// Returns `true` once for every batch of failed writes since the last call.
    pub(crate) fn take_failure(&mut self) -> bool {
        let failures = self.acks.borrow().failures;
        if failures > self.seen_failures {
            self.seen_failures = failures;
            return true;
        }
        false
    }

    #[must_use]
    pub(crate) fn last_persisted(&self) -> Option<f64> {
        self.acks.borrow().persisted_seconds
    }

    #[must_use]
    pub(crate) fn ack(&self) -> WriteAck {
        *self.acks.borrow()
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Cancel the timer and wait until every queued write has been attempted.
    pub(crate) async fn shutdown(mut self) -> WriteAck {
        self.cancel();
        self.queue = None;
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                tracing::warn!(error = %err, "progress writer task ended abnormally");
            }
        }
        self.ack()
    }
}

impl Drop for ProgressWriter {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_writer(
    store: Arc<dyn ProgressStore>,
    mut rx: mpsc::UnboundedReceiver<()>,
    staged: watch::Receiver<Option<Staged>>,
    acks: watch::Sender<WriteAck>,
    retry_delay: Duration,
) {
    let mut stored_seq = 0;
    while rx.recv().await.is_some() {
        let mut retries = 0;
        loop {
            let Some(Staged { seq, record }) = staged.borrow().clone() else {
                break;
            };
            if seq <= stored_seq {
                break;
            }
            match store.upsert_progress(&record).await {
                Ok(()) => {
                    tracing::debug!(
                        lesson_id = %record.lesson_id,
                        seconds = record.current_time_seconds,
                        percentage = record.progress_percentage,
                        completed = record.completed,
                        "progress persisted"
                    );
                    stored_seq = seq;
                    acks.send_modify(|ack| {
                        ack.persisted_seconds = Some(record.current_time_seconds);
                        ack.writes += 1;
                    });
                    break;
                }
                Err(err) => {
                    acks.send_modify(|ack| ack.failures += 1);
                    if retries == MAX_RETRIES {
                        tracing::warn!(
                            lesson_id = %record.lesson_id,
                            seconds = record.current_time_seconds,
                            error = %err,
                            "progress write failed; giving up until the next interval"
                        );
                        break;
                    }
                    retries += 1;
                    tracing::warn!(
                        lesson_id = %record.lesson_id,
                        seconds = record.current_time_seconds,
                        error = %err,
                        retry = retries,
                        "progress write failed; retrying"
                    );
                    tokio::time::sleep(retry_delay * retries).await;
                }
            }
        }
    }
}
