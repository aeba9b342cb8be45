//! Bounded fan-out of transfer batches.
//!
//! The scheduler owns one long-lived pool of worker threads. Every batch is
//! submitted to that pool in full and `run` blocks until each task in it has
//! reported back, so a slow or failing transfer only ever occupies its own
//! worker slot.

use crate::error::{SyncError, SyncResult};
use crate::store::BlobStore;
use crate::transfer::{TransferDirection, TransferExecutor, TransferTask};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A set of independent transfer tasks submitted together.
#[derive(Debug, Clone, Default)]
pub struct TransferBatch {
    tasks: Vec<TransferTask>,
}

impl TransferBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task.
    pub fn push(&mut self, task: TransferTask) {
        self.tasks.push(task);
    }

    /// Returns the tasks in submission order.
    pub fn tasks(&self) -> &[TransferTask] {
        &self.tasks
    }

    /// Returns the number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if the batch has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl FromIterator<TransferTask> for TransferBatch {
    fn from_iter<I: IntoIterator<Item = TransferTask>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

impl Extend<TransferTask> for TransferBatch {
    fn extend<I: IntoIterator<Item = TransferTask>>(&mut self, iter: I) {
        self.tasks.extend(iter);
    }
}

/// Reduced result of a batch.
///
/// A batch succeeds iff every task succeeded. Tasks that succeeded are never
/// rolled back when a sibling fails.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Number of tasks submitted.
    pub total: usize,
    /// Successful uploads.
    pub uploaded: usize,
    /// Successful downloads.
    pub downloaded: usize,
    /// Remote keys of the tasks that failed.
    pub failed: Vec<String>,
    /// Wall-clock duration of the batch.
    pub duration: Duration,
}

impl BatchOutcome {
    /// Returns true if every task in the batch succeeded.
    pub fn success(&self) -> bool {
        self.failed.is_empty() && self.uploaded + self.downloaded == self.total
    }

    /// Number of successful tasks.
    pub fn succeeded(&self) -> usize {
        self.uploaded + self.downloaded
    }

    /// Folds another outcome into this one.
    pub fn merge(&mut self, other: BatchOutcome) {
        self.total += other.total;
        self.uploaded += other.uploaded;
        self.downloaded += other.downloaded;
        self.failed.extend(other.failed);
        self.duration += other.duration;
    }

    /// Counts work that never reached the pool as one failed task.
    pub fn record_skipped(&mut self, label: impl Into<String>) {
        self.total += 1;
        self.failed.push(label.into());
    }

    fn record(&mut self, task: &TransferTask, success: bool) {
        match (success, task.direction()) {
            (true, TransferDirection::Upload) => self.uploaded += 1,
            (true, TransferDirection::Download) => self.downloaded += 1,
            (false, _) => self.failed.push(task.remote_key().to_string()),
        }
    }
}

/// Runs transfer batches on a fixed-size worker pool.
pub struct TransferScheduler {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl TransferScheduler {
    /// Starts a pool of `workers` threads (at least one).
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn new(workers: usize) -> SyncResult<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let count = workers.max(1);
        let mut handles = Vec::with_capacity(count);
        for id in 0..count {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("barkeep-transfer-{id}"))
                .spawn(move || worker_loop(&receiver))
                .map_err(SyncError::Io)?;
            handles.push(handle);
        }
        debug!(workers = count, "transfer pool started");

        Ok(Self {
            sender: Some(sender),
            workers: handles,
        })
    }

    /// Returns the number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Executes every task of `batch` and waits for all of them.
    ///
    /// Completion order is unspecified. A task that panics counts as a
    /// failure and does not take its worker down.
    pub fn run<S>(&self, executor: &TransferExecutor<S>, batch: TransferBatch) -> BatchOutcome
    where
        S: BlobStore + 'static,
    {
        let start = Instant::now();
        let mut outcome = BatchOutcome {
            total: batch.len(),
            ..BatchOutcome::default()
        };
        if batch.is_empty() {
            return outcome;
        }

        let (report_tx, report_rx) = mpsc::channel::<(TransferTask, bool)>();
        let mut submitted = 0usize;

        for task in batch.tasks {
            let executor = executor.clone();
            let report_tx = report_tx.clone();
            let job: Job = Box::new(move || {
                let success = panic::catch_unwind(AssertUnwindSafe(|| executor.execute(&task)))
                    .unwrap_or_else(|_| {
                        error!(key = task.remote_key(), "transfer task panicked");
                        false
                    });
                let _ = report_tx.send((task, success));
            });

            match &self.sender {
                Some(sender) => match sender.send(job) {
                    Ok(()) => submitted += 1,
                    Err(_) => warn!("transfer pool is shut down; task dropped"),
                },
                None => warn!("transfer pool is shut down; task dropped"),
            }
        }
        drop(report_tx);

        let mut received = 0usize;
        for (task, success) in report_rx {
            outcome.record(&task, success);
            received += 1;
        }
        if received < outcome.total {
            // Tasks that never reported (rejected by a closed pool).
            let missing = outcome.total - received;
            outcome
                .failed
                .extend(std::iter::repeat("<unscheduled>".to_string()).take(missing));
        }

        outcome.duration = start.elapsed();
        info!(
            total = outcome.total,
            submitted,
            uploaded = outcome.uploaded,
            downloaded = outcome.downloaded,
            failed = outcome.failed.len(),
            "transfer batch finished"
        );
        outcome
    }
}

impl Drop for TransferScheduler {
    fn drop(&mut self) {
        // Closing the channel lets idle workers exit.
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(receiver: &Mutex<mpsc::Receiver<Job>>) {
    loop {
        let job = receiver.lock().recv();
        match job {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Store that records peak concurrency and sleeps on every upload.
    #[derive(Default)]
    struct SlowStore {
        active: AtomicUsize,
        peak: AtomicUsize,
        fail_key: Option<String>,
        panic_key: Option<String>,
    }

    impl BlobStore for SlowStore {
        fn list(&self, _prefix: &str, _max: Option<u32>) -> SyncResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn download(&self, key: &str) -> SyncResult<Vec<u8>> {
            Err(SyncError::NotFound(key.to_string()))
        }

        fn upload(&self, key: &str, _data: Vec<u8>) -> SyncResult<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.panic_key.as_deref() == Some(key) {
                panic!("boom");
            }
            if self.fail_key.as_deref() == Some(key) {
                return Err(SyncError::store_retryable("nope"));
            }
            Ok(())
        }
    }

    fn upload_batch(dir: &std::path::Path, n: usize) -> TransferBatch {
        (0..n)
            .map(|i| {
                let path = dir.join(format!("{i}.png"));
                std::fs::write(&path, b"x").unwrap();
                TransferTask::upload(path, format!("img/{i}.png"))
            })
            .collect()
    }

    #[test]
    fn empty_batch_succeeds() {
        let scheduler = TransferScheduler::new(2).unwrap();
        let executor = TransferExecutor::new(Arc::new(SlowStore::default()));
        let outcome = scheduler.run(&executor, TransferBatch::new());
        assert!(outcome.success());
        assert_eq!(outcome.total, 0);
    }

    #[test]
    fn concurrency_is_bounded_by_pool_size() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SlowStore::default());
        let scheduler = TransferScheduler::new(3).unwrap();
        let executor = TransferExecutor::new(Arc::clone(&store));

        let outcome = scheduler.run(&executor, upload_batch(dir.path(), 12));
        assert!(outcome.success());
        assert_eq!(outcome.uploaded, 12);

        let peak = store.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak} exceeded pool size");
        assert!(peak >= 2, "tasks did not run concurrently");
    }

    #[test]
    fn one_failure_fails_batch_without_blocking_others() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SlowStore {
            fail_key: Some("img/2.png".into()),
            ..SlowStore::default()
        });
        let scheduler = TransferScheduler::new(4).unwrap();
        let executor = TransferExecutor::new(store);

        let outcome = scheduler.run(&executor, upload_batch(dir.path(), 6));
        assert!(!outcome.success());
        assert_eq!(outcome.uploaded, 5);
        assert_eq!(outcome.failed, vec!["img/2.png".to_string()]);
    }

    #[test]
    fn panicking_task_counts_as_failure_and_pool_survives() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SlowStore {
            panic_key: Some("img/0.png".into()),
            ..SlowStore::default()
        });
        let scheduler = TransferScheduler::new(1).unwrap();
        let executor = TransferExecutor::new(store);

        let outcome = scheduler.run(&executor, upload_batch(dir.path(), 3));
        assert_eq!(outcome.failed, vec!["img/0.png".to_string()]);
        assert_eq!(outcome.uploaded, 2);

        // Same pool is reused for the next batch.
        let outcome = scheduler.run(&executor, upload_batch(dir.path(), 1));
        assert!(!outcome.success());
        assert_eq!(scheduler.workers(), 1);
    }

    #[test]
    fn outcome_merge() {
        let mut a = BatchOutcome {
            total: 2,
            uploaded: 2,
            ..BatchOutcome::default()
        };
        let b = BatchOutcome {
            total: 1,
            failed: vec!["img/x.png".into()],
            ..BatchOutcome::default()
        };
        assert!(a.success());
        a.merge(b);
        assert_eq!(a.total, 3);
        assert_eq!(a.succeeded(), 2);
        assert!(!a.success());
    }

    #[test]
    fn skipped_work_fails_the_outcome() {
        let mut outcome = BatchOutcome::default();
        assert!(outcome.success());
        outcome.record_skipped("img/");
        assert_eq!(outcome.total, 1);
        assert_eq!(outcome.failed, vec!["img/".to_string()]);
        assert!(!outcome.success());
    }
}
