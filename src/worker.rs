use super::{
    errors::JobError,
    feed::TaskFeed,
    job::Job,
    metrics::MetricsRegistry,
    model::WorkerStats,
};
use futures::FutureExt;
use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Arc,
    },
};
use tokio::{
    sync::{mpsc, Notify},
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const IDLE: u8 = 0;
const BUSY: u8 = 1;
const RETIRED: u8 = 2;

/// Состояние одного воркера в реестре пула.
/// Счётчики пишет только сам воркер, scaling manager их только читает.
#[derive(Debug)]
pub(crate) struct WorkerRecord {
    pub id: usize,
    epoch: Instant,
    last_used_nanos: AtomicU64,
    processed: AtomicU64,
    errors: AtomicU64,
    // IDLE -> BUSY делает только воркер, IDLE -> RETIRED только scaling manager
    state: AtomicU8,
    shutdown: CancellationToken,
}

impl WorkerRecord {
    pub fn new(id: usize, epoch: Instant, shutdown: CancellationToken) -> Self {
        let record = Self {
            id,
            epoch,
            last_used_nanos: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            state: AtomicU8::new(IDLE),
            shutdown,
        };
        record.touch();
        record
    }

    #[inline]
    pub fn touch(&self) {
        let nanos = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.last_used_nanos.store(nanos, Ordering::Release);
    }

    #[inline]
    pub fn last_used(&self) -> Instant {
        self.epoch + Duration::from_nanos(self.last_used_nanos.load(Ordering::Acquire))
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used())
    }

    /// Воркер берётся за очередь. `false`, если его уже вывели из пула.
    pub fn try_begin(&self) -> bool {
        self.state
            .compare_exchange(IDLE, BUSY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn finish(&self) {
        self.state.store(IDLE, Ordering::Release);
    }

    #[inline]
    pub fn is_busy(&self) -> bool {
        self.state.load(Ordering::Acquire) == BUSY
    }

    /// Точечная остановка одного простаивающего воркера, пул продолжает работать.
    /// Занятый воркер не трогаем: `false`.
    pub fn try_retire(&self) -> bool {
        let retired = self
            .state
            .compare_exchange(IDLE, RETIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if retired {
            self.shutdown.cancel();
        }
        retired
    }

    pub fn stats(&self, now: Instant) -> WorkerStats {
        WorkerStats {
            id: self.id,
            processed: self.processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            idle_for: self.idle_for(now),
        }
    }
}


pub(crate) struct Worker {
    pub record: Arc<WorkerRecord>,
    pub feed: Arc<TaskFeed>,
    pub metrics: Arc<MetricsRegistry>,
    pub results: mpsc::Sender<JobError>,
    pub cancel: CancellationToken,
    pub all_done: Arc<Notify>,
}

impl Worker {
    pub async fn run(self) {
        // Токен воркера — дочерний от токена пула, отмена пула его тоже отменяет
        let shutdown = self.record.shutdown.clone();

        loop {
            if shutdown.is_cancelled() || !self.record.try_begin() {
                break;
            }

            match self.feed.pop() {
                Some(job) => {
                    self.execute(job).await;
                    self.record.finish();
                }
                None => {
                    self.record.finish();
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = self.feed.wait_for_job() => {}
                    }
                }
            }
        }

        // Пробуждение могло достаться нам, передаём его дальше
        if !self.feed.is_empty() {
            self.feed.wake_one();
        }
        self.metrics.worker_stopped();
        debug!(
            worker = self.record.id,
            processed = self.record.processed.load(Ordering::Relaxed),
            "worker exited"
        );
    }

    async fn execute(&self, job: Job) {
        let id = self.record.id;
        self.metrics.job_started();
        self.record.touch();

        let started = Instant::now();
        let token = self.cancel.clone();
        let outcome = AssertUnwindSafe(async move { job(token).await })
            .catch_unwind()
            .await;
        let elapsed = started.elapsed();

        self.record.touch();
        self.record.processed.fetch_add(1, Ordering::Relaxed);

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(source)) => Some(JobError::Failed { worker: id, source }),
            Err(panic) => Some(JobError::Panicked {
                worker: id,
                message: panic_message(panic.as_ref()),
            }),
        };

        let ok = failure.is_none();
        if let Some(err) = failure {
            self.record.errors.fetch_add(1, Ordering::Relaxed);
            debug!(worker = id, error = %err, "job failed");
            // Ждущая отправка: если результаты никто не читает, воркер встанет здесь
            if self.results.send(err).await.is_err() {
                warn!(worker = id, "result feed closed, job error discarded");
            }
        }

        self.metrics.job_finished(ok, elapsed);
        if self.metrics.is_idle() {
            self.all_done.notify_waiters();
        }
    }
}


fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in job".into()
    }
}
