use super::model::MetricsSnapshot;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::time::Duration;


/// Lock-free счётчики пула. Среднее время хранится в наносекундах.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    active_workers: AtomicUsize,
    running_jobs: AtomicUsize,
    queued_jobs: AtomicUsize,
    total_submitted: AtomicUsize,
    completed_jobs: AtomicUsize,
    failed_jobs: AtomicUsize,
    dropped_jobs: AtomicUsize,
    samples: AtomicU64,
    avg_process_nanos: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn job_queued(&self) {
        self.total_submitted.fetch_add(1, Ordering::Relaxed);
        self.queued_jobs.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn job_started(&self) {
        // running растёт раньше, чем падает queued: пул не выглядит пустым в промежутке
        self.running_jobs.fetch_add(1, Ordering::SeqCst);
        self.queued_jobs.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn job_finished(&self, ok: bool, elapsed: Duration) {
        if ok {
            self.completed_jobs.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_jobs.fetch_add(1, Ordering::Relaxed);
        }
        self.record_process_time(elapsed);
        self.running_jobs.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn jobs_dropped(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.queued_jobs.fetch_sub(count, Ordering::SeqCst);
        self.dropped_jobs.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn worker_stopped(&self) {
        self.active_workers.fetch_sub(1, Ordering::Relaxed);
    }

    /// new_avg = (avg * n + sample) / (n + 1), retried until the CAS wins
    pub fn record_process_time(&self, elapsed: Duration) {
        let sample = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX) as u128;
        let mut current = self.avg_process_nanos.load(Ordering::Acquire);
        loop {
            let n = self.samples.load(Ordering::Acquire) as u128;
            let next = ((current as u128 * n + sample) / (n + 1)) as u64;
            match self.avg_process_nanos.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.samples.fetch_add(1, Ordering::AcqRel);
                    break;
                }
                Err(actual) => current = actual,
            }
        }
    }

    #[inline]
    pub fn avg_process_time(&self) -> Duration {
        Duration::from_nanos(self.avg_process_nanos.load(Ordering::Acquire))
    }

    /// Нет ни ожидающих, ни выполняющихся задач
    pub fn is_idle(&self) -> bool {
        self.queued_jobs.load(Ordering::SeqCst) == 0 && self.running_jobs.load(Ordering::SeqCst) == 0
    }

    #[inline]
    pub fn queued(&self) -> usize {
        self.queued_jobs.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_workers: self.active_workers.load(Ordering::Relaxed),
            running_jobs: self.running_jobs.load(Ordering::Relaxed),
            queued_jobs: self.queued_jobs.load(Ordering::Relaxed),
            total_submitted: self.total_submitted.load(Ordering::Relaxed),
            completed_jobs: self.completed_jobs.load(Ordering::Relaxed),
            failed_jobs: self.failed_jobs.load(Ordering::Relaxed),
            dropped_jobs: self.dropped_jobs.load(Ordering::Relaxed),
            avg_process_time: self.avg_process_time(),
        }
    }
}
