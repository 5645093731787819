use tokio::time::Duration;


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub active_workers: usize,
    pub running_jobs: usize,
    pub queued_jobs: usize,
    pub total_submitted: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    pub dropped_jobs: usize,
    pub avg_process_time: Duration,
}

impl MetricsSnapshot {
    pub fn utilization(&self) -> f64 {
        if self.active_workers == 0 {
            return 0.0;
        }
        self.running_jobs as f64 / self.active_workers as f64
    }

    pub fn queue_pressure(&self) -> f64 {
        self.queued_jobs as f64
    }

    pub fn finished(&self) -> usize {
        self.completed_jobs + self.failed_jobs
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.finished();
        if total == 0 {
            return 1.0;
        }
        self.completed_jobs as f64 / total as f64
    }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub id: usize,
    pub processed: u64,
    pub errors: u64,
    pub idle_for: Duration,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownMode {
    /// Дождаться только выполняющихся задач, очередь отбрасывается
    #[default]
    Drop,
    /// Выполнить всё принятое до остановки
    Drain,
}
