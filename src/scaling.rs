use super::{
    config::PoolConfig,
    worker::WorkerRecord,
};
use std::sync::Arc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    Up,
    Down,
    Hold,
}

/// Одно действие за интервал: это ограничивает колебания, но и скорость реакции.
pub fn decide(backlog: usize, current: usize, min: usize, max: usize) -> ScaleDecision {
    if backlog > current && current < max {
        ScaleDecision::Up
    } else if backlog < current / 2 && current > min {
        ScaleDecision::Down
    } else {
        ScaleDecision::Hold
    }
}

/// Свободный воркер с самой старой активностью, если он простаивает дольше `idle_timeout`.
/// Занятые задачей воркеры не рассматриваются.
pub(crate) fn pick_idle<'a, I>(records: I, now: Instant, idle_timeout: Duration) -> Option<usize>
where
    I: IntoIterator<Item = &'a Arc<WorkerRecord>>,
{
    records
        .into_iter()
        .filter(|r| !r.is_busy())
        .min_by_key(|r| (r.last_used(), r.id))
        .filter(|r| r.idle_for(now) > idle_timeout)
        .map(|r| r.id)
}


/// То, чем управляет scaling manager
pub(crate) trait WorkerSet: Send + Sync + 'static {
    fn backlog(&self) -> usize;
    fn worker_count(&self) -> usize;
    fn spawn_worker(&self);
    /// Останавливает самый давно простаивающий воркер, если он старше таймаута
    fn retire_idle_worker(&self, idle_timeout: Duration) -> Option<usize>;
}

pub(crate) struct ScalingManager<S: WorkerSet> {
    workers: Arc<S>,
    config: PoolConfig,
    cancel: CancellationToken,
}

impl<S: WorkerSet> ScalingManager<S> {
    pub fn new(workers: Arc<S>, config: PoolConfig, cancel: CancellationToken) -> Self {
        Self {
            workers,
            config,
            cancel,
        }
    }

    pub async fn run(self) {
        let start = Instant::now() + self.config.scale_interval;
        let mut ticker = tokio::time::interval_at(start, self.config.scale_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.adjust();
                }
            }
        }
        debug!("scaling manager stopped");
    }

    pub fn adjust(&self) -> ScaleDecision {
        let backlog = self.workers.backlog();
        let current = self.workers.worker_count();
        let decision = decide(backlog, current, self.config.min_workers, self.config.max_workers);
        trace!(backlog, workers = current, ?decision, "scale check");

        match decision {
            ScaleDecision::Up => {
                self.workers.spawn_worker();
                debug!(backlog, workers = current + 1, "scaled up");
            }
            ScaleDecision::Down => {
                if let Some(id) = self.workers.retire_idle_worker(self.config.idle_timeout) {
                    debug!(backlog, worker = id, workers = current - 1, "scaled down");
                }
            }
            ScaleDecision::Hold => {}
        }
        decision
    }
}
