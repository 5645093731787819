use super::{
    config::PoolConfig,
    errors::{BoxError, ConfigError, JobError, SubmitError},
    feed::TaskFeed,
    handle::Results,
    job::{self, Job, JobResult, PriorityEntry},
    metrics::MetricsRegistry,
    model::{MetricsSnapshot, ShutdownMode, WorkerStats},
    priority::PriorityCoordinator,
    scaling::{self, ScalingManager, WorkerSet},
    worker::{Worker, WorkerRecord},
};
use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{fence, AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};
use tokio::{
    sync::{mpsc, oneshot, Notify},
    time::{Duration, Instant},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, warn};


pub type Pool = Arc<PoolInner>;

type Registry = HashMap<usize, Arc<WorkerRecord>>;

/// Самомасштабируемый пул: ограниченная очередь задач, приоритетная куча
/// и набор воркеров, число которых держится в `[min_workers, max_workers]`.
///
/// Фоновые задачи держат `Arc` на пул до вызова `stop()`.
pub struct PoolInner {
    config: PoolConfig,
    epoch: Instant,
    feed: Arc<TaskFeed>,
    priority_tx: mpsc::Sender<PriorityEntry>,
    priority_rx: Mutex<Option<mpsc::Receiver<PriorityEntry>>>,
    heap_depth: Arc<AtomicUsize>,
    results_tx: Mutex<Option<mpsc::Sender<JobError>>>,
    results: Results,
    workers: Mutex<Registry>,
    next_worker_id: AtomicUsize,
    metrics: Arc<MetricsRegistry>,
    cancellation_token: CancellationToken,
    tracker: TaskTracker,
    all_done: Arc<Notify>,
    started: AtomicBool,
    closing: AtomicBool,
}

impl PoolInner {
    /// Только валидация и создание структур, ничего не запускает
    pub fn new(config: PoolConfig) -> Result<Pool, ConfigError> {
        config.validate()?;

        let (priority_tx, priority_rx) = mpsc::channel(config.queue_capacity);
        let (results_tx, results_rx) = mpsc::channel(config.queue_capacity);

        Ok(Arc::new(PoolInner {
            epoch: Instant::now(),
            feed: Arc::new(TaskFeed::new(config.queue_capacity)),
            priority_tx,
            priority_rx: Mutex::new(Some(priority_rx)),
            heap_depth: Arc::new(AtomicUsize::new(0)),
            results_tx: Mutex::new(Some(results_tx)),
            results: Results::new(results_rx),
            workers: Mutex::new(HashMap::with_capacity(config.max_workers)),
            next_worker_id: AtomicUsize::new(0),
            metrics: Arc::new(MetricsRegistry::new()),
            cancellation_token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            all_done: Arc::new(Notify::new()),
            started: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            config,
        }))
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Запускает `min_workers` воркеров, scaling manager и приоритетный координатор.
    /// Должен вызываться внутри tokio runtime. Повторный вызов игнорируется.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("pool already started");
            return;
        }

        for _ in 0..self.config.min_workers {
            self.spawn_worker();
        }

        let priority_rx = lock(&self.priority_rx).take();
        if let Some(entries) = priority_rx {
            let coordinator = PriorityCoordinator::new(
                entries,
                self.feed.clone(),
                self.metrics.clone(),
                self.heap_depth.clone(),
                self.cancellation_token.clone(),
            );
            self.tracker.spawn(coordinator.run());
        }

        let manager = ScalingManager::new(
            self.clone(),
            self.config.clone(),
            self.cancellation_token.clone(),
        );
        self.tracker.spawn(manager.run());

        info!(
            min_workers = self.config.min_workers,
            max_workers = self.config.max_workers,
            queue_capacity = self.config.queue_capacity,
            "pool started"
        );
    }

    #[inline]
    fn ensure_open(&self) -> Result<(), SubmitError> {
        if self.closing.load(Ordering::SeqCst) || self.cancellation_token.is_cancelled() {
            return Err(SubmitError::Closed);
        }
        Ok(())
    }

    /// Кладёт задачу в общую очередь. Ждёт, пока очередь заполнена.
    pub async fn submit<F, Fut>(&self, f: F) -> Result<(), SubmitError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = JobResult> + Send + 'static,
    {
        self.submit_job(job::boxed(f)).await
    }

    /// Синхронная задача, выполняется в blocking-пуле tokio
    pub async fn submit_blocking<F>(&self, f: F) -> Result<(), SubmitError>
    where
        F: FnOnce(CancellationToken) -> Result<(), BoxError> + Send + 'static,
    {
        self.submit_job(job::blocking(f)).await
    }

    pub async fn submit_job(&self, job: Job) -> Result<(), SubmitError> {
        self.ensure_open()?;
        let permit = self.feed.reserve().await?;
        self.ensure_open()?;

        self.metrics.job_queued();
        self.feed.push(job, permit);

        // stop() мог пройти целиком между проверкой и push: тогда задачу никто не заберёт.
        // При stop_draining токен ещё не отменён, принятая задача будет выполнена.
        fence(Ordering::SeqCst);
        if self.cancellation_token.is_cancelled() {
            self.metrics.jobs_dropped(self.feed.discard());
            self.all_done.notify_waiters();
            return Err(SubmitError::Closed);
        }
        Ok(())
    }

    /// Передаёт задачу координатору и ждёт подтверждения постановки в кучу
    /// (не выполнения). До `start()` подтверждения не будет.
    pub async fn submit_priority<F, Fut>(&self, f: F, priority: i32) -> Result<(), SubmitError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = JobResult> + Send + 'static,
    {
        self.submit_priority_job(job::boxed(f), priority).await
    }

    pub async fn submit_priority_job(&self, job: Job, priority: i32) -> Result<(), SubmitError> {
        self.ensure_open()?;
        let (ack, acked) = oneshot::channel();
        self.priority_tx
            .send(PriorityEntry::new(job, priority, ack))
            .await
            .map_err(|_| SubmitError::Closed)?;
        acked.await.map_err(|_| SubmitError::Closed)
    }

    /// Лента ошибок. Её нужно вычитывать во время работы пула.
    pub fn results(&self) -> Results {
        self.results.clone()
    }

    #[inline]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn worker_count(&self) -> usize {
        lock(&self.workers).len()
    }

    pub fn worker_stats(&self) -> Vec<WorkerStats> {
        let now = Instant::now();
        let mut stats: Vec<_> = lock(&self.workers)
            .values()
            .map(|record| record.stats(now))
            .collect();
        stats.sort_by_key(|s| s.id);
        stats
    }

    /// Ждёт, пока не останется ни очереди, ни выполняющихся задач
    pub async fn join_all(&self) {
        loop {
            let notified = self.all_done.notified();
            if self.metrics.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub async fn join_all_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.join_all()).await.is_ok()
    }

    /// Отменяет пул, ждёт только выполняющиеся задачи и закрывает ленту ошибок.
    /// Всё, что осталось в очереди и в куче, отбрасывается (`dropped_jobs`).
    pub async fn stop(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.cancellation_token.cancel();
        self.feed.close();

        self.tracker.close();
        self.tracker.wait().await;

        let dropped = self.feed.discard();
        self.metrics.jobs_dropped(dropped);
        lock(&self.workers).clear();
        // Без start() приёмник так и лежит здесь; его drop будит ждущие submit_priority
        lock(&self.priority_rx).take();
        lock(&self.results_tx).take();
        self.all_done.notify_waiters();

        let metrics = self.metrics.snapshot();
        info!(
            completed = metrics.completed_jobs,
            failed = metrics.failed_jobs,
            dropped = metrics.dropped_jobs,
            "pool stopped"
        );
    }

    /// Перестаёт принимать задачи, выполняет всё принятое, затем `stop()`
    pub async fn stop_draining(&self) {
        self.closing.store(true, Ordering::SeqCst);
        debug!(queued = self.metrics.queued(), "draining pool");
        self.join_all().await;
        self.stop().await;
    }

    pub async fn shutdown(&self, mode: ShutdownMode) {
        match mode {
            ShutdownMode::Drop => self.stop().await,
            ShutdownMode::Drain => self.stop_draining().await,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Мониторинг метрик с callback
    /// ВАЖНО: Вызовите token.cancel() для остановки мониторинга; stop() пула тоже его завершает
    pub fn start_monitoring<F>(self: &Arc<Self>, interval: Duration, callback: F) -> CancellationToken
    where
        F: Fn(MetricsSnapshot) + Send + 'static,
    {
        let pool = Arc::clone(self);
        let token = self.cancellation_token.child_token();
        let token_clone = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        callback(pool.metrics());
                    }
                    _ = token_clone.cancelled() => {
                        drop(pool);
                        break;
                    }
                }
            }
        });

        token
    }
}

impl WorkerSet for PoolInner {
    fn backlog(&self) -> usize {
        self.feed.len() + self.heap_depth.load(Ordering::Acquire)
    }

    fn worker_count(&self) -> usize {
        PoolInner::worker_count(self)
    }

    fn spawn_worker(&self) {
        let Some(results) = lock(&self.results_tx).clone() else {
            return;
        };

        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(WorkerRecord::new(
            id,
            self.epoch,
            self.cancellation_token.child_token(),
        ));
        lock(&self.workers).insert(id, record.clone());
        self.metrics.worker_started();

        let worker = Worker {
            record,
            feed: self.feed.clone(),
            metrics: self.metrics.clone(),
            results,
            cancel: self.cancellation_token.clone(),
            all_done: self.all_done.clone(),
        };
        self.tracker.spawn(worker.run());
        debug!(worker = id, "worker started");
    }

    fn retire_idle_worker(&self, idle_timeout: Duration) -> Option<usize> {
        let mut workers = lock(&self.workers);
        if workers.len() <= self.config.min_workers {
            return None;
        }
        let id = scaling::pick_idle(workers.values(), Instant::now(), idle_timeout)?;
        // Воркер мог взять задачу после pick_idle: тогда ждём следующего тика
        if !workers.get(&id)?.try_retire() {
            return None;
        }
        workers.remove(&id);
        Some(id)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
