use super::errors::BoxError;
use futures::future::BoxFuture;
use std::{
    cmp::Ordering,
    future::Future,
};
use tokio::sync::{oneshot, OwnedSemaphorePermit};
use tokio_util::sync::CancellationToken;


pub type JobResult = Result<(), BoxError>;

/// Единица работы: получает токен отмены пула и может завершиться ошибкой
pub type Job = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, JobResult> + Send + 'static>;

#[inline]
pub fn boxed<F, Fut>(f: F) -> Job
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = JobResult> + Send + 'static,
{
    Box::new(move |token: CancellationToken| Box::pin(f(token)) as BoxFuture<'static, JobResult>)
}

/// Синхронная задача уходит в blocking-пул tokio, воркер ждёт её завершения
pub fn blocking<F>(f: F) -> Job
where
    F: FnOnce(CancellationToken) -> JobResult + Send + 'static,
{
    boxed(move |token| async move {
        match tokio::task::spawn_blocking(move || f(token)).await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
            Err(join_err) => Err(join_err.into()),
        }
    })
}


/// Задача в общей очереди. Permit держит слот ёмкости, пока задачу не заберёт воркер.
pub(crate) struct QueuedJob {
    pub job: Job,
    pub _permit: OwnedSemaphorePermit,
}


pub(crate) struct PriorityEntry {
    pub job: Job,
    pub priority: i32,
    pub sequence: u64,
    pub ack: Option<oneshot::Sender<()>>,
}

impl PriorityEntry {
    pub fn new(job: Job, priority: i32, ack: oneshot::Sender<()>) -> Self {
        Self {
            job,
            priority,
            sequence: 0,
            ack: Some(ack),
        }
    }
}

// Higher priority first, then lower sequence (insertion order) first.
impl Ord for PriorityEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for PriorityEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PriorityEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for PriorityEntry {}
