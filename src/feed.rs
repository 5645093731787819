use super::{
    errors::SubmitError,
    job::{Job, QueuedJob},
};
use crossbeam::deque::{Injector, Steal};
use std::sync::Arc;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};


/// Ограниченная общая очередь задач. Ёмкость держится семафором,
/// permit освобождается в момент, когда воркер забирает задачу.
pub(crate) struct TaskFeed {
    inject: Injector<QueuedJob>,
    permits: Arc<Semaphore>,
    notify: Notify,
}

impl TaskFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            inject: Injector::new(),
            permits: Arc::new(Semaphore::new(capacity)),
            notify: Notify::new(),
        }
    }

    /// Ждёт свободный слот (backpressure)
    pub async fn reserve(&self) -> Result<OwnedSemaphorePermit, SubmitError> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SubmitError::Closed)
    }

    #[cfg(test)]
    pub fn try_reserve(&self) -> Result<OwnedSemaphorePermit, tokio::sync::TryAcquireError> {
        self.permits.clone().try_acquire_owned()
    }

    #[inline(always)]
    pub fn push(&self, job: Job, permit: OwnedSemaphorePermit) {
        self.inject.push(QueuedJob { job, _permit: permit });
        self.notify.notify_one();
    }

    pub fn pop(&self) -> Option<Job> {
        loop {
            match self.inject.steal() {
                Steal::Success(queued) => {
                    // Будим следующего воркера, если есть ещё работа
                    if !self.inject.is_empty() {
                        self.wake_one();
                    }
                    return Some(queued.job);
                }
                Steal::Empty => return None,
                Steal::Retry => std::hint::spin_loop(),
            }
        }
    }

    #[inline]
    pub fn wake_one(&self) {
        self.notify.notify_one();
    }

    pub async fn wait_for_job(&self) {
        self.notify.notified().await;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inject.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inject.is_empty()
    }

    /// Закрывает приём: ожидающие `reserve` получают `Closed`
    pub fn close(&self) {
        self.permits.close();
    }

    /// Выбрасывает всё, что осталось в очереди, возвращает количество
    pub fn discard(&self) -> usize {
        let mut dropped = 0;
        while self.pop().is_some() {
            dropped += 1;
        }
        dropped
    }
}
