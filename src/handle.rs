use super::errors::JobError;
use std::sync::Arc;
use tokio::{
    sync::{mpsc, Mutex},
    time::Duration,
};


/// Read-only лента ошибок задач. Клоны читают одну и ту же очередь,
/// каждая ошибка достаётся ровно одному читателю.
///
/// Лента ограничена `queue_capacity`: если её не вычитывать, воркеры
/// встанут на публикации очередной ошибки.
#[derive(Clone)]
pub struct Results {
    receiver: Arc<Mutex<mpsc::Receiver<JobError>>>,
}

impl Results {
    pub(crate) fn new(receiver: mpsc::Receiver<JobError>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// `None` после `stop()`, когда лента закрыта и пуста
    pub async fn recv(&self) -> Option<JobError> {
        self.receiver.lock().await.recv().await
    }

    pub async fn recv_timeout(&self, timeout: Duration) -> Option<JobError> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }

    pub fn try_recv(&self) -> Option<JobError> {
        self.receiver.try_lock().ok()?.try_recv().ok()
    }

    /// Всё, что уже лежит в ленте, без ожидания
    pub fn drain_ready(&self) -> Vec<JobError> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Читает до закрытия ленты
    pub async fn collect(&self) -> Vec<JobError> {
        let mut errors = Vec::new();
        while let Some(err) = self.recv().await {
            errors.push(err);
        }
        errors
    }
}
