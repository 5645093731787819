use super::{
    feed::TaskFeed,
    job::PriorityEntry,
    metrics::MetricsRegistry,
};
use std::{
    collections::BinaryHeap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;


/// Max-heap по приоритету, при равенстве FIFO по порядку вставки
#[derive(Default)]
pub(crate) struct PriorityQueue {
    heap: BinaryHeap<PriorityEntry>,
    next_sequence: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mut entry: PriorityEntry) {
        entry.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(entry);
    }

    #[inline]
    pub fn pop(&mut self) -> Option<PriorityEntry> {
        self.heap.pop()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}


/// Единственный владелец кучи: принимает приоритетные задачи и
/// переносит верхнюю в общую очередь, как только там есть место.
pub(crate) struct PriorityCoordinator {
    entries: mpsc::Receiver<PriorityEntry>,
    feed: Arc<TaskFeed>,
    metrics: Arc<MetricsRegistry>,
    depth: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl PriorityCoordinator {
    pub fn new(
        entries: mpsc::Receiver<PriorityEntry>,
        feed: Arc<TaskFeed>,
        metrics: Arc<MetricsRegistry>,
        depth: Arc<AtomicUsize>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            entries,
            feed,
            metrics,
            depth,
            cancel,
        }
    }

    pub async fn run(mut self) {
        let mut queue = PriorityQueue::new();

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                entry = self.entries.recv() => {
                    let Some(mut entry) = entry else { break };
                    let ack = entry.ack.take();
                    queue.push(entry);
                    self.depth.store(queue.len(), Ordering::Release);
                    self.metrics.job_queued();
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                }
                // Ветка выключена, пока куча пуста: pop из пустой кучи невозможен
                permit = self.feed.reserve(), if !queue.is_empty() => {
                    let Ok(permit) = permit else { break };
                    if let Some(entry) = queue.pop() {
                        self.depth.store(queue.len(), Ordering::Release);
                        self.feed.push(entry.job, permit);
                    }
                }
            }
        }

        let dropped = queue.len();
        self.depth.store(0, Ordering::Release);
        self.metrics.jobs_dropped(dropped);
        debug!(dropped, "priority coordinator stopped");
    }
}
