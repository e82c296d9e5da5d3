//! The work-queue façade: the seam a durable broker (Celery/SQS/etc. in the
//! original) sits behind. The shipped implementation is in-process and
//! non-durable, backed by an unbounded `tokio::sync::mpsc` channel.

use tokio::sync::mpsc;

/// One unit of dispatchable work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItem {
    ProcessJob { job_id: u64, run_id: u64 },
    FinalizeRun { run_id: u64 },
}

/// At-least-once work dispatch, assumed by callers (workers/finalizer no-op
/// on an already-terminal Job / already-FINISHED Run).
pub trait WorkQueue: Send + Sync {
    fn enqueue_job(&self, job_id: u64, run_id: u64);
    fn enqueue_finalize(&self, run_id: u64);
}

/// In-process `WorkQueue`, backed by an unbounded channel. `new` returns
/// both halves: the producer side implements `WorkQueue`, the consumer side
/// is a plain `Receiver` a pool of worker tasks drains directly.
pub struct InProcessQueue {
    sender: mpsc::UnboundedSender<WorkItem>,
}

impl InProcessQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkItem>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl WorkQueue for InProcessQueue {
    fn enqueue_job(&self, job_id: u64, run_id: u64) {
        // A closed receiver means the process is shutting down; dropping
        // the item is fine since nothing will ever drain it anyway.
        let _ = self.sender.send(WorkItem::ProcessJob { job_id, run_id });
    }

    fn enqueue_finalize(&self, run_id: u64) {
        let _ = self.sender.send(WorkItem::FinalizeRun { run_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueued_items_are_received_in_order() {
        let (queue, mut rx) = InProcessQueue::new();
        queue.enqueue_job(1, 100);
        queue.enqueue_finalize(100);

        assert_eq!(rx.recv().await, Some(WorkItem::ProcessJob { job_id: 1, run_id: 100 }));
        assert_eq!(rx.recv().await, Some(WorkItem::FinalizeRun { run_id: 100 }));
    }
}
