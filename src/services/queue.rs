use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::services::storage::TempVideo;

/// A submitted job waiting for a worker. Owns the staged upload.
#[derive(Debug)]
pub struct QueuedJob {
    pub job_id: Uuid,
    pub video: TempVideo,
}

/// In-process job queue feeding the worker loop.
#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<QueuedJob>,
    depth: Arc<AtomicU64>,
}

/// Receiving half, handed to [`crate::worker::run`].
#[derive(Debug)]
pub struct JobReceiver {
    receiver: mpsc::UnboundedReceiver<QueuedJob>,
    depth: Arc<AtomicU64>,
}

impl JobQueue {
    pub fn new() -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicU64::new(0));
        (
            Self {
                sender,
                depth: Arc::clone(&depth),
            },
            JobReceiver { receiver, depth },
        )
    }

    /// Enqueue a job. Returns the job back if the worker loop has stopped.
    pub fn enqueue(&self, job: QueuedJob) -> Result<(), QueueError> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(job)) = self.sender.send(job) {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed(Box::new(job)));
        }
        metrics::gauge!("video_queue_depth").set(self.queue_depth() as f64);
        Ok(())
    }

    /// Jobs submitted but not yet picked up by a worker.
    pub fn queue_depth(&self) -> u64 {
        self.depth.load(Ordering::SeqCst)
    }

    /// Check the worker loop is still receiving (for health checks).
    pub fn health_check(&self) -> Result<(), QueueError> {
        if self.sender.is_closed() {
            Err(QueueError::WorkerStopped)
        } else {
            Ok(())
        }
    }
}

impl JobReceiver {
    pub async fn dequeue(&mut self) -> Option<QueuedJob> {
        let job = self.receiver.recv().await?;
        let depth = self.depth.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::gauge!("video_queue_depth").set(depth as f64);
        Some(job)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Job queue is closed")]
    Closed(Box<QueuedJob>),

    #[error("Worker loop is not running")]
    WorkerStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> QueuedJob {
        QueuedJob {
            job_id: Uuid::new_v4(),
            video: TempVideo::from_bytes(b"data", None).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_enqueue_dequeue_tracks_depth() {
        let (queue, mut receiver) = JobQueue::new();
        let first = job();
        let first_id = first.job_id;

        queue.enqueue(first).unwrap();
        queue.enqueue(job()).unwrap();
        assert_eq!(queue.queue_depth(), 2);

        let popped = receiver.dequeue().await.unwrap();
        assert_eq!(popped.job_id, first_id);
        assert_eq!(queue.queue_depth(), 1);
        assert!(queue.health_check().is_ok());
    }

    #[tokio::test]
    async fn test_enqueue_after_worker_stops() {
        let (queue, receiver) = JobQueue::new();
        drop(receiver);

        let queued = job();
        let id = queued.job_id;
        match queue.enqueue(queued) {
            Err(QueueError::Closed(job)) => assert_eq!(job.job_id, id),
            other => panic!("expected closed queue, got {:?}", other.is_ok()),
        }
        assert_eq!(queue.queue_depth(), 0);
        assert!(matches!(queue.health_check(), Err(QueueError::WorkerStopped)));
    }
}
