//! Fixed-size worker pool draining a shared FIFO of queued RPC packets (C4).
//!
//! The TCP path in this server (`tcp::process_socket` /
//! `protocol::rpc::command_queue::CommandQueue`) already gets per-connection
//! concurrency for free from one `tokio::spawn`'d task per socket. `WorkerPool`
//! is the piece that generalises that to the spec's §4.4 model across *all*
//! transports sharing one bounded pool of workers (default 8, floor 4,
//! ceiling 50): every accepted packet, UDP or TCP, is pushed onto one queue,
//! and a fixed number of worker tasks drain it. Grounded on the
//! `tokio::sync::mpsc` + `tokio::spawn` idiom already used by
//! `protocol::rpc::command_queue::CommandQueue`, generalised from "one task
//! per connection" to "N tasks shared by every connection".

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, trace};

use crate::config::{MAX_THREAD_POOL_SIZE, MIN_THREAD_POOL_SIZE};

/// A unit of work submitted to the pool: an owned future the worker simply
/// awaits. Boxed so `WorkerPool` doesn't need to be generic over the
/// concrete job type (jobs here are always "process this RPC packet and
/// write its reply", but the pool itself has no opinion on that).
pub type Job = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'static>>;

/// A fixed-size pool of workers consuming a shared FIFO (§4.4).
pub struct WorkerPool {
    sender: mpsc::UnboundedSender<Job>,
    size: usize,
}

impl WorkerPool {
    /// Spawns `size` worker tasks (clamped to `[MIN_THREAD_POOL_SIZE,
    /// MAX_THREAD_POOL_SIZE]`), all pulling from the same receiver behind an
    /// `Arc<AsyncMutex<_>>` - the standard pattern for giving several tokio
    /// tasks fair access to one `mpsc::Receiver`.
    pub fn new(size: usize) -> Self {
        let size = size.clamp(MIN_THREAD_POOL_SIZE, MAX_THREAD_POOL_SIZE);
        let (sender, receiver) = mpsc::unbounded_channel::<Job>();
        let receiver = Arc::new(AsyncMutex::new(receiver));

        for worker_id in 0..size {
            let receiver = receiver.clone();
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut guard = receiver.lock().await;
                        guard.recv().await
                    };
                    match job {
                        Some(job) => {
                            trace!(worker_id, "picked up job");
                            job.await;
                        }
                        None => {
                            debug!(worker_id, "worker pool shut down");
                            break;
                        }
                    }
                }
            });
        }

        WorkerPool { sender, size }
    }

    /// Number of live worker tasks in this pool.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Enqueues a job. Returns `Err` only if every worker has already
    /// exited (the pool was dropped), mirroring "shutdown flips a flag and
    /// interrupts all workers" from §4.4 - here, dropping the pool closes
    /// the channel, which is each worker's interrupt signal.
    pub fn submit(
        &self,
        job: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ()> {
        self.sender.send(Box::pin(job)).map_err(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn processes_submitted_jobs() {
        let pool = WorkerPool::new(4);
        assert_eq!(pool.size(), 4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = counter.clone();
            pool.submit(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        // give the pool a chance to drain; jobs are trivial so this is ample
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn size_is_clamped_to_configured_bounds() {
        let tiny = WorkerPool::new(0);
        assert_eq!(tiny.size(), MIN_THREAD_POOL_SIZE);
        let huge = WorkerPool::new(10_000);
        assert_eq!(huge.size(), MAX_THREAD_POOL_SIZE);
    }
}
