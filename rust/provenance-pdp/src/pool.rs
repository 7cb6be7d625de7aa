use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tokio::sync::{Semaphore, TryAcquireError};

use crate::PdpError;

/// A [`WorkerPool`] bounds how many decisions evaluate at once.
///
/// Up to `workers` jobs run concurrently on the blocking thread pool. When
/// every worker is busy, up to `queue_limit` further callers wait for one to
/// free up; anyone beyond that is turned away at once with
/// [`PdpError::Busy`], so that an overloaded decision point sheds load
/// instead of accumulating it.
#[derive(Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    workers: usize,
    queue_limit: usize,
    waiting: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// A pool of `workers` workers and room for `queue_limit` waiters
    pub fn new(workers: usize, queue_limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            queue_limit,
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The number of workers
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Jobs currently holding a worker
    pub fn in_flight(&self) -> usize {
        self.workers
            .saturating_sub(self.permits.available_permits())
    }

    /// Callers currently waiting for a worker
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Acquire)
    }

    /// Run `job` on a worker, waiting for one if the queue has room
    pub async fn run<F, T>(&self, job: F) -> Result<T, PdpError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                let ahead = self.waiting.fetch_add(1, Ordering::AcqRel);
                let _ticket = QueueTicket(self.waiting.clone());

                if ahead >= self.queue_limit {
                    return Err(PdpError::Busy {
                        in_flight: self.in_flight(),
                        waiting: ahead,
                    });
                }

                self.permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| PdpError::Worker("worker pool is closed".into()))?
            }
            Err(TryAcquireError::Closed) => {
                return Err(PdpError::Worker("worker pool is closed".into()));
            }
        };

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|error| PdpError::Worker(format!("{error}")))
    }
}

/// Holds a place in the queue until dropped
struct QueueTicket(Arc<AtomicUsize>);

impl Drop for QueueTicket {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn it_runs_jobs_on_a_worker() -> Result<()> {
        let pool = WorkerPool::new(2, 0);

        assert_eq!(pool.run(|| 6 * 7).await?, 42);
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.waiting(), 0);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn it_turns_callers_away_once_the_queue_is_full() -> Result<()> {
        let pool = Arc::new(WorkerPool::new(1, 1));
        let (started, running) = oneshot::channel();

        let busy = tokio::spawn({
            let pool = pool.clone();
            async move {
                pool.run(move || {
                    let _ = started.send(());
                    std::thread::sleep(Duration::from_millis(300));
                })
                .await
            }
        });
        running.await?;

        let queued = tokio::spawn({
            let pool = pool.clone();
            async move { pool.run(|| ()).await }
        });
        while pool.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            pool.run(|| ()).await,
            Err(PdpError::Busy {
                in_flight: 1,
                waiting: 1
            })
        ));

        busy.await??;
        queued.await??;
        assert_eq!(pool.waiting(), 0);
        Ok(())
    }
}
