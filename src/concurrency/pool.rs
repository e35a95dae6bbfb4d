//! Bounded worker pool
//!
//! Each worker slot is a permit on a shared [`Semaphore`]. [`WorkerPool::invoke`]
//! waits for a permit, then spawns the handler for the task; the permit is held
//! until the handler's future completes.

use super::PoolError;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

type Handler<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

/// Fixed-capacity pool running one handler per submitted task
pub struct WorkerPool<T> {
    capacity: usize,
    semaphore: Arc<Semaphore>,
    handler: Handler<T>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Create a pool with `capacity` workers, all running `handler`
    pub fn new<F, Fut>(capacity: usize, handler: F) -> Result<Self, PoolError>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if capacity == 0 {
            return Err(PoolError::InvalidCapacity(capacity));
        }

        Ok(Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            handler: Arc::new(move |task| Box::pin(handler(task))),
        })
    }

    /// Submit a task, waiting while every worker is busy.
    ///
    /// On error the task is dropped without running.
    pub async fn invoke(&self, task: T) -> Result<JoinHandle<()>, PoolError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let work = (self.handler)(task);
        Ok(tokio::spawn(async move {
            work.await;
            drop(permit);
        }))
    }

    /// Number of workers currently running a task
    pub fn running(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Number of free workers
    pub fn free(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stop accepting tasks. Tasks already running finish normally.
    pub fn release(&self) {
        self.semaphore.close();
    }

    pub fn is_released(&self) -> bool {
        self.semaphore.is_closed()
    }
}
