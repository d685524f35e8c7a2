use std::{
    fmt::{self, Display, Formatter},
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::Semaphore;

/// Bounded set of flow tasks.
///
/// `spawn` waits for a free slot, so a full pool pushes back on the accept
/// loop instead of piling up tasks. Clones share the same slots.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: u32,
    closed: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct PoolClosed;

impl Display for PoolClosed {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("worker pool is closed")
    }
}

impl std::error::Error for PoolClosed {}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS.min(u32::MAX as usize)) as u32;
        Self {
            permits: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn spawn<F>(&self, task: F) -> Result<(), PoolClosed>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            return Err(PoolClosed);
        }

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolClosed)?;

        if self.is_closed() {
            return Err(PoolClosed);
        }

        tokio::spawn(async move {
            // Released even if the task panics
            let _permit = permit;
            task.await;
        });

        Ok(())
    }

    /// Number of tasks currently running
    pub fn in_flight(&self) -> usize {
        self.capacity as usize - self.permits.available_permits()
    }

    /// Refuses further tasks. Running ones are left alone.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once no task is running
    pub async fn wait_idle(&self) {
        if let Ok(all) = self.permits.acquire_many(self.capacity).await {
            drop(all);
        }
    }
}
