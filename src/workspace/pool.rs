use anyhow::{anyhow, Result};
use std::any::Any;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinError};

/// Bounded pool for blocking work, sized once and shared across refreshes.
///
/// Each job takes a permit before it is handed to `spawn_blocking`, so at
/// most `size` jobs occupy blocking threads at any time.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Twice the available hardware parallelism
    pub fn default_size() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            * 2
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `job` on a blocking thread once a permit is free.
    ///
    /// A panic inside `job` is returned as an error.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| anyhow!("Worker pool is closed"))?;

        task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(join_error)
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(Self::default_size())
    }
}

fn join_error(error: JoinError) -> anyhow::Error {
    if error.is_panic() {
        anyhow!("Worker panicked: {}", panic_message(error.into_panic()))
    } else {
        anyhow!("Worker task was cancelled")
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
