//! Scheduler backed by a tokio runtime.

use super::{ExecutionContext, Scheduler, Task};
use futures::future::BoxFuture;
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};

/// Spawns every resumption as a tokio task; delayed ones sleep first.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler for the runtime the caller is running on.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Scheduler for TokioScheduler {
    fn submit(&self, task: Task, delay: Duration) {
        if delay.is_zero() {
            self.handle.spawn(async move { task() });
        } else {
            self.handle.spawn(async move {
                tokio::time::sleep(delay).await;
                task()
            });
        }
    }

    fn execution_context(&self) -> Option<&dyn ExecutionContext> {
        Some(self)
    }
}

impl ExecutionContext for TokioScheduler {
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        self.handle.spawn(future);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn zero_delay_runs_promptly() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tx, rx) = oneshot::channel();

        scheduler.submit(Box::new(move || tx.send(1).unwrap()), Duration::ZERO);

        assert_eq!(rx.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delayed_task_waits_at_least_the_delay() {
        let scheduler = TokioScheduler::current().unwrap();
        let (tx, rx) = oneshot::channel();
        let submitted = tokio::time::Instant::now();

        scheduler.submit(
            Box::new(move || tx.send(()).unwrap()),
            Duration::from_millis(30),
        );
        rx.await.unwrap();

        assert!(submitted.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn execution_context_spawns_futures() {
        let scheduler = TokioScheduler::current().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();

        let seen = Arc::clone(&counter);
        scheduler.execution_context().unwrap().spawn(Box::pin(async move {
            seen.fetch_add(1, Ordering::SeqCst);
            tx.send(()).unwrap();
        }));
        rx.await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn current_fails_outside_a_runtime() {
        assert!(TokioScheduler::current().is_err());
    }
}
