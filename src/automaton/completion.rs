//! Single-assignment completion signal of a run.

use crate::core::{AutomatonError, State, StopDescriptor};
use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Write side of a run's stop signal; fulfilled at most once.
#[derive(Clone)]
pub(crate) struct Completion<S: State> {
    sender: Arc<Mutex<Option<oneshot::Sender<StopDescriptor<S>>>>>,
    signal: Shared<oneshot::Receiver<StopDescriptor<S>>>,
    name: Arc<str>,
}

impl<S: State> Completion<S> {
    pub(crate) fn new(name: Arc<str>) -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
            signal: receiver.shared(),
            name,
        }
    }

    /// Deliver the descriptor. Returns `false` if it was already delivered.
    pub(crate) fn fulfill(&self, descriptor: StopDescriptor<S>) -> bool {
        match self.sender.lock().take() {
            // receivers live inside `signal`, so the send cannot fail
            Some(sender) => sender.send(descriptor).is_ok(),
            None => false,
        }
    }

    pub(crate) fn is_fulfilled(&self) -> bool {
        self.sender.lock().is_none()
    }

    pub(crate) fn future(&self) -> StopFuture<S> {
        StopFuture {
            signal: self.signal.clone(),
            name: Arc::clone(&self.name),
        }
    }
}

/// Resolves with the stop descriptor once the run ends.
///
/// Clones observe the same run. A resumption dropped before it runs, for
/// example by a runtime shutting down, stops the run with
/// [`StopReason::Error`](crate::core::StopReason::Error). Resolves with
/// [`AutomatonError::Abandoned`] only if the automaton itself is dropped
/// while the run is still pending.
#[derive(Clone)]
#[must_use = "futures do nothing unless polled"]
pub struct StopFuture<S: State> {
    signal: Shared<oneshot::Receiver<StopDescriptor<S>>>,
    name: Arc<str>,
}

impl<S: State> StopFuture<S> {
    /// The descriptor, if the run has already stopped and the result has
    /// been observed by a poll.
    pub fn peek(&self) -> Option<&StopDescriptor<S>> {
        self.signal.peek().and_then(|result| result.as_ref().ok())
    }
}

impl<S: State> Future for StopFuture<S> {
    type Output = Result<StopDescriptor<S>, AutomatonError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.signal.poll_unpin(cx) {
            Poll::Ready(Ok(descriptor)) => Poll::Ready(Ok(descriptor)),
            Poll::Ready(Err(oneshot::Canceled)) => {
                Poll::Ready(Err(AutomatonError::Abandoned(this.name.to_string())))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S: State> std::fmt::Debug for StopFuture<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopFuture")
            .field("automaton", &self.name)
            .field("stopped", &self.peek().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StopReason;
    use chrono::Utc;
    use futures::executor::block_on;
    use std::time::Duration;
    use uuid::Uuid;

    fn descriptor() -> StopDescriptor<u8> {
        StopDescriptor {
            run_id: Uuid::new_v4(),
            reason: StopReason::Natural,
            error: None,
            age: Duration::ZERO,
            last_state: Some(1),
            started_at: Utc::now(),
            stopped_at: Utc::now(),
        }
    }

    #[test]
    fn fulfils_exactly_once() {
        let completion = Completion::new(Arc::from("once"));

        assert!(!completion.is_fulfilled());
        assert!(completion.fulfill(descriptor()));
        assert!(completion.is_fulfilled());
        assert!(!completion.fulfill(descriptor()));
    }

    #[test]
    fn every_future_sees_the_same_descriptor() {
        let completion = Completion::new(Arc::from("shared"));
        let first = completion.future();
        let second = completion.future();

        completion.fulfill(descriptor());

        let a = block_on(first).unwrap();
        let b = block_on(second).unwrap();
        assert_eq!(a.run_id, b.run_id);
    }

    #[test]
    fn dropped_sender_abandons_the_future() {
        let completion: Completion<u8> = Completion::new(Arc::from("dropped"));
        let future = completion.future();
        completion.sender.lock().take();

        let result = block_on(future);
        assert_eq!(result.unwrap_err(), AutomatonError::Abandoned("dropped".into()));
    }
}
