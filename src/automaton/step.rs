//! Step kinds: the logic run for a state.

use super::context::Context;
use super::directive::StepResult;
use super::machine::Machine;
use std::future::Future;
use std::sync::Arc;

/// Step function; produces the next transition directly.
pub type StepFn<M> = Arc<dyn Fn(&mut M, &mut Context<M>) -> StepResult<M> + Send + Sync>;

/// Logic attached to a state.
pub enum Step<M: Machine> {
    /// Runs to completion and returns the next transition. May itself
    /// suspend through [`Context::suspend`].
    Sync(StepFn<M>),
    /// Starts a pending operation and always suspends on it; the
    /// continuation produces the next transition once the operation
    /// completes.
    Async(AsyncStep<M>),
}

/// Payload of [`Step::Async`].
///
/// Only built by [`Step::asynchronous`] and
/// [`Step::asynchronous_with_error`], so it always suspends.
pub struct AsyncStep<M: Machine> {
    start: StepFn<M>,
    error_branch: bool,
}

impl<M: Machine> AsyncStep<M> {
    /// Whether a failed operation goes to the step's own error branch
    /// instead of [`Machine::on_error`].
    pub fn has_error_branch(&self) -> bool {
        self.error_branch
    }

    pub(crate) fn start(&self, machine: &mut M, cx: &mut Context<M>) -> StepResult<M> {
        (self.start)(machine, cx)
    }
}

impl<M: Machine> Clone for AsyncStep<M> {
    fn clone(&self) -> Self {
        Self {
            start: Arc::clone(&self.start),
            error_branch: self.error_branch,
        }
    }
}

impl<M: Machine> Step<M> {
    pub fn sync<F>(step: F) -> Self
    where
        F: Fn(&mut M, &mut Context<M>) -> StepResult<M> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(step))
    }

    /// Asynchronous step; a failed operation goes to [`Machine::on_error`].
    pub fn asynchronous<Op, Fut, V, E, H>(operation: Op, handler: H) -> Self
    where
        Op: Fn(&mut M, &Context<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        V: Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
        H: Fn(&mut M, &mut Context<M>, V) -> StepResult<M> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        Self::Async(AsyncStep {
            start: Arc::new(move |machine: &mut M, cx: &mut Context<M>| -> StepResult<M> {
                let pending = operation(machine, cx);
                let handler = Arc::clone(&handler);
                Ok(cx.suspend(pending, move |machine, cx, value| {
                    handler(machine, cx, value)
                }))
            }),
            error_branch: false,
        })
    }

    /// Asynchronous step with an explicit failure branch.
    pub fn asynchronous_with_error<Op, Fut, V, E, H, R>(
        operation: Op,
        handler: H,
        on_error: R,
    ) -> Self
    where
        Op: Fn(&mut M, &Context<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        V: Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
        H: Fn(&mut M, &mut Context<M>, V) -> StepResult<M> + Send + Sync + 'static,
        R: Fn(&mut M, &mut Context<M>, anyhow::Error) -> StepResult<M> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let on_error = Arc::new(on_error);
        Self::Async(AsyncStep {
            start: Arc::new(move |machine: &mut M, cx: &mut Context<M>| -> StepResult<M> {
                let pending = operation(machine, cx);
                let handler = Arc::clone(&handler);
                let on_error = Arc::clone(&on_error);
                Ok(cx.suspend_with_error(
                    pending,
                    move |machine, cx, value| handler(machine, cx, value),
                    move |machine, cx, error| on_error(machine, cx, error),
                ))
            }),
            error_branch: true,
        })
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl<M: Machine> Clone for Step<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Sync(step) => Self::Sync(Arc::clone(step)),
            Self::Async(step) => Self::Async(step.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Fetcher;

    impl Machine for Fetcher {
        type State = u8;
    }

    fn fetch() -> Step<Fetcher> {
        Step::asynchronous(
            |_: &mut Fetcher, _: &Context<Fetcher>| async { Ok::<_, anyhow::Error>(1_u8) },
            |_: &mut Fetcher, cx: &mut Context<Fetcher>, _: u8| Ok(cx.end()),
        )
    }

    #[test]
    fn async_payload_records_its_error_branch() {
        let guarded = Step::asynchronous_with_error(
            |_: &mut Fetcher, _: &Context<Fetcher>| async { Ok::<_, anyhow::Error>(1_u8) },
            |_: &mut Fetcher, cx: &mut Context<Fetcher>, _: u8| Ok(cx.end()),
            |_: &mut Fetcher, cx: &mut Context<Fetcher>, _| Ok(cx.end()),
        );

        assert!(matches!(fetch(), Step::Async(ref step) if !step.has_error_branch()));
        assert!(matches!(guarded, Step::Async(ref step) if step.has_error_branch()));
        assert!(!Step::<Fetcher>::sync(|_, cx| Ok(cx.end())).is_async());
    }

    #[test]
    fn async_payload_always_suspends() {
        let Step::Async(step) = fetch() else {
            panic!("asynchronous constructor built a sync step");
        };
        let mut cx = Context::new(1, Arc::from("fetcher"), Duration::ZERO, None, None);

        let transition = step.start(&mut Fetcher, &mut cx).unwrap();

        assert!(transition.is_suspension());
        assert_eq!(cx.issued(), 1);
    }
}
