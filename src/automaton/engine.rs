//! The automaton execution core.
//!
//! One resumption at a time drives a run through `continue_execution`:
//! termination checks, the current state's step, join chains, and finally
//! either a scheduler hop or a suspension on a pending operation. The run
//! lock is held for the whole resumption and released before the scheduler
//! or execution context is called, so a scheduler that runs work inline
//! cannot deadlock the engine.

use super::completion::{Completion, StopFuture};
use super::context::Context;
use super::directive::{Delay, Directive, Resumption, StepResult, Suspension, Transition};
use super::machine::Machine;
use super::step::Step;
use crate::core::{
    describe, AutomatonError, InvariantViolation, RunError, State, StopDescriptor, StopReason,
    Ticker,
};
use crate::random::Randomizer;
use crate::sched::Scheduler;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::{Mutex, MutexGuard};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

/// Resolves the step for a state; `None` means the state is undefined.
pub type Resolver<M> = Arc<dyn Fn(&<M as Machine>::State) -> Option<Step<M>> + Send + Sync>;

/// Creates the per-run associated value.
pub type AssocSupplier = Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

/// Everything the builder hands to the engine.
pub(crate) struct Blueprint<M: Machine> {
    pub(crate) machine: M,
    pub(crate) name: String,
    pub(crate) initial: M::State,
    pub(crate) max_age: Option<Duration>,
    pub(crate) resolver: Resolver<M>,
    pub(crate) ticker: Arc<dyn Ticker>,
    pub(crate) randomizer: Option<Arc<dyn Randomizer>>,
    pub(crate) assoc: Option<AssocSupplier>,
    pub(crate) manual_stop: bool,
    pub(crate) restartable: bool,
}

/// A resumable state machine instance.
///
/// Cloning is cheap and yields another handle to the same instance.
pub struct Automaton<M: Machine> {
    inner: Arc<Inner<M>>,
}

impl<M: Machine> Clone for Automaton<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<M: Machine> {
    name: Arc<str>,
    resolver: Resolver<M>,
    ticker: Arc<dyn Ticker>,
    randomizer: Option<Arc<dyn Randomizer>>,
    assoc: Option<AssocSupplier>,
    manual_stop: bool,
    restartable: bool,
    stop_flag: AtomicBool,
    settings: Mutex<Settings<M::State>>,
    signal: Mutex<Option<Completion<M::State>>>,
    last_stop: Mutex<Option<StopDescriptor<M::State>>>,
    run: Mutex<Run<M>>,
}

#[derive(Clone)]
struct Settings<S> {
    initial: S,
    max_age: Option<Duration>,
}

/// Mutable state of the current run. Only the active resumption touches it.
struct Run<M: Machine> {
    machine: M,
    current: Option<M::State>,
    last: Option<M::State>,
    delay: Delay,
    pending: Option<Suspension<M>>,
    assoc: Option<Box<dyn Any + Send>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    completion: Option<Completion<M::State>>,
    run_id: Uuid,
    start_time: Duration,
    max_time: Option<Duration>,
    started_at: DateTime<Utc>,
}

impl<M: Machine> Run<M> {
    fn apply(&mut self, transition: Transition<M>) {
        match transition.directive {
            Directive::Move { target, delay } => {
                if let Some(current) = self.current.take() {
                    self.last = Some(current);
                }
                self.current = target;
                self.delay = delay;
                self.pending = None;
            }
            Directive::Suspend(suspension) => {
                self.delay = Delay::After(Duration::ZERO);
                self.pending = Some(suspension);
            }
        }
    }
}

/// How a resumption entered the core loop.
enum Entry<M: Machine> {
    /// Scheduler resumption or start: run the current state's step.
    Step,
    /// A pending operation completed; its continuation replaces the step.
    Resume(Resumption<M>),
}

/// What to do once the run lock is released.
enum Next<M: Machine> {
    Schedule(Arc<dyn Scheduler>, Duration),
    Await(Arc<dyn Scheduler>, Suspension<M>),
    Done,
}

enum Fault {
    Invariant(InvariantViolation),
    Domain(RunError),
}

impl Fault {
    fn from_step(error: anyhow::Error) -> Self {
        match RunError::from_step(error) {
            RunError::Invariant(violation) => Self::Invariant(violation),
            other => Self::Domain(other),
        }
    }
}

impl From<InvariantViolation> for Fault {
    fn from(violation: InvariantViolation) -> Self {
        Self::Invariant(violation)
    }
}

impl<M: Machine> Automaton<M> {
    pub(crate) fn from_blueprint(blueprint: Blueprint<M>) -> Self {
        let Blueprint {
            machine,
            name,
            initial,
            max_age,
            resolver,
            ticker,
            randomizer,
            assoc,
            manual_stop,
            restartable,
        } = blueprint;

        let run = Run {
            machine,
            current: None,
            last: None,
            delay: Delay::After(Duration::ZERO),
            pending: None,
            assoc: None,
            scheduler: None,
            completion: None,
            run_id: Uuid::nil(),
            start_time: Duration::ZERO,
            max_time: None,
            started_at: Utc::now(),
        };

        Self {
            inner: Arc::new(Inner {
                name: Arc::from(name),
                resolver,
                ticker,
                randomizer,
                assoc,
                manual_stop,
                restartable,
                stop_flag: AtomicBool::new(false),
                settings: Mutex::new(Settings { initial, max_age }),
                signal: Mutex::new(None),
                last_stop: Mutex::new(None),
                run: Mutex::new(run),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Start a run on `scheduler`. The first step runs before this returns.
    ///
    /// Fails if a run is in progress, or if a previous run finished and the
    /// automaton is not restartable.
    pub fn start(
        &self,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<StopFuture<M::State>, AutomatonError> {
        let inner = &self.inner;
        let completion = {
            let mut signal = inner.signal.lock();
            if let Some(previous) = signal.as_ref() {
                if !previous.is_fulfilled() {
                    return Err(AutomatonError::AlreadyRunning(inner.name.to_string()));
                }
                if !inner.restartable {
                    return Err(AutomatonError::NotRestartable(inner.name.to_string()));
                }
            }

            let settings = inner.settings.lock().clone();
            let completion = Completion::new(Arc::clone(&inner.name));
            {
                let mut run = inner.run.lock();
                let now = inner.ticker.read();
                run.current = Some(settings.initial.clone());
                run.last = None;
                run.delay = Delay::After(Duration::ZERO);
                run.pending = None;
                run.assoc = inner.assoc.as_ref().map(|supplier| supplier());
                run.scheduler = Some(scheduler);
                run.completion = Some(completion.clone());
                run.run_id = Uuid::new_v4();
                run.start_time = now;
                run.max_time = settings.max_age.map(|max_age| now + max_age);
                run.started_at = Utc::now();
                run.machine.on_started();
                debug!(
                    automaton = %inner.name,
                    run_id = %run.run_id,
                    state = %settings.initial.name(),
                    max_age = ?settings.max_age,
                    "automaton started"
                );
            }
            inner.stop_flag.store(false, Ordering::SeqCst);
            *signal = Some(completion.clone());
            completion
        };

        inner.continue_execution(Entry::Step);
        Ok(completion.future())
    }

    /// Request a manual stop, observed at the next resumption boundary.
    ///
    /// Has no effect on a run that already stopped; the returned future
    /// then resolves with that run's descriptor.
    pub fn stop(&self) -> Result<StopFuture<M::State>, AutomatonError> {
        let inner = &self.inner;
        if !inner.manual_stop {
            return Err(AutomatonError::ManualStopDisabled(inner.name.to_string()));
        }
        let signal = inner.signal.lock();
        let completion = signal
            .as_ref()
            .ok_or_else(|| AutomatonError::NotStarted(inner.name.to_string()))?;
        if !completion.is_fulfilled() {
            inner.stop_flag.store(true, Ordering::SeqCst);
            debug!(automaton = %inner.name, "manual stop requested");
        }
        Ok(completion.future())
    }

    /// `true` unless a run is in progress.
    pub fn is_stopped(&self) -> bool {
        self.inner
            .signal
            .lock()
            .as_ref()
            .map_or(true, Completion::is_fulfilled)
    }

    pub fn is_restartable(&self) -> bool {
        self.inner.restartable
    }

    pub fn supports_manual_stop(&self) -> bool {
        self.inner.manual_stop
    }

    /// Initial state of the next run. Must not be called from step logic.
    pub fn set_initial_state(&self, state: M::State) -> Result<(), AutomatonError> {
        if !self.inner.run.lock().machine.check_state(&state) {
            return Err(AutomatonError::Rejected(InvariantViolation::new(
                &*self.inner.name,
                state.name(),
                "state doesn't belong to this automaton",
            )));
        }
        self.inner.settings.lock().initial = state;
        Ok(())
    }

    /// Max age of the next run; `None` means unbounded.
    pub fn set_max_age(&self, max_age: Option<Duration>) {
        self.inner.settings.lock().max_age = max_age;
    }

    /// Descriptor of the most recently finished run.
    pub fn last_stop(&self) -> Option<StopDescriptor<M::State>> {
        self.inner.last_stop.lock().clone()
    }

    pub fn initial_state(&self) -> M::State {
        self.inner.settings.lock().initial.clone()
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.inner.settings.lock().max_age
    }

    /// Read the machine value. Blocks while a step is running, so it must
    /// not be called from step logic.
    pub fn inspect<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        f(&self.inner.run.lock().machine)
    }

    /// Mutate the machine value, e.g. to configure it before a run.
    pub fn inspect_mut<R>(&self, f: impl FnOnce(&mut M) -> R) -> R {
        f(&mut self.inner.run.lock().machine)
    }
}

impl<M: Machine> Inner<M> {
    /// Core loop; entered from `start`, from scheduled resumptions and from
    /// completed pending operations.
    fn continue_execution(self: &Arc<Self>, entry: Entry<M>) {
        let (next, run_id) = {
            let mut run = self.run.lock();
            let next = self.drive(&mut run, entry);
            (next, run.run_id)
        };

        match next {
            Next::Schedule(scheduler, delay) => {
                let resume = ResumeGuard::new(self, run_id);
                scheduler.submit(
                    Box::new(move || {
                        if let Some(this) = resume.disarm() {
                            this.continue_execution(Entry::Step);
                        }
                    }),
                    delay,
                );
            }
            Next::Await(scheduler, suspension) => {
                let resume = ResumeGuard::new(self, run_id);
                // checked by `advance` before suspending
                let Some(context) = scheduler.execution_context() else {
                    error!(automaton = %self.name, "execution context vanished");
                    return;
                };
                context.spawn(Box::pin(async move {
                    let outcome = AssertUnwindSafe(suspension.outcome).catch_unwind();
                    let resumption = match outcome.await {
                        Ok(resumption) => resumption,
                        Err(payload) => Resumption::Panicked(panic_message(&*payload)),
                    };
                    if let Some(this) = resume.disarm() {
                        this.continue_execution(Entry::Resume(resumption));
                    }
                }));
            }
            Next::Done => {}
        }
    }

    /// Stops a run whose scheduled resumption was dropped without running,
    /// e.g. by a runtime shutting down.
    fn abandon(&self, run_id: Uuid) {
        let mut run = self.run.lock();
        if run.run_id != run_id || run.completion.is_none() {
            return;
        }
        let violation = self.violation(run.current.as_ref(), "resumption dropped before it ran");
        error!(
            automaton = %self.name,
            run_id = %run_id,
            error = %violation,
            "automaton abandoned by its scheduler"
        );
        self.notify_stop(&mut run, StopReason::Error, Some(RunError::Invariant(violation)));
    }

    /// Runs `advance`, routing faults; loops when `on_error` recovers.
    fn drive(&self, run: &mut MutexGuard<'_, Run<M>>, mut entry: Entry<M>) -> Next<M> {
        loop {
            match self.advance(run, entry) {
                Ok(next) => return next,
                Err(Fault::Invariant(violation)) => {
                    error!(
                        automaton = %self.name,
                        run_id = %run.run_id,
                        error = %violation,
                        "automaton inner logic disaster"
                    );
                    self.notify_stop(run, StopReason::Error, Some(RunError::Invariant(violation)));
                    return Next::Done;
                }
                Err(Fault::Domain(error)) => {
                    let state = run.current.clone();
                    match run.machine.on_error(state.as_ref(), &error) {
                        Some(recovered) => {
                            warn!(
                                automaton = %self.name,
                                run_id = %run.run_id,
                                error = %error,
                                state = %recovered.name(),
                                "automaton recovered from error"
                            );
                            run.current = Some(recovered);
                            run.pending = None;
                            run.delay = Delay::After(Duration::ZERO);
                            entry = Entry::Step;
                        }
                        None => {
                            trace!(
                                automaton = %self.name,
                                state = %describe(state.as_ref()),
                                error = %error,
                                "automaton error"
                            );
                            self.notify_stop(run, StopReason::Error, Some(error));
                            return Next::Done;
                        }
                    }
                }
            }
        }
    }

    fn advance(&self, run: &mut Run<M>, entry: Entry<M>) -> Result<Next<M>, Fault> {
        let do_step = match entry {
            Entry::Step => true,
            Entry::Resume(resumption) => {
                let state = run
                    .current
                    .clone()
                    .ok_or_else(|| self.violation(None, "resumed without a current state"))?;
                match resumption {
                    Resumption::Continue(continuation) => {
                        trace!(automaton = %self.name, state = %state.name(), "resuming");
                        let transition = self.invoke(run, state, continuation)?;
                        run.apply(transition);
                    }
                    Resumption::Failed(error) => {
                        return Err(Fault::Domain(RunError::Operation(Arc::new(error))));
                    }
                    Resumption::Panicked(message) => {
                        return Err(Fault::Domain(RunError::Panicked(message)));
                    }
                }
                false
            }
        };

        if let Some(state) = &run.current {
            if !run.machine.check_state(state) {
                return Err(self
                    .violation(Some(state), "state doesn't belong to this automaton")
                    .into());
            }
        }

        if self.manual_stop && self.stop_flag.load(Ordering::SeqCst) {
            self.notify_stop(run, StopReason::Manual, None);
            return Ok(Next::Done);
        }

        let Some(state) = run.current.clone() else {
            self.notify_stop(run, StopReason::Natural, None);
            return Ok(Next::Done);
        };

        if run.max_time.is_some_and(|max_time| self.ticker.read() >= max_time) {
            self.notify_stop(run, StopReason::Age, None);
            return Ok(Next::Done);
        }

        if do_step {
            self.execute(run, state)?;
        }

        while run.delay == Delay::Join {
            let Some(state) = run.current.clone() else {
                self.notify_stop(run, StopReason::Natural, None);
                return Ok(Next::Done);
            };
            self.execute(run, state)?;
        }

        let scheduler = run
            .scheduler
            .clone()
            .ok_or_else(|| self.violation(run.current.as_ref(), "no scheduler"))?;

        match run.pending.take() {
            Some(suspension) => {
                if scheduler.execution_context().is_none() {
                    return Err(self
                        .violation(
                            run.current.as_ref(),
                            "scheduler has no execution context for asynchronous steps",
                        )
                        .into());
                }
                Ok(Next::Await(scheduler, suspension))
            }
            None => Ok(Next::Schedule(scheduler, run.delay.duration())),
        }
    }

    /// Resolve and run the step for `state`, applying its transition.
    fn execute(&self, run: &mut Run<M>, state: M::State) -> Result<(), Fault> {
        let step = (self.resolver)(&state)
            .ok_or_else(|| self.violation(Some(&state), "current state undefined"))?;
        trace!(automaton = %self.name, state = %state.name(), "step");

        let transition = match &step {
            Step::Sync(step) => self.invoke(run, state, |machine, cx| step(machine, cx))?,
            Step::Async(step) => {
                self.invoke(run, state, |machine, cx| step.start(machine, cx))?
            }
        };
        run.apply(transition);
        Ok(())
    }

    /// Call step logic and enforce the one-transition-per-step invariant.
    fn invoke<F>(&self, run: &mut Run<M>, state: M::State, logic: F) -> Result<Transition<M>, Fault>
    where
        F: FnOnce(&mut M, &mut Context<M>) -> StepResult<M>,
    {
        let age = self.ticker.read().saturating_sub(run.start_time);
        let mut cx = Context::new(
            state,
            Arc::clone(&self.name),
            age,
            self.randomizer.clone(),
            run.assoc.take(),
        );

        let machine = &mut run.machine;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| logic(machine, &mut cx)));
        let issued = cx.issued();
        let state = cx.state().clone();
        run.assoc = cx.into_assoc();

        let transition = match outcome {
            Ok(Ok(transition)) => transition,
            Ok(Err(error)) => return Err(Fault::from_step(error)),
            Err(payload) => return Err(Fault::Domain(RunError::Panicked(panic_message(&*payload)))),
        };

        if issued != 1 {
            return Err(self
                .violation(
                    Some(&state),
                    format!("exactly one transition must be issued per step, got {issued}"),
                )
                .into());
        }
        Ok(transition)
    }

    /// Terminate the run and deliver its descriptor.
    fn notify_stop(&self, run: &mut Run<M>, reason: StopReason, error: Option<RunError>) {
        run.pending = None;
        let hook = panic::catch_unwind(AssertUnwindSafe(|| {
            run.machine.on_stopped(reason, error.as_ref())
        }));
        if hook.is_err() {
            error!(automaton = %self.name, "on_stopped hook panicked");
        }
        run.assoc = None;

        let last_state = run.current.take().or_else(|| run.last.take());
        let descriptor = StopDescriptor {
            run_id: run.run_id,
            reason,
            error,
            age: self.ticker.read().saturating_sub(run.start_time),
            last_state,
            started_at: run.started_at,
            stopped_at: Utc::now(),
        };
        debug!(
            automaton = %self.name,
            run_id = %run.run_id,
            reason = ?reason,
            age = ?descriptor.age,
            last_state = %describe(descriptor.last_state.as_ref()),
            "automaton stopped"
        );

        run.scheduler = None;
        *self.last_stop.lock() = Some(descriptor.clone());
        match run.completion.take() {
            Some(completion) if completion.fulfill(descriptor) => {}
            _ => error!(automaton = %self.name, "completion signal already fulfilled"),
        }
    }

    fn violation(&self, state: Option<&M::State>, message: impl Into<String>) -> InvariantViolation {
        InvariantViolation::new(&*self.name, describe(state), message)
    }
}

/// Travels with a submitted resumption; stops the run if the resumption is
/// dropped instead of run.
struct ResumeGuard<M: Machine> {
    inner: Option<Arc<Inner<M>>>,
    run_id: Uuid,
}

impl<M: Machine> ResumeGuard<M> {
    fn new(inner: &Arc<Inner<M>>, run_id: Uuid) -> Self {
        Self {
            inner: Some(Arc::clone(inner)),
            run_id,
        }
    }

    fn disarm(mut self) -> Option<Arc<Inner<M>>> {
        self.inner.take()
    }
}

impl<M: Machine> Drop for ResumeGuard<M> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.abandon(self.run_id);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
