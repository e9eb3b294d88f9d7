//! Deterministic virtual-time scheduler.

use super::{ExecutionContext, Scheduler, Task};
use crate::core::{ManualTicker, Ticker};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;

/// Queues tasks by due time and runs them only when driven.
///
/// Running a task first advances the shared [`ManualTicker`] to the task's
/// due time, so automatons built with the same ticker observe virtual time.
/// Tasks due at the same instant run in submission order.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    ticker: ManualTicker,
    queue: Mutex<Queue>,
}

#[derive(Default)]
struct Queue {
    next_seq: u64,
    tasks: BTreeMap<(Duration, u64), Task>,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("pending", &self.tasks.len())
            .finish()
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ticker(ticker: ManualTicker) -> Self {
        Self {
            ticker,
            queue: Mutex::default(),
        }
    }

    pub fn ticker(&self) -> &ManualTicker {
        &self.ticker
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().tasks.len()
    }

    /// Run the earliest task. Returns `false` when the queue is empty.
    pub fn run_next(&self) -> bool {
        // the lock is released before the task runs; tasks submit more tasks
        let entry = self.queue.lock().tasks.pop_first();
        match entry {
            Some(((due, _), task)) => {
                self.ticker.advance_to(due);
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until none are left; returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    /// Run every task due at or before `deadline`, then move the ticker there.
    pub fn run_until(&self, deadline: Duration) -> usize {
        let mut ran = 0;
        loop {
            let due = self.queue.lock().tasks.keys().next().map(|(due, _)| *due);
            match due {
                Some(due) if due <= deadline => {
                    self.run_next();
                    ran += 1;
                }
                _ => break,
            }
        }
        self.ticker.advance_to(deadline);
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn submit(&self, task: Task, delay: Duration) {
        let due = self.ticker.read() + delay;
        let mut queue = self.queue.lock();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.tasks.insert((due, seq), task);
    }

    fn execution_context(&self) -> Option<&dyn ExecutionContext> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |label: &'static str| -> Task {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().push(label))
        };
        (log, make)
    }

    #[test]
    fn tasks_run_in_due_order() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        scheduler.submit(task("late"), Duration::from_millis(20));
        scheduler.submit(task("early"), Duration::from_millis(10));
        scheduler.submit(task("now"), Duration::ZERO);

        assert_eq!(scheduler.run_until_idle(), 3);
        assert_eq!(*log.lock(), vec!["now", "early", "late"]);
        assert_eq!(scheduler.ticker().read(), Duration::from_millis(20));
    }

    #[test]
    fn ties_keep_submission_order() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        scheduler.submit(task("first"), Duration::from_millis(5));
        scheduler.submit(task("second"), Duration::from_millis(5));
        scheduler.run_until_idle();

        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn run_until_stops_at_deadline() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        scheduler.submit(task("a"), Duration::from_millis(10));
        scheduler.submit(task("b"), Duration::from_millis(30));

        assert_eq!(scheduler.run_until(Duration::from_millis(15)), 1);
        assert_eq!(*log.lock(), vec!["a"]);
        assert_eq!(scheduler.ticker().read(), Duration::from_millis(15));
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn has_no_execution_context() {
        assert!(ManualScheduler::new().execution_context().is_none());
    }
}
