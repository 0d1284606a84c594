use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// A task ran out of its time budget.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("task {task} exceeded its time budget of {max_duration:?} after {elapsed:?}")]
pub struct TimeoutError {
    /// The name of the task.
    pub task: &'static str,
    /// Time elapsed when the budget was found exceeded.
    pub elapsed: Duration,
    /// The time budget of the task.
    pub max_duration: Duration,
}

/// Lifecycle of a time-budgeted scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// The scan has not checked its budget yet.
    NotStarted,
    /// The scan is in progress.
    Running,
    /// The scan finished within its budget.
    Completed,
    /// The scan ran out of time. This state is terminal.
    TimedOut,
}

/// Tracks the time budget of one task invocation.
///
/// Long scans call [`check`](Self::check) before every step. Once the budget is exceeded, every
/// further check fails, so a timed out scan cannot resume.
#[derive(Debug)]
pub struct TaskContext {
    name: &'static str,
    max_duration: Duration,
    start: Instant,
    state: ScanState,
}

impl TaskContext {
    /// Starts the clock for a task with the given budget.
    pub fn new(name: &'static str, max_duration: Duration) -> Self {
        Self {
            name,
            max_duration,
            start: Instant::now(),
            state: ScanState::NotStarted,
        }
    }

    /// The name of the task.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The time budget of the task.
    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// Time since the task started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// The current state of the scan.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Fails if the time budget is exceeded.
    pub fn check(&mut self) -> Result<(), TimeoutError> {
        let elapsed = self.elapsed();
        match self.state {
            ScanState::TimedOut => return Err(self.timeout(elapsed)),
            _ if elapsed > self.max_duration => {
                self.state = ScanState::TimedOut;
                return Err(self.timeout(elapsed));
            }
            ScanState::NotStarted => self.state = ScanState::Running,
            ScanState::Running | ScanState::Completed => (),
        }
        Ok(())
    }

    /// Marks the scan as finished.
    ///
    /// Has no effect on a timed out scan.
    pub fn complete(&mut self) {
        if self.state != ScanState::TimedOut {
            self.state = ScanState::Completed;
        }
    }

    /// Wraps an iterator so that every step checks the time budget.
    pub fn timed<I>(&mut self, iter: I) -> TimedIterator<'_, I::IntoIter>
    where
        I: IntoIterator,
    {
        TimedIterator {
            context: self,
            inner: iter.into_iter(),
            done: false,
        }
    }

    fn timeout(&self, elapsed: Duration) -> TimeoutError {
        TimeoutError {
            task: self.name,
            elapsed,
            max_duration: self.max_duration,
        }
    }
}

/// An iterator that checks a [`TaskContext`] before yielding each item.
///
/// When the budget is exceeded it yields a single [`TimeoutError`] and then ends.
#[derive(Debug)]
pub struct TimedIterator<'a, I> {
    context: &'a mut TaskContext,
    inner: I,
    done: bool,
}

impl<I: Iterator> Iterator for TimedIterator<'_, I> {
    type Item = Result<I::Item, TimeoutError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Err(error) = self.context.check() {
            self.done = true;
            return Some(Err(error));
        }

        let item = self.inner.next();
        if item.is_none() {
            self.done = true;
        }
        item.map(Ok)
    }
}
