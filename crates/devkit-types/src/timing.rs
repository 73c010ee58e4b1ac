//! Deadline-aware stopwatch for long-running commands.

use std::time::{Duration, Instant};

/// Measures an operation and optionally flags it once a deadline passes.
///
/// The boundary handler starts one of these around an invocation and
/// attaches the timeout marker if the work is still unfinished when the
/// deadline expires.
#[derive(Debug)]
pub struct TimedInfo {
    started: Instant,
    deadline: Option<Duration>,
    ended: Option<Instant>,
}

impl TimedInfo {
    /// Start timing with no deadline.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            deadline: None,
            ended: None,
        }
    }

    /// Start timing with a deadline.
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            started: Instant::now(),
            deadline: Some(deadline),
            ended: None,
        }
    }

    /// Mark the operation finished. Later calls keep the first end time.
    pub fn finish(&mut self) {
        if self.ended.is_none() {
            self.ended = Some(Instant::now());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.ended.is_some()
    }

    /// Elapsed time, frozen once finished.
    pub fn elapsed(&self) -> Duration {
        match self.ended {
            Some(end) => end.duration_since(self.started),
            None => self.started.elapsed(),
        }
    }

    /// True if a deadline was set and passed before the operation
    /// finished.
    pub fn expired(&self) -> bool {
        match self.deadline {
            Some(deadline) => self.elapsed() > deadline,
            None => false,
        }
    }
}
