// Scheduled task queue
// Cancellable one-shot timers measured against a FrameClock's elapsed time

use std::time::Duration;

/// Handle returned when a task is scheduled
///
/// Ids are unique per queue and never reused, so a stale handle can only
/// ever miss; it can never cancel a newer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A task waiting in the queue
#[derive(Debug, Clone)]
pub struct ScheduledTask<T> {
    pub id: TimerId,
    /// Elapsed clock time at which the task becomes due
    pub deadline: Duration,
    pub payload: T,
}

/// Ordered collection of one-shot tasks
///
/// Tasks are kept sorted by deadline; ties fire in scheduling order.
#[derive(Debug)]
pub struct TimerQueue<T> {
    tasks: Vec<ScheduledTask<T>>,
    next_id: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 0,
        }
    }

    /// Schedule a task at an absolute deadline
    pub fn schedule_at(&mut self, deadline: Duration, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;

        // Insert after every task with deadline <= ours to keep FIFO on ties
        let pos = self.tasks.partition_point(|t| t.deadline <= deadline);
        self.tasks.insert(
            pos,
            ScheduledTask {
                id,
                deadline,
                payload,
            },
        );
        id
    }

    /// Schedule a task `delay` after `now`
    pub fn schedule_after(&mut self, now: Duration, delay: Duration, payload: T) -> TimerId {
        self.schedule_at(now.saturating_add(delay), payload)
    }

    /// Cancel a pending task, returning its payload if it had not fired yet
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let pos = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(pos).payload)
    }

    /// Remove and return the earliest task due at or before `now`
    pub fn pop_due(&mut self, now: Duration) -> Option<ScheduledTask<T>> {
        match self.tasks.first() {
            Some(task) if task.deadline <= now => Some(self.tasks.remove(0)),
            _ => None,
        }
    }

    /// Deadline of the next pending task
    pub fn next_deadline(&self) -> Option<Duration> {
        self.tasks.first().map(|t| t.deadline)
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    /// Drop every pending task
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduledTask<T>> {
        self.tasks.iter()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
