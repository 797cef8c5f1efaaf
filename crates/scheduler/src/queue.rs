//! Read/write queue pair
//!
//! Two FIFO queues of job identifiers, one per phase. A phase drains its queue
//! by detaching the whole batch, so jobs submitted while the batch runs land in
//! a fresh queue instead of the one being iterated.

use crate::job::{JobClass, JobId};
use std::collections::VecDeque;

/// FIFO queues for read and write jobs
#[derive(Debug, Default)]
pub(crate) struct QueuePair {
    reads: VecDeque<JobId>,
    writes: VecDeque<JobId>,
}

impl QueuePair {
    /// Create an empty queue pair
    pub fn new() -> Self {
        Self::default()
    }

    fn queue_mut(&mut self, class: JobClass) -> Option<&mut VecDeque<JobId>> {
        match class {
            JobClass::Read => Some(&mut self.reads),
            JobClass::Write => Some(&mut self.writes),
            JobClass::Deferred => None,
        }
    }

    /// Append a job to the queue matching its class
    ///
    /// Deferred jobs have no queue; enqueueing one is ignored.
    pub fn enqueue(&mut self, class: JobClass, id: JobId) {
        if let Some(queue) = self.queue_mut(class) {
            queue.push_back(id);
        }
    }

    /// Detach and return the full contents of a queue in FIFO order
    pub fn drain(&mut self, class: JobClass) -> Vec<JobId> {
        match self.queue_mut(class) {
            Some(queue) => std::mem::take(queue).into(),
            None => Vec::new(),
        }
    }

    /// Remove a job from the queue matching its class
    ///
    /// Returns `true` if the job was queued.
    pub fn remove(&mut self, class: JobClass, id: JobId) -> bool {
        let Some(queue) = self.queue_mut(class) else {
            return false;
        };
        match queue.iter().position(|queued| *queued == id) {
            Some(index) => {
                queue.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of jobs waiting in one queue
    pub fn len(&self, class: JobClass) -> usize {
        match class {
            JobClass::Read => self.reads.len(),
            JobClass::Write => self.writes.len(),
            JobClass::Deferred => 0,
        }
    }

    /// Check if both queues are empty
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }
}
