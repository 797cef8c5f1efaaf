//! Frame deferral timers
//!
//! A deferred job waits for a number of whole frames before it runs. Each one
//! is a small state machine keyed by the frame it is due in; the scheduler's
//! single frame tick advances all of them at once instead of every job chaining
//! its own frame callback.

use crate::job::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DeferredTimer {
    id: JobId,
    due_frame: u64,
}

/// Pending deferred jobs in submission order
#[derive(Debug, Default)]
pub(crate) struct DeferredTimers {
    timers: Vec<DeferredTimer>,
}

impl DeferredTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer for `id` that fires in frame `due_frame`
    pub fn arm(&mut self, id: JobId, due_frame: u64) {
        self.timers.push(DeferredTimer { id, due_frame });
    }

    /// Disarm the timer for `id`. Returns `true` if it was armed.
    pub fn disarm(&mut self, id: JobId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.id != id);
        self.timers.len() != before
    }

    /// Remove and return every timer due in or before `frame`, in the order
    /// they were armed
    pub fn take_due(&mut self, frame: u64) -> Vec<JobId> {
        let mut due = Vec::new();
        self.timers.retain(|timer| {
            if timer.due_frame <= frame {
                due.push(timer.id);
                false
            } else {
                true
            }
        });
        due
    }

    /// Frames left before `id` fires, counted from `current_frame`
    pub fn remaining_frames(&self, id: JobId, current_frame: u64) -> Option<u64> {
        self.timers
            .iter()
            .find(|timer| timer.id == id)
            .map(|timer| timer.due_frame.saturating_sub(current_frame))
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> JobId {
        JobId::new(raw)
    }

    #[test]
    fn test_take_due_in_arm_order() {
        let mut timers = DeferredTimers::new();

        timers.arm(id(1), 3);
        timers.arm(id(2), 1);
        timers.arm(id(3), 1);

        assert!(timers.take_due(0).is_empty());
        assert_eq!(timers.take_due(1), vec![id(2), id(3)]);
        assert_eq!(timers.len(), 1);
        assert!(timers.take_due(2).is_empty());
        assert_eq!(timers.take_due(3), vec![id(1)]);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_disarm() {
        let mut timers = DeferredTimers::new();

        timers.arm(id(1), 1);

        assert!(timers.disarm(id(1)));
        assert!(!timers.disarm(id(1)));
        assert!(timers.take_due(10).is_empty());
    }

    #[test]
    fn test_remaining_frames() {
        let mut timers = DeferredTimers::new();

        timers.arm(id(1), 5);

        assert_eq!(timers.remaining_frames(id(1), 2), Some(3));
        assert_eq!(timers.remaining_frames(id(1), 9), Some(0));
        assert_eq!(timers.remaining_frames(id(2), 2), None);
    }
}
