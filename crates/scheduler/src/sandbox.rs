//! Scoped job batches
//!
//! A [`Sandbox`] submits jobs to a shared [`FrameScheduler`] and remembers
//! which ones it submitted, so a component can cancel all of its outstanding
//! work at once without touching jobs owned by anyone else.

use crate::job::{boxed, boxed_with, JobCallback, JobClass, JobId, JobOutcome};
use crate::scheduler::FrameScheduler;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::debug;

/// Jobs submitted through a sandbox that have neither run nor been cancelled
#[derive(Debug, Default)]
struct Tracked {
    reads: Vec<JobId>,
    writes: Vec<JobId>,
}

impl Tracked {
    fn list_mut(&mut self, class: JobClass) -> &mut Vec<JobId> {
        if class == JobClass::Write {
            &mut self.writes
        } else {
            &mut self.reads
        }
    }

    fn forget(&mut self, id: JobId) -> bool {
        let before = self.reads.len() + self.writes.len();
        self.reads.retain(|tracked| *tracked != id);
        self.writes.retain(|tracked| *tracked != id);
        self.reads.len() + self.writes.len() != before
    }
}

/// Forgets a tracked job once its callback is consumed or dropped
///
/// Lives inside the submitted callback, so it fires whether the job runs or is
/// cancelled, through the sandbox or directly on the scheduler.
struct Untrack {
    id: Rc<Cell<Option<JobId>>>,
    tracked: Weak<RefCell<Tracked>>,
}

impl Drop for Untrack {
    fn drop(&mut self) {
        if let (Some(id), Some(tracked)) = (self.id.get(), self.tracked.upgrade()) {
            tracked.borrow_mut().forget(id);
        }
    }
}

/// Facade over a scheduler that can bulk-cancel the jobs it submitted
///
/// # Example
///
/// ```
/// use frame_batch_scheduler::{FrameScheduler, ManualFrames};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let frames = Rc::new(ManualFrames::new());
/// let scheduler = FrameScheduler::new(frames.clone());
/// let sandbox = scheduler.sandbox();
/// let runs = Rc::new(Cell::new(0));
///
/// let r = runs.clone();
/// sandbox.write(move || r.set(r.get() + 1));
/// let r = runs.clone();
/// scheduler.write(move || r.set(r.get() + 10));
///
/// assert_eq!(sandbox.clear(None), 1);
/// frames.tick();
/// assert_eq!(runs.get(), 10);
/// ```
#[derive(Debug)]
pub struct Sandbox {
    scheduler: FrameScheduler,
    tracked: Rc<RefCell<Tracked>>,
}

impl Sandbox {
    /// Create a sandbox over `scheduler`
    pub fn new(scheduler: FrameScheduler) -> Self {
        Self {
            scheduler,
            tracked: Rc::new(RefCell::new(Tracked::default())),
        }
    }

    /// Schedule a tracked measurement job
    pub fn read<F, R>(&self, callback: F) -> JobId
    where
        F: FnOnce() -> R + 'static,
        R: JobOutcome,
    {
        self.submit(JobClass::Read, boxed(callback))
    }

    /// Like [`read`](Self::read), passing `context` to the callback
    pub fn read_with<C, F, R>(&self, context: C, callback: F) -> JobId
    where
        C: 'static,
        F: FnOnce(C) -> R + 'static,
        R: JobOutcome,
    {
        self.submit(JobClass::Read, boxed_with(context, callback))
    }

    /// Schedule a tracked mutation job
    pub fn write<F, R>(&self, callback: F) -> JobId
    where
        F: FnOnce() -> R + 'static,
        R: JobOutcome,
    {
        self.submit(JobClass::Write, boxed(callback))
    }

    /// Like [`write`](Self::write), passing `context` to the callback
    pub fn write_with<C, F, R>(&self, context: C, callback: F) -> JobId
    where
        C: 'static,
        F: FnOnce(C) -> R + 'static,
        R: JobOutcome,
    {
        self.submit(JobClass::Write, boxed_with(context, callback))
    }

    fn submit(&self, class: JobClass, callback: JobCallback) -> JobId {
        let guard = Untrack {
            id: Rc::new(Cell::new(None)),
            tracked: Rc::downgrade(&self.tracked),
        };
        let slot = guard.id.clone();

        let id = self.scheduler.submit(
            class,
            Box::new(move || {
                drop(guard);
                callback()
            }),
        );

        // The job cannot run or be dropped before this returns, so the slot
        // is always set by the time the guard reads it.
        slot.set(Some(id));
        self.tracked.borrow_mut().list_mut(class).push(id);
        id
    }

    /// Cancel tracked jobs
    ///
    /// With `Some(id)`, cancels that job if this sandbox submitted it and it
    /// has not run. With `None`, cancels every outstanding job this sandbox
    /// submitted, reads first and then writes, each in submission order.
    /// Returns the number of jobs cancelled.
    pub fn clear(&self, id: Option<JobId>) -> usize {
        let ids = match id {
            Some(id) => {
                if !self.tracked.borrow_mut().forget(id) {
                    return 0;
                }
                vec![id]
            }
            None => {
                let mut tracked = self.tracked.borrow_mut();
                let mut ids = std::mem::take(&mut tracked.reads);
                ids.append(&mut tracked.writes);
                ids
            }
        };

        let cancelled = ids
            .into_iter()
            .filter(|id| self.scheduler.cancel(*id))
            .count();
        debug!(cancelled, "sandbox cleared");
        cancelled
    }

    /// Cancel every outstanding job submitted through this sandbox
    pub fn clear_all(&self) -> usize {
        self.clear(None)
    }

    /// Number of tracked read jobs that have not run
    pub fn pending_reads(&self) -> usize {
        self.tracked.borrow().reads.len()
    }

    /// Number of tracked write jobs that have not run
    pub fn pending_writes(&self) -> usize {
        self.tracked.borrow().writes.len()
    }

    /// Number of tracked jobs that have not run
    pub fn len(&self) -> usize {
        self.pending_reads() + self.pending_writes()
    }

    /// Check if the sandbox has no outstanding jobs
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The scheduler this sandbox submits to
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }
}
