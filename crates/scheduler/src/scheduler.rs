//! Frame scheduler implementation
//!
//! Batches read and write jobs so that, inside one frame, every read runs
//! before every write. Jobs may submit, cancel or defer other jobs while they
//! run; where the new job lands depends on the phase the frame is in.
//!
//! A frame runs in four steps:
//!
//! 1. `Deferring`: deferred jobs due in this frame run.
//! 2. `Reading`: the read queue is drained and run.
//! 3. `Writing`: the write queue is drained and run.
//! 4. `Idle`: a new frame is requested if work is still waiting.

use crate::config::{FlushPolicy, SchedulerConfig};
use crate::defer::DeferredTimers;
use crate::error::{panic_message, JobError};
use crate::frame::{FrameHandle, FramePrimitive};
use crate::job::{boxed, boxed_with, Job, JobCallback, JobClass, JobId, JobOutcome};
use crate::queue::QueuePair;
use crate::registry::JobRegistry;
use crate::sandbox::Sandbox;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use tracing::{debug, debug_span, error, trace, warn};

/// Handler receiving job failures in place of the default `error!` log
pub type ErrorHandler = Rc<dyn Fn(&JobError)>;

/// Execution phase of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No frame is executing
    Idle,

    /// Running deferred jobs due in the current frame
    Deferring,

    /// Running the read queue
    Reading,

    /// Running the write queue
    Writing,
}

/// Frame scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Total jobs submitted (reads, writes and deferred jobs)
    pub jobs_submitted: u64,

    /// Total jobs whose callback was invoked, failed or not
    pub jobs_completed: u64,

    /// Total jobs cancelled before they ran
    pub jobs_cancelled: u64,

    /// Total jobs whose callback returned an error or panicked
    pub jobs_failed: u64,

    /// Frame callbacks requested from the frame primitive
    pub frames_requested: u64,

    /// Frames executed
    pub frames_run: u64,
}

impl SchedulerStats {
    /// Get the number of jobs still waiting to run
    pub fn pending_jobs(&self) -> u64 {
        self.jobs_submitted - self.jobs_completed - self.jobs_cancelled
    }
}

struct SchedulerState {
    registry: JobRegistry,
    queues: QueuePair,
    deferred: DeferredTimers,
    /// Requested frame callback that has not fired yet
    pending: Option<FrameHandle>,
    phase: Phase,
    /// Frames started so far
    frame: u64,
    on_error: Option<ErrorHandler>,
    stats: SchedulerStats,
}

struct Inner {
    frames: Rc<dyn FramePrimitive>,
    config: SchedulerConfig,
    state: RefCell<SchedulerState>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().pending.take() {
            self.frames.cancel_frame(handle);
        }
    }
}

/// Read/write batching scheduler
///
/// Cheap to clone: clones share the same queues, so a job callback can hold a
/// clone and submit more work. The scheduler is single-threaded; all jobs run
/// on the thread that drives the frame primitive.
///
/// # Example
///
/// ```
/// use frame_batch_scheduler::{FrameScheduler, ManualFrames};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let frames = Rc::new(ManualFrames::new());
/// let scheduler = FrameScheduler::new(frames.clone());
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let w = log.clone();
/// scheduler.write(move || w.borrow_mut().push("write"));
/// let r = log.clone();
/// scheduler.read(move || r.borrow_mut().push("read"));
///
/// frames.tick();
/// assert_eq!(*log.borrow(), vec!["read", "write"]);
/// ```
#[derive(Clone)]
pub struct FrameScheduler {
    inner: Rc<Inner>,
}

impl FrameScheduler {
    /// Create a scheduler with the default configuration
    pub fn new(frames: Rc<dyn FramePrimitive>) -> Self {
        Self::with_config(frames, SchedulerConfig::default())
    }

    /// Create a scheduler with a custom configuration
    pub fn with_config(frames: Rc<dyn FramePrimitive>, config: SchedulerConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                frames,
                config,
                state: RefCell::new(SchedulerState {
                    registry: JobRegistry::new(),
                    queues: QueuePair::new(),
                    deferred: DeferredTimers::new(),
                    pending: None,
                    phase: Phase::Idle,
                    frame: 0,
                    on_error: None,
                    stats: SchedulerStats::default(),
                }),
            }),
        }
    }

    /// Schedule a measurement job
    ///
    /// Returns the job ID for use with [`cancel`](Self::cancel).
    pub fn read<F, R>(&self, callback: F) -> JobId
    where
        F: FnOnce() -> R + 'static,
        R: JobOutcome,
    {
        self.submit(JobClass::Read, boxed(callback))
    }

    /// Schedule a mutation job
    ///
    /// Returns the job ID for use with [`cancel`](Self::cancel).
    pub fn write<F, R>(&self, callback: F) -> JobId
    where
        F: FnOnce() -> R + 'static,
        R: JobOutcome,
    {
        self.submit(JobClass::Write, boxed(callback))
    }

    /// Schedule a measurement job that receives `context` when it runs
    pub fn read_with<C, F, R>(&self, context: C, callback: F) -> JobId
    where
        C: 'static,
        F: FnOnce(C) -> R + 'static,
        R: JobOutcome,
    {
        self.submit(JobClass::Read, boxed_with(context, callback))
    }

    /// Schedule a mutation job that receives `context` when it runs
    pub fn write_with<C, F, R>(&self, context: C, callback: F) -> JobId
    where
        C: 'static,
        F: FnOnce(C) -> R + 'static,
        R: JobOutcome,
    {
        self.submit(JobClass::Write, boxed_with(context, callback))
    }

    /// Run `callback` after `frames` more frame boundaries
    ///
    /// `0` runs it in the next frame, `1` in the frame after that, and so on.
    /// A negative count is rejected: nothing is scheduled and `None` is
    /// returned.
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
    /// let fired = Rc::new(Cell::new(false));
    ///
    /// let flag = fired.clone();
    /// assert!(scheduler.defer(1, move || flag.set(true)).is_some());
    /// assert!(scheduler.defer(-1, || ()).is_none());
    ///
    /// frames.tick();
    /// assert!(!fired.get());
    /// frames.tick();
    /// assert!(fired.get());
    /// ```
    pub fn defer<F, R>(&self, frames: i32, callback: F) -> Option<JobId>
    where
        F: FnOnce() -> R + 'static,
        R: JobOutcome,
    {
        self.submit_deferred(frames, boxed(callback))
    }

    /// Like [`defer`](Self::defer), passing `context` to the callback
    pub fn defer_with<C, F, R>(&self, frames: i32, context: C, callback: F) -> Option<JobId>
    where
        C: 'static,
        F: FnOnce(C) -> R + 'static,
        R: JobOutcome,
    {
        self.submit_deferred(frames, boxed_with(context, callback))
    }

    /// Cancel a job by ID
    ///
    /// A cancelled job never runs. Unknown IDs and jobs that already ran (or
    /// are running) are ignored. Returns `true` if a job was cancelled.
    pub fn cancel(&self, id: JobId) -> bool {
        let removed = {
            let mut state = self.inner.state.borrow_mut();
            let job = state.registry.remove(id);
            if let Some(job) = &job {
                match job.class {
                    JobClass::Read | JobClass::Write => {
                        state.queues.remove(job.class, id);
                    }
                    JobClass::Deferred => {
                        state.deferred.disarm(id);
                    }
                }
                state.stats.jobs_cancelled += 1;
            }
            job
        };

        // Dropped outside the borrow: captured values may touch the scheduler.
        match removed {
            Some(job) => {
                debug!(job = %id, class = %job.class, "job cancelled");
                drop(job);
                self.release_idle_frame();
                true
            }
            None => false,
        }
    }

    /// Set the handler receiving job failures
    ///
    /// Replaces the default behaviour of logging failures at `error` level.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&JobError) + 'static,
    {
        self.inner.state.borrow_mut().on_error = Some(Rc::new(handler));
    }

    /// Remove the failure handler, restoring the default `error!` log
    pub fn clear_error_handler(&self) {
        self.inner.state.borrow_mut().on_error = None;
    }

    /// Create a sandbox tracking the jobs submitted through it
    pub fn sandbox(&self) -> Sandbox {
        Sandbox::new(self.clone())
    }

    /// Current execution phase
    pub fn phase(&self) -> Phase {
        self.inner.state.borrow().phase
    }

    /// Whether a frame callback has been requested and has not fired yet
    pub fn is_frame_pending(&self) -> bool {
        self.inner.state.borrow().pending.is_some()
    }

    /// Number of frames executed so far
    pub fn frame_count(&self) -> u64 {
        self.inner.state.borrow().frame
    }

    /// Number of read jobs waiting in the queue
    pub fn pending_reads(&self) -> usize {
        self.inner.state.borrow().queues.len(JobClass::Read)
    }

    /// Number of write jobs waiting in the queue
    pub fn pending_writes(&self) -> usize {
        self.inner.state.borrow().queues.len(JobClass::Write)
    }

    /// Number of deferred jobs waiting for their frame
    pub fn pending_deferred(&self) -> usize {
        self.inner.state.borrow().deferred.len()
    }

    /// Whether the job is still waiting to run
    pub fn is_scheduled(&self, id: JobId) -> bool {
        self.inner.state.borrow().registry.contains(id)
    }

    /// Frames left before a deferred job runs, `0` meaning the next frame
    pub fn remaining_frames(&self, id: JobId) -> Option<u64> {
        let state = self.inner.state.borrow();
        state.deferred.remaining_frames(id, state.frame + 1)
    }

    /// Get the scheduler configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Get scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        self.inner.state.borrow().stats.clone()
    }

    pub(crate) fn submit(&self, class: JobClass, callback: JobCallback) -> JobId {
        let id = {
            let mut state = self.inner.state.borrow_mut();
            let id = state.registry.add(class, callback);
            state.queues.enqueue(class, id);
            state.stats.jobs_submitted += 1;
            id
        };
        trace!(job = %id, %class, "job queued");
        self.request(class);
        id
    }

    fn submit_deferred(&self, frames: i32, callback: JobCallback) -> Option<JobId> {
        let Ok(frames) = u64::try_from(frames) else {
            warn!(frames, "rejected deferral with negative frame count");
            return None;
        };

        let id = {
            let mut state = self.inner.state.borrow_mut();
            let id = state.registry.add(JobClass::Deferred, callback);
            let due_frame = state.frame + 1 + frames;
            state.deferred.arm(id, due_frame);
            state.stats.jobs_submitted += 1;
            id
        };
        trace!(job = %id, frames, "job deferred");
        self.request(JobClass::Deferred);
        Some(id)
    }

    /// Decide whether a newly added job needs a frame requested
    fn request(&self, class: JobClass) {
        let needs_frame = {
            let state = self.inner.state.borrow();
            match (state.phase, class) {
                // Joins the batch the running phase is still draining.
                (Phase::Writing, JobClass::Write) => false,
                (Phase::Reading, JobClass::Read) => false,
                // The writing phase of this frame has not started yet.
                (Phase::Reading, JobClass::Write) => false,
                (Phase::Deferring, JobClass::Read | JobClass::Write) => false,
                // Deferred timers are re-armed when the frame finishes.
                (Phase::Deferring | Phase::Reading | Phase::Writing, JobClass::Deferred) => false,
                _ => state.pending.is_none(),
            }
        };

        if needs_frame {
            self.request_frame();
        }
    }

    fn request_frame(&self) {
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        let handle = self.inner.frames.request_frame(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                FrameScheduler { inner }.run_frame();
            }
        }));

        let mut state = self.inner.state.borrow_mut();
        state.pending = Some(handle);
        state.stats.frames_requested += 1;
        debug!(handle = handle.as_u64(), "frame requested");
    }

    /// Cancel the pending frame when nothing is left for it to do
    fn release_idle_frame(&self) {
        let handle = {
            let mut state = self.inner.state.borrow_mut();
            if state.phase != Phase::Idle
                || !state.queues.is_empty()
                || !state.deferred.is_empty()
            {
                return;
            }
            state.pending.take()
        };

        if let Some(handle) = handle {
            self.inner.frames.cancel_frame(handle);
            debug!(handle = handle.as_u64(), "idle frame cancelled");
        }
    }

    fn run_frame(&self) {
        let frame = {
            let mut state = self.inner.state.borrow_mut();
            state.pending = None;
            state.frame += 1;
            state.stats.frames_run += 1;
            state.frame
        };
        let _span = debug_span!("frame", frame).entered();

        self.set_phase(Phase::Deferring);
        let due = self.inner.state.borrow_mut().deferred.take_due(frame);
        for id in due {
            self.run_job(id);
        }

        self.run_phase(Phase::Reading, JobClass::Read);
        self.run_phase(Phase::Writing, JobClass::Write);
        self.set_phase(Phase::Idle);

        self.rearm();
    }

    fn set_phase(&self, phase: Phase) {
        self.inner.state.borrow_mut().phase = phase;
        trace!(?phase, "phase");
    }

    fn run_phase(&self, phase: Phase, class: JobClass) {
        self.set_phase(phase);
        loop {
            let batch = self.inner.state.borrow_mut().queues.drain(class);
            if batch.is_empty() {
                break;
            }
            for id in batch {
                self.run_job(id);
            }
            if self.inner.config.flush_policy == FlushPolicy::Snapshot {
                break;
            }
        }
    }

    /// Request the next frame if work is still waiting after this one
    ///
    /// A frame requested during this one whose work was cancelled before the
    /// frame ended is released instead.
    fn rearm(&self) {
        let (has_work, pending) = {
            let state = self.inner.state.borrow();
            (
                !state.queues.is_empty() || !state.deferred.is_empty(),
                state.pending.is_some(),
            )
        };
        if !has_work {
            self.release_idle_frame();
        } else if !pending {
            self.request_frame();
        }
    }

    fn run_job(&self, id: JobId) {
        // Removed before running, so cancelling a running job is a no-op.
        let job = self.inner.state.borrow_mut().registry.remove(id);
        let Some(Job { id, class, callback }) = job else {
            return;
        };

        trace!(job = %id, %class, "running job");
        let failure = match panic::catch_unwind(AssertUnwindSafe(callback)) {
            Ok(Ok(())) => None,
            Ok(Err(source)) => Some(JobError::Failed { id, class, source }),
            Err(payload) => Some(JobError::Panicked {
                id,
                class,
                message: panic_message(payload.as_ref()),
            }),
        };

        {
            let mut state = self.inner.state.borrow_mut();
            state.stats.jobs_completed += 1;
            if failure.is_some() {
                state.stats.jobs_failed += 1;
            }
        }

        if let Some(err) = failure {
            self.report(err);
        }
    }

    fn report(&self, err: JobError) {
        let handler = self.inner.state.borrow().on_error.clone();
        match handler {
            Some(handler) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(&err))) {
                    error!(
                        job = %err.job_id(),
                        panic = %panic_message(payload.as_ref()),
                        "job failure handler panicked"
                    );
                }
            }
            None => {
                error!(job = %err.job_id(), class = %err.class(), error = %err, "job failed");
            }
        }
    }
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("FrameScheduler")
            .field("phase", &state.phase)
            .field("pending", &state.pending)
            .field("frame", &state.frame)
            .field("jobs", &state.registry.len())
            .field("reads", &state.queues.len(JobClass::Read))
            .field("writes", &state.queues.len(JobClass::Write))
            .field("deferred", &state.deferred.len())
            .finish()
    }
}
