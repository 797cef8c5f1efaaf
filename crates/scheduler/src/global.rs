//! Shared scheduler instance
//!
//! Unrelated components only batch together if they submit to the same
//! scheduler. This module holds one [`FrameScheduler`] per thread, created on
//! first use from [`SchedulerConfig::from_env`] and never torn down. It is
//! driven by a [`TimerFrames`] fallback; the owning thread pumps it through
//! [`frames`].
//!
//! Schedulers are single-threaded, so the instance belongs to the thread that
//! first touches it (normally the UI thread).
//!
//! # Example
//!
//! ```
//! use frame_batch_scheduler::global;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let done = Rc::new(Cell::new(false));
//! let flag = done.clone();
//! global::write(move || flag.set(true));
//!
//! global::frames().run_until_idle(10);
//! assert!(done.get());
//! ```

use crate::config::SchedulerConfig;
use crate::error::JobError;
use crate::frame::TimerFrames;
use crate::job::{JobId, JobOutcome};
use crate::sandbox::Sandbox;
use crate::scheduler::FrameScheduler;
use std::rc::Rc;
use tracing::{debug, warn};

struct Global {
    scheduler: FrameScheduler,
    frames: Rc<TimerFrames>,
}

impl Global {
    fn new() -> Self {
        let config = SchedulerConfig::from_env().unwrap_or_else(|err| {
            warn!(%err, "invalid scheduler configuration, using defaults");
            SchedulerConfig::default()
        });
        let frames = Rc::new(TimerFrames::new(config.frame_interval));
        let scheduler = FrameScheduler::with_config(frames.clone(), config);
        debug!("shared frame scheduler created");
        Self { scheduler, frames }
    }
}

thread_local! {
    static GLOBAL: Global = Global::new();
}

/// The shared scheduler
pub fn scheduler() -> FrameScheduler {
    GLOBAL.with(|global| global.scheduler.clone())
}

/// The timer driving the shared scheduler
pub fn frames() -> Rc<TimerFrames> {
    GLOBAL.with(|global| global.frames.clone())
}

/// Schedule a measurement job on the shared scheduler
pub fn read<F, R>(callback: F) -> JobId
where
    F: FnOnce() -> R + 'static,
    R: JobOutcome,
{
    scheduler().read(callback)
}

/// Like [`read`], passing `context` to the callback
pub fn read_with<C, F, R>(context: C, callback: F) -> JobId
where
    C: 'static,
    F: FnOnce(C) -> R + 'static,
    R: JobOutcome,
{
    scheduler().read_with(context, callback)
}

/// Schedule a mutation job on the shared scheduler
pub fn write<F, R>(callback: F) -> JobId
where
    F: FnOnce() -> R + 'static,
    R: JobOutcome,
{
    scheduler().write(callback)
}

/// Like [`write`], passing `context` to the callback
pub fn write_with<C, F, R>(context: C, callback: F) -> JobId
where
    C: 'static,
    F: FnOnce(C) -> R + 'static,
    R: JobOutcome,
{
    scheduler().write_with(context, callback)
}

/// Cancel a job on the shared scheduler
pub fn cancel(id: JobId) -> bool {
    scheduler().cancel(id)
}

/// Run `callback` on the shared scheduler after `frames` frame boundaries
pub fn defer<F, R>(frames: i32, callback: F) -> Option<JobId>
where
    F: FnOnce() -> R + 'static,
    R: JobOutcome,
{
    scheduler().defer(frames, callback)
}

/// Like [`defer`], passing `context` to the callback
pub fn defer_with<C, F, R>(frames: i32, context: C, callback: F) -> Option<JobId>
where
    C: 'static,
    F: FnOnce(C) -> R + 'static,
    R: JobOutcome,
{
    scheduler().defer_with(frames, context, callback)
}

/// Create a sandbox over the shared scheduler
pub fn sandbox() -> Sandbox {
    scheduler().sandbox()
}

/// Set the failure handler of the shared scheduler
pub fn set_error_handler<F>(handler: F)
where
    F: Fn(&JobError) + 'static,
{
    scheduler().set_error_handler(handler)
}
