//! Frame Batch Scheduler Library
//!
//! Batches layout reads and writes so that, within a single frame, every read
//! runs before every write. Interleaving reads and writes forces the layout
//! engine to recompute layout synchronously on each read that follows a
//! write; batching them gives unrelated components a shared scheduling point
//! without needing to know about each other.
//!
//! Jobs are queued per class and run when the frame primitive fires:
//! deferred jobs due in the frame first, then every read, then every write.
//! Jobs may schedule more work while they run; a write scheduled from a read
//! still runs in the same frame, a read scheduled from a write runs in the
//! next one. A failing job never stops the rest of its batch.
//!
//! # Example
//!
//! ```
//! use frame_batch_scheduler::{FrameScheduler, ManualFrames};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let frames = Rc::new(ManualFrames::new());
//! let scheduler = FrameScheduler::new(frames.clone());
//!
//! let height = Rc::new(Cell::new(0));
//!
//! // Measure first...
//! let measured = height.clone();
//! scheduler.read(move || measured.set(120));
//!
//! // ...then mutate, using the measurement
//! let applied = height.clone();
//! let job = scheduler.write(move || assert_eq!(applied.get(), 120));
//!
//! // Changed our mind about something else
//! let collapsed = Rc::new(Cell::new(false));
//! let flag = collapsed.clone();
//! let stale = scheduler.write(move || flag.set(true));
//! scheduler.cancel(stale);
//!
//! frames.tick();
//! assert!(!scheduler.is_scheduled(job));
//! assert!(!collapsed.get());
//! ```

mod config;
mod defer;
mod error;
mod frame;
pub mod global;
mod job;
mod queue;
mod registry;
mod sandbox;
mod scheduler;

// Re-export public API
pub use config::{FlushPolicy, SchedulerConfig, ENV_FLUSH_POLICY, ENV_FRAME_INTERVAL_MS};
pub use error::{ConfigError, JobError};
pub use frame::{
    FrameCallback, FrameHandle, FramePrimitive, ManualFrames, TimerFrames, FRAME_INTERVAL_120FPS,
    FRAME_INTERVAL_60FPS,
};
pub use job::{BoxError, JobClass, JobId, JobOutcome};
pub use sandbox::Sandbox;
pub use scheduler::{ErrorHandler, FrameScheduler, Phase, SchedulerStats};
