//! Frame primitive adapters
//!
//! The scheduler never talks to a display directly. It asks a [`FramePrimitive`]
//! to call it back "before the next repaint" and may cancel that request.
//! Hosts with a real vsync signal implement the trait on top of it; two
//! adapters ship here:
//!
//! - [`ManualFrames`]: the host (or a test) calls [`ManualFrames::tick`] once
//!   per rendered frame.
//! - [`TimerFrames`]: fixed-interval fallback for hosts without a frame signal.
//!
//! # Target Frame Times
//! - 120 FPS (ProMotion): 8.33ms per frame
//! - 60 FPS (standard): 16.67ms per frame

use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};
use tracing::trace;

/// Default fallback frame interval (60 FPS, 16.67ms)
pub const FRAME_INTERVAL_60FPS: Duration = Duration::from_micros(16_667);

/// Frame interval for 120 FPS displays (8.33ms)
pub const FRAME_INTERVAL_120FPS: Duration = Duration::from_micros(8_333);

/// Callback invoked once at the next frame opportunity
pub type FrameCallback = Box<dyn FnOnce()>;

/// Handle to a requested frame callback, used for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameHandle(u64);

impl FrameHandle {
    /// Raw numeric value of this handle
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// "Schedule a callback before the next repaint" over whatever the host offers
///
/// Implementations must invoke each callback at most once, never synchronously
/// from inside `request_frame`, and must not invoke a callback whose handle
/// was passed to `cancel_frame` first.
pub trait FramePrimitive {
    /// Request a one-shot callback at the next frame
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;

    /// Cancel a requested callback. Unknown or already-fired handles are ignored.
    fn cancel_frame(&self, handle: FrameHandle);
}

struct PendingFrame {
    handle: FrameHandle,
    deadline: Option<Instant>,
    callback: FrameCallback,
}

#[derive(Default)]
struct FrameQueue {
    pending: Vec<PendingFrame>,
    next_handle: u64,
}

impl FrameQueue {
    fn push(&mut self, deadline: Option<Instant>, callback: FrameCallback) -> FrameHandle {
        self.next_handle += 1;
        let handle = FrameHandle(self.next_handle);
        self.pending.push(PendingFrame {
            handle,
            deadline,
            callback,
        });
        handle
    }

    fn cancel(&mut self, handle: FrameHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|frame| frame.handle != handle);
        self.pending.len() != before
    }

    /// Pop the oldest callback requested before `cutoff` that is due at `now`
    fn pop_due(&mut self, cutoff: u64, now: Option<Instant>) -> Option<FrameCallback> {
        let index = self.pending.iter().position(|frame| {
            let due = match (frame.deadline, now) {
                (Some(deadline), Some(now)) => deadline <= now,
                _ => true,
            };
            frame.handle.0 <= cutoff && due
        })?;
        Some(self.pending.remove(index).callback)
    }
}

/// Run every callback requested before the dispatch started and due at `now`.
///
/// Callbacks requested while dispatching wait for the next dispatch. The queue
/// borrow is released before each callback runs so callbacks may request or
/// cancel frames.
fn dispatch(queue: &RefCell<FrameQueue>, now: Option<Instant>) -> usize {
    let cutoff = queue.borrow().next_handle;
    let mut fired = 0;
    loop {
        let next = queue.borrow_mut().pop_due(cutoff, now);
        match next {
            Some(callback) => {
                callback();
                fired += 1;
            }
            None => break,
        }
    }
    fired
}

/// Frame primitive driven explicitly by the host
///
/// Each call to [`tick`](ManualFrames::tick) is one frame boundary.
///
/// # Example
///
/// ```
/// use frame_batch_scheduler::{FramePrimitive, ManualFrames};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let frames = ManualFrames::new();
/// let fired = Rc::new(Cell::new(false));
/// let flag = fired.clone();
///
/// frames.request_frame(Box::new(move || flag.set(true)));
/// assert!(!fired.get());
///
/// assert_eq!(frames.tick(), 1);
/// assert!(fired.get());
/// ```
#[derive(Default)]
pub struct ManualFrames {
    queue: RefCell<FrameQueue>,
    ticks: Cell<u64>,
}

impl ManualFrames {
    /// Create a frame driver with nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one frame: fire every callback requested before this call
    ///
    /// Returns the number of callbacks fired.
    pub fn tick(&self) -> usize {
        self.ticks.set(self.ticks.get() + 1);
        let fired = dispatch(&self.queue, None);
        trace!(tick = self.ticks.get(), fired, "manual frame");
        fired
    }

    /// Run `count` frames, returning the total callbacks fired
    pub fn tick_n(&self, count: usize) -> usize {
        (0..count).map(|_| self.tick()).sum()
    }

    /// Number of frames ticked so far
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    /// Number of callbacks waiting for the next tick
    pub fn pending(&self) -> usize {
        self.queue.borrow().pending.len()
    }
}

impl FramePrimitive for ManualFrames {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        self.queue.borrow_mut().push(None, callback)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.queue.borrow_mut().cancel(handle);
    }
}

/// Fixed-interval fallback frame primitive
///
/// Each request fires one interval after it was made. The owning thread drives
/// the timer with [`pump`](TimerFrames::pump) or
/// [`run_until_idle`](TimerFrames::run_until_idle).
///
/// # Example
///
/// ```
/// use frame_batch_scheduler::{FramePrimitive, TimerFrames};
/// use std::time::Duration;
///
/// let frames = TimerFrames::new(Duration::from_millis(1));
/// frames.request_frame(Box::new(|| {}));
///
/// assert_eq!(frames.run_until_idle(10), 1);
/// assert_eq!(frames.pending(), 0);
/// ```
pub struct TimerFrames {
    interval: Duration,
    queue: RefCell<FrameQueue>,
}

impl TimerFrames {
    /// Create a timer firing `interval` after each request
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            queue: RefCell::new(FrameQueue::default()),
        }
    }

    /// Create a timer for 60 FPS displays
    pub fn for_60fps() -> Self {
        Self::new(FRAME_INTERVAL_60FPS)
    }

    /// Create a timer for 120 FPS displays
    pub fn for_120fps() -> Self {
        Self::new(FRAME_INTERVAL_120FPS)
    }

    /// Get the frame interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Earliest deadline among pending callbacks
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue
            .borrow()
            .pending
            .iter()
            .filter_map(|frame| frame.deadline)
            .min()
    }

    /// Fire every pending callback whose deadline is at or before `now`
    pub fn fire_due(&self, now: Instant) -> usize {
        dispatch(&self.queue, Some(now))
    }

    /// Sleep until the next deadline, then fire what is due
    ///
    /// Returns immediately with 0 if nothing is pending.
    pub fn pump(&self) -> usize {
        let Some(deadline) = self.next_deadline() else {
            return 0;
        };
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        let fired = self.fire_due(Instant::now());
        trace!(fired, "timer frame");
        fired
    }

    /// Pump frames until nothing is pending or `max_frames` frames have run
    ///
    /// Returns the total number of callbacks fired.
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        let mut fired = 0;
        for _ in 0..max_frames {
            if self.pending() == 0 {
                break;
            }
            fired += self.pump();
        }
        fired
    }

    /// Number of callbacks waiting to fire
    pub fn pending(&self) -> usize {
        self.queue.borrow().pending.len()
    }
}

impl Default for TimerFrames {
    fn default() -> Self {
        Self::for_60fps()
    }
}

impl FramePrimitive for TimerFrames {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let deadline = Instant::now() + self.interval;
        self.queue.borrow_mut().push(Some(deadline), callback)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.queue.borrow_mut().cancel(handle);
    }
}
